//! Reference rewriting: point inline-image references at extracted files.
//!
//! The OCR service marks an embedded image with a self-referential link,
//! `![img-0.jpeg](img-0.jpeg)`: alt text and target are the same id. Only
//! links of exactly that shape are rewritten; ordinary links such as
//! `![chart](https://…)` and stray mentions of the id in prose stay as they
//! are.

use regex::{Captures, Regex};
use std::collections::HashMap;
use tracing::warn;

/// Replace the target of every `![id](id)` reference whose id is in
/// `paths`, keeping the alt text.
///
/// Ids are matched literally, so ids holding `(`, `)`, `[` or `]` are
/// rewritten like any other.
pub fn rewrite_references(markup: &str, paths: &HashMap<String, String>) -> String {
    let mut ids: Vec<&str> = paths
        .keys()
        .map(String::as_str)
        .filter(|id| !id.is_empty())
        .collect();
    if ids.is_empty() {
        return markup.to_string();
    }
    // Longest first so an id never shadows a longer one it prefixes.
    ids.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));

    let re = match self_reference_pattern(&ids) {
        Ok(re) => re,
        Err(e) => {
            warn!("Image reference pattern failed to compile ({}); using literal replacement", e);
            return rewrite_literally(markup, &ids, paths);
        }
    };
    re.replace_all(markup, |caps: &Captures<'_>| {
        let whole = &caps[0];
        // `![id](id)` is 2 * id.len() + 5 bytes with the id starting at byte 2.
        let id = &whole[2..2 + (whole.len() - 5) / 2];
        match paths.get(id) {
            Some(path) => format!("![{id}]({path})"),
            None => whole.to_string(),
        }
    })
    .into_owned()
}

/// Whether `markup` still holds a self-referential reference for `id`.
pub fn has_embedded_reference(markup: &str, id: &str) -> bool {
    markup.contains(&self_reference(id))
}

fn self_reference(id: &str) -> String {
    format!("![{id}]({id})")
}

fn self_reference_pattern(ids: &[&str]) -> Result<Regex, regex::Error> {
    let alternatives: Vec<String> = ids
        .iter()
        .map(|id| {
            let id = regex::escape(id);
            format!(r"!\[{id}\]\({id}\)")
        })
        .collect();
    Regex::new(&alternatives.join("|"))
}

fn rewrite_literally(markup: &str, ids: &[&str], paths: &HashMap<String, String>) -> String {
    let mut out = markup.to_string();
    for id in ids {
        if let Some(path) = paths.get(*id) {
            out = out.replace(&self_reference(id), &format!("![{id}]({path})"));
        }
    }
    out
}
