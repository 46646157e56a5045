//! Recognition service boundary: PDF bytes in, page-ordered OCR result out.
//!
//! [`RecognitionService`] is the seam the orchestrator talks to; tests plug
//! in scripted implementations, production uses [`MistralOcrClient`].
//!
//! ## Mistral OCR call sequence
//!
//! ```text
//! POST /files            (multipart, purpose=ocr)  → { id }
//! GET  /files/{id}/url?expiry=N                    → { url }   short-lived handle
//! POST /ocr  { model, document_url, include_image_base64: true } → pages[]
//! ```
//!
//! Calls are made one after another and carry no client-side timeout; the
//! service's own limits apply. Nothing is retried.

use crate::error::{Pdf2TexError, RecognitionError};
use crate::output::RecognitionResult;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

/// Environment variable holding the API key.
pub const API_KEY_VAR: &str = "MISTRAL_API_KEY";

/// Environment variable overriding the API base URL.
pub const API_BASE_VAR: &str = "MISTRAL_API_BASE";

pub const DEFAULT_API_BASE: &str = "https://api.mistral.ai/v1";

const API_KEY_HINT: &str = "Get a free API Key at: https://console.mistral.ai/api-keys";

/// What the orchestrator asks of a recognition backend.
#[async_trait]
pub trait RecognitionService: Send + Sync {
    /// Recognise one document. `file_name` is informational (used for the
    /// upload name); `bytes` is the raw PDF.
    async fn recognize(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<RecognitionResult, RecognitionError>;
}

/// HTTP client for the Mistral OCR API.
#[derive(Clone)]
pub struct MistralOcrClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    expiry_hours: u32,
}

impl fmt::Debug for MistralOcrClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MistralOcrClient")
            .field("api_key", &mask_key(&self.api_key))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("expiry_hours", &self.expiry_hours)
            .finish()
    }
}

impl MistralOcrClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_API_BASE.to_string(),
            model: model.into(),
            expiry_hours: 1,
        }
    }

    /// Build a client from `MISTRAL_API_KEY` (and optional `MISTRAL_API_BASE`).
    ///
    /// A missing or empty key is fatal for the whole run.
    pub fn from_env(model: impl Into<String>) -> Result<Self, Pdf2TexError> {
        let key = std::env::var(API_KEY_VAR).ok();
        Ok(Self::new(require_api_key(key.as_deref())?, model).with_base_url_from_env())
    }

    /// Apply `MISTRAL_API_BASE` when it is set and non-blank.
    pub fn with_base_url_from_env(self) -> Self {
        self.with_base_url_override(std::env::var(API_BASE_VAR).ok().as_deref())
    }

    fn with_base_url_override(self, base: Option<&str>) -> Self {
        match base.map(str::trim) {
            Some(base) if !base.is_empty() => self.with_base_url(base),
            _ => self,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_expiry_hours(mut self, hours: u32) -> Self {
        self.expiry_hours = hours.max(1);
        self
    }

    /// The key with everything after the first four characters masked.
    pub fn masked_key(&self) -> String {
        mask_key(&self.api_key)
    }

    async fn upload(&self, file_name: &str, bytes: Vec<u8>) -> Result<String, RecognitionError> {
        const STAGE: &str = "file upload";
        let part = Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str("application/pdf")
            .map_err(|e| transport(STAGE, e))?;
        let form = Form::new().text("purpose", "ocr").part("file", part);

        let response = self
            .http
            .post(format!("{}/files", self.base_url))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| transport(STAGE, e))?;
        let uploaded: UploadedFile = parse_json(STAGE, response).await?;
        debug!("Uploaded '{}' as file {}", file_name, uploaded.id);
        Ok(uploaded.id)
    }

    async fn signed_url(&self, file_id: &str) -> Result<String, RecognitionError> {
        const STAGE: &str = "signed url";
        let response = self
            .http
            .get(format!("{}/files/{}/url", self.base_url, file_id))
            .query(&[("expiry", self.expiry_hours)])
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| transport(STAGE, e))?;
        let signed: SignedUrl = parse_json(STAGE, response).await?;
        Ok(signed.url)
    }

    async fn ocr(&self, document_url: &str) -> Result<RecognitionResult, RecognitionError> {
        const STAGE: &str = "ocr";
        let response = self
            .http
            .post(format!("{}/ocr", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&OcrRequest::new(&self.model, document_url))
            .send()
            .await
            .map_err(|e| transport(STAGE, e))?;
        let raw: serde_json::Value = parse_json(STAGE, response).await?;
        RecognitionResult::from_raw(raw).map_err(|e| RecognitionError::Decode {
            stage: STAGE,
            detail: e.to_string(),
        })
    }
}

#[async_trait]
impl RecognitionService for MistralOcrClient {
    async fn recognize(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<RecognitionResult, RecognitionError> {
        info!("Submitting '{}' to {} ({} bytes)", file_name, self.model, bytes.len());
        let file_id = self.upload(file_name, bytes).await?;
        let url = self.signed_url(&file_id).await?;
        let result = self.ocr(&url).await?;
        info!(
            "Recognised '{}': {} pages, {} images",
            file_name,
            result.pages.len(),
            result.image_count()
        );
        Ok(result)
    }
}

// ── Wire types ───────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct UploadedFile {
    id: String,
}

#[derive(Debug, Deserialize)]
struct SignedUrl {
    url: String,
}

#[derive(Debug, Serialize)]
struct OcrRequest<'a> {
    model: &'a str,
    document: DocumentUrl<'a>,
    include_image_base64: bool,
}

impl<'a> OcrRequest<'a> {
    fn new(model: &'a str, document_url: &'a str) -> Self {
        Self {
            model,
            document: DocumentUrl {
                kind: "document_url",
                document_url,
            },
            include_image_base64: true,
        }
    }
}

#[derive(Debug, Serialize)]
struct DocumentUrl<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    document_url: &'a str,
}

// ── Helpers ──────────────────────────────────────────────────────────────

/// Validate the credential value, producing the startup error with a hint.
pub fn require_api_key(value: Option<&str>) -> Result<String, Pdf2TexError> {
    match value.map(str::trim) {
        Some(key) if !key.is_empty() => Ok(key.to_string()),
        _ => Err(Pdf2TexError::MissingCredential {
            var: API_KEY_VAR.to_string(),
            hint: API_KEY_HINT.to_string(),
        }),
    }
}

fn mask_key(key: &str) -> String {
    let prefix: String = key.chars().take(4).collect();
    format!("{prefix}...")
}

fn transport(stage: &'static str, e: reqwest::Error) -> RecognitionError {
    RecognitionError::Transport {
        stage,
        detail: e.to_string(),
    }
}

async fn parse_json<T: serde::de::DeserializeOwned>(
    stage: &'static str,
    response: reqwest::Response,
) -> Result<T, RecognitionError> {
    let status = response.status();
    let body = response.text().await.map_err(|e| transport(stage, e))?;
    check_status(stage, status.as_u16(), &body)?;
    serde_json::from_str(&body).map_err(|e| RecognitionError::Decode {
        stage,
        detail: e.to_string(),
    })
}

fn check_status(stage: &'static str, status: u16, body: &str) -> Result<(), RecognitionError> {
    match status {
        200..=299 => Ok(()),
        401 | 403 => Err(RecognitionError::Auth { stage, status }),
        _ => Err(RecognitionError::Api {
            stage,
            status,
            body: truncate(body, 500),
        }),
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let mut t: String = s.chars().take(max_chars).collect();
        t.push('\u{2026}');
        t
    }
}
