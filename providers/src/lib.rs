//! Remote language-model service client.
//!
//! # Architecture
//!
//! - [`GenerativeService`] - the seam the engine depends on: list models, generate content
//! - [`gemini`] - Google Gemini REST implementation (`models` + `generateContent`)
//! - [`api_types`] - typed wire structs for Gemini responses
//!
//! Calls are plain request/response (no streaming). Every failure is reported as a
//! [`ServiceError`]; callers decide how to surface it.

pub mod api_types;
pub mod gemini;

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

pub use gemini::GeminiClient;
pub use refine_types;
use refine_types::{ApiKey, RemoteModel, Temperature};

/// Canonical Gemini API base URL.
pub const GEMINI_API_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

const CONNECT_TIMEOUT_SECS: u64 = 30;
const REQUEST_TIMEOUT_SECS: u64 = 120;
const TCP_KEEPALIVE_SECS: u64 = 60;
const POOL_IDLE_TIMEOUT_SECS: u64 = 90;

const MAX_ERROR_BODY_BYTES: usize = 32 * 1024;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },
    #[error("invalid response: {0}")]
    Decode(String),
    #[error(
        "response contained no text (finish reason: {})",
        .finish_reason.as_deref().unwrap_or("unknown")
    )]
    EmptyResponse { finish_reason: Option<String> },
}

/// Parameters of one `generate` call.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateRequest {
    pub model_id: String,
    pub system_instruction: String,
    pub user_text: String,
    pub temperature: Temperature,
}

/// Successful generation output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generation {
    pub text: String,
    /// `None` when the service omits usage metadata.
    pub total_tokens: Option<u64>,
}

/// Request/response contract of the remote language-model service.
///
/// Implementations must be cheap to share: the engine holds one behind an `Arc`
/// and calls it from spawned tasks.
pub trait GenerativeService: Send + Sync + 'static {
    fn list_models(
        &self,
        key: &ApiKey,
    ) -> impl Future<Output = Result<Vec<RemoteModel>, ServiceError>> + Send;

    fn generate(
        &self,
        key: &ApiKey,
        request: &GenerateRequest,
    ) -> impl Future<Output = Result<Generation, ServiceError>> + Send;
}

/// Build the shared HTTP client.
///
/// `https_only` is relaxed only for local test servers.
pub fn build_http_client(https_only: bool) -> Result<reqwest::Client, reqwest::Error> {
    use reqwest::header::{HeaderMap, HeaderValue};

    let mut default_headers = HeaderMap::new();
    default_headers.insert(
        reqwest::header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );

    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .redirect(reqwest::redirect::Policy::none())
        .https_only(https_only)
        .tcp_keepalive(Some(Duration::from_secs(TCP_KEEPALIVE_SECS)))
        .pool_idle_timeout(Some(Duration::from_secs(POOL_IDLE_TIMEOUT_SECS)))
        .default_headers(default_headers)
        .build()
}

/// Read an error body without letting a misbehaving server exhaust memory.
pub async fn read_capped_error_body(mut response: reqwest::Response) -> String {
    let mut body = Vec::new();
    while let Ok(Some(chunk)) = response.chunk().await {
        body.extend_from_slice(&chunk);
        if body.len() > MAX_ERROR_BODY_BYTES {
            body.truncate(MAX_ERROR_BODY_BYTES);
            let text = String::from_utf8_lossy(&body);
            return format!("{text}...(truncated)");
        }
    }
    String::from_utf8_lossy(&body).into_owned()
}

/// Pull the human-readable message out of a Google-style error payload.
///
/// Falls back to the trimmed raw body when it is not JSON or has no message.
#[must_use]
pub fn extract_error_message(body: &str) -> String {
    let trimmed = body.trim();
    serde_json::from_str::<serde_json::Value>(trimmed)
        .ok()
        .and_then(|payload| {
            payload
                .pointer("/error/message")
                .or_else(|| payload.pointer("/message"))
                .and_then(serde_json::Value::as_str)
                .map(ToString::to_string)
        })
        .unwrap_or_else(|| trimmed.to_string())
}
