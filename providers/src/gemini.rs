use serde_json::{Value, json};

use crate::api_types::gemini as typed;
use crate::{
    GEMINI_API_BASE_URL, GenerateRequest, Generation, GenerativeService, ServiceError,
    build_http_client, extract_error_message, read_capped_error_body,
};
use refine_types::{ApiKey, RemoteModel};

/// Page size requested from the listing endpoint (the API maximum).
const LIST_PAGE_SIZE: u32 = 1000;
/// Upper bound on followed `nextPageToken`s; guards against a server that never stops paging.
const MAX_LIST_PAGES: usize = 20;

/// Gemini REST client.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
}

impl GeminiClient {
    /// Client against the public Gemini endpoint.
    pub fn new() -> Result<Self, ServiceError> {
        Self::with_base_url(GEMINI_API_BASE_URL)
    }

    /// Client against an alternate endpoint (proxies, test servers).
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, ServiceError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let https_only = base_url.starts_with("https://");
        let http = build_http_client(https_only)?;
        Ok(Self { http, base_url })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn generate_url(&self, model_id: &str) -> String {
        if model_id.contains('/') {
            format!("{}/{model_id}:generateContent", self.base_url)
        } else {
            format!("{}/models/{model_id}:generateContent", self.base_url)
        }
    }

    async fn fetch_page(
        &self,
        key: &ApiKey,
        page_token: Option<&str>,
    ) -> Result<typed::ListModelsResponse, ServiceError> {
        let mut url = reqwest::Url::parse(&format!("{}/models", self.base_url))
            .map_err(|e| ServiceError::Decode(format!("invalid base URL: {e}")))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("pageSize", &LIST_PAGE_SIZE.to_string());
            if let Some(token) = page_token {
                query.append_pair("pageToken", token);
            }
        }

        let response = self
            .http
            .get(url)
            .header("x-goog-api-key", key.as_str())
            .send()
            .await?;
        let response = ensure_success(response).await?;
        response
            .json::<typed::ListModelsResponse>()
            .await
            .map_err(|e| ServiceError::Decode(format!("model listing: {e}")))
    }
}

async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ServiceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = read_capped_error_body(response).await;
    Err(ServiceError::Api {
        status: status.as_u16(),
        message: extract_error_message(&body),
    })
}

/// Build the `generateContent` request body.
///
/// Note: Gemini API uses mixed casing:
/// - `system_instruction` (snake_case)
/// - `generationConfig` (camelCase)
pub(crate) fn build_request_body(request: &GenerateRequest) -> Value {
    // Round to the slider grid so 0.7f32 is not sent as 0.699999988.
    let temperature = (f64::from(request.temperature.value()) * 100.0).round() / 100.0;

    let mut body = serde_json::Map::new();
    if !request.system_instruction.trim().is_empty() {
        body.insert(
            "system_instruction".into(),
            json!({ "parts": [{ "text": request.system_instruction }] }),
        );
    }
    body.insert(
        "contents".into(),
        json!([{ "role": "user", "parts": [{ "text": request.user_text }] }]),
    );
    body.insert(
        "generationConfig".into(),
        json!({ "temperature": temperature }),
    );
    Value::Object(body)
}

fn into_generation(response: typed::GenerateContentResponse) -> Result<Generation, ServiceError> {
    match response.text() {
        Some(text) => Ok(Generation {
            text,
            total_tokens: response.total_tokens(),
        }),
        None => Err(ServiceError::EmptyResponse {
            finish_reason: response.stop_reason(),
        }),
    }
}

impl GenerativeService for GeminiClient {
    async fn list_models(&self, key: &ApiKey) -> Result<Vec<RemoteModel>, ServiceError> {
        let mut models = Vec::new();
        let mut page_token: Option<String> = None;

        for _ in 0..MAX_LIST_PAGES {
            let page = self.fetch_page(key, page_token.as_deref()).await?;
            models.extend(page.models.into_iter().map(|m| RemoteModel {
                name: m.name,
                supported_generation_methods: m.supported_generation_methods,
            }));
            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        tracing::debug!(count = models.len(), "Fetched Gemini model listing");
        Ok(models)
    }

    async fn generate(
        &self,
        key: &ApiKey,
        request: &GenerateRequest,
    ) -> Result<Generation, ServiceError> {
        let url = self.generate_url(&request.model_id);
        let body = build_request_body(request);

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", key.as_str())
            .json(&body)
            .send()
            .await?;
        let response = ensure_success(response).await?;
        let parsed = response
            .json::<typed::GenerateContentResponse>()
            .await
            .map_err(|e| ServiceError::Decode(format!("generateContent: {e}")))?;
        into_generation(parsed)
    }
}
