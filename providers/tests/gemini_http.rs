//! Gemini client tests against a local mock server.

use refine_providers::{GeminiClient, GenerateRequest, GenerativeService, ServiceError};
use refine_types::{ApiKey, SYSTEM_INSTRUCTION, Temperature};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn key() -> ApiKey {
    ApiKey::new("AIza-test").unwrap()
}

fn client(server: &MockServer) -> GeminiClient {
    GeminiClient::with_base_url(format!("{}/v1beta", server.uri())).unwrap()
}

#[tokio::test]
async fn list_models_follows_page_tokens() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1beta/models"))
        .and(query_param("pageToken", "page-2"))
        .and(header("x-goog-api-key", "AIza-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "models": [{
                "name": "models/gemini-1.5-flash",
                "supportedGenerationMethods": ["generateContent"]
            }]
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1beta/models"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "models": [
                {
                    "name": "models/gemini-2.0-flash",
                    "supportedGenerationMethods": ["generateContent", "countTokens"]
                },
                {
                    "name": "models/text-embedding-004",
                    "supportedGenerationMethods": ["embedContent"]
                }
            ],
            "nextPageToken": "page-2"
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    let models = client(&server).list_models(&key()).await.unwrap();

    let names: Vec<&str> = models.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(
        names,
        [
            "models/gemini-2.0-flash",
            "models/text-embedding-004",
            "models/gemini-1.5-flash"
        ]
    );
    assert_eq!(
        models[0].supported_generation_methods,
        ["generateContent", "countTokens"]
    );
}

#[tokio::test]
async fn list_models_reports_auth_failure() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1beta/models"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": { "code": 400, "message": "API key not valid.", "status": "INVALID_ARGUMENT" }
        })))
        .mount(&server)
        .await;

    let err = client(&server).list_models(&key()).await.unwrap_err();
    match err {
        ServiceError::Api { status, message } => {
            assert_eq!(status, 400);
            assert_eq!(message, "API key not valid.");
        }
        other => panic!("expected Api error, got {other:?}"),
    }
}

#[tokio::test]
async fn generate_sends_instruction_and_temperature() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-2.0-flash:generateContent"))
        .and(header("x-goog-api-key", "AIza-test"))
        .and(body_partial_json(json!({
            "system_instruction": { "parts": [{ "text": SYSTEM_INSTRUCTION }] },
            "contents": [{ "role": "user", "parts": [{ "text": "write tests" }] }],
            "generationConfig": { "temperature": 0.25 }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{
                "content": { "role": "model", "parts": [{ "text": "Persona: QA engineer" }] },
                "finishReason": "STOP"
            }],
            "usageMetadata": { "promptTokenCount": 30, "candidatesTokenCount": 12, "totalTokenCount": 42 }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let request = GenerateRequest {
        model_id: "models/gemini-2.0-flash".to_string(),
        system_instruction: SYSTEM_INSTRUCTION.to_string(),
        user_text: "write tests".to_string(),
        temperature: Temperature::new(0.25).unwrap(),
    };

    let generation = client(&server).generate(&key(), &request).await.unwrap();
    assert_eq!(generation.text, "Persona: QA engineer");
    assert_eq!(generation.total_tokens, Some(42));
}

#[tokio::test]
async fn generate_surfaces_quota_message() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-2.0-pro:generateContent"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "error": { "code": 429, "message": "quota exceeded", "status": "RESOURCE_EXHAUSTED" }
        })))
        .mount(&server)
        .await;

    let request = GenerateRequest {
        model_id: "models/gemini-2.0-pro".to_string(),
        system_instruction: SYSTEM_INSTRUCTION.to_string(),
        user_text: "x".to_string(),
        temperature: Temperature::DEFAULT,
    };

    let err = client(&server).generate(&key(), &request).await.unwrap_err();
    assert_eq!(err.to_string(), "API error 429: quota exceeded");
}
