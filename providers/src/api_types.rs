//! Typed Gemini REST payloads.
//!
//! Only the fields the client reads are modeled; everything else is ignored.

pub mod gemini {
    use serde::Deserialize;

    /// `GET /models` page.
    #[derive(Debug, Deserialize, Default)]
    #[serde(rename_all = "camelCase")]
    pub struct ListModelsResponse {
        #[serde(default)]
        pub models: Vec<Model>,
        pub next_page_token: Option<String>,
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Model {
        pub name: String,
        #[serde(default)]
        pub supported_generation_methods: Vec<String>,
    }

    /// Token usage data returned by Gemini API.
    #[derive(Debug, Deserialize, Default)]
    #[serde(rename_all = "camelCase")]
    pub struct UsageMetadata {
        pub total_token_count: Option<u64>,
    }

    /// `POST /{model}:generateContent` response.
    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct GenerateContentResponse {
        pub candidates: Option<Vec<Candidate>>,
        pub usage_metadata: Option<UsageMetadata>,
        pub prompt_feedback: Option<PromptFeedback>,
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Candidate {
        pub content: Option<Content>,
        pub finish_reason: Option<String>,
    }

    #[derive(Debug, Deserialize)]
    pub struct Content {
        pub parts: Option<Vec<Part>>,
    }

    #[derive(Debug, Deserialize)]
    pub struct Part {
        pub text: Option<String>,
        /// Reasoning parts are not part of the answer.
        #[serde(default)]
        pub thought: bool,
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct PromptFeedback {
        pub block_reason: Option<String>,
    }

    impl GenerateContentResponse {
        /// Concatenated answer text of the first candidate, if any.
        #[must_use]
        pub fn text(&self) -> Option<String> {
            let parts = self
                .candidates
                .as_ref()?
                .first()?
                .content
                .as_ref()?
                .parts
                .as_ref()?;
            let text: String = parts
                .iter()
                .filter(|part| !part.thought)
                .filter_map(|part| part.text.as_deref())
                .collect();
            if text.is_empty() { None } else { Some(text) }
        }

        /// Why no text was produced: candidate finish reason or prompt block reason.
        #[must_use]
        pub fn stop_reason(&self) -> Option<String> {
            self.candidates
                .as_ref()
                .and_then(|c| c.first())
                .and_then(|c| c.finish_reason.clone())
                .or_else(|| {
                    self.prompt_feedback
                        .as_ref()
                        .and_then(|f| f.block_reason.clone())
                })
        }

        #[must_use]
        pub fn total_tokens(&self) -> Option<u64> {
            self.usage_metadata.as_ref()?.total_token_count
        }
    }
}
