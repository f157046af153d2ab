//! OpenAI-compatible chat completions narrator.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{build_context, NarrativeGenerator, SYSTEM_PROMPT};
use crate::config::NarrativeSettings;
use crate::error::{Error, Result};
use crate::model::WorkItem;

/// Calls `POST {base}/v1/chat/completions`.
pub struct OpenAiNarrator {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl OpenAiNarrator {
    #[must_use]
    pub fn new(settings: &NarrativeSettings) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: settings.base_url.clone(),
            api_key: settings.api_key.clone(),
            model: settings.model.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl NarrativeGenerator for OpenAiNarrator {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn generate(&self, question: &str, evidence: &[WorkItem]) -> Result<String> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| Error::Narrative("OPENAI_API_KEY is not configured".into()))?;

        let context = build_context(question, evidence);
        let request = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &context,
                },
            ],
            temperature: 0.2,
        };

        let url = format!("{}/v1/chat/completions", self.base_url);
        debug!(model = %self.model, evidence = evidence.len(), "Requesting narrative");

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Narrative(format!("Narrative request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Narrative(format!(
                "Narrative service returned {status}: {}",
                body.chars().take(200).collect::<String>()
            )));
        }

        let data: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::Narrative(format!("Failed to parse narrative response: {e}")))?;

        data.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or_else(|| Error::Narrative("Narrative service returned no text".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{json, Value};

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn settings(base_url: String, api_key: Option<&str>) -> NarrativeSettings {
        NarrativeSettings {
            base_url,
            api_key: api_key.map(str::to_string),
            ..NarrativeSettings::default()
        }
    }

    #[tokio::test]
    async fn test_sends_chat_request_and_reads_first_choice() {
        let router = Router::new().route(
            "/v1/chat/completions",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["model"], "gpt-4o-mini");
                assert_eq!(body["messages"][0]["role"], "system");
                assert!(body["messages"][1]["content"]
                    .as_str()
                    .unwrap()
                    .contains("Question: why?"));
                Json(json!({"choices": [{"message": {"role": "assistant", "content": "  **Nothing** blocks #1. "}}]}))
            }),
        );
        let narrator = OpenAiNarrator::new(&settings(serve(router).await, Some("sk-test")));
        let text = narrator.generate("why?", &[]).await.unwrap();
        assert_eq!(text, "**Nothing** blocks #1.");
    }

    #[tokio::test]
    async fn test_missing_key_and_empty_answer_are_errors() {
        let narrator = OpenAiNarrator::new(&settings("http://127.0.0.1:9".into(), None));
        assert!(matches!(narrator.generate("q", &[]).await, Err(Error::Narrative(_))));

        let router = Router::new().route(
            "/v1/chat/completions",
            post(|| async { Json(json!({"choices": []})) }),
        );
        let narrator = OpenAiNarrator::new(&settings(serve(router).await, Some("sk-test")));
        assert!(matches!(narrator.generate("q", &[]).await, Err(Error::Narrative(_))));
    }
}
