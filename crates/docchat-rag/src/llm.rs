//! Gemini chat completion: `POST {base}/v1beta/{model}:generateContent`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use docchat_core::config::GenerationSettings;
use docchat_core::error::{Error, Result};
use docchat_core::traits::LanguageModel;
use docchat_embed::gemini::{model_path, GeminiClient};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<TextPart<'a>>,
}

#[derive(Debug, Serialize)]
struct TextPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

/// Single-shot, non-streaming chat model with temperature pinned to 0.
pub struct GeminiChatModel {
    client: GeminiClient,
    model: String,
}

impl GeminiChatModel {
    pub fn new(settings: &GenerationSettings, api_key: &str, timeout: Duration) -> Result<Self> {
        Ok(Self { client: GeminiClient::new(&settings.base_url, api_key, timeout)?, model: model_path(&settings.model) })
    }

    fn request<'a>(prompt: &'a str) -> GenerateRequest<'a> {
        GenerateRequest {
            contents: vec![Content { role: "user", parts: vec![TextPart { text: prompt }] }],
            generation_config: GenerationConfig { temperature: 0.0 },
        }
    }

    fn error(&self, status: Option<u16>, message: String) -> Error {
        Error::Generation { model: self.model.clone(), status, message }
    }
}

/// Text of the first candidate, parts concatenated.
fn answer_text(resp: GenerateResponse) -> std::result::Result<String, String> {
    let Some(candidate) = resp.candidates.into_iter().next() else {
        let reason = resp.prompt_feedback.and_then(|f| f.block_reason).unwrap_or_else(|| "no reason given".to_string());
        return Err(format!("no candidates returned ({reason})"));
    };
    let text: String = candidate.content.map(|c| c.parts.into_iter().filter_map(|p| p.text).collect()).unwrap_or_default();
    if text.is_empty() {
        if let Some(reason) = candidate.finish_reason.filter(|r| r != "STOP") {
            return Err(format!("empty answer (finish reason {reason})"));
        }
    }
    Ok(text)
}

#[async_trait]
impl LanguageModel for GeminiChatModel {
    fn model_id(&self) -> &str { &self.model }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let resp: GenerateResponse = self
            .client
            .post(&format!("{}:generateContent", self.model), &Self::request(prompt))
            .await
            .map_err(|f| self.error(f.status, f.message))?;
        answer_text(resp).map_err(|m| self.error(None, m))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_pins_temperature_to_zero() {
        let body = serde_json::to_value(GeminiChatModel::request("hi")).unwrap();
        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "hi");
        assert_eq!(body["generationConfig"]["temperature"], 0.0);
    }

    #[test]
    fn concatenates_first_candidate_parts() {
        let resp: GenerateResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"The sky "},{"text":"is blue."}]},"finishReason":"STOP"},
                              {"content":{"parts":[{"text":"ignored"}]}}]}"#,
        )
        .unwrap();
        assert_eq!(answer_text(resp).unwrap(), "The sky is blue.");
    }

    #[test]
    fn blocked_prompt_is_an_error() {
        let resp: GenerateResponse = serde_json::from_str(r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#).unwrap();
        let err = answer_text(resp).unwrap_err();
        assert!(err.contains("SAFETY"), "{err}");
    }

    #[test]
    fn empty_answer_after_stop_is_kept_verbatim() {
        let resp: GenerateResponse = serde_json::from_str(r#"{"candidates":[{"content":{"parts":[]},"finishReason":"STOP"}]}"#).unwrap();
        assert_eq!(answer_text(resp).unwrap(), "");
    }
}
