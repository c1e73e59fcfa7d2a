//! Google Generative Language API transport and the Gemini embedder.
//!
//! - Embeddings: `POST {base}/v1beta/{model}:batchEmbedContents`
//! - Auth: `x-goog-api-key: {api_key}`
//! - Errors: `{ "error": { "code", "message", "status" } }`

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use docchat_core::config::EmbeddingSettings;
use docchat_core::error::{Error, Result};
use docchat_core::similarity::check_dimensions;
use docchat_core::traits::Embedder;
use docchat_core::types::Embedding;

/// Why a Gemini request failed, before it is mapped to a component error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiFailure {
    pub status: Option<u16>,
    pub message: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: Option<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: Option<String>,
    status: Option<String>,
}

/// Thin JSON client shared by the embedder and the chat model.
#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl GeminiClient {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::config("http_client", e.to_string()))?;
        Ok(Self { http, base_url: base_url.trim_end_matches('/').to_string(), api_key: api_key.to_string() })
    }

    pub fn url(&self, path: &str) -> String { format!("{}/v1beta/{}", self.base_url, path) }

    pub async fn post<B, R>(&self, path: &str, body: &B) -> std::result::Result<R, ApiFailure>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = self.url(path);
        debug!(%url, "gemini request");
        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| ApiFailure { status: None, message: transport_message(&e) })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| ApiFailure { status: Some(status.as_u16()), message: format!("failed to read response body: {e}") })?;
        if !status.is_success() {
            return Err(ApiFailure { status: Some(status.as_u16()), message: error_message(status.as_u16(), &text) });
        }
        serde_json::from_str(&text).map_err(|e| ApiFailure { status: Some(status.as_u16()), message: format!("unexpected response: {e}") })
    }
}

fn transport_message(err: &reqwest::Error) -> String {
    if err.is_timeout() { format!("request timed out: {err}") }
    else if err.is_connect() { format!("cannot connect: {err}") }
    else { err.to_string() }
}

/// Best-effort message from an error body; auth failures are called out.
pub fn error_message(status: u16, body: &str) -> String {
    let detail = serde_json::from_str::<ErrorEnvelope>(body).ok().and_then(|e| e.error);
    let message = detail
        .as_ref()
        .and_then(|d| d.message.clone())
        .unwrap_or_else(|| if body.trim().is_empty() { "empty error body".to_string() } else { body.trim().to_string() });
    match status {
        401 | 403 => format!("authentication rejected: {message}"),
        _ => match detail.and_then(|d| d.status) {
            Some(code) => format!("{code}: {message}"),
            None => message,
        },
    }
}

/// Ensure a model name carries the `models/` resource prefix.
pub fn model_path(model: &str) -> String {
    if model.starts_with("models/") { model.to_string() } else { format!("models/{model}") }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedRequest<'a> {
    model: &'a str,
    content: Content<'a>,
    task_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    output_dimensionality: Option<usize>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct BatchEmbedRequest<'a> {
    requests: Vec<EmbedRequest<'a>>,
}

#[derive(Debug, Deserialize)]
struct BatchEmbedResponse {
    #[serde(default)]
    embeddings: Vec<EmbeddingValues>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingValues {
    values: Vec<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TaskType {
    Document,
    Query,
}

impl TaskType {
    fn as_str(self) -> &'static str {
        match self {
            TaskType::Document => "RETRIEVAL_DOCUMENT",
            TaskType::Query => "RETRIEVAL_QUERY",
        }
    }
}

/// Remote embedder backed by `batchEmbedContents`. No retries.
pub struct GeminiEmbedder {
    client: GeminiClient,
    model: String,
    id: String,
    batch_size: usize,
    dimension: Option<usize>,
}

impl GeminiEmbedder {
    pub fn new(settings: &EmbeddingSettings, api_key: &str, timeout: Duration) -> Result<Self> {
        let client = GeminiClient::new(&settings.base_url, api_key, timeout)?;
        let model = model_path(&settings.model);
        let id = match settings.dimension {
            Some(d) => format!("gemini:{model}:d{d}"),
            None => format!("gemini:{model}"),
        };
        Ok(Self { client, model, id, batch_size: settings.batch_size.max(1), dimension: settings.dimension })
    }

    fn build_request<'a>(&'a self, texts: &'a [String], task: TaskType) -> BatchEmbedRequest<'a> {
        let requests = texts
            .iter()
            .map(|t| EmbedRequest {
                model: &self.model,
                content: Content { parts: vec![Part { text: t }] },
                task_type: task.as_str(),
                output_dimensionality: self.dimension,
            })
            .collect();
        BatchEmbedRequest { requests }
    }

    async fn embed_with(&self, texts: &[String], task: TaskType) -> Result<Vec<Embedding>> {
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            let body = self.build_request(batch, task);
            let resp: BatchEmbedResponse = self
                .client
                .post(&format!("{}:batchEmbedContents", self.model), &body)
                .await
                .map_err(|f| self.provider_error(f.status, f.message))?;
            if resp.embeddings.len() != batch.len() {
                return Err(self.provider_error(None, format!("returned {} embeddings for {} inputs", resp.embeddings.len(), batch.len())));
            }
            out.extend(resp.embeddings.into_iter().map(|e| e.values));
        }
        check_dimensions(&out, self.dimension)?;
        Ok(out)
    }

    fn provider_error(&self, status: Option<u16>, message: String) -> Error {
        Error::Provider { provider: self.id.clone(), status, message }
    }
}

#[async_trait]
impl Embedder for GeminiEmbedder {
    fn embedder_id(&self) -> &str { &self.id }
    fn dim(&self) -> Option<usize> { self.dimension }

    async fn embed(&self, text: &str) -> Result<Embedding> {
        let mut v = self.embed_with(&[text.to_string()], TaskType::Query).await?;
        v.pop().ok_or_else(|| self.provider_error(None, "no embedding returned".to_string()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        if texts.is_empty() { return Ok(vec![]); }
        self.embed_with(texts, TaskType::Document).await
    }
}
