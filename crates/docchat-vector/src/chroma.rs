//! Chroma (Cloud or self-hosted) over its v2 REST API.
//!
//! - Handshake: `GET /api/v2/auth/identity`
//! - Collections: `POST /api/v2/tenants/{tenant}/databases/{db}/collections` with `get_or_create`
//! - Records: `.../collections/{id}/add`, `/count`, `/query`
//! - Auth: `x-chroma-token: {api_key}`

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use docchat_core::config::ChromaCredentials;
use docchat_core::error::{Error, Result};
use docchat_core::traits::{Collection, VectorStore};
use docchat_core::types::{CollectionRecord, Metadata};

const SERVICE: &str = "chroma";

#[derive(Clone)]
pub struct ChromaStore {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    tenant: String,
    database: String,
}

#[derive(Debug, Deserialize)]
struct Identity {
    #[serde(default)]
    tenant: Option<String>,
    #[serde(default)]
    databases: Vec<String>,
}

#[derive(Debug, Serialize)]
struct CreateCollection<'a> {
    name: &'a str,
    get_or_create: bool,
    metadata: Value,
}

#[derive(Debug, Deserialize)]
struct CollectionModel {
    id: String,
    name: String,
}

#[derive(Debug, Serialize)]
struct AddRequest {
    ids: Vec<String>,
    embeddings: Vec<Vec<f32>>,
    documents: Vec<String>,
    metadatas: Vec<Metadata>,
}

#[derive(Debug, Serialize)]
struct QueryRequest<'a> {
    query_embeddings: Vec<&'a [f32]>,
    n_results: usize,
    include: [&'static str; 4],
}

#[derive(Debug, Default, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    ids: Vec<Vec<String>>,
    #[serde(default)]
    documents: Option<Vec<Vec<Option<String>>>>,
    #[serde(default)]
    metadatas: Option<Vec<Vec<Option<serde_json::Map<String, Value>>>>>,
    #[serde(default)]
    embeddings: Option<Vec<Vec<Vec<f32>>>>,
}

/// Status and message of a failed call, before it is mapped to a component error.
#[derive(Debug)]
struct Failure {
    status: Option<u16>,
    message: String,
}

impl std::fmt::Display for Failure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status {
            Some(s) => write!(f, "HTTP {s}: {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl ChromaStore {
    /// Authenticate and check the tenant/database before anything else happens.
    pub async fn connect(base_url: &str, credentials: &ChromaCredentials, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build().map_err(|e| Error::config("http_client", e.to_string()))?;
        let store = Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: credentials.api_key.clone(),
            tenant: credentials.tenant.clone(),
            database: credentials.database.clone(),
        };
        let identity: Identity = store.send(store.http.get(store.url("auth/identity"))).await.map_err(connection_error)?;
        if let Some(tenant) = identity.tenant.as_deref() {
            if tenant != store.tenant {
                return Err(connection_error(Failure { status: None, message: format!("token belongs to tenant '{tenant}', not '{}'", store.tenant) }));
            }
        }
        if !identity.databases.is_empty() && !identity.databases.iter().any(|d| d == &store.database || d == "*") {
            return Err(connection_error(Failure { status: None, message: format!("token has no access to database '{}'", store.database) }));
        }
        info!(url = %store.base_url, tenant = %store.tenant, database = %store.database, "connected to Chroma");
        Ok(store)
    }

    fn url(&self, path: &str) -> String { format!("{}/api/v2/{}", self.base_url, path) }

    fn collections_url(&self) -> String {
        self.url(&format!("tenants/{}/databases/{}/collections", self.tenant, self.database))
    }

    async fn send<R: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> std::result::Result<R, Failure> {
        let response = request
            .header("x-chroma-token", &self.api_key)
            .send()
            .await
            .map_err(|e| Failure { status: None, message: e.to_string() })?;
        let status = response.status();
        let text = response.text().await.map_err(|e| Failure { status: Some(status.as_u16()), message: e.to_string() })?;
        if !status.is_success() {
            return Err(Failure { status: Some(status.as_u16()), message: error_message(status.as_u16(), &text) });
        }
        let text = if text.trim().is_empty() { "null" } else { text.as_str() };
        serde_json::from_str(text).map_err(|e| Failure { status: Some(status.as_u16()), message: format!("unexpected response: {e}") })
    }
}

fn connection_error(f: Failure) -> Error {
    Error::Connection { service: SERVICE.to_string(), message: f.to_string() }
}

/// Chroma errors look like `{"error": "...", "message": "..."}`.
fn error_message(status: u16, body: &str) -> String {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let message = parsed
        .as_ref()
        .and_then(|v| v.get("message").or_else(|| v.get("error")))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| body.trim().to_string());
    match status {
        401 | 403 => format!("authentication rejected: {message}"),
        _ => message,
    }
}

#[async_trait]
impl VectorStore for ChromaStore {
    fn backend(&self) -> &str { SERVICE }

    async fn get_or_create_collection(&self, name: &str) -> Result<Arc<dyn Collection>> {
        let body = CreateCollection { name, get_or_create: true, metadata: serde_json::json!({ "hnsw:space": "cosine" }) };
        let model: CollectionModel = self.send(self.http.post(self.collections_url()).json(&body)).await.map_err(connection_error)?;
        debug!(id = %model.id, name = %model.name, "resolved collection");
        Ok(Arc::new(ChromaCollection { store: self.clone(), id: model.id, name: model.name }))
    }
}

pub struct ChromaCollection {
    store: ChromaStore,
    id: String,
    name: String,
}

impl ChromaCollection {
    fn url(&self, op: &str) -> String { format!("{}/{}/{}", self.store.collections_url(), self.id, op) }

    fn retrieval_error(&self, f: Failure) -> Error {
        Error::Retrieval { collection: self.name.clone(), message: f.to_string() }
    }
}

#[async_trait]
impl Collection for ChromaCollection {
    fn name(&self) -> &str { &self.name }

    async fn add_records(&self, records: Vec<CollectionRecord>) -> Result<()> {
        if records.is_empty() { return Ok(()); }
        let mut body = AddRequest { ids: vec![], embeddings: vec![], documents: vec![], metadatas: vec![] };
        for r in records {
            body.ids.push(r.id);
            body.embeddings.push(r.embedding);
            body.documents.push(r.text);
            body.metadatas.push(r.metadata);
        }
        let _: Value = self
            .store
            .send(self.store.http.post(self.url("add")).json(&body))
            .await
            .map_err(|f| Error::Store { collection: self.name.clone(), message: f.to_string() })?;
        Ok(())
    }

    async fn count(&self) -> Result<usize> {
        self.store.send(self.store.http.get(self.url("count"))).await.map_err(|f| self.retrieval_error(f))
    }

    async fn nearest(&self, query: &[f32], n: usize) -> Result<Vec<CollectionRecord>> {
        // Chroma rejects n_results larger than the collection.
        let n = n.min(self.count().await?);
        if n == 0 { return Ok(vec![]); }
        let body = QueryRequest { query_embeddings: vec![query], n_results: n, include: ["documents", "metadatas", "embeddings", "distances"] };
        let resp: QueryResponse = self
            .store
            .send(self.store.http.post(self.url("query")).json(&body))
            .await
            .map_err(|f| self.retrieval_error(f))?;
        decode_query(resp).map_err(|message| self.retrieval_error(Failure { status: None, message }))
    }
}

/// First (only) query's rows; embeddings are required for MMR.
fn decode_query(resp: QueryResponse) -> std::result::Result<Vec<CollectionRecord>, String> {
    let ids = resp.ids.into_iter().next().unwrap_or_default();
    let documents = resp.documents.and_then(|d| d.into_iter().next()).unwrap_or_default();
    let metadatas = resp.metadatas.and_then(|m| m.into_iter().next()).unwrap_or_default();
    let embeddings = resp.embeddings.and_then(|e| e.into_iter().next()).ok_or_else(|| "response carried no embeddings".to_string())?;
    if embeddings.len() != ids.len() {
        return Err(format!("{} ids but {} embeddings", ids.len(), embeddings.len()));
    }
    let records = ids
        .into_iter()
        .zip(embeddings)
        .enumerate()
        .map(|(i, (id, embedding))| CollectionRecord {
            id,
            embedding,
            text: documents.get(i).cloned().flatten().unwrap_or_default(),
            metadata: metadatas.get(i).cloned().flatten().map(stringify_metadata).unwrap_or_default(),
        })
        .collect();
    Ok(records)
}

fn stringify_metadata(map: serde_json::Map<String, Value>) -> Metadata {
    map.into_iter()
        .map(|(k, v)| {
            let v = match v {
                Value::String(s) => s,
                other => other.to_string(),
            };
            (k, v)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_query_rows_in_order() {
        let body = r#"{
            "ids": [["b", "a"]],
            "documents": [["grass is green", "sky is blue"]],
            "metadatas": [[{"source": "data/b.txt", "page": 2}, null]],
            "embeddings": [[[0.0, 1.0], [1.0, 0.0]]],
            "distances": [[0.1, 0.4]]
        }"#;
        let resp: QueryResponse = serde_json::from_str(body).unwrap();
        let records = decode_query(resp).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, "b");
        assert_eq!(records[0].text, "grass is green");
        assert_eq!(records[0].metadata.get("page").map(String::as_str), Some("2"));
        assert_eq!(records[0].to_document().source_path, std::path::PathBuf::from("data/b.txt"));
        assert!(records[1].metadata.is_empty());
        assert_eq!(records[1].embedding, vec![1.0, 0.0]);
    }

    #[test]
    fn query_without_embeddings_is_an_error() {
        let resp: QueryResponse = serde_json::from_str(r#"{"ids": [["a"]], "documents": [["x"]]}"#).unwrap();
        assert!(decode_query(resp).is_err());
    }

    #[test]
    fn auth_failures_are_labelled() {
        assert_eq!(error_message(401, r#"{"error":"Unauthorized","message":"bad token"}"#), "authentication rejected: bad token");
        assert_eq!(error_message(500, "oops"), "oops");
    }

    #[test]
    fn add_request_uses_chroma_field_names() {
        let mut metadata = Metadata::new();
        metadata.insert("source".into(), "a.txt".into());
        let body = AddRequest { ids: vec!["1".into()], embeddings: vec![vec![0.5]], documents: vec!["t".into()], metadatas: vec![metadata] };
        let v = serde_json::to_value(body).unwrap();
        assert_eq!(v["ids"][0], "1");
        assert_eq!(v["metadatas"][0]["source"], "a.txt");
    }
}
