//! Domain types shared by ingestion, retrieval and generation.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

pub type RecordId = String;
pub type Embedding = Vec<f32>;
pub type Metadata = BTreeMap<String, String>;

/// One loaded source file. Never split, never mutated after loading.
///
/// - `id`: fresh per load, so re-ingesting a file yields a distinct record
/// - `source_path`: the file the text came from
/// - `metadata`: `source`, `content_hash` and `ingested_at` at minimum
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: RecordId,
    pub source_path: PathBuf,
    pub text: String,
    pub metadata: Metadata,
}

/// What a collection persists for each ingested document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionRecord {
    pub id: RecordId,
    pub embedding: Embedding,
    pub text: String,
    pub metadata: Metadata,
}

impl CollectionRecord {
    pub fn from_document(doc: Document, embedding: Embedding) -> Self {
        Self { id: doc.id, embedding, text: doc.text, metadata: doc.metadata }
    }

    /// Rebuild the document view of a stored record.
    pub fn to_document(&self) -> Document {
        let source_path = self.metadata.get("source").map(PathBuf::from).unwrap_or_default();
        Document { id: self.id.clone(), source_path, text: self.text.clone(), metadata: self.metadata.clone() }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RankedDocument {
    pub document: Document,
    /// 0 is the best match.
    pub rank: usize,
}

/// Retrieved documents in rank order. The order is the contract.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetrievalResult {
    pub entries: Vec<RankedDocument>,
}

impl RetrievalResult {
    pub fn from_documents(docs: Vec<Document>) -> Self {
        let entries = docs.into_iter().enumerate().map(|(rank, document)| RankedDocument { document, rank }).collect();
        Self { entries }
    }

    pub fn len(&self) -> usize { self.entries.len() }
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    pub fn documents(&self) -> impl Iterator<Item = &Document> {
        self.entries.iter().map(|e| &e.document)
    }
}

/// A single question/answer exchange. Not persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatTurn {
    pub query: String,
    pub context: String,
    pub answer: String,
}
