//! Embedded LanceDB backend.
//!
//! One table per collection. The table is created on first write, once the
//! embedding dimension is known; until then the collection reads as empty.
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{connect, Connection, DistanceType};
use arrow_array::cast::AsArray;
use arrow_array::types::Float32Type;
use arrow_array::{Array, FixedSizeListArray, RecordBatch, RecordBatchIterator, StringArray};
use std::sync::Arc;
use tracing::{debug, info};

use docchat_core::error::{Error, Result};
use docchat_core::traits::{Collection, VectorStore};
use docchat_core::types::{CollectionRecord, Metadata};

use crate::schema::{build_records_schema, vector_dim};

pub struct LanceStore {
    db: Connection,
}

impl LanceStore {
    pub async fn open(uri: &str) -> Result<Self> {
        let db = connect(uri).execute().await.map_err(|e| Error::Connection { service: format!("lancedb at {uri}"), message: e.to_string() })?;
        info!(%uri, "opened LanceDB");
        Ok(Self { db })
    }
}

#[async_trait]
impl VectorStore for LanceStore {
    fn backend(&self) -> &str { "lance" }

    async fn get_or_create_collection(&self, name: &str) -> Result<Arc<dyn Collection>> {
        validate_table_name(name)?;
        Ok(Arc::new(LanceCollection { db: self.db.clone(), name: name.to_string() }))
    }
}

/// Lance table names end up as directory names.
fn validate_table_name(name: &str) -> Result<()> {
    let ok = !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if ok { Ok(()) } else { Err(Error::config("collection.name", format!("'{name}' is not a valid table name"))) }
}

pub struct LanceCollection {
    db: Connection,
    name: String,
}

impl LanceCollection {
    async fn table_exists(&self) -> std::result::Result<bool, lancedb::Error> {
        Ok(self.db.table_names().execute().await?.contains(&self.name))
    }

    fn store_error(&self, e: impl std::fmt::Display) -> Error {
        Error::Store { collection: self.name.clone(), message: e.to_string() }
    }

    fn retrieval_error(&self, e: impl std::fmt::Display) -> Error {
        Error::Retrieval { collection: self.name.clone(), message: e.to_string() }
    }

    async fn insert_batch(&self, batch: RecordBatch) -> std::result::Result<(), lancedb::Error> {
        let schema = batch.schema();
        let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema));
        if self.table_exists().await? {
            self.db.open_table(&self.name).execute().await?.add(reader).execute().await?;
        } else {
            self.db.create_table(&self.name, reader).execute().await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Collection for LanceCollection {
    fn name(&self) -> &str { &self.name }

    async fn add_records(&self, records: Vec<CollectionRecord>) -> Result<()> {
        let Some(first) = records.first() else { return Ok(()) };
        let dim = first.embedding.len();
        if let Some(v) = records.iter().find(|r| r.embedding.len() != dim) {
            return Err(Error::DimensionMismatch { expected: dim, actual: v.embedding.len() });
        }
        if self.table_exists().await.map_err(|e| self.store_error(e))? {
            let table = self.db.open_table(&self.name).execute().await.map_err(|e| self.store_error(e))?;
            let schema = table.schema().await.map_err(|e| self.store_error(e))?;
            if let Some(expected) = vector_dim(&schema) {
                if expected != dim {
                    return Err(Error::DimensionMismatch { expected, actual: dim });
                }
            }
        }
        let count = records.len();
        let batch = records_to_batch(&records).map_err(|e| self.store_error(e))?;
        self.insert_batch(batch).await.map_err(|e| self.store_error(e))?;
        debug!(collection = %self.name, count, "appended records");
        Ok(())
    }

    async fn count(&self) -> Result<usize> {
        if !self.table_exists().await.map_err(|e| self.retrieval_error(e))? {
            return Ok(0);
        }
        let table = self.db.open_table(&self.name).execute().await.map_err(|e| self.retrieval_error(e))?;
        table.count_rows(None).await.map_err(|e| self.retrieval_error(e))
    }

    async fn nearest(&self, query: &[f32], n: usize) -> Result<Vec<CollectionRecord>> {
        if n == 0 || !self.table_exists().await.map_err(|e| self.retrieval_error(e))? {
            return Ok(vec![]);
        }
        let table = self.db.open_table(&self.name).execute().await.map_err(|e| self.retrieval_error(e))?;
        let schema = table.schema().await.map_err(|e| self.retrieval_error(e))?;
        if let Some(expected) = vector_dim(&schema) {
            if expected != query.len() {
                return Err(Error::DimensionMismatch { expected, actual: query.len() });
            }
        }
        let mut stream = table
            .vector_search(query.to_vec())
            .map_err(|e| self.retrieval_error(e))?
            .distance_type(DistanceType::Cosine)
            .limit(n)
            .execute()
            .await
            .map_err(|e| self.retrieval_error(e))?;

        let mut out = Vec::new();
        while let Some(batch) = stream.try_next().await.map_err(|e| self.retrieval_error(e))? {
            out.extend(batch_to_records(&batch).map_err(|e| self.retrieval_error(e))?);
        }
        out.truncate(n);
        Ok(out)
    }
}

fn records_to_batch(records: &[CollectionRecord]) -> std::result::Result<RecordBatch, String> {
    let dim = records.first().map(|r| r.embedding.len()).unwrap_or_default();
    let dim = i32::try_from(dim).map_err(|_| format!("dimension {dim} too large"))?;
    let schema = build_records_schema(dim);
    let mut ids = Vec::new(); let mut sources = Vec::new(); let mut texts = Vec::new(); let mut metas = Vec::new();
    let mut vectors: Vec<Option<Vec<Option<f32>>>> = Vec::new();
    for r in records {
        ids.push(r.id.clone());
        sources.push(r.metadata.get("source").cloned().unwrap_or_default());
        texts.push(r.text.clone());
        metas.push(serde_json::to_string(&r.metadata).map_err(|e| e.to_string())?);
        vectors.push(Some(r.embedding.iter().map(|&x| Some(x)).collect()));
    }
    RecordBatch::try_new(schema, vec![
        Arc::new(StringArray::from(ids)),
        Arc::new(StringArray::from(sources)),
        Arc::new(StringArray::from(texts)),
        Arc::new(StringArray::from(metas)),
        Arc::new(FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(vectors.into_iter(), dim)),
    ])
    .map_err(|e| e.to_string())
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> std::result::Result<&'a StringArray, String> {
    batch.column_by_name(name).and_then(|c| c.as_any().downcast_ref::<StringArray>()).ok_or_else(|| format!("{name} column missing"))
}

fn batch_to_records(batch: &RecordBatch) -> std::result::Result<Vec<CollectionRecord>, String> {
    let ids = string_column(batch, "id")?;
    let texts = string_column(batch, "text")?;
    let metas = string_column(batch, "metadata")?;
    let vectors = batch
        .column_by_name("vector")
        .and_then(|c| c.as_any().downcast_ref::<FixedSizeListArray>())
        .ok_or_else(|| "vector column missing".to_string())?;
    let mut out = Vec::with_capacity(batch.num_rows());
    for i in 0..batch.num_rows() {
        let metadata: Metadata = serde_json::from_str(metas.value(i)).map_err(|e| format!("bad metadata for {}: {e}", ids.value(i)))?;
        let embedding = vectors.value(i).as_primitive::<Float32Type>().values().to_vec();
        out.push(CollectionRecord { id: ids.value(i).to_string(), embedding, text: texts.value(i).to_string(), metadata });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, embedding: Vec<f32>) -> CollectionRecord {
        let mut metadata = Metadata::new();
        metadata.insert("source".into(), format!("data/{id}.txt"));
        CollectionRecord { id: id.into(), embedding, text: format!("text of {id}"), metadata }
    }

    #[test]
    fn batch_conversion_keeps_every_field() {
        let records = vec![record("a", vec![1.0, 0.0, 0.5]), record("b", vec![0.0, 1.0, 0.25])];
        let batch = records_to_batch(&records).expect("batch");
        assert_eq!(batch.num_rows(), 2);
        assert_eq!(vector_dim(&batch.schema()), Some(3));
        let back = batch_to_records(&batch).expect("records");
        assert_eq!(back, records);
    }

    #[test]
    fn rejects_path_like_table_names() {
        assert!(validate_table_name("my-rag-collection").is_ok());
        assert!(validate_table_name("../escape").is_err());
        assert!(validate_table_name("").is_err());
    }
}
