//! Process-local store for tests and offline runs. Nothing is persisted.

use async_trait::async_trait;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use docchat_core::error::{Error, Result};
use docchat_core::similarity::cosine_similarity;
use docchat_core::traits::{Collection, VectorStore};
use docchat_core::types::CollectionRecord;

#[derive(Default)]
pub struct MemoryStore {
    collections: Mutex<HashMap<String, Arc<MemoryCollection>>>,
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }
}

#[async_trait]
impl VectorStore for MemoryStore {
    fn backend(&self) -> &str { "memory" }

    async fn get_or_create_collection(&self, name: &str) -> Result<Arc<dyn Collection>> {
        let mut collections = lock(&self.collections);
        let collection = collections.entry(name.to_string()).or_insert_with(|| Arc::new(MemoryCollection::new(name)));
        Ok(collection.clone())
    }
}

pub struct MemoryCollection {
    name: String,
    records: Mutex<Vec<CollectionRecord>>,
}

impl MemoryCollection {
    pub fn new(name: &str) -> Self { Self { name: name.to_string(), records: Mutex::new(Vec::new()) } }

    fn dim(records: &[CollectionRecord]) -> Option<usize> { records.first().map(|r| r.embedding.len()) }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl Collection for MemoryCollection {
    fn name(&self) -> &str { &self.name }

    async fn add_records(&self, records: Vec<CollectionRecord>) -> Result<()> {
        let mut stored = lock(&self.records);
        let expected = Self::dim(&stored).or_else(|| Self::dim(&records));
        if let Some(expected) = expected {
            if let Some(bad) = records.iter().find(|r| r.embedding.len() != expected) {
                return Err(Error::DimensionMismatch { expected, actual: bad.embedding.len() });
            }
        }
        stored.extend(records);
        Ok(())
    }

    async fn count(&self) -> Result<usize> { Ok(lock(&self.records).len()) }

    async fn nearest(&self, query: &[f32], n: usize) -> Result<Vec<CollectionRecord>> {
        let stored = lock(&self.records);
        if let Some(expected) = Self::dim(&stored) {
            if expected != query.len() {
                return Err(Error::DimensionMismatch { expected, actual: query.len() });
            }
        }
        let mut scored: Vec<(f32, &CollectionRecord)> = stored.iter().map(|r| (cosine_similarity(query, &r.embedding), r)).collect();
        // Stable: equal scores keep insertion order.
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));
        Ok(scored.into_iter().take(n).map(|(_, r)| r.clone()).collect())
    }
}
