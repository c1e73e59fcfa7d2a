#![allow(dead_code)]

use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use docchat_core::config::{Credentials, Settings, StoreBackend};
use docchat_core::error::{Error, Result};
use docchat_core::traits::{Collection, Embedder, LanguageModel, VectorStore};
use docchat_core::types::Embedding;
use docchat_embed::FakeEmbedder;
use docchat_rag::ServiceFactory;
use docchat_vector::MemoryStore;

/// Deterministic embedder that counts calls and can be told to fail.
pub struct CountingEmbedder {
    inner: FakeEmbedder,
    pub calls: AtomicUsize,
    pub fail: bool,
}

impl CountingEmbedder {
    pub fn new() -> Self { Self { inner: FakeEmbedder::new(256), calls: AtomicUsize::new(0), fail: false } }
    pub fn failing() -> Self { Self { fail: true, ..Self::new() } }
    pub fn calls(&self) -> usize { self.calls.load(Ordering::SeqCst) }

    fn hit(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(Error::Provider { provider: "counting".into(), status: Some(503), message: "unavailable".into() });
        }
        Ok(())
    }
}

#[async_trait]
impl Embedder for CountingEmbedder {
    fn embedder_id(&self) -> &str { "counting" }
    fn dim(&self) -> Option<usize> { self.inner.dim() }

    async fn embed(&self, text: &str) -> Result<Embedding> {
        self.hit()?;
        self.inner.embed(text).await
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        self.hit()?;
        self.inner.embed_batch(texts).await
    }
}

/// Records every prompt and answers with a fixed string.
pub struct StubModel {
    pub prompts: Mutex<Vec<String>>,
    pub answer: String,
    pub fail: bool,
}

impl StubModel {
    pub fn new(answer: &str) -> Self { Self { prompts: Mutex::new(vec![]), answer: answer.into(), fail: false } }
    pub fn failing() -> Self { Self { fail: true, ..Self::new("") } }
    pub fn calls(&self) -> usize { self.prompts.lock().unwrap().len() }
    pub fn last_prompt(&self) -> Option<String> { self.prompts.lock().unwrap().last().cloned() }
}

#[async_trait]
impl LanguageModel for StubModel {
    fn model_id(&self) -> &str { "stub" }

    async fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if self.fail {
            return Err(Error::Generation { model: "stub".into(), status: Some(500), message: "model overloaded".into() });
        }
        Ok(self.answer.clone())
    }
}

/// Memory store that counts collection lookups.
#[derive(Default)]
pub struct CountingStore {
    inner: MemoryStore,
    pub opens: AtomicUsize,
}

impl CountingStore {
    pub fn opens(&self) -> usize { self.opens.load(Ordering::SeqCst) }
}

#[async_trait]
impl VectorStore for CountingStore {
    fn backend(&self) -> &str { "counting" }

    async fn get_or_create_collection(&self, name: &str) -> Result<Arc<dyn Collection>> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        self.inner.get_or_create_collection(name).await
    }
}

/// Factory handing out shared mocks and counting how often it is asked.
pub struct CountingFactory {
    pub embedder: Arc<CountingEmbedder>,
    pub store: Arc<CountingStore>,
    pub model: Arc<StubModel>,
    pub calls: AtomicUsize,
}

impl CountingFactory {
    pub fn new(answer: &str) -> Self {
        Self { embedder: Arc::new(CountingEmbedder::new()), store: Arc::new(CountingStore::default()), model: Arc::new(StubModel::new(answer)), calls: AtomicUsize::new(0) }
    }
    pub fn calls(&self) -> usize { self.calls.load(Ordering::SeqCst) }
}

#[async_trait]
impl ServiceFactory for CountingFactory {
    fn embedder(&self, _: &Settings, _: &Credentials) -> Result<Arc<dyn Embedder>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.embedder.clone())
    }

    async fn store(&self, _: &Settings, _: &Credentials) -> Result<Arc<dyn VectorStore>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.store.clone())
    }

    fn language_model(&self, _: &Settings, _: &Credentials) -> Result<Arc<dyn LanguageModel>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.model.clone())
    }
}

pub fn settings_for(corpus: &Path, backend: StoreBackend) -> Settings {
    let mut settings = Settings::default();
    settings.corpus.dir = corpus.to_string_lossy().to_string();
    settings.store.backend = backend;
    settings
}

/// Every credential present.
pub fn full_env(key: &str) -> Option<String> {
    Some(format!("test-{}", key.to_lowercase()))
}

pub fn write(dir: &Path, name: &str, text: &str) {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, text).unwrap();
}
