//! Process-wide handles: credentials checked, providers built, store connected.

use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use docchat_core::config::{expand_path, fake_embeddings_requested, Credentials, Requirements, Settings};
use docchat_core::error::{Error, Result};
use docchat_core::loader::DirectoryLoader;
use docchat_core::remote::CallGuard;
use docchat_core::traits::{Embedder, LanguageModel, VectorStore};

use crate::generate::GenerationOrchestrator;
use crate::ingest::IngestionPipeline;
use crate::llm::GeminiChatModel;
use crate::retriever::{Retriever, RetrieverConfig};

/// Builds the external services. Only called after credentials are validated.
#[async_trait]
pub trait ServiceFactory: Send + Sync {
    fn embedder(&self, settings: &Settings, credentials: &Credentials) -> Result<Arc<dyn Embedder>>;
    async fn store(&self, settings: &Settings, credentials: &Credentials) -> Result<Arc<dyn VectorStore>>;
    fn language_model(&self, settings: &Settings, credentials: &Credentials) -> Result<Arc<dyn LanguageModel>>;
}

/// Gemini for embeddings and generation, the configured vector store backend.
pub struct RemoteServices;

#[async_trait]
impl ServiceFactory for RemoteServices {
    fn embedder(&self, settings: &Settings, credentials: &Credentials) -> Result<Arc<dyn Embedder>> {
        docchat_embed::get_default_embedder(&settings.embedding, credentials, settings.remote.timeout())
    }

    async fn store(&self, settings: &Settings, credentials: &Credentials) -> Result<Arc<dyn VectorStore>> {
        docchat_vector::connect(&settings.store, credentials, settings.remote.timeout()).await
    }

    fn language_model(&self, settings: &Settings, credentials: &Credentials) -> Result<Arc<dyn LanguageModel>> {
        Ok(Arc::new(GeminiChatModel::new(&settings.generation, credentials.google()?, settings.remote.timeout())?))
    }
}

/// Everything a command needs, built once. Dropping the handles cancels any call still in flight.
pub struct AppHandles {
    settings: Settings,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    model: Option<Arc<dyn LanguageModel>>,
    guard: CallGuard,
}

impl AppHandles {
    /// `env` resolves credential variables and the fake-embedder flag; a missing
    /// credential fails before the factory is touched.
    pub async fn open<E, F>(mut settings: Settings, needs_generation: bool, env: E, factory: &F) -> Result<Self>
    where
        E: Fn(&str) -> Option<String>,
        F: ServiceFactory + ?Sized,
    {
        settings.validate()?;
        if fake_embeddings_requested(&env) {
            settings.embedding.fake = true;
        }
        let credentials = Credentials::from_lookup(Requirements::for_settings(&settings, needs_generation), &env)?;
        let guard = CallGuard::new(settings.remote.timeout(), CancellationToken::new());

        let embedder = factory.embedder(&settings, &credentials)?;
        let store = guard.run("connect vector store", factory.store(&settings, &credentials)).await?;
        let model = if needs_generation { Some(factory.language_model(&settings, &credentials)?) } else { None };
        info!(embedder = embedder.embedder_id(), backend = store.backend(), collection = %settings.collection.name, "services ready");
        Ok(Self { settings, embedder, store, model, guard })
    }

    pub fn settings(&self) -> &Settings { &self.settings }
    pub fn collection_name(&self) -> &str { &self.settings.collection.name }
    pub fn embedder(&self) -> &Arc<dyn Embedder> { &self.embedder }
    pub fn store(&self) -> &Arc<dyn VectorStore> { &self.store }
    pub fn guard(&self) -> &CallGuard { &self.guard }
    pub fn cancel_token(&self) -> CancellationToken { self.guard.token().clone() }

    pub fn ingestion_pipeline(&self) -> Result<IngestionPipeline> {
        let corpus = &self.settings.corpus;
        let loader = DirectoryLoader::new(expand_path(&corpus.dir), &corpus.pattern)?;
        Ok(IngestionPipeline::new(self.collection_name(), loader, self.embedder.clone(), self.store.clone(), self.guard.clone())
            .with_batch_size(self.settings.embedding.batch_size))
    }

    pub async fn retriever(&self) -> Result<Retriever> {
        let collection = self.guard.run("open collection", self.store.get_or_create_collection(self.collection_name())).await?;
        Ok(Retriever::new(collection, self.embedder.clone(), RetrieverConfig::from(&self.settings.retrieval), self.guard.clone()))
    }

    pub fn generator(&self) -> Result<GenerationOrchestrator> {
        let model = self.model.clone().ok_or_else(|| Error::config("generation", "handles were opened without a language model"))?;
        GenerationOrchestrator::new(self.collection_name(), self.settings.generation.prompt_template.clone(), model, self.guard.clone())
    }

    /// Number of records in the configured collection.
    pub async fn collection_size(&self) -> Result<usize> {
        let collection = self.guard.run("open collection", self.store.get_or_create_collection(self.collection_name())).await?;
        self.guard.run("count records", collection.count()).await
    }

    /// Release the store. Also cancels outstanding calls.
    pub async fn close(&self) -> Result<()> {
        self.guard.token().cancel();
        self.store.close().await
    }
}

impl Drop for AppHandles {
    fn drop(&mut self) {
        if !self.guard.is_cancelled() {
            self.guard.token().cancel();
            warn!("handles dropped without close; outstanding calls cancelled");
        }
    }
}
