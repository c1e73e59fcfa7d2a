use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use tracing::{info, warn};

use docchat_core::error::{Error, Result};
use docchat_core::loader::DirectoryLoader;
use docchat_core::remote::CallGuard;
use docchat_core::similarity::check_dimensions;
use docchat_core::traits::{Embedder, VectorStore};
use docchat_core::types::{CollectionRecord, Embedding};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub collection: String,
    pub documents: usize,
}

/// Load a directory, embed every document and append the lot to one collection.
///
/// Nothing is written unless every file loads and every document embeds.
pub struct IngestionPipeline {
    collection: String,
    loader: DirectoryLoader,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    guard: CallGuard,
    batch_size: usize,
    show_progress: bool,
}

impl IngestionPipeline {
    pub fn new(collection: impl Into<String>, loader: DirectoryLoader, embedder: Arc<dyn Embedder>, store: Arc<dyn VectorStore>, guard: CallGuard) -> Self {
        Self { collection: collection.into(), loader, embedder, store, guard, batch_size: 100, show_progress: false }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn collection(&self) -> &str { &self.collection }

    pub async fn run(&self) -> Result<IngestReport> {
        let documents = self.loader.load()?;
        if documents.is_empty() {
            warn!(dir = %self.loader.root().display(), pattern = %self.loader.pattern(), "nothing to ingest");
            return Err(Error::EmptyCorpus { dir: self.loader.root().to_path_buf(), pattern: self.loader.pattern().to_string() });
        }
        info!("Embedding {} documents with {}", documents.len(), self.embedder.embedder_id());

        let texts: Vec<String> = documents.iter().map(|d| d.text.clone()).collect();
        let embeddings = self.embed_all(&texts).await?;

        let count = documents.len();
        let records: Vec<CollectionRecord> = documents.into_iter().zip(embeddings).map(|(doc, e)| CollectionRecord::from_document(doc, e)).collect();
        let collection = self.guard.run("open collection", self.store.get_or_create_collection(&self.collection)).await?;
        self.guard.run("add records", collection.add_records(records)).await?;
        info!(collection = %self.collection, documents = count, "ingestion complete");
        Ok(IngestReport { collection: self.collection.clone(), documents: count })
    }

    async fn embed_all(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        let pb = self.progress_bar(texts.len());
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            let vectors = self.guard.run("embed documents", self.embedder.embed_batch(batch)).await?;
            if vectors.len() != batch.len() {
                pb.abandon();
                return Err(Error::Provider {
                    provider: self.embedder.embedder_id().to_string(),
                    status: None,
                    message: format!("returned {} embeddings for {} documents", vectors.len(), batch.len()),
                });
            }
            out.extend(vectors);
            pb.inc(batch.len() as u64);
        }
        pb.finish_with_message("embedded");
        check_dimensions(&out, self.embedder.dim())?;
        Ok(out)
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(len as u64);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} documents ({percent}%) {msg}")
            .map(|s| s.progress_chars("#>-"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        pb.set_style(style);
        pb
    }
}
