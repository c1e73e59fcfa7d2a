//! docchat-vector
//!
//! Vector store backends behind the `VectorStore`/`Collection` traits:
//! - `chroma`: Chroma Cloud or a self-hosted server over HTTP
//! - `lance`: embedded LanceDB directory
//! - `memory`: process-local, for tests and offline runs

use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use docchat_core::config::{expand_path, Credentials, StoreBackend, StoreSettings};
use docchat_core::error::Result;
use docchat_core::traits::VectorStore;

pub mod chroma;
pub mod lance;
pub mod memory;
pub mod schema;

pub use chroma::ChromaStore;
pub use lance::LanceStore;
pub use memory::MemoryStore;

/// Open the configured backend. Chroma authenticates here, so a bad token fails before any work.
pub async fn connect(settings: &StoreSettings, credentials: &Credentials, timeout: Duration) -> Result<Arc<dyn VectorStore>> {
    let store: Arc<dyn VectorStore> = match settings.backend {
        StoreBackend::Chroma => Arc::new(ChromaStore::connect(&settings.chroma_url, credentials.chroma()?, timeout).await?),
        StoreBackend::Lance => {
            let uri = expand_path(&settings.lance_uri);
            Arc::new(LanceStore::open(&uri.to_string_lossy()).await?)
        }
        StoreBackend::Memory => Arc::new(MemoryStore::new()),
    };
    info!(backend = store.backend(), "vector store ready");
    Ok(store)
}
