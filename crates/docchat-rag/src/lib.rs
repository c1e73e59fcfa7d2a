//! docchat-rag
//!
//! The retrieval-augmented chat pipeline: ingestion, MMR retrieval, grounded
//! generation and the interactive session, plus the bootstrap that wires the
//! external services together.

#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

pub mod bootstrap;
pub mod generate;
pub mod ingest;
pub mod llm;
pub mod mmr;
pub mod retriever;
pub mod session;

pub use bootstrap::{AppHandles, RemoteServices, ServiceFactory};
pub use generate::{build_context, GenerationOrchestrator};
pub use ingest::{IngestReport, IngestionPipeline};
pub use llm::GeminiChatModel;
pub use retriever::{Retriever, RetrieverConfig};
pub use session::{is_exit_keyword, ChatSession, SessionState, SessionSummary};
