use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use std::io::BufRead;
use tokio::io::{AsyncWriteExt, BufReader, DuplexStream};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use docchat_core::config::{load_dotenv, Settings};
use docchat_core::error::Error;
use docchat_rag::{AppHandles, ChatSession, RemoteServices};

/// Chat with your documents.
#[derive(Parser)]
#[command(name = "docchat", version)]
#[command(about = "Ingest a folder of documents and ask questions about it")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load, embed and store every matching document
    Ingest(IngestArgs),
    /// Interactive question/answer session
    Chat(QueryArgs),
    /// Answer a single question and exit
    Ask {
        question: String,
        #[command(flatten)]
        query: QueryArgs,
    },
    /// Show the configured backend and collection size
    Status(CollectionArg),
}

#[derive(Args, Debug, Clone, Default)]
struct CollectionArg {
    /// Collection name [default: from config]
    #[arg(long)]
    collection: Option<String>,
}

#[derive(Args, Debug, Clone, Default)]
struct IngestArgs {
    /// Source directory [default: from config]
    #[arg(long)]
    dir: Option<String>,
    /// Glob matched against paths relative to the directory, e.g. "**/*.pdf"
    #[arg(long)]
    pattern: Option<String>,
    #[command(flatten)]
    collection: CollectionArg,
    /// Hide the progress bar
    #[arg(long)]
    no_progress: bool,
}

#[derive(Args, Debug, Clone, Default)]
struct QueryArgs {
    #[command(flatten)]
    collection: CollectionArg,
    /// Number of documents used as context
    #[arg(short = 'k', long)]
    k: Option<usize>,
}

impl CollectionArg {
    fn apply(&self, settings: &mut Settings) {
        if let Some(name) = &self.collection { settings.collection.name = name.clone(); }
    }
}

impl QueryArgs {
    fn apply(&self, settings: &mut Settings) {
        self.collection.apply(settings);
        if let Some(k) = self.k { settings.retrieval.k = k; }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

async fn open(settings: Settings, needs_generation: bool) -> anyhow::Result<AppHandles> {
    let handles = AppHandles::open(settings, needs_generation, |key| std::env::var(key).ok(), &RemoteServices)
        .await
        .context("startup failed")?;
    let token = handles.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, cancelling");
            token.cancel();
        }
        // A second Ctrl-C skips the orderly shutdown.
        if tokio::signal::ctrl_c().await.is_ok() {
            std::process::exit(130);
        }
    });
    Ok(handles)
}

/// Stdin lines fed from a plain thread. Tokio's stdin blocks runtime shutdown
/// until the pending read returns, so a cancelled session would hang on it.
fn stdin_reader() -> BufReader<DuplexStream> {
    let (reader, mut writer) = tokio::io::duplex(64 * 1024);
    let handle = tokio::runtime::Handle::current();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            let mut bytes = line.into_bytes();
            bytes.push(b'\n');
            if handle.block_on(writer.write_all(&bytes)).is_err() {
                break;
            }
        }
    });
    BufReader::new(reader)
}

async fn ingest(mut settings: Settings, args: IngestArgs) -> anyhow::Result<()> {
    if let Some(dir) = args.dir { settings.corpus.dir = dir; }
    if let Some(pattern) = args.pattern { settings.corpus.pattern = pattern; }
    args.collection.apply(&mut settings);

    let handles = open(settings, false).await?;
    let pipeline = handles.ingestion_pipeline()?.with_progress(!args.no_progress);
    match pipeline.run().await {
        Ok(report) => println!("✅ Ingested {} documents into '{}'", report.documents, report.collection),
        Err(e @ Error::EmptyCorpus { .. }) => {
            warn!("{e}");
            println!("No documents found. Nothing was ingested.");
        }
        Err(e) => {
            handles.close().await.ok();
            return Err(e).context("ingestion failed");
        }
    }
    handles.close().await?;
    Ok(())
}

async fn chat(mut settings: Settings, args: QueryArgs) -> anyhow::Result<()> {
    args.apply(&mut settings);
    println!("{}", "-".repeat(60));
    println!("RAG Chatbot - Ask questions about your documents!");
    println!("{}", "-".repeat(60));
    println!();

    let handles = open(settings, true).await?;
    let retriever = handles.retriever().await?;
    let generator = handles.generator()?;
    println!("Chatbot Ready!");

    let mut session = ChatSession::new(&retriever, &generator, handles.cancel_token());
    let mut stdout = tokio::io::stdout();
    let summary = session.run(stdin_reader(), &mut stdout).await?;
    info!(turns = summary.turns, failures = summary.failures, "bye");
    handles.close().await?;
    Ok(())
}

async fn ask(mut settings: Settings, question: String, args: QueryArgs) -> anyhow::Result<()> {
    args.apply(&mut settings);
    let handles = open(settings, true).await?;
    let retriever = handles.retriever().await?;
    let generator = handles.generator()?;
    let mut session = ChatSession::new(&retriever, &generator, handles.cancel_token());
    let turn = session.ask(question.trim()).await;
    handles.close().await?;
    println!("{}", turn?.answer);
    Ok(())
}

async fn status(mut settings: Settings, args: CollectionArg) -> anyhow::Result<()> {
    args.apply(&mut settings);
    let backend = settings.store.backend;
    let handles = open(settings, false).await?;
    let count = handles.collection_size().await?;
    println!("backend:    {backend:?}");
    println!("embedder:   {}", handles.embedder().embedder_id());
    println!("collection: {} ({count} records)", handles.collection_name());
    handles.close().await?;
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let dotenv = load_dotenv();
    init_tracing();
    if let Some(path) = dotenv {
        debug!(path = %path.display(), "loaded environment file");
    }
    let cli = Cli::parse();
    let settings = Settings::load().map_err(|e| {
        error!("Error loading config: {e}");
        e
    })?;

    match cli.command {
        Command::Ingest(args) => ingest(settings, args).await,
        Command::Chat(args) => chat(settings, args).await,
        Command::Ask { question, query } => ask(settings, question, query).await,
        Command::Status(args) => status(settings, args).await,
    }
}
