use docchat_core::config::{Credentials, StoreBackend, StoreSettings};
use docchat_core::error::Error;
use docchat_core::types::{CollectionRecord, Metadata};
use docchat_vector::{connect, LanceStore, MemoryStore};
use docchat_core::traits::VectorStore;
use std::time::Duration;

fn record(source: &str, embedding: Vec<f32>) -> CollectionRecord {
    let mut metadata = Metadata::new();
    metadata.insert("source".into(), source.into());
    CollectionRecord { id: uuid::Uuid::new_v4().to_string(), embedding, text: format!("contents of {source}"), metadata }
}

#[tokio::test]
async fn memory_collection_is_shared_by_name() -> anyhow::Result<()> {
    let store = MemoryStore::new();
    let first = store.get_or_create_collection("docs").await?;
    first.add_records(vec![record("a.txt", vec![1.0, 0.0])]).await?;
    let again = store.get_or_create_collection("docs").await?;
    assert_eq!(again.count().await?, 1);
    let other = store.get_or_create_collection("other").await?;
    assert_eq!(other.count().await?, 0);
    Ok(())
}

#[tokio::test]
async fn re_adding_the_same_file_appends() -> anyhow::Result<()> {
    let store = MemoryStore::new();
    let c = store.get_or_create_collection("docs").await?;
    c.add_records(vec![record("a.txt", vec![1.0, 0.0]), record("b.txt", vec![0.0, 1.0])]).await?;
    c.add_records(vec![record("a.txt", vec![1.0, 0.0]), record("b.txt", vec![0.0, 1.0])]).await?;
    assert_eq!(c.count().await?, 4);
    Ok(())
}

#[tokio::test]
async fn memory_nearest_orders_by_similarity() -> anyhow::Result<()> {
    let store = MemoryStore::new();
    let c = store.get_or_create_collection("docs").await?;
    c.add_records(vec![
        record("far.txt", vec![0.0, 1.0]),
        record("near.txt", vec![1.0, 0.1]),
        record("mid.txt", vec![1.0, 1.0]),
    ])
    .await?;
    let hits = c.nearest(&[1.0, 0.0], 2).await?;
    let sources: Vec<_> = hits.iter().map(|r| r.metadata["source"].as_str()).collect();
    assert_eq!(sources, ["near.txt", "mid.txt"]);
    assert_eq!(hits[0].embedding, vec![1.0, 0.1]);
    assert!(c.nearest(&[1.0, 0.0], 0).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn memory_rejects_mixed_dimensions() -> anyhow::Result<()> {
    let store = MemoryStore::new();
    let c = store.get_or_create_collection("docs").await?;
    c.add_records(vec![record("a.txt", vec![1.0, 0.0])]).await?;
    let err = c.add_records(vec![record("b.txt", vec![1.0, 0.0, 0.0])]).await.unwrap_err();
    assert!(matches!(err, Error::DimensionMismatch { expected: 2, actual: 3 }));
    let err = c.nearest(&[1.0, 0.0, 0.0], 1).await.unwrap_err();
    assert!(matches!(err, Error::DimensionMismatch { expected: 2, actual: 3 }));
    Ok(())
}

#[tokio::test]
async fn connect_memory_needs_no_credentials() -> anyhow::Result<()> {
    let settings = StoreSettings { backend: StoreBackend::Memory, ..StoreSettings::default() };
    let store = connect(&settings, &Credentials::default(), Duration::from_secs(5)).await?;
    assert_eq!(store.backend(), "memory");
    Ok(())
}

#[tokio::test]
async fn connect_chroma_without_credentials_fails_before_network() {
    let settings = StoreSettings { backend: StoreBackend::Chroma, chroma_url: "http://127.0.0.1:9".into(), ..StoreSettings::default() };
    let err = connect(&settings, &Credentials::default(), Duration::from_secs(1)).await.err().expect("missing credentials");
    assert!(matches!(err, Error::Config { ref field, .. } if field == "CHROMADB_API_KEY"), "got {err:?}");
}

#[tokio::test]
async fn lance_flow_persists_across_reopen() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let uri = dir.path().join("lancedb");
    let uri = uri.to_string_lossy();
    {
        let store = LanceStore::open(&uri).await?;
        let c = store.get_or_create_collection("my-rag-collection").await?;
        assert_eq!(c.count().await?, 0);
        assert!(c.nearest(&[1.0, 0.0, 0.0], 3).await?.is_empty());
        c.add_records(vec![record("sky.txt", vec![1.0, 0.0, 0.0]), record("grass.txt", vec![0.0, 1.0, 0.0])]).await?;
        c.add_records(vec![record("sky.txt", vec![1.0, 0.0, 0.0])]).await?;
        assert_eq!(c.count().await?, 3);
    }
    let store = LanceStore::open(&uri).await?;
    let c = store.get_or_create_collection("my-rag-collection").await?;
    assert_eq!(c.count().await?, 3);
    let hits = c.nearest(&[0.1, 1.0, 0.0], 1).await?;
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].metadata["source"], "grass.txt");
    assert_eq!(hits[0].embedding.len(), 3);

    let err = c.add_records(vec![record("wide.txt", vec![1.0, 0.0, 0.0, 0.0])]).await.unwrap_err();
    assert!(matches!(err, Error::DimensionMismatch { expected: 3, actual: 4 }));
    Ok(())
}
