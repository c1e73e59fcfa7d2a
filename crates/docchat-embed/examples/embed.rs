use docchat_core::traits::Embedder;
use docchat_embed::FakeEmbedder;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let embedder = FakeEmbedder::default();
    let texts = vec!["hello world".to_string(), "rust embeddings".to_string()];
    let embs = embedder.embed_batch(&texts).await?;
    println!("B={} dim={:?} id={}", embs.len(), embedder.dim(), embedder.embedder_id());
    Ok(())
}
