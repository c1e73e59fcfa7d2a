use std::time::Duration;

use docchat_core::config::{Credentials, EmbeddingSettings};
use docchat_core::traits::Embedder;
use docchat_embed::{get_default_embedder, FakeEmbedder};

fn cosine(a: &[f32], b: &[f32]) -> f32 { a.iter().zip(b).map(|(x, y)| x * y).sum() }

#[tokio::test]
async fn fake_embedder_shapes_and_determinism() {
    // Force fake embedder to avoid calling the remote API
    let settings = EmbeddingSettings { fake: true, ..EmbeddingSettings::default() };
    let embedder = get_default_embedder(&settings, &Credentials::default(), Duration::from_secs(5)).expect("embedder");
    let texts = vec!["hello world".to_string(), "hello world".to_string()];
    let embs = embedder.embed_batch(&texts).await.expect("embed_batch");
    let v1 = &embs[0];
    let v2 = &embs[1];

    assert_eq!(v1.len(), 1024, "embedding dim is 1024");
    assert_eq!(embedder.dim(), Some(1024));

    let norm: f32 = v1.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() <= 1e-3, "vector is L2-normalized (norm={norm})");

    for (a, b) in v1.iter().zip(v2.iter()) { assert!((a - b).abs() <= 1e-6); }

    let q = embedder.embed("hello world").await.expect("embed");
    assert_eq!(&q, v1, "query and document embeddings agree for the fake provider");
}

#[tokio::test]
async fn fake_embedder_ignores_case_and_punctuation() {
    let embedder = FakeEmbedder::new(256);
    let a = embedder.embed("What color is the sky?").await.unwrap();
    let b = embedder.embed("what COLOR is the sky").await.unwrap();
    assert!((cosine(&a, &b) - 1.0).abs() < 1e-5);
}

#[tokio::test]
async fn fake_embedder_ranks_shared_words_higher() {
    let embedder = FakeEmbedder::default();
    let q = embedder.embed("What color is the sky?").await.unwrap();
    let sky = embedder.embed("The sky is blue.").await.unwrap();
    let grass = embedder.embed("Grass is green.").await.unwrap();
    assert!(cosine(&q, &sky) > cosine(&q, &grass));
}

#[tokio::test]
async fn empty_text_passes_through() {
    let embedder = FakeEmbedder::new(8);
    let v = embedder.embed("").await.unwrap();
    assert_eq!(v, vec![0.0; 8]);
    assert!(embedder.embed_batch(&[]).await.unwrap().is_empty());
}

#[test]
fn gemini_is_chosen_unless_fake_is_set() {
    let err = get_default_embedder(&EmbeddingSettings::default(), &Credentials::default(), Duration::from_secs(5)).err().expect("no key");
    assert!(matches!(err, docchat_core::Error::Config { ref field, .. } if field == "GOOGLE_API_KEY"));
}
