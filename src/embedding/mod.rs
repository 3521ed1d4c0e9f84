//! Text embedding providers.
//!
//! The store uses two independent providers: one tuned for matching questions
//! against memory titles, one tuned for comparing short topic phrases. They
//! are never interchanged.
//!
//! - [`FastEmbedProvider`]: local ONNX models via `fastembed`
//! - [`HashingProvider`]: deterministic character-trigram hashing, no model download

mod hashing;
mod onnx;

pub use self::onnx::FastEmbedProvider;
pub use self::hashing::HashingProvider;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::config::{EmbeddingBackend, EmbeddingConfig};
use crate::error::Result;

#[async_trait]
pub trait EmbeddingProvider: Send + Sync + std::fmt::Debug {
    /// Model name, used in logs and error messages.
    fn model_name(&self) -> &str;

    /// Length of every vector this provider returns.
    async fn dimension(&self) -> Result<usize> {
        Ok(self.encode("dimension").await?.len())
    }

    async fn encode(&self, text: &str) -> Result<Vec<f32>>;

    async fn encode_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in &texts {
            out.push(self.encode(text).await?);
        }
        Ok(out)
    }

    fn similarity(&self, a: &[f32], b: &[f32]) -> f32 {
        cosine_similarity(a, b)
    }

    fn similarities(&self, query: &[f32], candidates: &[&[f32]]) -> Vec<f32> {
        candidates
            .iter()
            .map(|candidate| self.similarity(query, candidate))
            .collect()
    }
}

/// Cosine similarity in `[-1, 1]`. A zero vector scores `0.0` against anything.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot_product: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// The title/query provider and the topic provider, in that order.
pub type ProviderPair = (Arc<dyn EmbeddingProvider>, Arc<dyn EmbeddingProvider>);

/// Build both providers from configuration.
pub async fn build_providers(config: &EmbeddingConfig) -> Result<ProviderPair> {
    match config.provider {
        EmbeddingBackend::FastEmbed => {
            info!(
                name: "embedding.models.loading",
                title_model = %config.title_model,
                topic_model = %config.topic_model,
                "Loading fastembed models"
            );
            let title = FastEmbedProvider::load(config.title_model, config).await?;
            let topic = FastEmbedProvider::load(config.topic_model, config).await?;
            Ok((Arc::new(title), Arc::new(topic)))
        }
        EmbeddingBackend::Hashing => {
            info!(
                name: "embedding.models.hashing",
                dimension = config.hashing_dimension,
                "Using hashing embeddings"
            );
            Ok((
                Arc::new(HashingProvider::new("hashing-title", config.hashing_dimension)),
                Arc::new(HashingProvider::new("hashing-topic", config.hashing_dimension)),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity_bounds() {
        assert!((cosine_similarity(&[1.0, 0.0], &[2.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 3.0]).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_zero_vector() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[tokio::test]
    async fn test_similarities_keeps_candidate_order() {
        let provider = HashingProvider::new("test", 64);
        let a = provider.encode("paris").await.unwrap();
        let b = provider.encode("tokyo").await.unwrap();

        let scores = provider.similarities(&a, &[b.as_slice(), a.as_slice()]);
        assert_eq!(scores.len(), 2);
        assert!(scores[1] > scores[0]);
    }
}
