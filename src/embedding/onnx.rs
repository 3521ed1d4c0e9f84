use std::sync::Arc;

use async_trait::async_trait;
use fastembed::{InitOptions, TextEmbedding};
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::EmbeddingProvider;
use crate::config::{EmbeddingConfig, EmbeddingModelKind};
use crate::error::{PensieveError, Result};

/// Embeddings from a local ONNX model.
///
/// Inference is CPU-bound, so every call moves the model onto a blocking
/// thread and puts it back afterwards.
pub struct FastEmbedProvider {
    model: Arc<Mutex<Option<TextEmbedding>>>,
    name: String,
}

impl std::fmt::Debug for FastEmbedProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastEmbedProvider")
            .field("model", &self.name)
            .field("model_loaded", &"Dynamic")
            .finish()
    }
}

impl FastEmbedProvider {
    /// Load (downloading on first use) the given model.
    pub async fn load(kind: EmbeddingModelKind, config: &EmbeddingConfig) -> Result<Self> {
        let name = kind.to_string();
        info!(name: "embedding.model.init", model = %name, "Initializing fastembed model");

        let mut options = InitOptions::new(kind.fastembed_model());
        options.show_download_progress = config.show_download_progress;
        if let Some(dir) = &config.cache_dir {
            options.cache_dir.clone_from(dir);
        }

        let model = tokio::task::spawn_blocking(move || TextEmbedding::try_new(options))
            .await?
            .map_err(|e| PensieveError::Embedding {
                model: kind.to_string(),
                message: format!("failed to load model: {e}"),
            })?;

        Ok(Self {
            model: Arc::new(Mutex::new(Some(model))),
            name,
        })
    }

    fn error(&self, message: impl Into<String>) -> PensieveError {
        PensieveError::Embedding {
            model: self.name.clone(),
            message: message.into(),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for FastEmbedProvider {
    fn model_name(&self) -> &str {
        &self.name
    }

    async fn encode(&self, text: &str) -> Result<Vec<f32>> {
        self.encode_batch(vec![text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| self.error("no embedding generated"))
    }

    async fn encode_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut model_guard = self.model.lock().await;
        let mut owned_model = model_guard
            .take()
            .ok_or_else(|| self.error("model not initialized"))?;

        let count = texts.len();
        let (embeddings_res, returned_model) = tokio::task::spawn_blocking(move || {
            let res = owned_model.embed(texts, None);
            (res, owned_model)
        })
        .await?;

        *model_guard = Some(returned_model);
        drop(model_guard);

        let embeddings = embeddings_res.map_err(|e| self.error(e.to_string()))?;
        debug!(model = %self.name, count, "Generated embeddings");
        Ok(embeddings)
    }
}
