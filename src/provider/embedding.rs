//! Text embedding contract.

use async_trait::async_trait;

use crate::error::ChatError;

/// Backends able to turn text into embedding vectors.
///
/// `model` overrides the backend's default embedding model.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed_batch(
        &self,
        texts: &[String],
        model: Option<&str>,
    ) -> Result<Vec<Vec<f32>>, ChatError>;

    async fn embed(&self, text: &str, model: Option<&str>) -> Result<Vec<f32>, ChatError> {
        self.embed_batch(&[text.to_string()], model)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ChatError::UnrecognizedResponse("empty embedding response".into()))
    }
}
