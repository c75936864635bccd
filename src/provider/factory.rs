//! Build the configured adapter.

use std::sync::Arc;

use crate::config::ChatConfig;
use crate::error::ChatError;

use super::{Backend, ProviderAdapter};

/// Create the adapter selected by `config.backend`.
#[allow(unused_variables)]
pub fn create_adapter(config: &ChatConfig) -> Result<Arc<dyn ProviderAdapter>, ChatError> {
    let model = config.model.clone();
    let base_url = config.base_url.clone();

    match config.backend {
        #[cfg(feature = "openai")]
        Backend::OpenAi => {
            let api_key = config
                .api_key
                .clone()
                .ok_or_else(|| ChatError::Authentication("Missing OPENAI_API_KEY".into()))?;
            Ok(Arc::new(super::openai::OpenAiAdapter::new(model, api_key, base_url)))
        }
        #[cfg(feature = "ollama")]
        Backend::Ollama => Ok(Arc::new(super::ollama::OllamaAdapter::new(model, base_url))),
        #[cfg(feature = "gemini")]
        Backend::Gemini => {
            let api_key = config
                .api_key
                .clone()
                .ok_or_else(|| ChatError::Authentication("Missing GEMINI_API_KEY".into()))?;
            Ok(Arc::new(super::gemini::GeminiAdapter::new(model, api_key, base_url)))
        }
        #[allow(unreachable_patterns)]
        other => Err(ChatError::UnsupportedBackend(other.to_string())),
    }
}
