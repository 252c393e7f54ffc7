//! Embedding providers
//!
//! The abstraction and its two implementations, plus a factory mapping
//! configuration onto a boxed provider.

pub mod gemini;
pub mod openai;
pub mod provider;

pub use gemini::GeminiProvider;
pub use openai::OpenAiProvider;
pub use provider::{EmbeddingProvider, ProviderStatus};

use std::sync::Arc;

use mishkat_config::{EmbeddingProviderType, EmbeddingSettings};

use crate::error::{Result, SearchError};

/// Create an embedding provider from configuration.
pub fn create_provider(settings: &EmbeddingSettings) -> Result<Arc<dyn EmbeddingProvider>> {
    match settings.provider {
        EmbeddingProviderType::Gemini => {
            let provider = GeminiProvider::new(settings.gemini.clone())?;
            Ok(Arc::new(provider))
        }
        EmbeddingProviderType::Openai => {
            let openai_settings = settings.openai.clone().ok_or_else(|| {
                SearchError::ProviderUnavailable(
                    "openai provider selected but [embedding.openai] is missing".into(),
                )
            })?;
            let provider = OpenAiProvider::new(openai_settings)?;
            Ok(Arc::new(provider))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_default_is_gemini() {
        let provider = create_provider(&EmbeddingSettings::default()).unwrap();
        assert_eq!(provider.provider_type(), EmbeddingProviderType::Gemini);
    }

    #[test]
    fn test_factory_openai_requires_section() {
        let settings = EmbeddingSettings {
            provider: EmbeddingProviderType::Openai,
            openai: None,
            ..Default::default()
        };
        assert!(create_provider(&settings).is_err());
    }
}
