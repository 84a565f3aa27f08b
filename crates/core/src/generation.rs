//! GenerationService trait — the abstraction over the text-generation API.
//!
//! The session controller hands a finished prompt string to a
//! `GenerationService` and gets the model's answer back verbatim.
//!
//! Implementations: Gemini (`docchat-providers`), scripted stubs in tests.

use async_trait::async_trait;

use crate::error::GenerationError;

/// The core GenerationService trait.
///
/// One call is one attempt; implementations must not retry on their own.
#[async_trait]
pub trait GenerationService: Send + Sync {
    /// A human-readable name for this service (e.g., "gemini").
    fn name(&self) -> &str;

    /// Send a prompt and return the generated text.
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;

    /// Health check — can we reach the service?
    async fn health_check(&self) -> Result<bool, GenerationError> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl GenerationService for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
            Ok(prompt.to_uppercase())
        }
    }

    #[tokio::test]
    async fn default_health_check_is_ok() {
        let svc = Echo;
        assert!(svc.health_check().await.unwrap());
        assert_eq!(svc.generate("hi").await.unwrap(), "HI");
    }
}
