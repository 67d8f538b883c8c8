//! Degradation policy around a completion client.
//!
//! A provider failure must not lose the user's turn. In the default
//! (lenient) mode the service logs the failure and substitutes
//! `FALLBACK_REPLY`, so the chat pipeline can always close out the pair.
//! Strict mode surfaces the error instead, for callers that prefer a hard
//! failure over a canned reply.

use std::sync::Arc;
use tracing::warn;

use parley_core::completion::{CompletionClient, CompletionRequest, Turn};
use parley_core::error::ProviderError;

/// The reply substituted when the provider call fails in lenient mode.
pub const FALLBACK_REPLY: &str =
    "I apologize, but I'm experiencing technical difficulties. Please try again in a moment.";

/// How a completion was produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionOutcome {
    /// The provider answered.
    Generated(String),
    /// The provider failed; this is the fallback reply.
    Degraded(&'static str),
}

impl CompletionOutcome {
    pub fn text(&self) -> &str {
        match self {
            Self::Generated(text) => text,
            Self::Degraded(text) => text,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded(_))
    }
}

/// Policy wrapper over any completion client.
#[derive(Clone)]
pub struct CompletionService {
    client: Arc<dyn CompletionClient>,
    model: String,
    max_tokens: u32,
    strict: bool,
}

impl CompletionService {
    pub fn new(client: Arc<dyn CompletionClient>, model: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            client,
            model: model.into(),
            max_tokens,
            strict: false,
        }
    }

    /// Surface provider errors instead of substituting the fallback.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Generate a reply for an assembled prompt.
    ///
    /// In lenient mode this never returns `Err` for provider failures.
    pub async fn generate(
        &self,
        system: String,
        turns: Vec<Turn>,
    ) -> Result<CompletionOutcome, ProviderError> {
        let request = CompletionRequest {
            model: self.model.clone(),
            system,
            turns,
            max_tokens: self.max_tokens,
        };

        match self.client.complete(request).await {
            Ok(text) => Ok(CompletionOutcome::Generated(text)),
            Err(e) if self.strict => {
                warn!(provider = %self.client.name(), error = %e, "Completion failed (strict mode)");
                Err(e)
            }
            Err(e) => {
                warn!(provider = %self.client.name(), error = %e, "Completion failed, substituting fallback reply");
                Ok(CompletionOutcome::Degraded(FALLBACK_REPLY))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct EchoClient;

    #[async_trait]
    impl CompletionClient for EchoClient {
        fn name(&self) -> &str {
            "echo"
        }

        async fn complete(&self, request: CompletionRequest) -> Result<String, ProviderError> {
            Ok(format!("echo: {}", request.turns.last().unwrap().content))
        }
    }

    struct BrokenClient;

    #[async_trait]
    impl CompletionClient for BrokenClient {
        fn name(&self) -> &str {
            "broken"
        }

        async fn complete(&self, _request: CompletionRequest) -> Result<String, ProviderError> {
            Err(ProviderError::Network("connection refused".into()))
        }
    }

    #[tokio::test]
    async fn success_passes_through() {
        let service = CompletionService::new(Arc::new(EchoClient), "model", 100);
        let outcome = service
            .generate("system".into(), vec![Turn::user("hi")])
            .await
            .unwrap();
        assert_eq!(outcome, CompletionOutcome::Generated("echo: hi".into()));
        assert!(!outcome.is_degraded());
    }

    #[tokio::test]
    async fn failure_degrades_to_fallback() {
        let service = CompletionService::new(Arc::new(BrokenClient), "model", 100);
        let outcome = service
            .generate("system".into(), vec![Turn::user("hi")])
            .await
            .unwrap();
        assert!(outcome.is_degraded());
        assert_eq!(outcome.text(), FALLBACK_REPLY);
    }

    #[tokio::test]
    async fn strict_mode_surfaces_errors() {
        let service = CompletionService::new(Arc::new(BrokenClient), "model", 100).strict(true);
        let result = service.generate("system".into(), vec![Turn::user("hi")]).await;
        assert!(matches!(result, Err(ProviderError::Network(_))));
    }
}
