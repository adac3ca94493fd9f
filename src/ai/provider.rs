//! `LLMProvider` trait boundary: the completion/streaming contract any
//! concrete provider client implements. No concrete HTTP implementation
//! lives here — this crate only owns the contract and a factory seam for
//! whatever adapter is wired in.

use async_trait::async_trait;

use super::types::{CompletionRequest, CompletionResponse, StreamEvent};

#[async_trait]
pub trait LLMProvider: Send + Sync {
    fn id(&self) -> &str;

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, String>;

    /// Streaming completion; implementations push `StreamEvent`s onto
    /// `sink` until `Complete` or `Error`.
    async fn stream(&self, request: CompletionRequest, sink: &(dyn Fn(StreamEvent) + Send + Sync)) -> Result<(), String>;
}

/// Resolves a provider id to a concrete `LLMProvider`. No concrete
/// provider is registered by this crate; callers supply their own
/// factory function when wiring the orchestrator together.
pub struct ProviderFactory {
    providers: std::collections::HashMap<String, std::sync::Arc<dyn LLMProvider>>,
}

impl Default for ProviderFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl ProviderFactory {
    pub fn new() -> Self {
        Self { providers: std::collections::HashMap::new() }
    }

    pub fn register(&mut self, provider: std::sync::Arc<dyn LLMProvider>) {
        self.providers.insert(provider.id().to_string(), provider);
    }

    pub fn get(&self, id: &str) -> Option<std::sync::Arc<dyn LLMProvider>> {
        self.providers.get(id).cloned()
    }
}
