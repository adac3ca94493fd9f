//! LLM provider boundary. Prompts, model-selection heuristics, and
//! concrete provider clients are out of scope; this module only owns
//! the wire types and trait contract external adapters implement.

pub mod provider;
pub mod types;

pub use provider::{LLMProvider, ProviderFactory};
pub use types::{CompletionRequest, CompletionResponse, Message, MessageRole, StreamChunk, StreamEvent, TokenUsage};
