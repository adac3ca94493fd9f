//! Orchestrator Loop: the chat session's state machine plus the
//! event bus that surfaces its activity.

pub mod events;
pub mod loop_;
pub mod state;

pub use events::{AppEvent, EventBus, TokioBroadcastBus};
pub use loop_::Orchestrator;
pub use state::{Message, MessageKind, MessageStatus, Mode, OrchestratorState, StateMachine};
