//! Orchestrator Loop state machine and the chat message model it
//! operates over.

use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const ABSORB_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    User,
    System,
    Agent,
    Tool,
    Diff,
    Vm,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    Queued,
    Processing,
    Completed,
    Absorbed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub kind: MessageKind,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub status: MessageStatus,
    pub agent_id: Option<String>,
    pub progress: Option<u8>,
    pub metadata: Option<Value>,
}

impl Message {
    pub fn new(id: impl Into<String>, kind: MessageKind, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            content: content.into(),
            timestamp: Utc::now(),
            status: MessageStatus::Queued,
            agent_id: None,
            progress: None,
            metadata: None,
        }
    }
}

/// At most one message may be `Processing` at any time.
pub fn has_single_processing_invariant(messages: &[Message]) -> bool {
    messages.iter().filter(|m| m.status == MessageStatus::Processing).count() <= 1
}

/// Marks completed non-user messages older than `grace` as absorbed.
/// Returns the number of messages absorbed.
pub fn absorb_sweep(messages: &mut [Message], grace: Duration, now: DateTime<Utc>) -> usize {
    let mut count = 0;
    for message in messages.iter_mut() {
        if message.kind == MessageKind::User || message.status != MessageStatus::Completed {
            continue;
        }
        let age = now.signed_duration_since(message.timestamp);
        if age.to_std().map(|d| d >= grace).unwrap_or(true) {
            message.status = MessageStatus::Absorbed;
            count += 1;
        }
    }
    count
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrchestratorState {
    Idle,
    AwaitingInput,
    Processing,
    AwaitingApproval,
    ShuttingDown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Manual,
    Plan,
    AutoAccept,
    Vm,
}

impl Mode {
    pub fn next(self) -> Mode {
        match self {
            Mode::Manual => Mode::Plan,
            Mode::Plan => Mode::AutoAccept,
            Mode::AutoAccept => Mode::Vm,
            Mode::Vm => Mode::Manual,
        }
    }
}

fn allowed_transition(from: OrchestratorState, to: OrchestratorState) -> bool {
    use OrchestratorState::*;
    if to == ShuttingDown {
        return true; // any state can shut down (SIGINT / exit)
    }
    matches!(
        (from, to),
        (Idle, AwaitingInput)
            | (AwaitingInput, Processing)
            | (Processing, AwaitingApproval)
            | (AwaitingApproval, Processing)
            | (Processing, AwaitingInput)
    )
}

/// Single-threaded cooperative state machine driving the orchestrator
/// loop. Agents, tools, and stream readers run as separate parallel
/// tasks; this machine only tracks the loop's own phase and UI mode.
pub struct StateMachine {
    state: Mutex<OrchestratorState>,
    mode: Mutex<Mode>,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StateMachine {
    pub fn new() -> Self {
        Self { state: Mutex::new(OrchestratorState::Idle), mode: Mutex::new(Mode::Manual) }
    }

    pub fn state(&self) -> OrchestratorState {
        *self.state.lock().expect("state mutex poisoned")
    }

    pub fn mode(&self) -> Mode {
        *self.mode.lock().expect("mode mutex poisoned")
    }

    /// Attempts the transition; returns `Err` with the rejected pair if
    /// it isn't one of the allowed edges.
    pub fn transition(&self, to: OrchestratorState) -> Result<(), (OrchestratorState, OrchestratorState)> {
        let mut state = self.state.lock().expect("state mutex poisoned");
        if !allowed_transition(*state, to) {
            return Err((*state, to));
        }
        *state = to;
        Ok(())
    }

    pub fn cycle_mode(&self) -> Mode {
        let mut mode = self.mode.lock().expect("mode mutex poisoned");
        *mode = mode.next();
        *mode
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_cycles_through_all_four() {
        let machine = StateMachine::new();
        assert_eq!(machine.mode(), Mode::Manual);
        assert_eq!(machine.cycle_mode(), Mode::Plan);
        assert_eq!(machine.cycle_mode(), Mode::AutoAccept);
        assert_eq!(machine.cycle_mode(), Mode::Vm);
        assert_eq!(machine.cycle_mode(), Mode::Manual);
    }

    #[test]
    fn valid_transitions_succeed() {
        let machine = StateMachine::new();
        machine.transition(OrchestratorState::AwaitingInput).unwrap();
        machine.transition(OrchestratorState::Processing).unwrap();
        machine.transition(OrchestratorState::AwaitingApproval).unwrap();
        machine.transition(OrchestratorState::Processing).unwrap();
        machine.transition(OrchestratorState::AwaitingInput).unwrap();
    }

    #[test]
    fn invalid_transition_is_rejected() {
        let machine = StateMachine::new();
        assert!(machine.transition(OrchestratorState::Processing).is_err());
    }

    #[test]
    fn any_state_can_shut_down() {
        let machine = StateMachine::new();
        machine.transition(OrchestratorState::ShuttingDown).unwrap();
        assert_eq!(machine.state(), OrchestratorState::ShuttingDown);
    }

    #[test]
    fn single_processing_invariant_detects_violation() {
        let mut a = Message::new("1", MessageKind::Agent, "a");
        a.status = MessageStatus::Processing;
        let mut b = Message::new("2", MessageKind::Agent, "b");
        b.status = MessageStatus::Processing;
        assert!(!has_single_processing_invariant(&[a, b]));
    }

    #[test]
    fn absorb_sweep_only_touches_completed_non_user_messages_past_grace() {
        let now = Utc::now();
        let mut completed_agent = Message::new("1", MessageKind::Agent, "done");
        completed_agent.status = MessageStatus::Completed;
        completed_agent.timestamp = now - chrono::Duration::seconds(5);

        let mut completed_user = Message::new("2", MessageKind::User, "hi");
        completed_user.status = MessageStatus::Completed;
        completed_user.timestamp = now - chrono::Duration::seconds(5);

        let mut fresh_agent = Message::new("3", MessageKind::Agent, "just finished");
        fresh_agent.status = MessageStatus::Completed;
        fresh_agent.timestamp = now;

        let mut messages = vec![completed_agent, completed_user, fresh_agent];
        let absorbed = absorb_sweep(&mut messages, ABSORB_GRACE, now);

        assert_eq!(absorbed, 1);
        assert_eq!(messages[0].status, MessageStatus::Absorbed);
        assert_eq!(messages[1].status, MessageStatus::Completed);
        assert_eq!(messages[2].status, MessageStatus::Completed);
    }
}
