//! Event surface for the orchestrator loop: a broadcast bus carrying the
//! `thinking/planning/executing/progress/result/error/info/vm/diff/tool/
//! agent` event vocabulary, extended with a bounded per-agent ring buffer
//! so a slow consumer can replay recent history instead of only live
//! events.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

pub const DEFAULT_BUS_CAPACITY: usize = 1024;
pub const DEFAULT_AGENT_RING_CAPACITY: usize = 1_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppEvent {
    Thinking { agent_id: Option<String>, content: String },
    Planning { agent_id: Option<String>, content: String },
    Executing { agent_id: Option<String>, tool_name: String },
    Progress { agent_id: Option<String>, percent: u8 },
    Result { agent_id: Option<String>, content: String },
    Error { agent_id: Option<String>, message: String },
    Info { message: String },
    Vm { content: String },
    Diff { file: String, unified_diff: String },
    Tool { tool_name: String, success: bool, summary: String },
    Agent { agent_id: String, content: String },
}

impl AppEvent {
    pub fn agent_id(&self) -> Option<&str> {
        match self {
            AppEvent::Thinking { agent_id, .. }
            | AppEvent::Planning { agent_id, .. }
            | AppEvent::Executing { agent_id, .. }
            | AppEvent::Progress { agent_id, .. }
            | AppEvent::Result { agent_id, .. }
            | AppEvent::Error { agent_id, .. } => agent_id.as_deref(),
            AppEvent::Agent { agent_id, .. } => Some(agent_id.as_str()),
            _ => None,
        }
    }
}

pub trait EventBus: Send + Sync {
    fn publish(&self, event: AppEvent) -> Result<(), String>;
    fn subscribe(&self) -> broadcast::Receiver<AppEvent>;
    /// Snapshot of the bounded ring buffer for one agent, oldest first.
    fn agent_history(&self, agent_id: &str) -> Vec<AppEvent>;
}

/// Broadcast-backed bus with a bounded per-agent ring buffer layered on
/// top, so a late subscriber (e.g. a HUD repaint) can replay recent
/// per-agent context instead of only what's live on the channel.
pub struct TokioBroadcastBus {
    sender: broadcast::Sender<AppEvent>,
    ring_capacity: usize,
    rings: Mutex<HashMap<String, VecDeque<AppEvent>>>,
}

impl TokioBroadcastBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_BUS_CAPACITY, DEFAULT_AGENT_RING_CAPACITY)
    }

    pub fn with_capacity(bus_capacity: usize, ring_capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(bus_capacity);
        Self { sender, ring_capacity, rings: Mutex::new(HashMap::new()) }
    }

    fn record_ring(&self, event: &AppEvent) {
        let Some(agent_id) = event.agent_id() else { return };
        if let Ok(mut rings) = self.rings.lock() {
            let ring = rings.entry(agent_id.to_string()).or_default();
            ring.push_back(event.clone());
            while ring.len() > self.ring_capacity {
                ring.pop_front();
            }
        }
    }
}

impl Default for TokioBroadcastBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus for TokioBroadcastBus {
    fn publish(&self, event: AppEvent) -> Result<(), String> {
        self.record_ring(&event);
        // `send` returns the active receiver count; zero receivers is fine.
        self.sender.send(event).map(|_| ()).map_err(|e| e.to_string())
    }

    fn subscribe(&self) -> broadcast::Receiver<AppEvent> {
        self.sender.subscribe()
    }

    fn agent_history(&self, agent_id: &str) -> Vec<AppEvent> {
        self.rings.lock().ok().and_then(|rings| rings.get(agent_id).map(|ring| ring.iter().cloned().collect())).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_then_receive() {
        let bus = TokioBroadcastBus::new();
        let mut rx = bus.subscribe();
        bus.publish(AppEvent::Info { message: "ready".to_string() }).unwrap();
        let received = rx.recv().await.unwrap();
        assert!(matches!(received, AppEvent::Info { .. }));
    }

    #[test]
    fn agent_ring_buffer_is_bounded() {
        let bus = TokioBroadcastBus::with_capacity(1024, 3);
        for i in 0..10 {
            bus.publish(AppEvent::Thinking { agent_id: Some("a1".to_string()), content: format!("step {i}") }).unwrap();
        }
        let history = bus.agent_history("a1");
        assert_eq!(history.len(), 3);
        if let AppEvent::Thinking { content, .. } = &history[0] {
            assert_eq!(content, "step 7");
        } else {
            panic!("unexpected event");
        }
    }

    #[test]
    fn agent_history_empty_for_unknown_agent() {
        let bus = TokioBroadcastBus::new();
        assert!(bus.agent_history("nobody").is_empty());
    }
}
