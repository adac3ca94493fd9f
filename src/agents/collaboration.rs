//! Per-turn collaboration context shared between agents fanned out onto
//! the same todo: a shared key/value map, a per-agent log, and the list
//! of participants. Lifetime is one turn.

use std::collections::HashMap;
use std::sync::RwLock;

use serde_json::Value;

#[derive(Debug, Clone)]
pub struct LogEntry {
    pub agent_id: String,
    pub message: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

pub struct CollaborationContext {
    participants: RwLock<Vec<String>>,
    shared: RwLock<HashMap<String, Value>>,
    log: RwLock<Vec<LogEntry>>,
}

impl Default for CollaborationContext {
    fn default() -> Self {
        Self::new()
    }
}

impl CollaborationContext {
    pub fn new() -> Self {
        Self { participants: RwLock::new(Vec::new()), shared: RwLock::new(HashMap::new()), log: RwLock::new(Vec::new()) }
    }

    pub fn join(&self, agent_id: &str) {
        if let Ok(mut participants) = self.participants.write() {
            if !participants.iter().any(|p| p == agent_id) {
                participants.push(agent_id.to_string());
            }
        }
    }

    pub fn participants(&self) -> Vec<String> {
        self.participants.read().map(|p| p.clone()).unwrap_or_default()
    }

    pub fn share_data(&self, key: impl Into<String>, value: Value) {
        if let Ok(mut shared) = self.shared.write() {
            shared.insert(key.into(), value);
        }
    }

    pub fn get_data(&self, key: &str) -> Option<Value> {
        self.shared.read().ok().and_then(|shared| shared.get(key).cloned())
    }

    pub fn log(&self, agent_id: impl Into<String>, message: impl Into<String>) {
        if let Ok(mut log) = self.log.write() {
            log.push(LogEntry { agent_id: agent_id.into(), message: message.into(), timestamp: chrono::Utc::now() });
        }
    }

    pub fn log_entries(&self) -> Vec<LogEntry> {
        self.log.read().map(|l| l.clone()).unwrap_or_default()
    }

    pub fn other_agents(&self, agent_id: &str) -> Vec<String> {
        self.participants().into_iter().filter(|p| p != agent_id).collect()
    }

    /// Structured namespacing for shared-map keys: `{agent}:{scope}:{channel}:{peer}`.
    /// Lets unrelated concerns (todo output, scratch state, cross-agent
    /// handoffs) share one flat map without colliding.
    pub fn session_key(agent_id: &str, scope: &str, channel: &str, peer: &str) -> String {
        format!("{agent_id}:{scope}:{channel}:{peer}")
    }

    pub fn output_key(agent_id: &str, todo_id: &str) -> String {
        Self::session_key(agent_id, "todo", todo_id, "output")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shares_and_reads_data_across_agents() {
        let ctx = CollaborationContext::new();
        ctx.join("agent-a");
        ctx.join("agent-b");
        ctx.share_data(CollaborationContext::output_key("agent-a", "todo-1"), serde_json::json!("done"));
        assert_eq!(ctx.get_data(&CollaborationContext::output_key("agent-a", "todo-1")), Some(serde_json::json!("done")));
        assert_eq!(ctx.other_agents("agent-a"), vec!["agent-b".to_string()]);
    }

    #[test]
    fn log_accumulates_entries_per_agent() {
        let ctx = CollaborationContext::new();
        ctx.log("agent-a", "starting");
        ctx.log("agent-b", "starting");
        assert_eq!(ctx.log_entries().len(), 2);
    }

    #[test]
    fn session_key_disambiguates_scope_and_channel() {
        let out = CollaborationContext::session_key("agent-a", "todo", "todo-1", "output");
        let scratch = CollaborationContext::session_key("agent-a", "scratch", "todo-1", "output");
        let other_channel = CollaborationContext::session_key("agent-a", "todo", "todo-2", "output");
        assert_ne!(out, scratch);
        assert_ne!(out, other_channel);
        assert_eq!(out, CollaborationContext::output_key("agent-a", "todo-1"));
    }
}
