//! Append-only audit trail. Bounded retention: default 50,000
//! entries, oldest 20% discarded when the cap is exceeded. A session id
//! generated at boot tags every entry.

use std::sync::Mutex;

use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_ENTRIES: usize = 50_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub actor: String,
    pub action: String,
    pub details: serde_json::Value,
    pub session_id: String,
    pub ip_address: Option<String>,
}

pub struct AuditLog {
    session_id: String,
    max_entries: usize,
    entries: Mutex<Vec<AuditEntry>>,
}

impl AuditLog {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self::with_capacity(session_id, DEFAULT_MAX_ENTRIES)
    }

    pub fn with_capacity(session_id: impl Into<String>, max_entries: usize) -> Self {
        Self { session_id: session_id.into(), max_entries, entries: Mutex::new(Vec::new()) }
    }

    pub fn append(&self, actor: impl Into<String>, action: impl Into<String>, details: serde_json::Value) {
        let entry = AuditEntry {
            timestamp: chrono::Utc::now(),
            actor: actor.into(),
            action: action.into(),
            details,
            session_id: self.session_id.clone(),
            ip_address: None,
        };

        let mut entries = match self.entries.lock() {
            Ok(e) => e,
            Err(e) => e.into_inner(),
        };
        entries.push(entry);

        if entries.len() > self.max_entries {
            let drop_count = entries.len() / 5; // discard oldest 20%
            entries.drain(0..drop_count);
        }
    }

    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_tags_session_id() {
        let log = AuditLog::new("sess-1");
        log.append("user", "approved", serde_json::json!({}));
        let entries = log.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].session_id, "sess-1");
    }

    #[test]
    fn bounded_retention_discards_oldest_20_percent() {
        let log = AuditLog::with_capacity("sess-1", 10);
        for i in 0..12 {
            log.append("user", format!("action-{i}"), serde_json::json!({}));
        }
        // Trim triggers once len (11) > max (10): drops 11/5 = 2 oldest,
        // then one more append brings it back to 10 without re-triggering.
        assert_eq!(log.len(), 10);
        let entries = log.entries();
        assert_eq!(entries[0].action, "action-2");
    }
}
