//! Input Queue: three-class prioritized FIFO queue serializing
//! submissions into the orchestrator loop.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    Normal,
    Low,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedInput {
    pub id: String,
    pub content: String,
    pub priority: Priority,
    pub source: String,
    pub enqueued_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueStatus {
    pub queue_length: usize,
    pub is_processing: bool,
    pub pending_inputs: Vec<QueuedInput>,
}

/// Derives priority from leading command markers and urgency keywords:
/// `/`-prefixed commands and `@agent` mentions are high priority, a
/// handful of urgency keywords bump normal content up one class.
pub fn infer_priority(content: &str) -> Priority {
    let trimmed = content.trim();
    if trimmed.starts_with('/') || trimmed.starts_with('@') {
        return Priority::High;
    }
    const URGENT_KEYWORDS: &[&str] = &["urgent", "asap", "immediately", "now"];
    let lower = trimmed.to_lowercase();
    if URGENT_KEYWORDS.iter().any(|k| lower.contains(k)) {
        Priority::High
    } else {
        Priority::Normal
    }
}

pub struct InputQueue {
    high: Mutex<VecDeque<QueuedInput>>,
    normal: Mutex<VecDeque<QueuedInput>>,
    low: Mutex<VecDeque<QueuedInput>>,
    is_processing: AtomicBool,
    bypass: AtomicBool,
    next_id: AtomicU64,
}

impl Default for InputQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl InputQueue {
    pub fn new() -> Self {
        Self {
            high: Mutex::new(VecDeque::new()),
            normal: Mutex::new(VecDeque::new()),
            low: Mutex::new(VecDeque::new()),
            is_processing: AtomicBool::new(false),
            bypass: AtomicBool::new(false),
            next_id: AtomicU64::new(1),
        }
    }

    fn lane(&self, priority: Priority) -> &Mutex<VecDeque<QueuedInput>> {
        match priority {
            Priority::High => &self.high,
            Priority::Normal => &self.normal,
            Priority::Low => &self.low,
        }
    }

    /// False while bypass is active or the content looks like a reply to
    /// an open approval prompt (handled upstream by the orchestrator).
    pub fn should_queue(&self, _content: &str) -> bool {
        !self.is_bypass_enabled()
    }

    pub fn enqueue(&self, content: impl Into<String>, priority: Priority, source: impl Into<String>) -> Option<String> {
        if self.is_bypass_enabled() {
            return None;
        }
        let id = format!("input-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        let item = QueuedInput { id: id.clone(), content: content.into(), priority, source: source.into(), enqueued_at: Utc::now() };
        if let Ok(mut lane) = self.lane(priority).lock() {
            lane.push_back(item);
        }
        Some(id)
    }

    fn pop_next(&self) -> Option<QueuedInput> {
        for priority in [Priority::High, Priority::Normal, Priority::Low] {
            if let Ok(mut lane) = self.lane(priority).lock() {
                if let Some(item) = lane.pop_front() {
                    return Some(item);
                }
            }
        }
        None
    }

    /// Drains and hands the next input (if any) to `worker`, serialized
    /// via the processing flag: a caller attempting to re-enter while a
    /// worker is active is rejected with `None`.
    pub async fn process_next<F, Fut, T>(&self, worker: F) -> Option<T>
    where
        F: FnOnce(QueuedInput) -> Fut,
        Fut: std::future::Future<Output = T>,
    {
        if self.is_processing.swap(true, Ordering::SeqCst) {
            return None;
        }
        let result = match self.pop_next() {
            Some(item) => Some(worker(item).await),
            None => None,
        };
        self.is_processing.store(false, Ordering::SeqCst);
        result
    }

    pub fn get_status(&self) -> QueueStatus {
        let mut pending = Vec::new();
        for priority in [Priority::High, Priority::Normal, Priority::Low] {
            if let Ok(lane) = self.lane(priority).lock() {
                pending.extend(lane.iter().cloned());
            }
        }
        QueueStatus { queue_length: pending.len(), is_processing: self.is_processing.load(Ordering::SeqCst), pending_inputs: pending }
    }

    pub fn clear(&self) -> usize {
        let mut removed = 0;
        for priority in [Priority::High, Priority::Normal, Priority::Low] {
            if let Ok(mut lane) = self.lane(priority).lock() {
                removed += lane.len();
                lane.clear();
            }
        }
        removed
    }

    pub fn enable_bypass(&self) {
        self.bypass.store(true, Ordering::SeqCst);
    }

    pub fn disable_bypass(&self) {
        self.bypass.store(false, Ordering::SeqCst);
    }

    pub fn is_bypass_enabled(&self) -> bool {
        self.bypass.load(Ordering::SeqCst)
    }

    /// Forcibly resets processing state and bypass; used on cancellation.
    pub fn force_cleanup(&self) {
        self.is_processing.store(false, Ordering::SeqCst);
        self.bypass.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_ordering_matches_scenario() {
        let queue = InputQueue::new();
        queue.enqueue("/status", infer_priority("/status"), "cli");
        queue.enqueue("A", infer_priority("A"), "cli");
        queue.enqueue("B", infer_priority("B"), "cli");

        let status = queue.get_status();
        let contents: Vec<&str> = status.pending_inputs.iter().map(|i| i.content.as_str()).collect();
        assert_eq!(contents, vec!["/status", "A", "B"]);
    }

    #[test]
    fn high_priority_jumps_ahead_of_normal() {
        let queue = InputQueue::new();
        queue.enqueue("normal item", Priority::Normal, "cli");
        queue.enqueue("/urgent", Priority::High, "cli");

        let status = queue.get_status();
        assert_eq!(status.pending_inputs[0].content, "/urgent");
    }

    #[tokio::test]
    async fn process_next_serializes_via_processing_flag() {
        let queue = std::sync::Arc::new(InputQueue::new());
        queue.enqueue("task", Priority::Normal, "cli");

        let q1 = queue.clone();
        let first = tokio::spawn(async move {
            q1.process_next(|item| async move {
                tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                item.content
            })
            .await
        });

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let second = queue.process_next(|item| async move { item.content }).await;
        assert!(second.is_none());

        let result = first.await.unwrap();
        assert_eq!(result, Some("task".to_string()));
    }

    #[test]
    fn bypass_precludes_enqueue() {
        let queue = InputQueue::new();
        queue.enable_bypass();
        assert!(queue.enqueue("x", Priority::Normal, "cli").is_none());
        assert!(!queue.should_queue("x"));
        queue.disable_bypass();
        assert!(queue.enqueue("x", Priority::Normal, "cli").is_some());
    }

    #[test]
    fn clear_removes_all_pending() {
        let queue = InputQueue::new();
        queue.enqueue("a", Priority::High, "cli");
        queue.enqueue("b", Priority::Low, "cli");
        assert_eq!(queue.clear(), 2);
        assert_eq!(queue.get_status().queue_length, 0);
    }
}
