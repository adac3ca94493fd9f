//! Chat Trimmer: keeps a message sequence under a model's context
//! budget by preserving system messages, the most recent messages, and a
//! head/tail window around an elided middle, replaced by a compressed
//! summary. Grounded on `agent/session_router.rs`'s `Session::compact`,
//! which keeps the last N messages and prepends a one-line summary of
//! what was dropped.

use crate::token::{estimate, ModelCatalog};

use super::chunker::{compress_messages, emergency_truncate, CoreMessage, MessageRole};

pub const DEFAULT_RECENT_KEPT: usize = 4;
pub const DEFAULT_HEAD_TAIL_WINDOW: usize = 2;
pub const EMERGENCY_TRUNCATE_TOKENS: u32 = 120_000;

fn sequence_tokens(messages: &[CoreMessage]) -> u32 {
    messages.iter().map(|m| estimate(&m.content)).sum()
}

/// Trims `messages` to fit within `model`'s context window minus
/// `headroom`, preserving all system messages, the most recent
/// `recent_kept` non-system messages, and a head/tail window of size
/// `head_tail` around whatever gets elided in between.
pub fn trim_for_model(
    catalog: &ModelCatalog,
    model: &str,
    headroom: u32,
    messages: &[CoreMessage],
    recent_kept: usize,
    head_tail: usize,
) -> Vec<CoreMessage> {
    let budget = catalog.model_limit(model).saturating_sub(headroom);

    if sequence_tokens(messages) <= budget {
        return messages.to_vec();
    }

    let (system, non_system): (Vec<CoreMessage>, Vec<CoreMessage>) =
        messages.iter().cloned().partition(|m| m.role == MessageRole::System);

    if non_system.len() <= recent_kept + head_tail * 2 {
        let mut kept = system.clone();
        kept.extend(non_system);
        return emergency_fallback(kept, budget);
    }

    let head = &non_system[..head_tail];
    let tail_start = non_system.len().saturating_sub(recent_kept.max(head_tail));
    let tail = &non_system[tail_start..];
    let middle = &non_system[head_tail..tail_start];

    let (_, before, after) = compress_messages(middle);
    let summary = CoreMessage {
        role: MessageRole::System,
        content: format!("[{} earlier messages elided; compressed from ~{before} to ~{after} tokens]", middle.len()),
    };

    let mut kept = system;
    kept.extend(head.iter().cloned());
    kept.push(summary);
    kept.extend(tail.iter().cloned());

    emergency_fallback(kept, budget)
}

fn emergency_fallback(mut messages: Vec<CoreMessage>, budget: u32) -> Vec<CoreMessage> {
    let effective_cap = budget.min(EMERGENCY_TRUNCATE_TOKENS);
    if sequence_tokens(&messages) <= effective_cap {
        return messages;
    }
    for message in messages.iter_mut() {
        if message.role == MessageRole::System {
            continue;
        }
        message.content = emergency_truncate(&message.content, effective_cap / messages.len().max(1) as u32);
    }
    messages
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(role: MessageRole, content: &str) -> CoreMessage {
        CoreMessage { role, content: content.to_string() }
    }

    #[test]
    fn short_sequence_is_untouched() {
        let catalog = ModelCatalog::default();
        let messages = vec![msg(MessageRole::System, "be helpful"), msg(MessageRole::User, "hi")];
        let trimmed = trim_for_model(&catalog, "gpt-4o-mini", 1000, &messages, 4, 2);
        assert_eq!(trimmed.len(), 2);
    }

    #[test]
    fn long_sequence_preserves_system_and_recent_messages() {
        let catalog = ModelCatalog::default();
        let mut messages = vec![msg(MessageRole::System, "system prompt")];
        for i in 0..500 {
            messages.push(msg(MessageRole::User, &format!("turn {i}: {}", "padding ".repeat(50))));
        }
        let trimmed = trim_for_model(&catalog, "gpt-4o-mini", 4000, &messages, 4, 2);
        assert!(trimmed.iter().any(|m| m.role == MessageRole::System && m.content == "system prompt"));
        assert!(trimmed.last().unwrap().content.contains("turn 499"));
        assert!(trimmed.len() < messages.len());
    }

    #[test]
    fn elided_middle_gets_a_summary_message() {
        let catalog = ModelCatalog::default();
        let mut messages = Vec::new();
        for i in 0..200 {
            messages.push(msg(MessageRole::User, &format!("message {i}: {}", "x".repeat(100))));
        }
        let trimmed = trim_for_model(&catalog, "gpt-4o-mini", 4000, &messages, 4, 2);
        assert!(trimmed.iter().any(|m| m.content.contains("elided")));
    }
}
