//! Progressive Token Manager: splits a message history into
//! token-bounded chunks and processes them one at a time with
//! checkpointing, bounded retries, and compression/emergency-truncation
//! fallbacks for oversized content.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{OrchestratorError, Result};
use crate::token::estimate;

use super::checkpoint::{Checkpoint, CheckpointState, CheckpointStore};

pub const DEFAULT_MAX_TOKENS_PER_CHUNK: u32 = 2_500;
pub const EMERGENCY_TRUNCATE_MAX_TOKENS: u32 = 120_000;
const DEFAULT_MAX_RETRIES: u32 = 2;
const SUMMARY_EVERY: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreMessage {
    pub role: MessageRole,
    pub content: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub processed_at: Option<chrono::DateTime<chrono::Utc>>,
    pub retry_count: u32,
    pub dependencies: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub index: usize,
    pub messages: Vec<CoreMessage>,
    pub estimated_tokens: u32,
    pub compressed: bool,
    pub summary: Option<String>,
    pub metadata: ChunkMetadata,
}

fn message_tokens(message: &CoreMessage) -> u32 {
    estimate(&message.content)
}

/// Partitions `messages` into token-bounded chunks, in order. A single
/// message larger than `max_tokens_per_chunk` becomes its own chunk.
pub fn create_progressive_chunks(messages: &[CoreMessage], max_tokens_per_chunk: u32) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    let mut current: Vec<CoreMessage> = Vec::new();
    let mut current_tokens: u32 = 0;
    let created_at = chrono::Utc::now();

    let flush = |chunks: &mut Vec<Chunk>, current: &mut Vec<CoreMessage>, current_tokens: &mut u32| {
        if current.is_empty() {
            return;
        }
        let index = chunks.len();
        chunks.push(Chunk {
            id: format!("chunk-{index}-{}", created_at.timestamp_millis()),
            index,
            messages: std::mem::take(current),
            estimated_tokens: *current_tokens,
            compressed: false,
            summary: None,
            metadata: ChunkMetadata { created_at, processed_at: None, retry_count: 0, dependencies: None },
        });
        *current_tokens = 0;
    };

    for message in messages {
        let tokens = message_tokens(message);
        if tokens > max_tokens_per_chunk {
            flush(&mut chunks, &mut current, &mut current_tokens);
            let index = chunks.len();
            chunks.push(Chunk {
                id: format!("chunk-{index}-{}", created_at.timestamp_millis()),
                index,
                messages: vec![message.clone()],
                estimated_tokens: tokens,
                compressed: false,
                summary: None,
                metadata: ChunkMetadata { created_at, processed_at: None, retry_count: 0, dependencies: None },
            });
            continue;
        }

        if current_tokens + tokens > max_tokens_per_chunk && !current.is_empty() {
            flush(&mut chunks, &mut current, &mut current_tokens);
        }
        current.push(message.clone());
        current_tokens += tokens;
    }
    flush(&mut chunks, &mut current, &mut current_tokens);
    chunks
}

#[derive(Debug, Clone)]
pub struct ChunkContext {
    pub last_results: Vec<serde_json::Value>,
    pub index: usize,
    pub total: usize,
    pub summary: Option<String>,
}

#[async_trait]
pub trait ChunkProcessor: Send + Sync {
    async fn process(&self, chunk: &Chunk, context: &ChunkContext) -> Result<serde_json::Value>;
}

#[derive(Debug, Clone)]
pub enum ProgressEvent {
    Checkpoint(Box<Checkpoint>),
    Result { chunk_id: String, value: serde_json::Value },
    Summary { after_chunk: usize, text: String },
    Progress { percent: u8 },
}

#[derive(Debug, Clone)]
pub struct ChunkOutcome {
    pub chunk_id: String,
    pub state: CheckpointState,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
}

/// Caches chunk summaries by chunk id so repeated calls don't recompute.
#[derive(Default)]
pub struct SummaryCache {
    cache: Mutex<HashMap<String, String>>,
}

impl SummaryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_generate(&self, chunk: &Chunk) -> String {
        if let Ok(mut cache) = self.cache.lock() {
            if let Some(summary) = cache.get(&chunk.id) {
                return summary.clone();
            }
            let summary = generate_chunk_summary(chunk);
            cache.insert(chunk.id.clone(), summary.clone());
            summary
        } else {
            generate_chunk_summary(chunk)
        }
    }
}

const ACTION_CATEGORIES: &[(&str, &[&str])] = &[
    ("implement/create", &["implement", "create", "add", "build"]),
    ("fix/debug", &["fix", "debug", "bug", "error"]),
    ("analyze/review", &["analyze", "review", "inspect", "audit"]),
    ("optimize/improve", &["optimize", "improve", "refactor", "speed up"]),
];

/// Summarizes a chunk from keyword-matched action categories plus a
/// truncated prefix of the last user message.
pub fn generate_chunk_summary(chunk: &Chunk) -> String {
    let joined = chunk
        .messages
        .iter()
        .map(|m| m.content.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ");

    let categories: Vec<&str> = ACTION_CATEGORIES
        .iter()
        .filter(|(_, keywords)| keywords.iter().any(|k| joined.contains(k)))
        .map(|(name, _)| *name)
        .collect();

    let last_user = chunk
        .messages
        .iter()
        .rev()
        .find(|m| m.role == MessageRole::User)
        .map(|m| {
            let content = m.content.trim();
            if content.len() > 200 { format!("{}...", &content[..200]) } else { content.to_string() }
        })
        .unwrap_or_default();

    if categories.is_empty() {
        format!("chunk {}: {}", chunk.index, last_user)
    } else {
        format!("chunk {} [{}]: {}", chunk.index, categories.join(", "), last_user)
    }
}

/// Processes chunks one at a time, checkpointing before and after each,
/// retrying recoverable failures up to `max_retries`, and skipping fatal
/// ones. Emits progress events through `on_event` as it goes.
pub async fn process_chunks_progressively(
    chunks: &[Chunk],
    processor: &dyn ChunkProcessor,
    store: &CheckpointStore,
    mut on_event: impl FnMut(ProgressEvent),
) -> Vec<ChunkOutcome> {
    let mut outcomes = Vec::with_capacity(chunks.len());
    let mut last_results: Vec<serde_json::Value> = Vec::new();
    let summaries = SummaryCache::new();

    for (i, chunk) in chunks.iter().enumerate() {
        let checkpoint_id = format!("{}-checkpoint", chunk.id);
        let mut checkpoint = Checkpoint {
            id: checkpoint_id.clone(),
            chunk_id: chunk.id.clone(),
            state: CheckpointState::Processing,
            result: None,
            error: None,
            timestamp: chrono::Utc::now(),
            context: serde_json::json!({ "index": i, "total": chunks.len() }),
        };
        let _ = store.save(checkpoint.clone());
        on_event(ProgressEvent::Checkpoint(Box::new(checkpoint.clone())));

        let context = ChunkContext {
            last_results: last_results.iter().rev().take(3).cloned().collect(),
            index: i,
            total: chunks.len(),
            summary: chunk.summary.clone().or_else(|| Some(summaries.get_or_generate(chunk))),
        };

        let mut attempt = 0u32;
        let outcome = loop {
            match processor.process(chunk, &context).await {
                Ok(value) => {
                    checkpoint.state = CheckpointState::Completed;
                    checkpoint.result = Some(value.clone());
                    let _ = store.save(checkpoint.clone());
                    on_event(ProgressEvent::Result { chunk_id: chunk.id.clone(), value: value.clone() });
                    last_results.push(value.clone());
                    break ChunkOutcome { chunk_id: chunk.id.clone(), state: CheckpointState::Completed, result: Some(value), error: None };
                }
                Err(err) => {
                    let recoverable = err.is_recoverable() || OrchestratorError::classify_message(&err.to_string());
                    if recoverable && attempt < DEFAULT_MAX_RETRIES {
                        attempt += 1;
                        continue;
                    }
                    checkpoint.state = CheckpointState::Failed;
                    checkpoint.error = Some(err.to_string());
                    let _ = store.save(checkpoint.clone());
                    break ChunkOutcome { chunk_id: chunk.id.clone(), state: CheckpointState::Failed, result: None, error: Some(err.to_string()) };
                }
            }
        };

        outcomes.push(outcome);

        if (i + 1) % SUMMARY_EVERY == 0 {
            let text = summaries.get_or_generate(chunk);
            on_event(ProgressEvent::Summary { after_chunk: i + 1, text });
        }

        let percent = (((i + 1) as f64 / chunks.len() as f64) * 100.0).round() as u8;
        on_event(ProgressEvent::Progress { percent });
    }

    outcomes
}

/// Compresses a message sequence for inclusion in a subsequent prompt:
/// system messages truncated to ~1000 chars, user messages kept verbatim,
/// assistant messages truncated beyond 500 chars, tool messages dropped.
/// Returns the compressed messages plus (tokens_before, tokens_after).
pub fn compress_messages(messages: &[CoreMessage]) -> (Vec<CoreMessage>, u32, u32) {
    let before: u32 = messages.iter().map(message_tokens).sum();

    let compressed: Vec<CoreMessage> = messages
        .iter()
        .filter(|m| m.role != MessageRole::Tool)
        .map(|m| match m.role {
            MessageRole::System => CoreMessage { role: m.role.clone(), content: truncate_chars(&m.content, 1000) },
            MessageRole::Assistant => CoreMessage { role: m.role.clone(), content: truncate_chars(&m.content, 500) },
            _ => m.clone(),
        })
        .collect();

    let after: u32 = compressed.iter().map(message_tokens).sum();
    (compressed, before, after)
}

fn truncate_chars(content: &str, max_chars: usize) -> String {
    if content.chars().count() <= max_chars {
        content.to_string()
    } else {
        let truncated: String = content.chars().take(max_chars).collect();
        format!("{truncated}...")
    }
}

const TRUNCATION_MARKER: &str = "\n...[content elided for length]...\n";

/// Emergency line-based truncation: retains the first 30% and last 10%
/// of lines, replacing the elided middle with a single sentinel line.
pub fn emergency_truncate(content: &str, max_tokens: u32) -> String {
    if estimate(content) <= max_tokens {
        return content.to_string();
    }

    let lines: Vec<&str> = content.lines().collect();
    if lines.len() < 4 {
        // Too few lines to usefully window; fall back to a char-based cut.
        let approx_chars = (max_tokens as usize) * 4;
        return truncate_chars(content, approx_chars);
    }

    let head_count = ((lines.len() as f64) * 0.3).ceil() as usize;
    let tail_count = ((lines.len() as f64) * 0.1).ceil() as usize;
    let mut kept: Vec<&str> = Vec::new();
    kept.extend(&lines[..head_count.min(lines.len())]);
    kept.push(TRUNCATION_MARKER);
    let tail_start = lines.len().saturating_sub(tail_count);
    kept.extend(&lines[tail_start.max(head_count)..]);

    kept.join("\n")
}
