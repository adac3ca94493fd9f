//! Configuration schema: provider wiring, security autonomy, token
//! budgets, approval defaults, the scheduler's concurrency cap, and
//! audit retention.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub default_id: String,
    pub default_model: String,
    pub request_timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self { default_id: "openai".to_string(), default_model: "gpt-4o-mini".to_string(), request_timeout_secs: 60, max_retries: 3 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    pub autonomy_level: String,
    pub workspace_root: Option<String>,
    pub blocked_commands: Vec<String>,
    pub rate_limit_per_minute: u32,
    pub rate_limit_per_hour: u32,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            autonomy_level: "supervised".to_string(),
            workspace_root: None,
            blocked_commands: Vec::new(),
            rate_limit_per_minute: 60,
            rate_limit_per_hour: 600,
        }
    }
}

/// Default context ceiling of 100,000 tokens, overridable via
/// `TURNFORGE_MAX_CONTEXT_TOKENS` (see DESIGN.md for the rationale).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenConfig {
    pub max_context_tokens: u32,
    pub max_tokens_per_chunk: u32,
    pub chat_trim_headroom: u32,
    pub emergency_truncate_tokens: u32,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self { max_context_tokens: 100_000, max_tokens_per_chunk: 2_500, chat_trim_headroom: 4_000, emergency_truncate_tokens: 120_000 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApprovalConfig {
    pub tier: String,
    pub default_timeout_ms: u64,
    pub plan_execution_auto_approve: bool,
}

impl Default for ApprovalConfig {
    fn default() -> Self {
        Self { tier: "basic".to_string(), default_timeout_ms: 30_000, plan_execution_auto_approve: false }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub max_concurrent_agents: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { max_concurrent_agents: 3 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    pub max_entries: usize,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self { max_entries: 50_000 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub provider: ProviderConfig,
    pub security: SecurityConfig,
    pub tokens: TokenConfig,
    pub approval: ApprovalConfig,
    pub scheduler: SchedulerConfig,
    pub audit: AuditConfig,
}

impl AppConfig {
    /// Applies a single dotted-path setter (e.g. `tokens.max_context_tokens`)
    /// with basic type/range validation.
    pub fn apply_patch(&mut self, key: &str, value: &str) -> Result<(), String> {
        match key {
            "provider.default_id" => self.provider.default_id = value.to_string(),
            "provider.default_model" => self.provider.default_model = value.to_string(),
            "provider.request_timeout_secs" => self.provider.request_timeout_secs = parse_u64(value)?,
            "provider.max_retries" => self.provider.max_retries = parse_u32(value)?,
            "security.autonomy_level" => {
                if !["read_only", "supervised", "full"].contains(&value) {
                    return Err(format!("invalid autonomy_level: {value}"));
                }
                self.security.autonomy_level = value.to_string();
            }
            "security.workspace_root" => self.security.workspace_root = Some(value.to_string()),
            "security.rate_limit_per_minute" => self.security.rate_limit_per_minute = parse_u32(value)?,
            "security.rate_limit_per_hour" => self.security.rate_limit_per_hour = parse_u32(value)?,
            "tokens.max_context_tokens" => self.tokens.max_context_tokens = parse_u32(value)?,
            "tokens.max_tokens_per_chunk" => self.tokens.max_tokens_per_chunk = parse_u32(value)?,
            "tokens.chat_trim_headroom" => self.tokens.chat_trim_headroom = parse_u32(value)?,
            "tokens.emergency_truncate_tokens" => self.tokens.emergency_truncate_tokens = parse_u32(value)?,
            "approval.tier" => {
                if !["basic", "enterprise"].contains(&value) {
                    return Err(format!("invalid approval tier: {value}"));
                }
                self.approval.tier = value.to_string();
            }
            "approval.default_timeout_ms" => self.approval.default_timeout_ms = parse_u64(value)?,
            "approval.plan_execution_auto_approve" => self.approval.plan_execution_auto_approve = parse_bool(value)?,
            "scheduler.max_concurrent_agents" => self.scheduler.max_concurrent_agents = parse_usize(value)?,
            "audit.max_entries" => self.audit.max_entries = parse_usize(value)?,
            other => return Err(format!("unknown config key: {other}")),
        }
        Ok(())
    }
}

fn parse_u32(value: &str) -> Result<u32, String> {
    value.parse().map_err(|_| format!("expected an integer, got '{value}'"))
}

fn parse_u64(value: &str) -> Result<u64, String> {
    value.parse().map_err(|_| format!("expected an integer, got '{value}'"))
}

fn parse_usize(value: &str) -> Result<usize, String> {
    value.parse().map_err(|_| format!("expected an integer, got '{value}'"))
}

fn parse_bool(value: &str) -> Result<bool, String> {
    match value {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        other => Err(format!("expected a boolean, got '{other}'")),
    }
}
