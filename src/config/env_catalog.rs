//! Frozen, compile-time env-var catalog: every environment
//! variable this crate recognizes, mapped to the config key it
//! overrides. Optional unless a deployment chooses to require one.

pub struct EnvVarSpec {
    pub var: &'static str,
    pub config_key: &'static str,
    pub description: &'static str,
}

pub const CATALOG: &[EnvVarSpec] = &[
    EnvVarSpec { var: "TURNFORGE_CONFIG", config_key: "(config file path)", description: "Overrides the config.toml path" },
    EnvVarSpec { var: "TURNFORGE_PROVIDER_ID", config_key: "provider.default_id", description: "Default LLM provider id" },
    EnvVarSpec { var: "TURNFORGE_PROVIDER_MODEL", config_key: "provider.default_model", description: "Default model name" },
    EnvVarSpec { var: "TURNFORGE_SECURITY_LEVEL", config_key: "security.autonomy_level", description: "read_only | supervised | full" },
    EnvVarSpec { var: "TURNFORGE_MAX_CONTEXT_TOKENS", config_key: "tokens.max_context_tokens", description: "Context ceiling before emergency truncation applies" },
    EnvVarSpec { var: "TURNFORGE_MAX_TOKENS_PER_CHUNK", config_key: "tokens.max_tokens_per_chunk", description: "Progressive chunk token budget" },
    EnvVarSpec { var: "TURNFORGE_APPROVAL_TIER", config_key: "approval.tier", description: "basic | enterprise" },
    EnvVarSpec { var: "TURNFORGE_APPROVAL_TIMEOUT_MS", config_key: "approval.default_timeout_ms", description: "Approval prompt timeout before the risk-based default applies" },
    EnvVarSpec { var: "TURNFORGE_MAX_CONCURRENT_AGENTS", config_key: "scheduler.max_concurrent_agents", description: "Agent Scheduler fan-out concurrency cap" },
    EnvVarSpec { var: "TURNFORGE_AUDIT_MAX_ENTRIES", config_key: "audit.max_entries", description: "Audit log bounded-retention cap" },
    EnvVarSpec { var: "TURNFORGE_LOG_DIR", config_key: "(logging)", description: "Overrides the daily-rotating log directory" },
    EnvVarSpec { var: "RUST_LOG", config_key: "(logging)", description: "tracing-subscriber EnvFilter directive" },
];

pub fn lookup(var: &str) -> Option<&'static EnvVarSpec> {
    CATALOG.iter().find(|spec| spec.var == var)
}
