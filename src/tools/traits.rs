//! The `Tool` trait boundary: capabilities, risk level, and the
//! execution contract every sandboxed tool implements.

use async_trait::async_trait;
use serde_json::Value;

#[derive(Debug, Clone)]
pub struct ToolResult {
    pub output: String,
    pub success: bool,
    pub metadata: Option<Value>,
}

impl ToolResult {
    pub fn ok(output: impl Into<String>) -> Self {
        Self { output: output.into(), success: true, metadata: None }
    }

    pub fn err(output: impl Into<String>) -> Self {
        Self { output: output.into(), success: false, metadata: None }
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Capabilities a tool may require; used by `ToolRegistry::validate` to
/// check a caller's granted-capability set against what a tool declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Execute,
    ReadFile,
    WriteFile,
    DeleteFile,
    FetchNetwork,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl From<RiskLevel> for crate::safety::RiskLevel {
    fn from(risk: RiskLevel) -> Self {
        match risk {
            RiskLevel::Low => crate::safety::RiskLevel::Low,
            RiskLevel::Medium => crate::safety::RiskLevel::Medium,
            RiskLevel::High => crate::safety::RiskLevel::High,
            RiskLevel::Critical => crate::safety::RiskLevel::Critical,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ToolMetadata {
    pub description: String,
    pub category: String,
    pub risk_level: RiskLevel,
    pub reversible: bool,
    pub estimated_duration_ms: u64,
    pub required_capabilities: Vec<Capability>,
    pub tags: Vec<String>,
    pub file_type_globs: Vec<String>,
    pub semver: String,
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn parameters_schema(&self) -> Value;

    /// Capabilities this tool requires; used for registry-time validation
    /// against a caller's granted set.
    fn required_capabilities(&self) -> Vec<Capability> {
        Vec::new()
    }

    fn risk_level(&self) -> RiskLevel {
        RiskLevel::Low
    }

    fn reversible(&self) -> bool {
        true
    }

    /// Static registration metadata surfaced by `ToolRegistry::list_metadata`.
    fn metadata(&self) -> ToolMetadata {
        ToolMetadata {
            description: self.description().to_string(),
            category: "general".to_string(),
            risk_level: self.risk_level(),
            reversible: self.reversible(),
            estimated_duration_ms: 0,
            required_capabilities: self.required_capabilities(),
            tags: Vec::new(),
            file_type_globs: Vec::new(),
            semver: "0.1.0".to_string(),
        }
    }

    /// Dynamic, content-aware risk assessment consulted by the orchestrator's
    /// approval gate. Defaults to a single-reason report derived from the
    /// static `risk_level()`; tools whose real risk depends on their
    /// arguments (shell commands, file paths) override this with
    /// `crate::safety::preflight_command`/`preflight_files`.
    fn preflight(&self, _args: &Value) -> crate::safety::PreflightReport {
        crate::safety::PreflightReport::from_static_risk(self.risk_level().into())
    }

    async fn execute(&self, args: Value) -> Result<ToolResult, String>;
}

#[derive(Debug, Clone)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
    pub schema: Value,
}
