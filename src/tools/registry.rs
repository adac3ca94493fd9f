//! Tool Registry: holds every registered `Tool` by name and validates a
//! requested invocation's capability requirements against what the
//! caller was granted before execution.

use std::collections::HashMap;
use std::sync::Arc;

use super::traits::{Capability, Tool, ToolInfo, ToolMetadata};

pub struct ValidationOutcome {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: HashMap::new() }
    }

    /// Idempotent overwrite; logs a warning on replacement via `tracing`.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            tracing::warn!(tool = %name, "overwriting existing tool registration");
        }
        self.tools.insert(name, tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn list(&self) -> Vec<ToolInfo> {
        self.tools
            .values()
            .map(|t| ToolInfo { name: t.name().to_string(), description: t.description().to_string(), schema: t.parameters_schema() })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Tool>> {
        self.tools.values()
    }

    /// Registration metadata for every registered tool, e.g. for a
    /// capability/tag-driven tool picker.
    pub fn list_metadata(&self) -> Vec<ToolMetadata> {
        self.tools.values().map(|t| t.metadata()).collect()
    }

    /// Check that `name` is registered and that `granted` is a superset of
    /// the tool's required capabilities; emit warnings for high-risk or
    /// irreversible tools.
    pub fn validate(&self, name: &str, granted: &[Capability]) -> ValidationOutcome {
        let Some(tool) = self.get(name) else {
            return ValidationOutcome { valid: false, errors: vec![format!("tool '{name}' is not registered")], warnings: vec![] };
        };

        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        for required in tool.required_capabilities() {
            if !granted.contains(&required) {
                errors.push(format!("missing capability {required:?}"));
            }
        }

        if matches!(tool.risk_level(), super::traits::RiskLevel::High | super::traits::RiskLevel::Critical) {
            warnings.push(format!("tool '{name}' is high-risk"));
        }
        if !tool.reversible() {
            warnings.push(format!("tool '{name}' is not reversible"));
        }

        ValidationOutcome { valid: errors.is_empty(), errors, warnings }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::traits::{RiskLevel, ToolResult};
    use async_trait::async_trait;
    use serde_json::{json, Value};

    struct DummyTool {
        name: &'static str,
        caps: Vec<Capability>,
        risk: RiskLevel,
        reversible: bool,
    }

    #[async_trait]
    impl Tool for DummyTool {
        fn name(&self) -> &str {
            self.name
        }
        fn description(&self) -> &str {
            "dummy"
        }
        fn parameters_schema(&self) -> Value {
            json!({})
        }
        fn required_capabilities(&self) -> Vec<Capability> {
            self.caps.clone()
        }
        fn risk_level(&self) -> RiskLevel {
            self.risk
        }
        fn reversible(&self) -> bool {
            self.reversible
        }
        async fn execute(&self, _args: Value) -> Result<ToolResult, String> {
            Ok(ToolResult::ok("ok"))
        }
    }

    #[test]
    fn register_and_get() {
        let mut reg = ToolRegistry::new();
        reg.register(Arc::new(DummyTool { name: "echo", caps: vec![], risk: RiskLevel::Low, reversible: true }));
        assert!(reg.get("echo").is_some());
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn register_overwrites_idempotently() {
        let mut reg = ToolRegistry::new();
        reg.register(Arc::new(DummyTool { name: "echo", caps: vec![], risk: RiskLevel::Low, reversible: true }));
        reg.register(Arc::new(DummyTool { name: "echo", caps: vec![], risk: RiskLevel::Low, reversible: true }));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn validate_missing_tool() {
        let reg = ToolRegistry::new();
        let outcome = reg.validate("nope", &[]);
        assert!(!outcome.valid);
    }

    #[test]
    fn validate_missing_capability_is_invalid() {
        let mut reg = ToolRegistry::new();
        reg.register(Arc::new(DummyTool {
            name: "shell",
            caps: vec![Capability::Execute],
            risk: RiskLevel::High,
            reversible: false,
        }));
        let outcome = reg.validate("shell", &[]);
        assert!(!outcome.valid);
        assert!(!outcome.errors.is_empty());
        assert!(outcome.warnings.iter().any(|w| w.contains("high-risk")));
        assert!(outcome.warnings.iter().any(|w| w.contains("not reversible")));
    }

    #[test]
    fn list_metadata_covers_every_registered_tool() {
        let mut reg = ToolRegistry::new();
        reg.register(Arc::new(DummyTool { name: "echo", caps: vec![], risk: RiskLevel::Low, reversible: true }));
        reg.register(Arc::new(DummyTool { name: "shell", caps: vec![Capability::Execute], risk: RiskLevel::High, reversible: false }));
        let metadata = reg.list_metadata();
        assert_eq!(metadata.len(), 2);
        assert!(metadata.iter().any(|m| m.risk_level == RiskLevel::High && !m.reversible));
    }

    #[test]
    fn validate_with_granted_capability_is_valid() {
        let mut reg = ToolRegistry::new();
        reg.register(Arc::new(DummyTool {
            name: "shell",
            caps: vec![Capability::Execute],
            risk: RiskLevel::Low,
            reversible: true,
        }));
        let outcome = reg.validate("shell", &[Capability::Execute]);
        assert!(outcome.valid);
        assert!(outcome.warnings.is_empty());
    }
}
