//! File read/write/list tools, with path sanitization contributed by
//! `crate::safety::SecurityPolicy`.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::safety::{RiskLevel as PolicyRisk, SecurityPolicy, ValidationResult};

use super::traits::{Capability, RiskLevel, Tool, ToolResult};

pub struct FileReadTool {
    policy: Arc<SecurityPolicy>,
}

impl FileReadTool {
    pub fn new(policy: Arc<SecurityPolicy>) -> Self {
        Self { policy }
    }
}

#[async_trait]
impl Tool for FileReadTool {
    fn name(&self) -> &str {
        "file_read"
    }

    fn description(&self) -> &str {
        "Read the contents of a file. Use max_lines to limit output for large files."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string" },
                "max_lines": { "type": "integer", "minimum": 1 }
            },
            "required": ["path"]
        })
    }

    fn required_capabilities(&self) -> Vec<Capability> {
        vec![Capability::ReadFile]
    }

    fn preflight(&self, args: &Value) -> crate::safety::PreflightReport {
        let paths = path_args(args);
        crate::safety::preflight_files(crate::safety::OperationType::FileRead, &paths)
    }

    async fn execute(&self, args: Value) -> Result<ToolResult, String> {
        let path = required_path(&args, "path")?;
        gate_path(&self.policy, &path)?;
        self.policy.log_action(self.name(), args.clone(), PolicyRisk::Low, "allowed", None);

        let max_lines = args.get("max_lines").and_then(Value::as_u64).map(|n| n as usize);
        let contents = fs::read_to_string(&path).map_err(|e| format!("failed to read '{}': {e}", path.display()))?;

        let output = match max_lines {
            Some(n) => contents.lines().take(n).collect::<Vec<_>>().join("\n"),
            None => contents,
        };

        Ok(ToolResult::ok(output).with_metadata(json!({ "path": path.display().to_string() })))
    }
}

pub struct FileWriteTool {
    policy: Arc<SecurityPolicy>,
}

impl FileWriteTool {
    pub fn new(policy: Arc<SecurityPolicy>) -> Self {
        Self { policy }
    }
}

#[async_trait]
impl Tool for FileWriteTool {
    fn name(&self) -> &str {
        "file_write"
    }

    fn description(&self) -> &str {
        "Write content to a file, creating it if it does not exist and overwriting it if it does."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string" },
                "content": { "type": "string" }
            },
            "required": ["path", "content"]
        })
    }

    fn required_capabilities(&self) -> Vec<Capability> {
        vec![Capability::WriteFile]
    }

    fn risk_level(&self) -> RiskLevel {
        RiskLevel::Medium
    }

    fn preflight(&self, args: &Value) -> crate::safety::PreflightReport {
        let paths = path_args(args);
        crate::safety::preflight_files(crate::safety::OperationType::FileWrite, &paths)
    }

    async fn execute(&self, args: Value) -> Result<ToolResult, String> {
        let path = required_path(&args, "path")?;
        let content = args.get("content").and_then(Value::as_str).ok_or("missing required argument 'content'")?.to_string();

        gate_path(&self.policy, &path)?;
        self.policy.log_action(self.name(), args.clone(), PolicyRisk::Medium, "allowed", None);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| format!("failed to create parent dirs: {e}"))?;
        }

        let bytes = content.len();
        fs::write(&path, &content).map_err(|e| format!("failed to write '{}': {e}", path.display()))?;

        Ok(ToolResult::ok(format!("wrote {bytes} bytes to '{}'", path.display())).with_metadata(json!({ "path": path.display().to_string(), "bytes": bytes })))
    }
}

pub struct FileListTool {
    policy: Arc<SecurityPolicy>,
}

impl FileListTool {
    pub fn new(policy: Arc<SecurityPolicy>) -> Self {
        Self { policy }
    }
}

#[async_trait]
impl Tool for FileListTool {
    fn name(&self) -> &str {
        "file_list"
    }

    fn description(&self) -> &str {
        "List the contents of a directory, optionally recursively."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string" },
                "recursive": { "type": "boolean" }
            },
            "required": ["path"]
        })
    }

    fn required_capabilities(&self) -> Vec<Capability> {
        vec![Capability::ReadFile]
    }

    fn preflight(&self, args: &Value) -> crate::safety::PreflightReport {
        let paths = path_args(args);
        crate::safety::preflight_files(crate::safety::OperationType::FileRead, &paths)
    }

    async fn execute(&self, args: Value) -> Result<ToolResult, String> {
        let path = required_path(&args, "path")?;
        let recursive = args.get("recursive").and_then(Value::as_bool).unwrap_or(false);

        gate_path(&self.policy, &path)?;
        self.policy.log_action(self.name(), args.clone(), PolicyRisk::Low, "allowed", None);

        let entries = collect_entries(&path, recursive).map_err(|e| format!("failed to list '{}': {e}", path.display()))?;
        Ok(ToolResult::ok(entries.join("\n")).with_metadata(json!({ "count": entries.len() })))
    }
}

fn gate_path(policy: &SecurityPolicy, path: &Path) -> Result<(), String> {
    match policy.validate_path(path) {
        ValidationResult::Allowed => Ok(()),
        ValidationResult::NeedsApproval => Err("path access requires user approval".into()),
        ValidationResult::Denied(reason) => Err(format!("path denied: {reason}")),
    }
}

fn required_path(args: &Value, key: &str) -> Result<PathBuf, String> {
    args.get(key).and_then(Value::as_str).map(PathBuf::from).ok_or_else(|| format!("missing required argument '{key}'"))
}

/// Extracts the `path` argument as a single-element path list for preflight.
fn path_args(args: &Value) -> Vec<String> {
    args.get("path").and_then(Value::as_str).map(|p| vec![p.to_string()]).unwrap_or_default()
}

fn collect_entries(dir: &Path, recursive: bool) -> std::io::Result<Vec<String>> {
    let mut result = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        result.push(path.display().to_string());
        if recursive && path.is_dir() {
            result.extend(collect_entries(&path, true)?);
        }
    }
    result.sort();
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::safety::AutonomyLevel;
    use tempfile::TempDir;

    fn full_policy() -> Arc<SecurityPolicy> {
        Arc::new(SecurityPolicy::new(AutonomyLevel::Full, None, vec![], 3600, 100))
    }

    #[tokio::test]
    async fn read_existing_file() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("hello.txt");
        fs::write(&file, "hello world").unwrap();

        let tool = FileReadTool::new(full_policy());
        let r = tool.execute(json!({"path": file.display().to_string()})).await.unwrap();
        assert!(r.success);
        assert_eq!(r.output.trim(), "hello world");
    }

    #[tokio::test]
    async fn read_respects_max_lines() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("lines.txt");
        fs::write(&file, "a\nb\nc\nd\ne").unwrap();

        let tool = FileReadTool::new(full_policy());
        let r = tool.execute(json!({"path": file.display().to_string(), "max_lines": 3})).await.unwrap();
        assert_eq!(r.output.lines().count(), 3);
    }

    #[tokio::test]
    async fn read_missing_file_errors() {
        let tool = FileReadTool::new(full_policy());
        let r = tool.execute(json!({"path": "/tmp/__nonexistent_file_xyz__"})).await;
        assert!(r.is_err());
    }

    #[tokio::test]
    async fn write_creates_file() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("output.txt");

        let tool = FileWriteTool::new(full_policy());
        let r = tool.execute(json!({"path": file.display().to_string(), "content": "written"})).await.unwrap();
        assert!(r.success);
        assert_eq!(fs::read_to_string(&file).unwrap(), "written");
    }

    #[tokio::test]
    async fn list_directory() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.txt"), "").unwrap();
        fs::write(dir.path().join("b.txt"), "").unwrap();

        let tool = FileListTool::new(full_policy());
        let r = tool.execute(json!({"path": dir.path().display().to_string()})).await.unwrap();
        assert!(r.output.contains("a.txt"));
        assert!(r.output.contains("b.txt"));
    }

    #[tokio::test]
    async fn list_recursive() {
        let dir = TempDir::new().unwrap();
        let sub = dir.path().join("sub");
        fs::create_dir(&sub).unwrap();
        fs::write(sub.join("nested.txt"), "").unwrap();

        let tool = FileListTool::new(full_policy());
        let r = tool.execute(json!({"path": dir.path().display().to_string(), "recursive": true})).await.unwrap();
        assert!(r.output.contains("nested.txt"));
    }
}
