//! Pre-execution risk analysis: `preflightCommand` and
//! `preflightFiles`, producing a `PreflightReport` with reasons.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::policy::{classify_command_risk, RiskLevel};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    Command,
    FileRead,
    FileWrite,
    FileDelete,
    Other,
}

/// Advisory-only annotations. Per DESIGN.md's Open Question resolution,
/// never consulted by the approval decision algorithm.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CognitiveAnnotation {
    pub intent: Option<String>,
    pub confidence: Option<f32>,
    pub risks: Vec<String>,
    pub suggestions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreflightReport {
    pub risk_level: RiskLevel,
    pub operation_type: OperationType,
    pub reasons: Vec<String>,
    pub affected_paths: Vec<String>,
    pub summary: String,
    pub cognitive: Option<CognitiveAnnotation>,
}

impl PreflightReport {
    /// Built from a tool's static `risk_level()` for tools that don't
    /// implement content-aware preflight of their own.
    pub fn from_static_risk(risk_level: RiskLevel) -> Self {
        let reason = match risk_level {
            RiskLevel::Critical => "Critical static risk classification",
            RiskLevel::High => "High static risk classification",
            RiskLevel::Medium => "Medium static risk classification",
            RiskLevel::Low => "No elevated-risk pattern detected",
        };
        PreflightReport {
            risk_level,
            operation_type: OperationType::Other,
            reasons: vec![reason.to_string()],
            affected_paths: Vec::new(),
            summary: "static risk classification (tool has no content-aware preflight)".to_string(),
            cognitive: None,
        }
    }
}

pub fn preflight_command(command: &str, _working_dir: &Path) -> PreflightReport {
    let risk_level = classify_command_risk(command);
    let mut reasons = Vec::new();

    match risk_level {
        RiskLevel::Critical => reasons.push("Critical destructive pattern detected".to_string()),
        RiskLevel::High => reasons.push("Elevated-privilege or irreversible pattern detected".to_string()),
        RiskLevel::Medium => {
            if command.contains("..") {
                reasons.push("Path traversal ('..') present in command".to_string());
            } else {
                reasons.push("Package install / network / container execution detected".to_string());
            }
        }
        RiskLevel::Low => reasons.push("No elevated-risk pattern detected".to_string()),
    }

    PreflightReport {
        risk_level,
        operation_type: OperationType::Command,
        reasons,
        affected_paths: Vec::new(),
        summary: format!("command preflight: {command}"),
        cognitive: None,
    }
}

pub fn preflight_files(op_type: OperationType, paths: &[String]) -> PreflightReport {
    let mut risk_level = RiskLevel::Low;
    let mut reasons = Vec::new();

    for p in paths {
        if p.contains(".git/") || p.ends_with(".git") {
            risk_level = risk_level.max(RiskLevel::High);
            reasons.push(format!("path touches a .git directory: {p}"));
        }
        if is_env_file(p) {
            risk_level = risk_level.max(RiskLevel::Medium);
            reasons.push(format!("path touches an .env file: {p}"));
        }
    }

    if paths.len() > 20 {
        risk_level = risk_level.max(RiskLevel::Medium);
        reasons.push(format!("batch of {} paths exceeds 20", paths.len()));
    }

    if reasons.is_empty() {
        reasons.push("No elevated-risk pattern detected".to_string());
    }

    PreflightReport {
        risk_level,
        operation_type: op_type,
        reasons,
        affected_paths: paths.to_vec(),
        summary: format!("file preflight over {} path(s)", paths.len()),
        cognitive: None,
    }
}

fn is_env_file(path: &str) -> bool {
    let name = Path::new(path).file_name().and_then(|n| n.to_str()).unwrap_or("");
    name == ".env" || name.starts_with(".env.")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn critical_command_preflight() {
        let report = preflight_command("rm -rf /tmp/x", Path::new("/tmp"));
        assert_eq!(report.risk_level, RiskLevel::Critical);
        assert!(report.reasons.iter().any(|r| r.contains("Critical destructive pattern detected")));
    }

    #[test]
    fn npm_install_preflight_is_medium() {
        let report = preflight_command("npm install lodash", Path::new("/tmp"));
        assert_eq!(report.risk_level, RiskLevel::Medium);
        assert!(report.reasons.iter().any(|r| r.contains("Package install")));
    }

    #[test]
    fn git_dir_touch_is_high() {
        let report = preflight_files(OperationType::FileWrite, &[".git/config".to_string()]);
        assert_eq!(report.risk_level, RiskLevel::High);
    }

    #[test]
    fn env_file_touch_is_at_least_medium() {
        let report = preflight_files(OperationType::FileRead, &[".env".to_string()]);
        assert_eq!(report.risk_level, RiskLevel::Medium);
    }

    #[test]
    fn large_batch_is_at_least_medium() {
        let paths: Vec<String> = (0..25).map(|i| format!("file{i}.txt")).collect();
        let report = preflight_files(OperationType::FileRead, &paths);
        assert_eq!(report.risk_level, RiskLevel::Medium);
    }

    #[test]
    fn small_batch_of_plain_files_is_low() {
        let report = preflight_files(OperationType::FileRead, &["a.txt".to_string(), "b.txt".to_string()]);
        assert_eq!(report.risk_level, RiskLevel::Low);
    }

    #[test]
    fn static_risk_report_carries_the_given_level() {
        let report = PreflightReport::from_static_risk(RiskLevel::High);
        assert_eq!(report.risk_level, RiskLevel::High);
        assert_eq!(report.operation_type, OperationType::Other);
    }
}
