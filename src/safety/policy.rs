//! Risk classification, command/path validation, rate limiting and the
//! audit log. `RiskLevel` has four tiers (`Low`/`Medium`/`High`/
//! `Critical`), and `classify_command_risk` matches against a list of
//! destructive/elevated-privilege command patterns.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutonomyLevel {
    ReadOnly,
    Supervised,
    Full,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ValidationResult {
    Allowed,
    NeedsApproval,
    Denied(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub tool_name: String,
    pub args: Value,
    pub risk_level: RiskLevel,
    pub decision: String,
    pub result: Option<String>,
}

/// Fixed-window-ish sliding request counter used for rate limiting.
struct SlidingWindow {
    window: Duration,
    limit: u32,
    hits: VecDeque<Instant>,
}

impl SlidingWindow {
    fn new(window: Duration, limit: u32) -> Self {
        Self { window, limit, hits: VecDeque::new() }
    }

    fn record_and_check(&mut self) -> bool {
        let now = Instant::now();
        while let Some(&front) = self.hits.front() {
            if now.duration_since(front) > self.window {
                self.hits.pop_front();
            } else {
                break;
            }
        }
        if self.hits.len() as u32 >= self.limit {
            return false;
        }
        self.hits.push_back(now);
        true
    }

    fn count(&self) -> usize {
        self.hits.len()
    }
}

const CRITICAL_PATTERNS: &[&str] = &["rm -rf", "fdisk", "mkfs", "dd if=", "format", "shutdown", "reboot"];
const HIGH_PATTERNS: &[&str] = &["sudo", "chmod 777", "chown", "del "];
const MEDIUM_PATTERNS: &[&str] = &["npm install", "yarn add", "docker run", "curl", "wget"];

const BLOCKED_EXECUTABLES: &[&str] = &[
    "rm", "sudo", "su", "shutdown", "reboot", "halt", "poweroff", "dd", "mkfs", "fdisk", "parted",
    "format", "del", "rmdir",
];

fn detect_injection(command: &str) -> Option<&'static str> {
    let checks: &[(&str, &str)] = &[
        ("`", "backtick command substitution detected"),
        ("$(", "$() command substitution detected"),
        ("${", "${} parameter expansion detected"),
        (" >> ", "append redirection detected"),
        (" > ", "output redirection detected"),
        (">", "output redirection detected"),
        (" && ", "command chaining (&&) detected"),
        (" || ", "command chaining (||) detected"),
        (" ; ", "command chaining (;) detected"),
        (";", "command chaining (;) detected"),
        (" | ", "pipe detected"),
    ];
    for (pattern, reason) in checks {
        if command.contains(pattern) {
            return Some(reason);
        }
    }
    None
}

/// Classify a raw command string by risk, escalation only, first match wins.
pub fn classify_command_risk(command: &str) -> RiskLevel {
    let lower = command.to_lowercase();

    if CRITICAL_PATTERNS.iter().any(|p| lower.contains(p)) {
        return RiskLevel::Critical;
    }
    if HIGH_PATTERNS.iter().any(|p| lower.contains(p)) {
        return RiskLevel::High;
    }
    if MEDIUM_PATTERNS.iter().any(|p| lower.contains(p)) || lower.contains("..") {
        return RiskLevel::Medium;
    }
    RiskLevel::Low
}

pub struct SecurityPolicy {
    autonomy_level: AutonomyLevel,
    workspace_root: Option<PathBuf>,
    blocked_dirs: Vec<PathBuf>,
    rate_limiter: Mutex<SlidingWindow>,
    action_log: Mutex<Vec<AuditEntry>>,
}

impl SecurityPolicy {
    pub fn new(
        autonomy_level: AutonomyLevel,
        workspace_root: Option<PathBuf>,
        blocked_dirs: Vec<PathBuf>,
        rate_window_secs: u64,
        rate_limit: u32,
    ) -> Self {
        Self {
            autonomy_level,
            workspace_root,
            blocked_dirs,
            rate_limiter: Mutex::new(SlidingWindow::new(Duration::from_secs(rate_window_secs), rate_limit)),
            action_log: Mutex::new(Vec::new()),
        }
    }

    pub fn default_policy() -> Self {
        Self::new(AutonomyLevel::Supervised, None, default_blocked_dirs(), 60, 60)
    }

    pub fn classify_command_risk(&self, command: &str) -> RiskLevel {
        classify_command_risk(command)
    }

    /// Autonomy-independent checks only: injection patterns and the
    /// blocked-executable list. Never returns `NeedsApproval`. Callers that
    /// already gate through `apply_autonomy` upstream (the orchestrator
    /// loop, driven by a preflight report) use this instead of
    /// `validate_command` so the autonomy check isn't applied twice.
    pub fn validate_command_hard(&self, command: &str) -> ValidationResult {
        if let Some(reason) = detect_injection(command) {
            return ValidationResult::Denied(reason.to_string());
        }

        let executable = command.split_whitespace().next().unwrap_or("");
        if BLOCKED_EXECUTABLES.contains(&executable) {
            return ValidationResult::Denied(format!("'{executable}' is a blocked executable"));
        }

        ValidationResult::Allowed
    }

    pub fn validate_command(&self, command: &str) -> ValidationResult {
        if let ValidationResult::Denied(reason) = self.validate_command_hard(command) {
            return ValidationResult::Denied(reason);
        }

        let risk = self.classify_command_risk(command);
        self.apply_autonomy(risk)
    }

    pub fn apply_autonomy(&self, risk: RiskLevel) -> ValidationResult {
        match self.autonomy_level {
            AutonomyLevel::ReadOnly => {
                if risk == RiskLevel::Low {
                    ValidationResult::Allowed
                } else {
                    ValidationResult::Denied("read-only autonomy level permits only low-risk actions".into())
                }
            }
            AutonomyLevel::Supervised => {
                if risk == RiskLevel::Low {
                    ValidationResult::Allowed
                } else {
                    ValidationResult::NeedsApproval
                }
            }
            AutonomyLevel::Full => {
                let mut limiter = match self.rate_limiter.lock() {
                    Ok(l) => l,
                    Err(e) => e.into_inner(),
                };
                if limiter.record_and_check() {
                    ValidationResult::Allowed
                } else {
                    ValidationResult::Denied("rate limit exceeded".into())
                }
            }
        }
    }

    pub fn validate_path(&self, path: &Path) -> ValidationResult {
        let raw = path.to_string_lossy();
        if raw.contains('\0') {
            return ValidationResult::Denied("null byte in path".into());
        }
        if raw.contains("..") {
            return ValidationResult::Denied("path traversal ('..') not permitted".into());
        }

        let resolved = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());

        for blocked in &self.blocked_dirs {
            if resolved.starts_with(blocked) {
                return ValidationResult::Denied(format!("path under blocked directory {}", blocked.display()));
            }
        }

        if let Some(root) = &self.workspace_root {
            let root_resolved = root.canonicalize().unwrap_or_else(|_| root.clone());
            if !resolved.starts_with(&root_resolved) {
                return ValidationResult::Denied("path escapes workspace root".into());
            }
        }

        ValidationResult::Allowed
    }

    pub fn log_action(&self, tool_name: &str, args: Value, risk_level: RiskLevel, decision: &str, result: Option<String>) {
        let entry = AuditEntry {
            timestamp: chrono::Utc::now(),
            tool_name: tool_name.to_string(),
            args,
            risk_level,
            decision: decision.to_string(),
            result,
        };
        if let Ok(mut log) = self.action_log.lock() {
            log.push(entry);
        }
    }

    pub fn audit_log(&self) -> Vec<AuditEntry> {
        self.action_log.lock().map(|l| l.clone()).unwrap_or_default()
    }

    pub fn rate_limit_count(&self) -> usize {
        self.rate_limiter.lock().map(|l| l.count()).unwrap_or(0)
    }

    pub fn autonomy_level(&self) -> AutonomyLevel {
        self.autonomy_level
    }
}

pub fn default_blocked_dirs() -> Vec<PathBuf> {
    let mut dirs = vec![
        PathBuf::from("/etc"),
        PathBuf::from("/proc"),
        PathBuf::from("/sys"),
        PathBuf::from("/dev"),
    ];
    if let Some(home) = dirs::home_dir() {
        dirs.push(home.join(".ssh"));
        dirs.push(home.join(".aws"));
        dirs.push(home.join(".gnupg"));
        dirs.push(home.join(".config").join("gcloud"));
    }
    #[cfg(unix)]
    dirs.push(PathBuf::from("/root"));
    dirs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(autonomy: AutonomyLevel) -> SecurityPolicy {
        SecurityPolicy::new(autonomy, None, vec![], 3600, 100)
    }

    #[test]
    fn critical_patterns_classify_critical() {
        assert_eq!(classify_command_risk("rm -rf /tmp/x"), RiskLevel::Critical);
        assert_eq!(classify_command_risk("mkfs.ext4 /dev/sda1"), RiskLevel::Critical);
        assert_eq!(classify_command_risk("shutdown -h now"), RiskLevel::Critical);
    }

    #[test]
    fn high_patterns_classify_high() {
        assert_eq!(classify_command_risk("sudo rm foo"), RiskLevel::High);
        assert_eq!(classify_command_risk("chmod 777 /tmp"), RiskLevel::High);
    }

    #[test]
    fn medium_patterns_classify_medium() {
        assert_eq!(classify_command_risk("npm install lodash"), RiskLevel::Medium);
        assert_eq!(classify_command_risk("curl https://example.com"), RiskLevel::Medium);
    }

    #[test]
    fn plain_commands_classify_low() {
        assert_eq!(classify_command_risk("ls -la"), RiskLevel::Low);
    }

    #[test]
    fn injection_patterns_denied() {
        let p = policy(AutonomyLevel::Full);
        assert!(matches!(p.validate_command("echo hi && rm -rf /"), ValidationResult::Denied(_)));
        assert!(matches!(p.validate_command("echo `whoami`"), ValidationResult::Denied(_)));
        assert!(matches!(p.validate_command("echo $(whoami)"), ValidationResult::Denied(_)));
        assert!(matches!(p.validate_command("ls | grep foo"), ValidationResult::Denied(_)));
    }

    #[test]
    fn blocked_executable_denied() {
        let p = policy(AutonomyLevel::Full);
        assert!(matches!(p.validate_command("rm foo.txt"), ValidationResult::Denied(_)));
    }

    #[test]
    fn readonly_denies_non_low_risk() {
        let p = policy(AutonomyLevel::ReadOnly);
        assert_eq!(p.validate_command("ls"), ValidationResult::Allowed);
        assert!(matches!(p.validate_command("npm install x"), ValidationResult::Denied(_)));
    }

    #[test]
    fn supervised_requires_approval_above_low() {
        let p = policy(AutonomyLevel::Supervised);
        assert_eq!(p.validate_command("ls"), ValidationResult::Allowed);
        assert_eq!(p.validate_command("npm install x"), ValidationResult::NeedsApproval);
    }

    #[test]
    fn full_autonomy_rate_limited() {
        let p = SecurityPolicy::new(AutonomyLevel::Full, None, vec![], 3600, 2);
        assert_eq!(p.validate_command("ls"), ValidationResult::Allowed);
        assert_eq!(p.validate_command("ls"), ValidationResult::Allowed);
        assert!(matches!(p.validate_command("ls"), ValidationResult::Denied(_)));
    }

    #[test]
    fn path_traversal_denied() {
        let p = policy(AutonomyLevel::Full);
        assert!(matches!(p.validate_path(Path::new("/tmp/../etc/passwd")), ValidationResult::Denied(_)));
    }

    #[test]
    fn null_byte_path_denied() {
        let p = policy(AutonomyLevel::Full);
        assert!(matches!(p.validate_path(Path::new("/tmp/x\0y")), ValidationResult::Denied(_)));
    }

    #[test]
    fn blocked_dir_denied() {
        let p = SecurityPolicy::new(AutonomyLevel::Full, None, vec![PathBuf::from("/etc")], 3600, 100);
        assert!(matches!(p.validate_path(Path::new("/etc/passwd")), ValidationResult::Denied(_)));
    }

    #[test]
    fn audit_log_records_entries() {
        let p = policy(AutonomyLevel::Full);
        p.log_action("shell", serde_json::json!({}), RiskLevel::Low, "allowed", None);
        assert_eq!(p.audit_log().len(), 1);
    }
}
