//! Sandboxed shell execution: security-gated `sh -c` execution with an
//! output cap + truncation sentinel, a configurable per-invocation
//! timeout with a soft-then-hard kill grace period, an optional
//! streaming callback, and opt-in bounded retry with backoff.

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::time::timeout;

use crate::safety::{SecurityPolicy, ValidationResult};

use super::traits::{Capability, RiskLevel, Tool, ToolResult};

pub const MAX_OUTPUT_LENGTH: usize = 30_000;
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;
pub const MAX_TIMEOUT_SECS: u64 = 600;
const GRACE_PERIOD: Duration = Duration::from_secs(5);
const TRUNCATION_SENTINEL: &str = "\n...[output truncated]";

pub type StreamCallback = Arc<dyn Fn(&str) + Send + Sync>;

pub struct ShellTool {
    policy: Arc<SecurityPolicy>,
}

impl ShellTool {
    pub fn new(policy: Arc<SecurityPolicy>) -> Self {
        Self { policy }
    }
}

#[async_trait]
impl Tool for ShellTool {
    fn name(&self) -> &str {
        "shell_execute"
    }

    fn description(&self) -> &str {
        "Execute a shell command in a sandboxed child process with output capping and a timeout."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": { "type": "string" },
                "timeout_secs": { "type": "integer", "minimum": 1, "maximum": MAX_TIMEOUT_SECS },
                "retries": { "type": "integer", "minimum": 0, "maximum": 10 }
            },
            "required": ["command"]
        })
    }

    fn required_capabilities(&self) -> Vec<Capability> {
        vec![Capability::Execute]
    }

    fn risk_level(&self) -> RiskLevel {
        RiskLevel::High
    }

    fn reversible(&self) -> bool {
        false
    }

    /// Content-aware risk: the orchestrator's approval gate uses this
    /// instead of the static `risk_level()` constant above.
    fn preflight(&self, args: &Value) -> crate::safety::PreflightReport {
        let command = args.get("command").and_then(Value::as_str).unwrap_or("");
        crate::safety::preflight_command(command, std::path::Path::new("."))
    }

    async fn execute(&self, args: Value) -> Result<ToolResult, String> {
        let command = args.get("command").and_then(Value::as_str).ok_or("missing required argument 'command'")?.to_string();

        let timeout_secs = args
            .get("timeout_secs")
            .and_then(Value::as_u64)
            .unwrap_or(DEFAULT_TIMEOUT_SECS)
            .min(MAX_TIMEOUT_SECS);
        let retries = args.get("retries").and_then(Value::as_u64).unwrap_or(0).min(10) as u32;

        // Autonomy-level gating already happened upstream, driven by
        // `preflight()`'s dynamic risk; only the hard denials apply here.
        match self.policy.validate_command_hard(&command) {
            ValidationResult::Allowed => {}
            ValidationResult::NeedsApproval => return Err("command requires user approval".into()),
            ValidationResult::Denied(reason) => return Err(format!("command denied: {reason}")),
        }

        self.policy.log_action(self.name(), args.clone(), self.policy.classify_command_risk(&command), "allowed", None);

        let mut attempt = 0;
        loop {
            match run_once(&command, Duration::from_secs(timeout_secs), None).await {
                Ok(result) => return Ok(result),
                Err(e) if attempt < retries => {
                    attempt += 1;
                    let backoff = Duration::from_millis(200 * 2u64.pow(attempt.min(10)));
                    tracing::warn!(attempt, %e, "shell_execute retrying after backoff");
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Run a single attempt, capturing and capping stdout+stderr.
async fn run_once(command: &str, time_budget: Duration, on_chunk: Option<StreamCallback>) -> Result<ToolResult, String> {
    let mut child = Command::new("sh")
        .arg("-c")
        .arg(command)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| format!("failed to spawn: {e}"))?;

    let stdout = child.stdout.take().ok_or("no stdout handle")?;
    let stderr = child.stderr.take().ok_or("no stderr handle")?;

    let mut combined = String::new();
    let mut capped = false;

    let read_fut = async {
        let mut out_reader = BufReader::new(stdout).lines();
        let mut err_reader = BufReader::new(stderr).lines();
        loop {
            tokio::select! {
                line = out_reader.next_line() => {
                    match line {
                        Ok(Some(l)) => {
                            if let Some(cb) = &on_chunk { cb(&l); }
                            push_capped(&mut combined, &l, &mut capped);
                        }
                        Ok(None) => break,
                        Err(_) => break,
                    }
                }
                line = err_reader.next_line() => {
                    match line {
                        Ok(Some(l)) => {
                            push_capped(&mut combined, &format!("STDERR: {l}"), &mut capped);
                        }
                        Ok(None) => {}
                        Err(_) => {}
                    }
                }
            }
            if capped {
                break;
            }
        }
    };

    let timed = timeout(time_budget, async {
        read_fut.await;
        child.wait().await
    })
    .await;

    match timed {
        Ok(Ok(status)) => {
            if capped {
                combined.push_str(TRUNCATION_SENTINEL);
            }
            let exit_code = status.code().unwrap_or(-1);
            Ok(ToolResult::ok(combined).with_metadata(json!({ "exit_code": exit_code })))
        }
        Ok(Err(e)) => Err(format!("child process error: {e}")),
        Err(_) => {
            // Soft kill, grace period, then hard kill.
            let _ = child.start_kill();
            let _ = timeout(GRACE_PERIOD, child.wait()).await;
            let _ = child.kill().await;
            Err(format!("command timed out after {:?}", time_budget))
        }
    }
}

fn push_capped(combined: &mut String, line: &str, capped: &mut bool) {
    if *capped {
        return;
    }
    if combined.len() + line.len() + 1 > MAX_OUTPUT_LENGTH {
        let remaining = MAX_OUTPUT_LENGTH.saturating_sub(combined.len());
        combined.push_str(&line[..remaining.min(line.len())]);
        *capped = true;
        return;
    }
    if !combined.is_empty() {
        combined.push('\n');
    }
    combined.push_str(line);
}
