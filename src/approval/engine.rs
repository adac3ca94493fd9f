//! Approval Engine: basic and enterprise tiers, a session "remember"
//! cache with prefix matching, timeout-with-default-answer, and
//! (enterprise) a risk assessment + compliance gate.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::safety::RiskLevel;

use super::audit::AuditLog;

pub const DEFAULT_APPROVAL_TIMEOUT_MS: u64 = 30_000;

const READONLY_PATTERNS: &[&str] = &["read", "list", "inspect", "analy", "view", "status", "show"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalTier {
    Basic,
    Enterprise,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestType {
    General,
    Plan,
    File,
    Command,
    Package,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalAction {
    pub description: String,
    pub risk_level: RiskLevel,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApprovalContext {
    pub working_dir: Option<String>,
    pub affected_files: Vec<String>,
    pub estimated_duration_ms: Option<u64>,
    pub plan_details: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub id: String,
    pub title: String,
    pub description: String,
    pub risk_level: RiskLevel,
    pub actions: Vec<ApprovalAction>,
    pub context: Option<ApprovalContext>,
    pub timeout_ms: Option<u64>,
    pub request_type: RequestType,
    /// (tool, operation, target-prefix) used for the session "remember" cache.
    pub remember_key: Option<(String, String, String)>,
}

impl ApprovalRequest {
    pub fn new(title: impl Into<String>, description: impl Into<String>, risk_level: RiskLevel, request_type: RequestType) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            description: description.into(),
            risk_level,
            actions: Vec::new(),
            context: None,
            timeout_ms: None,
            request_type,
            remember_key: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalResponse {
    pub approved: bool,
    pub modified_actions: Option<Vec<ApprovalAction>>,
    pub comments: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub conditions: Option<Vec<String>>,
    pub expiry: Option<DateTime<Utc>>,
    /// Whether the caller chose "approve and remember" for this decision.
    pub remember: bool,
}

impl ApprovalResponse {
    pub fn approve() -> Self {
        Self { approved: true, modified_actions: None, comments: None, timestamp: Utc::now(), conditions: None, expiry: None, remember: false }
    }

    pub fn reject(comment: impl Into<String>) -> Self {
        Self { approved: false, modified_actions: None, comments: Some(comment.into()), timestamp: Utc::now(), conditions: None, expiry: None, remember: false }
    }

    pub fn remembered(self) -> Self {
        Self { remember: true, ..self }
    }
}

/// Rule table for basic-tier auto-approval, keyed by risk level.
#[derive(Debug, Clone)]
pub struct AutoApproveRules {
    pub plan_execution: bool,
    pub by_risk: HashMap<RiskLevel, bool>,
}

impl Default for AutoApproveRules {
    fn default() -> Self {
        let mut by_risk = HashMap::new();
        by_risk.insert(RiskLevel::Low, true);
        by_risk.insert(RiskLevel::Medium, false);
        by_risk.insert(RiskLevel::High, false);
        by_risk.insert(RiskLevel::Critical, false);
        Self { plan_execution: false, by_risk }
    }
}

#[async_trait]
pub trait ApprovalPrompt: Send + Sync {
    /// Render `request` and collect a decision. Implementations place the
    /// input queue in bypass mode for the duration of the prompt.
    async fn ask(&self, request: &ApprovalRequest) -> ApprovalResponse;
}

struct RememberedDecision {
    response: ApprovalResponse,
    expiry: Option<DateTime<Utc>>,
}

pub struct ApprovalEngine {
    tier: ApprovalTier,
    rules: AutoApproveRules,
    remembered: Mutex<HashMap<(String, String, String), RememberedDecision>>,
    audit: std::sync::Arc<AuditLog>,
}

impl ApprovalEngine {
    pub fn new(tier: ApprovalTier, rules: AutoApproveRules, audit: std::sync::Arc<AuditLog>) -> Self {
        Self { tier, rules, remembered: Mutex::new(HashMap::new()), audit }
    }

    fn is_readonly_title(title: &str) -> bool {
        let lower = title.to_lowercase();
        READONLY_PATTERNS.iter().any(|p| lower.contains(p))
    }

    fn default_answer_for_risk(risk: RiskLevel) -> ApprovalResponse {
        match risk {
            RiskLevel::Low | RiskLevel::Medium => ApprovalResponse::approve(),
            RiskLevel::High | RiskLevel::Critical => ApprovalResponse::reject("approval timed out; defaulted to reject for elevated risk"),
        }
    }

    fn check_remembered(&self, key: &(String, String, String)) -> Option<ApprovalResponse> {
        let mut cache = self.remembered.lock().ok()?;
        if let Some(entry) = cache.get(key) {
            if let Some(expiry) = entry.expiry {
                if Utc::now() > expiry {
                    cache.remove(key);
                    return None;
                }
            }
            return Some(entry.response.clone());
        }

        // Prefix match against any remembered target for the same tool/operation.
        for ((tool, op, prefix), entry) in cache.iter() {
            if tool == &key.0 && op == &key.1 && key.2.starts_with(prefix.as_str()) {
                if let Some(expiry) = entry.expiry {
                    if Utc::now() < expiry {
                        return Some(entry.response.clone());
                    }
                } else {
                    return Some(entry.response.clone());
                }
            }
        }
        None
    }

    fn remember(&self, key: (String, String, String), response: ApprovalResponse) {
        let expiry = response.expiry;
        if let Ok(mut cache) = self.remembered.lock() {
            cache.insert(key, RememberedDecision { response, expiry });
        }
    }

    /// Compute an enterprise-tier risk score from 0-100.
    fn risk_assessment(&self, request: &ApprovalRequest) -> u32 {
        let base = match request.risk_level {
            RiskLevel::Low => 10,
            RiskLevel::Medium => 40,
            RiskLevel::High => 70,
            RiskLevel::Critical => 95,
        };
        let action_penalty = (request.actions.len() as u32).min(5) * 2;
        (base + action_penalty).min(100)
    }

    /// Hard-blocking compliance check; returns violation descriptions.
    fn compliance_violations(&self, request: &ApprovalRequest) -> Vec<String> {
        let mut violations = Vec::new();
        if request.risk_level == RiskLevel::Critical && self.tier == ApprovalTier::Enterprise {
            violations.push("critical-risk actions require a human approver in enterprise mode".to_string());
        }
        violations
    }

    pub async fn decide(&self, tool: &str, operation: &str, target: &str, mut request: ApprovalRequest, prompt: &dyn ApprovalPrompt) -> ApprovalResponse {
        let key = (tool.to_string(), operation.to_string(), target.to_string());

        if let Some(cached) = self.check_remembered(&key) {
            self.audit.append(tool, "auto_approved", serde_json::json!({ "request_id": request.id, "reason": "remembered" }));
            return cached;
        }

        if self.tier == ApprovalTier::Enterprise {
            let violations = self.compliance_violations(&request);
            if !violations.is_empty() {
                self.audit.append(tool, "compliance_denied", serde_json::json!({ "request_id": request.id, "violations": violations }));
                return ApprovalResponse::reject(violations.join("; "));
            }
            let score = self.risk_assessment(&request);
            request.description = format!("{} (risk score: {score}/100)", request.description);
        }

        if Self::is_readonly_title(&request.title) {
            self.audit.append(tool, "auto_approved", serde_json::json!({ "request_id": request.id, "reason": "readonly" }));
            return ApprovalResponse::approve();
        }

        if request.request_type == RequestType::Plan && !self.rules.plan_execution {
            return self.prompt_with_timeout(tool, &request, prompt).await;
        }

        if *self.rules.by_risk.get(&request.risk_level).unwrap_or(&false) {
            self.audit.append(tool, "auto_approved", serde_json::json!({ "request_id": request.id, "reason": "risk_rule" }));
            return ApprovalResponse::approve();
        }

        let response = self.prompt_with_timeout(tool, &request, prompt).await;
        if response.remember {
            self.remember(key, response.clone());
        }
        response
    }

    async fn prompt_with_timeout(&self, tool: &str, request: &ApprovalRequest, prompt: &dyn ApprovalPrompt) -> ApprovalResponse {
        let timeout_ms = request.timeout_ms.unwrap_or(DEFAULT_APPROVAL_TIMEOUT_MS);
        match tokio::time::timeout(Duration::from_millis(timeout_ms), prompt.ask(request)).await {
            Ok(response) => {
                self.audit.append(tool, if response.approved { "approved" } else { "rejected" }, serde_json::json!({ "request_id": request.id }));
                response
            }
            Err(_) => {
                let default = Self::default_answer_for_risk(request.risk_level);
                self.audit.append(tool, "timed_out_default", serde_json::json!({ "request_id": request.id, "approved": default.approved }));
                default
            }
        }
    }
}
