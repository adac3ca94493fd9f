//! Approval Engine and the audit trail.

mod audit;
mod engine;

pub use audit::{AuditEntry, AuditLog};
pub use engine::{
    ApprovalAction, ApprovalContext, ApprovalEngine, ApprovalPrompt, ApprovalRequest,
    ApprovalResponse, ApprovalTier, AutoApproveRules, RequestType,
};
