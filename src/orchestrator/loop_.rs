//! Orchestrator Loop: binds the Input Queue, Tool Registry & Sandbox,
//! Approval Engine, and event bus into the single cooperative state
//! machine that drives one chat session (ingest → execute → emit →
//! await-next).

use std::sync::Arc;

use serde_json::Value;

use crate::agents::{AgentRunner, AgentSpec, Aggregator, PlanEvent, Scheduler, TemplateAggregator, Todo};
use crate::approval::{ApprovalEngine, ApprovalPrompt, ApprovalRequest, ApprovalResponse, RequestType};
use crate::queue::{infer_priority, InputQueue, Priority};
use crate::safety::{SecurityPolicy, ValidationResult};
use crate::tools::{Capability, Tool, ToolRegistry, ToolResult};

use super::events::{AppEvent, EventBus};
use super::state::{absorb_sweep, Message, MessageKind, MessageStatus, Mode, OrchestratorState, StateMachine, ABSORB_GRACE};

pub struct Orchestrator {
    pub state: StateMachine,
    pub queue: InputQueue,
    pub registry: Arc<ToolRegistry>,
    pub policy: Arc<SecurityPolicy>,
    pub approvals: Arc<ApprovalEngine>,
    pub scheduler: Scheduler,
    pub bus: Arc<dyn EventBus>,
    messages: std::sync::Mutex<Vec<Message>>,
    next_message_id: std::sync::atomic::AtomicU64,
}

impl Orchestrator {
    pub fn new(registry: Arc<ToolRegistry>, policy: Arc<SecurityPolicy>, approvals: Arc<ApprovalEngine>, bus: Arc<dyn EventBus>) -> Self {
        Self {
            state: StateMachine::new(),
            queue: InputQueue::new(),
            registry,
            policy,
            approvals,
            scheduler: Scheduler::default(),
            bus,
            messages: std::sync::Mutex::new(Vec::new()),
            next_message_id: std::sync::atomic::AtomicU64::new(1),
        }
    }

    fn new_message_id(&self) -> String {
        format!("msg-{}", self.next_message_id.fetch_add(1, std::sync::atomic::Ordering::SeqCst))
    }

    fn push_message(&self, message: Message) {
        if let Ok(mut messages) = self.messages.lock() {
            messages.push(message);
        }
    }

    fn complete_message(&self, id: &str) {
        if let Ok(mut messages) = self.messages.lock() {
            if let Some(message) = messages.iter_mut().find(|m| m.id == id) {
                message.status = MessageStatus::Completed;
            }
        }
    }

    /// Ingests non-queued content directly (an approval reply, or
    /// bypass-mode input) without routing through the Input Queue.
    pub fn ingest_direct(&self, content: &str) -> Result<(), (OrchestratorState, OrchestratorState)> {
        self.state.transition(OrchestratorState::Processing)?;
        let id = self.new_message_id();
        self.push_message(Message::new(id, MessageKind::User, content));
        Ok(())
    }

    /// Submits content through the Input Queue unless bypass/approval
    /// prompting means it should go straight to processing.
    pub fn submit(&self, content: &str, source: &str) -> Option<String> {
        if !self.queue.should_queue(content) {
            let _ = self.ingest_direct(content);
            return None;
        }
        self.queue.enqueue(content, infer_priority(content), source)
    }

    /// Runs a sandboxed tool, gating on the Approval Engine when the
    /// command/risk requires it, and publishing the result event.
    pub async fn execute_tool(
        &self,
        tool_name: &str,
        args: Value,
        granted: &[Capability],
        prompt: &dyn ApprovalPrompt,
    ) -> ToolResult {
        let Some(tool) = self.registry.get(tool_name) else {
            return ToolResult::err(format!("unknown tool: {tool_name}"));
        };

        let outcome = self.registry.validate(tool_name, granted);
        if !outcome.valid {
            return ToolResult::err(outcome.errors.join("; "));
        }

        // Dynamic, content-aware risk drives the gate, not the tool's
        // static `risk_level()` constant: a harmless `ls` and a `rm -rf /`
        // both report High via ShellTool's risk_level(), but preflight
        // tells them apart.
        let preflight = tool.preflight(&args);
        let risk = preflight.risk_level;

        match self.policy.apply_autonomy(risk) {
            ValidationResult::Denied(reason) => {
                self.bus.publish(AppEvent::Error { agent_id: None, message: format!("{tool_name} denied: {reason}") }).ok();
                return ToolResult::err(reason);
            }
            ValidationResult::NeedsApproval => {
                let _ = self.state.transition(OrchestratorState::AwaitingApproval);
                self.queue.enable_bypass();

                let request = ApprovalRequest::new(
                    format!("Run {tool_name}"),
                    format!("{} ({})", tool.description(), preflight.summary),
                    risk,
                    RequestType::Command,
                );
                let target = args.get("path").and_then(|v| v.as_str()).unwrap_or(tool_name).to_string();
                let response: ApprovalResponse = self.approvals.decide(tool_name, "execute", &target, request, prompt).await;

                self.queue.disable_bypass();
                let _ = self.state.transition(OrchestratorState::Processing);

                if !response.approved {
                    self.bus.publish(AppEvent::Error { agent_id: None, message: format!("{tool_name} was not approved") }).ok();
                    return ToolResult::err(response.comments.unwrap_or_else(|| "not approved".to_string()));
                }
            }
            ValidationResult::Allowed => {}
        }

        self.bus.publish(AppEvent::Executing { agent_id: None, tool_name: tool_name.to_string() }).ok();
        let started = std::time::Instant::now();
        let parameters = args.clone();
        let mut result = match tool.execute(args).await {
            Ok(result) => result,
            Err(error) => ToolResult::err(error),
        };
        let execution_time_ms = started.elapsed().as_millis() as u64;

        let mut metadata = result.metadata.take().unwrap_or_else(|| serde_json::json!({}));
        if let Some(object) = metadata.as_object_mut() {
            object.insert("execution-time-ms".to_string(), Value::from(execution_time_ms));
            object.insert("tool-name".to_string(), Value::from(tool_name));
            object.insert("parameters".to_string(), parameters);
        }
        result.metadata = Some(metadata);

        self.bus
            .publish(AppEvent::Tool { tool_name: tool_name.to_string(), success: result.success, summary: result.output.chars().take(200).collect() })
            .ok();

        result
    }

    /// Runs a multi-agent plan through the Agent Scheduler, surfacing
    /// lifecycle events on the shared bus.
    pub async fn run_plan(&self, todos: &[Todo], agents: &[AgentSpec], runner: Arc<dyn AgentRunner>) -> Result<String, String> {
        let aggregator: &dyn Aggregator = &TemplateAggregator;
        self.scheduler
            .run_plan(todos, agents, runner, aggregator, |event| {
                let _ = self.bus.publish(match event {
                    PlanEvent::TodoStarted { todo_id } => AppEvent::Planning { agent_id: None, content: format!("starting {todo_id}") },
                    PlanEvent::TodoCompleted { todo_id, artifact } => AppEvent::Result { agent_id: None, content: format!("{todo_id}: {artifact}") },
                    PlanEvent::TodoFailed { todo_id, reason } => AppEvent::Error { agent_id: None, message: format!("{todo_id} failed: {reason}") },
                    PlanEvent::PlanCompleted { artifact } => AppEvent::Result { agent_id: None, content: artifact },
                    PlanEvent::PlanFailed { reason } => AppEvent::Error { agent_id: None, message: reason },
                });
            })
            .await
    }

    /// Completes the current turn: marks its message completed,
    /// returns to `AwaitingInput`, and sweeps absorbable history.
    pub fn complete_turn(&self, message_id: &str) {
        self.complete_message(message_id);
        let _ = self.state.transition(OrchestratorState::AwaitingInput);
        if let Ok(mut messages) = self.messages.lock() {
            absorb_sweep(&mut messages, ABSORB_GRACE, chrono::Utc::now());
        }
    }

    pub fn cycle_mode(&self) -> Mode {
        self.state.cycle_mode()
    }

    /// Cancels everything in flight and tears the loop down. Tool-level
    /// cancellation (soft signal + grace + hard kill) lives in the
    /// shell tool itself; this only releases shared orchestrator state.
    pub fn shutdown(&self) {
        self.queue.force_cleanup();
        let _ = self.state.transition(OrchestratorState::ShuttingDown);
    }

    pub fn messages(&self) -> Vec<Message> {
        self.messages.lock().map(|m| m.clone()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::safety::AutonomyLevel;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::approval::{ApprovalTier, AuditLog, AutoApproveRules};
    use crate::orchestrator::events::TokioBroadcastBus;

    struct AlwaysApprove;

    #[async_trait]
    impl ApprovalPrompt for AlwaysApprove {
        async fn ask(&self, _request: &ApprovalRequest) -> ApprovalResponse {
            ApprovalResponse::approve()
        }
    }

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "echoes input"
        }
        fn parameters_schema(&self) -> Value {
            serde_json::json!({})
        }
        async fn execute(&self, args: Value) -> Result<ToolResult, String> {
            Ok(ToolResult::ok(args.to_string()))
        }
    }

    struct PanicPrompt;

    #[async_trait]
    impl ApprovalPrompt for PanicPrompt {
        async fn ask(&self, _request: &ApprovalRequest) -> ApprovalResponse {
            panic!("a policy-denied tool must never reach the approval prompt");
        }
    }

    struct MediumRiskTool;

    #[async_trait]
    impl Tool for MediumRiskTool {
        fn name(&self) -> &str {
            "write_thing"
        }
        fn description(&self) -> &str {
            "writes something"
        }
        fn parameters_schema(&self) -> Value {
            serde_json::json!({})
        }
        fn risk_level(&self) -> crate::tools::RiskLevel {
            crate::tools::RiskLevel::Medium
        }
        async fn execute(&self, _args: Value) -> Result<ToolResult, String> {
            Ok(ToolResult::ok("done"))
        }
    }

    fn test_orchestrator() -> Orchestrator {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        let policy = Arc::new(SecurityPolicy::new(AutonomyLevel::Supervised, Some("/tmp".into()), Vec::new(), 60, 60));
        let approvals = Arc::new(ApprovalEngine::new(ApprovalTier::Basic, AutoApproveRules::default(), Arc::new(AuditLog::new("s"))));
        let bus: Arc<dyn EventBus> = Arc::new(TokioBroadcastBus::new());
        Orchestrator::new(Arc::new(registry), policy, approvals, bus)
    }

    #[tokio::test]
    async fn low_risk_tool_executes_without_prompt() {
        let orchestrator = test_orchestrator();
        let prompt = AlwaysApprove;
        let result = orchestrator.execute_tool("echo", serde_json::json!({"x": 1}), &[], &prompt).await;
        assert!(result.success);
    }

    #[tokio::test]
    async fn policy_denied_tool_is_rejected_without_prompting() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(MediumRiskTool));
        let policy = Arc::new(SecurityPolicy::new(AutonomyLevel::ReadOnly, Some("/tmp".into()), Vec::new(), 60, 60));
        let approvals = Arc::new(ApprovalEngine::new(ApprovalTier::Basic, AutoApproveRules::default(), Arc::new(AuditLog::new("s"))));
        let bus: Arc<dyn EventBus> = Arc::new(TokioBroadcastBus::new());
        let orchestrator = Orchestrator::new(Arc::new(registry), policy, approvals, bus);

        let result = orchestrator.execute_tool("write_thing", serde_json::json!({}), &[], &PanicPrompt).await;
        assert!(!result.success);
    }

    #[test]
    fn submit_routes_through_queue_with_priority() {
        let orchestrator = test_orchestrator();
        let id = orchestrator.submit("/status", "cli");
        assert!(id.is_some());
        let status = orchestrator.queue.get_status();
        assert_eq!(status.pending_inputs[0].priority, Priority::High);
    }

    #[test]
    fn complete_turn_returns_to_awaiting_input_and_absorbs() {
        let orchestrator = test_orchestrator();
        orchestrator.state.transition(OrchestratorState::AwaitingInput).unwrap();
        orchestrator.state.transition(OrchestratorState::Processing).unwrap();
        let id = orchestrator.new_message_id();
        orchestrator.push_message(Message::new(id.clone(), MessageKind::Agent, "done"));
        orchestrator.complete_turn(&id);
        assert_eq!(orchestrator.state.state(), OrchestratorState::AwaitingInput);
    }

    #[tokio::test]
    async fn run_plan_uses_scheduler_and_publishes_events() {
        struct EchoRunner(Arc<AtomicUsize>);

        #[async_trait]
        impl AgentRunner for EchoRunner {
            async fn run(&self, agent: &AgentSpec, todo: &Todo, _collab: &crate::agents::CollaborationContext) -> Result<String, String> {
                self.0.fetch_add(1, Ordering::SeqCst);
                Ok(format!("{} handled {}", agent.id, todo.id))
            }
        }

        let orchestrator = test_orchestrator();
        let calls = Arc::new(AtomicUsize::new(0));
        let todos = vec![Todo { id: "t1".to_string(), description: "do it".to_string() }];
        let agents = vec![AgentSpec { id: "a1".to_string(), description: String::new() }];
        let artifact = orchestrator.run_plan(&todos, &agents, Arc::new(EchoRunner(calls.clone()))).await.unwrap();
        assert!(artifact.contains("Summary"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
