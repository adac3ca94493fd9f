//! Agent Scheduler: fans a todo out across every participating agent
//! concurrently (cap default 3) using a semaphore-gated `JoinSet`,
//! gathers per-agent outputs through a shared collaboration map, and
//! merges them into a single synthesized artifact — falling back to
//! plain concatenation if synthesis fails. `ExecutionMode` controls how
//! many outcomes a fan-out waits for before moving on; `FailureStrategy`
//! controls what happens to the rest once a failure is seen.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use super::collaboration::CollaborationContext;

pub const DEFAULT_MAX_CONCURRENCY: usize = 3;

const REQUIRED_HEADINGS: &[&str] =
    &["Summary", "Key Findings", "Implementation Steps", "Code Changes", "Risks/Considerations", "Next Actions"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TodoStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

#[derive(Debug, Clone)]
pub struct Todo {
    pub id: String,
    pub description: String,
}

#[derive(Debug, Clone)]
pub struct AgentSpec {
    pub id: String,
    pub description: String,
}

#[derive(Debug, Clone)]
pub struct AgentOutcome {
    pub agent_id: String,
    pub success: bool,
    pub output: String,
    pub error: Option<String>,
}

#[async_trait]
pub trait AgentRunner: Send + Sync {
    async fn run(&self, agent: &AgentSpec, todo: &Todo, collaboration: &CollaborationContext) -> Result<String, String>;
}

#[async_trait]
pub trait Aggregator: Send + Sync {
    async fn aggregate(&self, todo: &Todo, outcomes: &[AgentOutcome]) -> Result<String, String>;
}

/// Produces the required heading structure directly from per-agent
/// outputs, without an LLM round trip. Suitable as the aggregator of
/// last resort, and as the template an LLM-backed aggregator should
/// follow.
pub struct TemplateAggregator;

#[async_trait]
impl Aggregator for TemplateAggregator {
    async fn aggregate(&self, todo: &Todo, outcomes: &[AgentOutcome]) -> Result<String, String> {
        Ok(render_template(todo, outcomes))
    }
}

fn render_template(todo: &Todo, outcomes: &[AgentOutcome]) -> String {
    let successes: Vec<&AgentOutcome> = outcomes.iter().filter(|o| o.success).collect();
    let mut sections = Vec::new();
    sections.push(format!("## Summary\n{} agent(s) worked on: {}", successes.len(), todo.description));
    sections.push(format!(
        "## Key Findings\n{}",
        successes.iter().map(|o| format!("- [{}] {}", o.agent_id, first_line(&o.output))).collect::<Vec<_>>().join("\n")
    ));
    sections.push(format!(
        "## Implementation Steps\n{}",
        successes.iter().map(|o| format!("- [{}] {}", o.agent_id, o.output)).collect::<Vec<_>>().join("\n")
    ));
    sections.push("## Code Changes\nSee per-agent output above.".to_string());
    let risks: Vec<String> = outcomes
        .iter()
        .filter(|o| !o.success)
        .map(|o| format!("- [{}] {}", o.agent_id, o.error.clone().unwrap_or_default()))
        .collect();
    let risk_body = if risks.is_empty() { "Review merged output before applying.".to_string() } else { risks.join("\n") };
    sections.push(format!("## Risks/Considerations\n{risk_body}"));
    sections.push("## Next Actions\nProceed to the next todo.".to_string());
    sections.join("\n\n")
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or_default()
}

fn concatenate_fallback(outcomes: &[AgentOutcome]) -> String {
    outcomes.iter().map(|o| format!("### {}\n{}", o.agent_id, o.output)).collect::<Vec<_>>().join("\n\n")
}

#[derive(Debug, Clone)]
pub enum PlanEvent {
    TodoStarted { todo_id: String },
    TodoCompleted { todo_id: String, artifact: String },
    TodoFailed { todo_id: String, reason: String },
    PlanCompleted { artifact: String },
    PlanFailed { reason: String },
}

/// How many agent outcomes a fan-out needs before it stops waiting on the
/// rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Wait for every agent.
    All,
    /// Stop as soon as the first agent finishes, success or failure.
    First,
    /// Stop once `n` agents have succeeded.
    Any(usize),
}

/// What to do about agents still running once a failure is observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStrategy {
    /// Keep waiting for the rest regardless of failures.
    Continue,
    /// Abort every in-flight agent as soon as one fails.
    FailFast,
    /// Drop failures from the outcome list entirely (only successes are kept).
    Ignore,
}

pub struct Scheduler {
    max_concurrency: usize,
    mode: ExecutionMode,
    failure_strategy: FailureStrategy,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONCURRENCY)
    }
}

impl Scheduler {
    pub fn new(max_concurrency: usize) -> Self {
        Self { max_concurrency: max_concurrency.max(1), mode: ExecutionMode::All, failure_strategy: FailureStrategy::Continue }
    }

    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_failure_strategy(mut self, strategy: FailureStrategy) -> Self {
        self.failure_strategy = strategy;
        self
    }

    /// Runs every todo in order; for each, fans every agent out
    /// concurrently, aggregates their output, and emits lifecycle
    /// events. Returns the plan-wide concatenation of per-todo
    /// artifacts, or an error if every todo failed.
    pub async fn run_plan(
        &self,
        todos: &[Todo],
        agents: &[AgentSpec],
        runner: Arc<dyn AgentRunner>,
        aggregator: &dyn Aggregator,
        mut on_event: impl FnMut(PlanEvent),
    ) -> Result<String, String> {
        let mut artifacts = Vec::new();
        let mut any_succeeded = false;

        for todo in todos {
            on_event(PlanEvent::TodoStarted { todo_id: todo.id.clone() });
            let collaboration = Arc::new(CollaborationContext::new());
            for agent in agents {
                collaboration.join(&agent.id);
            }

            let outcomes = self.run_todo_agents(todo, agents, runner.clone(), collaboration.clone()).await;

            let artifact = match aggregator.aggregate(todo, &outcomes).await {
                Ok(artifact) => artifact,
                Err(_) => concatenate_fallback(&outcomes),
            };

            if outcomes.iter().any(|o| o.success) {
                any_succeeded = true;
                on_event(PlanEvent::TodoCompleted { todo_id: todo.id.clone(), artifact: artifact.clone() });
                artifacts.push(format!("## Todo: {}\n\n{}", todo.description, artifact));
            } else {
                let reason = outcomes.iter().filter_map(|o| o.error.clone()).collect::<Vec<_>>().join("; ");
                on_event(PlanEvent::TodoFailed { todo_id: todo.id.clone(), reason: reason.clone() });
            }
        }

        if !any_succeeded && !todos.is_empty() {
            let reason = "every todo failed".to_string();
            on_event(PlanEvent::PlanFailed { reason: reason.clone() });
            return Err(reason);
        }

        let combined = artifacts.join("\n\n---\n\n");
        on_event(PlanEvent::PlanCompleted { artifact: combined.clone() });
        Ok(combined)
    }

    async fn run_todo_agents(
        &self,
        todo: &Todo,
        agents: &[AgentSpec],
        runner: Arc<dyn AgentRunner>,
        collaboration: Arc<CollaborationContext>,
    ) -> Vec<AgentOutcome> {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let mut join_set = JoinSet::new();

        for agent in agents.iter().cloned() {
            let permit = semaphore.clone().acquire_owned().await.expect("semaphore not closed");
            let runner = runner.clone();
            let collaboration = collaboration.clone();
            let todo = todo.clone();

            join_set.spawn(async move {
                let result = runner.run(&agent, &todo, &collaboration).await;
                drop(permit);
                match result {
                    Ok(output) => {
                        collaboration.share_data(
                            CollaborationContext::output_key(&agent.id, &todo.id),
                            serde_json::json!(output),
                        );
                        AgentOutcome { agent_id: agent.id, success: true, output, error: None }
                    }
                    Err(error) => AgentOutcome { agent_id: agent.id, success: false, output: String::new(), error: Some(error) },
                }
            });
        }

        let target_successes = match self.mode {
            ExecutionMode::All => agents.len(),
            ExecutionMode::First => 1,
            ExecutionMode::Any(n) => n.max(1),
        };

        let mut outcomes = Vec::with_capacity(agents.len());
        let mut successes = 0;
        while let Some(result) = join_set.join_next().await {
            let outcome = match result {
                Ok(outcome) => outcome,
                Err(join_error) => {
                    AgentOutcome { agent_id: "unknown".to_string(), success: false, output: String::new(), error: Some(join_error.to_string()) }
                }
            };

            let success = outcome.success;
            if success {
                successes += 1;
            }

            if success || self.failure_strategy != FailureStrategy::Ignore {
                outcomes.push(outcome);
            }

            if !success && self.failure_strategy == FailureStrategy::FailFast {
                join_set.abort_all();
                break;
            }
            if matches!(self.mode, ExecutionMode::First | ExecutionMode::Any(_)) && successes >= target_successes {
                join_set.abort_all();
                break;
            }
        }
        outcomes
    }
}

pub fn required_headings() -> &'static [&'static str] {
    REQUIRED_HEADINGS
}
