//! Agent Scheduler: concurrent fan-out/fan-in execution of agents
//! against a shared plan of todos.

pub mod collaboration;
pub mod scheduler;

pub use collaboration::CollaborationContext;
pub use scheduler::{
    required_headings, AgentOutcome, AgentRunner, AgentSpec, Aggregator, PlanEvent, Scheduler,
    TemplateAggregator, Todo, TodoStatus,
};
