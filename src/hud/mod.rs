//! Plan HUD: an advisory-only rendering of the Agent Scheduler's
//! current state. The Agent Scheduler remains the source of truth; this
//! module only formats a snapshot for display.

use crate::agents::{AgentOutcome, Todo, TodoStatus};

#[derive(Debug, Clone)]
pub struct TodoRow {
    pub todo: Todo,
    pub status: TodoStatus,
    pub agents: Vec<AgentOutcome>,
}

pub struct PlanHud {
    rows: Vec<TodoRow>,
}

impl Default for PlanHud {
    fn default() -> Self {
        Self::new()
    }
}

impl PlanHud {
    pub fn new() -> Self {
        Self { rows: Vec::new() }
    }

    pub fn upsert(&mut self, todo: Todo, status: TodoStatus, agents: Vec<AgentOutcome>) {
        if let Some(row) = self.rows.iter_mut().find(|r| r.todo.id == todo.id) {
            row.status = status;
            row.agents = agents;
        } else {
            self.rows.push(TodoRow { todo, status, agents });
        }
    }

    fn badge(status: TodoStatus) -> &'static str {
        match status {
            TodoStatus::Pending => "[ ]",
            TodoStatus::InProgress => "[~]",
            TodoStatus::Completed => "[x]",
            TodoStatus::Failed => "[!]",
        }
    }

    /// Renders the plan as plain text: one line per todo with a status
    /// badge, followed by a per-agent dashboard line underneath.
    pub fn render(&self) -> String {
        let mut lines = Vec::new();
        for row in &self.rows {
            lines.push(format!("{} {} ({})", Self::badge(row.status), row.todo.description, row.todo.id));
            for agent in &row.agents {
                let marker = if agent.success { "ok" } else { "fail" };
                lines.push(format!("    - {} [{marker}]", agent.agent_id));
            }
        }
        lines.join("\n")
    }
}
