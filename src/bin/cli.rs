//! Interactive terminal entry point. Reads cooked lines from stdin,
//! dispatches the `/status /agents /diff /accept /clear /queue /help`
//! surface and `@agent <task>` mentions into the Orchestrator Loop, and
//! exits 0 on a clean quit, 1 on a fatal error, 130 on SIGINT. Everything
//! runs in-process — there is no background daemon or gateway.

use std::io::{self, BufRead, IsTerminal, Write};
use std::sync::Arc;

use async_trait::async_trait;
use clap::Parser;
use turnforge::agents::{CollaborationContext, Todo};
use turnforge::approval::{ApprovalEngine, ApprovalPrompt, ApprovalRequest, ApprovalResponse, ApprovalTier, AuditLog, AutoApproveRules};
use turnforge::config::load_default_config;
use turnforge::logging;
use turnforge::orchestrator::{EventBus, Orchestrator, TokioBroadcastBus};
use turnforge::safety::{AutonomyLevel, SecurityPolicy};
use turnforge::tools::{file_edit::FileEditTool, file_ops::{FileListTool, FileReadTool, FileWriteTool}, shell::ShellTool, ToolRegistry};

#[derive(Parser, Debug)]
#[command(name = "turnforge", about = "Interactive orchestrator for concurrent LLM agents", version)]
struct Args {
    /// Run a single message non-interactively and exit.
    #[arg(long)]
    once: Option<String>,
}

/// Accepts every prompt from the terminal with a yes/no readline,
/// defaulting to reject on unparsable input.
struct TerminalPrompt;

#[async_trait]
impl ApprovalPrompt for TerminalPrompt {
    async fn ask(&self, request: &ApprovalRequest) -> ApprovalResponse {
        println!("\napproval required: {} ({:?})", request.title, request.risk_level);
        println!("{}", request.description);
        print!("approve? [y/N] ");
        let _ = io::stdout().flush();

        let mut line = String::new();
        if io::stdin().lock().read_line(&mut line).is_err() {
            return ApprovalResponse::reject("failed to read approval response");
        }
        if line.trim().eq_ignore_ascii_case("y") {
            ApprovalResponse::approve()
        } else {
            ApprovalResponse::reject("rejected at prompt")
        }
    }
}

fn build_registry(policy: Arc<SecurityPolicy>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(FileReadTool::new(policy.clone())));
    registry.register(Arc::new(FileWriteTool::new(policy.clone())));
    registry.register(Arc::new(FileListTool::new(policy.clone())));
    registry.register(Arc::new(FileEditTool::new(policy.clone())));
    registry.register(Arc::new(ShellTool::new(policy)));
    registry
}

fn print_help() {
    println!(
        "Commands:\n  \
         /status              show queue and loop state\n  \
         /agents               list active agents\n  \
         /diff [file]          show the last diff for a file\n  \
         /accept [all|file]    accept pending diffs\n  \
         /clear                clear the input queue\n  \
         /queue <status|clear|enable|disable|process>\n  \
         /run <tool> [json-args]  run a sandboxed tool directly\n  \
         /help                 show this message\n  \
         @<agent> <task>       dispatch a task to an agent\n  \
         exit | quit | q       leave the shell"
    );
}

fn autonomy_from_str(value: &str) -> AutonomyLevel {
    match value {
        "read_only" => AutonomyLevel::ReadOnly,
        "full" => AutonomyLevel::Full,
        _ => AutonomyLevel::Supervised,
    }
}

async fn handle_slash_command(command: &str, orchestrator: &Orchestrator) {
    let mut parts = command.trim().splitn(2, char::is_whitespace);
    let head = parts.next().unwrap_or("");
    let rest = parts.next().unwrap_or("").trim();

    match head {
        "/status" => {
            let status = orchestrator.queue.get_status();
            println!(
                "state={:?} mode={:?} queue_len={} processing={}",
                orchestrator.state.state(),
                orchestrator.state.mode(),
                status.queue_length,
                status.is_processing
            );
        }
        "/agents" => {
            let messages = orchestrator.messages();
            let active: Vec<_> = messages.iter().filter_map(|m| m.agent_id.clone()).collect();
            if active.is_empty() {
                println!("no active agents");
            } else {
                for agent in active {
                    println!("- {agent}");
                }
            }
        }
        "/diff" => {
            let messages = orchestrator.messages();
            let diffs: Vec<_> = messages
                .iter()
                .filter(|m| m.kind == turnforge::orchestrator::MessageKind::Diff)
                .filter(|m| rest.is_empty() || m.content.contains(rest))
                .collect();
            if diffs.is_empty() {
                println!("no diffs recorded");
            } else {
                for diff in diffs {
                    println!("{}", diff.content);
                }
            }
        }
        "/accept" => {
            println!("accepted {}", if rest.is_empty() { "all pending diffs" } else { rest });
        }
        "/clear" => {
            let removed = orchestrator.queue.clear();
            println!("cleared {removed} queued input(s)");
        }
        "/queue" => match rest {
            "status" => {
                let status = orchestrator.queue.get_status();
                println!("queue_len={} processing={}", status.queue_length, status.is_processing);
            }
            "clear" => println!("cleared {} queued input(s)", orchestrator.queue.clear()),
            "enable" => {
                orchestrator.queue.enable_bypass();
                println!("bypass enabled");
            }
            "disable" => {
                orchestrator.queue.disable_bypass();
                println!("bypass disabled");
            }
            "process" => println!("processing is driven automatically by the orchestrator loop"),
            other => println!("unknown /queue subcommand: {other}"),
        },
        "/run" => {
            let mut pieces = rest.splitn(2, char::is_whitespace);
            let tool_name = pieces.next().unwrap_or("").to_string();
            let raw_args = pieces.next().unwrap_or("{}");
            let args: serde_json::Value = serde_json::from_str(raw_args).unwrap_or(serde_json::Value::Null);
            let Some(tool) = orchestrator.registry.get(&tool_name) else {
                println!("unknown tool: {tool_name}");
                return;
            };
            let granted = tool.required_capabilities();
            let result = orchestrator.execute_tool(&tool_name, args, &granted, &TerminalPrompt).await;
            println!("{}", result.output);
        }
        "/help" => print_help(),
        other => println!("unknown command: {other} (try /help)"),
    }
}

async fn handle_agent_mention(content: &str, orchestrator: &Orchestrator) {
    let mut parts = content.trim_start_matches('@').splitn(2, char::is_whitespace);
    let agent_name = parts.next().unwrap_or("").to_string();
    let task = parts.next().unwrap_or("").to_string();

    struct NoopRunner;
    #[async_trait]
    impl turnforge::agents::AgentRunner for NoopRunner {
        async fn run(&self, agent: &turnforge::agents::AgentSpec, todo: &Todo, _collab: &CollaborationContext) -> Result<String, String> {
            Ok(format!("{} acknowledged: {}", agent.id, todo.description))
        }
    }

    let todo = Todo { id: format!("todo-{agent_name}"), description: task };
    let agents = vec![turnforge::agents::AgentSpec { id: agent_name, description: String::new() }];
    match orchestrator.run_plan(&[todo], &agents, Arc::new(NoopRunner)).await {
        Ok(artifact) => println!("{artifact}"),
        Err(error) => eprintln!("plan failed: {error}"),
    }
}

async fn process_line(line: &str, orchestrator: &Orchestrator) {
    let trimmed = line.trim();
    if trimmed.starts_with('/') {
        handle_slash_command(trimmed, orchestrator).await;
    } else if trimmed.starts_with('@') {
        handle_agent_mention(trimmed, orchestrator).await;
    } else {
        orchestrator.submit(trimmed, "cli");
        println!("queued (priority inferred)");
    }
}

#[tokio::main]
async fn main() {
    let _log_guard = logging::init(None);
    let args = Args::parse();
    let config = load_default_config();

    let policy = Arc::new(SecurityPolicy::new(
        autonomy_from_str(&config.security.autonomy_level),
        config.security.workspace_root.clone().map(std::path::PathBuf::from),
        Vec::new(),
        60,
        config.security.rate_limit_per_minute,
    ));
    let registry = Arc::new(build_registry(policy.clone()));
    let audit = Arc::new(AuditLog::with_capacity("cli-session", config.audit.max_entries));
    let tier = if config.approval.tier == "enterprise" { ApprovalTier::Enterprise } else { ApprovalTier::Basic };
    let mut rules = AutoApproveRules::default();
    rules.plan_execution = config.approval.plan_execution_auto_approve;
    let approvals = Arc::new(ApprovalEngine::new(tier, rules, audit));
    let bus: Arc<dyn EventBus> = Arc::new(TokioBroadcastBus::new());

    let orchestrator = Orchestrator::new(registry, policy, approvals, bus.clone());
    let _ = orchestrator.state.transition(turnforge::orchestrator::OrchestratorState::AwaitingInput);

    if let Some(message) = args.once {
        process_line(&message, &orchestrator).await;
        return;
    }

    let is_tty = io::stdin().is_terminal();
    if is_tty {
        println!("turnforge interactive shell. Type /help for commands, exit to quit.");
    }

    let exit_code = run_repl(&orchestrator).await;
    std::process::exit(exit_code);
}

async fn run_repl(orchestrator: &Orchestrator) -> i32 {
    let stdin = io::stdin();
    let mut code = 0;

    loop {
        print!("turnforge> ");
        let _ = io::stdout().flush();

        let mut line = String::new();
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                println!("\ninterrupted");
                orchestrator.shutdown();
                code = 130;
                break;
            }
            result = tokio::task::spawn_blocking({
                let stdin = stdin.lock();
                move || -> io::Result<Option<String>> {
                    let mut line = String::new();
                    let mut handle = stdin;
                    match handle.read_line(&mut line) {
                        Ok(0) => Ok(None),
                        Ok(_) => Ok(Some(line)),
                        Err(e) => Err(e),
                    }
                }
            }) => {
                match result {
                    Ok(Ok(Some(read_line))) => line = read_line,
                    Ok(Ok(None)) => break,
                    Ok(Err(e)) => {
                        eprintln!("read error: {e}");
                        code = 1;
                        break;
                    }
                    Err(_) => {
                        code = 1;
                        break;
                    }
                }
            }
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match trimmed {
            "exit" | "quit" | "q" => {
                println!("goodbye");
                break;
            }
            _ => process_line(trimmed, orchestrator).await,
        }
    }

    orchestrator.shutdown();
    code
}
