//! `aru chat`: interactive or single-message chat.

use super::runtime::Runtime;
use aru_agent::prompts::DIRECT_REPLY_PROMPT;
use aru_agent::{ToolLoop, TurnGraph, TurnReport};
use aru_config::AppConfig;
use aru_core::event::DomainEvent;
use aru_core::message::Message;
use serde_json::{Map, json};
use std::io::Write;
use std::sync::Arc;
use tokio::io::{self, AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::warn;

/// A line typed at the prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand<'a> {
    Empty,
    Exit,
    Help,
    Memory(&'a str),
    Tools,
    McpHelp,
    McpServers,
    McpTools,
    McpConnect(&'a str),
    Message(&'a str),
}

pub fn parse_command(line: &str) -> ReplCommand<'_> {
    let line = line.trim();
    let lower = line.to_lowercase();
    match lower.as_str() {
        "" => return ReplCommand::Empty,
        "exit" | "quit" | "bye" => return ReplCommand::Exit,
        "help" => return ReplCommand::Help,
        "tools" => return ReplCommand::Tools,
        "mcp" => return ReplCommand::McpHelp,
        "mcp servers" => return ReplCommand::McpServers,
        "mcp tools" => return ReplCommand::McpTools,
        _ => {}
    }
    if let Some(query) = strip_keyword(line, "memory ") {
        return ReplCommand::Memory(query);
    }
    if let Some(server) = strip_keyword(line, "mcp connect ") {
        return ReplCommand::McpConnect(server);
    }
    ReplCommand::Message(line)
}

/// `line` minus a case-insensitive `keyword` prefix, trimmed.
fn strip_keyword<'a>(line: &'a str, keyword: &str) -> Option<&'a str> {
    let prefix = line.get(..keyword.len())?;
    prefix
        .eq_ignore_ascii_case(keyword)
        .then(|| line[keyword.len()..].trim())
}

const HELP: &str = "\
  Commands:
    memory <query>       Search long-term memory
    tools                List registered tools
    mcp servers          Show configured MCP servers
    mcp tools            List tools from connected MCP servers
    mcp connect <name>   Connect to an MCP server
    help                 Show this help
    exit | quit | bye    Leave the chat";

fn print_answer(answer: &str) {
    println!();
    for line in answer.lines() {
        println!("  Aru > {line}");
    }
    println!();
}

fn print_report(report: &TurnReport, debug: bool) {
    match &report.answer {
        Some(answer) => print_answer(answer),
        None => println!("\n  Aru > Sorry, I couldn't produce a response.\n"),
    }
    for error in &report.errors {
        eprintln!("  [Error] {error}");
    }
    if debug {
        println!("  [Debug] Agents: {}\n", report.path());
    }
}

/// Print tool executions as they happen.
fn spawn_event_trace(mut events: broadcast::Receiver<Arc<DomainEvent>>) {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    if let DomainEvent::ToolExecuted {
                        tool_name,
                        success,
                        duration_ms,
                        ..
                    } = event.as_ref()
                    {
                        let outcome = if *success { "ok" } else { "failed" };
                        println!("  [Debug] Tool {tool_name}: {outcome} ({duration_ms}ms)");
                    }
                }
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
    });
}

/// Conversation state for `--direct` mode, where every line goes through
/// the tool loop instead of the router.
struct DirectSession {
    history: Vec<Message>,
}

impl DirectSession {
    async fn turn(&mut self, runtime: &Runtime, input: &str) {
        let outcome = ToolLoop::new(runtime.ctx.clone())
            .run(Some(DIRECT_REPLY_PROMPT), &self.history, input)
            .await;
        match outcome {
            Ok(outcome) => {
                print_answer(&outcome.answer);
                if runtime.config.agent.debug {
                    println!(
                        "  [Debug] Iterations: {}, tool calls: {}\n",
                        outcome.iterations, outcome.tool_calls
                    );
                }
                let exchange = [Message::user(input), Message::assistant(&outcome.answer)];
                let mut metadata = Map::new();
                metadata.insert("task".into(), json!(input));
                metadata.insert("mode".into(), json!("direct"));
                if let Err(e) = runtime.ctx.memory.add_interaction(&exchange, metadata).await {
                    warn!(error = %e, "Failed to store interaction");
                }
                self.history.extend(exchange);
            }
            Err(e) => eprintln!("  [Error] {e}"),
        }
    }
}

async fn handle_command(runtime: &Runtime, command: ReplCommand<'_>) {
    match command {
        ReplCommand::Help => println!("{HELP}\n"),
        ReplCommand::Memory(query) => {
            let limit = runtime.config.memory.search_limit;
            match runtime.ctx.memory.search(query, None, limit, true).await {
                Ok(records) if records.is_empty() => println!("  No memories found.\n"),
                Ok(records) => {
                    for (i, record) in records.iter().enumerate() {
                        println!("  {:>2}. [{} {:.2}] {}", i + 1, record.memory_type, record.score, record.content);
                    }
                    println!();
                }
                Err(e) => eprintln!("  [Error] Memory search failed: {e}\n"),
            }
        }
        ReplCommand::Tools => {
            let registry = runtime.registry.read().await;
            if registry.is_empty() {
                println!("  No tools registered.\n");
            }
            for descriptor in registry.descriptors() {
                let origin = descriptor.server.as_deref().unwrap_or("builtin");
                println!("  - {} ({origin}): {}", descriptor.name, descriptor.description);
            }
            println!();
        }
        ReplCommand::McpHelp => {
            println!("  MCP commands: mcp servers | mcp tools | mcp connect <server>\n");
        }
        ReplCommand::McpServers => {
            let connected = runtime.mcp.connected_servers().await;
            for server in runtime.mcp.configured_servers() {
                let status = if connected.contains(&server.name) {
                    "connected"
                } else if server.enabled {
                    "available"
                } else {
                    "disabled"
                };
                println!(
                    "  - {} [{status}] {}",
                    server.name,
                    server.description.as_deref().unwrap_or("")
                );
            }
            println!();
        }
        ReplCommand::McpTools => println!("{}\n", runtime.mcp.tools_description().await),
        ReplCommand::McpConnect(name) => match runtime.mcp.connect_by_name(name).await {
            Ok(tools) => println!("  Connected to {name}: {}\n", tools.join(", ")),
            Err(e) => eprintln!("  [Error] {e}\n"),
        },
        ReplCommand::Empty | ReplCommand::Exit | ReplCommand::Message(_) => {}
    }
}

fn print_banner(config: &AppConfig, session_id: &str, direct: bool) {
    println!();
    println!("  Aru, your personal assistant");
    println!("  ----------------------------");
    println!("  Model:    {}", config.default_model);
    println!("  Memory:   {}", config.memory.backend);
    println!("  Session:  {session_id}");
    println!("  Mode:     {}", if direct { "direct (tool loop)" } else { "routed" });
    println!();
    println!("  Type 'help' for commands, 'exit' to quit.");
    println!();
}

pub async fn run(
    config: AppConfig,
    message: Option<String>,
    session: Option<String>,
    direct: bool,
) -> anyhow::Result<()> {
    let runtime = Runtime::build(config).await?;
    let session_id = session.unwrap_or_else(|| format!("cli-{}", uuid::Uuid::new_v4().simple()));

    let mut graph = TurnGraph::new(runtime.ctx.clone());
    if let Some(store) = &runtime.checkpoints {
        graph = graph.with_checkpoints(store.clone());
    }
    let mut direct_session = direct.then(|| DirectSession { history: Vec::new() });
    let debug = runtime.config.agent.debug;
    if debug {
        spawn_event_trace(runtime.events.subscribe());
    }

    if let Some(msg) = message {
        runtime.connect_auto().await;
        match direct_session.as_mut() {
            Some(session) => session.turn(&runtime, &msg).await,
            None => print_report(&graph.run_turn(&session_id, &msg).await, debug),
        }
        runtime.mcp.shutdown().await;
        return Ok(());
    }

    print_banner(&runtime.config, &session_id, direct);
    runtime.connect_auto().await;

    let mut lines = BufReader::new(io::stdin()).lines();
    loop {
        print!("  You > ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        match parse_command(&line) {
            ReplCommand::Empty => continue,
            ReplCommand::Exit => break,
            ReplCommand::Message(text) => match direct_session.as_mut() {
                Some(session) => session.turn(&runtime, text).await,
                None => print_report(&graph.run_turn(&session_id, text).await, debug),
            },
            command => handle_command(&runtime, command).await,
        }
    }

    runtime.mcp.shutdown().await;
    println!();
    println!("  Goodbye!");
    println!();
    Ok(())
}
