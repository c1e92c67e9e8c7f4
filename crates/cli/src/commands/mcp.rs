//! `aru mcp`: inspect configured tool servers.

use super::runtime::tool_stack;
use aru_config::AppConfig;
use clap::Subcommand;

#[derive(Subcommand)]
pub enum McpAction {
    /// List configured servers without connecting
    List,
    /// Connect every enabled server and list the tools it offers
    Tools,
    /// Connect one server and list its tools
    Connect { name: String },
}

fn flags(enabled: bool, auto_connect: bool) -> &'static str {
    match (enabled, auto_connect) {
        (false, _) => "disabled",
        (true, true) => "enabled, auto-connect",
        (true, false) => "enabled",
    }
}

pub async fn run(config: AppConfig, action: McpAction) -> anyhow::Result<()> {
    match action {
        McpAction::List => {
            if config.mcp.servers.is_empty() {
                println!("  No MCP servers configured.");
            }
            for server in &config.mcp.servers {
                println!("  - {} [{}]", server.name, flags(server.enabled, server.auto_connect));
                println!("      command: {} {}", server.command, server.args.join(" "));
                if let Some(description) = &server.description {
                    println!("      {description}");
                }
            }
        }
        McpAction::Tools => {
            let (_, _, mcp) = tool_stack(&config);
            for report in mcp.connect_all_enabled().await {
                match report.error {
                    None => println!("  ✅ {} ({} tools)", report.server, report.tools.len()),
                    Some(e) => println!("  ❌ {}: {e}", report.server),
                }
            }
            println!();
            println!("{}", mcp.tools_description().await);
            mcp.shutdown().await;
        }
        McpAction::Connect { name } => {
            let (_, _, mcp) = tool_stack(&config);
            let result = mcp.connect_by_name(&name).await;
            mcp.shutdown().await;
            let tools = result?;
            println!("  ✅ Connected to {name}");
            for tool in tools {
                println!("    - {tool}");
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_flags() {
        assert_eq!(flags(false, true), "disabled");
        assert_eq!(flags(true, true), "enabled, auto-connect");
        assert_eq!(flags(true, false), "enabled");
    }
}
