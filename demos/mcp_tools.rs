//! # MCP Tools Example
//!
//! Connects to an MCP server, lists its tools, and calls one directly
//! through the invoker, without involving a model.
//!
//! ## Usage
//!
//! ```bash
//! # Stdio transport (filesystem server example)
//! cargo run --example mcp_tools -- --command npx \
//!     --args @modelcontextprotocol/server-filesystem --args /tmp
//!
//! # HTTP transport
//! cargo run --example mcp_tools -- --url http://localhost:3000/mcp
//! ```

use clap::Parser;
use mcp_chat::prelude::*;
use mcp_chat::tool::ToolArguments;
use std::sync::Arc;

/// MCP tools example
#[derive(Parser, Debug)]
#[command(name = "mcp-tools")]
struct Args {
    /// MCP server name
    #[arg(long, default_value = "server")]
    name: String,

    /// Connect via command (stdio transport)
    #[arg(long, conflicts_with = "url")]
    command: Option<String>,

    /// Arguments for the command
    #[arg(long = "args", requires = "command")]
    args: Vec<String>,

    /// Connect via HTTP URL
    #[arg(long, conflicts_with_all = ["command", "args"])]
    url: Option<String>,

    /// Tool to call after listing, with JSON arguments
    #[arg(long)]
    call: Option<String>,

    /// JSON arguments for --call
    #[arg(long, default_value = "{}")]
    call_args: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    let builder = MCPClient::builder().with_name(&args.name);
    let builder = match (&args.command, &args.url) {
        (Some(command), _) => builder.with_stdio_transport(command, args.args.clone()),
        (None, Some(url)) => builder.with_http_transport(url),
        (None, None) => {
            eprintln!("either --command or --url is required");
            std::process::exit(1);
        }
    };

    let mut client = builder.build()?;
    client.connect().await?;

    let invoker = ToolInvoker::new();
    let count = invoker
        .connect(&args.name, Arc::new(McpService::new(client)))
        .await?;

    println!("=== {} tools from `{}` ===", count, args.name);
    for tool in invoker.tool_definitions().await {
        println!("- {}: {}", tool.name, tool.description);
    }

    if let Some(tool_name) = args.call {
        let result = invoker
            .invoke(&tool_name, ToolArguments::Text(args.call_args))
            .await?;
        println!("\n=== {} result ===\n{:#}", tool_name, result);
    }

    invoker.disconnect(&args.name).await;

    Ok(())
}
