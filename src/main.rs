//! Chat REPL: one conversation turn per input line, with MCP tool servers
//! connected at startup.

use std::io::Write as _;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use mcp_chat::chat::DEFAULT_HISTORY_CAP;
use mcp_chat::prelude::*;

/// Chat front-end for an OpenAI-compatible model with MCP tool servers.
#[derive(Parser, Debug)]
#[command(name = "mcp-chat")]
struct Cli {
    /// Model name
    #[arg(long, default_value = "deepseek-chat")]
    model: String,

    /// Base URL of the chat-completions endpoint
    #[arg(long, default_value = "https://api.deepseek.com/v1")]
    base_url: String,

    /// System prompt override
    #[arg(long)]
    system_prompt: Option<String>,

    /// Number of history entries carried into each request
    #[arg(long, default_value_t = DEFAULT_HISTORY_CAP)]
    max_history: usize,

    /// Sampling temperature
    #[arg(long, default_value_t = 0.0)]
    temperature: f32,

    /// Maximum tokens to generate per completion
    #[arg(long, default_value_t = 4096)]
    max_tokens: u32,

    /// Feed tool results back to the model instead of summarizing once
    #[arg(long)]
    iterative: bool,

    /// MCP server over stdio, as "name=command [args...]" (repeatable)
    #[arg(long = "mcp")]
    mcp_servers: Vec<String>,

    /// MCP server over HTTP, as "name=url" (repeatable)
    #[arg(long = "http-mcp")]
    http_mcp_servers: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let llm = LLMClientBuilder::new()
        .with_base_url(cli.base_url.clone())
        .build_openai()
        .context("failed to create model client")?;

    let invoker = ToolInvoker::new();
    let mut services: Vec<(String, McpService)> = Vec::new();

    for spec in &cli.mcp_servers {
        let (name, command_line) = parse_server_spec(spec)?;
        let mut parts = command_line.split_whitespace();
        let command = parts
            .next()
            .with_context(|| format!("empty command in --mcp {}", spec))?;
        let args: Vec<String> = parts.map(str::to_string).collect();

        let mut client = MCPClient::builder()
            .with_name(&name)
            .with_stdio_transport(command, args)
            .build()?;
        client
            .connect()
            .await
            .with_context(|| format!("failed to connect MCP server {}", name))?;

        connect_service(&invoker, &mut services, name, client).await?;
    }

    for spec in &cli.http_mcp_servers {
        let (name, url) = parse_server_spec(spec)?;

        let mut client = MCPClient::builder()
            .with_name(&name)
            .with_http_transport(url)
            .build()?;
        client
            .connect()
            .await
            .with_context(|| format!("failed to connect MCP server {}", name))?;

        connect_service(&invoker, &mut services, name, client).await?;
    }

    let config = TurnConfig {
        model: cli.model.clone(),
        system_prompt: cli
            .system_prompt
            .clone()
            .unwrap_or_else(|| mcp_chat::chat::DEFAULT_SYSTEM_PROMPT.to_string()),
        temperature: Some(cli.temperature),
        max_tokens: cli.max_tokens,
        ..TurnConfig::default()
    };
    let handler = TurnHandler::new(Conversation::new(cli.max_history), llm, invoker.clone(), config);

    let (events, mut event_rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            match event {
                TurnEvent::ToolCall { name, arguments } => {
                    println!("calling tool `{}` with {}", name, arguments);
                }
                TurnEvent::ToolResult { name, text } => {
                    println!("Tool `{}` response:\n```json\n{}\n```", name, text);
                }
            }
        }
    });

    println!("mcp-chat ({} tools connected, /quit to exit)", invoker.tool_definitions().await.len());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "/quit" || line == "/exit" {
            break;
        }

        let result = if cli.iterative {
            handler.handle_iterative(line, &events).await
        } else {
            handler.handle(line, &events).await
        };

        match result {
            Ok(answer) => println!("{}\n", answer),
            Err(e) => eprintln!("turn failed: {}\n", e),
        }
    }

    for (name, service) in services {
        invoker.disconnect(&name).await;
        if let Err(e) = service.shutdown().await {
            eprintln!("failed to shut down {}: {}", name, e);
        }
    }

    Ok(())
}

/// Splits a "name=rest" server spec.
fn parse_server_spec(spec: &str) -> Result<(String, &str)> {
    match spec.split_once('=') {
        Some((name, rest)) if !name.is_empty() && !rest.is_empty() => {
            Ok((name.to_string(), rest))
        }
        _ => bail!("expected name=value, got {:?}", spec),
    }
}

async fn connect_service(
    invoker: &ToolInvoker,
    services: &mut Vec<(String, McpService)>,
    name: String,
    client: MCPClient,
) -> Result<()> {
    let service = McpService::new(client);
    let count = invoker
        .connect(name.clone(), Arc::new(service.clone()))
        .await
        .with_context(|| format!("failed to list tools from {}", name))?;
    println!("connected `{}` ({} tools)", name, count);
    services.push((name, service));
    Ok(())
}
