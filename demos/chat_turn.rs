//! # Chat Turn Example
//!
//! Runs one conversation turn against a real model endpoint, with an
//! in-process tool service standing in for an MCP server.
//!
//! ## Usage
//!
//! ```bash
//! export DEEPSEEK_API_KEY="your-api-key"
//! cargo run --example chat_turn
//! ```

use async_trait::async_trait;
use mcp_chat::prelude::*;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;

/// A tool service that reports the (made up) weather.
#[derive(Debug)]
struct WeatherService;

#[async_trait]
impl ToolService for WeatherService {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ToolError> {
        Ok(vec![ToolDescriptor {
            name: "get_weather".to_string(),
            description: "Get the current weather for a location".to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "location": {
                        "type": "string",
                        "description": "City name"
                    }
                },
                "required": ["location"]
            }),
        }])
    }

    async fn call_tool(&self, _name: &str, arguments: Value) -> Result<Value, ToolError> {
        let location = arguments["location"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("location is required".to_string()))?;

        // MCP-style structured payload
        Ok(serde_json::json!({
            "content": [{
                "type": "text",
                "text": format!("The weather in {} is 22°C and sunny", location)
            }]
        }))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let base_url = std::env::var("OPENAI_API_BASE_URL")
        .unwrap_or_else(|_| "https://api.deepseek.com/v1".to_string());

    let llm = LLMClientBuilder::new()
        .with_base_url(base_url)
        .build_openai()?;

    let invoker = ToolInvoker::new();
    invoker.connect("weather", Arc::new(WeatherService)).await?;

    let handler = TurnHandler::with_defaults(Conversation::default(), llm, invoker);

    let (events, mut rx) = mpsc::unbounded_channel();
    let answer = handler
        .handle("What's the weather like in Taipei?", &events)
        .await?;

    while let Ok(event) = rx.try_recv() {
        if let TurnEvent::ToolResult { name, text } = event {
            println!("Tool `{}` response: {}", name, text);
        }
    }

    println!("\n=== Final Answer ===\n{}", answer);

    Ok(())
}
