pub mod client;
pub mod service;

pub use client::{MCPClient, MCPClientBuilder, MCPConfig, MCPError, MCPTransport};
pub use service::McpService;
