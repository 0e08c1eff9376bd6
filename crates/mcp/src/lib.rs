// MCP (Model Context Protocol) server exposing Guardian news tools
// to agent clients over stdio

pub mod protocol;
pub mod server;
pub mod tools;

pub use server::McpServer;
pub use tools::{news_registry, Tool, ToolRegistry};
