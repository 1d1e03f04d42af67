mod server;
mod tools;
mod types;

pub use server::McpServer;
pub use tools::ToolRegistry;
