pub mod backend;
pub mod config;
pub mod engine;
pub mod errors;
pub mod protocol;
pub mod server;
pub mod session;
pub mod tools;

pub use backend::{BackendClient, BackendOperation};
pub use config::BridgeConfig;
pub use engine::McpEngine;
pub use errors::BridgeError;
pub use server::{router, AppState};
pub use session::{Session, SessionRegistry};
pub use tools::{ToolDescriptor, ToolHandler, ToolRegistry};
