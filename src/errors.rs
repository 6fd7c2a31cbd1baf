use thiserror::Error;

/// Represents errors raised by the tool dispatch layer.
///
/// These are the conditions the protocol engine reports to the client as
/// JSON-RPC errors. Backend failures never appear here; tool handlers fold
/// them into the result envelope instead.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Error when a requested tool is not registered.
    #[error("Tool not found: {0}")]
    ToolNotFound(String),
    /// Error when inbound arguments fail the tool's input schema.
    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),
    /// Error when a command message is not a well-formed JSON-RPC request.
    #[error("Malformed request: {0}")]
    MalformedRequest(String),
    /// Other errors wrapped by anyhow.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
