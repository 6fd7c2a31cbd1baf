/// Configuration for the bridge process.
///
/// All values are fixed defaults matched to the local development setup;
/// loading them from the environment is an operational concern outside this
/// crate.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Base URL of the RAG backend answering /query and /describe-image.
    pub backend_base_url: String,
    /// Port the bridge listens on.
    pub listen_port: u16,
    /// Origin allowed to reach the SSE and message endpoints.
    pub allowed_origin: String,
    /// Server name reported during MCP initialization.
    pub server_name: String,
    /// Server version reported during MCP initialization.
    pub server_version: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            backend_base_url: "http://localhost:5001".to_string(),
            listen_port: 3001,
            allowed_origin: "http://localhost:5173".to_string(),
            server_name: "Applique Component RAG - SSE".to_string(),
            server_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl BridgeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_backend_base_url(mut self, url: impl Into<String>) -> Self {
        self.backend_base_url = url.into();
        self
    }

    pub fn with_listen_port(mut self, port: u16) -> Self {
        self.listen_port = port;
        self
    }

    pub fn with_allowed_origin(mut self, origin: impl Into<String>) -> Self {
        self.allowed_origin = origin.into();
        self
    }
}
