//! Server configuration.

use borderless_ledger::LedgerConfig;

/// Main server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listen address.
    pub listen_addr: String,
    /// Listen port.
    pub listen_port: u16,
    /// Browser origins allowed by CORS.
    pub allowed_origins: Vec<String>,
    /// Log level, used when `RUST_LOG` is unset.
    pub log_level: String,
    /// Ledger engine configuration.
    pub ledger: LedgerConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0".to_string(),
            listen_port: 8000,
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://127.0.0.1:3000".to_string(),
            ],
            log_level: "info".to_string(),
            ledger: LedgerConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self {
            ledger: LedgerConfig::from_env(),
            ..Self::default()
        };

        if let Ok(addr) = std::env::var("SERVER_LISTEN_ADDR") {
            config.listen_addr = addr;
        }

        if let Ok(port) = std::env::var("SERVER_LISTEN_PORT") {
            if let Ok(port) = port.parse() {
                config.listen_port = port;
            }
        }

        if let Ok(origins) = std::env::var("SERVER_ALLOWED_ORIGINS") {
            config.allowed_origins = origins
                .split(',')
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect();
        }

        if let Ok(level) = std::env::var("LOG_LEVEL") {
            config.log_level = level;
        }

        config
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.listen_port == 0 {
            return Err("Listen port cannot be 0".to_string());
        }

        if self.listen_addr.is_empty() {
            return Err("Listen address cannot be empty".to_string());
        }

        if let Some(origin) = self
            .allowed_origins
            .iter()
            .find(|o| !o.starts_with("http://") && !o.starts_with("https://"))
        {
            return Err(format!("Invalid allowed origin: {origin}"));
        }

        self.ledger.validate()
    }

    /// `addr:port` to bind.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.listen_addr, self.listen_port)
    }
}
