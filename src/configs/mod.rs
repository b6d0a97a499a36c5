pub mod logging;
pub mod registry;
pub mod server;
pub mod streaming;

pub use logging::*;
pub use registry::*;
pub use server::*;
pub use streaming::*;

use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub streaming: StreamingConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
    pub logging: Option<LoggingConfig>,
}

impl Config {
    /// Loads `config.toml` from the current working directory, falling back
    /// to defaults (and environment overrides) when the file is absent.
    pub async fn load() -> Result<Self, crate::common::AnyError> {
        let config_str = tokio::fs::read_to_string("config.toml")
            .await
            .unwrap_or_default();

        let mut config: Config = if config_str.is_empty() {
            Config::default()
        } else {
            toml::from_str(&config_str)?
        };

        if let Ok(port) = std::env::var("PORT") {
            config.server.port = port.parse()?;
        }
        if let Ok(base_url) = std::env::var("PUBLIC_BASE_URL") {
            config.server.public_base_url = Some(base_url);
        }

        Ok(config)
    }
}
