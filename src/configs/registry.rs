use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct RegistryConfig {
    /// Length of generated tokens, clamped to [8, 16] per spec.
    pub token_length: usize,
    /// How often the background sweeper scans for expired links.
    pub sweep_interval_secs: u64,
    pub default_ttl_hours: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            token_length: 12,
            sweep_interval_secs: 30,
            default_ttl_hours: 6,
        }
    }
}
