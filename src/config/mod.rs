use std::env;

/// Config holds all application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: String,
    pub frontend_dir: String,
    pub inventory_url: String,
    pub command_url: String,
    /// Initial region; empty means adopt the first region the inventory reports
    pub default_region: String,
    /// Remote call timeout in seconds, 0 disables it
    pub remote_timeout_secs: u64,
    pub ws_channel_capacity: usize,
}

impl Config {
    /// Load configuration from environment variables with defaults
    pub fn load() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let inventory_url = get("INVENTORY_URL", "http://127.0.0.1:5000");
        Self {
            listen_addr: get("LISTEN_ADDR", "0.0.0.0:8080"),
            frontend_dir: get("FRONTEND_DIR", "/app/frontend"),
            command_url: get("COMMAND_URL", &inventory_url),
            inventory_url,
            default_region: get("DEFAULT_REGION", ""),
            remote_timeout_secs: get("REMOTE_TIMEOUT_SECS", "0").parse().unwrap_or(0),
            ws_channel_capacity: get("WS_CHANNEL_CAPACITY", "256").parse().unwrap_or(256),
        }
    }
}
