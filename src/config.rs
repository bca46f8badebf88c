use std::{net::SocketAddr, path::PathBuf};

const DEFAULT_MODEL_PATH: &str = "accident_model.json";
const DEFAULT_SCHEMA_PATH: &str = "model_columns.json";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 5000;

/// Process configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Serialized classifier (`.json` tree ensemble, or `.pt` with the `torch` feature).
    pub model_path: PathBuf,
    /// JSON array of feature-column names, in training order.
    pub schema_path: PathBuf,
    pub host: String,
    pub port: u16,
    /// Log a summary of every encoded vector (`LOG_PRED=1`).
    pub log_predictions: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            schema_path: PathBuf::from(DEFAULT_SCHEMA_PATH),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            log_predictions: false,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; unset or unparsable values keep the default.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            model_path: lookup("MODEL_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.model_path),
            schema_path: lookup("SCHEMA_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.schema_path),
            host: lookup("HOST").unwrap_or(defaults.host),
            port: lookup("PORT")
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(defaults.port),
            log_predictions: lookup("LOG_PRED").as_deref() == Some("1"),
        }
    }

    pub fn bind_addr(&self) -> anyhow::Result<SocketAddr> {
        let ip = self
            .host
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid HOST {:?}: {}", self.host, e))?;
        Ok(SocketAddr::new(ip, self.port))
    }
}
