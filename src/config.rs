use crate::error::{AppError, Result};

/// How often the self-healing sweep walks the live table (seconds).
pub const SWEEP_INTERVAL_SECS: u64 = 60;

/// Timeout for every outbound HTTP request (source adapters, relay, thumbnails).
pub const HTTP_TIMEOUT_SECS: u64 = 30;

/// Source adapter retry backoff values in milliseconds. One attempt per entry plus the first try.
pub const SOURCE_RETRY_BACKOFF_MS: &[u64] = &[250, 500, 1000];

/// AES-GCM nonce length in bytes.
pub const IV_LEN: usize = 12;

/// AES-256 key length in bytes.
pub const CIPHER_KEY_LEN: usize = 32;

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub db_path: String,
    pub api_port: u16,
    /// Public base URL used in ignore / thumbnail links (SERVER_HOST)
    pub server_host: String,
    /// Raw AES-256 key decoded from CIPHER_KEY (64 hex chars)
    pub cipher_key: Vec<u8>,
    /// Mail relay endpoint (NOTIFY_WEBHOOK_URL). Messages are only logged when unset.
    pub notify_webhook_url: Option<String>,
    pub mercari_source_url: Option<String>,
    pub yahoo_source_url: Option<String>,
    pub surugaya_source_url: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let cipher_key_hex = std::env::var("CIPHER_KEY")
            .map_err(|_| AppError::Config("CIPHER_KEY must be set (64 hex chars)".to_string()))?;

        Ok(Self {
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            db_path: std::env::var("DB_PATH").unwrap_or_else(|_| "hunter.db".to_string()),
            api_port: std::env::var("API_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse::<u16>()
                .map_err(|_| AppError::Config("API_PORT must be a valid port number".to_string()))?,
            server_host: std::env::var("SERVER_HOST")
                .unwrap_or_else(|_| "http://localhost:3000".to_string())
                .trim_end_matches('/')
                .to_string(),
            cipher_key: parse_cipher_key(&cipher_key_hex)?,
            notify_webhook_url: optional_var("NOTIFY_WEBHOOK_URL"),
            mercari_source_url: optional_var("MERCARI_SOURCE_URL"),
            yahoo_source_url: optional_var("YAHOO_SOURCE_URL"),
            surugaya_source_url: optional_var("SURUGAYA_SOURCE_URL"),
        })
    }
}

fn optional_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|s| s.trim().trim_end_matches('/').to_string())
        .filter(|s| !s.is_empty())
}

pub fn parse_cipher_key(hex_key: &str) -> Result<Vec<u8>> {
    let key = hex::decode(hex_key.trim())
        .map_err(|e| AppError::Config(format!("CIPHER_KEY is not valid hex: {e}")))?;
    if key.len() != CIPHER_KEY_LEN {
        return Err(AppError::Config(format!(
            "CIPHER_KEY must decode to {CIPHER_KEY_LEN} bytes, got {}",
            key.len()
        )));
    }
    Ok(key)
}
