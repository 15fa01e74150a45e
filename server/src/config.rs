// Configuration constants for the server

use std::time::Duration;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub port: u16,
    pub rate_limit_per_minute: u32,
    pub request_timeout_secs: u64,
    pub cors_allowed_origins: Option<Vec<String>>,
    /// Height in pixels of every editor canvas and thumbnail.
    pub canvas_height: u32,
    /// Largest accepted request body (pitch documents can be large).
    pub max_document_bytes: usize,
    /// Sessions kept alive at once; the least recently used is evicted.
    pub max_sessions: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            rate_limit_per_minute: 60,
            request_timeout_secs: 60,
            cors_allowed_origins: None,
            canvas_height: 256,
            max_document_bytes: 32 * 1024 * 1024,
            max_sessions: 64,
        }
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let cors_allowed_origins = std::env::var("CORS_ALLOWED_ORIGINS")
            .ok()
            .map(|origins| {
                origins
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            });

        Self {
            port: env_or("PORT", defaults.port),
            rate_limit_per_minute: env_or("RATE_LIMIT_PER_MINUTE", defaults.rate_limit_per_minute).max(1),
            request_timeout_secs: env_or("REQUEST_TIMEOUT_SECS", defaults.request_timeout_secs),
            cors_allowed_origins,
            canvas_height: env_or("CANVAS_HEIGHT", defaults.canvas_height).max(1),
            max_document_bytes: env_or("MAX_DOCUMENT_BYTES", defaults.max_document_bytes),
            max_sessions: env_or("MAX_SESSIONS", defaults.max_sessions).max(1),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Time for the rate limiter to replenish one request.
    pub fn rate_limit_period(&self) -> Duration {
        Duration::from_secs_f64(60.0 / self.rate_limit_per_minute.max(1) as f64)
    }
}
