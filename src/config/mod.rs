use std::env;
use std::time::Duration;

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    pub redis_url: String,
    pub server_host: String,
    pub server_port: u16,
    pub github_token: String,
    pub github_api_base_url: String,
    pub github_rate_limit_buffer: i64,
    pub cache_ttl_secs: u64,
    pub rate_limit_window_secs: u64,
    pub rate_limit_public: u32,
    pub rate_limit_authenticated: u32,
    pub api_key_header: String,
    pub prometheus_enabled: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, env::VarError> {
        dotenv::dotenv().ok();

        Ok(Config {
            redis_url: env::var("REDIS_URL")?,
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "::".to_string()),
            server_port: env::var("SERVER_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8000),
            github_token: env::var("GITHUB_TOKEN").unwrap_or_default(),
            github_api_base_url: env::var("GITHUB_API_BASE_URL")
                .unwrap_or_else(|_| "https://api.github.com".to_string()),
            github_rate_limit_buffer: env::var("GITHUB_RATE_LIMIT_BUFFER")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10),
            cache_ttl_secs: env::var("CACHE_TTL")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3600),
            rate_limit_window_secs: env::var("RATE_LIMIT_WINDOW")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3600),
            rate_limit_public: env::var("RATE_LIMIT_PUBLIC")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(100),
            rate_limit_authenticated: env::var("RATE_LIMIT_AUTHENTICATED")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1000),
            api_key_header: env::var("API_KEY_HEADER").unwrap_or_else(|_| "x-api-key".to_string()),
            prometheus_enabled: env::var("PROMETHEUS_ENABLED")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(true),
        })
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }
}
