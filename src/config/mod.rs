use std::env;
use std::time::Duration;

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub token_secret: String,
    pub token_expiration_secs: u64,
    pub rate_limit_window_secs: u64,
    pub rate_limit_requests: u32,
    pub server_host: String,
    pub server_port: u16,
    pub api_base_uri: String,
    pub default_page_size: usize,
    pub max_page_size: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, env::VarError> {
        dotenv::dotenv().ok();

        Ok(Config {
            database_url: env::var("DATABASE_URL")?,
            redis_url: env::var("REDIS_URL")?,
            token_secret: env::var("TOKEN_SECRET")?,
            token_expiration_secs: expiration_secs(env::var("TOKEN_EXPIRATION").ok().as_deref()),
            server_host: env::var("SERVER_HOST")?,
            server_port: parse_or("SERVER_PORT", 3000),
            rate_limit_window_secs: parse_or("RATE_LIMIT_WINDOW", 60),
            rate_limit_requests: parse_or("RATE_LIMIT_REQUESTS", 100),
            api_base_uri: env::var("API_BASE_URI").unwrap_or_else(|_| "/api".into()),
            default_page_size: parse_or("DEFAULT_PAGE_SIZE", 10),
            max_page_size: parse_or("MAX_PAGE_SIZE", 100),
        })
    }

    pub fn token_expiration(&self) -> Duration {
        Duration::from_secs(self.token_expiration_secs)
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }

    /// Keeps a requested page size inside `[1, max_page_size]`.
    pub fn page_size(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.default_page_size)
            .clamp(1, self.max_page_size.max(1))
    }
}

/// Token lifetime given in hours, "24h" or "24", as seconds.
fn expiration_secs(hours: Option<&str>) -> u64 {
    hours
        .and_then(|v| v.trim_end_matches('h').parse::<u64>().ok())
        .unwrap_or(24)
        .saturating_mul(3600)
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config {
        database_url: "postgres://localhost/backoffice".into(),
        redis_url: "redis://localhost".into(),
        token_secret: "test-secret".into(),
        token_expiration_secs: 3600,
        rate_limit_window_secs: 60,
        rate_limit_requests: 100,
        server_host: "127.0.0.1".into(),
        server_port: 3000,
        api_base_uri: "/api".into(),
        default_page_size: 10,
        max_page_size: 50,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_size_defaults_and_clamps() {
        let config = test_config();
        assert_eq!(config.page_size(None), 10);
        assert_eq!(config.page_size(Some(0)), 1);
        assert_eq!(config.page_size(Some(25)), 25);
        assert_eq!(config.page_size(Some(500)), 50);
    }

    #[test]
    fn expiration_is_read_in_hours() {
        assert_eq!(expiration_secs(None), 24 * 3600);
        assert_eq!(expiration_secs(Some("2h")), 7200);
        assert_eq!(expiration_secs(Some("3")), 10800);
        assert_eq!(expiration_secs(Some("soon")), 24 * 3600);
        assert_eq!(expiration_secs(Some(&u64::MAX.to_string())), u64::MAX);
    }

    #[test]
    fn durations_come_from_seconds() {
        let config = test_config();
        assert_eq!(config.token_expiration(), Duration::from_secs(3600));
        assert_eq!(config.rate_limit_window(), Duration::from_secs(60));
    }
}
