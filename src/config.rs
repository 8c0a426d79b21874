//! Application configuration loaded from environment variables.

use anyhow::Context;

/// Runtime configuration.
///
/// Reads from environment variables:
/// - `DATABASE_URL`: Postgres connection string (required)
/// - `HOST` / `PORT`: bind address (default `0.0.0.0:8083`)
/// - `MAX_DB_CONNECTIONS`: pool size (default 10)
/// - `ADMIN_USERNAME` / `ADMIN_EMAIL`: bootstrap admin account
/// - `ORDER_RETENTION_DAYS`: cancelled-order retention window (default 7)
/// - `SWEEP_INTERVAL_HOURS`: background sweep cadence (default 24)
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub max_db_connections: u32,
    pub admin_username: String,
    pub admin_email: String,
    pub order_retention_days: i64,
    pub sweep_interval_hours: u64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            database_url: std::env::var("DATABASE_URL").context("DATABASE_URL is not set")?,
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8083),
            max_db_connections: std::env::var("MAX_DB_CONNECTIONS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10),
            admin_username: std::env::var("ADMIN_USERNAME")
                .unwrap_or_else(|_| "admin".to_string()),
            admin_email: std::env::var("ADMIN_EMAIL")
                .unwrap_or_else(|_| "admin@store.com".to_string()),
            order_retention_days: std::env::var("ORDER_RETENTION_DAYS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(7),
            sweep_interval_hours: std::env::var("SWEEP_INTERVAL_HOURS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(24),
        })
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Config {
        Config {
            database_url: "postgres://localhost/storefront".into(),
            host: "0.0.0.0".into(),
            port: 8083,
            max_db_connections: 10,
            admin_username: "admin".into(),
            admin_email: "admin@store.com".into(),
            order_retention_days: 7,
            sweep_interval_hours: 24,
        }
    }

    #[test]
    fn test_addr_formatting() {
        let mut config = base();
        config.host = "127.0.0.1".into();
        config.port = 9000;
        assert_eq!(config.addr(), "127.0.0.1:9000");
    }

    #[test]
    fn test_default_retention_window() {
        assert_eq!(base().order_retention_days, 7);
    }
}
