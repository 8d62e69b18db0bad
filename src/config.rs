use std::env;

use anyhow::{anyhow, bail};

/// How issued session tokens are validated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionMode {
    /// Signature and expiry only. Logout just clears the cookie.
    Stateless,
    /// Every token is also registered in `session_token` and can be revoked.
    Tracked,
}

impl SessionMode {
    pub fn parse(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stateless" => Ok(SessionMode::Stateless),
            "tracked" => Ok(SessionMode::Tracked),
            other => bail!("unknown SESSION_MODE: {other}"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: String,
    pub jwt_secret: String,
    pub session_ttl_seconds: i64,
    pub session_mode: SessionMode,
    pub cookie_secure: bool,
    pub cors_origin: String,
    pub drop_last_price: bool,
    pub db_max_connections: u32,
    pub run_migrations: bool,
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.trim().parse::<T>().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL")?;
        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:5000".to_string());

        let jwt_secret = env::var("JWT_SECRET").map_err(|_| anyhow!("JWT_SECRET is required"))?;
        if jwt_secret.trim().is_empty() {
            bail!("JWT_SECRET must not be empty");
        }

        let session_mode = match env::var("SESSION_MODE") {
            Ok(s) => SessionMode::parse(&s)?,
            Err(_) => SessionMode::Stateless,
        };

        Ok(Self {
            database_url,
            bind_addr,
            jwt_secret,
            session_ttl_seconds: env_parse("SESSION_TTL_SECONDS", 60 * 60),
            session_mode,
            cookie_secure: env_parse("COOKIE_SECURE", false),
            cors_origin: env::var("CORS_ORIGIN")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            drop_last_price: env_parse("DROP_LAST_PRICE", true),
            db_max_connections: env_parse("DB_MAX_CONNECTIONS", 10),
            run_migrations: env_parse("RUN_MIGRATIONS", true),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_mode_parses_known_values() {
        assert_eq!(SessionMode::parse("stateless").unwrap(), SessionMode::Stateless);
        assert_eq!(SessionMode::parse(" Tracked ").unwrap(), SessionMode::Tracked);
        assert!(SessionMode::parse("redis").is_err());
    }

    #[test]
    fn env_parse_falls_back_on_garbage() {
        // unique key so parallel tests don't collide
        unsafe { env::set_var("PRICE_CATALOG_TEST_TTL", "not-a-number") };
        assert_eq!(env_parse("PRICE_CATALOG_TEST_TTL", 42i64), 42);
        unsafe { env::set_var("PRICE_CATALOG_TEST_TTL", "7") };
        assert_eq!(env_parse("PRICE_CATALOG_TEST_TTL", 42i64), 7);
        assert!(env_parse("PRICE_CATALOG_TEST_MISSING", true));
    }
}
