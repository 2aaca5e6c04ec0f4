use std::env;

use anyhow::Context;

use crate::auth::generate_signing_secret;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: String,
    pub db_max_connections: u32,
    pub token_secret: String,
    /// False when the secret was generated for this process only.
    pub token_secret_from_env: bool,
    pub token_ttl_hours: i64,
    pub run_migrations: bool,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let database_url = lookup("DATABASE_URL").context("DATABASE_URL must be set")?;
        let bind_addr = lookup("BIND_ADDR").unwrap_or_else(|| "127.0.0.1:8080".to_string());

        let db_max_connections = match lookup("DB_MAX_CONNECTIONS") {
            Some(s) => s
                .parse::<u32>()
                .with_context(|| format!("DB_MAX_CONNECTIONS is not a number: {s}"))?,
            None => 10,
        };
        let token_ttl_hours = match lookup("TOKEN_TTL_HOURS") {
            Some(s) => s
                .parse::<i64>()
                .with_context(|| format!("TOKEN_TTL_HOURS is not a number: {s}"))?,
            None => 24,
        };

        let (token_secret, token_secret_from_env) = match lookup("TOKEN_SECRET") {
            Some(s) if !s.is_empty() => (s, true),
            _ => (generate_signing_secret(), false),
        };

        let run_migrations = lookup("RUN_MIGRATIONS")
            .map(|s| matches!(s.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        Ok(Self {
            database_url,
            bind_addr,
            db_max_connections,
            token_secret,
            token_secret_from_env,
            token_ttl_hours,
            run_migrations,
        })
    }
}
