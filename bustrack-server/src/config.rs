//! Process configuration.
//!
//! Read once from the environment at startup and passed explicitly into
//! the components that need it.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::auth::{DEFAULT_COST, DEFAULT_MAX_CONCURRENT, SigningSecret};

/// Default port, matching the mobile app's expectations.
const DEFAULT_PORT: u16 = 3333;

/// Default size of the database pool.
const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Default TTL of the cached stop inventory.
const DEFAULT_STOP_CACHE_TTL: Duration = Duration::from_secs(60);

/// Errors from reading configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// No signing secret outside development
    #[error("JWT_SECRET must be set unless APP_ENV=development")]
    MissingSecret,

    /// A variable has an unusable value
    #[error("invalid {var}={value:?}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: &'static str,
    },
}

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AppEnv {
    Development,
    #[default]
    Production,
}

impl FromStr for AppEnv {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(AppEnv::Development),
            "production" | "prod" => Ok(AppEnv::Production),
            _ => Err(()),
        }
    }
}

/// Where data is persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreConfig {
    /// PostgreSQL via a connection pool
    Postgres { url: String, max_connections: u32 },

    /// In-process tables, optionally seeded from a JSON file
    Memory { seed_file: Option<PathBuf> },
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub env: AppEnv,
    pub bind_addr: SocketAddr,
    pub secret: SigningSecret,
    pub store: StoreConfig,
    /// bcrypt work factor.
    pub bcrypt_cost: u32,
    /// Maximum concurrent password hashing jobs.
    pub hash_concurrency: usize,
    pub stop_cache_ttl: Duration,
}

impl Config {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read configuration through `lookup`, which returns the value of a
    /// variable if it is set.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let env = match get("APP_ENV") {
            Some(value) => value.parse().map_err(|_| ConfigError::Invalid {
                var: "APP_ENV",
                value,
                reason: "expected development or production",
            })?,
            None => AppEnv::default(),
        };

        let secret = match (get("JWT_SECRET"), env) {
            (Some(secret), _) => SigningSecret::new(secret),
            (None, AppEnv::Development) => SigningSecret::development(),
            (None, AppEnv::Production) => return Err(ConfigError::MissingSecret),
        };

        let host: IpAddr = parse_var(&get, "HOST", IpAddr::V4(Ipv4Addr::UNSPECIFIED))?;
        let port: u16 = parse_var(&get, "PORT", DEFAULT_PORT)?;

        let store = match get("DATABASE_URL") {
            Some(url) => StoreConfig::Postgres {
                url,
                max_connections: parse_var(
                    &get,
                    "DATABASE_MAX_CONNECTIONS",
                    DEFAULT_MAX_CONNECTIONS,
                )?,
            },
            None => StoreConfig::Memory {
                seed_file: get("SEED_FILE").map(PathBuf::from),
            },
        };

        let bcrypt_cost: u32 = parse_var(&get, "BCRYPT_COST", DEFAULT_COST)?;
        if !(4..=31).contains(&bcrypt_cost) {
            return Err(ConfigError::Invalid {
                var: "BCRYPT_COST",
                value: bcrypt_cost.to_string(),
                reason: "must be between 4 and 31",
            });
        }

        let hash_concurrency: usize = parse_var(&get, "HASH_CONCURRENCY", DEFAULT_MAX_CONCURRENT)?;
        if hash_concurrency == 0 {
            return Err(ConfigError::Invalid {
                var: "HASH_CONCURRENCY",
                value: "0".to_string(),
                reason: "must be at least 1",
            });
        }

        let stop_cache_ttl = Duration::from_secs(parse_var(
            &get,
            "STOP_CACHE_TTL_SECS",
            DEFAULT_STOP_CACHE_TTL.as_secs(),
        )?);

        Ok(Self {
            env,
            bind_addr: SocketAddr::new(host, port),
            secret,
            store,
            bcrypt_cost,
            hash_concurrency,
            stop_cache_ttl,
        })
    }

    /// Whether the insecure development secret is in use.
    pub fn uses_development_secret(&self) -> bool {
        self.secret.is_development_fallback()
    }
}

/// Parse an optional variable, falling back to `default` when unset.
fn parse_var<G, T>(get: &G, var: &'static str, default: T) -> Result<T, ConfigError>
where
    G: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match get(var) {
        Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid {
            var,
            value,
            reason: "could not be parsed",
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_with_secret() {
        let config = config(&[("JWT_SECRET", "s3cret")]).unwrap();

        assert_eq!(config.env, AppEnv::Production);
        assert_eq!(config.bind_addr, "0.0.0.0:3333".parse().unwrap());
        assert_eq!(config.secret, SigningSecret::new("s3cret"));
        assert_eq!(config.store, StoreConfig::Memory { seed_file: None });
        assert_eq!(config.bcrypt_cost, 10);
        assert_eq!(config.hash_concurrency, 4);
        assert_eq!(config.stop_cache_ttl, Duration::from_secs(60));
        assert!(!config.uses_development_secret());
    }

    #[test]
    fn missing_secret_fails_outside_development() {
        assert_eq!(config(&[]).unwrap_err(), ConfigError::MissingSecret);
        assert_eq!(
            config(&[("APP_ENV", "production")]).unwrap_err(),
            ConfigError::MissingSecret
        );
    }

    #[test]
    fn empty_secret_counts_as_missing() {
        assert_eq!(
            config(&[("JWT_SECRET", "  ")]).unwrap_err(),
            ConfigError::MissingSecret
        );
    }

    #[test]
    fn development_falls_back_to_insecure_secret() {
        let config = config(&[("APP_ENV", "development")]).unwrap();
        assert_eq!(config.env, AppEnv::Development);
        assert!(config.uses_development_secret());
    }

    #[test]
    fn database_url_selects_postgres() {
        let config = config(&[
            ("JWT_SECRET", "x"),
            ("DATABASE_URL", "postgres://localhost/bustrack"),
            ("DATABASE_MAX_CONNECTIONS", "12"),
        ])
        .unwrap();

        assert_eq!(
            config.store,
            StoreConfig::Postgres {
                url: "postgres://localhost/bustrack".to_string(),
                max_connections: 12,
            }
        );
    }

    #[test]
    fn seed_file_for_memory_store() {
        let config = config(&[("JWT_SECRET", "x"), ("SEED_FILE", "data/seed.json")]).unwrap();
        assert_eq!(
            config.store,
            StoreConfig::Memory {
                seed_file: Some(PathBuf::from("data/seed.json"))
            }
        );
    }

    #[test]
    fn custom_bind_address() {
        let config = config(&[("JWT_SECRET", "x"), ("HOST", "127.0.0.1"), ("PORT", "8080")]).unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:8080".parse().unwrap());
    }

    #[test]
    fn invalid_values_are_reported() {
        let err = config(&[("JWT_SECRET", "x"), ("PORT", "http")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "PORT", .. }));

        let err = config(&[("JWT_SECRET", "x"), ("APP_ENV", "staging")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "APP_ENV", .. }));

        let err = config(&[("JWT_SECRET", "x"), ("BCRYPT_COST", "3")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "BCRYPT_COST", .. }));

        let err = config(&[("JWT_SECRET", "x"), ("HASH_CONCURRENCY", "0")]).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                var: "HASH_CONCURRENCY",
                ..
            }
        ));
    }

    #[test]
    fn error_display() {
        assert_eq!(
            ConfigError::MissingSecret.to_string(),
            "JWT_SECRET must be set unless APP_ENV=development"
        );
        let err = ConfigError::Invalid {
            var: "PORT",
            value: "http".to_string(),
            reason: "could not be parsed",
        };
        assert_eq!(err.to_string(), "invalid PORT=\"http\": could not be parsed");
    }
}
