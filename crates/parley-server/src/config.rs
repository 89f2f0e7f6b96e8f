use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use parley_gateway::connection::ConnectionSettings;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} has invalid value '{value}'")]
    Invalid { var: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub connection: ConnectionSettings,
}

impl ServerConfig {
    /// Read configuration from `PARLEY_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = ConnectionSettings::default();

        let host = lookup("PARLEY_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port = parse_or(&lookup, "PARLEY_PORT", 8000u16)?;
        let db_path = lookup("PARLEY_DB_PATH")
            .unwrap_or_else(|| "parley.db".into())
            .into();
        let outbound_buffer = parse_or(&lookup, "PARLEY_OUTBOUND_BUFFER", defaults.outbound_buffer)?;
        let heartbeat_secs = parse_or(
            &lookup,
            "PARLEY_HEARTBEAT_SECS",
            defaults.heartbeat_interval.as_secs(),
        )?;

        if outbound_buffer == 0 {
            return Err(ConfigError::Invalid {
                var: "PARLEY_OUTBOUND_BUFFER",
                value: "0".into(),
            });
        }
        if heartbeat_secs == 0 {
            return Err(ConfigError::Invalid {
                var: "PARLEY_HEARTBEAT_SECS",
                value: "0".into(),
            });
        }

        Ok(Self {
            host,
            port,
            db_path,
            connection: ConnectionSettings {
                outbound_buffer,
                heartbeat_interval: Duration::from_secs(heartbeat_secs),
            },
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<F, T>(lookup: &F, var: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(var) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { var, value }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults() {
        let config = ServerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.bind_addr(), "0.0.0.0:8000");
        assert_eq!(config.db_path, PathBuf::from("parley.db"));
        assert_eq!(config.connection.outbound_buffer, 256);
        assert_eq!(config.connection.heartbeat_interval, Duration::from_secs(15));
    }

    #[test]
    fn overrides() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("PARLEY_HOST", "127.0.0.1"),
            ("PARLEY_PORT", "9100"),
            ("PARLEY_DB_PATH", "/tmp/chat.db"),
            ("PARLEY_OUTBOUND_BUFFER", "8"),
            ("PARLEY_HEARTBEAT_SECS", "30"),
        ]))
        .unwrap();

        assert_eq!(config.bind_addr(), "127.0.0.1:9100");
        assert_eq!(config.db_path, PathBuf::from("/tmp/chat.db"));
        assert_eq!(config.connection.outbound_buffer, 8);
        assert_eq!(config.connection.heartbeat_interval, Duration::from_secs(30));
    }

    #[test]
    fn invalid_port_is_an_error() {
        let err = ServerConfig::from_lookup(lookup(&[("PARLEY_PORT", "eighty")])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::Invalid {
                var: "PARLEY_PORT",
                value: "eighty".into()
            }
        );
    }

    #[test]
    fn zero_buffer_is_an_error() {
        assert!(ServerConfig::from_lookup(lookup(&[("PARLEY_OUTBOUND_BUFFER", "0")])).is_err());
        assert!(ServerConfig::from_lookup(lookup(&[("PARLEY_HEARTBEAT_SECS", "0")])).is_err());
    }
}
