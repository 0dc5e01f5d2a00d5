// crates/server/src/config.rs
//! Server configuration read from environment variables.

use std::fmt::Display;
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use proposal_desk_jobs::ScriptTask;
use thiserror::Error;

/// Default port for the server.
pub const DEFAULT_PORT: u16 = 8000;

/// Default migration script, relative to the working directory.
pub const DEFAULT_VECTORIZE_COMMAND: &str = "python3 scripts/vectorize_projects.py";

const DEFAULT_VECTORIZE_TIMEOUT_SECS: u64 = 30 * 60;

/// Origins of the local frontend dev servers.
const DEFAULT_CORS_ORIGINS: [&str; 4] = [
    "http://localhost:3000",
    "http://localhost:3001",
    "http://127.0.0.1:3000",
    "http://127.0.0.1:3001",
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?} ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("{0} must not be empty")]
    Empty(&'static str),
}

/// How to run the vectorization migration script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VectorizeConfig {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
    pub timeout: Duration,
}

impl VectorizeConfig {
    pub fn to_task(&self) -> ScriptTask {
        let task = ScriptTask::new(self.program.clone())
            .with_args(self.args.clone())
            .with_timeout(self.timeout);
        match &self.working_dir {
            Some(dir) => task.with_working_dir(dir.clone()),
            None => task,
        }
    }
}

/// Where the vector database lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChromaConfig {
    pub host: String,
    pub port: u16,
    pub api_key: Option<String>,
    pub collection: String,
}

impl ChromaConfig {
    /// `http://host:port`, or `host:port` when the host already carries a scheme.
    pub fn base_url(&self) -> String {
        if self.host.starts_with("http://") || self.host.starts_with("https://") {
            format!("{}:{}", self.host.trim_end_matches('/'), self.port)
        } else {
            format!("http://{}:{}", self.host, self.port)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,
    pub vectorize: VectorizeConfig,
    /// When set, the vectorization status survives restarts in this file.
    pub status_file: Option<PathBuf>,
    pub chroma: ChromaConfig,
    pub cors_origins: Vec<String>,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from an arbitrary variable lookup (tests pass a map).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let command = get("VECTORIZE_COMMAND").unwrap_or_else(|| DEFAULT_VECTORIZE_COMMAND.to_string());
        let mut words = command.split_whitespace().map(str::to_string);
        let program = words.next().ok_or(ConfigError::Empty("VECTORIZE_COMMAND"))?;
        let args = words.collect();

        let timeout_secs: u64 = parse(&get, "VECTORIZE_TIMEOUT_SECS", DEFAULT_VECTORIZE_TIMEOUT_SECS)?;
        if timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "VECTORIZE_TIMEOUT_SECS",
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        let cors_origins = match get("CORS_ORIGINS") {
            Some(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(str::to_string)
                .collect(),
            None => DEFAULT_CORS_ORIGINS.iter().map(|o| o.to_string()).collect(),
        };

        Ok(Self {
            host: parse(&get, "HOST", IpAddr::V4(Ipv4Addr::LOCALHOST))?,
            port: parse(&get, "PORT", DEFAULT_PORT)?,
            vectorize: VectorizeConfig {
                program,
                args,
                working_dir: get("VECTORIZE_WORKDIR").map(PathBuf::from),
                timeout: Duration::from_secs(timeout_secs),
            },
            status_file: get("STATUS_FILE").map(PathBuf::from),
            chroma: ChromaConfig {
                host: get("CHROMA_HOST").unwrap_or_else(|| "localhost".to_string()),
                port: parse(&get, "CHROMA_PORT", 8000)?,
                api_key: get("CHROMA_API_KEY"),
                collection: get("CHROMA_COLLECTION").unwrap_or_else(|| "projects".to_string()),
            },
            cors_origins,
        })
    }
}

fn parse<T>(get: &impl Fn(&str) -> Option<String>, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    match get(key) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            value: raw.clone(),
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn config_with(vars: &[(&str, &str)]) -> Result<ServerConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_with(&[]).unwrap();
        assert_eq!(config.host, IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.vectorize.program, "python3");
        assert_eq!(config.vectorize.args, vec!["scripts/vectorize_projects.py".to_string()]);
        assert_eq!(config.vectorize.timeout, Duration::from_secs(1800));
        assert!(config.status_file.is_none());
        assert_eq!(config.chroma.base_url(), "http://localhost:8000");
        assert_eq!(config.chroma.collection, "projects");
        assert_eq!(config.cors_origins.len(), 4);
    }

    #[test]
    fn test_overrides() {
        let config = config_with(&[
            ("HOST", "0.0.0.0"),
            ("PORT", "9100"),
            ("VECTORIZE_COMMAND", "/opt/venv/bin/python -u vectorize.py --full"),
            ("VECTORIZE_WORKDIR", "/srv/backend"),
            ("VECTORIZE_TIMEOUT_SECS", "60"),
            ("STATUS_FILE", "/var/lib/proposal-desk/vectorization.json"),
            ("CHROMA_HOST", "https://chroma.internal/"),
            ("CHROMA_PORT", "443"),
            ("CHROMA_API_KEY", "secret"),
            ("CORS_ORIGINS", "https://desk.example.com, http://localhost:5173,"),
        ])
        .unwrap();

        assert_eq!(config.port, 9100);
        assert_eq!(config.vectorize.program, "/opt/venv/bin/python");
        assert_eq!(config.vectorize.args, vec!["-u", "vectorize.py", "--full"]);
        assert_eq!(config.vectorize.working_dir, Some(PathBuf::from("/srv/backend")));
        assert_eq!(config.vectorize.timeout, Duration::from_secs(60));
        assert_eq!(config.chroma.base_url(), "https://chroma.internal:443");
        assert_eq!(config.chroma.api_key.as_deref(), Some("secret"));
        assert_eq!(
            config.cors_origins,
            vec!["https://desk.example.com".to_string(), "http://localhost:5173".to_string()]
        );
    }

    #[test]
    fn test_invalid_port() {
        let err = config_with(&[("PORT", "eighty")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "PORT", .. }));
        assert!(err.to_string().contains("eighty"));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let err = config_with(&[("VECTORIZE_TIMEOUT_SECS", "0")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "VECTORIZE_TIMEOUT_SECS", .. }));
    }

    #[test]
    fn test_blank_values_use_defaults() {
        let config = config_with(&[("PORT", "  "), ("VECTORIZE_COMMAND", "")]).unwrap();
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.vectorize.program, "python3");
    }

    #[test]
    fn test_to_task() {
        let config = config_with(&[("VECTORIZE_COMMAND", "sh run.sh")]).unwrap();
        let task = config.vectorize.to_task();
        assert_eq!(task.program(), "sh");
        assert_eq!(task.args(), ["run.sh".to_string()]);
    }
}
