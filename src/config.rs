//! Server configuration.
//!
//! The daemon reads a single JSON file at startup and turns it into an
//! immutable [`ServerConfig`]. Every problem with the file is reported as a
//! [`ConfigError`] before any socket is opened.
//!
//! # Example file
//!
//! ```json
//! {
//!     "shared_dir": "/srv/shared/",
//!     "use_conda": true,
//!     "conda_env": "workflow",
//!     "log_level": "DEBUG",
//!     "workflow_file": "/opt/workflow/workflow.py",
//!     "connection": { "mode": "TCP", "port": 9000, "listen_addr": "127.0.0.1" }
//! }
//! ```
use std::{
    fmt, fs,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::{Path, PathBuf},
};

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration '{}': {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid configuration: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("'use_conda' is set but no 'conda_env' was given")]
    MissingCondaEnv,
    #[error("invalid listen address '{0}'")]
    ListenAddr(String),
}

/// Verbosity requested from the workflow script.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogLevel {
    Info,
    Debug,
    Error,
    NoLogs,
}

impl LogLevel {
    /// Flag passed to the workflow script. `INFO` is its default and has none.
    pub fn flag(self) -> Option<&'static str> {
        match self {
            LogLevel::Info => None,
            LogLevel::Debug => Some("-d"),
            LogLevel::Error => Some("-q"),
            LogLevel::NoLogs => Some("--no-logs"),
        }
    }
}

/// Where the server listens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenMode {
    Tcp(SocketAddr),
    Unix(PathBuf),
}

impl fmt::Display for ListenMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListenMode::Tcp(addr) => write!(f, "tcp://{addr}"),
            ListenMode::Unix(path) => write!(f, "unix://{}", path.display()),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "mode", rename_all = "UPPERCASE")]
enum RawConnection {
    Tcp {
        port: u16,
        listen_addr: Option<String>,
    },
    Unix {
        socket_path: PathBuf,
    },
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    shared_dir: String,
    use_conda: bool,
    conda_env: Option<String>,
    log_level: LogLevel,
    workflow_file: PathBuf,
    connection: RawConnection,
    #[serde(default = "default_send_response")]
    send_response: bool,
}

fn default_send_response() -> bool {
    true
}

/// Process-wide settings, fixed once the daemon has started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Prefix prepended verbatim to job input and output names.
    pub shared_dir: String,
    pub log_level: LogLevel,
    pub workflow_file: PathBuf,
    /// Wrapper the job command runs under, e.g. `mamba run -n env`.
    pub command_prefix: Vec<String>,
    pub listen: ListenMode,
    /// Reply with `{"result": ...}` before closing. Off means the legacy silent protocol.
    pub send_response: bool,
}

impl ServerConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        contents.parse()
    }

    fn from_raw(raw: RawConfig) -> Result<Self, ConfigError> {
        let command_prefix = match (raw.use_conda, raw.conda_env) {
            (true, Some(env)) => vec!["mamba".into(), "run".into(), "-n".into(), env],
            (true, None) => return Err(ConfigError::MissingCondaEnv),
            (false, _) => Vec::new(),
        };

        let listen = match raw.connection {
            RawConnection::Tcp { port, listen_addr } => {
                ListenMode::Tcp(SocketAddr::new(parse_listen_addr(listen_addr)?, port))
            }
            RawConnection::Unix { socket_path } => ListenMode::Unix(socket_path),
        };

        Ok(Self {
            shared_dir: raw.shared_dir,
            log_level: raw.log_level,
            workflow_file: raw.workflow_file,
            command_prefix,
            listen,
            send_response: raw.send_response,
        })
    }
}

impl std::str::FromStr for ServerConfig {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw: RawConfig = serde_json::from_str(s)?;
        Self::from_raw(raw)
    }
}

/// `None` and the legacy `"0"` both mean every interface.
fn parse_listen_addr(addr: Option<String>) -> Result<IpAddr, ConfigError> {
    match addr.as_deref() {
        None | Some("0") => Ok(IpAddr::V4(Ipv4Addr::UNSPECIFIED)),
        Some(addr) => addr
            .parse()
            .map_err(|_| ConfigError::ListenAddr(addr.to_string())),
    }
}
