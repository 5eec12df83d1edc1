//! Configuration system for the `chatsync` client.
//!
//! Supports layered configuration with the following priority (highest first):
//! 1. CLI arguments
//! 2. Environment variables (via clap `env` attribute)
//! 3. TOML config file (`~/.config/chatsync/config.toml`)
//! 4. Compiled defaults
//!
//! Missing config file is not an error (defaults are used). An explicit
//! `--config` path that doesn't exist is an error.

use std::path::PathBuf;
use std::time::Duration;

use chatsync_proto::identity::Identity;
use url::Url;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse the TOML configuration.
    #[error("failed to parse config file: {0}")]
    ParseToml(#[from] toml::de::Error),

    /// A URL setting could not be parsed.
    #[error("invalid {field} {value:?}: {source}")]
    InvalidUrl {
        /// Which setting.
        field: &'static str,
        /// The rejected value.
        value: String,
        /// Parser error.
        source: url::ParseError,
    },

    /// A numeric setting is outside its allowed range.
    #[error("{field} must be at least {min}")]
    OutOfRange {
        /// Which setting.
        field: &'static str,
        /// Smallest accepted value.
        min: u64,
    },
}

// ---------------------------------------------------------------------------
// TOML file structs (all fields Option for partial overrides)
// ---------------------------------------------------------------------------

/// Top-level TOML config file structure.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ConfigFile {
    server: ServerFileConfig,
    identity: IdentityFileConfig,
    reconnect: ReconnectFileConfig,
    session: SessionFileConfig,
}

/// `[server]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ServerFileConfig {
    base_url: Option<String>,
    ws_url: Option<String>,
    request_timeout_secs: Option<u64>,
    connect_timeout_secs: Option<u64>,
}

/// `[identity]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct IdentityFileConfig {
    user_id: Option<String>,
    google_id: Option<String>,
    display_name: Option<String>,
}

/// `[reconnect]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ReconnectFileConfig {
    delay_ms: Option<u64>,
    backoff_factor: Option<u32>,
    max_delay_ms: Option<u64>,
    max_attempts: Option<u32>,
}

/// `[session]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct SessionFileConfig {
    history_limit: Option<usize>,
    channel_capacity: Option<usize>,
}

// ---------------------------------------------------------------------------
// Resolved configuration (concrete types, all fields populated)
// ---------------------------------------------------------------------------

/// Reconnect policy for the connection supervisor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectConfig {
    /// Delay before the first retry.
    pub delay: Duration,
    /// Multiplier applied per consecutive failure (1 = fixed delay).
    pub backoff_factor: u32,
    /// Upper bound on the delay.
    pub max_delay: Duration,
    /// Consecutive failures tolerated before giving up; `None` = never.
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(2),
            backoff_factor: 1,
            max_delay: Duration::from_secs(30),
            max_attempts: None,
        }
    }
}

impl ReconnectConfig {
    /// Delay before retry number `attempt` (1-based).
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let growth = self.backoff_factor.max(1).saturating_pow(exponent);
        self.delay
            .saturating_mul(growth)
            .min(self.max_delay.max(self.delay))
    }

    /// Whether `attempt` exceeds the configured limit.
    #[must_use]
    pub fn exhausted(&self, attempt: u32) -> bool {
        self.max_attempts.is_some_and(|max| attempt > max)
    }
}

/// Statically configured identity, if any.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityConfig {
    /// Persistent user id.
    pub user_id: Option<String>,
    /// Federated (Google) id.
    pub google_id: Option<String>,
    /// Display name used for self attribution when no profile is fetched.
    pub display_name: Option<String>,
}

/// Fully resolved client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    // -- Server --
    /// HTTP origin of the chat server; also the "page origin" for websocket
    /// URL derivation.
    pub base_url: Url,
    /// Explicit websocket URL, skipping the configuration lookup.
    pub ws_url: Option<Url>,
    /// Timeout for each HTTP request.
    pub request_timeout: Duration,
    /// Timeout for the websocket handshake.
    pub connect_timeout: Duration,

    // -- Identity --
    /// Identity settings.
    pub identity: IdentityConfig,

    // -- Reconnect --
    /// Reconnect policy.
    pub reconnect: ReconnectConfig,

    // -- Session --
    /// Maximum messages kept in the visible history.
    pub history_limit: usize,
    /// Capacity of the engine's mpsc queues.
    pub channel_capacity: usize,
}

/// Default HTTP origin of the chat server.
pub const DEFAULT_BASE_URL: &str = "http://localhost:5000/";
/// Default timeout for HTTP requests and the websocket handshake.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
/// Default bound on the visible history.
pub const DEFAULT_HISTORY_LIMIT: usize = 200;
/// Default capacity of the engine queues.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

impl ClientConfig {
    /// Load configuration by merging CLI args, env vars, and a TOML file.
    ///
    /// If `--config` is given and the file does not exist, returns an error.
    /// If no `--config` is given, the default path
    /// (`~/.config/chatsync/config.toml`) is tried and silently ignored if
    /// missing.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the explicit config file cannot be read or
    /// parsed, or a URL or numeric setting is invalid.
    pub fn load(cli: &CliArgs) -> Result<Self, ConfigError> {
        let file = load_config_file(cli.config.as_deref())?;
        Self::resolve(cli, &file)
    }

    /// Resolve a `ClientConfig` from CLI args and a parsed config file.
    ///
    /// Priority: CLI > file > default. Separated from `load()` to enable
    /// unit testing without CLI parsing.
    fn resolve(cli: &CliArgs, file: &ConfigFile) -> Result<Self, ConfigError> {
        let defaults = ReconnectConfig::default();

        let base_url = parse_url(
            "base_url",
            cli.base_url
                .as_deref()
                .or(file.server.base_url.as_deref())
                .unwrap_or(DEFAULT_BASE_URL),
        )?;
        let ws_url = cli
            .ws_url
            .as_deref()
            .or(file.server.ws_url.as_deref())
            .map(|raw| parse_url("ws_url", raw))
            .transpose()?;

        let history_limit = file
            .session
            .history_limit
            .unwrap_or(DEFAULT_HISTORY_LIMIT);
        if history_limit == 0 {
            return Err(ConfigError::OutOfRange {
                field: "history_limit",
                min: 1,
            });
        }
        let channel_capacity = file
            .session
            .channel_capacity
            .unwrap_or(DEFAULT_CHANNEL_CAPACITY);
        if channel_capacity == 0 {
            return Err(ConfigError::OutOfRange {
                field: "channel_capacity",
                min: 1,
            });
        }

        Ok(Self {
            base_url,
            ws_url,
            request_timeout: file
                .server
                .request_timeout_secs
                .map_or(DEFAULT_TIMEOUT, Duration::from_secs),
            connect_timeout: file
                .server
                .connect_timeout_secs
                .map_or(DEFAULT_TIMEOUT, Duration::from_secs),
            identity: IdentityConfig {
                user_id: cli
                    .user_id
                    .clone()
                    .or_else(|| file.identity.user_id.clone()),
                google_id: cli
                    .google_id
                    .clone()
                    .or_else(|| file.identity.google_id.clone()),
                display_name: cli
                    .display_name
                    .clone()
                    .or_else(|| file.identity.display_name.clone()),
            },
            reconnect: ReconnectConfig {
                delay: file
                    .reconnect
                    .delay_ms
                    .map_or(defaults.delay, Duration::from_millis),
                backoff_factor: file
                    .reconnect
                    .backoff_factor
                    .unwrap_or(defaults.backoff_factor),
                max_delay: file
                    .reconnect
                    .max_delay_ms
                    .map_or(defaults.max_delay, Duration::from_millis),
                max_attempts: file.reconnect.max_attempts,
            },
            history_limit,
            channel_capacity,
        })
    }

    /// The statically configured identity, if a user id is set.
    #[must_use]
    pub fn identity(&self) -> Option<Identity> {
        let user_id = self.identity.user_id.clone()?;
        if user_id.trim().is_empty() {
            return None;
        }
        let identity = Identity::new(user_id);
        Some(match &self.identity.google_id {
            Some(g) => identity.with_federated_id(g.clone()),
            None => identity,
        })
    }
}

/// CLI arguments parsed by clap.
#[derive(clap::Parser, Debug, Default)]
#[command(version, about = "Terminal client for the realtime channel chat")]
pub struct CliArgs {
    /// HTTP origin of the chat server.
    #[arg(long, env = "CHATSYNC_BASE_URL")]
    pub base_url: Option<String>,

    /// Websocket URL; skips the `/config/ws` lookup.
    #[arg(long, env = "CHATSYNC_WS_URL")]
    pub ws_url: Option<String>,

    /// User id to announce; otherwise resolved via `/session_user`.
    #[arg(long, env = "CHATSYNC_USER_ID")]
    pub user_id: Option<String>,

    /// Federated (Google) id to announce.
    #[arg(long, env = "CHATSYNC_GOOGLE_ID")]
    pub google_id: Option<String>,

    /// Display name used to recognise your own messages.
    #[arg(long, env = "CHATSYNC_DISPLAY_NAME")]
    pub display_name: Option<String>,

    /// Path to config file (default: `~/.config/chatsync/config.toml`).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", env = "CHATSYNC_LOG")]
    pub log_level: String,

    /// Path to log file (default: `$TMPDIR/chatsync.log`).
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn parse_url(field: &'static str, raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw).map_err(|source| ConfigError::InvalidUrl {
        field,
        value: raw.to_string(),
        source,
    })
}

/// Load and parse a TOML config file.
///
/// If `explicit_path` is `Some`, the file must exist (error if not).
/// If `explicit_path` is `None`, the default path is tried and missing file
/// is treated as empty config.
fn load_config_file(explicit_path: Option<&std::path::Path>) -> Result<ConfigFile, ConfigError> {
    let path = if let Some(p) = explicit_path {
        let contents = std::fs::read_to_string(p).map_err(|e| ConfigError::ReadFile {
            path: p.to_path_buf(),
            source: e,
        })?;
        return Ok(toml::from_str(&contents)?);
    } else {
        let Some(config_dir) = dirs::config_dir() else {
            return Ok(ConfigFile::default());
        };
        config_dir.join("chatsync").join("config.toml")
    };

    match std::fs::read_to_string(&path) {
        Ok(contents) => Ok(toml::from_str(&contents)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ConfigFile::default()),
        Err(e) => Err(ConfigError::ReadFile { path, source: e }),
    }
}
