//! On-disk configuration: one `Config` per deployment, one `NetworkConfig`
//! per IRC network a user has configured.
//!
//! Loading is fallible and fatal at startup; a malformed config file is
//! never silently patched over with defaults for fields the user supplied.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Top-level configuration for a running Dispatch process.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding the Store file, the full-text index, and the
    /// session cookie secret. Created on first run if absent.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// `tracing-subscriber` `EnvFilter` directive, e.g. `"dispatch=debug,info"`.
    #[serde(default = "default_log_filter")]
    pub log_filter: String,

    /// Per-network connection settings, keyed by an arbitrary local name.
    #[serde(default)]
    pub networks: Vec<NetworkConfig>,
}

fn default_data_dir() -> String {
    "./data".to_owned()
}

fn default_log_filter() -> String {
    "dispatch=info".to_owned()
}

/// One IRC network a user has configured a persistent connection to.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Hostname or address to dial.
    pub host: String,
    /// TCP port to dial.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Whether to negotiate TLS after connecting.
    #[serde(default)]
    pub tls: bool,
    /// Server password (`PASS`), if the network requires one.
    #[serde(default)]
    pub password: Option<String>,
    /// Initial nickname to register with.
    pub nick: String,
    /// `USER` username field.
    #[serde(default = "default_username")]
    pub username: String,
    /// `USER` realname field, also used as the CTCP USERINFO realname.
    #[serde(default = "default_realname")]
    pub realname: String,
    /// Friendly display name shown in the UI, distinct from the IRC nick.
    #[serde(default)]
    pub display_name: Option<String>,
    /// Channels to join automatically on every successful registration.
    #[serde(default)]
    pub autojoin: Vec<String>,
    /// Reconnect backoff policy for this network.
    #[serde(default)]
    pub reconnect: ReconnectConfig,
    /// CTCP VERSION reply string for this network.
    #[serde(default = "default_ctcp_version")]
    pub ctcp_version: String,
    /// CTCP SOURCE reply string for this network.
    #[serde(default = "default_ctcp_source")]
    pub ctcp_source: String,
}

fn default_port() -> u16 {
    6667
}

fn default_username() -> String {
    "dispatch".to_owned()
}

fn default_realname() -> String {
    "Dispatch user".to_owned()
}

fn default_ctcp_version() -> String {
    "Dispatch IRC bouncer".to_owned()
}

fn default_ctcp_source() -> String {
    "https://example.test/dispatch".to_owned()
}

/// Exponential backoff parameters for a Client's reconnect loop.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct ReconnectConfig {
    /// Initial delay before the first reconnect attempt.
    #[serde(with = "humantime_secs", rename = "initial_delay_secs", default = "default_initial_delay")]
    pub initial_delay: Duration,
    /// Upper bound the exponential delay is capped at.
    #[serde(with = "humantime_secs", rename = "max_delay_secs", default = "default_max_delay")]
    pub max_delay: Duration,
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(300)
}

impl Default for ReconnectConfig {
    fn default() -> ReconnectConfig {
        ReconnectConfig {
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
        }
    }
}

mod humantime_secs {
    use super::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(d)?))
    }
}

impl Config {
    /// Loads a config file from disk. A missing or unparsable file is a
    /// fatal `Error::Config`, never silently defaulted.
    pub fn load(path: impl AsRef<Path>) -> Result<Config> {
        let text = fs::read_to_string(path.as_ref())
            .map_err(|cause| Error::Config(format!("reading {}: {}", path.as_ref().display(), cause)))?;
        toml::from_str(&text).map_err(|cause| Error::Config(format!("parsing config: {}", cause)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_network_config_fills_in_defaults() {
        let toml = r#"
            data_dir = "/tmp/dispatch"

            [[networks]]
            host = "irc.libera.chat"
            nick = "ferris"
        "#;
        let cfg: Config = toml::from_str(toml).unwrap();
        assert_eq!(cfg.networks.len(), 1);
        let net = &cfg.networks[0];
        assert_eq!(net.port, 6667);
        assert!(!net.tls);
        assert_eq!(net.username, "dispatch");
        assert_eq!(net.reconnect.initial_delay, Duration::from_secs(1));
        assert_eq!(net.reconnect.max_delay, Duration::from_secs(300));
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let err = Config::load("/nonexistent/dispatch.toml").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
