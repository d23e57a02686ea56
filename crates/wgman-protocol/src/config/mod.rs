//! Configuration parsing for wg-manager
//!
//! A single TOML file describes the gateway interface the tool manages,
//! where client records live and how new client records are filled in.

use crate::types::PublicKey;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

/// Default configuration file location
pub const DEFAULT_CONFIG_PATH: &str = "/etc/wg-manager/config.toml";

/// Top-level wg-manager configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Gateway interface
    pub interface: InterfaceConfig,

    /// Client record settings
    #[serde(default)]
    pub clients: ClientsConfig,

    /// Key issuing settings
    #[serde(default)]
    pub crypto: CryptoConfig,

    /// Writer lock settings
    #[serde(default)]
    pub lock: LockConfig,

    /// Logging settings
    #[serde(default)]
    pub log: LogSection,
}

/// Gateway interface configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterfaceConfig {
    /// Interface name (default "wg0")
    #[serde(default = "default_interface_name")]
    pub name: String,

    /// Gateway address in CIDR notation; the managed subnet is its /24
    #[serde(default = "default_address")]
    pub address: String,

    /// UDP listen port
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,

    /// Public endpoint (`host:port`) written into client records
    pub endpoint: String,

    /// Gateway public key (base64); queried from the interface when absent
    #[serde(default)]
    pub public_key: Option<String>,

    /// Peer-control backend: "wg" or "offline"
    #[serde(default = "default_peer_backend")]
    pub backend: String,

    /// State directory for the offline backend
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,
}

fn default_interface_name() -> String {
    "wg0".to_string()
}

fn default_address() -> String {
    "10.0.0.1/24".to_string()
}

fn default_listen_port() -> u16 {
    crate::DEFAULT_PORT
}

fn default_peer_backend() -> String {
    "wg".to_string()
}

fn default_state_dir() -> PathBuf {
    PathBuf::from("/var/lib/wg-manager")
}

/// Client record configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientsConfig {
    /// Directory holding one `<name>.conf` per client
    #[serde(default = "default_clients_dir")]
    pub dir: PathBuf,

    /// DNS resolvers pushed to clients
    #[serde(default = "default_dns")]
    pub dns: Vec<String>,

    /// Routed ranges for clients (default full tunnel)
    #[serde(default = "default_allowed_ips")]
    pub allowed_ips: String,

    /// Keepalive interval in seconds (0 = disabled)
    #[serde(default = "default_keepalive")]
    pub persistent_keepalive: u16,

    /// Optional cap on the number of clients, below the pool size
    #[serde(default)]
    pub max_clients: Option<usize>,
}

fn default_clients_dir() -> PathBuf {
    PathBuf::from("/etc/wireguard/clients")
}

fn default_dns() -> Vec<String> {
    vec!["1.1.1.1".to_string(), "1.0.0.1".to_string()]
}

fn default_allowed_ips() -> String {
    "0.0.0.0/0".to_string()
}

fn default_keepalive() -> u16 {
    25
}

impl Default for ClientsConfig {
    fn default() -> Self {
        Self {
            dir: default_clients_dir(),
            dns: default_dns(),
            allowed_ips: default_allowed_ips(),
            persistent_keepalive: default_keepalive(),
            max_clients: None,
        }
    }
}

/// Key issuing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CryptoConfig {
    /// Backend selection: "software" or "wg"
    #[serde(default = "default_crypto_backend")]
    pub backend: String,
}

fn default_crypto_backend() -> String {
    "software".to_string()
}

impl Default for CryptoConfig {
    fn default() -> Self {
        Self {
            backend: default_crypto_backend(),
        }
    }
}

/// Writer lock configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockConfig {
    /// Lock file path
    #[serde(default = "default_lock_path")]
    pub path: PathBuf,
}

fn default_lock_path() -> PathBuf {
    PathBuf::from("/run/wg-manager.lock")
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            path: default_lock_path(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSection {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format: "compact" or "pretty"
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_log_format() -> String {
    "compact".to_string()
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ValidationError(String),

    /// Invalid key encoding
    #[error("Invalid key encoding: {0}")]
    InvalidKey(String),
}

/// The managed /24: gateway address plus network base
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subnet {
    /// Network base (`a.b.c.0`)
    pub base: Ipv4Addr,
    /// Gateway's own address
    pub gateway: Ipv4Addr,
}

impl Subnet {
    /// Host address for a suffix inside the subnet
    pub fn host(&self, suffix: u8) -> Ipv4Addr {
        let [a, b, c, _] = self.base.octets();
        Ipv4Addr::new(a, b, c, suffix)
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        tracing::debug!(path = %path.display(), "Loading configuration");
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parse configuration from a TOML string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interface.name.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "interface.name must not be empty".into(),
            ));
        }

        self.subnet()?;

        let (host, port) = self.interface.endpoint.rsplit_once(':').ok_or_else(|| {
            ConfigError::ValidationError(format!(
                "interface.endpoint must be host:port, got '{}'",
                self.interface.endpoint
            ))
        })?;
        if host.is_empty() || port.parse::<u16>().map_or(true, |p| p == 0) {
            return Err(ConfigError::ValidationError(format!(
                "interface.endpoint must be host:port, got '{}'",
                self.interface.endpoint
            )));
        }

        if let Some(ref key) = self.interface.public_key {
            PublicKey::from_base64(key).map_err(|e| {
                ConfigError::InvalidKey(format!("interface.public_key: {}", e))
            })?;
        }

        if !matches!(self.interface.backend.as_str(), "wg" | "offline") {
            return Err(ConfigError::ValidationError(format!(
                "Unknown interface.backend '{}'. Use 'wg' or 'offline'",
                self.interface.backend
            )));
        }

        if !matches!(self.crypto.backend.as_str(), "software" | "wg") {
            return Err(ConfigError::ValidationError(format!(
                "Unknown crypto.backend '{}'. Use 'software' or 'wg'",
                self.crypto.backend
            )));
        }

        if self.clients.max_clients == Some(0) {
            return Err(ConfigError::ValidationError(
                "clients.max_clients must be at least 1".into(),
            ));
        }

        if self.clients.allowed_ips.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "clients.allowed_ips must not be empty".into(),
            ));
        }

        if !matches!(self.log.format.as_str(), "compact" | "pretty") {
            return Err(ConfigError::ValidationError(format!(
                "Unknown log.format '{}'. Use 'compact' or 'pretty'",
                self.log.format
            )));
        }

        Ok(())
    }

    /// The managed subnet derived from `interface.address`
    pub fn subnet(&self) -> Result<Subnet, ConfigError> {
        let invalid = || {
            ConfigError::ValidationError(format!(
                "interface.address must be an IPv4 /24 address, got '{}'",
                self.interface.address
            ))
        };
        let (ip, prefix) = self
            .interface
            .address
            .split_once('/')
            .ok_or_else(invalid)?;
        let gateway: Ipv4Addr = ip.trim().parse().map_err(|_| invalid())?;
        if prefix.trim() != "24" {
            return Err(invalid());
        }
        let [a, b, c, d] = gateway.octets();
        if d == 0 || d == 255 {
            return Err(invalid());
        }
        Ok(Subnet {
            base: Ipv4Addr::new(a, b, c, 0),
            gateway,
        })
    }

    /// Gateway public key from the configuration, if set
    pub fn gateway_public_key(&self) -> Result<Option<PublicKey>, ConfigError> {
        self.interface
            .public_key
            .as_deref()
            .map(|k| {
                PublicKey::from_base64(k)
                    .map_err(|e| ConfigError::InvalidKey(format!("interface.public_key: {}", e)))
            })
            .transpose()
    }

    /// Keepalive as written into client records (0 disables it)
    pub fn keepalive(&self) -> Option<u16> {
        match self.clients.persistent_keepalive {
            0 => None,
            secs => Some(secs),
        }
    }
}
