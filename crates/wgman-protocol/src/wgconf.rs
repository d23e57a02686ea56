//! WireGuard configuration text (`wg-quick` INI syntax)
//!
//! Used for two documents: the per-client tunnel definition handed to end
//! users, and the gateway's boot-time interface file.

use crate::types::{KeyError, PrivateKey, PublicKey};
use std::fmt;
use std::net::Ipv4Addr;

/// Section header kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionKind {
    /// `[Interface]`
    Interface,
    /// `[Peer]`
    Peer,
}

impl SectionKind {
    fn header(&self) -> &'static str {
        match self {
            SectionKind::Interface => "[Interface]",
            SectionKind::Peer => "[Peer]",
        }
    }
}

/// One `[Interface]` or `[Peer]` block, entries kept in file order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    /// Section kind
    pub kind: SectionKind,
    /// `Key = Value` pairs
    pub entries: Vec<(String, String)>,
}

impl Section {
    /// Create an empty section
    pub fn new(kind: SectionKind) -> Self {
        Self {
            kind,
            entries: Vec::new(),
        }
    }

    /// Append an entry
    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.entries.push((key.to_string(), value.into()));
        self
    }

    /// First value of `key` (keys are case-insensitive, as in wg-quick)
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Value for `key`, or a missing-key error
    pub fn require(&self, key: &'static str) -> Result<&str, ConfError> {
        self.get(key).ok_or(ConfError::MissingKey {
            section: self.kind.header(),
            key,
        })
    }
}

/// A parsed WireGuard configuration document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WgConfig {
    /// Sections in file order
    pub sections: Vec<Section>,
}

impl WgConfig {
    /// Parse configuration text. Comments and blank lines are dropped.
    pub fn parse(content: &str) -> Result<Self, ConfError> {
        let mut sections: Vec<Section> = Vec::new();

        for (idx, raw) in content.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }
            if line.starts_with('[') && line.ends_with(']') {
                let kind = if line.eq_ignore_ascii_case("[Interface]") {
                    SectionKind::Interface
                } else if line.eq_ignore_ascii_case("[Peer]") {
                    SectionKind::Peer
                } else {
                    return Err(ConfError::Syntax {
                        line: idx + 1,
                        message: format!("unknown section {}", line),
                    });
                };
                sections.push(Section::new(kind));
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                return Err(ConfError::Syntax {
                    line: idx + 1,
                    message: "expected `Key = Value`".into(),
                });
            };
            let Some(section) = sections.last_mut() else {
                return Err(ConfError::Syntax {
                    line: idx + 1,
                    message: "entry outside of a section".into(),
                });
            };
            section
                .entries
                .push((key.trim().to_string(), value.trim().to_string()));
        }

        Ok(Self { sections })
    }

    /// The first `[Interface]` section
    pub fn interface(&self) -> Option<&Section> {
        self.sections
            .iter()
            .find(|s| s.kind == SectionKind::Interface)
    }

    /// All `[Peer]` sections
    pub fn peers(&self) -> impl Iterator<Item = &Section> {
        self.sections.iter().filter(|s| s.kind == SectionKind::Peer)
    }
}

impl fmt::Display for WgConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, section) in self.sections.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            writeln!(f, "{}", section.kind.header())?;
            for (key, value) in &section.entries {
                writeln!(f, "{} = {}", key, value)?;
            }
        }
        Ok(())
    }
}

/// Client-side tunnel definition stored once per client.
///
/// The `[Interface]` block carries the client's own key and /32 address; the
/// single `[Peer]` block points at the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Client private key
    pub private_key: PrivateKey,
    /// Tunnel address, always rendered with a /32 mask
    pub address: Ipv4Addr,
    /// DNS resolvers pushed to the client
    pub dns: Vec<String>,
    /// Gateway public key
    pub server_public_key: PublicKey,
    /// Gateway endpoint (`host:port`)
    pub endpoint: String,
    /// Routed ranges, `0.0.0.0/0` for a full tunnel
    pub allowed_ips: String,
    /// Keepalive interval in seconds
    pub persistent_keepalive: Option<u16>,
}

impl ClientConfig {
    /// Build the configuration document
    pub fn to_wg_config(&self) -> WgConfig {
        let mut interface = Section::new(SectionKind::Interface)
            .with("PrivateKey", self.private_key.to_base64())
            .with("Address", format!("{}/32", self.address));
        if !self.dns.is_empty() {
            interface = interface.with("DNS", self.dns.join(", "));
        }

        let mut peer = Section::new(SectionKind::Peer)
            .with("PublicKey", self.server_public_key.to_base64())
            .with("Endpoint", self.endpoint.clone())
            .with("AllowedIPs", self.allowed_ips.clone());
        if let Some(keepalive) = self.persistent_keepalive {
            peer = peer.with("PersistentKeepalive", keepalive.to_string());
        }

        WgConfig {
            sections: vec![interface, peer],
        }
    }

    /// Render as configuration text
    pub fn render(&self) -> String {
        self.to_wg_config().to_string()
    }

    /// Parse a stored client record
    pub fn parse(content: &str) -> Result<Self, ConfError> {
        let doc = WgConfig::parse(content)?;
        let interface = doc
            .interface()
            .ok_or(ConfError::MissingSection("[Interface]"))?;
        let peer = doc.peers().next().ok_or(ConfError::MissingSection("[Peer]"))?;

        let private_key = PrivateKey::from_base64(interface.require("PrivateKey")?)?;
        let address = parse_host_address(interface.require("Address")?)?;
        let dns = interface
            .get("DNS")
            .map(split_list)
            .unwrap_or_default();

        let server_public_key = PublicKey::from_base64(peer.require("PublicKey")?)?;
        let endpoint = peer.require("Endpoint")?.to_string();
        let allowed_ips = peer.require("AllowedIPs")?.to_string();
        let persistent_keepalive = peer
            .get("PersistentKeepalive")
            .map(|v| {
                v.parse::<u16>().map_err(|_| ConfError::InvalidValue {
                    key: "PersistentKeepalive",
                    value: v.to_string(),
                })
            })
            .transpose()?;

        Ok(Self {
            private_key,
            address,
            dns,
            server_public_key,
            endpoint,
            allowed_ips,
            persistent_keepalive,
        })
    }
}

/// Parse `a.b.c.d` or `a.b.c.d/32` into a host address
pub fn parse_host_address(value: &str) -> Result<Ipv4Addr, ConfError> {
    let invalid = || ConfError::InvalidValue {
        key: "Address",
        value: value.to_string(),
    };
    let value = value.trim();
    let (ip, prefix) = match value.split_once('/') {
        Some((ip, prefix)) => (ip, Some(prefix)),
        None => (value, None),
    };
    if prefix.is_some_and(|p| p.trim() != "32") {
        return Err(invalid());
    }
    ip.trim().parse().map_err(|_| invalid())
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}

/// Errors in WireGuard configuration text
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfError {
    /// Malformed line
    #[error("line {line}: {message}")]
    Syntax {
        /// 1-based line number
        line: usize,
        /// What was wrong
        message: String,
    },

    /// Required section absent
    #[error("missing {0} section")]
    MissingSection(&'static str),

    /// Required key absent
    #[error("missing {key} in {section}")]
    MissingKey {
        /// Section header
        section: &'static str,
        /// Key name
        key: &'static str,
    },

    /// Unparseable value
    #[error("invalid {key}: {value}")]
    InvalidValue {
        /// Key name
        key: &'static str,
        /// Offending value
        value: String,
    },

    /// Bad key material
    #[error("{0}")]
    Key(#[from] KeyError),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ClientConfig {
        ClientConfig {
            private_key: PrivateKey([1u8; 32]),
            address: Ipv4Addr::new(10, 0, 0, 2),
            dns: vec!["1.1.1.1".into(), "1.0.0.1".into()],
            server_public_key: PublicKey([2u8; 32]),
            endpoint: "203.0.113.10:51820".into(),
            allowed_ips: "0.0.0.0/0".into(),
            persistent_keepalive: Some(25),
        }
    }

    #[test]
    fn test_render_client_config() {
        let text = sample().render();
        let expected = format!(
            "[Interface]\n\
             PrivateKey = {}\n\
             Address = 10.0.0.2/32\n\
             DNS = 1.1.1.1, 1.0.0.1\n\
             \n\
             [Peer]\n\
             PublicKey = {}\n\
             Endpoint = 203.0.113.10:51820\n\
             AllowedIPs = 0.0.0.0/0\n\
             PersistentKeepalive = 25\n",
            PrivateKey([1u8; 32]).to_base64(),
            PublicKey([2u8; 32]).to_base64(),
        );
        assert_eq!(text, expected);
        assert_eq!(ClientConfig::parse(&text).unwrap(), sample());
    }

    #[test]
    fn test_parse_tolerates_comments_and_case() {
        let text = format!(
            "# laptop\n[interface]\nprivatekey = {}\naddress = 10.0.0.9\n\n[peer]\n\
             publickey = {}\nendpoint = vpn.example.org:51820\nallowedips = 10.0.0.0/24\n",
            PrivateKey([3u8; 32]).to_base64(),
            PublicKey([4u8; 32]).to_base64(),
        );
        let config = ClientConfig::parse(&text).unwrap();
        assert_eq!(config.address, Ipv4Addr::new(10, 0, 0, 9));
        assert!(config.dns.is_empty());
        assert_eq!(config.persistent_keepalive, None);
        assert_eq!(config.endpoint, "vpn.example.org:51820");
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            WgConfig::parse("[Bogus]\n"),
            Err(ConfError::Syntax { line: 1, .. })
        ));
        assert!(matches!(
            WgConfig::parse("PrivateKey = x\n"),
            Err(ConfError::Syntax { .. })
        ));
        assert_eq!(
            ClientConfig::parse("[Interface]\n").unwrap_err(),
            ConfError::MissingSection("[Peer]")
        );
        assert!(parse_host_address("10.0.0.2/24").is_err());
    }

    #[test]
    fn test_wg_config_preserves_order() {
        let text = concat!(
            "[Interface]\nAddress = 10.0.0.1/24\nListenPort = 51820\n",
            "\n[Peer]\nPublicKey = k\nAllowedIPs = 10.0.0.2/32\n",
        );
        let doc = WgConfig::parse(text).unwrap();
        assert_eq!(doc.peers().count(), 1);
        assert_eq!(doc.interface().unwrap().get("listenport"), Some("51820"));
        assert_eq!(doc.to_string(), text);
    }
}
