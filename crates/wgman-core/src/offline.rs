//! Offline backend: an emulated interface under a state directory
//!
//! `<state_dir>/<if>.peers.json` plays the live peer table and
//! `<state_dir>/<if>.conf` the boot-time configuration, so the whole
//! provisioning flow can run without root or a kernel module.

use crate::error::{ManagerError, ManagerResult};
use crate::peers::{PeerControl, PeerEntry};
use crate::store::{ensure_private_dir, write_file_atomic};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use wgman_protocol::{
    ConfError, CryptoBackend, PrivateKey, PublicKey, Section, SectionKind, WgConfig,
};

#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PeerRow {
    public_key: PublicKey,
    address: Ipv4Addr,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct PeerTable {
    #[serde(default)]
    peers: Vec<PeerRow>,
}

/// Emulated WireGuard interface
#[derive(Clone)]
pub struct OfflineInterface {
    interface: String,
    address: String,
    listen_port: u16,
    state_dir: PathBuf,
    crypto: Arc<dyn CryptoBackend>,
}

impl fmt::Debug for OfflineInterface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OfflineInterface")
            .field("interface", &self.interface)
            .field("state_dir", &self.state_dir)
            .field("crypto", &self.crypto.name())
            .finish()
    }
}

impl OfflineInterface {
    /// Emulate `interface` (gateway `address`, e.g. `10.0.0.1/24`) under
    /// `state_dir`, issuing and deriving the gateway key with `crypto`
    pub fn new(
        state_dir: impl Into<PathBuf>,
        interface: impl Into<String>,
        address: impl Into<String>,
        listen_port: u16,
        crypto: Arc<dyn CryptoBackend>,
    ) -> Self {
        Self {
            interface: interface.into(),
            address: address.into(),
            listen_port,
            state_dir: state_dir.into(),
            crypto,
        }
    }

    /// Path of the emulated live table
    pub fn peers_path(&self) -> PathBuf {
        self.state_dir.join(format!("{}.peers.json", self.interface))
    }

    /// Path of the boot-time configuration
    pub fn boot_config_path(&self) -> PathBuf {
        self.state_dir.join(format!("{}.conf", self.interface))
    }

    /// Bring the interface "up": create the boot configuration with a fresh
    /// gateway key unless one already exists.
    ///
    /// The file is opened with `create_new`, so of two racing creators one
    /// writes it and the other leaves it alone.
    pub fn ensure_created(&self) -> ManagerResult<()> {
        let path = self.boot_config_path();
        if path.is_file() {
            return Ok(());
        }
        ensure_private_dir(&self.state_dir)?;

        let mut opts = fs::OpenOptions::new();
        opts.write(true).create_new(true);
        #[cfg(unix)]
        opts.mode(0o600);

        let mut file = match opts.open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        let (private_key, public_key) = self.crypto.issue_keypair()?;
        let doc = WgConfig {
            sections: vec![self.interface_section(&private_key)],
        };
        file.write_all(doc.to_string().as_bytes())?;
        file.sync_all()?;
        tracing::info!(
            interface = %self.interface,
            key = %public_key.fingerprint(),
            path = %path.display(),
            "Created offline interface"
        );
        Ok(())
    }

    fn interface_section(&self, private_key: &PrivateKey) -> Section {
        Section::new(SectionKind::Interface)
            .with("PrivateKey", private_key.to_base64())
            .with("Address", self.address.clone())
            .with("ListenPort", self.listen_port.to_string())
    }

    fn read_boot_config(&self) -> ManagerResult<Option<WgConfig>> {
        let path = self.boot_config_path();
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        WgConfig::parse(&content)
            .map(Some)
            .map_err(|source| ManagerError::InvalidRecord {
                name: path.display().to_string(),
                source,
            })
    }

    fn read_table(&self) -> ManagerResult<PeerTable> {
        let path = self.peers_path();
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(PeerTable::default()),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&content).map_err(|e| ManagerError::Command {
            command: format!("read {}", path.display()),
            detail: e.to_string(),
        })
    }

    fn write_table(&self, table: &PeerTable) -> ManagerResult<()> {
        ensure_private_dir(&self.state_dir)?;
        let json = serde_json::to_vec_pretty(table).map_err(io::Error::from)?;
        write_file_atomic(&self.peers_path(), &json, 0o600)?;
        Ok(())
    }

    fn require_up(&self, command: &str) -> ManagerResult<()> {
        if self.is_up() {
            Ok(())
        } else {
            Err(ManagerError::Command {
                command: format!("{} {}", command, self.interface),
                detail: format!(
                    "Unable to access interface: {} does not exist",
                    self.boot_config_path().display()
                ),
            })
        }
    }
}

impl PeerControl for OfflineInterface {
    fn name(&self) -> &'static str {
        "offline"
    }

    fn is_up(&self) -> bool {
        self.boot_config_path().is_file()
    }

    fn list_peers(&self) -> ManagerResult<Vec<PeerEntry>> {
        self.require_up("show")?;
        Ok(self
            .read_table()?
            .peers
            .into_iter()
            .map(|row| PeerEntry::host(row.public_key, row.address))
            .collect())
    }

    fn set_peer(&self, public_key: &PublicKey, address: Ipv4Addr) -> ManagerResult<()> {
        self.require_up("set")?;
        let mut table = self.read_table()?;
        match table.peers.iter_mut().find(|row| row.public_key == *public_key) {
            Some(row) => row.address = address,
            None => table.peers.push(PeerRow {
                public_key: *public_key,
                address,
            }),
        }
        self.write_table(&table)
    }

    fn remove_peer(&self, public_key: &PublicKey) -> ManagerResult<()> {
        self.require_up("set")?;
        let mut table = self.read_table()?;
        table.peers.retain(|row| row.public_key != *public_key);
        self.write_table(&table)
    }

    fn save(&self) -> ManagerResult<()> {
        self.require_up("save")?;
        let existing = self.read_boot_config()?;
        let interface = existing
            .as_ref()
            .and_then(|doc| doc.interface().cloned())
            .ok_or_else(|| ManagerError::InvalidRecord {
                name: self.boot_config_path().display().to_string(),
                source: ConfError::MissingSection("[Interface]"),
            })?;

        let mut sections = vec![interface];
        for row in self.read_table()?.peers {
            sections.push(
                Section::new(SectionKind::Peer)
                    .with("PublicKey", row.public_key.to_base64())
                    .with("AllowedIPs", format!("{}/32", row.address)),
            );
        }

        let doc = WgConfig { sections };
        write_file_atomic(&self.boot_config_path(), doc.to_string().as_bytes(), 0o600)?;
        tracing::debug!(
            interface = %self.interface,
            peers = doc.peers().count(),
            "Saved boot configuration"
        );
        Ok(())
    }

    fn public_key(&self) -> ManagerResult<PublicKey> {
        self.require_up("show")?;
        let path = self.boot_config_path();
        let doc = self.read_boot_config()?.unwrap_or_default();
        let encoded = doc
            .interface()
            .ok_or(ConfError::MissingSection("[Interface]"))
            .and_then(|s| s.require("PrivateKey"))
            .map_err(|source| ManagerError::InvalidRecord {
                name: path.display().to_string(),
                source,
            })?;
        let private_key = PrivateKey::from_base64(encoded)?;
        Ok(self.crypto.derive_public_key(&private_key)?)
    }

    fn prepare(&self) -> ManagerResult<()> {
        self.ensure_created()
    }
}

/// Read the peers persisted in a boot configuration file
pub fn persisted_peers(path: &Path) -> ManagerResult<Vec<PeerEntry>> {
    let content = fs::read_to_string(path)?;
    let doc = WgConfig::parse(&content).map_err(|source| ManagerError::InvalidRecord {
        name: path.display().to_string(),
        source,
    })?;

    let mut peers = Vec::new();
    for section in doc.peers() {
        let parse = || -> Result<PeerEntry, ConfError> {
            let public_key = PublicKey::from_base64(section.require("PublicKey")?)?;
            let address = wgman_protocol::parse_host_address(section.require("AllowedIPs")?)?;
            Ok(PeerEntry::host(public_key, address))
        };
        peers.push(parse().map_err(|source| ManagerError::InvalidRecord {
            name: path.display().to_string(),
            source,
        })?);
    }
    Ok(peers)
}
