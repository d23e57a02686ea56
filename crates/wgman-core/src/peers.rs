//! Peer-control capability
//!
//! The live peer table of the gateway interface and its boot-time snapshot
//! are reached only through [`PeerControl`], so the provisioning logic can
//! run against the kernel (`wg`), the offline emulation, or the in-memory
//! fake below.

use crate::error::{ManagerError, ManagerResult};
use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::{Arc, Mutex, MutexGuard};
use wgman_protocol::PublicKey;

/// One entry of the live peer table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerEntry {
    /// Peer public key
    pub public_key: PublicKey,
    /// Allowed IPs as (address, prefix)
    pub allowed_ips: Vec<(IpAddr, u8)>,
}

impl PeerEntry {
    /// Entry for a client tunnel address
    pub fn host(public_key: PublicKey, address: Ipv4Addr) -> Self {
        Self {
            public_key,
            allowed_ips: vec![(IpAddr::V4(address), 32)],
        }
    }

    /// IPv4 /32 addresses routed to this peer
    pub fn host_addresses(&self) -> impl Iterator<Item = Ipv4Addr> + '_ {
        self.allowed_ips.iter().filter_map(|(ip, prefix)| match ip {
            IpAddr::V4(v4) if *prefix == 32 => Some(*v4),
            _ => None,
        })
    }
}

/// Narrow control surface over one WireGuard interface
pub trait PeerControl: Send + Sync {
    /// Backend name for logs
    fn name(&self) -> &'static str;

    /// Whether the interface is present and answering
    fn is_up(&self) -> bool;

    /// Current live peer table
    fn list_peers(&self) -> ManagerResult<Vec<PeerEntry>>;

    /// Insert or update `public_key -> address/32` in the live table
    fn set_peer(&self, public_key: &PublicKey, address: Ipv4Addr) -> ManagerResult<()>;

    /// Remove `public_key` from the live table; absent keys are not an error
    fn remove_peer(&self, public_key: &PublicKey) -> ManagerResult<()>;

    /// Persist the full live state to the boot-time configuration
    fn save(&self) -> ManagerResult<()>;

    /// The interface's own public key
    fn public_key(&self) -> ManagerResult<PublicKey>;

    /// Set up backend state before the first mutation; called only under
    /// the writer lock
    fn prepare(&self) -> ManagerResult<()> {
        Ok(())
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    up: bool,
    live: BTreeMap<PublicKey, Ipv4Addr>,
    persisted: BTreeMap<PublicKey, Ipv4Addr>,
    saves: usize,
    fail_set: bool,
    // successful saves left before `save` starts failing
    saves_left: Option<usize>,
}

/// In-process peer table with separate live and persisted views.
///
/// Clones share state, so a test can keep a handle while the manager owns
/// another.
#[derive(Debug, Clone)]
pub struct MemoryPeerControl {
    public_key: PublicKey,
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryPeerControl {
    /// A running interface with an empty peer table
    pub fn new(public_key: PublicKey) -> Self {
        Self {
            public_key,
            state: Arc::new(Mutex::new(MemoryState {
                up: true,
                ..Default::default()
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        // a poisoned lock only means another test thread panicked
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Live table snapshot
    pub fn live(&self) -> BTreeMap<PublicKey, Ipv4Addr> {
        self.state().live.clone()
    }

    /// Persisted (boot-time) snapshot
    pub fn persisted(&self) -> BTreeMap<PublicKey, Ipv4Addr> {
        self.state().persisted.clone()
    }

    /// Number of `save` calls so far
    pub fn saves(&self) -> usize {
        self.state().saves
    }

    /// Bring the interface up or down
    pub fn set_up(&self, up: bool) {
        self.state().up = up;
    }

    /// Make subsequent `set_peer` calls fail
    pub fn fail_set_peer(&self, fail: bool) {
        self.state().fail_set = fail;
    }

    /// Make subsequent `save` calls fail
    pub fn fail_save(&self, fail: bool) {
        self.state().saves_left = fail.then_some(0);
    }

    /// Let `n` more `save` calls succeed, then fail the rest
    pub fn fail_save_after(&self, n: usize) {
        self.state().saves_left = Some(n);
    }

    /// Mutate the live table without persisting, as a crash between the
    /// two steps would leave it
    pub fn set_peer_unsaved(&self, public_key: PublicKey, address: Ipv4Addr) {
        self.state().live.insert(public_key, address);
    }

    fn down_error(&self, command: &str) -> ManagerError {
        ManagerError::Command {
            command: command.to_string(),
            detail: "interface is down".into(),
        }
    }
}

impl PeerControl for MemoryPeerControl {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn is_up(&self) -> bool {
        self.state().up
    }

    fn list_peers(&self) -> ManagerResult<Vec<PeerEntry>> {
        let state = self.state();
        if !state.up {
            return Err(self.down_error("list"));
        }
        Ok(state
            .live
            .iter()
            .map(|(key, addr)| PeerEntry::host(*key, *addr))
            .collect())
    }

    fn set_peer(&self, public_key: &PublicKey, address: Ipv4Addr) -> ManagerResult<()> {
        let mut state = self.state();
        if !state.up {
            return Err(self.down_error("set"));
        }
        if state.fail_set {
            return Err(ManagerError::Command {
                command: "set".into(),
                detail: "injected failure".into(),
            });
        }
        state.live.insert(*public_key, address);
        Ok(())
    }

    fn remove_peer(&self, public_key: &PublicKey) -> ManagerResult<()> {
        let mut state = self.state();
        if !state.up {
            return Err(self.down_error("remove"));
        }
        state.live.remove(public_key);
        Ok(())
    }

    fn save(&self) -> ManagerResult<()> {
        let mut state = self.state();
        if !state.up {
            return Err(self.down_error("save"));
        }
        match state.saves_left {
            Some(0) => {
                return Err(ManagerError::Command {
                    command: "save".into(),
                    detail: "injected failure".into(),
                })
            }
            Some(n) => state.saves_left = Some(n - 1),
            None => {}
        }
        state.persisted = state.live.clone();
        state.saves += 1;
        Ok(())
    }

    fn public_key(&self) -> ManagerResult<PublicKey> {
        Ok(self.public_key)
    }
}
