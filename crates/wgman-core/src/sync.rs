//! Peer table synchronizer
//!
//! Every live mutation is followed by a persist of the full live state, so
//! the kernel table and the boot-time snapshot are two projections of the
//! same peer set. A crash between the two steps leaves the live table
//! ahead; [`PeerTableSync::sync`] re-persists it and runs first in every
//! mutating operation.

use crate::error::ManagerResult;
use crate::peers::{PeerControl, PeerEntry};
use std::collections::HashSet;
use std::net::Ipv4Addr;
use wgman_protocol::PublicKey;

/// Keeps the live peer table and its persisted snapshot in agreement
pub struct PeerTableSync {
    control: Box<dyn PeerControl>,
}

impl PeerTableSync {
    /// Wrap a peer-control backend
    pub fn new(control: Box<dyn PeerControl>) -> Self {
        Self { control }
    }

    /// Backend name
    pub fn backend(&self) -> &'static str {
        self.control.name()
    }

    /// Whether the interface answers
    pub fn is_up(&self) -> bool {
        self.control.is_up()
    }

    /// Interface public key
    pub fn public_key(&self) -> ManagerResult<PublicKey> {
        self.control.public_key()
    }

    /// Snapshot of the live peer table
    pub fn current_peers(&self) -> ManagerResult<Vec<PeerEntry>> {
        self.control.list_peers()
    }

    /// Host addresses routed to any live peer
    pub fn used_addresses(&self) -> ManagerResult<HashSet<Ipv4Addr>> {
        Ok(self
            .current_peers()?
            .iter()
            .flat_map(|peer| peer.host_addresses())
            .collect())
    }

    /// Insert or update a peer, then persist
    pub fn apply_peer(&self, public_key: &PublicKey, address: Ipv4Addr) -> ManagerResult<()> {
        self.control.set_peer(public_key, address)?;
        self.control.save()?;
        tracing::info!(key = %public_key.fingerprint(), %address, "Applied peer");
        Ok(())
    }

    /// Remove a peer, then persist
    pub fn retract_peer(&self, public_key: &PublicKey) -> ManagerResult<()> {
        self.control.remove_peer(public_key)?;
        self.control.save()?;
        tracing::info!(key = %public_key.fingerprint(), "Retracted peer");
        Ok(())
    }

    /// Prepare the backend, then re-persist the full live state
    pub fn sync(&self) -> ManagerResult<()> {
        self.control.prepare()?;
        self.control.save()?;
        tracing::debug!(backend = self.control.name(), "Persisted live peer table");
        Ok(())
    }
}
