//! Command dispatcher
//!
//! Each invocation runs exactly one [`Operation`] to completion. Mutating
//! operations hold the [`WriterLock`] for their whole sequence and start by
//! re-persisting the live peer table.

use crate::allocator::{next_free_address, pool_size};
use crate::error::{ManagerError, ManagerResult};
use crate::lock::WriterLock;
use crate::offline::OfflineInterface;
use crate::peers::PeerControl;
use crate::store::{ClientStore, StoredClient};
use crate::sync::PeerTableSync;
use crate::wg::{WgCommand, WgToolBackend};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::sync::Arc;
use wgman_metrics::{simple_check, utilization_check, HealthReport};
use wgman_protocol::{
    select_backend, ClientConfig, ClientName, Config, CryptoBackend, PublicKey, Subnet,
};

/// One dispatcher transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Provision a new client
    Add(ClientName),
    /// Enumerate stored clients
    List,
    /// Delete a client and its peer
    Remove(ClientName),
    /// Return a client's record verbatim
    Export(ClientName),
    /// Report interface and pool state
    Status,
    /// Print usage
    Help,
}

impl Operation {
    /// Operation keyword as typed on the command line
    pub fn keyword(&self) -> &'static str {
        match self {
            Operation::Add(_) => "add",
            Operation::List => "list",
            Operation::Remove(_) => "remove",
            Operation::Export(_) => "export",
            Operation::Status => "status",
            Operation::Help => "help",
        }
    }

    /// Whether the operation changes the store or the peer table
    pub fn is_mutating(&self) -> bool {
        matches!(self, Operation::Add(_) | Operation::Remove(_))
    }
}

/// A client as shown by `list`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientSummary {
    /// Client name
    pub name: ClientName,
    /// Tunnel address
    pub address: Ipv4Addr,
    /// Record storage time
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl From<&StoredClient> for ClientSummary {
    fn from(client: &StoredClient) -> Self {
        Self {
            name: client.name.clone(),
            address: client.config.address,
            created_at: client.created_at,
        }
    }
}

/// Interface and pool state reported by `status`
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    /// Interface name
    pub interface: String,
    /// Peer-control backend
    pub backend: String,
    /// Whether the interface answers
    pub up: bool,
    /// Live peer count
    pub peers: usize,
    /// Stored client records
    pub clients: usize,
    /// Effective client capacity
    pub capacity: usize,
    /// Pool utilisation, 0..=100
    pub utilization_percent: f64,
    /// Endpoint written into client records
    pub endpoint: String,
    /// Graded component checks
    pub health: HealthReport,
}

/// Result of a successful operation
#[derive(Debug, Clone)]
pub enum Outcome {
    /// Client provisioned
    Added {
        /// Client name
        name: ClientName,
        /// Assigned tunnel address
        address: Ipv4Addr,
        /// Client public key as applied to the peer table
        public_key: PublicKey,
    },
    /// Stored clients, sorted by name
    Listed(Vec<ClientSummary>),
    /// Client removed
    Removed(ClientSummary),
    /// Verbatim record text
    Exported {
        /// Client name
        name: ClientName,
        /// Record content
        config: String,
    },
    /// Status report
    Status(StatusReport),
    /// Usage requested
    Usage,
}

/// Client provisioning against one gateway interface
pub struct ClientManager {
    interface: String,
    subnet: Subnet,
    endpoint: String,
    dns: Vec<String>,
    allowed_ips: String,
    keepalive: Option<u16>,
    max_clients: Option<usize>,
    gateway_key: Option<PublicKey>,
    lock_path: PathBuf,
    store: ClientStore,
    peers: PeerTableSync,
    crypto: Arc<dyn CryptoBackend>,
}

impl ClientManager {
    /// Build a manager from configuration with explicit backends
    pub fn new(
        config: &Config,
        control: Box<dyn PeerControl>,
        crypto: Arc<dyn CryptoBackend>,
    ) -> ManagerResult<Self> {
        let subnet = config.subnet()?;
        let gateway_key = config.gateway_public_key()?;

        tracing::debug!(
            interface = %config.interface.name,
            peers = control.name(),
            crypto = crypto.name(),
            "Client manager ready"
        );

        Ok(Self {
            interface: config.interface.name.clone(),
            subnet,
            endpoint: config.interface.endpoint.clone(),
            dns: config.clients.dns.clone(),
            allowed_ips: config.clients.allowed_ips.clone(),
            keepalive: config.keepalive(),
            max_clients: config.clients.max_clients,
            gateway_key,
            lock_path: config.lock.path.clone(),
            store: ClientStore::new(&config.clients.dir),
            peers: PeerTableSync::new(control),
            crypto,
        })
    }

    /// Build a manager with the backends named in the configuration.
    ///
    /// Touches nothing on disk; an offline interface is created by the
    /// first mutating operation.
    pub fn from_config(config: &Config) -> ManagerResult<Self> {
        let crypto: Arc<dyn CryptoBackend> = match config.crypto.backend.as_str() {
            "wg" => Arc::new(WgToolBackend::new()),
            _ => Arc::from(select_backend()),
        };

        let control: Box<dyn PeerControl> = match config.interface.backend.as_str() {
            "offline" => Box::new(OfflineInterface::new(
                &config.interface.state_dir,
                &config.interface.name,
                &config.interface.address,
                config.interface.listen_port,
                Arc::clone(&crypto),
            )),
            _ => Box::new(WgCommand::new(&config.interface.name)),
        };

        Self::new(config, control, crypto)
    }

    /// Client record store
    pub fn store(&self) -> &ClientStore {
        &self.store
    }

    /// Run one operation
    pub fn execute(&self, operation: &Operation) -> ManagerResult<Outcome> {
        tracing::debug!(
            operation = operation.keyword(),
            mutating = operation.is_mutating(),
            "Dispatching"
        );
        match operation {
            Operation::Add(name) => self.add(name),
            Operation::List => self.list().map(Outcome::Listed),
            Operation::Remove(name) => self.remove(name).map(Outcome::Removed),
            Operation::Export(name) => Ok(Outcome::Exported {
                name: name.clone(),
                config: self.export(name)?,
            }),
            Operation::Status => Ok(Outcome::Status(self.status())),
            Operation::Help => Ok(Outcome::Usage),
        }
    }

    /// Effective client capacity: the pool, or the configured cap if lower
    pub fn capacity(&self) -> usize {
        let pool = pool_size(&self.subnet);
        self.max_clients.map_or(pool, |max| max.min(pool))
    }

    fn lock(&self) -> ManagerResult<WriterLock> {
        WriterLock::acquire(&self.lock_path)
    }

    fn gateway_public_key(&self) -> ManagerResult<PublicKey> {
        match self.gateway_key {
            Some(key) => Ok(key),
            None => self.peers.public_key(),
        }
    }

    /// Provision `name`: allocate, issue keys, write the record, apply the peer
    pub fn add(&self, name: &ClientName) -> ManagerResult<Outcome> {
        let _lock = self.lock()?;

        if self.store.exists(name) {
            return Err(ManagerError::AlreadyExists(name.to_string()));
        }
        self.peers.sync()?;

        let stored = self.store.list()?;
        if let Some(max) = self.max_clients {
            if stored.len() >= max {
                return Err(ManagerError::ClientLimit { max });
            }
        }

        // orphaned records keep their address out of the pool
        let mut used = self.peers.used_addresses()?;
        used.extend(stored.iter().map(|c| c.config.address));

        let address =
            next_free_address(&self.subnet, &used).ok_or_else(|| ManagerError::PoolExhausted {
                subnet: format!("{}/24", self.subnet.base),
                pool: pool_size(&self.subnet),
            })?;

        let server_public_key = self.gateway_public_key()?;
        let (private_key, public_key) = self.crypto.issue_keypair()?;

        let record = ClientConfig {
            private_key,
            address,
            dns: self.dns.clone(),
            server_public_key,
            endpoint: self.endpoint.clone(),
            allowed_ips: self.allowed_ips.clone(),
            persistent_keepalive: self.keepalive,
        };
        self.store.write(name, &record)?;

        if let Err(e) = self.peers.apply_peer(&public_key, address) {
            tracing::warn!(client = %name, "Applying peer failed, rolling back: {}", e);
            if let Err(re) = self.peers.retract_peer(&public_key) {
                tracing::warn!(client = %name, "Rollback of peer entry failed: {}", re);
            }
            if let Err(re) = self.store.remove(name) {
                tracing::warn!(client = %name, "Rollback of client record failed: {}", re);
            }
            return Err(e);
        }

        tracing::info!(
            client = %name,
            %address,
            key = %public_key.fingerprint(),
            "Added client"
        );

        Ok(Outcome::Added {
            name: name.clone(),
            address,
            public_key,
        })
    }

    /// All stored clients, sorted by name
    pub fn list(&self) -> ManagerResult<Vec<ClientSummary>> {
        let clients = self.store.list()?;
        tracing::debug!(count = clients.len(), "Listed clients");
        Ok(clients.iter().map(ClientSummary::from).collect())
    }

    /// Retract `name`'s peer and delete its record
    pub fn remove(&self, name: &ClientName) -> ManagerResult<ClientSummary> {
        let _lock = self.lock()?;

        let stored = self.store.read(name)?;
        self.peers.sync()?;

        let public_key = self.crypto.derive_public_key(&stored.config.private_key)?;
        self.peers.retract_peer(&public_key)?;
        self.store.remove(name)?;

        tracing::info!(
            client = %name,
            address = %stored.config.address,
            key = %public_key.fingerprint(),
            "Removed client"
        );
        Ok(ClientSummary::from(&stored))
    }

    /// `name`'s record text, verbatim
    pub fn export(&self, name: &ClientName) -> ManagerResult<String> {
        let stored = self.store.read(name)?;
        tracing::debug!(client = %name, "Exported client record");
        Ok(stored.raw)
    }

    /// Interface and pool report; unreachable parts are reported, not raised
    pub fn status(&self) -> StatusReport {
        let up = self.peers.is_up();
        let peers = if up {
            self.peers.current_peers().map(|p| p.len()).unwrap_or_else(|e| {
                tracing::warn!("Reading peer table failed: {}", e);
                0
            })
        } else {
            0
        };

        let (clients, store_error) = match self.store.list() {
            Ok(clients) => (clients.len(), None),
            Err(e) => {
                tracing::warn!("Reading client store failed: {}", e);
                (0, Some(e.to_string()))
            }
        };

        let capacity = self.capacity();
        let utilization_percent = if capacity == 0 {
            100.0
        } else {
            clients as f64 * 100.0 / capacity as f64
        };

        let interface_message = (!up).then(|| format!("{} is down", self.interface));
        let health = HealthReport::from_checks(vec![
            simple_check("interface", up, interface_message.as_deref()),
            simple_check("client_store", store_error.is_none(), store_error.as_deref()),
            utilization_check("address_pool", clients, capacity),
        ]);

        StatusReport {
            interface: self.interface.clone(),
            backend: self.peers.backend().to_string(),
            up,
            peers,
            clients,
            capacity,
            utilization_percent,
            endpoint: self.endpoint.clone(),
            health,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::offline::persisted_peers;
    use crate::peers::MemoryPeerControl;
    use std::collections::HashSet;
    use std::fs;
    use std::sync::Barrier;
    use std::thread;
    use tempfile::TempDir;
    use wgman_metrics::HealthStatus;
    use wgman_protocol::SoftwareBackend;

    const GATEWAY_KEY: [u8; 32] = [9u8; 32];

    fn config(dir: &TempDir, extra: &str) -> Config {
        let root = dir.path().display();
        Config::from_str(&format!(
            r#"
[interface]
endpoint = "203.0.113.10:51820"
backend = "offline"
state_dir = "{root}/state"

[clients]
dir = "{root}/clients"
{extra}

[lock]
path = "{root}/wg-manager.lock"
"#
        ))
        .unwrap()
    }

    fn memory_manager(dir: &TempDir, extra: &str) -> (ClientManager, MemoryPeerControl) {
        let control = MemoryPeerControl::new(PublicKey(GATEWAY_KEY));
        let manager = ClientManager::new(
            &config(dir, extra),
            Box::new(control.clone()),
            Arc::new(SoftwareBackend::new()),
        )
        .unwrap();
        (manager, control)
    }

    fn name(s: &str) -> ClientName {
        ClientName::parse(s).unwrap()
    }

    fn added_address(outcome: Outcome) -> Ipv4Addr {
        match outcome {
            Outcome::Added { address, .. } => address,
            other => panic!("expected Added, got {:?}", other),
        }
    }

    fn record_files(dir: &TempDir) -> usize {
        std::fs::read_dir(dir.path().join("clients"))
            .map(|d| d.count())
            .unwrap_or(0)
    }

    #[test]
    fn test_freed_slot_is_reused() {
        let dir = TempDir::new().unwrap();
        let (manager, _) = memory_manager(&dir, "");

        let alice = added_address(manager.add(&name("alice")).unwrap());
        let bob = added_address(manager.add(&name("bob")).unwrap());
        assert_eq!(alice, Ipv4Addr::new(10, 0, 0, 2));
        assert_eq!(bob, Ipv4Addr::new(10, 0, 0, 3));

        manager.remove(&name("alice")).unwrap();
        let carol = added_address(manager.add(&name("carol")).unwrap());
        assert_eq!(carol, Ipv4Addr::new(10, 0, 0, 2));
    }

    #[test]
    fn test_addresses_unique_and_skip_gateway() {
        let dir = TempDir::new().unwrap();
        let (manager, control) = memory_manager(&dir, "");

        let mut seen = HashSet::new();
        for i in 0..20 {
            let address = added_address(manager.add(&name(&format!("client{}", i))).unwrap());
            assert_ne!(address, Ipv4Addr::new(10, 0, 0, 1));
            assert!(seen.insert(address));
        }
        assert_eq!(control.live().len(), 20);
    }

    #[test]
    fn test_duplicate_add_rejected_without_mutation() {
        let dir = TempDir::new().unwrap();
        let (manager, control) = memory_manager(&dir, "");

        manager.add(&name("alice")).unwrap();
        let before = control.live();
        let raw = manager.export(&name("alice")).unwrap();

        let err = manager.add(&name("alice")).unwrap_err();
        assert!(matches!(err, ManagerError::AlreadyExists(_)));
        assert_eq!(err.exit_code(), 1);
        assert_eq!(control.live(), before);
        assert_eq!(manager.export(&name("alice")).unwrap(), raw);
    }

    #[test]
    fn test_export_round_trip() {
        let dir = TempDir::new().unwrap();
        let (manager, control) = memory_manager(&dir, "");

        let public_key = match manager.add(&name("alice")).unwrap() {
            Outcome::Added { public_key, .. } => public_key,
            other => panic!("unexpected {:?}", other),
        };

        let raw = manager.export(&name("alice")).unwrap();
        let record = ClientConfig::parse(&raw).unwrap();
        let derived = SoftwareBackend::new()
            .derive_public_key(&record.private_key)
            .unwrap();

        assert_eq!(derived, public_key);
        assert_eq!(control.live().get(&public_key), Some(&record.address));
        assert_eq!(record.server_public_key, PublicKey(GATEWAY_KEY));
        assert_eq!(record.endpoint, "203.0.113.10:51820");
        assert_eq!(record.allowed_ips, "0.0.0.0/0");
        assert_eq!(record.persistent_keepalive, Some(25));
        assert!(raw.contains("Address = 10.0.0.2/32"));
    }

    #[test]
    fn test_list_sorted_and_idempotent() {
        let dir = TempDir::new().unwrap();
        let (manager, _) = memory_manager(&dir, "");
        assert!(manager.list().unwrap().is_empty());

        for n in ["carol", "alice", "bob"] {
            manager.add(&name(n)).unwrap();
        }

        let first = manager.list().unwrap();
        let second = manager.list().unwrap();
        assert_eq!(first, second);
        let names: Vec<_> = first.iter().map(|c| c.name.to_string()).collect();
        assert_eq!(names, vec!["alice", "bob", "carol"]);
        assert!(first.iter().all(|c| c.created_at.is_some()));
    }

    #[test]
    fn test_missing_client_is_not_found_and_changes_nothing() {
        let dir = TempDir::new().unwrap();
        let (manager, control) = memory_manager(&dir, "");
        manager.add(&name("alice")).unwrap();

        let live = control.live();
        let persisted = control.persisted();
        let saves = control.saves();

        for op in [
            Operation::Remove(name("ghost")),
            Operation::Export(name("ghost")),
        ] {
            let err = manager.execute(&op).unwrap_err();
            assert!(matches!(err, ManagerError::NotFound(_)));
            assert_eq!(err.exit_code(), 1);
        }

        assert_eq!(control.live(), live);
        assert_eq!(control.persisted(), persisted);
        assert_eq!(control.saves(), saves);
        assert_eq!(manager.list().unwrap().len(), 1);
    }

    #[test]
    fn test_pool_exhaustion_is_side_effect_free() {
        let dir = TempDir::new().unwrap();
        let (manager, control) = memory_manager(&dir, "");

        for i in 0..253 {
            manager.add(&name(&format!("c{:03}", i))).unwrap();
        }
        let live = control.live();

        let err = manager.add(&name("overflow")).unwrap_err();
        assert!(matches!(err, ManagerError::PoolExhausted { pool: 253, .. }));
        assert_eq!(err.exit_code(), 1);
        assert_eq!(control.live(), live);
        assert_eq!(record_files(&dir), 253);
        assert!(!manager.store().exists(&name("overflow")));
    }

    #[test]
    fn test_client_limit() {
        let dir = TempDir::new().unwrap();
        let (manager, control) = memory_manager(&dir, "max_clients = 2");
        assert_eq!(manager.capacity(), 2);

        manager.add(&name("alice")).unwrap();
        manager.add(&name("bob")).unwrap();
        let err = manager.add(&name("carol")).unwrap_err();
        assert!(matches!(err, ManagerError::ClientLimit { max: 2 }));
        assert_eq!(control.live().len(), 2);

        manager.remove(&name("alice")).unwrap();
        manager.add(&name("carol")).unwrap();
    }

    #[test]
    fn test_failed_apply_rolls_back() {
        let dir = TempDir::new().unwrap();
        let (manager, control) = memory_manager(&dir, "");
        control.fail_set_peer(true);

        let err = manager.add(&name("alice")).unwrap_err();
        assert!(matches!(err, ManagerError::Command { .. }));
        assert_eq!(err.exit_code(), 2);
        assert!(!manager.store().exists(&name("alice")));
        assert!(control.live().is_empty());

        control.fail_set_peer(false);
        let address = added_address(manager.add(&name("alice")).unwrap());
        assert_eq!(address, Ipv4Addr::new(10, 0, 0, 2));
    }

    #[test]
    fn test_failed_persist_rolls_back_live_entry() {
        let dir = TempDir::new().unwrap();
        let (manager, control) = memory_manager(&dir, "");
        manager.add(&name("alice")).unwrap();

        // the leading sync succeeds, the persist after set fails
        control.fail_save_after(1);
        assert!(manager.add(&name("bob")).is_err());
        control.fail_save(false);

        assert!(!manager.store().exists(&name("bob")));
        assert_eq!(control.live().len(), 1);
        assert_eq!(control.live(), control.persisted());
        manager.add(&name("carol")).unwrap();
        assert_eq!(control.live(), control.persisted());
    }

    #[test]
    fn test_live_and_persisted_agree_after_mutations() {
        let dir = TempDir::new().unwrap();
        let (manager, control) = memory_manager(&dir, "");

        manager.add(&name("alice")).unwrap();
        assert_eq!(control.live(), control.persisted());
        manager.add(&name("bob")).unwrap();
        assert_eq!(control.live(), control.persisted());
        manager.remove(&name("alice")).unwrap();
        assert_eq!(control.live(), control.persisted());
        assert_eq!(control.persisted().len(), 1);
    }

    #[test]
    fn test_unsaved_live_mutation_heals_on_next_operation() {
        let dir = TempDir::new().unwrap();
        let (manager, control) = memory_manager(&dir, "");
        manager.add(&name("alice")).unwrap();

        // crash window: live table ahead of the boot snapshot
        control.set_peer_unsaved(PublicKey([4u8; 32]), Ipv4Addr::new(10, 0, 0, 3));
        assert_ne!(control.live(), control.persisted());

        let bob = added_address(manager.add(&name("bob")).unwrap());
        assert_eq!(bob, Ipv4Addr::new(10, 0, 0, 4));
        assert_eq!(control.live(), control.persisted());
    }

    #[test]
    fn test_orphaned_record_keeps_its_address() {
        let dir = TempDir::new().unwrap();
        let (manager, control) = memory_manager(&dir, "");
        manager.add(&name("alice")).unwrap();

        // peer vanished from the interface, record still on disk
        for key in control.live().keys() {
            control.remove_peer(key).unwrap();
        }
        let bob = added_address(manager.add(&name("bob")).unwrap());
        assert_eq!(bob, Ipv4Addr::new(10, 0, 0, 3));
    }

    #[test]
    fn test_status_report() {
        let dir = TempDir::new().unwrap();
        let (manager, control) = memory_manager(&dir, "max_clients = 10");

        for i in 0..9 {
            manager.add(&name(&format!("client{}", i))).unwrap();
        }
        let report = manager.status();
        assert!(report.up);
        assert_eq!(report.peers, 9);
        assert_eq!(report.clients, 9);
        assert_eq!(report.capacity, 10);
        assert!((report.utilization_percent - 90.0).abs() < f64::EPSILON);
        assert_eq!(report.health.status, HealthStatus::Degraded);

        control.set_up(false);
        let report = manager.status();
        assert!(!report.up);
        assert_eq!(report.peers, 0);
        assert_eq!(report.health.status, HealthStatus::Unhealthy);
    }

    #[test]
    fn test_interface_down_fails_mutations() {
        let dir = TempDir::new().unwrap();
        let (manager, control) = memory_manager(&dir, "");
        control.set_up(false);

        let err = manager.add(&name("alice")).unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(!manager.store().exists(&name("alice")));
        assert!(matches!(
            manager.execute(&Operation::Status),
            Ok(Outcome::Status(_))
        ));
    }

    #[test]
    fn test_help_is_usage() {
        let dir = TempDir::new().unwrap();
        let (manager, _) = memory_manager(&dir, "");
        assert!(matches!(
            manager.execute(&Operation::Help),
            Ok(Outcome::Usage)
        ));
        assert!(!Operation::Help.is_mutating());
        assert!(Operation::Add(name("alice")).is_mutating());
    }

    #[test]
    fn test_offline_backend_end_to_end() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir, "");
        let manager = ClientManager::from_config(&config).unwrap();

        manager.add(&name("alice")).unwrap();
        manager.add(&name("bob")).unwrap();
        manager.remove(&name("alice")).unwrap();

        let boot = dir.path().join("state").join("wg0.conf");
        let persisted = persisted_peers(&boot).unwrap();
        assert_eq!(persisted.len(), 1);
        assert_eq!(
            persisted[0].host_addresses().collect::<Vec<_>>(),
            vec![Ipv4Addr::new(10, 0, 0, 3)]
        );

        let record = ClientConfig::parse(&manager.export(&name("bob")).unwrap()).unwrap();
        let iface = OfflineInterface::new(
            dir.path().join("state"),
            "wg0",
            "10.0.0.1/24",
            51820,
            Arc::new(SoftwareBackend::new()),
        );
        assert_eq!(record.server_public_key, iface.public_key().unwrap());
    }

    #[test]
    fn test_concurrent_adds_get_distinct_addresses() {
        let dir = TempDir::new().unwrap();
        let config = Arc::new(config(&dir, ""));
        let barrier = Arc::new(Barrier::new(8));

        // fresh state dir: the first writer to take the lock creates the interface
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let config = Arc::clone(&config);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    let manager = ClientManager::from_config(&config).unwrap();
                    barrier.wait();
                    added_address(manager.add(&name(&format!("peer{}", i))).unwrap())
                })
            })
            .collect();

        let addresses: HashSet<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(addresses.len(), 8);

        let manager = ClientManager::from_config(&config).unwrap();
        assert_eq!(manager.status().peers, 8);

        let gateway = manager.gateway_public_key().unwrap();
        for i in 0..8 {
            let export = manager.export(&name(&format!("peer{}", i))).unwrap();
            let record = ClientConfig::parse(&export).unwrap();
            assert_eq!(record.server_public_key, gateway);
        }
    }

    #[test]
    fn test_offline_status_on_fresh_state_is_down() {
        let dir = TempDir::new().unwrap();
        let manager = ClientManager::from_config(&config(&dir, "")).unwrap();

        let report = manager.status();
        assert!(!report.up);
        assert_eq!(report.peers, 0);
        assert_eq!(report.health.status, HealthStatus::Unhealthy);
        assert!(!dir.path().join("state").exists());
        assert!(manager.list().unwrap().is_empty());
        assert!(!dir.path().join("state").exists());
    }

    #[test]
    fn test_read_only_operations_leave_state_untouched() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir, "");
        ClientManager::from_config(&config)
            .unwrap()
            .add(&name("alice"))
            .unwrap();

        let state = dir.path().join("state");
        let snapshot = || {
            (
                fs::read(state.join("wg0.conf")).unwrap(),
                fs::read(state.join("wg0.peers.json")).unwrap(),
            )
        };
        let before = snapshot();

        let manager = ClientManager::from_config(&config).unwrap();
        manager.execute(&Operation::List).unwrap();
        manager.execute(&Operation::Export(name("alice"))).unwrap();
        manager.execute(&Operation::Status).unwrap();
        manager.execute(&Operation::Help).unwrap();

        assert_eq!(snapshot(), before);
    }
}
