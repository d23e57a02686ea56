//! wg-manager client provisioning
//!
//! Allocates tunnel addresses, stores per-client records and keeps the
//! gateway's live peer table in agreement with its boot-time configuration.

#![warn(missing_docs)]

pub mod allocator;
pub mod error;
pub mod lock;
pub mod manager;
pub mod offline;
pub mod peers;
pub mod store;
pub mod sync;
pub mod wg;

// Re-exports
pub use allocator::{next_free_address, pool_size};
pub use error::{ErrorCategory, ManagerError, ManagerResult};
pub use lock::WriterLock;
pub use manager::{ClientManager, ClientSummary, Operation, Outcome, StatusReport};
pub use offline::OfflineInterface;
pub use peers::{MemoryPeerControl, PeerControl, PeerEntry};
pub use store::{ClientStore, StoredClient};
pub use sync::PeerTableSync;
pub use wg::{WgCommand, WgToolBackend};
