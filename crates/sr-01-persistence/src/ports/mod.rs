//! Ports layer: the storage contract every backend implements, and the
//! bookkeeping API offered to the rest of the relay.

pub mod inbound;
pub mod outbound;

pub use inbound::BookkeepingApi;
pub use outbound::{BackendKind, PersistenceProvider, StoredEntry};
