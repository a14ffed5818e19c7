pub mod client;
pub mod config;
pub mod error;
pub mod grouping;
pub mod job;
pub mod ledger;
pub mod models;
pub mod reconcile;
pub mod sync;

// Convenient re-exports (so call sites can do `lootlink::SyncContext`, etc.)
pub use client::{AddItemRequest, RemoteInventory, SendDestination, SendItemRequest};
pub use config::Config;
pub use error::{RemoteError, SyncError, SyncResult};
pub use grouping::{GroupRule, GroupRules, SelectionState, TabRule, ValueSource};
pub use job::JobSlot;
pub use ledger::PendingLedger;
pub use models::{DisplayRow, GroupMode, InventoryItem, PendingEntry};
pub use reconcile::SyncStatus;
pub use sync::{
    AuthOutcome, AuthSession, RefreshReport, SendOutcome, SyncContext, UseOutcome,
};
