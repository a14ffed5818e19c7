use crate::error::RemoteError;
use crate::models::InventoryItem;

/// Where a sent item should land.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendDestination {
    Avatar,
    Clan,
}

#[derive(Debug, Clone)]
pub struct AddItemRequest {
    pub name: String,
    pub description: String,
    pub source: String,
    pub item_type: String,
    /// Optional linked-asset id; when set the remote stores it in metadata.
    pub nft_id: Option<String>,
    pub quantity: i32,
    /// When true the remote increments an existing stack or creates one;
    /// when false it creates a distinct item.
    pub stack: bool,
}

#[derive(Debug, Clone)]
pub struct SendItemRequest {
    /// Username, avatar id, or clan name depending on destination.
    pub target: String,
    pub item_name: String,
    pub quantity: i32,
    pub destination: SendDestination,
    /// Remote item id when known; lets the service skip a name lookup.
    pub item_id: Option<String>,
}

/// The opaque remote inventory service. All calls block and may fail
/// transiently; the sync layer only ever invokes them from worker threads
/// (or, for the cache-refresh path, deliberately from the owning thread).
///
/// `has_item` and `add_item` with `stack: false` are idempotent; the push
/// phase relies on that.
pub trait RemoteInventory: Send + Sync {
    fn authenticate(&self, username: &str, password: &str) -> Result<(), RemoteError>;

    /// Avatar id of the authenticated user.
    fn avatar_id(&self) -> Result<String, RemoteError>;

    fn has_item(&self, name: &str) -> Result<bool, RemoteError>;

    fn add_item(&self, req: &AddItemRequest) -> Result<(), RemoteError>;

    fn get_inventory(&self) -> Result<Vec<InventoryItem>, RemoteError>;

    /// Returns whether the item was accepted for use in the given context
    /// (e.g. "door_silver_01").
    fn use_item(&self, name: &str, context: &str) -> Result<bool, RemoteError>;

    fn send_item(&self, req: &SendItemRequest) -> Result<(), RemoteError>;
}
