use serde::Deserialize;

/// One record in the display list. Either remote-sourced (carries the remote
/// id) or local-only (a pickup that has not been confirmed remotely yet).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryItem {
    /// Remote inventory id; `None` for local-only entries.
    pub id: Option<String>,

    /// Merge identity: exact, case-sensitive name match.
    pub name: String,

    pub description: String,

    /// Originating title (e.g. "ODOOM", "OQUAKE"); shown in the row label.
    pub source: String,

    pub item_type: String,

    /// Stack size from the remote (>= 1). Local-only entries use 1.
    pub quantity: i32,

    /// Optional linked-asset id, stored in item metadata by the remote.
    pub nft_id: Option<String>,
}

impl InventoryItem {
    pub fn is_local_only(&self) -> bool {
        self.id.is_none()
    }
}

/// A locally observed pickup awaiting remote confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEntry {
    pub name: String,
    pub description: String,
    pub item_type: String,
    pub source: String,

    /// Set once the item is known to exist remotely (push success or
    /// snapshot presence). Synced entries are dropped at the next compaction.
    pub synced: bool,

    /// Creation sequence number; used to generate unique per-pickup names
    /// for categories that stack by event.
    pub seq: u64,
}

/// Row aggregation policy: one row per unique unlock vs. a running sum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupMode {
    Count,
    Sum,
}

/// A UI-ready row derived from the display list. Never stored; recomputed on
/// every rebuild.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayRow {
    pub label: String,
    pub mode: GroupMode,

    /// Index into the display list of the first item contributing to this
    /// row; use it to resolve send/use targets.
    pub rep_index: usize,

    /// 1 for `Count` rows; accumulated contributions for `Sum` rows.
    pub value: i32,

    /// True when any contributing item is still unsynced in the ledger.
    pub has_pending: bool,
}
