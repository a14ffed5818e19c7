use crate::client::{AddItemRequest, RemoteInventory};
use crate::error::RemoteError;
use crate::grouping::{self, GroupRules};
use crate::ledger::PendingLedger;
use crate::models::{InventoryItem, PendingEntry};
use std::fmt;

/// Everything a refresh worker brings back to the owning thread.
#[derive(Debug)]
pub struct RefreshOutcome {
    pub fetch: Result<Vec<InventoryItem>, RemoteError>,
    /// Ledger entry names whose push call confirmed the item remotely.
    pub pushed: Vec<String>,
    /// First push failure, kept for the status line; push failures never
    /// abort the fetch.
    pub push_failure: Option<String>,
    /// How many add_item calls the push phase issued.
    pub add_calls: usize,
}

pub struct PushSummary {
    pub pushed: Vec<String>,
    pub first_failure: Option<String>,
    pub add_calls: usize,
}

/// Push phase, run on the worker thread before the fetch. Stack entries go
/// up as `add_item(base_label, delta, stack=true)` so the remote increments
/// an existing stack; unlock entries check `has_item` first and add only
/// when absent.
pub fn push_pending(
    client: &dyn RemoteInventory,
    entries: &[PendingEntry],
    default_source: &str,
    rules: &GroupRules,
) -> PushSummary {
    let mut summary = PushSummary {
        pushed: Vec::new(),
        first_failure: None,
        add_calls: 0,
    };

    for entry in entries {
        let source = if entry.source.is_empty() {
            default_source
        } else {
            &entry.source
        };
        let label = grouping::base_label(&entry.name);

        let outcome = if rules.stacks(label) {
            let quantity = grouping::parse_delta(&entry.description).unwrap_or(1);
            summary.add_calls += 1;
            client.add_item(&AddItemRequest {
                name: label.to_string(),
                description: entry.description.clone(),
                source: source.to_string(),
                item_type: entry.item_type.clone(),
                nft_id: None,
                quantity: quantity.max(1),
                stack: true,
            })
        } else {
            match client.has_item(&entry.name) {
                Ok(true) => Ok(()),
                Ok(false) => {
                    summary.add_calls += 1;
                    client.add_item(&AddItemRequest {
                        name: entry.name.clone(),
                        description: entry.description.clone(),
                        source: source.to_string(),
                        item_type: entry.item_type.clone(),
                        nft_id: None,
                        quantity: 1,
                        stack: false,
                    })
                }
                Err(e) => Err(e),
            }
        };

        match outcome {
            Ok(()) => {
                tracing::debug!(item = %entry.name, "push succeeded");
                summary.pushed.push(entry.name.clone());
            }
            Err(e) => {
                tracing::debug!(item = %entry.name, error = %e, "push failed");
                if summary.first_failure.is_none() {
                    summary.first_failure = Some(format!("{}: {e}", entry.name));
                }
            }
        }
    }

    summary
}

fn local_item(entry: &PendingEntry, default_source: &str) -> InventoryItem {
    InventoryItem {
        id: None,
        name: entry.name.clone(),
        description: entry.description.clone(),
        source: if entry.source.is_empty() {
            default_source.to_string()
        } else {
            entry.source.clone()
        },
        item_type: entry.item_type.clone(),
        quantity: 1,
        nft_id: None,
    }
}

/// Builds the authoritative display list: snapshot items in snapshot order,
/// then ledger entries not already present by name, so a pickup is visible
/// before its round trip completes. A synced entry is dropped only once the
/// snapshot shows the item (or the stack a pickup event folded into); when
/// the fetch failed, a push-confirmed pickup stays visible instead of
/// vanishing until the next successful fetch.
///
/// The result never holds two entries with the same name.
pub fn build_display_list(
    snapshot: Option<&[InventoryItem]>,
    ledger: &PendingLedger,
    default_source: &str,
) -> Vec<InventoryItem> {
    let mut display: Vec<InventoryItem> = snapshot.map(<[_]>::to_vec).unwrap_or_default();

    for entry in ledger.entries() {
        if display.iter().any(|i| i.name == entry.name) {
            continue;
        }
        if entry.synced {
            let folded = snapshot.is_some_and(|items| {
                items
                    .iter()
                    .any(|i| i.name == grouping::base_label(&entry.name))
            });
            if folded {
                continue;
            }
        }
        display.push(local_item(entry, default_source));
    }

    display
}

/// Display state after a refresh, in fixed priority order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncStatus {
    /// No successful auth yet; remote calls are pointless.
    Offline,
    /// Fetch failed but cached/local items are still shown.
    FetchFailedShowingCached { message: String, shown: usize },
    /// Fetch failed and there is nothing to show.
    FetchFailedEmpty { message: String },
    /// Fetch succeeded; some pickups still await confirmation.
    SyncedPending { items: usize, pending: usize },
    Synced { items: usize },
    Empty,
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncStatus::Offline => write!(f, "offline - not authenticated"),
            SyncStatus::FetchFailedShowingCached { message, shown } => {
                write!(f, "remote error: {message} (showing cached: {shown} items)")
            }
            SyncStatus::FetchFailedEmpty { message } => write!(f, "remote error: {message}"),
            SyncStatus::SyncedPending { items, pending } => {
                write!(f, "synced ({items} items), {pending} pending")
            }
            SyncStatus::Synced { items } => write!(f, "synced ({items} items)"),
            SyncStatus::Empty => write!(f, "inventory is empty"),
        }
    }
}

/// Pure summarization of (auth state, fetch outcome, shown items, pending
/// count). Recomputing is safe at any time.
pub fn summarize_status(
    authenticated: bool,
    fetch_error: Option<&str>,
    shown_items: usize,
    pending: usize,
) -> SyncStatus {
    if !authenticated {
        return SyncStatus::Offline;
    }
    if let Some(message) = fetch_error {
        if shown_items > 0 {
            return SyncStatus::FetchFailedShowingCached {
                message: message.to_string(),
                shown: shown_items,
            };
        }
        return SyncStatus::FetchFailedEmpty {
            message: message.to_string(),
        };
    }
    if pending > 0 {
        return SyncStatus::SyncedPending {
            items: shown_items,
            pending,
        };
    }
    if shown_items > 0 {
        return SyncStatus::Synced { items: shown_items };
    }
    SyncStatus::Empty
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::mock::MockRemote;
    use crate::grouping::{GroupRule, ValueSource};
    use crate::models::GroupMode;

    fn shells_rules() -> GroupRules {
        GroupRules {
            groups: vec![GroupRule {
                label: "Shells".to_string(),
                mode: GroupMode::Sum,
                value: ValueSource::Delta,
            }],
            tabs: vec![],
        }
    }

    #[test]
    fn t_push_stack_entry_sends_base_label_and_delta() {
        let mock = MockRemote::new();
        let mut ledger = PendingLedger::new();
        ledger.record_event("Shells", "Shells pickup +25", "Ammo", "");

        let summary = push_pending(mock.as_ref(), &ledger.unsynced(), "Quake", &shells_rules());

        assert_eq!(summary.add_calls, 1);
        assert_eq!(summary.pushed.len(), 1);
        assert!(summary.first_failure.is_none());
        let adds = mock.calls_matching("add_item:");
        assert_eq!(adds, vec!["add_item:Shells:25:true"]);
        // Stack pushes never probe with has_item.
        assert!(mock.calls_matching("has_item:").is_empty());
    }

    #[test]
    fn t_push_unlock_entry_checks_before_adding() {
        let mock = MockRemote::new();
        let mut ledger = PendingLedger::new();
        ledger.record_unlock("Silver Key", "opens silver doors", "KeyItem", "");

        let summary = push_pending(mock.as_ref(), &ledger.unsynced(), "Quake", &GroupRules::default());

        assert_eq!(summary.add_calls, 1);
        assert_eq!(mock.calls_matching("has_item:"), vec!["has_item:Silver Key"]);
        assert_eq!(
            mock.calls_matching("add_item:"),
            vec!["add_item:Silver Key:1:false"]
        );
        assert_eq!(summary.pushed, vec!["Silver Key"]);
    }

    #[test]
    fn t_push_unlock_already_remote_skips_add() {
        let mock = MockRemote::new();
        mock.seed_remote("Silver Key", 1);
        let mut ledger = PendingLedger::new();
        ledger.record_unlock("Silver Key", "", "KeyItem", "");

        let summary = push_pending(mock.as_ref(), &ledger.unsynced(), "Quake", &GroupRules::default());

        assert_eq!(summary.add_calls, 0);
        assert!(mock.calls_matching("add_item:").is_empty());
        // Still confirmed: presence counts as pushed.
        assert_eq!(summary.pushed, vec!["Silver Key"]);
    }

    #[test]
    fn t_push_failure_recorded_but_does_not_stop_batch() {
        let mock = MockRemote::new();
        mock.fail_add.store(true, std::sync::atomic::Ordering::SeqCst);
        let mut ledger = PendingLedger::new();
        ledger.record_unlock("Gold Key", "", "KeyItem", "");
        ledger.record_unlock("Rune", "", "Sigil", "");

        let summary = push_pending(mock.as_ref(), &ledger.unsynced(), "Quake", &GroupRules::default());

        assert!(summary.pushed.is_empty());
        assert_eq!(summary.add_calls, 2);
        let failure = summary.first_failure.unwrap();
        assert!(failure.starts_with("Gold Key:"), "got {failure}");
    }

    #[test]
    fn t_display_list_appends_unsynced_locals_once() {
        let mut ledger = PendingLedger::new();
        ledger.record_unlock("Silver Key", "", "KeyItem", "");
        ledger.record_unlock("Gold Key", "", "KeyItem", "");

        let snapshot = vec![InventoryItem {
            id: Some("R-1".to_string()),
            name: "Silver Key".to_string(),
            description: String::new(),
            source: "OQUAKE".to_string(),
            item_type: "KeyItem".to_string(),
            quantity: 1,
            nft_id: None,
        }];

        let display = build_display_list(Some(&snapshot), &ledger, "Quake");
        let names: Vec<_> = display.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["Silver Key", "Gold Key"]);
        // The remote copy wins for a duplicated name.
        assert!(!display[0].is_local_only());
        assert!(display[1].is_local_only());
    }

    #[test]
    fn t_display_list_keeps_push_confirmed_entry_when_fetch_failed() {
        let mut ledger = PendingLedger::new();
        ledger.record_unlock("Gold Key", "", "KeyItem", "");
        ledger.mark_pushed(&["Gold Key".to_string()]);

        // Push succeeded but no snapshot arrived; the pickup must not vanish.
        let display = build_display_list(None, &ledger, "Quake");
        assert_eq!(display.len(), 1);
        assert_eq!(display[0].name, "Gold Key");
        assert!(display[0].is_local_only());

        // A snapshot without the item still shows the confirmed pickup.
        let display = build_display_list(Some(&[]), &ledger, "Quake");
        assert_eq!(display.len(), 1);
        assert_eq!(display[0].name, "Gold Key");
    }

    #[test]
    fn t_display_list_folds_synced_event_into_remote_stack() {
        let mut ledger = PendingLedger::new();
        let name = ledger
            .record_event("Shells", "Shells pickup +25", "Ammo", "")
            .unwrap();
        ledger.mark_pushed(&[name]);

        let snapshot = vec![InventoryItem {
            id: Some("R-1".to_string()),
            name: "Shells".to_string(),
            description: String::new(),
            source: String::new(),
            item_type: "Ammo".to_string(),
            quantity: 25,
            nft_id: None,
        }];

        // The pushed delta is already inside the remote stack; listing the
        // event entry as well would count it twice.
        let display = build_display_list(Some(&snapshot), &ledger, "Quake");
        let names: Vec<_> = display.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["Shells"]);
    }

    #[test]
    fn t_status_priority_order() {
        assert_eq!(summarize_status(false, None, 5, 2), SyncStatus::Offline);
        assert_eq!(
            summarize_status(true, Some("timeout"), 3, 1),
            SyncStatus::FetchFailedShowingCached {
                message: "timeout".to_string(),
                shown: 3
            }
        );
        assert_eq!(
            summarize_status(true, Some("timeout"), 0, 0),
            SyncStatus::FetchFailedEmpty {
                message: "timeout".to_string()
            }
        );
        assert_eq!(
            summarize_status(true, None, 1, 1),
            SyncStatus::SyncedPending { items: 1, pending: 1 }
        );
        assert_eq!(summarize_status(true, None, 4, 0), SyncStatus::Synced { items: 4 });
        assert_eq!(summarize_status(true, None, 0, 0), SyncStatus::Empty);
    }

    #[test]
    fn t_status_display_strings() {
        assert_eq!(
            SyncStatus::SyncedPending { items: 1, pending: 1 }.to_string(),
            "synced (1 items), 1 pending"
        );
        assert_eq!(SyncStatus::Offline.to_string(), "offline - not authenticated");
    }
}
