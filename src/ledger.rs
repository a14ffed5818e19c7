use crate::models::PendingEntry;

/// Ordered buffer of locally observed pickups that have not been confirmed
/// on the remote yet. Main-thread only; workers get cloned snapshots.
#[derive(Debug)]
pub struct PendingLedger {
    entries: Vec<PendingEntry>,
    next_seq: u64,
}

const SEQ_SPACE: u64 = 1_000_000;

/// Seed the per-session sequence so each run generates a fresh name range
/// and two runs started in the same second still differ.
fn seed_sequence() -> u64 {
    let millis = chrono::Utc::now().timestamp_millis().unsigned_abs();
    let jitter = u64::from(rand::random::<u16>());
    let seed = (millis + jitter) % SEQ_SPACE;
    if seed == 0 { 1 } else { seed }
}

impl PendingLedger {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            next_seq: seed_sequence(),
        }
    }

    pub fn entries(&self) -> &[PendingEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Unsynced entries only, for the worker's push phase.
    pub fn unsynced(&self) -> Vec<PendingEntry> {
        self.entries.iter().filter(|e| !e.synced).cloned().collect()
    }

    pub fn pending_count(&self) -> usize {
        self.entries.iter().filter(|e| !e.synced).count()
    }

    pub fn has_unsynced(&self) -> bool {
        self.entries.iter().any(|e| !e.synced)
    }

    /// True when `name` is still awaiting remote confirmation.
    pub fn is_pending(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e.name == name && !e.synced)
    }

    /// Records an unlock-style pickup once. Repeat pickups of the same name
    /// are dropped; presence is what matters for unlocks.
    pub fn record_unlock(
        &mut self,
        name: &str,
        description: &str,
        item_type: &str,
        source: &str,
    ) -> bool {
        if name.is_empty() || self.entries.iter().any(|e| e.name == name) {
            return false;
        }
        let seq = self.advance_seq();
        self.entries.push(PendingEntry {
            name: name.to_string(),
            description: description.to_string(),
            item_type: item_type.to_string(),
            source: source.to_string(),
            synced: false,
            seq,
        });
        true
    }

    /// Records a stack-style pickup event under a unique generated name
    /// (`prefix_NNNNNN`), so every event survives until pushed even when the
    /// same item is picked up many times. Returns the generated name.
    pub fn record_event(
        &mut self,
        prefix: &str,
        description: &str,
        item_type: &str,
        source: &str,
    ) -> Option<String> {
        if prefix.is_empty() {
            return None;
        }
        let seq = self.advance_seq();
        let name = format!("{prefix}_{seq:06}");
        self.entries.push(PendingEntry {
            name: name.clone(),
            description: description.to_string(),
            item_type: item_type.to_string(),
            source: source.to_string(),
            synced: false,
            seq,
        });
        Some(name)
    }

    /// Marks entries synced whose push call succeeded.
    pub fn mark_pushed(&mut self, pushed_names: &[String]) {
        for entry in &mut self.entries {
            if !entry.synced && pushed_names.iter().any(|n| n == &entry.name) {
                entry.synced = true;
            }
        }
    }

    /// Marks entries synced whose name appears in the fetched snapshot.
    /// Snapshot presence is the only remote-confirmation signal here; the
    /// push phase is the only place that queries the remote per item.
    pub fn mark_synced_from_snapshot<'a, I>(&mut self, snapshot_names: I)
    where
        I: IntoIterator<Item = &'a str> + Clone,
    {
        for entry in &mut self.entries {
            if entry.synced {
                continue;
            }
            if snapshot_names.clone().into_iter().any(|n| n == entry.name) {
                entry.synced = true;
            }
        }
    }

    /// Drops synced entries, preserving relative order of the remainder.
    pub fn compact(&mut self) {
        self.entries.retain(|e| !e.synced);
    }

    fn advance_seq(&mut self) -> u64 {
        self.next_seq += 1;
        if self.next_seq >= SEQ_SPACE {
            self.next_seq = 1;
        }
        self.next_seq
    }
}

impl Default for PendingLedger {
    fn default() -> Self {
        Self::new()
    }
}
