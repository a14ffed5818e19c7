use crate::client::{AddItemRequest, RemoteInventory, SendItemRequest};
use crate::config::Config;
use crate::error::{RemoteError, SyncError, SyncResult};
use crate::grouping::{self, GroupRules};
use crate::job::JobSlot;
use crate::ledger::PendingLedger;
use crate::models::{DisplayRow, InventoryItem};
use crate::reconcile::{self, PushSummary, RefreshOutcome, SyncStatus};
use std::sync::Arc;
use std::time::Duration;

/// Identity established by a successful auth job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSession {
    pub username: String,
    pub avatar_id: String,
}

#[derive(Debug, Clone)]
pub struct AuthOutcome {
    pub username: String,
    pub result: Result<AuthSession, RemoteError>,
}

#[derive(Debug, Clone)]
pub struct SendOutcome {
    pub item_name: String,
    pub target: String,
    pub result: Result<(), RemoteError>,
}

#[derive(Debug, Clone)]
pub struct UseOutcome {
    pub item_name: String,
    pub context: String,
    /// `Ok(false)` means the remote declined the use (e.g. wrong context).
    pub result: Result<bool, RemoteError>,
}

/// What a completed refresh left behind, handed to the refresh callback
/// after merge/compaction/status have already been applied.
#[derive(Debug, Clone)]
pub struct RefreshReport {
    pub status: SyncStatus,
    pub items: usize,
    pub pending: usize,
    /// First failed push, if any (fetch still succeeded or failed on its own).
    pub push_failure: Option<String>,
}

type AuthCallback = Box<dyn FnOnce(&AuthOutcome)>;
type RefreshCallback = Box<dyn FnOnce(&RefreshReport)>;
type SendCallback = Box<dyn FnOnce(&SendOutcome)>;
type UseCallback = Box<dyn FnOnce(&UseOutcome)>;

/// Owns one job slot per operation kind plus the pending ledger and the
/// derived display list. One instance per session; nothing global.
///
/// All methods run on the owning thread. Call `pump()` once per tick;
/// completion callbacks run inside it, after the context has absorbed the
/// result. The ledger and display list are never touched off-thread.
pub struct SyncContext {
    client: Arc<dyn RemoteInventory>,
    rules: Arc<GroupRules>,
    default_source: String,

    auth: JobSlot<AuthOutcome>,
    refresh: JobSlot<RefreshOutcome>,
    send: JobSlot<SendOutcome>,
    use_item: JobSlot<UseOutcome>,

    on_auth: Option<AuthCallback>,
    on_refresh: Option<RefreshCallback>,
    on_send: Option<SendCallback>,
    on_use: Option<UseCallback>,

    ledger: PendingLedger,
    display: Vec<InventoryItem>,
    status: SyncStatus,
    session: Option<AuthSession>,
}

impl SyncContext {
    pub fn new(client: Arc<dyn RemoteInventory>, config: &Config) -> Self {
        Self {
            client,
            rules: Arc::new(config.rules.clone()),
            default_source: config.default_source.clone(),
            auth: JobSlot::new("auth"),
            refresh: JobSlot::new("inventory"),
            send: JobSlot::new("send-item"),
            use_item: JobSlot::new("use-item"),
            on_auth: None,
            on_refresh: None,
            on_send: None,
            on_use: None,
            ledger: PendingLedger::new(),
            display: Vec::new(),
            status: SyncStatus::Offline,
            session: None,
        }
    }

    // ------------------------------------------------------------------
    // Pickup recording (called by game glue on gameplay events)
    // ------------------------------------------------------------------

    /// Queues an unlock-style pickup (presence matters, repeats don't).
    /// Returns false when the name is already queued or empty.
    pub fn record_unlock_pickup(&mut self, name: &str, description: &str, item_type: &str) -> bool {
        let source = self.default_source.clone();
        let added = self.ledger.record_unlock(name, description, item_type, &source);
        if added {
            self.show_local(name);
            self.sync_if_needed();
        }
        added
    }

    /// Queues a stack-style pickup event under a unique generated name, so
    /// every pickup contributes its delta even before the push completes.
    /// Returns the generated name.
    pub fn record_stack_pickup(
        &mut self,
        prefix: &str,
        description: &str,
        item_type: &str,
    ) -> Option<String> {
        let source = self.default_source.clone();
        let name = self.ledger.record_event(prefix, description, item_type, &source)?;
        self.show_local(&name);
        self.sync_if_needed();
        Some(name)
    }

    fn show_local(&mut self, name: &str) {
        if self.display.iter().any(|i| i.name == name) {
            return;
        }
        if let Some(entry) = self.ledger.entries().iter().find(|e| e.name == name) {
            self.display.push(InventoryItem {
                id: None,
                name: entry.name.clone(),
                description: entry.description.clone(),
                source: entry.source.clone(),
                item_type: entry.item_type.clone(),
                quantity: 1,
                nft_id: None,
            });
        }
    }

    // ------------------------------------------------------------------
    // Job starts
    // ------------------------------------------------------------------

    /// Starts authentication in the background. On success the session is
    /// stored and an inventory refresh is kicked off so the overlay has
    /// data when opened.
    pub fn start_auth(
        &mut self,
        username: &str,
        password: &str,
        on_done: Option<AuthCallback>,
    ) -> SyncResult<()> {
        if username.is_empty() {
            return Err(SyncError::Validation {
                field: "username",
                message: "username must not be empty".to_string(),
            });
        }
        let client = Arc::clone(&self.client);
        let user = username.to_string();
        let pass = password.to_string();
        self.auth.start(
            move || {
                let result = client
                    .authenticate(&user, &pass)
                    .and_then(|()| client.avatar_id())
                    .map(|avatar_id| AuthSession {
                        username: user.clone(),
                        avatar_id,
                    });
                AuthOutcome { username: user, result }
            },
            None,
        )?;
        self.on_auth = on_done;
        Ok(())
    }

    /// Starts the full refresh: push unsynced pickups, then fetch a
    /// snapshot. Refused while a refresh is already running.
    pub fn start_inventory_refresh(&mut self, on_done: Option<RefreshCallback>) -> SyncResult<()> {
        if self.session.is_none() {
            self.status = SyncStatus::Offline;
            return Err(SyncError::NotAuthenticated);
        }
        let client = Arc::clone(&self.client);
        let rules = Arc::clone(&self.rules);
        let default_source = self.default_source.clone();
        let entries = self.ledger.unsynced();
        self.refresh.start(
            move || {
                let push = if entries.is_empty() {
                    PushSummary {
                        pushed: Vec::new(),
                        first_failure: None,
                        add_calls: 0,
                    }
                } else {
                    reconcile::push_pending(client.as_ref(), &entries, &default_source, &rules)
                };
                let fetch = client.get_inventory();
                RefreshOutcome {
                    fetch,
                    pushed: push.pushed,
                    push_failure: push.first_failure,
                    add_calls: push.add_calls,
                }
            },
            None,
        )?;
        self.on_refresh = on_done;
        Ok(())
    }

    /// Starts a background refresh only when there is something to push and
    /// no auth/refresh is already running. Returns whether one was started.
    pub fn sync_if_needed(&mut self) -> bool {
        if !self.ledger.has_unsynced() {
            return false;
        }
        if self.refresh.in_progress() || self.auth.in_progress() || self.session.is_none() {
            tracing::debug!(
                refresh_busy = self.refresh.in_progress(),
                auth_busy = self.auth.in_progress(),
                authenticated = self.session.is_some(),
                "sync skipped"
            );
            return false;
        }
        tracing::info!(pending = self.ledger.pending_count(), "starting inventory sync");
        self.start_inventory_refresh(None).is_ok()
    }

    pub fn start_send_item(
        &mut self,
        req: SendItemRequest,
        on_done: Option<SendCallback>,
    ) -> SyncResult<()> {
        if req.target.is_empty() {
            return Err(SyncError::Validation {
                field: "target",
                message: "destination must not be empty".to_string(),
            });
        }
        if req.item_name.is_empty() {
            return Err(SyncError::Validation {
                field: "item_name",
                message: "item name must not be empty".to_string(),
            });
        }
        if req.quantity < 1 {
            return Err(SyncError::Validation {
                field: "quantity",
                message: format!("quantity must be at least 1, got {}", req.quantity),
            });
        }
        let client = Arc::clone(&self.client);
        self.send.start(
            move || {
                let result = client.send_item(&req);
                SendOutcome {
                    item_name: req.item_name,
                    target: req.target,
                    result,
                }
            },
            None,
        )?;
        self.on_send = on_done;
        Ok(())
    }

    pub fn start_use_item(
        &mut self,
        name: &str,
        context: &str,
        on_done: Option<UseCallback>,
    ) -> SyncResult<()> {
        if name.is_empty() {
            return Err(SyncError::Validation {
                field: "name",
                message: "item name must not be empty".to_string(),
            });
        }
        let client = Arc::clone(&self.client);
        let item_name = name.to_string();
        let ctx = context.to_string();
        self.use_item.start(
            move || {
                let result = client.use_item(&item_name, &ctx);
                UseOutcome {
                    item_name,
                    context: ctx,
                    result,
                }
            },
            None,
        )?;
        self.on_use = on_done;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Pump & completion handling
    // ------------------------------------------------------------------

    /// Call once per tick from the owning thread. Drains every finished job
    /// slot and runs completion handling plus any registered callback.
    pub fn pump(&mut self) {
        if let Some(outcome) = self.auth.take_result() {
            self.handle_auth_done(outcome);
        }
        if let Some(outcome) = self.refresh.take_result() {
            self.handle_refresh_done(outcome);
        }
        if let Some(outcome) = self.send.take_result() {
            self.handle_send_done(outcome);
        }
        if let Some(outcome) = self.use_item.take_result() {
            self.handle_use_done(outcome);
        }
    }

    fn handle_auth_done(&mut self, outcome: AuthOutcome) {
        match &outcome.result {
            Ok(session) => {
                tracing::info!(
                    username = %session.username,
                    avatar_id = %session.avatar_id,
                    "authenticated"
                );
                self.session = Some(session.clone());
                if let Err(e) = self.start_inventory_refresh(None) {
                    tracing::debug!(error = %e, "post-auth refresh not started");
                }
            }
            Err(e) => {
                tracing::warn!(username = %outcome.username, error = %e, "authentication failed");
            }
        }
        if let Some(cb) = self.on_auth.take() {
            cb(&outcome);
        }
    }

    fn handle_refresh_done(&mut self, outcome: RefreshOutcome) {
        self.ledger.mark_pushed(&outcome.pushed);

        let (snapshot, fetch_error) = match outcome.fetch {
            Ok(items) => {
                self.ledger
                    .mark_synced_from_snapshot(items.iter().map(|i| i.name.as_str()));
                (Some(items), None)
            }
            Err(e) => (None, Some(e.to_string())),
        };

        self.display =
            reconcile::build_display_list(snapshot.as_deref(), &self.ledger, &self.default_source);
        self.ledger.compact();

        let pending = self.ledger.pending_count();
        self.status = reconcile::summarize_status(
            self.session.is_some(),
            fetch_error.as_deref(),
            self.display.len(),
            pending,
        );

        if let Some(failure) = &outcome.push_failure {
            tracing::warn!(failure = %failure, "one or more pickups failed to push");
        }
        tracing::info!(
            items = self.display.len(),
            pending,
            add_calls = outcome.add_calls,
            status = %self.status,
            "inventory refresh complete"
        );

        if let Some(cb) = self.on_refresh.take() {
            cb(&RefreshReport {
                status: self.status.clone(),
                items: self.display.len(),
                pending,
                push_failure: outcome.push_failure,
            });
        }
    }

    fn handle_send_done(&mut self, outcome: SendOutcome) {
        match &outcome.result {
            Ok(()) => {
                tracing::info!(item = %outcome.item_name, target = %outcome.target, "item sent");
                if let Err(e) = self.refresh_from_cache() {
                    tracing::debug!(error = %e, "post-send cache refresh failed");
                }
            }
            Err(e) => {
                tracing::warn!(item = %outcome.item_name, error = %e, "send failed");
            }
        }
        if let Some(cb) = self.on_send.take() {
            cb(&outcome);
        }
    }

    fn handle_use_done(&mut self, outcome: UseOutcome) {
        match &outcome.result {
            Ok(true) => {
                tracing::info!(item = %outcome.item_name, context = %outcome.context, "item used");
                if let Err(e) = self.refresh_from_cache() {
                    tracing::debug!(error = %e, "post-use cache refresh failed");
                }
            }
            Ok(false) => {
                tracing::info!(item = %outcome.item_name, context = %outcome.context, "use declined");
            }
            Err(e) => {
                tracing::warn!(item = %outcome.item_name, error = %e, "use failed");
            }
        }
        if let Some(cb) = self.on_use.take() {
            cb(&outcome);
        }
    }

    // ------------------------------------------------------------------
    // Synchronous paths
    // ------------------------------------------------------------------

    /// Lightweight post-action refresh: one `get_inventory` (served from the
    /// client cache) plus a display rebuild. No push calls and no merge
    /// pass; use the full refresh for that.
    pub fn refresh_from_cache(&mut self) -> SyncResult<()> {
        if self.session.is_none() {
            self.status = SyncStatus::Offline;
            return Err(SyncError::NotAuthenticated);
        }
        let items = self.client.get_inventory()?;
        self.display =
            reconcile::build_display_list(Some(&items), &self.ledger, &self.default_source);
        self.status = reconcile::summarize_status(
            true,
            None,
            self.display.len(),
            self.ledger.pending_count(),
        );
        Ok(())
    }

    /// Immediate one-shot sync of a single pickup from the owning thread:
    /// has_item, then add_item only when absent.
    pub fn sync_item_now(&self, name: &str, description: &str, item_type: &str) -> SyncResult<()> {
        if name.is_empty() {
            return Err(SyncError::Validation {
                field: "name",
                message: "item name must not be empty".to_string(),
            });
        }
        if self.client.has_item(name)? {
            return Ok(());
        }
        self.client.add_item(&AddItemRequest {
            name: name.to_string(),
            description: description.to_string(),
            source: self.default_source.clone(),
            item_type: item_type.to_string(),
            nft_id: None,
            quantity: 1,
            stack: false,
        })?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn display(&self) -> &[InventoryItem] {
        &self.display
    }

    /// Grouped rows for one tab (`None` = everything). Pure; safe to call
    /// every tick.
    pub fn rows(&self, tab: Option<&str>) -> Vec<DisplayRow> {
        grouping::group_rows(&self.display, &self.ledger, &self.rules, tab)
    }

    pub fn status(&self) -> &SyncStatus {
        &self.status
    }

    pub fn pending_count(&self) -> usize {
        self.ledger.pending_count()
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }

    pub fn session(&self) -> Option<&AuthSession> {
        self.session.as_ref()
    }

    pub fn auth_in_progress(&self) -> bool {
        self.auth.in_progress()
    }

    pub fn refresh_in_progress(&self) -> bool {
        self.refresh.in_progress()
    }

    pub fn send_in_progress(&self) -> bool {
        self.send.in_progress()
    }

    pub fn use_in_progress(&self) -> bool {
        self.use_item.in_progress()
    }

    /// Bounded join of every worker; stragglers are detached so process
    /// exit never hangs on a stuck remote call.
    pub fn shutdown(&mut self, timeout: Duration) {
        self.auth.shutdown(timeout);
        self.refresh.shutdown(timeout);
        self.send.shutdown(timeout);
        self.use_item.shutdown(timeout);
    }
}
