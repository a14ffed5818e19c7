use crate::error::{SyncError, SyncResult};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Completion callback, invoked on the owning thread from `pump()` with
/// ownership of the job result.
pub type OnDone<R> = Box<dyn FnOnce(R)>;

struct Slot<R> {
    in_progress: bool,
    result: Option<R>,
}

/// A reusable single-flight async unit: runs one blocking operation on a
/// worker thread and reports completion exactly once.
///
/// One instance exists per operation kind. `start` while busy is refused,
/// so a slot holds at most one queued result and at most one live worker.
/// All cross-thread state sits behind a single mutex; callbacks are only
/// touched on the owning thread.
pub struct JobSlot<R> {
    name: &'static str,
    shared: Arc<Mutex<Slot<R>>>,
    worker: Option<thread::JoinHandle<()>>,
    on_done: Option<OnDone<R>>,
}

/// Clears the busy flag if the worker unwinds before storing a result, so a
/// panicking job cannot wedge the slot.
struct BusyGuard<R> {
    shared: Arc<Mutex<Slot<R>>>,
    armed: bool,
}

impl<R> Drop for BusyGuard<R> {
    fn drop(&mut self) {
        if self.armed {
            self.shared.lock().in_progress = false;
        }
    }
}

impl<R: Send + 'static> JobSlot<R> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            shared: Arc::new(Mutex::new(Slot {
                in_progress: false,
                result: None,
            })),
            worker: None,
            on_done: None,
        }
    }

    /// Spawns a worker running `job`. Refused with `AlreadyInProgress` while
    /// a previous job of this kind is still running; the caller retries or
    /// disables the triggering action while busy.
    ///
    /// Arguments travel inside the `job` closure, so the worker never
    /// borrows caller storage. Any stale result from an un-pumped previous
    /// run is discarded.
    pub fn start<F>(&mut self, job: F, on_done: Option<OnDone<R>>) -> SyncResult<()>
    where
        F: FnOnce() -> R + Send + 'static,
    {
        {
            let mut slot = self.shared.lock();
            if slot.in_progress {
                tracing::debug!(slot = self.name, "start refused: job in progress");
                return Err(SyncError::AlreadyInProgress);
            }
            slot.in_progress = true;
            slot.result = None;
        }

        // in_progress was false, so a previous worker has already run to
        // completion; joining here only reaps the finished thread.
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }

        self.on_done = on_done;
        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name(format!("{}-job", self.name))
            .spawn(move || {
                let mut guard = BusyGuard {
                    shared: Arc::clone(&shared),
                    armed: true,
                };
                let result = job();
                let mut slot = shared.lock();
                slot.result = Some(result);
                slot.in_progress = false;
                guard.armed = false;
            });

        match spawned {
            Ok(handle) => {
                self.worker = Some(handle);
                Ok(())
            }
            Err(e) => {
                self.shared.lock().in_progress = false;
                self.on_done = None;
                Err(SyncError::Io(e))
            }
        }
    }

    /// Called once per tick by the owner. If a result is waiting and a
    /// callback is registered, both are moved out and the callback runs with
    /// the lock released. Returns true when a callback was dispatched.
    pub fn pump(&mut self) -> bool {
        if self.on_done.is_none() {
            return false;
        }
        let Some(result) = self.take_result() else {
            return false;
        };
        let on_done = self.on_done.take().expect("checked above");
        on_done(result);
        true
    }

    /// Polling accessor: moves the result out if the job has finished.
    /// Returns `None` while the worker is still running (a result is never
    /// observable before `in_progress` clears).
    pub fn take_result(&mut self) -> Option<R> {
        let mut slot = self.shared.lock();
        if slot.in_progress {
            return None;
        }
        slot.result.take()
    }

    pub fn in_progress(&self) -> bool {
        self.shared.lock().in_progress
    }

    pub fn has_result(&self) -> bool {
        let slot = self.shared.lock();
        !slot.in_progress && slot.result.is_some()
    }

    /// Bounded join at shutdown. A worker that outlives the deadline is
    /// detached with a warning rather than hanging process exit.
    pub fn shutdown(&mut self, timeout: Duration) {
        let Some(handle) = self.worker.take() else {
            return;
        };
        let deadline = Instant::now() + timeout;
        while !handle.is_finished() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        if handle.is_finished() {
            let _ = handle.join();
        } else {
            tracing::warn!(slot = self.name, "worker still running at shutdown; detaching");
        }
    }
}
