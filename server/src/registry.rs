//! Tracks every currently-connected client so the supervisor can cancel
//! them all during shutdown without guessing which threads are still
//! alive, and gates admission of new workers under the same mutex so
//! shutdown has a single, unambiguous sequencing point.

use std::collections::HashMap;
use std::net::TcpStream;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkerId(u64);

/// What the registry needs to cancel a worker from the outside: a clone
/// of its socket, shut down from this side to unblock a worker parked in
/// a blocking `read_line` the worker thread itself cannot interrupt, plus
/// a flag a worker mid-`f`-file-replay polls between lines (a file read
/// has no socket to shut down).
struct WorkerHandle {
    stream: TcpStream,
    cancelled: Arc<AtomicBool>,
}

/// Everything `register` and shutdown both need to touch atomically:
/// whether new workers are still being admitted, and the live worker map.
/// Keeping both behind one lock is what makes "set the flag under the
/// registry mutex so no worker can be inserted afterwards" true by
/// construction instead of by a racy post-hoc re-check.
struct RegistryState {
    admitting: bool,
    workers: HashMap<WorkerId, WorkerHandle>,
}

pub struct WorkerRegistry {
    next_id: AtomicU64,
    state: Mutex<RegistryState>,
}

impl WorkerRegistry {
    pub fn new() -> WorkerRegistry {
        WorkerRegistry {
            next_id: AtomicU64::new(0),
            state: Mutex::new(RegistryState {
                admitting: true,
                workers: HashMap::new(),
            }),
        }
    }

    pub fn is_admitting(&self) -> bool {
        self.state.lock().admitting
    }

    /// Registers a new worker's socket and returns its id plus the
    /// cancellation flag the worker should check between `f`-replayed
    /// lines — unless shutdown has already begun, in which case this
    /// returns `None` and the worker is never inserted at all. Admission
    /// and insertion happen under the same lock acquisition as
    /// `close_and_cancel_all`'s flag flip, so there is no window between
    /// a "may I register" check and the registration itself for a
    /// shutdown to slip through.
    pub fn register(&self, stream: TcpStream) -> Option<(WorkerId, Arc<AtomicBool>)> {
        let mut state = self.state.lock();
        if !state.admitting {
            return None;
        }
        let id = WorkerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let cancelled = Arc::new(AtomicBool::new(false));
        state.workers.insert(
            id,
            WorkerHandle {
                stream,
                cancelled: Arc::clone(&cancelled),
            },
        );
        Some((id, cancelled))
    }

    pub fn deregister(&self, id: WorkerId) {
        self.state.lock().workers.remove(&id);
    }

    pub fn len(&self) -> usize {
        self.state.lock().workers.len()
    }

    /// Stops admitting new workers and shuts down every currently
    /// registered socket in both directions, raising every cancellation
    /// flag, all under one critical section — the single sequencing
    /// point for shutdown. Idempotent: a worker that has already exited
    /// and deregistered itself is simply absent from the map by the time
    /// this runs, and calling it twice just re-closes an already-closed
    /// flag.
    pub fn close_and_cancel_all(&self) {
        let mut state = self.state.lock();
        state.admitting = false;
        for handle in state.workers.values() {
            handle.cancelled.store(true, Ordering::Release);
            let _ = handle.stream.shutdown(std::net::Shutdown::Both);
        }
    }
}

impl Default for WorkerRegistry {
    fn default() -> Self {
        WorkerRegistry::new()
    }
}
