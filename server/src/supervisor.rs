//! Process-wide lifecycle state: how many worker threads are still
//! running, and the signal thread that turns Ctrl-C into a shutdown call.
//! Admission itself is gated by [`crate::registry::WorkerRegistry`] (see
//! its module docs) since the registry mutex is the single sequencing
//! point for shutdown; the supervisor only tracks the worker-count drain
//! and the signal thread on top of that.

use parking_lot::{Condvar, Mutex};
use signal_hook::consts::SIGINT;
use signal_hook::iterator::{Handle, Signals};

use crate::registry::WorkerRegistry;

/// Tracks how many worker threads are alive so shutdown can block until
/// the last one has exited.
struct WorkerCount {
    count: Mutex<usize>,
    drained: Condvar,
}

impl WorkerCount {
    fn new() -> WorkerCount {
        WorkerCount {
            count: Mutex::new(0),
            drained: Condvar::new(),
        }
    }

    fn increment(&self) {
        *self.count.lock() += 1;
    }

    fn decrement(&self) {
        let mut count = self.count.lock();
        *count -= 1;
        if *count == 0 {
            self.drained.notify_all();
        }
    }

    fn wait_for_drain(&self) {
        let mut count = self.count.lock();
        while *count != 0 {
            self.drained.wait(&mut count);
        }
    }
}

pub struct Supervisor {
    workers: WorkerCount,
}

/// RAII registration for a single worker thread: increments the live
/// count on construction, decrements it on drop so a worker that panics
/// mid-command still gets counted out. Installed as the very first thing
/// a worker thread does after it is spawned.
pub struct WorkerGuard<'a> {
    supervisor: &'a Supervisor,
}

impl Drop for WorkerGuard<'_> {
    fn drop(&mut self) {
        self.supervisor.workers.decrement();
    }
}

impl Supervisor {
    pub fn new() -> Supervisor {
        Supervisor {
            workers: WorkerCount::new(),
        }
    }

    /// Registers a new worker and returns the guard that keeps it counted
    /// until it exits by any path, including panic.
    pub fn admit(&self) -> WorkerGuard<'_> {
        self.workers.increment();
        WorkerGuard { supervisor: self }
    }

    /// Stops admitting new clients, cancels every connected worker, and
    /// blocks until the last one has exited. Callers still need to tear
    /// down the signal thread, clean up the store, and stop the listener
    /// themselves, in that order, once this returns.
    pub fn shutdown(&self, registry: &WorkerRegistry) {
        registry.close_and_cancel_all();
        self.workers.wait_for_drain();
    }
}

impl Default for Supervisor {
    fn default() -> Self {
        Supervisor::new()
    }
}

/// Spawns the dedicated thread that turns a process Ctrl-C into a regular
/// function call, so the rest of the server never has to run inside a
/// signal handler. Returns a `Handle` the caller uses to tear the thread
/// down again during shutdown.
pub fn spawn_signal_thread(on_interrupt: impl Fn() + Send + 'static) -> std::io::Result<Handle> {
    let mut signals = Signals::new([SIGINT])?;
    let handle = signals.handle();
    std::thread::spawn(move || {
        for signal in &mut signals {
            if signal == SIGINT {
                on_interrupt();
            }
        }
    });
    Ok(handle)
}
