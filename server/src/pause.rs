//! The pause barrier workers check between commands, and the operator
//! console drives with `s` (stop/pause) and `g` (go/release).

use parking_lot::{Condvar, Mutex};

pub struct PauseBarrier {
    stopped: Mutex<bool>,
    condvar: Condvar,
}

impl PauseBarrier {
    pub fn new() -> PauseBarrier {
        PauseBarrier {
            stopped: Mutex::new(false),
            condvar: Condvar::new(),
        }
    }

    /// Blocks the calling worker while the barrier is in its paused state.
    /// Called between commands, never mid-command, so a paused worker
    /// never holds a store lock while it waits.
    pub fn wait(&self) {
        let mut stopped = self.stopped.lock();
        while *stopped {
            self.condvar.wait(&mut stopped);
        }
    }

    /// Puts the barrier into its paused state (`s`).
    pub fn stop(&self) {
        *self.stopped.lock() = true;
    }

    /// Releases every worker currently blocked in `wait` (`g`).
    pub fn release(&self) {
        *self.stopped.lock() = false;
        self.condvar.notify_all();
    }
}

impl Default for PauseBarrier {
    fn default() -> Self {
        PauseBarrier::new()
    }
}
