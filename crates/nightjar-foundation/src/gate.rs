use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};

/// Outcome of a blocking wait on the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateStatus {
    /// The gate is open; the caller may dispatch work.
    Open,
    /// The gate was cancelled (shutdown); the caller must exit its loop.
    Cancelled,
}

struct GateFlags {
    open: bool,
    cancelled: bool,
}

/// The only synchronization primitives shared between the supervisor and the
/// worker: a `may_do_work` flag with a blocking, condvar-based wait, and an
/// `is_done_analyzing` flag.
///
/// `is_done_analyzing` is clear while a file is being analyzed and set
/// between dispatches; the supervisor uses it to serialize cleanup with
/// in-flight analysis. A gate is created per worker session and replaced on
/// every start; `cancel` wakes all waiters permanently.
pub struct WorkGate {
    flags: Mutex<GateFlags>,
    cond: Condvar,
    done_analyzing: AtomicBool,
}

impl Default for WorkGate {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkGate {
    /// A new gate starts closed; `start()` opens it once the worker is up.
    pub fn new() -> Self {
        Self {
            flags: Mutex::new(GateFlags {
                open: false,
                cancelled: false,
            }),
            cond: Condvar::new(),
            done_analyzing: AtomicBool::new(true),
        }
    }

    pub fn open(&self) {
        let mut flags = self.flags.lock();
        flags.open = true;
        self.cond.notify_all();
    }

    pub fn close(&self) {
        self.flags.lock().open = false;
    }

    pub fn is_open(&self) -> bool {
        self.flags.lock().open
    }

    /// Permanently wake all waiters; used by `stop()` so a paused worker does
    /// not block forever on a gate that will never reopen.
    pub fn cancel(&self) {
        let mut flags = self.flags.lock();
        flags.cancelled = true;
        self.cond.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        self.flags.lock().cancelled
    }

    /// Block until the gate opens or is cancelled. Cooperative and
    /// indefinite: a paused watcher holds its worker here until resumed or
    /// stopped.
    pub fn wait_open(&self) -> GateStatus {
        let mut flags = self.flags.lock();
        loop {
            if flags.cancelled {
                return GateStatus::Cancelled;
            }
            if flags.open {
                return GateStatus::Open;
            }
            self.cond.wait(&mut flags);
        }
    }

    pub fn set_done_analyzing(&self, done: bool) {
        self.done_analyzing.store(done, Ordering::SeqCst);
    }

    pub fn is_done_analyzing(&self) -> bool {
        self.done_analyzing.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn open_gate_admits_immediately() {
        let gate = WorkGate::new();
        gate.open();
        assert_eq!(gate.wait_open(), GateStatus::Open);
    }

    #[test]
    fn closed_gate_blocks_until_opened() {
        let gate = Arc::new(WorkGate::new());
        let waiter = {
            let gate = gate.clone();
            std::thread::spawn(move || gate.wait_open())
        };
        std::thread::sleep(Duration::from_millis(50));
        assert!(!waiter.is_finished());
        gate.open();
        assert_eq!(waiter.join().unwrap(), GateStatus::Open);
    }

    #[test]
    fn cancel_wakes_blocked_waiter() {
        let gate = Arc::new(WorkGate::new());
        let waiter = {
            let gate = gate.clone();
            std::thread::spawn(move || gate.wait_open())
        };
        std::thread::sleep(Duration::from_millis(50));
        gate.cancel();
        assert_eq!(waiter.join().unwrap(), GateStatus::Cancelled);
    }

    #[test]
    fn cancelled_gate_stays_cancelled() {
        let gate = WorkGate::new();
        gate.cancel();
        gate.open();
        assert_eq!(gate.wait_open(), GateStatus::Cancelled);
    }

    #[test]
    fn done_analyzing_defaults_set() {
        let gate = WorkGate::new();
        assert!(gate.is_done_analyzing());
        gate.set_done_analyzing(false);
        assert!(!gate.is_done_analyzing());
    }
}
