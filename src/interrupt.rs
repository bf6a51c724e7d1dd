//! Top-level interrupt handling.
//!
//! SIGINT, SIGTERM and SIGHUP end the deployment with exit code 1. Children
//! started by `SystemRunner` are tracked in a global registry while they run;
//! on interrupt each one still registered gets SIGTERM before we exit.

use std::collections::HashSet;
use std::sync::{Mutex, OnceLock};

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use tracing::{debug, info, warn};

/// Exit status for failed or interrupted deployments.
pub const FAILURE_EXIT_CODE: i32 = 1;

static CHILD_REGISTRY: OnceLock<Mutex<ChildRegistry>> = OnceLock::new();

/// PIDs of child processes that are currently running.
#[derive(Debug, Default)]
pub struct ChildRegistry {
    pids: HashSet<u32>,
}

impl ChildRegistry {
    /// The process-wide registry used by `SystemRunner`.
    pub fn global() -> &'static Mutex<ChildRegistry> {
        CHILD_REGISTRY.get_or_init(|| Mutex::new(ChildRegistry::default()))
    }

    pub fn register(&mut self, pid: u32) {
        self.pids.insert(pid);
        debug!("Registered child process PID {}", pid);
    }

    pub fn unregister(&mut self, pid: u32) {
        self.pids.remove(&pid);
        debug!("Unregistered child process PID {}", pid);
    }

    pub fn contains(&self, pid: u32) -> bool {
        self.pids.contains(&pid)
    }

    pub fn count(&self) -> usize {
        self.pids.len()
    }

    /// Send SIGTERM to every tracked child and forget them.
    ///
    /// Returns how many children were signalled.
    pub fn terminate_all(&mut self) -> usize {
        let mut signalled = 0;
        for pid in self.pids.drain() {
            let Ok(raw) = i32::try_from(pid) else {
                warn!("PID {} out of range, not signalled", pid);
                continue;
            };
            match signal::kill(Pid::from_raw(raw), Signal::SIGTERM) {
                Ok(()) => signalled += 1,
                Err(e) => warn!("Failed to send SIGTERM to PID {}: {}", pid, e),
            }
        }
        signalled
    }
}

/// Track a running child in the global registry.
pub fn register_child(pid: u32) {
    if let Ok(mut registry) = ChildRegistry::global().lock() {
        registry.register(pid);
    }
}

/// Stop tracking a child once it has been waited on.
pub fn unregister_child(pid: u32) {
    if let Ok(mut registry) = ChildRegistry::global().lock() {
        registry.unregister(pid);
    }
}

/// Log the interrupt and terminate the children tracked in `registry`.
///
/// Returns the exit status the process should end with.
pub fn handle_interrupt(registry: &Mutex<ChildRegistry>) -> i32 {
    info!("Deployment interrupted by user.");
    match registry.lock() {
        Ok(mut registry) => {
            let signalled = registry.terminate_all();
            if signalled > 0 {
                info!("Terminated {} running command(s)", signalled);
            }
        }
        Err(_) => warn!("Child registry unavailable; running commands were not signalled"),
    }
    FAILURE_EXIT_CODE
}

/// Install the handler. Call once, before the first step runs.
pub fn init_signal_handlers() -> Result<(), ctrlc::Error> {
    ctrlc::set_handler(|| {
        std::process::exit(handle_interrupt(ChildRegistry::global()));
    })
}
