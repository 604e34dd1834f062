//! Process-wide instance directory: a small discovery record so a co-located supervisor
//! (or the demo host's own `/healthz`) can see which instances of this service are alive without a
//! separate service-discovery dependency, with garbage collection of entries whose PID no longer
//! exists.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, PartialEq)]
pub struct InstanceRecord {
    pub process_id: u32,
    pub server_host: String,
    pub server_port: u16,
    pub shared_state_name: String,
    /// Seconds since the Unix epoch.
    pub start_time: u64,
}

struct Directory {
    entries: Mutex<HashMap<u32, InstanceRecord>>,
}

fn directory() -> &'static Directory {
    static DIRECTORY: OnceLock<Directory> = OnceLock::new();
    DIRECTORY.get_or_init(|| Directory {
        entries: Mutex::new(HashMap::new()),
    })
}

/// Returns whether a process with the given PID currently exists, by probing `/proc/<pid>` on
/// Linux. Platforms without `/proc` treat every PID as alive (no GC possible, never incorrectly
/// evicts a live entry).
#[cfg(target_os = "linux")]
fn process_is_alive(pid: u32) -> bool {
    std::path::Path::new(&format!("/proc/{pid}")).exists()
}

#[cfg(not(target_os = "linux"))]
fn process_is_alive(_pid: u32) -> bool {
    true
}

fn now_epoch_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Register (or replace) this process's own entry.
pub fn register(process_id: u32, server_host: impl Into<String>, server_port: u16, shared_state_name: impl Into<String>) {
    let mut entries = directory().entries.lock().unwrap();
    entries.insert(
        process_id,
        InstanceRecord {
            process_id,
            server_host: server_host.into(),
            server_port,
            shared_state_name: shared_state_name.into(),
            start_time: now_epoch_seconds(),
        },
    );
}

pub fn unregister(pid: u32) {
    directory().entries.lock().unwrap().remove(&pid);
}

/// Drop any entries whose PID no longer corresponds to a live process, then return the surviving
/// set. Called lazily on read rather than via a background timer, keeping this module free of any
/// scheduling dependency.
pub fn live_instances() -> Vec<InstanceRecord> {
    let mut entries = directory().entries.lock().unwrap();
    entries.retain(|&pid, _| process_is_alive(pid));
    entries.values().cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_then_list_finds_the_entry() {
        let pid = std::process::id();
        register(pid, "127.0.0.1", 9900, "sstv-demo");
        let instances = live_instances();
        let record = instances.iter().find(|r| r.process_id == pid).unwrap();
        assert_eq!(record.server_port, 9900);
        assert_eq!(record.shared_state_name, "sstv-demo");
        assert!(record.start_time > 0);
        unregister(pid);
    }

    #[test]
    fn stale_pid_is_garbage_collected() {
        // PID 1 is typically init/systemd and always alive under Linux containers, so use an
        // implausibly large PID instead to exercise the GC path portably.
        let stale_pid = u32::MAX - 1;
        register(stale_pid, "0.0.0.0", 0, "sstv-demo");
        let instances = live_instances();
        assert!(!instances.iter().any(|r| r.process_id == stale_pid));
    }
}
