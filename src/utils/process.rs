use sysinfo::{Pid, ProcessesToUpdate, Signal, System};

/// Snapshot of the process table, used to signal a supervised process and
/// find the processes it spawned.
pub struct ProcessTable {
    system: System,
}

impl ProcessTable {
    pub fn snapshot() -> Self {
        let mut system = System::new();
        system.refresh_processes(ProcessesToUpdate::All, true);
        Self { system }
    }

    /// Refreshes only `pid`; enough to signal a single process.
    pub fn of(pid: u32) -> Self {
        let mut system = System::new();
        system.refresh_processes(ProcessesToUpdate::Some(&[Pid::from_u32(pid)]), true);
        Self { system }
    }

    pub fn contains(&self, pid: u32) -> bool {
        self.system.process(Pid::from_u32(pid)).is_some()
    }

    /// All descendants of `pid`, children before grandchildren.
    pub fn descendants(&self, pid: u32) -> Vec<u32> {
        let mut found = Vec::new();
        let mut frontier = vec![Pid::from_u32(pid)];

        while let Some(parent) = frontier.pop() {
            for (child_pid, process) in self.system.processes() {
                if process.parent() == Some(parent) && !found.contains(&child_pid.as_u32()) {
                    found.push(child_pid.as_u32());
                    frontier.push(*child_pid);
                }
            }
        }

        found
    }

    /// Sends SIGTERM. Returns false if the process is gone or the platform
    /// has no graceful signal, in which case the caller must kill it.
    pub fn terminate(&self, pid: u32) -> bool {
        match self.system.process(Pid::from_u32(pid)) {
            Some(process) => process.kill_with(Signal::Term).unwrap_or(false),
            None => false,
        }
    }

    pub fn kill(&self, pid: u32) -> bool {
        match self.system.process(Pid::from_u32(pid)) {
            Some(process) => process.kill(),
            None => false,
        }
    }

    /// Kills every descendant of `pid`, deepest last-found first.
    pub fn kill_descendants(&self, pid: u32) -> usize {
        let mut killed = 0;
        for child in self.descendants(pid).into_iter().rev() {
            if self.kill(child) {
                tracing::debug!("Killed child process {} of {}", child, pid);
                killed += 1;
            }
        }
        killed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_contains_current_process() {
        let table = ProcessTable::snapshot();
        assert!(table.contains(std::process::id()));
    }

    #[cfg(unix)]
    #[test]
    fn test_single_process_table() {
        let table = ProcessTable::of(std::process::id());
        assert!(table.contains(std::process::id()));
        assert!(!table.contains(std::os::unix::process::parent_id()));
    }

    #[cfg(unix)]
    #[test]
    fn test_descendants_and_terminate() {
        let mut child = std::process::Command::new("sleep")
            .arg("30")
            .spawn()
            .unwrap();

        let table = ProcessTable::snapshot();
        assert!(table.descendants(std::process::id()).contains(&child.id()));

        assert!(ProcessTable::of(child.id()).terminate(child.id()));
        let status = child.wait().unwrap();
        assert!(!status.success());
    }
}
