//! Full process-tree teardown.
//!
//! Agents routinely spawn their own subprocesses (shells, builds, git); a
//! stop must take the whole descendant tree down with the root so nothing
//! is orphaned. Teardown is two-phase: graceful terminate, settle, then
//! force-kill survivors.

use std::collections::HashMap;

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use tracing::debug;

/// Enumerate every transitive descendant of `root` by walking the ppid
/// links in /proc. The snapshot is best-effort: processes racing us into
/// or out of existence are handled by the signal phase treating ESRCH as
/// success.
pub fn descendants(root: u32) -> Vec<u32> {
    let mut children: HashMap<u32, Vec<u32>> = HashMap::new();
    if let Ok(entries) = std::fs::read_dir("/proc") {
        for entry in entries.flatten() {
            let Some(pid) = entry.file_name().to_str().and_then(|s| s.parse::<u32>().ok()) else {
                continue;
            };
            let Ok(stat) = std::fs::read_to_string(format!("/proc/{pid}/stat")) else {
                continue;
            };
            if let Some(ppid) = parse_ppid(&stat) {
                children.entry(ppid).or_default().push(pid);
            }
        }
    }

    let mut result = Vec::new();
    let mut stack = vec![root];
    while let Some(pid) = stack.pop() {
        if let Some(kids) = children.get(&pid) {
            for &kid in kids {
                result.push(kid);
                stack.push(kid);
            }
        }
    }
    result
}

/// Parse the parent pid out of a /proc/<pid>/stat line. The comm field is
/// parenthesized and may itself contain spaces or parentheses, so scan from
/// the last closing paren.
fn parse_ppid(stat: &str) -> Option<u32> {
    let (_, rest) = stat.rsplit_once(')')?;
    rest.split_whitespace().nth(1)?.parse().ok()
}

/// Send `signal` to the root and every descendant; returns the signaled
/// set so survivors can be force-killed later. "No such process" is
/// success: the target is already gone.
pub fn signal_tree(root: u32, signal: Signal) -> Vec<u32> {
    let mut targets = descendants(root);
    targets.push(root);
    debug!(root, count = targets.len(), ?signal, "signaling process tree");
    for &pid in &targets {
        let _ = kill(Pid::from_raw(pid as i32), signal);
    }
    targets
}

/// SIGKILL anything in `pids` that survived the graceful phase
pub fn force_kill_survivors(pids: &[u32]) {
    for &pid in pids {
        let pid = Pid::from_raw(pid as i32);
        // Signal 0 probes existence without delivering anything
        if kill(pid, None).is_ok() {
            debug!(pid = pid.as_raw(), "force-killing survivor");
            let _ = kill(pid, Signal::SIGKILL);
        }
    }
}
