//! Raw stream source: the pseudo-terminal pair, the child process and the
//! dedicated reader thread feeding the classifier.

use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result};
use portable_pty::{native_pty_system, Child, CommandBuilder, MasterPty, PtySize};
use tracing::{debug, warn};

use crate::classifier::{OutputClassifier, SessionState};
use crate::logger::SessionLogger;
use crate::{READ_BUFFER_SIZE, READ_ERROR_BUDGET};

/// One live pseudo-terminal session: PTY pair, child handle, writer and
/// reader thread. Dropping this closes both terminal ends; it never kills
/// the child by itself; teardown is owned by the session manager.
pub(crate) struct PtySession {
    child: Box<dyn Child + Send + Sync>,
    master: Box<dyn MasterPty + Send>,
    writer: Box<dyn Write + Send>,
    root_pid: Option<u32>,
    reader_thread: Option<JoinHandle<()>>,
    stop_flag: Arc<AtomicBool>,
}

impl PtySession {
    /// Allocate a PTY with fixed geometry and spawn the command bound to it
    /// as its own session leader.
    pub fn spawn(command: &[String], cols: u16, rows: u16) -> Result<Self> {
        let program = command.first().context("empty spawn command")?;

        let pty_system = native_pty_system();
        let pair = pty_system
            .openpty(PtySize {
                rows,
                cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| anyhow::anyhow!("failed to open PTY: {e}"))?;

        let mut cmd = CommandBuilder::new(program);
        cmd.args(&command[1..]);
        // CommandBuilder starts from an empty env; inherit ours, then pin the
        // terminal identity and geometry for deterministic rendering
        for (key, value) in std::env::vars() {
            cmd.env(key, value);
        }
        cmd.env("TERM", "xterm-256color");
        cmd.env("COLUMNS", cols.to_string());
        cmd.env("LINES", rows.to_string());

        let child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| anyhow::anyhow!("failed to spawn '{program}': {e}"))?;
        // Drop the slave end so the master observes EOF when the child exits
        drop(pair.slave);

        let writer = pair
            .master
            .take_writer()
            .map_err(|e| anyhow::anyhow!("failed to take PTY writer: {e}"))?;
        let root_pid = child.process_id();

        Ok(Self {
            child,
            master: pair.master,
            writer,
            root_pid,
            reader_thread: None,
            stop_flag: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Start the reader thread. One per session; it hands decoded text to
    /// the classifier and flips the shared state to Dead on EOF.
    pub fn start_reader(
        &mut self,
        classifier: OutputClassifier,
        logger: Option<Arc<Mutex<SessionLogger>>>,
    ) -> Result<()> {
        let reader = self
            .master
            .try_clone_reader()
            .map_err(|e| anyhow::anyhow!("failed to clone PTY reader: {e}"))?;
        let stop_flag = Arc::clone(&self.stop_flag);

        let handle = thread::Builder::new()
            .name("pty-reader".to_string())
            .spawn(move || read_loop(reader, classifier, stop_flag, logger))
            .context("failed to spawn reader thread")?;
        self.reader_thread = Some(handle);
        Ok(())
    }

    pub fn write_bytes(&mut self, data: &[u8]) -> std::io::Result<()> {
        self.writer.write_all(data)?;
        self.writer.flush()
    }

    /// Non-blocking liveness probe; Some(..) once the child has exited
    pub fn try_wait(&mut self) -> Option<portable_pty::ExitStatus> {
        self.child.try_wait().ok().flatten()
    }

    pub fn root_pid(&self) -> Option<u32> {
        self.root_pid
    }

    /// Ask the reader thread to wind down at its next iteration
    pub fn signal_stop(&self) {
        self.stop_flag.store(true, Ordering::Relaxed);
    }

    pub fn reader_finished(&self) -> bool {
        self.reader_thread
            .as_ref()
            .map(|h| h.is_finished())
            .unwrap_or(true)
    }

    /// Join the reader thread if it already finished, otherwise abandon the
    /// handle; the thread exits on its own once the master closes.
    pub fn reap_reader(&mut self) {
        if let Some(handle) = self.reader_thread.take() {
            if handle.is_finished() {
                let _ = handle.join();
            }
        }
    }

    #[cfg(not(unix))]
    pub fn kill_child(&mut self) -> std::io::Result<()> {
        self.child.kill()
    }
}

/// Reader loop: blocking reads up to 4 KB, permissive UTF-8 decode, hand-off
/// to the classifier. A zero-length read means the child's end closed; up to
/// READ_ERROR_BUDGET transient errors are tolerated before the thread gives
/// up. Exiting the loop never closes descriptors or signals the child.
fn read_loop(
    mut reader: Box<dyn Read + Send>,
    classifier: OutputClassifier,
    stop_flag: Arc<AtomicBool>,
    logger: Option<Arc<Mutex<SessionLogger>>>,
) {
    debug!("reader thread started");
    let shared = classifier.shared();
    let mut buf = vec![0u8; READ_BUFFER_SIZE];
    let mut error_count: u32 = 0;

    loop {
        if stop_flag.load(Ordering::Relaxed) {
            break;
        }

        match reader.read(&mut buf) {
            Ok(0) => {
                debug!("EOF on PTY master, child exited");
                mark_dead(&shared);
                break;
            }
            Ok(n) => {
                error_count = 0;
                let text = String::from_utf8_lossy(&buf[..n]).to_string();
                if let Some(ref logger) = logger {
                    if let Ok(mut logger) = logger.lock() {
                        let _ = logger.log_output(&text);
                    }
                }
                classifier.classify(&text);
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                thread::sleep(Duration::from_millis(50));
            }
            Err(e) => {
                error_count += 1;
                if error_count > READ_ERROR_BUDGET {
                    warn!(error = %e, "reader giving up after repeated errors");
                    mark_dead(&shared);
                    break;
                }
                thread::sleep(Duration::from_millis(100));
            }
        }
    }
    debug!("reader thread stopped");
}

fn mark_dead(shared: &Arc<Mutex<crate::classifier::SessionShared>>) {
    let mut shared = shared.lock().unwrap();
    // During an explicit stop the manager owns the transition to Idle
    if shared.state != SessionState::Stopping && shared.state != SessionState::Idle {
        shared.state = SessionState::Dead;
    }
}
