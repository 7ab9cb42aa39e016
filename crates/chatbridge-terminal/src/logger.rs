use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use serde_json::json;

/// Per-session transcript logger.
///
/// Appends one JSON record per line for every byte run written to or read
/// from the PTY. Logging failures are swallowed by callers so a full disk
/// can never take the session down with it.
pub struct SessionLogger {
    session_name: String,
    log_file: File,
}

impl SessionLogger {
    pub fn new(log_dir: &Path, session_name: &str) -> Result<Self> {
        std::fs::create_dir_all(log_dir).context("Failed to create log directory")?;

        let log_path = log_dir.join(format!("session-{}.jsonl", session_name));
        let log_file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .with_context(|| format!("Failed to open transcript log {}", log_path.display()))?;

        Ok(Self {
            session_name: session_name.to_string(),
            log_file,
        })
    }

    /// Log input written to the PTY
    pub fn log_input(&mut self, data: &str) -> Result<()> {
        self.log_event("in", data)
    }

    /// Log output read from the PTY
    pub fn log_output(&mut self, data: &str) -> Result<()> {
        self.log_event("out", data)
    }

    fn log_event(&mut self, direction: &str, data: &str) -> Result<()> {
        let entry = json!({
            "timestamp": Utc::now().to_rfc3339(),
            "session": self.session_name,
            "direction": direction,
            "data": data,
        });

        writeln!(self.log_file, "{}", entry).context("Failed to write transcript record")?;
        self.log_file.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_well_formed_jsonl_records() {
        let dir = tempfile::tempdir().unwrap();
        let mut logger = SessionLogger::new(dir.path(), "test").unwrap();
        logger.log_input("git status\r\n").unwrap();
        logger.log_output("On branch main\n").unwrap();

        let contents = std::fs::read_to_string(dir.path().join("session-test.jsonl")).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["direction"], "in");
        assert_eq!(first["data"], "git status\r\n");
        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["direction"], "out");
        assert_eq!(second["session"], "test");
    }
}
