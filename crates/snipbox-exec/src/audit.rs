use tokio::io::AsyncWriteExt;

use crate::config::{AuditConfig, AuditDestination};

/// Longest command prefix recorded in an audit entry, in bytes.
const MAX_AUDIT_COMMAND_BYTES: usize = 512;

/// Appends one JSON record per evaluation to the configured
/// [`AuditDestination`].
#[derive(Debug)]
pub struct AuditLogger {
    sink: Sink,
}

#[derive(Debug)]
enum Sink {
    Tracing,
    File(tokio::sync::Mutex<tokio::fs::File>),
}

#[derive(Debug, serde::Serialize)]
pub struct AuditEntry {
    pub timestamp: String,
    pub command: String,
    pub result: AuditResult,
    pub duration_ms: u64,
}

#[derive(Debug, serde::Serialize)]
#[serde(tag = "type")]
pub enum AuditResult {
    #[serde(rename = "success")]
    Success,
    #[serde(rename = "failed")]
    Failed { failures: usize },
    #[serde(rename = "timeout")]
    Timeout,
    #[serde(rename = "error")]
    Error { message: String },
}

impl AuditEntry {
    /// Entry stamped with the current time. Long commands are cut at a
    /// character boundary.
    #[must_use]
    pub fn now(command: &str, result: AuditResult, duration_ms: u64) -> Self {
        let end = command.floor_char_boundary(MAX_AUDIT_COMMAND_BYTES);
        Self {
            timestamp: unix_now(),
            command: command[..end].to_owned(),
            result,
            duration_ms,
        }
    }
}

fn unix_now() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    format!("{secs}")
}

impl AuditLogger {
    /// Open the destination named by `config`. File destinations are created
    /// if missing and appended to.
    ///
    /// # Errors
    ///
    /// Returns an error if a file destination cannot be opened.
    pub async fn from_config(config: &AuditConfig) -> Result<Self, std::io::Error> {
        let sink = match &config.destination {
            AuditDestination::Stdout => Sink::Tracing,
            AuditDestination::File(path) => {
                let file = tokio::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .await?;
                Sink::File(tokio::sync::Mutex::new(file))
            }
        };
        Ok(Self { sink })
    }

    /// Record one entry. Write failures are logged and otherwise ignored so
    /// that auditing never fails an evaluation.
    pub async fn log(&self, entry: &AuditEntry) {
        match &self.sink {
            Sink::Tracing => match serde_json::to_string(entry) {
                Ok(json) => tracing::info!(target: "audit", "{json}"),
                Err(e) => tracing::error!("failed to encode audit entry: {e}"),
            },
            Sink::File(file) => {
                let mut line = match serde_json::to_vec(entry) {
                    Ok(line) => line,
                    Err(e) => {
                        tracing::error!("failed to encode audit entry: {e}");
                        return;
                    }
                };
                line.push(b'\n');
                let mut file = file.lock().await;
                if let Err(e) = file.write_all(&line).await {
                    tracing::error!("failed to write audit log: {e}");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(result: AuditResult) -> AuditEntry {
        AuditEntry {
            timestamp: "0".into(),
            command: "1+1".into(),
            result,
            duration_ms: 3,
        }
    }

    #[test]
    fn success_serialization() {
        let json = serde_json::to_string(&entry(AuditResult::Success)).unwrap();
        assert!(json.contains("\"type\":\"success\""));
        assert!(json.contains("\"command\":\"1+1\""));
        assert!(json.contains("\"duration_ms\":3"));
    }

    #[test]
    fn failed_serialization() {
        let json = serde_json::to_string(&entry(AuditResult::Failed { failures: 2 })).unwrap();
        assert!(json.contains("\"type\":\"failed\""));
        assert!(json.contains("\"failures\":2"));
    }

    #[test]
    fn timeout_and_error_serialization() {
        let json = serde_json::to_string(&entry(AuditResult::Timeout)).unwrap();
        assert!(json.contains("\"type\":\"timeout\""));
        let json = serde_json::to_string(&entry(AuditResult::Error {
            message: "engine panicked".into(),
        }))
        .unwrap();
        assert!(json.contains("\"type\":\"error\""));
        assert!(json.contains("engine panicked"));
    }

    #[test]
    fn long_command_cut_on_char_boundary() {
        let command = "✓".repeat(400);
        let entry = AuditEntry::now(&command, AuditResult::Success, 0);
        assert!(entry.command.len() <= MAX_AUDIT_COMMAND_BYTES);
        assert!(entry.command.chars().all(|c| c == '✓'));
    }

    #[tokio::test]
    async fn logger_stdout() {
        let config = AuditConfig {
            enabled: true,
            destination: AuditDestination::Stdout,
        };
        let logger = AuditLogger::from_config(&config).await.unwrap();
        logger.log(&entry(AuditResult::Success)).await;
    }

    #[tokio::test]
    async fn logger_file_appends_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        let config = AuditConfig {
            enabled: true,
            destination: AuditDestination::File(path.clone()),
        };
        let logger = AuditLogger::from_config(&config).await.unwrap();
        for _ in 0..3 {
            logger.log(&entry(AuditResult::Timeout)).await;
        }

        let content = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(content.lines().count(), 3);
        assert!(content.contains("\"type\":\"timeout\""));
    }

    #[tokio::test]
    async fn logger_unwritable_destination_fails() {
        let config = AuditConfig {
            enabled: true,
            destination: "/nonexistent/dir/audit.jsonl".into(),
        };
        assert!(AuditLogger::from_config(&config).await.is_err());
    }
}
