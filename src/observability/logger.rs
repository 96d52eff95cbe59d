//! Error Pattern Logger
//!
//! Best-effort side channel recording classification outcomes. Gated by the
//! debug flag; never returns an error and never panics.

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::execution_loop::error_classifier::{ErrorKind, RawError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::{debug, warn};

/// Caller-supplied context, forwarded only to the log
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ErrorContext {
    pub fn new(component: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            component: Some(component.into()),
            action: Some(action.into()),
            ..Self::default()
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

/// One recorded classification outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPatternEntry {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<ErrorContext>,
    pub timestamp: DateTime<Utc>,
}

/// Error pattern logger
pub struct ErrorPatternLogger {
    enabled: bool,
    log_file: Option<PathBuf>,
    recent: Mutex<VecDeque<ErrorPatternEntry>>,
    max_in_memory: usize,
}

impl ErrorPatternLogger {
    pub fn new(enabled: bool, log_file: Option<PathBuf>, max_in_memory: usize) -> Self {
        Self {
            enabled,
            log_file,
            recent: Mutex::new(VecDeque::new()),
            max_in_memory,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(
            config.debug_logging,
            config.pattern_log_path.clone(),
            config.max_recent_patterns,
        )
    }

    pub fn disabled() -> Self {
        Self::new(false, None, 0)
    }

    /// Record an error pattern. Fire-and-forget: sink failures are only
    /// reported through `tracing`.
    pub async fn log_pattern(&self, kind: ErrorKind, error: &RawError, context: Option<&ErrorContext>) {
        if !self.enabled {
            return;
        }

        let entry = ErrorPatternEntry {
            kind,
            message: error.message().to_string(),
            context: context.cloned(),
            timestamp: Utc::now(),
        };

        debug!(
            target: "sql_recovery::pattern",
            kind = %entry.kind,
            component = entry.context.as_ref().and_then(|c| c.component.as_deref()).unwrap_or("-"),
            action = entry.context.as_ref().and_then(|c| c.action.as_deref()).unwrap_or("-"),
            "[Error Pattern] {}",
            entry.message
        );

        if self.log_file.is_some() {
            if let Err(e) = self.write_entry(&entry) {
                warn!("Failed to write error pattern log: {}", e);
            }
        }

        self.remember(entry);
    }

    /// Most recent entries first
    pub fn recent_patterns(&self, limit: usize) -> Vec<ErrorPatternEntry> {
        match self.recent.lock() {
            Ok(recent) => recent.iter().rev().take(limit).cloned().collect(),
            Err(poisoned) => poisoned
                .into_inner()
                .iter()
                .rev()
                .take(limit)
                .cloned()
                .collect(),
        }
    }

    fn remember(&self, entry: ErrorPatternEntry) {
        if self.max_in_memory == 0 {
            return;
        }
        let mut recent = match self.recent.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        recent.push_back(entry);
        while recent.len() > self.max_in_memory {
            recent.pop_front();
        }
    }

    fn write_entry(&self, entry: &ErrorPatternEntry) -> Result<()> {
        if let Some(ref log_file) = self.log_file {
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(log_file)
                .map_err(|e| EngineError::Log(format!("Failed to open {}: {}", log_file.display(), e)))?;

            let json = serde_json::to_string(entry)?;
            writeln!(file, "{}", json)?;
        }

        Ok(())
    }
}

impl Default for ErrorPatternLogger {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("{}-{}.jsonl", name, uuid::Uuid::new_v4()))
    }

    #[tokio::test]
    async fn test_disabled_logger_is_noop() {
        let logger = ErrorPatternLogger::disabled();
        logger
            .log_pattern(ErrorKind::Unknown, &RawError::from("boom"), None)
            .await;
        assert!(logger.recent_patterns(10).is_empty());
    }

    #[tokio::test]
    async fn test_records_entry_with_context() {
        let logger = ErrorPatternLogger::new(true, None, 10);
        let context = ErrorContext::new("ask_database", "execute_sql").with_user("u-17");
        logger
            .log_pattern(
                ErrorKind::ColumnNotExists,
                &RawError::from(r#"column "qty" does not exist"#),
                Some(&context),
            )
            .await;

        let recent = logger.recent_patterns(10);
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].kind, ErrorKind::ColumnNotExists);
        assert_eq!(recent[0].context.as_ref().unwrap().user_id.as_deref(), Some("u-17"));
    }

    #[tokio::test]
    async fn test_in_memory_ring_is_bounded() {
        let logger = ErrorPatternLogger::new(true, None, 2);
        for message in ["first", "second", "third"] {
            logger
                .log_pattern(ErrorKind::Unknown, &RawError::from(message), None)
                .await;
        }
        let recent = logger.recent_patterns(10);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].message, "third");
        assert_eq!(recent[1].message, "second");
    }

    #[tokio::test]
    async fn test_writes_json_lines() {
        let path = scratch_path("error-patterns");
        let logger = ErrorPatternLogger::new(true, Some(path.clone()), 10);
        logger
            .log_pattern(ErrorKind::QueryTimeout, &RawError::from("query timeout"), None)
            .await;
        logger
            .log_pattern(ErrorKind::AuthError, &RawError::from("jwt expired"), None)
            .await;

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: ErrorPatternEntry = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first.kind, ErrorKind::QueryTimeout);
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_unwritable_sink_does_not_propagate() {
        let path = std::env::temp_dir()
            .join(format!("missing-{}", uuid::Uuid::new_v4()))
            .join("nested")
            .join("patterns.jsonl");
        let logger = ErrorPatternLogger::new(true, Some(path), 10);

        let mut deep = serde_json::json!("leaf");
        for _ in 0..64 {
            deep = serde_json::json!({ "inner": deep });
        }
        let context = ErrorContext::default().with_extra("payload", deep);

        logger
            .log_pattern(ErrorKind::NetworkError, &RawError::from("ECONNRESET"), Some(&context))
            .await;

        assert_eq!(logger.recent_patterns(1).len(), 1);
    }

    #[test]
    fn test_context_extra_keys_flatten() {
        let context = ErrorContext::new("grn", "submit").with_extra("pallet_count", serde_json::json!(4));
        let json = serde_json::to_value(&context).unwrap();
        assert_eq!(json["component"], "grn");
        assert_eq!(json["pallet_count"], 4);
    }
}
