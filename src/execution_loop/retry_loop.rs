//! Execution Loop
//!
//! Bounded retry loop with error recovery, driven by a caller-supplied
//! executor. Each engine call inside it is a single, non-recursive call.

use crate::engine::ErrorEngine;
use crate::execution_loop::error_classifier::{ErrorFeatures, ErrorKind, ErrorSeverity, RawError};
use crate::execution_loop::error_recovery::RecoveryResult;
use crate::observability::logger::ErrorContext;
use async_trait::async_trait;
use serde::Serialize;
use std::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

/// Runs SQL against whatever store the caller owns
#[async_trait]
pub trait SqlExecutor: Send + Sync {
    type Output: Send;

    async fn execute(&self, sql: &str) -> std::result::Result<Self::Output, RawError>;
}

/// What the end user may see about a statement that could not be run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailureReport {
    pub kind: ErrorKind,
    pub confidence: f64,
    pub severity: ErrorSeverity,
    pub user_message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

/// One failed attempt
#[derive(Debug, Clone, Serialize)]
pub struct AttemptRecord {
    pub attempt: u8,
    pub sql: String,
    pub kind: ErrorKind,
    pub recovery: RecoveryResult,
}

/// Result of `ExecutionLoop::execute_with_recovery`
#[derive(Debug)]
pub struct ExecutionOutcome<T> {
    pub query_id: Uuid,
    pub final_sql: String,
    pub attempts: u8,
    pub elapsed_ms: u64,
    pub failures: Vec<AttemptRecord>,
    pub result: std::result::Result<T, FailureReport>,
}

impl<T> ExecutionOutcome<T> {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    /// Whether the statement that finally ran differs from the one submitted
    pub fn was_recovered(&self) -> bool {
        self.is_success() && !self.failures.is_empty()
    }
}

/// Execution loop with bounded retries
pub struct ExecutionLoop {
    max_attempts: u8,
    abort_on_repeat_error: bool,
}

impl ExecutionLoop {
    pub fn new(max_attempts: u8, abort_on_repeat_error: bool) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            abort_on_repeat_error,
        }
    }

    /// Execute `sql`, repairing and re-executing on recoverable failures
    pub async fn execute_with_recovery<E>(
        &self,
        engine: &ErrorEngine,
        sql: &str,
        executor: &E,
        context: Option<&ErrorContext>,
    ) -> ExecutionOutcome<E::Output>
    where
        E: SqlExecutor + ?Sized,
    {
        let query_id = Uuid::new_v4();
        let started = Instant::now();
        let mut current_sql = sql.to_string();
        let mut previous_error: Option<(ErrorKind, ErrorFeatures)> = None;
        let mut failures: Vec<AttemptRecord> = Vec::new();
        let mut attempt = 0u8;

        loop {
            attempt += 1;
            info!(%query_id, "Execution attempt {} of {}", attempt, self.max_attempts);

            let error = match executor.execute(&current_sql).await {
                Ok(output) => {
                    info!(%query_id, "Execution succeeded on attempt {}", attempt);
                    return ExecutionOutcome {
                        query_id,
                        final_sql: current_sql,
                        attempts: attempt,
                        elapsed_ms: elapsed_ms(started),
                        failures,
                        result: Ok(output),
                    };
                }
                Err(error) => error,
            };

            let classification = engine.classify(&error, Some(&current_sql));
            let kind = classification.kind;
            engine.log_pattern(kind, &error, context).await;

            let recovery = engine.attempt_recovery(kind, &current_sql, &error).await;
            let report = FailureReport {
                kind,
                confidence: classification.confidence,
                severity: engine.severity(kind),
                user_message: engine.user_message(kind, Some(&classification.features)),
                suggestion: recovery.suggestion().map(str::to_string),
            };

            let signature = (kind, classification.features);
            let repeated = previous_error.as_ref() == Some(&signature);
            let next_sql = recovery
                .new_sql()
                .filter(|new_sql| *new_sql != current_sql)
                .map(str::to_string);

            failures.push(AttemptRecord {
                attempt,
                sql: current_sql.clone(),
                kind,
                recovery,
            });

            if self.abort_on_repeat_error && repeated {
                warn!(%query_id, "Same error repeated, aborting: {}", kind);
            } else if let Some(new_sql) = next_sql.filter(|_| attempt < self.max_attempts) {
                current_sql = new_sql;
                previous_error = Some(signature);
                continue;
            }

            // final_sql is the last statement actually executed
            return ExecutionOutcome {
                query_id,
                final_sql: current_sql,
                attempts: attempt,
                elapsed_ms: elapsed_ms(started),
                failures,
                result: Err(report),
            };
        }
    }
}

impl Default for ExecutionLoop {
    fn default() -> Self {
        Self::new(3, true)
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
