//! Error Engine
//!
//! Facade bundling configuration, the shared pattern table and the
//! diagnostics logger. Public operations return values, never errors.

use crate::config::EngineConfig;
use crate::error::Result;
use crate::execution_loop::error_classifier::{
    ClassificationResult, ErrorClassifier, ErrorFeatures, ErrorKind, ErrorSeverity, RawError,
};
use crate::execution_loop::error_recovery::{ErrorRecovery, RecoveryResult, RecoveryStrategy};
use crate::execution_loop::messages::{self, EnhancedMessage};
use crate::execution_loop::patterns::PatternTable;
use crate::observability::logger::{ErrorContext, ErrorPatternLogger};
use serde::Serialize;

/// Everything the engine can say about one failed statement
#[derive(Debug, Clone, Serialize)]
pub struct Diagnosis {
    pub classification: ClassificationResult,
    pub severity: ErrorSeverity,
    pub user_message: String,
    pub enhanced: EnhancedMessage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recovery: Option<RecoveryResult>,
}

pub struct ErrorEngine {
    config: EngineConfig,
    patterns: &'static PatternTable,
    logger: ErrorPatternLogger,
}

impl ErrorEngine {
    pub fn new(config: EngineConfig) -> Self {
        let logger = ErrorPatternLogger::from_config(&config);
        Self {
            config,
            patterns: PatternTable::global(),
            logger,
        }
    }

    pub fn from_env() -> Result<Self> {
        Ok(Self::new(EngineConfig::from_env()?))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn logger(&self) -> &ErrorPatternLogger {
        &self.logger
    }

    pub fn classify(&self, error: &RawError, sql: Option<&str>) -> ClassificationResult {
        ErrorClassifier::with_patterns(self.patterns).classify(error, sql)
    }

    pub fn severity(&self, kind: ErrorKind) -> ErrorSeverity {
        kind.severity()
    }

    pub fn user_message(&self, kind: ErrorKind, features: Option<&ErrorFeatures>) -> String {
        messages::generate_user_message(kind, features)
    }

    pub async fn attempt_recovery(&self, kind: ErrorKind, sql: &str, error: &RawError) -> RecoveryResult {
        ErrorRecovery::with_patterns(self.patterns)
            .attempt(kind, sql, error)
            .await
    }

    pub fn enhance(&self, kind: ErrorKind, raw_message: &str, sql: Option<&str>) -> EnhancedMessage {
        messages::enhance_error_message(kind, raw_message, sql, &self.config)
    }

    pub async fn log_pattern(&self, kind: ErrorKind, error: &RawError, context: Option<&ErrorContext>) {
        self.logger.log_pattern(kind, error, context).await
    }

    pub fn recovery_strategy(&self, kind: ErrorKind) -> RecoveryStrategy {
        RecoveryStrategy::for_kind(kind)
    }

    /// Classify, rate, describe and (when SQL is given) try to repair one
    /// failure, then log it.
    pub async fn diagnose(
        &self,
        error: &RawError,
        sql: Option<&str>,
        context: Option<&ErrorContext>,
    ) -> Diagnosis {
        let classification = self.classify(error, sql);
        let kind = classification.kind;

        let recovery = match sql {
            Some(sql) => Some(self.attempt_recovery(kind, sql, error).await),
            None => None,
        };

        let diagnosis = Diagnosis {
            severity: self.severity(kind),
            user_message: self.user_message(kind, Some(&classification.features)),
            enhanced: self.enhance(kind, error.message(), sql),
            recovery,
            classification,
        };

        self.log_pattern(kind, error, context).await;
        diagnosis
    }
}

impl Default for ErrorEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

/// Classify any caught error
pub fn classify_error(error: impl Into<RawError>, sql: Option<&str>) -> ClassificationResult {
    ErrorClassifier::new().classify(&error.into(), sql)
}

/// Older name for `classify_error`
pub fn classify_error_enhanced(error: impl Into<RawError>, sql: Option<&str>) -> ClassificationResult {
    classify_error(error, sql)
}

pub fn get_error_severity(kind: ErrorKind) -> ErrorSeverity {
    kind.severity()
}

pub async fn attempt_error_recovery(kind: ErrorKind, sql: &str, error: &RawError) -> RecoveryResult {
    ErrorRecovery::new().attempt(kind, sql, error).await
}

pub fn get_recovery_strategy(kind: ErrorKind) -> RecoveryStrategy {
    RecoveryStrategy::for_kind(kind)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_diagnose_column_error() {
        let engine = ErrorEngine::new(EngineConfig::development());
        let error = RawError::from(r#"column "qty" does not exist"#);
        let diagnosis = engine
            .diagnose(&error, Some("SELECT qty FROM record_inventory"), None)
            .await;

        assert_eq!(diagnosis.classification.kind, ErrorKind::ColumnNotExists);
        assert_eq!(diagnosis.severity, ErrorSeverity::Medium);
        assert_eq!(diagnosis.user_message, "Column 'qty' not found. Please check the column name.");
        let recovery = diagnosis.recovery.unwrap();
        assert_eq!(recovery.new_sql(), Some("SELECT product_qty FROM record_inventory"));
        assert_eq!(engine.logger().recent_patterns(5).len(), 1);
    }

    #[tokio::test]
    async fn test_diagnose_without_sql_skips_recovery() {
        let engine = ErrorEngine::new(EngineConfig::production());
        let diagnosis = engine
            .diagnose(&RawError::from("permission denied for table data_id"), None, None)
            .await;
        assert_eq!(diagnosis.classification.kind, ErrorKind::TableNotExists);
        assert!(diagnosis.recovery.is_none());
        assert!(!diagnosis.enhanced.technical_details.contains("data_id"));
        // production config leaves the logger off
        assert!(engine.logger().recent_patterns(5).is_empty());
    }

    #[test]
    fn test_free_functions() {
        let result = classify_error(r#"relation "grn" does not exist"#, None);
        assert_eq!(result.kind, ErrorKind::TableNotExists);
        assert_eq!(classify_error_enhanced("query timeout", None).kind, ErrorKind::QueryTimeout);
        assert_eq!(get_error_severity(ErrorKind::PermissionDenied), ErrorSeverity::Critical);
        assert!(!get_recovery_strategy(ErrorKind::NetworkError).can_auto_recover);
    }
}
