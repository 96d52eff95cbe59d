pub mod config;
pub mod engine;
pub mod error;
pub mod execution_loop;
pub mod observability;

pub use config::{EngineConfig, Environment};
pub use engine::{
    attempt_error_recovery, classify_error, classify_error_enhanced, get_error_severity,
    get_recovery_strategy, Diagnosis, ErrorEngine,
};
pub use error::{EngineError, Result};
pub use execution_loop::{
    enhance_error_message, generate_user_message, ClassificationResult, EnhancedMessage,
    ErrorClassifier, ErrorFeatures, ErrorKind, ErrorRecovery, ErrorSeverity, ExecutionLoop,
    ExecutionOutcome, FailureReport, PatternTable, RawError, RecoveryResult, RecoveryStrategy,
    SqlExecutor,
};
pub use observability::{ErrorContext, ErrorPatternEntry, ErrorPatternLogger};
