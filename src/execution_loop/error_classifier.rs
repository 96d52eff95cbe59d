//! Error Classifier
//!
//! Classifies raw database/driver errors into a closed taxonomy. Regex
//! detection first, keyword heuristics second, `Unknown` last.

use crate::error::EngineError;
use crate::execution_loop::patterns::PatternTable;
use regex::Captures;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Confidence of a registered-regex match
pub const REGEX_CONFIDENCE: f64 = 0.9;
/// Confidence of the broad column/table/syntax keyword rules
pub const KEYWORD_CONFIDENCE: f64 = 0.7;
/// Confidence of the timeout/permission keyword rules
pub const STRONG_KEYWORD_CONFIDENCE: f64 = 0.8;
/// Confidence when nothing matched
pub const DEFAULT_CONFIDENCE: f64 = 0.5;

/// SQL error classification taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ColumnNotExists,
    TableNotExists,
    SyntaxError,
    AmbiguousColumn,
    TypeMismatch,
    QueryTooComplex,
    QueryTimeout,
    ResultSetTooLarge,
    UpstreamAiError,
    UpstreamAiTimeout,
    UpstreamAiRateLimit,
    AuthError,
    PermissionDenied,
    NetworkError,
    ValidationError,
    Unknown,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 16] = [
        ErrorKind::ColumnNotExists,
        ErrorKind::TableNotExists,
        ErrorKind::SyntaxError,
        ErrorKind::AmbiguousColumn,
        ErrorKind::TypeMismatch,
        ErrorKind::QueryTooComplex,
        ErrorKind::QueryTimeout,
        ErrorKind::ResultSetTooLarge,
        ErrorKind::UpstreamAiError,
        ErrorKind::UpstreamAiTimeout,
        ErrorKind::UpstreamAiRateLimit,
        ErrorKind::AuthError,
        ErrorKind::PermissionDenied,
        ErrorKind::NetworkError,
        ErrorKind::ValidationError,
        ErrorKind::Unknown,
    ];

    /// Stable identifier
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ColumnNotExists => "column_not_exists",
            ErrorKind::TableNotExists => "table_not_exists",
            ErrorKind::SyntaxError => "syntax_error",
            ErrorKind::AmbiguousColumn => "ambiguous_column",
            ErrorKind::TypeMismatch => "type_mismatch",
            ErrorKind::QueryTooComplex => "query_too_complex",
            ErrorKind::QueryTimeout => "query_timeout",
            ErrorKind::ResultSetTooLarge => "result_set_too_large",
            ErrorKind::UpstreamAiError => "upstream_ai_error",
            ErrorKind::UpstreamAiTimeout => "upstream_ai_timeout",
            ErrorKind::UpstreamAiRateLimit => "upstream_ai_rate_limit",
            ErrorKind::AuthError => "auth_error",
            ErrorKind::PermissionDenied => "permission_denied",
            ErrorKind::NetworkError => "network_error",
            ErrorKind::ValidationError => "validation_error",
            ErrorKind::Unknown => "unknown",
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            ErrorKind::ValidationError => ErrorSeverity::Low,
            ErrorKind::ColumnNotExists
            | ErrorKind::TableNotExists
            | ErrorKind::SyntaxError
            | ErrorKind::AmbiguousColumn
            | ErrorKind::TypeMismatch
            | ErrorKind::Unknown => ErrorSeverity::Medium,
            ErrorKind::QueryTooComplex
            | ErrorKind::QueryTimeout
            | ErrorKind::ResultSetTooLarge
            | ErrorKind::UpstreamAiError
            | ErrorKind::UpstreamAiTimeout
            | ErrorKind::UpstreamAiRateLimit
            | ErrorKind::NetworkError => ErrorSeverity::High,
            ErrorKind::AuthError | ErrorKind::PermissionDenied => ErrorSeverity::Critical,
        }
    }

    /// Whether a bounded recovery strategy exists for this kind
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ErrorKind::ColumnNotExists
                | ErrorKind::TableNotExists
                | ErrorKind::SyntaxError
                | ErrorKind::AmbiguousColumn
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ErrorKind {
    type Err = EngineError;

    /// Accepts the snake_case identifier, its kebab-case spelling and the
    /// legacy `openai_*` / `unknown_error` names still found in query history.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        let legacy = match normalized.as_str() {
            "openai_error" => Some(ErrorKind::UpstreamAiError),
            "openai_timeout" => Some(ErrorKind::UpstreamAiTimeout),
            "openai_rate_limit" => Some(ErrorKind::UpstreamAiRateLimit),
            "unknown_error" => Some(ErrorKind::Unknown),
            _ => None,
        };
        legacy
            .or_else(|| {
                ErrorKind::ALL
                    .iter()
                    .copied()
                    .find(|kind| kind.as_str() == normalized)
            })
            .ok_or_else(|| EngineError::UnknownKind(s.to_string()))
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ErrorSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorSeverity::Low => "low",
            ErrorSeverity::Medium => "medium",
            ErrorSeverity::High => "high",
            ErrorSeverity::Critical => "critical",
        }
    }
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Structured details pulled out of a matched error message
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorFeatures {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub syntax_issue: Option<String>,
}

impl ErrorFeatures {
    pub fn is_empty(&self) -> bool {
        self.column.is_none() && self.table.is_none() && self.syntax_issue.is_none()
    }
}

/// Classification outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub kind: ErrorKind,
    pub confidence: f64,
    pub features: ErrorFeatures,
}

impl ClassificationResult {
    fn bare(kind: ErrorKind, confidence: f64) -> Self {
        Self {
            kind,
            confidence,
            features: ErrorFeatures::default(),
        }
    }
}

/// Whatever the caller caught, reduced to a message string.
///
/// Coercion is total: every constructor yields some text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawError {
    message: String,
}

impl RawError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// From any error type; an empty `Display` falls back to `Debug`
    pub fn from_error<E: std::error::Error + ?Sized>(error: &E) -> Self {
        let message = error.to_string();
        if message.is_empty() {
            Self::new(format!("{:?}", error))
        } else {
            Self::new(message)
        }
    }

    /// From an arbitrary thrown value: an object's non-empty string `message`
    /// field if present, a string as itself, anything else rendered as JSON.
    pub fn from_value(value: &serde_json::Value) -> Self {
        if let Some(message) = value
            .get("message")
            .and_then(|m| m.as_str())
            .filter(|m| !m.is_empty())
        {
            return Self::new(message);
        }
        match value {
            serde_json::Value::String(s) => Self::new(s.clone()),
            other => Self::new(other.to_string()),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for RawError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for RawError {}

impl From<&str> for RawError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<String> for RawError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&serde_json::Value> for RawError {
    fn from(value: &serde_json::Value) -> Self {
        Self::from_value(value)
    }
}

impl From<serde_json::Value> for RawError {
    fn from(value: serde_json::Value) -> Self {
        Self::from_value(&value)
    }
}

impl From<&anyhow::Error> for RawError {
    fn from(error: &anyhow::Error) -> Self {
        // alternate form keeps the whole context chain, where driver text usually sits
        Self::new(format!("{:#}", error))
    }
}

impl From<anyhow::Error> for RawError {
    fn from(error: anyhow::Error) -> Self {
        Self::from(&error)
    }
}

impl From<&EngineError> for RawError {
    fn from(error: &EngineError) -> Self {
        Self::from_error(error)
    }
}

/// Ordered keyword fallback rules, checked against the lower-cased message
const KEYWORD_RULES: &[(&[&str], ErrorKind, f64)] = &[
    (&["column"], ErrorKind::ColumnNotExists, KEYWORD_CONFIDENCE),
    (&["table", "relation"], ErrorKind::TableNotExists, KEYWORD_CONFIDENCE),
    (&["syntax"], ErrorKind::SyntaxError, KEYWORD_CONFIDENCE),
    (&["timeout"], ErrorKind::QueryTimeout, STRONG_KEYWORD_CONFIDENCE),
    (
        &["permission", "denied"],
        ErrorKind::PermissionDenied,
        STRONG_KEYWORD_CONFIDENCE,
    ),
];

/// Error classifier
#[derive(Debug, Clone, Copy)]
pub struct ErrorClassifier<'p> {
    patterns: &'p PatternTable,
}

impl ErrorClassifier<'static> {
    pub fn new() -> Self {
        Self {
            patterns: PatternTable::global(),
        }
    }
}

impl Default for ErrorClassifier<'static> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'p> ErrorClassifier<'p> {
    pub fn with_patterns(patterns: &'p PatternTable) -> Self {
        Self { patterns }
    }

    /// Classify an error into the taxonomy.
    ///
    /// `_sql` is accepted so callers can hand over everything they have; only
    /// the error message is consulted.
    pub fn classify(&self, error: &RawError, _sql: Option<&str>) -> ClassificationResult {
        self.classify_message(error.message())
    }

    pub fn classify_message(&self, message: &str) -> ClassificationResult {
        for (kind, patterns) in self.patterns.detection() {
            for pattern in patterns {
                if let Some(caps) = pattern.captures(message) {
                    return ClassificationResult {
                        kind,
                        confidence: REGEX_CONFIDENCE,
                        features: extract_features(&caps, kind),
                    };
                }
            }
        }

        let lower = message.to_lowercase();
        for (keywords, kind, confidence) in KEYWORD_RULES {
            if keywords.iter().any(|k| lower.contains(k)) {
                return ClassificationResult::bare(*kind, *confidence);
            }
        }

        ClassificationResult::bare(ErrorKind::Unknown, DEFAULT_CONFIDENCE)
    }
}

/// Pull structured features out of a regex match for the given kind
pub fn extract_features(caps: &Captures<'_>, kind: ErrorKind) -> ErrorFeatures {
    let group = |i: usize| caps.get(i).map(|m| m.as_str().to_string());
    let mut features = ErrorFeatures::default();

    match kind {
        ErrorKind::ColumnNotExists | ErrorKind::AmbiguousColumn => {
            features.column = group(1);
        }
        ErrorKind::TableNotExists => {
            features.table = group(1).or_else(|| group(2));
        }
        ErrorKind::SyntaxError => {
            features.syntax_issue = group(1);
        }
        _ => {}
    }

    features
}
