//! User-facing messages for classified errors.

use crate::config::EngineConfig;
use crate::execution_loop::error_classifier::{ErrorFeatures, ErrorKind};
use serde::{Deserialize, Serialize};

/// Shown in place of technical details in production
pub const PRODUCTION_DETAILS_PLACEHOLDER: &str = "Error details hidden in production";

/// Message bundle returned by `enhance_error_message`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnhancedMessage {
    pub user_message: String,
    pub technical_details: String,
    pub suggestions: Vec<String>,
}

/// Stable user-facing message for an error kind
pub fn generate_user_message(kind: ErrorKind, features: Option<&ErrorFeatures>) -> String {
    let column = features
        .and_then(|f| f.column.as_deref())
        .unwrap_or("unknown");
    let table = features
        .and_then(|f| f.table.as_deref())
        .unwrap_or("unknown");

    match kind {
        ErrorKind::ColumnNotExists => {
            format!("Column '{}' not found. Please check the column name.", column)
        }
        ErrorKind::TableNotExists => {
            format!("Table '{}' not found. Please verify the table name.", table)
        }
        ErrorKind::SyntaxError => "SQL syntax error. Please check your query structure.".to_string(),
        ErrorKind::AmbiguousColumn => format!(
            "Column '{}' is ambiguous. Please specify the table name.",
            column
        ),
        ErrorKind::TypeMismatch => {
            "Data type mismatch. Please check your query conditions.".to_string()
        }
        ErrorKind::QueryTooComplex => {
            "Query is too complex. Try simplifying your request.".to_string()
        }
        ErrorKind::QueryTimeout => {
            "Query took too long to execute. Try a simpler query.".to_string()
        }
        ErrorKind::ResultSetTooLarge => {
            "Too many results. Please add more specific conditions.".to_string()
        }
        ErrorKind::UpstreamAiError => "AI service error. Please try again.".to_string(),
        ErrorKind::UpstreamAiTimeout => "AI service timeout. Please try again.".to_string(),
        ErrorKind::UpstreamAiRateLimit => {
            "Too many requests. Please wait a moment and try again.".to_string()
        }
        ErrorKind::AuthError => "Authentication failed. Please log in again.".to_string(),
        ErrorKind::PermissionDenied => {
            "You do not have permission to perform this action.".to_string()
        }
        ErrorKind::NetworkError => {
            "Network connection issue. Please check your internet connection.".to_string()
        }
        ErrorKind::ValidationError => "Please check your input and try again.".to_string(),
        ErrorKind::Unknown => "An unexpected error occurred. Please try again.".to_string(),
    }
}

/// User message plus technical details and debugging hints.
///
/// In production the raw message and SQL never leave this function.
pub fn enhance_error_message(
    kind: ErrorKind,
    raw_message: &str,
    sql: Option<&str>,
    config: &EngineConfig,
) -> EnhancedMessage {
    let user_message = generate_user_message(kind, None);

    if config.is_production() {
        return EnhancedMessage {
            technical_details: PRODUCTION_DETAILS_PLACEHOLDER.to_string(),
            suggestions: vec![user_message.clone()],
            user_message,
        };
    }

    let mut technical_details = format!("[{}] {}", kind, raw_message);
    if let Some(sql) = sql {
        technical_details.push_str("\nSQL: ");
        technical_details.push_str(sql);
    }

    let suggestions: &[&str] = match kind {
        ErrorKind::ColumnNotExists => &["Check the column name spelling", "Verify the table schema"],
        ErrorKind::TableNotExists => &[
            "Verify the table name",
            "Check if the table exists in the database",
        ],
        ErrorKind::SyntaxError => &["Review SQL syntax", "Check for missing quotes or commas"],
        _ => &["Try a simpler query", "Contact support if the issue persists"],
    };

    EnhancedMessage {
        user_message,
        technical_details,
        suggestions: suggestions.iter().map(|s| s.to_string()).collect(),
    }
}
