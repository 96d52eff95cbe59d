//! Error Recovery
//!
//! Bounded, textual repair of failed SQL. Four kinds have a strategy; every
//! other kind is declined with its user message. Nothing here re-parses SQL,
//! re-validates a patched statement, or retries.

use crate::execution_loop::error_classifier::{ErrorKind, RawError};
use crate::execution_loop::messages::generate_user_message;
use crate::execution_loop::patterns::{PatternTable, SynonymDictionary};
use regex::{NoExpand, Regex};
use serde::Serialize;
use tracing::{debug, info};

const MISSING_FROM: &str = "Missing FROM clause. Please specify which table to query.";
const GENERIC_SYNTAX: &str =
    "SQL syntax error. Please check for missing keywords, quotes, or commas.";
const QUOTES_ADDED: &str = "Added missing quotes around string value";
const AMBIGUOUS_GENERIC: &str =
    "A column reference is ambiguous. Please qualify column names with their table name.";

/// Minimum Jaro-Winkler score for a "did you mean" hint
const CLOSE_MATCH_THRESHOLD: f64 = 0.85;

/// Outcome of a recovery attempt.
///
/// `new_sql` is present exactly when `success` is true.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecoveryResult {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    new_sql: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    suggestion: Option<String>,
}

impl RecoveryResult {
    pub fn recovered(new_sql: String, suggestion: impl Into<String>) -> Self {
        Self {
            success: true,
            new_sql: Some(new_sql),
            suggestion: Some(suggestion.into()),
        }
    }

    pub fn declined(suggestion: Option<String>) -> Self {
        Self {
            success: false,
            new_sql: None,
            suggestion,
        }
    }

    pub fn declined_with(suggestion: impl Into<String>) -> Self {
        Self::declined(Some(suggestion.into()))
    }

    pub fn success(&self) -> bool {
        self.success
    }

    pub fn new_sql(&self) -> Option<&str> {
        self.new_sql.as_deref()
    }

    pub fn suggestion(&self) -> Option<&str> {
        self.suggestion.as_deref()
    }
}

/// Recovery dispatcher
#[derive(Debug, Clone, Copy)]
pub struct ErrorRecovery<'p> {
    patterns: &'p PatternTable,
}

impl ErrorRecovery<'static> {
    pub fn new() -> Self {
        Self {
            patterns: PatternTable::global(),
        }
    }
}

impl Default for ErrorRecovery<'static> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'p> ErrorRecovery<'p> {
    pub fn with_patterns(patterns: &'p PatternTable) -> Self {
        Self { patterns }
    }

    /// Attempt a repair of `sql` for an already-classified error.
    ///
    /// Async so strategies that need I/O can be added without changing callers;
    /// the current ones never suspend.
    pub async fn attempt(&self, kind: ErrorKind, sql: &str, error: &RawError) -> RecoveryResult {
        let message = error.message();
        let result = match kind {
            ErrorKind::ColumnNotExists => self.recover_column(sql, message),
            ErrorKind::TableNotExists => self.recover_table(sql, message),
            ErrorKind::SyntaxError => self.recover_syntax(sql, message),
            ErrorKind::AmbiguousColumn => self.recover_ambiguous_column(message),
            other => RecoveryResult::declined_with(generate_user_message(other, None)),
        };

        if result.success() {
            info!(kind = %kind, "SQL recovered: {}", result.suggestion().unwrap_or_default());
        } else {
            debug!(kind = %kind, "Recovery declined");
        }

        result
    }

    fn recover_column(&self, sql: &str, message: &str) -> RecoveryResult {
        let Some(bad_column) = first_capture(&self.patterns.recovery().column_ref, message) else {
            return RecoveryResult::declined_with(generate_user_message(
                ErrorKind::ColumnNotExists,
                None,
            ));
        };

        let columns = self.patterns.column_synonyms();
        if let Some(canonical) = columns.lookup(&bad_column) {
            if let Some(fixed) = replace_whole_word(sql, &bad_column, canonical) {
                return RecoveryResult::recovered(
                    fixed,
                    format!("Column '{}' replaced with '{}'", bad_column, canonical),
                );
            }
        }

        RecoveryResult::declined_with(format!(
            "Column '{}' not found.{} Available columns might include: product_code, product_name, created_at, etc.",
            bad_column,
            close_match_hint(columns, &bad_column)
        ))
    }

    fn recover_table(&self, sql: &str, message: &str) -> RecoveryResult {
        let Some(bad_table) = first_capture(&self.patterns.recovery().table_ref, message) else {
            return RecoveryResult::declined_with(generate_user_message(
                ErrorKind::TableNotExists,
                None,
            ));
        };

        let tables = self.patterns.table_synonyms();
        if let Some(canonical) = tables.lookup(&bad_table) {
            if let Some(fixed) = replace_whole_word(sql, &bad_table, canonical) {
                return RecoveryResult::recovered(
                    fixed,
                    format!("Table '{}' replaced with '{}'", bad_table, canonical),
                );
            }
        }

        RecoveryResult::declined_with(format!(
            "Table '{}' not found.{} Common tables: record_palletinfo, record_history, data_code, etc.",
            bad_table,
            close_match_hint(tables, &bad_table)
        ))
    }

    fn recover_syntax(&self, sql: &str, message: &str) -> RecoveryResult {
        let lower_sql = sql.to_lowercase();
        if lower_sql.contains("select") && !lower_sql.contains("from") {
            return RecoveryResult::declined_with(MISSING_FROM);
        }

        // only the first `= word` is considered; a literal keyword there declines
        if message.contains("syntax error") && sql.contains('=') {
            if let Some(caps) = self.patterns.recovery().bare_literal.captures(sql) {
                if let (Some(whole), Some(ident)) = (caps.get(0), caps.get(1)) {
                    if !is_literal_keyword(ident.as_str()) {
                        let trailing = caps.get(2).map_or("", |m| m.as_str());
                        let fixed = format!(
                            "{}= '{}'{}{}",
                            &sql[..whole.start()],
                            ident.as_str(),
                            trailing,
                            &sql[whole.end()..]
                        );
                        return RecoveryResult::recovered(fixed, QUOTES_ADDED);
                    }
                }
            }
        }

        RecoveryResult::declined_with(GENERIC_SYNTAX)
    }

    /// Never patches: picking the right table needs schema knowledge.
    fn recover_ambiguous_column(&self, message: &str) -> RecoveryResult {
        match first_capture(&self.patterns.recovery().ambiguous_ref, message) {
            Some(column) => RecoveryResult::declined_with(format!(
                "Column '{}' exists in multiple tables. Please specify the table name (e.g., table.{})",
                column, column
            )),
            None => RecoveryResult::declined_with(AMBIGUOUS_GENERIC),
        }
    }
}

/// First participating capture group (1, then 2)
fn first_capture(pattern: &Regex, message: &str) -> Option<String> {
    let caps = pattern.captures(message)?;
    caps.get(1)
        .or_else(|| caps.get(2))
        .map(|m| m.as_str().to_string())
}

/// Case-insensitive, whole-word, global replacement.
/// Identifiers inside string literals or comments are replaced too.
fn replace_whole_word(sql: &str, word: &str, replacement: &str) -> Option<String> {
    let pattern = Regex::new(&format!(r"(?i)\b{}\b", regex::escape(word))).ok()?;
    Some(pattern.replace_all(sql, NoExpand(replacement)).into_owned())
}

fn close_match_hint(dictionary: &SynonymDictionary, name: &str) -> String {
    match dictionary.closest_canonical(name, CLOSE_MATCH_THRESHOLD) {
        Some(candidate) if !candidate.eq_ignore_ascii_case(name) => {
            format!(" Did you mean '{}'?", candidate)
        }
        _ => String::new(),
    }
}

fn is_literal_keyword(ident: &str) -> bool {
    ["true", "false", "null"]
        .iter()
        .any(|k| ident.eq_ignore_ascii_case(k))
}

/// Descriptor telling a caller whether a kind can be auto-recovered
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecoveryStrategy {
    pub kind: ErrorKind,
    pub can_auto_recover: bool,
    pub suggestion: String,
}

impl RecoveryStrategy {
    pub fn for_kind(kind: ErrorKind) -> Self {
        Self {
            kind,
            can_auto_recover: kind.is_recoverable(),
            suggestion: generate_user_message(kind, None),
        }
    }

    /// Run this kind's recovery against the given statement
    pub async fn execute(&self, sql: &str, error: &RawError) -> RecoveryResult {
        ErrorRecovery::new().attempt(self.kind, sql, error).await
    }
}
