//! Pattern Table
//!
//! Detection regexes per error kind, the regexes recovery uses to re-extract
//! identifiers, and the two synonym dictionaries. Built once, read-only after.

use crate::execution_loop::error_classifier::ErrorKind;
use regex::{Regex, RegexBuilder};
use std::collections::{BTreeSet, HashMap};
use strsim::jaro_winkler;

lazy_static::lazy_static! {
    static ref PATTERN_TABLE: PatternTable = PatternTable::new();
}

/// Detection patterns, in the order classification walks them.
/// Kinds missing here are only reachable through keyword fallback.
const DETECTION_PATTERNS: &[(ErrorKind, &[&str])] = &[
    (
        ErrorKind::ColumnNotExists,
        &[
            r#"column\s+"([^"]+)"\s+does\s+not\s+exist"#,
            r#"no\s+column\s+named\s+"([^"]+)""#,
            r"unknown\s+column\s+'([^']+)'",
        ],
    ),
    (
        ErrorKind::TableNotExists,
        &[
            r#"relation\s+"([^"]+)"\s+does\s+not\s+exist"#,
            r#"table\s+"([^"]+)"\s+doesn't\s+exist"#,
            r"no\s+such\s+table:\s+([^\s]+)",
        ],
    ),
    (
        ErrorKind::SyntaxError,
        &[
            r#"syntax\s+error\s+at\s+or\s+near\s+"([^"]+)""#,
            r"SQL\s+syntax.*near\s+'([^']+)'",
            r"unexpected\s+token",
        ],
    ),
    (
        ErrorKind::AmbiguousColumn,
        &[
            r#"column\s+reference\s+"([^"]+)"\s+is\s+ambiguous"#,
            r"ambiguous\s+column\s+name",
        ],
    ),
    (
        ErrorKind::TypeMismatch,
        &[
            r"operator does not exist:.*\s+([^\s]+)\s+",
            r"invalid input syntax for type",
            r"cannot cast",
        ],
    ),
    (
        ErrorKind::QueryTimeout,
        &[
            r"query timeout",
            r"canceling statement due to statement timeout",
            r"execution time exceeded",
        ],
    ),
    (
        ErrorKind::UpstreamAiRateLimit,
        &[r"rate limit", r"too many requests", r"quota exceeded"],
    ),
];

const COLUMN_SYNONYMS: &[(&str, &str)] = &[
    ("product", "product_code"),
    ("code", "product_code"),
    ("name", "product_name"),
    ("date", "created_at"),
    ("time", "created_at"),
    ("qty", "product_qty"),
    ("quantity", "product_qty"),
    ("pallet", "plt_num"),
    ("location", "loc"),
    ("user", "operator_id"),
    ("staff", "operator_name"),
    ("status", "plt_status"),
    ("order", "order_ref"),
    ("description", "description"),
];

const TABLE_SYNONYMS: &[(&str, &str)] = &[
    ("pallet", "record_palletinfo"),
    ("pallets", "record_palletinfo"),
    ("history", "record_history"),
    ("product", "data_code"),
    ("products", "data_code"),
    ("inventory", "record_inventory"),
    ("transfer", "record_transfer"),
    ("transfers", "record_transfer"),
    ("user", "data_id"),
    ("users", "data_id"),
    ("supplier", "data_supplier"),
    ("suppliers", "data_supplier"),
    ("order", "data_order"),
    ("orders", "data_order"),
    ("grn", "record_grn"),
];

/// Fixed map from loose identifiers to canonical schema names
#[derive(Debug, Clone)]
pub struct SynonymDictionary {
    entries: HashMap<&'static str, &'static str>,
}

impl SynonymDictionary {
    pub fn new(pairs: &[(&'static str, &'static str)]) -> Self {
        Self {
            entries: pairs.iter().copied().collect(),
        }
    }

    /// Case-insensitive exact lookup
    pub fn lookup(&self, name: &str) -> Option<&'static str> {
        self.entries.get(name.to_lowercase().as_str()).copied()
    }

    /// Distinct canonical names, sorted
    pub fn canonical_names(&self) -> Vec<&'static str> {
        self.entries
            .values()
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Closest canonical name by Jaro-Winkler similarity, if at or above `threshold`.
    /// Ties resolve to the alphabetically first name.
    pub fn closest_canonical(&self, name: &str, threshold: f64) -> Option<&'static str> {
        let lower = name.to_lowercase();
        let mut best: Option<(&'static str, f64)> = None;
        for candidate in self.canonical_names() {
            let score = jaro_winkler(&lower, candidate);
            if score < threshold {
                continue;
            }
            match best {
                Some((_, best_score)) if best_score >= score => {}
                _ => best = Some((candidate, score)),
            }
        }
        best.map(|(candidate, _)| candidate)
    }
}

/// Regexes recovery strategies use to pull the offending identifier back out
/// of a driver message
#[derive(Debug, Clone)]
pub struct RecoveryPatterns {
    pub column_ref: Regex,
    pub table_ref: Regex,
    pub ambiguous_ref: Regex,
    pub bare_literal: Regex,
}

/// Immutable pattern table shared by every classification and recovery call
#[derive(Debug, Clone)]
pub struct PatternTable {
    detection: Vec<(ErrorKind, Vec<Regex>)>,
    recovery: RecoveryPatterns,
    column_synonyms: SynonymDictionary,
    table_synonyms: SynonymDictionary,
}

impl PatternTable {
    pub fn new() -> Self {
        let detection = DETECTION_PATTERNS
            .iter()
            .map(|(kind, patterns)| (*kind, patterns.iter().map(|p| compile(p, true)).collect()))
            .collect();

        let recovery = RecoveryPatterns {
            column_ref: compile(r#"column\s+"([^"]+)""#, true),
            table_ref: compile(r#"relation\s+"([^"]+)"|table\s+"([^"]+)""#, true),
            ambiguous_ref: compile(r#"column.*"([^"]+)""#, true),
            // `= word` followed by whitespace or end of text
            bare_literal: compile(r"=\s*([A-Za-z]+)(\s|$)", false),
        };

        Self {
            detection,
            recovery,
            column_synonyms: SynonymDictionary::new(COLUMN_SYNONYMS),
            table_synonyms: SynonymDictionary::new(TABLE_SYNONYMS),
        }
    }

    /// Process-wide table, initialized on first use
    pub fn global() -> &'static PatternTable {
        &PATTERN_TABLE
    }

    /// Detection regexes in classification order
    pub fn detection(&self) -> impl Iterator<Item = (ErrorKind, &[Regex])> {
        self.detection
            .iter()
            .map(|(kind, patterns)| (*kind, patterns.as_slice()))
    }

    pub fn patterns_for(&self, kind: ErrorKind) -> &[Regex] {
        self.detection
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, patterns)| patterns.as_slice())
            .unwrap_or(&[])
    }

    pub fn recovery(&self) -> &RecoveryPatterns {
        &self.recovery
    }

    pub fn column_synonyms(&self) -> &SynonymDictionary {
        &self.column_synonyms
    }

    pub fn table_synonyms(&self) -> &SynonymDictionary {
        &self.table_synonyms
    }
}

impl Default for PatternTable {
    fn default() -> Self {
        Self::new()
    }
}

fn compile(pattern: &str, case_insensitive: bool) -> Regex {
    RegexBuilder::new(pattern)
        .case_insensitive(case_insensitive)
        .build()
        .unwrap_or_else(|e| panic!("built-in pattern {:?} failed to compile: {}", pattern, e))
}
