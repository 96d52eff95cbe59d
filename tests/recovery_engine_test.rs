use sql_recovery_engine::{
    attempt_error_recovery, classify_error, enhance_error_message, get_error_severity,
    get_recovery_strategy, EngineConfig, ErrorContext, ErrorEngine, ErrorKind, ErrorSeverity,
    RawError,
};

#[test]
fn test_column_not_exists_any_casing() {
    for message in [
        r#"column "plt_num" does not exist"#,
        r#"ERROR:  Column "plt_num" Does Not Exist"#,
        r#"COLUMN   "plt_num"  DOES NOT EXIST at character 8"#,
    ] {
        let result = classify_error(message, None);
        assert_eq!(result.kind, ErrorKind::ColumnNotExists, "{}", message);
        assert_eq!(result.confidence, 0.9);
        assert_eq!(result.features.column.as_deref(), Some("plt_num"));
    }
}

#[test]
fn test_relation_not_exists() {
    let result = classify_error(r#"relation "record_stock" does not exist"#, Some("SELECT 1"));
    assert_eq!(result.kind, ErrorKind::TableNotExists);
    assert_eq!(result.confidence, 0.9);
    assert_eq!(result.features.table.as_deref(), Some("record_stock"));
    assert!(result.features.column.is_none());
}

#[test]
fn test_timeout_keyword_fallback() {
    let result = classify_error("upstream gateway timeout while waiting for rows", None);
    assert_eq!(result.kind, ErrorKind::QueryTimeout);
    assert_eq!(result.confidence, 0.8);
}

#[test]
fn test_confidence_drawn_from_fixed_set() {
    let messages = [
        r#"column "x" does not exist"#,
        "column list mismatch",
        "timeout",
        "denied",
        "who knows",
        "cannot cast type jsonb to integer",
    ];
    for message in messages {
        let confidence = classify_error(message, None).confidence;
        assert!(
            [0.5, 0.7, 0.8, 0.9].contains(&confidence),
            "{} -> {}",
            message,
            confidence
        );
    }
}

#[test]
fn test_severity_is_total() {
    let mut counts = [0usize; 4];
    for kind in ErrorKind::ALL {
        match get_error_severity(kind) {
            ErrorSeverity::Low => counts[0] += 1,
            ErrorSeverity::Medium => counts[1] += 1,
            ErrorSeverity::High => counts[2] += 1,
            ErrorSeverity::Critical => counts[3] += 1,
        }
    }
    assert_eq!(counts, [1, 6, 7, 2]);
    assert_eq!(get_error_severity(ErrorKind::AuthError), ErrorSeverity::Critical);
    assert_eq!(get_error_severity(ErrorKind::PermissionDenied), ErrorSeverity::Critical);
}

#[tokio::test]
async fn test_column_recovery_then_unrelated_error() {
    let error = RawError::from(r#"column "qty" does not exist"#);
    let first = attempt_error_recovery(
        ErrorKind::ColumnNotExists,
        "SELECT qty FROM record_inventory",
        &error,
    )
    .await;
    assert!(first.success());
    assert_eq!(first.new_sql(), Some("SELECT product_qty FROM record_inventory"));

    // a different unknown column on the patched statement must leave other identifiers alone
    let patched = "SELECT product_qty, quantity_total, date FROM record_inventory";
    let second_error = RawError::from(r#"column "date" does not exist"#);
    let classification = classify_error(second_error.clone(), Some(patched));
    let second = attempt_error_recovery(classification.kind, patched, &second_error).await;
    assert_eq!(
        second.new_sql(),
        Some("SELECT product_qty, quantity_total, created_at FROM record_inventory")
    );
}

#[tokio::test]
async fn test_ambiguous_never_succeeds() {
    let inputs = [
        ("SELECT plt_num FROM a JOIN b ON a.id = b.id", r#"column reference "plt_num" is ambiguous"#),
        ("SELECT qty FROM record_inventory", r#"column "qty" does not exist"#),
        ("", ""),
    ];
    for (sql, message) in inputs {
        let result =
            attempt_error_recovery(ErrorKind::AmbiguousColumn, sql, &RawError::from(message)).await;
        assert!(!result.success());
        assert!(result.new_sql().is_none());
    }
}

#[tokio::test]
async fn test_missing_from_precedence() {
    let result = attempt_error_recovery(
        ErrorKind::SyntaxError,
        "SELECT product_code",
        &RawError::from(r#"syntax error at end of input"#),
    )
    .await;
    assert!(!result.success());
    assert!(result.suggestion().unwrap().starts_with("Missing FROM clause"));

    let with_literal = attempt_error_recovery(
        ErrorKind::SyntaxError,
        "SELECT product_code WHERE status = active",
        &RawError::from("syntax error at or near \"WHERE\""),
    )
    .await;
    assert!(!with_literal.success());
    assert!(with_literal.suggestion().unwrap().starts_with("Missing FROM clause"));
}

#[test]
fn test_production_redaction() {
    let raw = "ERROR: permission denied for table data_id (user svc_wms)";
    for kind in ErrorKind::ALL {
        let enhanced = enhance_error_message(kind, raw, Some("SELECT * FROM data_id"), &EngineConfig::production());
        assert!(!enhanced.technical_details.contains(raw));
        assert!(!enhanced.technical_details.contains("svc_wms"));
    }
}

#[tokio::test]
async fn test_logging_with_pathological_context_does_not_panic() {
    let engine = ErrorEngine::new(EngineConfig::development().with_pattern_log("/nonexistent-dir/x/patterns.jsonl"));
    let mut nested = serde_json::json!(null);
    for depth in 0..200 {
        nested = serde_json::json!({ "depth": depth, "next": nested });
    }
    let context = ErrorContext::new("ask_database", "execute").with_extra("self", nested);

    engine
        .log_pattern(ErrorKind::Unknown, &RawError::from("boom"), Some(&context))
        .await;
    assert_eq!(engine.logger().recent_patterns(1)[0].message, "boom");
}

#[tokio::test]
async fn test_strategy_descriptor_matches_recoverable_kinds() {
    let recoverable: Vec<ErrorKind> = ErrorKind::ALL
        .into_iter()
        .filter(|k| get_recovery_strategy(*k).can_auto_recover)
        .collect();
    assert_eq!(
        recoverable,
        vec![
            ErrorKind::ColumnNotExists,
            ErrorKind::TableNotExists,
            ErrorKind::SyntaxError,
            ErrorKind::AmbiguousColumn,
        ]
    );

    let strategy = get_recovery_strategy(ErrorKind::TableNotExists);
    let result = strategy
        .execute("SELECT * FROM inventory", &RawError::from(r#"relation "inventory" does not exist"#))
        .await;
    assert_eq!(result.new_sql(), Some("SELECT * FROM record_inventory"));
}
