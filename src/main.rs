use anyhow::{Context, Result};
use clap::Parser;
use sql_recovery_engine::{EngineConfig, Environment, ErrorContext, ErrorEngine, RawError};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sql-recovery")]
#[command(about = "Classify a failed SQL statement's driver error and try a bounded repair")]
struct Args {
    /// The raw error message returned by the database driver
    error: String,

    /// The SQL statement that failed (enables recovery)
    #[arg(long)]
    sql: Option<String>,

    /// Force production redaction regardless of APP_ENV / NODE_ENV
    #[arg(long)]
    production: bool,

    /// Component name recorded in the diagnostics log
    #[arg(long)]
    component: Option<String>,

    /// Action name recorded in the diagnostics log
    #[arg(long)]
    action: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut config = EngineConfig::from_env().context("invalid engine configuration")?;
    if args.production {
        config.environment = Environment::Production;
    }
    info!("Diagnosing error in {} mode", config.environment);

    let context = ErrorContext {
        component: Some(args.component.unwrap_or_else(|| "cli".to_string())),
        action: args.action,
        ..ErrorContext::default()
    };

    let engine = ErrorEngine::new(config);
    let error = RawError::from(args.error);
    let diagnosis = engine
        .diagnose(&error, args.sql.as_deref(), Some(&context))
        .await;

    println!("{}", serde_json::to_string_pretty(&diagnosis)?);

    Ok(())
}
