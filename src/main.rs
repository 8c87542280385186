use std::process::ExitCode;
use std::sync::Arc;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use corporate_risk_monitor::{
    config::Settings,
    database::{establish_connection, get_pool_stats, run_migrations, test_connection},
    risk::{detector_catalog, AnalysisOptions, EngineConfig, RiskAnalysisEngine, RiskLevel},
    store::{PgGraphStore, PgHealthMetricsProvider, PgHighRiskNameSupplier},
    utils::{fault_tolerance::RetryConfig, logging::init_tracing},
    AppError,
};

#[derive(Parser)]
#[command(name = "corporate-risk-monitor")]
#[command(version)]
#[command(about = "Detect corporate risk patterns over the company relationship graph")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Emit compact single-line JSON instead of pretty output
    #[arg(long, global = true)]
    compact: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every (or selected) pattern detector for one company
    Analyze {
        company_id: String,

        /// Restrict to these patterns (repeatable or comma separated)
        #[arg(long = "pattern", short, value_delimiter = ',')]
        patterns: Vec<String>,

        /// Hide findings below this level: low, medium, high, critical
        #[arg(long)]
        min_severity: Option<RiskLevel>,

        /// Reference date for trailing windows (YYYY-MM-DD), defaults to today
        #[arg(long)]
        as_of: Option<NaiveDate>,
    },

    /// Run a single pattern detector
    Pattern { company_id: String, pattern: String },

    /// Rank 2 to 10 companies by composite risk score
    Compare {
        #[arg(required = true, num_args = 2..=10)]
        company_ids: Vec<String>,

        /// Reference date for every company (YYYY-MM-DD), defaults to today
        #[arg(long)]
        as_of: Option<NaiveDate>,
    },

    /// List supported patterns
    Patterns,

    /// Create or update the database schema
    Migrate,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), AppError> {
    let settings = Settings::new()?;
    init_tracing(&settings.logging)?;
    let compact = cli.compact;

    match cli.command {
        Commands::Patterns => print_json(&detector_catalog(), compact),
        Commands::Migrate => {
            let pool = establish_connection(&settings.database).await?;
            run_migrations(&pool).await
        }
        command => {
            let engine = build_engine(&settings).await?;
            run_engine_command(&engine, command, compact).await
        }
    }
}

async fn run_engine_command(
    engine: &RiskAnalysisEngine,
    command: Commands,
    compact: bool,
) -> Result<(), AppError> {
    match command {
        Commands::Analyze {
            company_id,
            patterns,
            min_severity,
            as_of,
        } => {
            let mut opts = AnalysisOptions::for_pattern_names(patterns.as_slice())?;
            if let Some(level) = min_severity {
                opts = opts.with_min_severity(level);
            }
            if let Some(date) = as_of {
                opts = opts.with_as_of(date);
            }

            let cancel = CancellationToken::new();
            let on_interrupt = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Interrupt received, finishing with a partial report");
                    on_interrupt.cancel();
                }
            });

            let report = engine
                .analyze_company_risk_until(&company_id, &opts, &cancel)
                .await?;
            print_json(&report, compact)
        }
        Commands::Pattern {
            company_id,
            pattern,
        } => {
            let finding = engine.run_single_pattern(&company_id, &pattern).await?;
            print_json(&finding, compact)
        }
        Commands::Compare { company_ids, as_of } => {
            let mut opts = AnalysisOptions::default();
            if let Some(date) = as_of {
                opts = opts.with_as_of(date);
            }
            let comparison = engine.compare_companies(&company_ids, &opts).await?;
            print_json(&comparison, compact)
        }
        // Handled before the engine is built.
        Commands::Patterns | Commands::Migrate => Ok(()),
    }
}

async fn build_engine(settings: &Settings) -> Result<RiskAnalysisEngine, AppError> {
    let pool = establish_connection(&settings.database).await?;
    test_connection(&pool).await?;
    let stats = get_pool_stats(&pool);
    info!(
        size = stats.size,
        idle = stats.idle,
        active = stats.active,
        max_connections = stats.max_connections,
        "Connection pool ready"
    );

    let retry = RetryConfig::from(&settings.store);
    let graph = Arc::new(PgGraphStore::with_retry(pool.clone(), retry.clone()));
    let health = Arc::new(PgHealthMetricsProvider::with_retry(pool.clone(), retry));
    let high_risk_names = Arc::new(PgHighRiskNameSupplier::new(
        pool,
        settings.cache.high_risk_score_threshold,
        settings.high_risk_names_ttl(),
    ));

    info!(
        detector_timeout_ms = settings.engine.detector_timeout_ms,
        max_concurrent_detectors = settings.engine.max_concurrent_detectors,
        "Risk analysis engine ready"
    );

    Ok(RiskAnalysisEngine::new(graph, health)
        .with_config(EngineConfig::from(&settings.engine))
        .with_high_risk_names(high_risk_names))
}

fn print_json<T: Serialize>(value: &T, compact: bool) -> Result<(), AppError> {
    let rendered = if compact {
        serde_json::to_string(value)?
    } else {
        serde_json::to_string_pretty(value)?
    };
    println!("{}", rendered);
    Ok(())
}
