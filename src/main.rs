use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use verdict::agents::{AgentRegistry, JsonFileSource, TemplateSynthesizer};
use verdict::config::Config;
use verdict::orchestration::{DefaultPlanner, Orchestrator, Planner, RunReport};
use verdict::supply::{assess_suppliers, ReferenceData, Supplier};
use verdict::{Error, Result};

const DEFAULT_QUERY: &str = "Analyze all transactions for suspicious activity";

/// Verdict - anomaly detection and consensus verification over record batches
#[derive(Parser, Debug)]
#[command(name = "verdict")]
#[command(version, about, long_about = None)]
#[command(after_help = "ENVIRONMENT:\n    VERDICT_DEBUG=1     Enable debug logging (alternative to --debug)\n    VERDICT_LOG=<filter>  Full tracing filter, e.g. verdict=trace")]
pub struct Cli {
    /// Enable debug logging
    #[arg(short = 'd', long, global = true)]
    pub debug: bool,

    /// Write logs to ~/.verdict/verdict.log instead of stderr
    #[arg(long, global = true)]
    pub log_file: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Run the full pipeline over a JSON record file
    Run {
        /// JSON file with a record batch or a bare array of records
        records: PathBuf,

        /// Query passed to retrieval
        #[arg(long, short = 'q', default_value = DEFAULT_QUERY)]
        query: String,

        /// Config file (defaults to ~/.verdict/verdict.toml)
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,

        /// Consensus threshold for verification
        #[arg(long, short = 't')]
        threshold: Option<f64>,
    },

    /// Score supplier risk and ESG compliance
    Suppliers {
        /// JSON array of suppliers
        suppliers: PathBuf,

        /// JSON reference data: country ratings, sanctions, known violations
        #[arg(long, short = 'r')]
        reference: Option<PathBuf>,

        /// Config file (defaults to ~/.verdict/verdict.toml)
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,
    },

    /// Print the default task graph as JSON
    Plan {
        /// Query passed to retrieval
        #[arg(long, short = 'q', default_value = DEFAULT_QUERY)]
        query: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.log_file {
        verdict::log::init_to_file(cli.debug)?;
    } else {
        verdict::log::init(cli.debug);
    }

    match cli.command {
        Command::Run {
            records,
            query,
            config,
            threshold,
        } => run_pipeline(records, query, config, threshold),
        Command::Suppliers {
            suppliers,
            reference,
            config,
        } => run_suppliers(suppliers, reference, config),
        Command::Plan { query } => run_plan(query),
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    match path {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
}

fn run_suppliers(
    suppliers: PathBuf,
    reference: Option<PathBuf>,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let config = load_config(config_path.as_ref())?;
    info!(suppliers = %suppliers.display(), "Suppliers command");

    let suppliers: Vec<Supplier> = serde_json::from_str(&std::fs::read_to_string(&suppliers)?)?;
    let reference: ReferenceData = match reference {
        Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
        None => ReferenceData::default(),
    };

    let report = assess_suppliers(&config.supply, &suppliers, &reference)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn run_plan(query: String) -> Result<()> {
    let graph = DefaultPlanner::default().plan(&query)?;
    println!("{}", serde_json::to_string_pretty(&graph.snapshot())?);
    Ok(())
}

fn run_pipeline(
    records: PathBuf,
    query: String,
    config_path: Option<PathBuf>,
    threshold: Option<f64>,
) -> Result<()> {
    let config = load_config(config_path.as_ref())?;
    if let Some(t) = threshold {
        if !(0.0..=1.0).contains(&t) {
            return Err(Error::Validation(format!(
                "threshold must be between 0 and 1, got {}",
                t
            )));
        }
    }
    info!(records = %records.display(), query = %query, "Run command");

    let registry = AgentRegistry::standard(
        &config,
        Arc::new(JsonFileSource::new(records)),
        Arc::new(TemplateSynthesizer),
    );
    let planner = DefaultPlanner {
        consensus_threshold: threshold,
        ..DefaultPlanner::default()
    };
    let graph = planner.plan(&query)?;

    let cancel = CancellationToken::new();
    let orchestrator = Orchestrator::new(Arc::new(registry)).with_cancellation(cancel.clone());

    let rt = tokio::runtime::Runtime::new()?;
    let run = rt.block_on(async {
        // Ctrl-C stops the run at the next round boundary.
        let on_interrupt = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, cancelling run");
                on_interrupt.cancel();
            }
        });
        orchestrator.run(graph).await
    })?;

    println!("{}", serde_json::to_string_pretty(&output(&run))?);

    if run.report().is_none() {
        return Err(Error::Synthesis(format!(
            "run ended {:?} without a report",
            run.state
        )));
    }
    Ok(())
}

fn output(run: &RunReport) -> serde_json::Value {
    let failures: Vec<serde_json::Value> = run
        .failures()
        .iter()
        .map(|r| {
            serde_json::json!({
                "task_id": r.task_id.to_string(),
                "agent": r.agent,
                "error": r.error_message(),
            })
        })
        .collect();

    serde_json::json!({
        "report": run.report().map(|r| r.summary()),
        "description": run.report().map(|r| r.description.clone()),
        "recommendations": run.report().map(|r| r.recommendations.clone()),
        "run": {
            "state": run.state,
            "completed": run.completed,
            "failed": run.failed,
            "unreachable": run.unreachable,
            "cancelled": run.cancelled,
            "rounds": run.rounds,
            "duration_ms": run.duration_ms,
        },
        "failures": failures,
    })
}
