use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use fleetwatch::config::{FleetwatchConfig, LoggingConfig};
use fleetwatch::detect::emission::EmissionStats;
use fleetwatch::detect::features::FeatureInput;
use fleetwatch::detect::idle::DailyAggregateInput;

#[derive(Parser)]
#[command(
    name = "fleetwatch",
    about = "Anomaly decision engine for vehicle fleet telemetry",
    version,
    long_about = None
)]
struct Cli {
    /// Config file (defaults to $FLEETWATCH_CONFIG, then /etc/fleetwatch/fleetwatch.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding the detection artifacts (overrides models.dir)
    #[arg(long, global = true, env = "FLEETWATCH_MODEL_DIR")]
    model_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API
    Serve {
        /// Bind address (overrides server.bind)
        #[arg(long)]
        bind: Option<String>,
    },

    /// Evaluate one feature vector (JSON) and print the detection result
    Detect {
        /// Input file; reads stdin when omitted
        #[arg(long)]
        input: Option<PathBuf>,
    },

    /// Evaluate one daily aggregate (JSON) for excessive idling
    Daily {
        /// Input file; reads stdin when omitted
        #[arg(long)]
        input: Option<PathBuf>,
    },

    /// Compute CO2 intensity reference statistics from a JSON array of readings
    Calibrate {
        /// Input file; reads stdin when omitted
        #[arg(long)]
        input: Option<PathBuf>,
    },
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn read_input(path: Option<&Path>) -> Result<String> {
    match path {
        Some(p) => std::fs::read_to_string(p)
            .with_context(|| format!("failed to read input file: {}", p.display())),
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read stdin")?;
            Ok(buf)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => FleetwatchConfig::load(path)?,
        None => FleetwatchConfig::load_or_default(),
    };
    if let Some(dir) = cli.model_dir {
        config.models.dir = dir;
    }

    init_tracing(&config.logging);

    match cli.command {
        Commands::Serve { bind } => {
            let bind = bind.unwrap_or(config.server.bind);
            tracing::info!(%bind, "Starting fleetwatch API");
            fleetwatch::serve(&bind, &config.models.dir).await?;
        }
        Commands::Detect { input } => {
            let raw = read_input(input.as_deref())?;
            let features: FeatureInput =
                serde_json::from_str(&raw).context("input is not a feature vector")?;
            let engine = fleetwatch::build_engine(&config.models.dir);
            let result = engine.evaluate(&features)?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::Daily { input } => {
            let raw = read_input(input.as_deref())?;
            let day: DailyAggregateInput =
                serde_json::from_str(&raw).context("input is not a daily aggregate")?;
            let engine = fleetwatch::build_engine(&config.models.dir);
            let result = engine.evaluate_daily(&day)?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::Calibrate { input } => {
            let raw = read_input(input.as_deref())?;
            let samples: Vec<f64> =
                serde_json::from_str(&raw).context("input is not a JSON array of numbers")?;
            let stats = EmissionStats::from_samples(&samples);
            tracing::info!(samples = stats.sample_count, "computed emission statistics");
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
    }

    Ok(())
}
