//! propfusion command-line front end
//!
//! Subcommands:
//!   predict     -- Estimate prices for a JSON array of prediction requests
//!   preprocess  -- Print the scaled tabular vectors for a JSON array of records

mod config;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use propfusion_core::{LoggingConfig, PredictorConfig, RawRecord};
use propfusion_model::{
    select_device, PredictionRequest, PricePredictor, SafetensorsEmbeddingSource,
    TabularPreprocessor, TransformerTextEmbedder,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "propfusion", about = "Multimodal property price estimation")]
struct Cli {
    /// YAML configuration file. Defaults are used when absent.
    #[arg(long, global = true, env = "PROPFUSION_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Estimate prices for every request in a JSON array.
    Predict {
        /// Path to a JSON array of `{record, image, description}` objects.
        #[arg(long)]
        input: PathBuf,
    },

    /// Print the scaled 17-column vector of every record in a JSON array.
    Preprocess {
        /// Path to a JSON array of raw records.
        #[arg(long)]
        input: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = config::resolve_config(cli.config.as_deref())?;
    init_logging(&config.logging)?;

    match &cli.config {
        Some(path) => info!(path = %path.display(), "Configuration loaded"),
        None => info!("No config file specified, using defaults"),
    }

    match cli.command {
        Command::Predict { input } => predict(&config, &input).await,
        Command::Preprocess { input } => preprocess(&config, &input),
    }
}

/// Install the global subscriber. `RUST_LOG` overrides the configured level.
fn init_logging(logging: &LoggingConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .map_err(|e| anyhow::anyhow!("Invalid log level '{}': {}", logging.level, e))?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    let result = match logging.format.as_str() {
        "json" => builder.json().try_init(),
        _ => builder.try_init(),
    };
    result.map_err(|e| anyhow::anyhow!("Failed to initialise logging: {}", e))
}

async fn predict(config: &PredictorConfig, input: &Path) -> anyhow::Result<()> {
    let requests: Vec<PredictionRequest> = config::read_json(input)?;
    info!(count = requests.len(), input = %input.display(), "Loaded prediction requests");

    let device = select_device(config.device);
    let image = SafetensorsEmbeddingSource::new("image", config.dimensions.image);
    let text = TransformerTextEmbedder::load(&config.text_encoder, &device).await?;
    let predictor = PricePredictor::from_config(config, Arc::new(image), Arc::new(text))?;

    for prediction in predictor.predict(&requests).await? {
        info!(%prediction, "Estimated price");
        println!(
            "{}",
            serde_json::json!({
                "predicted_price": prediction.price,
                "currency": prediction.currency,
            })
        );
    }
    Ok(())
}

fn preprocess(config: &PredictorConfig, input: &Path) -> anyhow::Result<()> {
    let records: Vec<RawRecord> = config::read_json(input)?;
    let preprocessor = TabularPreprocessor::from_scaler_file(&config.scaler_path)?;
    for vector in preprocessor.process_batch(&records)? {
        println!("{}", serde_json::to_string(vector.as_slice())?);
    }
    Ok(())
}
