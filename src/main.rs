use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::FmtSubscriber;

use ferrite_digits::train::BatchSize;
use ferrite_digits::{load_dir, ActivationFunction, ModelArtifact, Predictor, Trainer, TrainingConfig};

#[derive(Parser, Debug)]
#[command(name = "ferrite-digits", version, about = "Train and run a pixel-grid digit classifier")]
struct Cli {
    /// Log level: trace, debug, info, warn or error.
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load every JSON file in a folder, train, and export the model.
    Train {
        /// Folder holding training-example JSON files.
        #[arg(long, default_value = "training_data")]
        data: PathBuf,
        /// Where to write the model artifact.
        #[arg(long, default_value = "digit_model.json")]
        out: PathBuf,
        /// JSON training config; flags below override its fields.
        #[arg(long)]
        config: Option<PathBuf>,
        /// Hidden layer widths, e.g. 128,64.
        #[arg(long, value_delimiter = ',')]
        hidden: Option<Vec<usize>>,
        #[arg(long)]
        activation: Option<ActivationFunction>,
        #[arg(long)]
        learning_rate: Option<f64>,
        /// auto, full, or a number of examples.
        #[arg(long)]
        batch_size: Option<BatchSize>,
        #[arg(long)]
        epochs: Option<usize>,
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long)]
        validation_fraction: Option<f64>,
    },
    /// Classify one input with an exported model.
    Predict {
        #[arg(long, default_value = "digit_model.json")]
        model: PathBuf,
        /// Comma-separated pixel values.
        #[arg(long, value_delimiter = ',', conflicts_with = "input_file")]
        input: Option<Vec<f64>>,
        /// JSON file holding an array of pixel values.
        #[arg(long)]
        input_file: Option<PathBuf>,
    },
    /// Print the architecture of an exported model.
    Inspect {
        #[arg(long, default_value = "digit_model.json")]
        model: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = tracing::Level::from_str(&cli.log_level)
        .with_context(|| format!("invalid log level '{}'", cli.log_level))?;
    let subscriber = FmtSubscriber::builder().with_max_level(level).without_time().with_target(false).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Command::Train {
            data,
            out,
            config,
            hidden,
            activation,
            learning_rate,
            batch_size,
            epochs,
            seed,
            validation_fraction,
        } => {
            let mut cfg = match config {
                Some(path) => TrainingConfig::load_json(&path)
                    .with_context(|| format!("cannot load config '{}'", path.display()))?,
                None => TrainingConfig::default(),
            };
            if let Some(h) = hidden {
                cfg.hidden_sizes = h;
            }
            if let Some(a) = activation {
                cfg.activation = a;
            }
            if let Some(lr) = learning_rate {
                cfg.learning_rate = lr;
            }
            if let Some(b) = batch_size {
                cfg.batch_size = b;
            }
            if let Some(e) = epochs {
                cfg.max_epochs = e;
            }
            if let Some(s) = seed {
                cfg.seed = s;
            }
            if let Some(v) = validation_fraction {
                cfg.validation_fraction = v;
            }
            run_train(data, out, cfg)
        }
        Command::Predict { model, input, input_file } => {
            let input = match (input, input_file) {
                (Some(values), _) => values,
                (None, Some(path)) => {
                    let text = std::fs::read_to_string(&path)
                        .with_context(|| format!("cannot read '{}'", path.display()))?;
                    serde_json::from_str(&text).context("input file must hold a JSON array of numbers")?
                }
                (None, None) => bail!("pass --input or --input-file"),
            };
            let predictor = Predictor::load_json(&model)
                .with_context(|| format!("cannot load model '{}'", model.display()))?;
            let prediction = predictor.predict(&input)?;
            println!("{}", serde_json::to_string_pretty(&prediction)?);
            Ok(())
        }
        Command::Inspect { model } => {
            let artifact = ModelArtifact::load_json(&model)
                .with_context(|| format!("cannot load model '{}'", model.display()))?;
            let network = artifact.to_network()?;
            println!("model_type:  {}", artifact.model_type);
            println!("activation:  {}", artifact.activation);
            println!("classes:     {:?}", artifact.classes);
            for (k, layer) in network.layers().iter().enumerate() {
                println!("layer {}:     {} -> {}", k + 1, layer.input_size(), layer.size());
            }
            Ok(())
        }
    }
}

fn run_train(data: PathBuf, out: PathBuf, cfg: TrainingConfig) -> Result<()> {
    let loaded = load_dir(&data).with_context(|| format!("cannot load training data from '{}'", data.display()))?;

    let mut trainer = Trainer::new(cfg)?;
    let model = trainer.fit(&loaded.dataset)?;
    println!("{}", model.report().validation);

    model.to_artifact()?.save_json(&out)?;
    println!(
        "Training complete ({}). Validation accuracy: {:.4}",
        model.report().stop_reason, model.report().validation.accuracy
    );

    // Reload the exported file so the smoke prediction exercises the same
    // path an external consumer would.
    let predictor = Predictor::load_json(&out)?;
    let first = &loaded.dataset.examples()[0];
    let prediction = predictor.predict(&first.input)?;
    tracing::info!(
        "Test prediction on first example (label {}): {} with confidence {:.4}",
        first.label,
        prediction.label,
        prediction.confidence
    );
    Ok(())
}
