use anyhow::Context;
use clap::{Parser, Subcommand};
use shotzone::pipeline::{self, Inference};
use shotzone::{fetch, PipelineConfig};
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "shotzone")]
#[command(about = "Tennis landing-zone prediction from rally clips", long_about = None)]
struct Cli {
    /// JSON pipeline configuration; defaults apply to anything it omits
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download the public datasets
    Fetch {
        #[arg(long, default_value = "data/raw")]
        output: PathBuf,

        /// Only this dataset (e.g. "tracknet")
        #[arg(long)]
        name: Option<String>,
    },

    /// Extract features from every clip and write the train/val arrays
    Preprocess {
        #[arg(long, default_value = "data/raw")]
        raw: PathBuf,

        #[arg(long, default_value = "data/processed")]
        out: PathBuf,
    },

    /// Fit the zone classifier and report validation accuracy
    Train {
        #[arg(long, default_value = "data/processed")]
        data: PathBuf,

        #[arg(long, default_value = "models/zone_classifier.json")]
        model: PathBuf,
    },

    /// Predict the landing zone of one clip
    Infer {
        clip: PathBuf,

        #[arg(long, default_value = "models/zone_classifier.json")]
        model: PathBuf,

        /// Override the hit frame from the clip's label file
        #[arg(long)]
        hit_frame: Option<usize>,
    },

    /// Run inference on a random clip
    Demo {
        #[arg(long, default_value = "data/raw")]
        data: PathBuf,

        #[arg(long, default_value = "models/zone_classifier.json")]
        model: PathBuf,
    },
}

fn load_config(path: Option<&Path>) -> anyhow::Result<PipelineConfig> {
    match path {
        Some(p) => PipelineConfig::from_file(p)
            .with_context(|| format!("failed to read config {}", p.display())),
        None => Ok(PipelineConfig::default()),
    }
}

fn report(inference: &Inference) {
    println!("clip: {}", inference.clip.display());
    println!("hit frame: {}", inference.hit_frame);
    println!("predicted zone: {}", inference.predicted);
    println!("projected zone: {}", inference.geometric);

    let probs: Vec<String> = inference
        .zone_probabilities()
        .iter()
        .map(|p| format!("{:.3}", p))
        .collect();
    println!("probs: [{}]", probs.join(", "));
    println!("{}", inference.heat_grid());
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Fetch { output, name } => {
            let fetcher = fetch::Fetcher::new()?;
            match name {
                Some(name) => {
                    let info = fetch::find_dataset(&name)?;
                    fetcher.fetch(info, &output.join(info.filename))?;
                }
                None => {
                    fetcher.fetch_all(&output)?;
                }
            }
        }

        Commands::Preprocess { raw, out } => {
            let (n_train, n_val) = pipeline::run_preprocess(&raw, &out, &config)
                .context("preprocessing failed")?;
            println!("train samples: {}, val samples: {}", n_train, n_val);
        }

        Commands::Train { data, model } => {
            let acc = pipeline::run_training(&data, &model, &config).context("training failed")?;
            println!("val accuracy: {:.3}", acc);
        }

        Commands::Infer {
            clip,
            model,
            hit_frame,
        } => {
            let inference = pipeline::infer_clip(&model, &clip, hit_frame, &config)
                .with_context(|| format!("inference on {} failed", clip.display()))?;
            report(&inference);
        }

        Commands::Demo { data, model } => {
            let inference = pipeline::run_demo(&data, &model, &config)?;
            report(&inference);
        }
    }

    Ok(())
}

fn main() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("shotzone=info"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(env_filter)
        .init();

    if let Err(err) = run(Cli::parse()) {
        eprintln!("Error: {:#}", err);
        std::process::exit(1);
    }
}
