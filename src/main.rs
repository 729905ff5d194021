use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use cropwise_features::{CropSample, FeatureError};
use cropwise_io::{ArtifactStore, BestParams, CvMetrics, DatasetReader, ModelScore, ReportWriter};
use cropwise_ml::{
    CropExplainer, CropPredictor, MaturityOptions, TrainingOptions, compare_models, run_maturity_evaluation,
    train_and_save,
};
use cropwise_rf::PermutationImportance;
use cropwise_server::ServeArgs;

const DEFAULT_MODEL: &str = "ml_models/crop_recommendation_model.bin";
const DEFAULT_SCALER: &str = "ml_models/scaler.bin";

#[derive(Parser)]
#[command(name = "cropwise")]
#[command(about = "Crop recommendation from soil and climate measurements")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// RNG seed for reproducibility
    #[arg(long, default_value_t = 42, global = true)]
    seed: u64,

    /// Enable verbose (debug-level) logging
    #[arg(long, global = true)]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(long, global = true)]
    quiet: bool,

    /// Number of threads for parallel computation (defaults to all cores)
    #[arg(long, global = true)]
    threads: Option<usize>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API and dashboard
    Serve {
        #[command(flatten)]
        args: ServeArgs,
    },

    /// Fit the scaler and forest on a labelled CSV and save both
    Train {
        /// Path to the training CSV (N,P,K,temperature,humidity,ph,rainfall,label)
        #[arg(long)]
        data: PathBuf,

        /// Where to write the model
        #[arg(long, default_value = DEFAULT_MODEL)]
        model: PathBuf,

        /// Where to write the scaler
        #[arg(long, default_value = DEFAULT_SCALER)]
        scaler: PathBuf,

        /// Number of trees in the forest
        #[arg(long, default_value_t = 100)]
        n_trees: usize,
    },

    /// Tune, cross-validate and hold-out test the forest; write the maturity report
    Evaluate {
        /// Path to the training CSV
        #[arg(long)]
        data: PathBuf,

        /// Directory for the report
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,

        /// Save the optimized model here (requires --scaler)
        #[arg(long, requires = "scaler")]
        model: Option<PathBuf>,

        /// Save the optimized scaler here (requires --model)
        #[arg(long, requires = "model")]
        scaler: Option<PathBuf>,

        /// Hyperparameter combinations to sample
        #[arg(long, default_value_t = 10)]
        n_iter: usize,

        /// Number of cross-validation folds
        #[arg(long, default_value_t = 5)]
        cv_folds: usize,
    },

    /// Cross-validate the forest against baseline classifiers
    Compare {
        /// Path to the training CSV
        #[arg(long)]
        data: PathBuf,

        /// Directory for the report
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,
    },

    /// Recommend a crop for one set of measurements
    Predict {
        /// Path to the trained model
        #[arg(long, default_value = DEFAULT_MODEL)]
        model: PathBuf,

        /// Path to the fitted scaler
        #[arg(long, default_value = DEFAULT_SCALER)]
        scaler: PathBuf,

        /// Soil nitrogen (kg/ha)
        #[arg(long)]
        n: f64,

        /// Soil phosphorus (kg/ha)
        #[arg(long)]
        p: f64,

        /// Soil potassium (kg/ha)
        #[arg(long)]
        k: f64,

        /// Air temperature (°C)
        #[arg(long, allow_negative_numbers = true)]
        temperature: f64,

        /// Relative humidity (%)
        #[arg(long)]
        humidity: f64,

        /// Soil pH
        #[arg(long)]
        ph: f64,

        /// Rainfall (mm)
        #[arg(long)]
        rainfall: f64,

        /// Number of reasons to give
        #[arg(long, default_value_t = 3)]
        top_k: usize,

        /// Skip feature-contribution reasons
        #[arg(long, default_value_t = false)]
        no_reasons: bool,
    },
}

// --- JSON stdout output structs ---

#[derive(Serialize)]
struct TrainOutput {
    model_path: PathBuf,
    scaler_path: PathBuf,
    n_samples: usize,
    n_classes: usize,
    n_trees: usize,
    oob_accuracy: Option<f64>,
    top_features: Vec<String>,
    permutation_importances: Vec<PermutationImportance>,
}

#[derive(Serialize)]
struct EvaluateOutput {
    report_path: PathBuf,
    best_params: BestParams,
    cv_metrics: CvMetrics,
    overfitting_warning: bool,
    model_path: Option<PathBuf>,
}

#[derive(Serialize)]
struct CompareOutput {
    report_path: PathBuf,
    best_model: Option<String>,
    best_mean_accuracy: Option<f64>,
    failed_models: Vec<String>,
}

fn validation_message(e: FeatureError) -> anyhow::Error {
    match e {
        FeatureError::Validation { errors } => {
            let fields: Vec<String> = errors.iter().map(|f| format!("{}: {}", f.field, f.message)).collect();
            anyhow!("invalid measurements: {}", fields.join("; "))
        }
        other => other.into(),
    }
}

fn main() -> Result<()> {
    let dotenv = dotenvy::dotenv();
    let cli = Cli::parse();

    let filter = match (cli.verbose, cli.quiet) {
        (true, _) => EnvFilter::new("debug"),
        (_, true) => EnvFilter::new("error"),
        _ => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Ok(path) = &dotenv {
        debug!(path = %path.display(), "loaded environment file");
    }

    // Configure Rayon thread pool
    if let Some(threads) = cli.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("failed to configure thread pool")?;
        info!(threads, "thread pool configured");
    }

    match cli.command {
        Command::Serve { args } => {
            let config = args.into_config().context("invalid server configuration")?;
            info!(?config, "starting server");
            let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
            runtime
                .block_on(cropwise_server::serve(config))
                .context("server failed")?;
        }

        Command::Train {
            data,
            model,
            scaler,
            n_trees,
        } => {
            let store = ArtifactStore::new(&model, &scaler);
            let options = TrainingOptions::default().with_n_trees(n_trees).with_seed(cli.seed);
            let summary = train_and_save(&data, &store, &options).context("training failed")?;
            info!(path = %model.display(), "model saved");

            let output = TrainOutput {
                model_path: model,
                scaler_path: scaler,
                n_samples: summary.n_samples,
                n_classes: summary.n_classes,
                n_trees: summary.n_trees,
                oob_accuracy: summary.oob_accuracy,
                top_features: summary.importances.iter().take(5).map(|f| f.name.clone()).collect(),
                permutation_importances: summary.permutation_importances,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }

        Command::Evaluate {
            data,
            output_dir,
            model,
            scaler,
            n_iter,
            cv_folds,
        } => {
            let dataset = DatasetReader::new(&data).read().context("failed to read dataset CSV")?;
            info!(n_samples = dataset.n_samples(), "dataset loaded");

            let options = MaturityOptions::default()
                .with_n_iter(n_iter)
                .with_cv_folds(cv_folds)
                .with_seed(cli.seed);
            let outcome = run_maturity_evaluation(&dataset, &options).context("evaluation failed")?;

            let report_path = ReportWriter::new(&output_dir)
                .write_maturity(&outcome.report)
                .context("failed to write maturity report")?;
            info!(path = %report_path.display(), "maturity report written");

            if let (Some(model), Some(scaler)) = (&model, &scaler) {
                ArtifactStore::new(model, scaler)
                    .save(&outcome.model, &outcome.scaler)
                    .context("failed to save optimized model")?;
                info!(path = %model.display(), "optimized model saved");
            }

            let report = outcome.report;
            let output = EvaluateOutput {
                report_path,
                best_params: report.best_params,
                cv_metrics: report.cv_metrics,
                overfitting_warning: report.overfitting_warning,
                model_path: model,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }

        Command::Compare { data, output_dir } => {
            let dataset = DatasetReader::new(&data).read().context("failed to read dataset CSV")?;
            info!(n_samples = dataset.n_samples(), "dataset loaded");

            let report = compare_models(&dataset, cli.seed).context("model comparison failed")?;
            let report_path = ReportWriter::new(&output_dir)
                .write_comparison(&report)
                .context("failed to write comparison report")?;
            info!(path = %report_path.display(), "comparison report written");

            let best = report
                .iter()
                .filter_map(|(name, score)| match score {
                    ModelScore::Scored { mean_accuracy, .. } => Some((name, *mean_accuracy)),
                    ModelScore::Failed { .. } => None,
                })
                .max_by(|a, b| a.1.total_cmp(&b.1));
            let output = CompareOutput {
                report_path,
                best_model: best.map(|(name, _)| name.clone()),
                best_mean_accuracy: best.map(|(_, acc)| acc),
                failed_models: report
                    .iter()
                    .filter(|(_, score)| matches!(score, ModelScore::Failed { .. }))
                    .map(|(name, _)| name.clone())
                    .collect(),
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }

        Command::Predict {
            model,
            scaler,
            n,
            p,
            k,
            temperature,
            humidity,
            ph,
            rainfall,
            top_k,
            no_reasons,
        } => {
            let sample =
                CropSample::new(n, p, k, temperature, humidity, ph, rainfall).map_err(validation_message)?;
            let (crop_model, fitted_scaler) = ArtifactStore::new(&model, &scaler)
                .load()
                .context("failed to load model artifacts")?;
            let explainer = (!no_reasons).then(|| CropExplainer::default().with_top_k(top_k));
            let predictor = CropPredictor::new(crop_model, fitted_scaler).with_explainer(explainer);

            let recommendation = predictor.recommend(&sample).context("prediction failed")?;
            info!(crop = %recommendation.predicted_crop, "prediction complete");
            println!("{}", serde_json::to_string_pretty(&recommendation)?);
        }
    }

    Ok(())
}
