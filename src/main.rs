use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::info;

use sylva_cv::{HoldoutSplit, KnnDistanceMatch, ResamplingPlan, SpatialBlockCv};
use sylva_geo::{
    Crs, GeoTiffReader, PointReader, ResultWriter, RunName, Task, join, predict_surface,
    read_domain_polygon, write_surface,
};
use sylva_rf::{Metric, Mtry, OobMode, Predictor, RegressionForest, RegressionForestConfig};
use sylva_tune::{GridSearch, ParamGrid};

#[derive(Parser)]
#[command(name = "sylva")]
#[command(about = "Spatial Random Forest regression with autocorrelation-aware validation")]
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

/// Input raster and observation point files.
#[derive(Args, Debug, Clone)]
struct DataArgs {
    /// Path to the covariate GeoTIFF
    #[arg(long)]
    raster: PathBuf,

    /// Comma-separated band names (defaults to band_1..band_n)
    #[arg(long)]
    bands: Option<String>,

    /// Path to the observation points CSV (x, y, and attribute columns)
    #[arg(long)]
    points: PathBuf,

    /// EPSG code the point coordinates are expressed in
    #[arg(long)]
    points_epsg: u32,

    /// Name of the response column in the points CSV
    #[arg(long)]
    target: String,

    /// Expose point coordinates as two extra model features
    #[arg(long, default_value_t = false)]
    coords_as_features: bool,
}

/// Resampling strategy selection.
#[derive(Args, Debug, Clone)]
struct ResamplingArgs {
    /// Strategy: "holdout", "block", or "knndm"
    #[arg(long, default_value = "block")]
    strategy: String,

    /// Training fraction for the holdout strategy
    #[arg(long, default_value_t = 0.7)]
    ratio: f64,

    /// Number of cross-validation folds
    #[arg(long, default_value_t = 5)]
    folds: usize,

    /// Block side length in map units (block strategy)
    #[arg(long)]
    block_range: Option<f64>,

    /// Path to the prediction-domain GeoJSON polygon (knndm strategy)
    #[arg(long)]
    domain: Option<PathBuf>,

    /// Target number of domain sample points (knndm strategy)
    #[arg(long, default_value_t = 1000)]
    domain_samples: usize,
}

/// Random Forest hyperparameters.
#[derive(Args, Debug, Clone)]
struct ForestArgs {
    /// Number of trees in the forest
    #[arg(long, default_value_t = 100)]
    n_trees: usize,

    /// Maximum tree depth (unlimited if not set)
    #[arg(long)]
    max_depth: Option<usize>,

    /// Minimum observations per leaf
    #[arg(long, default_value_t = 5)]
    min_node_size: usize,

    /// Features per split: "third", "sqrt", "all", or a fixed count
    #[arg(long, default_value = "third")]
    mtry: String,
}

#[derive(Subcommand)]
enum Command {
    /// Estimate model error under a spatially-aware resampling strategy
    Evaluate {
        #[command(flatten)]
        data: DataArgs,

        #[command(flatten)]
        resampling: ResamplingArgs,

        #[command(flatten)]
        forest: ForestArgs,

        /// Evaluation metric: "rmse", "mae", or "r2"
        #[arg(long, default_value = "rmse")]
        metric: String,

        /// Run name for output files (must match [a-zA-Z0-9_-]+)
        #[arg(long)]
        run: String,

        /// Output directory for result files
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,
    },

    /// Grid-search hyperparameters over a resampling plan
    Tune {
        #[command(flatten)]
        data: DataArgs,

        #[command(flatten)]
        resampling: ResamplingArgs,

        #[command(flatten)]
        forest: ForestArgs,

        /// Comma-separated mtry candidates (empty keeps the base value)
        #[arg(long)]
        mtry_candidates: Option<String>,

        /// Comma-separated min-node-size candidates
        #[arg(long)]
        min_node_size_candidates: Option<String>,

        /// Evaluation metric: "rmse", "mae", or "r2"
        #[arg(long, default_value = "rmse")]
        metric: String,

        /// Run name for output files
        #[arg(long)]
        run: String,

        /// Output directory for result files
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,
    },

    /// Render a wall-to-wall prediction surface from a trained model
    Predict {
        /// Path to the trained model binary
        #[arg(long)]
        model: PathBuf,

        /// Path to the covariate GeoTIFF
        #[arg(long)]
        raster: PathBuf,

        /// Comma-separated band names (defaults to band_1..band_n)
        #[arg(long)]
        bands: Option<String>,

        /// Run name for output files
        #[arg(long)]
        run: String,

        /// Output directory for result files
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,
    },
}

// --- JSON stdout output structs ---

#[derive(Serialize)]
struct EvaluateOutput {
    run: String,
    strategy: String,
    n_observations: usize,
    n_dropped: usize,
    metric: String,
    fold_scores: Vec<f64>,
    score_mean: f64,
    score_std: f64,
    match_stat: Option<f64>,
    oob_rmse: Option<f64>,
    n_trees: usize,
    n_features: usize,
}

#[derive(Serialize)]
struct TuneOutput {
    run: String,
    n_observations: usize,
    n_models: usize,
    metric: String,
    best_mtry: Option<usize>,
    best_min_node_size: Option<usize>,
    best_score: f64,
}

#[derive(Serialize)]
struct PredictOutput {
    run: String,
    n_cells: usize,
    n_predicted: usize,
    surface: String,
}

fn parse_band_names(bands: &Option<String>) -> Option<Vec<String>> {
    bands
        .as_ref()
        .map(|s| s.split(',').map(|n| n.trim().to_string()).collect())
}

fn parse_candidates(list: &Option<String>) -> Result<Vec<usize>> {
    match list {
        None => Ok(Vec::new()),
        Some(raw) => raw
            .split(',')
            .map(|v| {
                v.trim()
                    .parse::<usize>()
                    .with_context(|| format!("invalid candidate value: {v}"))
            })
            .collect(),
    }
}

fn parse_metric(s: &str) -> Result<Metric> {
    match s {
        "rmse" => Ok(Metric::Rmse),
        "mae" => Ok(Metric::Mae),
        "r2" => Ok(Metric::RSquared),
        other => anyhow::bail!("unknown metric: {other} (expected rmse, mae, or r2)"),
    }
}

fn parse_mtry(s: &str) -> Result<Mtry> {
    match s {
        "third" => Ok(Mtry::Third),
        "sqrt" => Ok(Mtry::Sqrt),
        "all" => Ok(Mtry::All),
        other => other.parse::<usize>().map(Mtry::Fixed).with_context(|| {
            format!("unknown mtry: {other} (expected third, sqrt, all, or a count)")
        }),
    }
}

fn load_task(data: &DataArgs) -> Result<(Task, usize)> {
    let reader = match parse_band_names(&data.bands) {
        Some(names) => GeoTiffReader::new(&data.raster).with_band_names(names),
        None => GeoTiffReader::new(&data.raster),
    };
    let raster = reader.read().context("failed to read covariate raster")?;

    let points = PointReader::new(&data.points, Crs::epsg(data.points_epsg))
        .read()
        .context("failed to read points CSV")?;

    let joined = join(&raster, &points, &data.target).context("spatial join failed")?;
    let n_dropped = joined.n_dropped();

    let task = Task::from_joined(&joined, &data.target)
        .context("task construction failed")?
        .with_coords_as_features(data.coords_as_features);
    Ok((task, n_dropped))
}

fn build_plan(
    resampling: &ResamplingArgs,
    task: &Task,
    crs: Crs,
    seed: u64,
) -> Result<ResamplingPlan> {
    match resampling.strategy.as_str() {
        "holdout" => Ok(HoldoutSplit::new(resampling.ratio)?
            .with_seed(seed)
            .split(task.n_observations())?),
        "block" => {
            let block_range = resampling
                .block_range
                .context("--block-range is required for the block strategy")?;
            Ok(SpatialBlockCv::new(resampling.folds, block_range)?
                .with_seed(seed)
                .split(task.coords())?)
        }
        "knndm" => {
            let domain_path = resampling
                .domain
                .as_ref()
                .context("--domain is required for the knndm strategy")?;
            let domain = read_domain_polygon(domain_path, Some(crs))?;
            Ok(KnnDistanceMatch::new(resampling.folds)?
                .with_seed(seed)
                .with_n_domain_samples(resampling.domain_samples)
                .split(task.coords(), &domain)?)
        }
        other => anyhow::bail!("unknown strategy: {other} (expected holdout, block, or knndm)"),
    }
}

fn base_config(forest: &ForestArgs, seed: u64) -> Result<RegressionForestConfig> {
    Ok(RegressionForestConfig::new(forest.n_trees)?
        .with_max_depth(forest.max_depth)
        .with_min_node_size(forest.min_node_size)
        .with_mtry(parse_mtry(&forest.mtry)?)
        .with_seed(seed))
}

fn mean_and_std(scores: &[f64]) -> (f64, f64) {
    let mean = scores.iter().sum::<f64>() / scores.len() as f64;
    let variance = scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / scores.len() as f64;
    (mean, variance.sqrt())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match (cli.verbose, cli.quiet) {
        (true, _) => "debug",
        (_, true) => "error",
        _ => "info",
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    // Configure Rayon thread pool
    if let Some(threads) = cli.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("failed to configure thread pool")?;
        info!(threads, "thread pool configured");
    }

    match cli.command {
        Command::Evaluate {
            data,
            resampling,
            forest,
            metric,
            run,
            output_dir,
        } => {
            let run_name = RunName::new(run.clone())?;
            let metric_parsed = parse_metric(&metric)?;

            // 1. Load, join, and validate the dataset
            let (task, n_dropped) = load_task(&data)?;
            info!(n_observations = task.n_observations(), "task assembled");

            // 2. Build the resampling plan
            let plan = build_plan(&resampling, &task, Crs::epsg(data.points_epsg), cli.seed)?;
            info!(strategy = %plan.strategy(), n_folds = plan.n_folds(), "resampling plan built");

            // 3. Fit and score one model per fold
            let features = task.feature_matrix();
            let names = task.feature_names();
            let config = base_config(&forest, cli.seed)?;

            let mut fold_scores = Vec::with_capacity(plan.n_folds());
            for (fold_idx, fold) in plan.folds().iter().enumerate() {
                let train_x: Vec<Vec<f64>> =
                    fold.train.iter().map(|&i| features[i].clone()).collect();
                let train_y: Vec<f64> = fold.train.iter().map(|&i| task.targets()[i]).collect();
                let test_x: Vec<Vec<f64>> =
                    fold.test.iter().map(|&i| features[i].clone()).collect();
                let test_y: Vec<f64> = fold.test.iter().map(|&i| task.targets()[i]).collect();

                let fold_config = config
                    .clone()
                    .with_seed(cli.seed.wrapping_add(fold_idx as u64));
                let result = fold_config
                    .fit(&train_x, &train_y, &names)
                    .context("fold training failed")?;
                let predictions = result.forest().predict_rows(&test_x)?;
                let score = metric_parsed.evaluate(&predictions, &test_y)?;
                info!(fold = fold_idx, score, "fold scored");
                fold_scores.push(score);
            }
            let (score_mean, score_std) = mean_and_std(&fold_scores);
            info!(score_mean, score_std, "evaluation complete");

            // 4. Train the final model on all observations with OOB
            let final_result = config
                .with_oob_mode(OobMode::Enabled)
                .fit(&features, task.targets(), &names)
                .context("final model training failed")?;
            let oob_rmse = final_result.oob_score().map(|s| s.rmse);

            // 5. Save the model and write artifacts
            let writer = ResultWriter::new(&output_dir, run_name)?;
            final_result
                .forest()
                .save(writer.model_path())
                .context("failed to save model")?;

            writer.write_evaluation(
                &plan.strategy().to_string(),
                &metric_parsed.to_string(),
                &fold_scores,
                score_mean,
                score_std,
                plan.match_stat(),
                final_result.importances(),
            )?;

            // 6. Print summary
            let output = EvaluateOutput {
                run,
                strategy: plan.strategy().to_string(),
                n_observations: task.n_observations(),
                n_dropped,
                metric: metric_parsed.to_string(),
                fold_scores,
                score_mean,
                score_std,
                match_stat: plan.match_stat(),
                oob_rmse,
                n_trees: forest.n_trees,
                n_features: names.len(),
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }

        Command::Tune {
            data,
            resampling,
            forest,
            mtry_candidates,
            min_node_size_candidates,
            metric,
            run,
            output_dir,
        } => {
            let run_name = RunName::new(run.clone())?;
            let metric_parsed = parse_metric(&metric)?;

            // 1. Load the dataset and build the resampling plan
            let (task, _) = load_task(&data)?;
            let plan = build_plan(&resampling, &task, Crs::epsg(data.points_epsg), cli.seed)?;
            info!(strategy = %plan.strategy(), n_folds = plan.n_folds(), "resampling plan built");

            // 2. Assemble and run the grid search
            let grid = ParamGrid::new()
                .with_mtry_candidates(parse_candidates(&mtry_candidates)?)?
                .with_min_node_size_candidates(parse_candidates(&min_node_size_candidates)?)?;
            let config = base_config(&forest, cli.seed)?;

            let features = task.feature_matrix();
            let names = task.feature_names();
            let result = GridSearch::new(config.clone(), grid)
                .with_metric(metric_parsed)
                .run(&features, task.targets(), &names, &plan)
                .context("grid search failed")?;
            info!(
                n_models = result.n_models(),
                best_score = result.best_score(),
                "grid search complete"
            );

            // 3. Refit on all observations with the winning combination
            let best = result.best_params();
            let final_result = best
                .apply(&config)
                .fit(&features, task.targets(), &names)
                .context("final model training failed")?;

            // 4. Write artifacts and the model
            let writer = ResultWriter::new(&output_dir, run_name)?;
            writer.write_tuning(&result)?;
            final_result
                .forest()
                .save(writer.model_path())
                .context("failed to save model")?;

            // 5. Print summary
            let output = TuneOutput {
                run,
                n_observations: task.n_observations(),
                n_models: result.n_models(),
                metric: metric_parsed.to_string(),
                best_mtry: best.mtry,
                best_min_node_size: best.min_node_size,
                best_score: result.best_score(),
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }

        Command::Predict {
            model,
            raster,
            bands,
            run,
            output_dir,
        } => {
            let run_name = RunName::new(run.clone())?;

            // 1. Load the model
            let forest = RegressionForest::load(&model).context("failed to load model")?;
            info!(
                n_trees = forest.n_trees(),
                n_features = forest.n_features(),
                "model loaded"
            );

            // 2. Read the covariate raster
            let reader = match parse_band_names(&bands) {
                Some(names) => GeoTiffReader::new(&raster).with_band_names(names),
                None => GeoTiffReader::new(&raster),
            };
            let covariates = reader.read().context("failed to read covariate raster")?;

            // 3. Render the surface; coordinate features are detected
            //    from the model's training schema
            let feature_names = forest.feature_names().to_vec();
            let coords_as_features = feature_names.iter().any(|n| n == "x" || n == "y");
            let surface =
                predict_surface(&forest, &covariates, &feature_names, coords_as_features)?;
            let n_predicted = surface.bands()[0]
                .data
                .iter()
                .filter(|v| v.is_finite())
                .count();

            // 4. Write the surface and summary
            let writer = ResultWriter::new(&output_dir, run_name)?;
            let surface_path = writer.surface_path();
            write_surface(&surface_path, &surface)?;
            writer.write_prediction_summary(surface.n_cells(), n_predicted, &surface_path)?;

            // 5. Print summary
            let output = PredictOutput {
                run,
                n_cells: surface.n_cells(),
                n_predicted,
                surface: surface_path.display().to_string(),
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}
