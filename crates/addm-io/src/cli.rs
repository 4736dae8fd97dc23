use crate::config::RunConfig;
use crate::dataset::{dataset_from_simulated, load_dataset, load_distributions, save_dataset};
use crate::writer::{write_simulation_with_manifest, RunManifest};
use addm_core::{Dataset, LikelihoodEngine, ModelParameters, Trial};
use addm_estimate::{
    minimize, Dispatcher, ModelGrid, ModelPosterior, NllObjective, ParameterSpace, PosteriorEstimator, Variant,
};
use addm_sampler::{summarize, AddmSimulator, DdmSimulator, SimulatedTrial, TrialSimulator};
use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser)]
#[command(name = "addm")]
#[command(version)]
#[command(about = "Drift-diffusion and attentional drift-diffusion model fitting")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to a TOML run configuration
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Size of the worker pool (overrides [workers] threads)
    #[arg(long, global = true)]
    pub threads: Option<usize>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Simulate DDM trials from known parameters and recover them on a grid
    DdmRecover {
        #[arg(long, default_value = "0.006")]
        d: f64,

        #[arg(long, default_value = "0.08")]
        sigma: f64,

        /// Trials generated per (value left, value right) condition
        #[arg(long)]
        trials_per_condition: Option<usize>,

        /// Search values for d (overrides [grid] d)
        #[arg(long, num_args = 1..)]
        range_d: Option<Vec<f64>>,

        /// Search values for sigma (overrides [grid] sigma)
        #[arg(long, num_args = 1..)]
        range_sigma: Option<Vec<f64>>,

        #[arg(long)]
        seed: Option<u64>,
    },

    /// Simulate aDDM trials from empirical fixations and recover the parameters
    AddmRecover {
        /// Empirical fixation distributions (JSON)
        #[arg(long)]
        fixations: PathBuf,

        #[arg(long, default_value = "0.006")]
        d: f64,

        #[arg(long, default_value = "0.08")]
        sigma: f64,

        #[arg(long, default_value = "0.5")]
        theta: f64,

        #[arg(long)]
        trials_per_condition: Option<usize>,

        #[arg(long, num_args = 1..)]
        range_d: Option<Vec<f64>>,

        #[arg(long, num_args = 1..)]
        range_theta: Option<Vec<f64>>,

        #[arg(long, num_args = 1..)]
        range_sigma: Option<Vec<f64>>,

        #[arg(long)]
        seed: Option<u64>,
    },

    /// Simulate trials and write them to Parquet plus a dataset file
    Simulate {
        #[arg(long, value_enum, default_value = "ddm")]
        model: ModelKind,

        #[arg(long, default_value = "0.006")]
        d: f64,

        #[arg(long, default_value = "0.08")]
        sigma: f64,

        #[arg(long, default_value = "0.5")]
        theta: f64,

        /// Empirical fixation distributions (JSON), required for aDDM
        #[arg(long)]
        fixations: Option<PathBuf>,

        #[arg(long)]
        trials_per_condition: Option<usize>,

        #[arg(long)]
        seed: Option<u64>,

        /// Output Parquet file
        #[arg(long)]
        out: PathBuf,

        /// Also write the trials as a dataset JSON file
        #[arg(long)]
        dataset: Option<PathBuf>,
    },

    /// Grid posterior over the [grid] models for a dataset
    Estimate {
        /// Dataset JSON file
        #[arg(long)]
        data: PathBuf,

        /// Only use this subject's trials
        #[arg(long)]
        subject: Option<String>,

        /// Write the posterior as JSON
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Bounded maximum-likelihood search over a dataset
    Optimize {
        #[arg(long)]
        data: PathBuf,

        #[arg(long, value_enum, default_value = "addm")]
        model: ModelKind,

        /// Trials drawn per subject for each evaluation; 0 uses all
        #[arg(long, default_value = "100")]
        trials_per_subject: usize,

        /// Starting point, in the order d [theta] sigma
        #[arg(long, num_args = 2..=3)]
        initial: Option<Vec<f64>>,

        /// Basin-hopping rounds (overrides [optimizer] num_iterations)
        #[arg(long)]
        num_iterations: Option<u64>,

        /// Random displacement per coordinate before each hop
        #[arg(long)]
        step_size: Option<f64>,

        #[arg(long)]
        seed: Option<u64>,
    },

    /// Print an example configuration file
    Example,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ModelKind {
    #[value(name = "ddm")]
    Ddm,
    #[value(name = "addm")]
    Addm,
}

impl From<ModelKind> for Variant {
    fn from(kind: ModelKind) -> Self {
        match kind {
            ModelKind::Ddm => Variant::Ddm,
            ModelKind::Addm => Variant::Addm,
        }
    }
}

/// Value pairs of the DDM recovery experiment.
pub fn ddm_conditions() -> Vec<(f64, f64)> {
    vec![
        (0.0, 0.0),
        (0.0, 1.0),
        (0.0, 2.0),
        (0.0, 3.0),
        (1.0, 1.0),
        (1.0, 2.0),
        (1.0, 3.0),
        (2.0, 2.0),
        (2.0, 3.0),
    ]
}

/// Value pairs from the orientation task: every ordered pair of distinct
/// orientations in -15..=15 degrees (step 5), valued `|(|o| - 15) / 5|`.
pub fn orientation_conditions() -> Vec<(f64, f64)> {
    let value = |o: i32| ((o.abs() - 15) as f64 / 5.0).abs();
    let orientations: Vec<i32> = (-15..=15).step_by(5).collect();
    let mut conditions = Vec::new();
    for &left in &orientations {
        for &right in &orientations {
            if left != right {
                conditions.push((value(left), value(right)));
            }
        }
    }
    conditions
}

/// Conditions and trials per condition, preferring flags over the file and
/// the file over the command's defaults.
fn experiment(
    config: &RunConfig,
    default_conditions: fn() -> Vec<(f64, f64)>,
    trials: Option<usize>,
    fallback: usize,
) -> (Vec<(f64, f64)>, usize) {
    let conditions = config.experiment.conditions.clone().unwrap_or_else(default_conditions);
    let per_condition = trials.or(config.experiment.trials_per_condition).unwrap_or(fallback);
    (conditions, per_condition)
}

fn dispatcher(config: &RunConfig) -> anyhow::Result<Dispatcher> {
    Dispatcher::new(config.workers.threads).context("building worker pool")
}

fn print_posterior(posterior: &ModelPosterior) {
    println!();
    println!("Posterior:");
    println!("==========");
    for (model, p) in posterior.iter() {
        println!("P{model} = {p:.6}");
    }
    println!("Sum: {:.6}", posterior.sum());
    let (best, p) = posterior.map_estimate();
    println!("MAP estimate: {best} with probability {p:.4}");
}

fn recover(config: &RunConfig, grid: &ModelGrid, trials: &[SimulatedTrial]) -> anyhow::Result<()> {
    let stats = summarize(trials);
    println!("Trials simulated: {}", stats.n_trials);
    println!("Mean RT: {:.1} ms (sd {:.1})", stats.mean_rt, stats.rt_std);
    println!("Left choices: {:.1}%", stats.left_fraction * 100.0);

    info!(models = grid.len(), "starting grid search");
    let mut estimator = PosteriorEstimator::new(grid, LikelihoodEngine::new(config.engine.clone()), dispatcher(config)?);
    let observed: Vec<Trial> = trials.iter().map(|s| s.trial.clone()).collect();
    let summary = estimator.observe_all(&observed)?;
    println!("Trials used: {} (skipped {})", summary.updated, summary.skipped);
    print_posterior(estimator.posterior());
    Ok(())
}

pub fn run_ddm_recover(
    config: &RunConfig,
    params: ModelParameters,
    trials_per_condition: Option<usize>,
    range_d: Option<Vec<f64>>,
    range_sigma: Option<Vec<f64>>,
) -> anyhow::Result<()> {
    let params = config.grid.shape(params);
    let (conditions, per_condition) = experiment(config, ddm_conditions, trials_per_condition, 800);
    println!("DDM recovery");
    println!("============");
    println!("Generating model: {params}");
    println!("Conditions: {}, trials per condition: {}", conditions.len(), per_condition);

    let simulator = DdmSimulator::new(params, config.simulation.clone())?;
    let trials = dispatcher(config)?
        .install(|| simulator.simulate_conditions(&conditions, per_condition, config.simulation.seed))?;

    let grid = ModelGrid::ddm(
        &range_d.unwrap_or_else(|| config.grid.d.clone()),
        &range_sigma.unwrap_or_else(|| config.grid.sigma.clone()),
    )?
    .with_barrier(config.grid.barrier, config.grid.decay)?;
    recover(config, &grid, &trials)
}

#[allow(clippy::too_many_arguments)]
pub fn run_addm_recover(
    config: &RunConfig,
    fixations: &Path,
    params: ModelParameters,
    trials_per_condition: Option<usize>,
    range_d: Option<Vec<f64>>,
    range_theta: Option<Vec<f64>>,
    range_sigma: Option<Vec<f64>>,
) -> anyhow::Result<()> {
    let params = config.grid.shape(params);
    let distributions = load_distributions(fixations)?;
    let (conditions, per_condition) = experiment(config, orientation_conditions, trials_per_condition, 200);
    println!("aDDM recovery");
    println!("=============");
    println!("Generating model: {params}");
    println!("Conditions: {}, trials per condition: {}", conditions.len(), per_condition);

    let simulator = AddmSimulator::new(params, distributions, config.simulation.clone())?;
    let trials = dispatcher(config)?
        .install(|| simulator.simulate_conditions(&conditions, per_condition, config.simulation.seed))?;

    let theta = range_theta
        .or_else(|| config.grid.theta.clone())
        .unwrap_or_else(|| vec![0.4, 0.5, 0.6]);
    let grid = ModelGrid::addm(
        &range_d.unwrap_or_else(|| config.grid.d.clone()),
        &theta,
        &range_sigma.unwrap_or_else(|| config.grid.sigma.clone()),
    )?
    .with_barrier(config.grid.barrier, config.grid.decay)?;
    recover(config, &grid, &trials)
}

#[allow(clippy::too_many_arguments)]
pub fn run_simulate(
    config: &RunConfig,
    model: ModelKind,
    d: f64,
    sigma: f64,
    theta: f64,
    fixations: Option<&Path>,
    trials_per_condition: Option<usize>,
    out: &Path,
    dataset_out: Option<&Path>,
) -> anyhow::Result<()> {
    let seed = config.simulation.seed;
    let pool = dispatcher(config)?;
    let (trials, params) = match model {
        ModelKind::Ddm => {
            let params = config.grid.shape(ModelParameters::ddm(d, sigma));
            let (conditions, per_condition) = experiment(config, ddm_conditions, trials_per_condition, 800);
            let simulator = DdmSimulator::new(params, config.simulation.clone())?;
            (pool.install(|| simulator.simulate_conditions(&conditions, per_condition, seed))?, params)
        }
        ModelKind::Addm => {
            let Some(fixations) = fixations else {
                bail!("aDDM simulation needs --fixations");
            };
            let params = config.grid.shape(ModelParameters::addm(d, theta, sigma));
            let (conditions, per_condition) = experiment(config, orientation_conditions, trials_per_condition, 200);
            let simulator = AddmSimulator::new(params, load_distributions(fixations)?, config.simulation.clone())?;
            (pool.install(|| simulator.simulate_conditions(&conditions, per_condition, seed))?, params)
        }
    };

    println!("Simulation");
    println!("==========");
    println!("Model: {params}");
    println!("Seed: {seed}");
    println!("Output: {}", out.display());

    let manifest = RunManifest::new(seed, params, config.simulation.time_step_ms);
    let manifest_path = out.with_extension("manifest.json");
    write_simulation_with_manifest(&trials, &manifest, out, &manifest_path)?;

    if let Some(path) = dataset_out {
        save_dataset(&dataset_from_simulated(&manifest.run_id, &trials), path)?;
        println!("Wrote dataset to {}", path.display());
    }

    let stats = summarize(&trials);
    println!();
    println!("Summary Statistics:");
    println!("==================");
    println!("Trials: {}", stats.n_trials);
    println!("Mean RT: {:.1} ms (sd {:.1})", stats.mean_rt, stats.rt_std);
    println!("Left choices: {:.1}%", stats.left_fraction * 100.0);
    Ok(())
}

fn select_subject(dataset: Dataset, subject: Option<&str>) -> anyhow::Result<Dataset> {
    match subject {
        None => Ok(dataset),
        Some(name) => {
            let Some(trials) = dataset.subjects.get(name) else {
                bail!("subject {name:?} not found in dataset");
            };
            Ok(Dataset::single_subject(name, trials.clone()))
        }
    }
}

pub fn run_estimate(config: &RunConfig, data: &Path, subject: Option<&str>, out: Option<&Path>) -> anyhow::Result<()> {
    let dataset = select_subject(load_dataset(data)?, subject)?;
    let grid = config.grid.build()?;
    println!("Grid estimation");
    println!("===============");
    println!("Subjects: {}, trials: {}", dataset.subjects.len(), dataset.n_trials());
    println!("Models: {}", grid.len());

    let mut estimator = PosteriorEstimator::new(&grid, LikelihoodEngine::new(config.engine.clone()), dispatcher(config)?);
    let trials: Vec<Trial> = dataset.trials().cloned().collect();
    let summary = estimator.observe_all(&trials)?;
    println!("Trials used: {} (skipped {})", summary.updated, summary.skipped);
    print_posterior(estimator.posterior());

    if let Some(path) = out {
        let json = serde_json::to_string_pretty(estimator.posterior())?;
        std::fs::write(path, json).with_context(|| format!("writing posterior to {}", path.display()))?;
        println!("Wrote posterior to {}", path.display());
    }
    Ok(())
}

pub fn run_optimize(
    config: &RunConfig,
    data: &Path,
    model: ModelKind,
    trials_per_subject: usize,
    initial: Option<Vec<f64>>,
) -> anyhow::Result<()> {
    let dataset = load_dataset(data)?;
    let mut space = match model {
        ModelKind::Ddm => ParameterSpace::ddm_default(),
        ModelKind::Addm => ParameterSpace::addm_default(),
    };
    space.barrier = config.grid.barrier;
    space.decay = config.grid.decay;
    let initial = initial.unwrap_or_else(|| match model {
        ModelKind::Ddm => vec![0.0002, 0.08],
        ModelKind::Addm => vec![0.0002, 0.5, 0.08],
    });
    if initial.len() != Variant::from(model).dim() {
        bail!("--initial needs {} values for {:?}", Variant::from(model).dim(), model);
    }

    println!("Optimization");
    println!("============");
    println!("Subjects: {}, trials: {}", dataset.subjects.len(), dataset.n_trials());
    println!("Trials per subject per evaluation: {}", trials_per_subject);
    println!(
        "Basin hops: {}, step size: {}",
        config.optimizer.num_iterations, config.optimizer.step_size
    );

    let engine = LikelihoodEngine::new(config.engine.clone());
    let objective = NllObjective::new(&engine, &dataset, space, trials_per_subject, config.simulation.seed)?;
    let outcome = dispatcher(config)?.install(|| minimize(&objective, &initial, &config.optimizer))?;

    println!();
    println!("Best parameters: {}", outcome.params);
    println!("Negative log-likelihood: {:.4}", outcome.nll);
    println!("Iterations: {}, evaluations: {}", outcome.iterations, outcome.evaluations);
    println!("Accepted hops: {}/{}", outcome.accepted, config.optimizer.num_iterations);
    Ok(())
}
