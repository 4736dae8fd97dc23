use addm_core::ModelParameters;
use addm_io::cli::{
    run_addm_recover, run_ddm_recover, run_estimate, run_optimize, run_simulate, Cli, Commands,
};
use addm_io::config::{example_config, RunConfig};
use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, Level};
use tracing_subscriber::FmtSubscriber;

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set subscriber");
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let mut config = match &cli.config {
        Some(path) => RunConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => RunConfig::default(),
    };
    if cli.threads.is_some() {
        config.workers.threads = cli.threads;
    }
    config.validate().context("Invalid run configuration")?;
    debug!(?config, "configuration resolved");

    match cli.command {
        Commands::Example => {
            println!("{}", example_config());
        }

        Commands::DdmRecover {
            d,
            sigma,
            trials_per_condition,
            range_d,
            range_sigma,
            seed,
        } => {
            if let Some(seed) = seed {
                config.simulation.seed = seed;
            }
            run_ddm_recover(
                &config,
                ModelParameters::ddm(d, sigma),
                trials_per_condition,
                range_d,
                range_sigma,
            )?;
        }

        Commands::AddmRecover {
            fixations,
            d,
            sigma,
            theta,
            trials_per_condition,
            range_d,
            range_theta,
            range_sigma,
            seed,
        } => {
            if let Some(seed) = seed {
                config.simulation.seed = seed;
            }
            run_addm_recover(
                &config,
                &fixations,
                ModelParameters::addm(d, theta, sigma),
                trials_per_condition,
                range_d,
                range_theta,
                range_sigma,
            )?;
        }

        Commands::Simulate {
            model,
            d,
            sigma,
            theta,
            fixations,
            trials_per_condition,
            seed,
            out,
            dataset,
        } => {
            if let Some(seed) = seed {
                config.simulation.seed = seed;
            }
            run_simulate(
                &config,
                model,
                d,
                sigma,
                theta,
                fixations.as_deref(),
                trials_per_condition,
                &out,
                dataset.as_deref(),
            )?;
        }

        Commands::Estimate { data, subject, out } => {
            run_estimate(&config, &data, subject.as_deref(), out.as_deref())?;
        }

        Commands::Optimize {
            data,
            model,
            trials_per_subject,
            initial,
            num_iterations,
            step_size,
            seed,
        } => {
            if let Some(seed) = seed {
                config.simulation.seed = seed;
            }
            if let Some(hops) = num_iterations {
                config.optimizer.num_iterations = hops;
            }
            if let Some(step) = step_size {
                config.optimizer.step_size = step;
            }
            run_optimize(&config, &data, model, trials_per_subject, initial)?;
        }
    }

    Ok(())
}
