pub mod cli;
pub mod config;
pub mod dataset;
pub mod writer;

pub use config::{ConfigError, ExperimentConfig, GridConfig, RunConfig, WorkersConfig};
pub use dataset::{dataset_from_simulated, load_dataset, load_distributions, save_dataset};
pub use writer::{write_simulation_with_manifest, ParquetWriter, RunManifest};
