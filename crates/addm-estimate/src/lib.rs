pub mod dispatch;
pub mod grid;
pub mod optimize;
pub mod posterior;
pub mod resample;

pub use dispatch::Dispatcher;
pub use grid::ModelGrid;
pub use optimize::{minimize, Bound, NllObjective, OptimizationOutcome, OptimizerOptions, ParameterSpace, Variant};
pub use posterior::{ModelPosterior, ObserveSummary, PosteriorEstimator, UpdateOutcome};
pub use resample::simulate_from_posterior;
