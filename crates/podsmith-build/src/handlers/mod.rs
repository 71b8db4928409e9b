//! Synthesis stages, one per emitted concern.

mod autoscaler;
mod build_recipe;
mod compute;
mod config;
mod network_exposure;
mod pod;
mod scheduled_job;
mod secret;

pub use autoscaler::AutoscalerHandler;
pub use build_recipe::BuildRecipeHandler;
pub use compute::ComputeHandler;
pub use config::ConfigHandler;
pub use network_exposure::NetworkExposureHandler;
pub use scheduled_job::ScheduledJobHandler;
pub use secret::SecretHandler;
