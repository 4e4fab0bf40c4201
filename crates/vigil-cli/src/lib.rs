//! Command-line entry points for the Vigil pipeline phases.

pub mod bootstrap;
pub mod cli_args;
pub mod phase_runner;
pub mod startup_config;

pub use bootstrap::init_tracing;
pub use cli_args::{parse_target_args, try_parse_target_args_from, Phase, TargetArgs};
pub use phase_runner::run_phase;
pub use startup_config::VigilConfig;
