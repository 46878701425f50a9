pub mod assemble;
pub mod encoding;
pub mod engine;
pub mod error;
pub mod estimator;
pub mod model_input;
pub mod nearest;
pub mod output;
pub mod partition;
pub mod roles;
pub mod separation;
pub mod supplementary;
pub mod temporal;
pub mod tracking;

pub use engine::{EngineConfig, EngineOutput, FeatureEngine, RunReport};
pub use error::EngineError;
