pub mod config;
pub mod error;
pub mod types;

pub use config::{AppConfig, EvaluationMode, PipelineConfig};
pub use error::{ParseError, ScoutError};
pub use types::*;
