use serde::Serialize;
use thiserror::Error;

/// Why an evaluator response could not be turned into a candidate.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseError {
    #[error("no JSON object found in evaluator response")]
    NoStructureFound,

    #[error("missing or empty required field: {0}")]
    MissingField(&'static str),

    #[error("score is not an integer in 1..=10")]
    InvalidScore,
}

#[derive(Error, Debug)]
pub enum ScoutError {
    #[error("External service failure: {0}")]
    TransientExternal(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Run cancelled")]
    Cancelled,
}

impl ScoutError {
    pub fn config(msg: impl Into<String>) -> Self {
        ScoutError::Config(msg.into())
    }

    /// Only configuration problems abort a run; everything else is recovered per unit.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ScoutError::Config(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_config_errors_are_fatal() {
        assert!(ScoutError::config("no search provider").is_fatal());
        assert!(!ScoutError::TransientExternal("search quota".into()).is_fatal());
        assert!(!ScoutError::Cancelled.is_fatal());
    }

    #[test]
    fn parse_errors_name_the_missing_field() {
        assert_eq!(
            ParseError::MissingField("reason").to_string(),
            "missing or empty required field: reason"
        );
    }
}
