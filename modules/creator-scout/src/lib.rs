pub mod evaluator;
pub mod fetcher;
pub mod pipeline;
pub mod planner;
pub mod run_log;
pub mod search;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod traits;
