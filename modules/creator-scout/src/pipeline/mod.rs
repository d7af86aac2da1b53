pub mod dedup;
pub mod driver;
pub mod parser;
pub mod ranker;
pub mod scheduler;
pub mod worker;

pub use driver::PipelineDriver;
pub use scheduler::{FanOutScheduler, ScheduleOutcome};
pub use worker::{CandidateWorker, WorkerReport};
