pub mod orchestrator;
pub mod results;
pub mod worker;

pub use orchestrator::Orchestrator;
pub use results::{CollectionResult, ReportRow, ResultSet, NA, NOT_PROCESSED};
pub use worker::{partition_targets, Worker};
