mod aggregate;
mod report;
mod request;
mod run;

pub use aggregate::{Aggregated, aggregate_regions};
pub use report::{OutcomeRecord, RequestRecord, gwr_frame};
pub use request::{Aggregation, AnalysisRequest, Operation, RegionKeys};
pub use run::{AnalysisOutput, BatchReport, Orchestrator, RequestOutcome};
