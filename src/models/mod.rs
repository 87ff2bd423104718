pub mod job;
pub mod loaders;
pub mod outcome;

pub use job::{Job, JobId};
pub use loaders::load_job_ids;
pub use outcome::{BatchSummary, FailedJob, JobOutcome, ResultEvent, ResultMessage, ScrapeResult};
