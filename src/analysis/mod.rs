//! Rule evaluation, aggregation and result caching.
//!
//! [`engine::Engine`] ties the pieces together; [`job::AnalysisJob`] runs it
//! off the main thread.

pub mod aggregator;
pub mod cache;
pub mod engine;
pub mod evaluator;
pub mod job;
pub mod ranking;
pub mod window;

pub use aggregator::*;
pub use cache::{CacheKey, SourceId};
pub use engine::Engine;
pub use job::{AnalysisJob, JobStatus};
pub use ranking::worst_cells;
