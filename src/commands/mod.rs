// ABOUTME: Command implementations for merge jobs
// ABOUTME: Exports the merge driver and the job description it runs

pub mod merge;

pub use merge::{merge, MergeJob, MergeSummary};
