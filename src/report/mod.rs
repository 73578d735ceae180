//! Reporting: per-scenario transcripts and the run summary.

pub mod summary;
pub mod transcript;
