//! Structured JSONL activity log with graceful degradation.

pub mod jsonl;
