//! Scenarios: file format, discovery, the built-in corpus, the runner, and
//! a seeded generator.

pub mod corpus;
pub mod format;
pub mod generate;
pub mod loader;
pub mod runner;
