//! The digest pipeline: fetch, score, ingest, summarize, aggregate,
//! account.
//!
//! [`processor::EmailPipeline`] is the entry point; the submodules are
//! the individual stages and their shared types.

pub mod aggregator;
pub mod ingest;
pub mod processor;
pub mod profile;
pub mod scoring;
pub mod summarizer;
pub mod types;

pub use processor::EmailPipeline;
