//! Mailbrief: per-user email digest pipeline.
//!
//! Fetches a user's recent mail, scores and filters it against their
//! persona profile, persists deduplicated records, summarizes the
//! relevant ones, and rolls the summaries into a daily digest.

pub mod config;
pub mod error;
pub mod llm;
pub mod mail;
pub mod pipeline;
pub mod status;
pub mod store;
pub mod usage;
