//! Language-model seam for summarization.
//!
//! The pipeline asks for structured summaries; prompt construction,
//! transport, and output parsing live with the concrete client. Two
//! modes mirror the two call sites: one email at a time
//! (`summarize_email`) and the digest roll-up (`summarize_digest`).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::LlmError;
use crate::pipeline::profile::PersonaProfile;
use crate::pipeline::types::ActionItem;

/// What the model sees for one individual summary.
#[derive(Debug, Clone, Serialize)]
pub struct EmailSummaryRequest {
    pub subject: String,
    pub body: String,
    pub sender: String,
    pub received_at: DateTime<Utc>,
    pub snippet: String,
}

/// Structured result of an individual summary call.
#[derive(Debug, Clone, Deserialize)]
pub struct EmailSummaryResponse {
    pub content: String,
    pub action_items: Vec<ActionItem>,
    pub priority: String,
    pub category: String,
    pub sentiment: String,
}

/// One produced summary, carried from the orchestrator to the
/// aggregator (and into the digest prompt).
#[derive(Debug, Clone, Serialize)]
pub struct EntitySummary {
    pub email_id: Uuid,
    pub subject: String,
    pub sender: String,
    pub summary: String,
}

/// Structured result of a digest call.
#[derive(Debug, Clone, Deserialize)]
pub struct DigestResponse {
    pub content: String,
    pub action_items: Vec<ActionItem>,
    pub highlights: Vec<String>,
    pub category_counts: Vec<(String, u32)>,
}

/// Summarization model client.
///
/// Either call may fail per-invocation; the orchestrator isolates
/// individual failures and the aggregator treats a digest failure as
/// non-fatal.
#[async_trait]
pub trait SummaryModel: Send + Sync {
    /// Provider identifier for digest generation metadata.
    fn provider_name(&self) -> &str;

    /// Model identifier for digest generation metadata.
    fn model_name(&self) -> &str;

    /// Summarize one email, honoring the profile's style preferences.
    async fn summarize_email(
        &self,
        request: &EmailSummaryRequest,
        profile: Option<&PersonaProfile>,
    ) -> Result<EmailSummaryResponse, LlmError>;

    /// Roll a batch of individual summaries into one digest.
    async fn summarize_digest(
        &self,
        summaries: &[EntitySummary],
        profile: Option<&PersonaProfile>,
    ) -> Result<DigestResponse, LlmError>;
}
