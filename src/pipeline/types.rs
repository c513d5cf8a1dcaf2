//! Shared types for the digest pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ── Raw message ─────────────────────────────────────────────────────

/// Unprocessed message as returned by the mail provider.
///
/// Transient: owned by the fetch step and never persisted directly.
/// The ingest step normalizes it into a [`PersistedEmail`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawMessage {
    /// Provider-native message id. Dedup key together with the user id.
    pub provider_message_id: String,
    /// Provider-native thread id.
    pub thread_id: Option<String>,
    pub subject: String,
    /// Sender address (may include a display name).
    pub sender: String,
    pub recipients: Vec<String>,
    /// Plain-text body.
    pub body: String,
    /// HTML body, when the provider supplies one.
    pub html_body: Option<String>,
    /// Provider-generated preview snippet.
    pub snippet: String,
    pub labels: Vec<String>,
    /// Provider-flagged important.
    pub is_important: bool,
    pub is_read: bool,
    pub received_at: DateTime<Utc>,
    pub attachments: Vec<Attachment>,
}

/// Attachment metadata (content stays with the provider).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub filename: String,
    pub mime_type: String,
}

// ── Persisted email ─────────────────────────────────────────────────

/// Canonical, deduplicated record of a message.
///
/// Unique on `(user_id, provider_message_id)`: the store enforces
/// this key. Created on first ingest; later ingests of the same key
/// return the existing record unchanged. Mutated only when a summary
/// is attached or flags change; never deleted by the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedEmail {
    pub record_id: Uuid,
    pub user_id: String,
    pub provider_message_id: String,
    pub thread_id: Option<String>,
    pub subject: String,
    pub sender: String,
    pub recipients: Vec<String>,
    /// Normalized body (whitespace collapsed, footers stripped, truncated).
    pub body: String,
    pub snippet: String,
    pub labels: Vec<String>,
    pub is_important: bool,
    /// Scorer output, clamped to >= 0.
    pub relevance_score: u32,
    /// Resolved category label.
    pub category: String,
    pub flags: EmailFlags,
    pub summary: Option<EmailSummary>,
    pub received_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Read/archived/starred state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmailFlags {
    pub is_read: bool,
    pub is_archived: bool,
    pub is_starred: bool,
}

/// Generated summary embedded in a [`PersistedEmail`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailSummary {
    pub content: String,
    pub action_items: Vec<ActionItem>,
    /// Model-assigned priority label ("high", "medium", "low").
    pub priority: String,
    pub category: String,
    pub sentiment: String,
    pub generated_at: DateTime<Utc>,
}

// ── Action items ────────────────────────────────────────────────────

/// A task extracted at summarization time.
///
/// Transitions pending → completed exactly once; the pipeline never
/// reopens a completed item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionItem {
    pub description: String,
    pub priority: String,
    pub due_date: Option<DateTime<Utc>>,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    /// Record id of the email this item came from, when known.
    pub source_email_id: Option<Uuid>,
}

impl ActionItem {
    /// Mark the item completed. No-op if already completed.
    pub fn complete(&mut self, at: DateTime<Utc>) {
        if !self.completed {
            self.completed = true;
            self.completed_at = Some(at);
        }
    }
}

// ── Digest ──────────────────────────────────────────────────────────

/// Aggregate of one run: composed from the batch of individual
/// summaries. Created once per completed run that produced at least
/// one summary; immutable after creation as far as the pipeline is
/// concerned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Digest {
    pub digest_id: Uuid,
    pub user_id: String,
    /// "daily" or "on_demand".
    pub digest_type: String,
    pub content: String,
    /// Ordered, deduplicated record ids of the contributing emails.
    pub email_ids: Vec<Uuid>,
    pub action_items: Vec<ActionItem>,
    pub highlights: Vec<String>,
    pub category_counts: Vec<(String, u32)>,
    /// Inclusive period covered; `period_start <= period_end`.
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub generated_by: GenerationMetadata,
    pub processing_time_ms: u64,
    pub created_at: DateTime<Utc>,
}

/// Which model produced a digest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationMetadata {
    pub provider: String,
    pub model: String,
}

// ── Run options and result ──────────────────────────────────────────

/// Caller-supplied knobs for one run. `None` fields fall back to the
/// pipeline defaults for the run kind (daily vs on-demand).
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub max_results: Option<u32>,
    pub include_read: Option<bool>,
    pub exclude_promotions: Option<bool>,
    pub exclude_social: Option<bool>,
    /// Fetch window start; default depends on the run kind.
    pub after: Option<DateTime<Utc>>,
    /// Fetch window end; default depends on the run kind.
    pub before: Option<DateTime<Utc>>,
}

/// Terminal status of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// Another run for this user was already in flight.
    AlreadyProcessing,
    /// The provider returned zero messages for the window.
    NoEmailsFound,
    /// Messages were fetched but none survived the persona filter.
    /// Also reported when every surviving message failed to persist;
    /// the run log carries the distinction.
    NoRelevantEmails,
    Completed,
}

/// Result of one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub status: RunOutcome,
    /// Entities ingested or reused this run.
    pub processed_count: usize,
    /// Individual summaries successfully produced.
    pub summarized_count: usize,
    pub digest_id: Option<Uuid>,
    pub processed_at: DateTime<Utc>,
}

impl RunResult {
    /// A run that ended before any entity was touched.
    pub fn empty(status: RunOutcome) -> Self {
        Self {
            status,
            processed_count: 0,
            summarized_count: 0,
            digest_id: None,
            processed_at: Utc::now(),
        }
    }
}
