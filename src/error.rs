//! Error types for the digest pipeline.

/// Top-level error type for the crate.
///
/// Model errors never appear here: the orchestrator and aggregator
/// isolate every [`LlmError`] at its call site, so no run surfaces one.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),
}

/// Mail-provider errors. Both variants abort the run and surface to
/// the caller; transient failures may be retried by re-invoking the run.
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("Authentication failed for account {account}: {reason}")]
    Auth { account: String, reason: String },

    #[error("Transient provider failure: {0}")]
    Transient(String),

    #[error("No mail account for user {0}")]
    AccountNotFound(String),
}

/// Durable-store errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Query failed: {0}")]
    Query(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Language-model client errors. Per-invocation; the orchestrator
/// isolates these so one failed summary never fails its siblings.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Model request failed ({provider}): {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Invalid model response: {0}")]
    InvalidResponse(String),

    #[error("Rate limited by {provider}")]
    RateLimited { provider: String },
}

/// Run-level pipeline errors. `Fetch` aborts the run; the per-entity
/// variants are logged and skipped by the stage that produced them.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Fetch failed: {0}")]
    Fetch(#[from] MailError),

    #[error("Failed to ingest message {provider_message_id}: {reason}")]
    Ingest {
        provider_message_id: String,
        reason: String,
    },

    #[error("Failed to summarize email {email_id}: {reason}")]
    Summarization { email_id: String, reason: String },

    #[error("Digest aggregation failed: {0}")]
    Aggregation(String),

    #[error("Usage accounting failed: {0}")]
    Accounting(String),
}

/// Result type alias for the crate.
pub type Result<T> = std::result::Result<T, Error>;
