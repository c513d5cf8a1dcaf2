//! Mail-provider seam: pure I/O, no business logic.
//!
//! The concrete client (Gmail, IMAP, ...) lives outside this crate;
//! the pipeline only depends on this trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::MailError;
use crate::pipeline::types::RawMessage;

/// Query options for one fetch. Built by the pipeline from
/// `RunOptions` plus the run-kind defaults.
#[derive(Debug, Clone)]
pub struct FetchQuery {
    pub after: DateTime<Utc>,
    pub before: DateTime<Utc>,
    pub max_results: u32,
    pub include_read: bool,
    /// Ask the provider to pre-filter promotional tabs/labels.
    pub exclude_promotions: bool,
    /// Ask the provider to pre-filter social tabs/labels.
    pub exclude_social: bool,
}

/// Provider client that turns stored credentials into raw messages.
#[async_trait]
pub trait MailProvider: Send + Sync {
    /// Fetch the user's recent messages for the query window.
    ///
    /// Fails with [`MailError::Auth`] when credentials are invalid and
    /// [`MailError::Transient`] on upstream hiccups; both abort the
    /// run and surface to the caller.
    async fn fetch_recent_messages(
        &self,
        user_id: &str,
        query: &FetchQuery,
    ) -> Result<Vec<RawMessage>, MailError>;
}
