//! Usage accountant: per-user monotonic counters with lazy monthly
//! reset. Runs after the pipeline; failures here are logged by the
//! caller and never fail the run.

use std::sync::Arc;

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::StoreError;
use crate::store::EmailStore;

/// Per-user usage counters. Monotonically increasing within a
/// calendar month; zeroed lazily on the first write of a new month.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageCounters {
    pub emails_processed: u64,
    pub summaries_generated: u64,
    pub api_calls: u64,
    pub last_reset_at: DateTime<Utc>,
}

impl UsageCounters {
    /// Fresh counters, reset-stamped at `now`.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            emails_processed: 0,
            summaries_generated: 0,
            api_calls: 0,
            last_reset_at: now,
        }
    }

    /// Zero the counters if the stored reset month differs from the
    /// current one. Returns whether a reset happened.
    pub fn reset_if_new_month(&mut self, now: DateTime<Utc>) -> bool {
        let same_month = self.last_reset_at.year() == now.year()
            && self.last_reset_at.month() == now.month();
        if same_month {
            return false;
        }
        *self = Self::new(now);
        true
    }
}

/// Tallies from one completed run.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunTally {
    /// Entities ingested or reused this run.
    pub emails_processed: u64,
    /// Individual summaries successfully produced.
    pub summaries_generated: u64,
    /// Model invocations made (individual attempts + digest call).
    pub api_calls: u64,
}

/// Apply a run's tally to the user's counters, resetting first when
/// the calendar month rolled over.
pub async fn record_run(
    store: &Arc<dyn EmailStore>,
    user_id: &str,
    tally: RunTally,
) -> Result<(), StoreError> {
    let now = Utc::now();
    let mut counters = store
        .get_usage(user_id)
        .await?
        .unwrap_or_else(|| UsageCounters::new(now));

    if counters.reset_if_new_month(now) {
        debug!(user_id = %user_id, "Usage counters reset for new month");
    }

    counters.emails_processed += tally.emails_processed;
    counters.summaries_generated += tally.summaries_generated;
    counters.api_calls += tally.api_calls;

    store.put_usage(user_id, &counters).await?;

    debug!(
        user_id = %user_id,
        emails_processed = counters.emails_processed,
        summaries_generated = counters.summaries_generated,
        api_calls = counters.api_calls,
        "Usage counters updated"
    );
    Ok(())
}
