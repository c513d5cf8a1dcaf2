//! Pipeline entry points.
//!
//! One `EmailPipeline` per process, shared across users. A run walks
//! the stages in order:
//!
//! 1. Fetch raw messages from the mail provider
//! 2. Score and filter them against the user's persona profile
//! 3. Ingest survivors (deduplicating on the provider id)
//! 4. Summarize qualifying entities, isolating per-entity failures
//! 5. Aggregate the summaries into a digest (best effort)
//! 6. Update the user's usage counters (best effort)
//!
//! At most one run per user is in flight at a time; a second request
//! observes `already_processing` instead of racing.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Duration as ChronoDuration, NaiveTime, Utc};
use tracing::{error, info, warn};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::llm::SummaryModel;
use crate::mail::{FetchQuery, MailProvider};
use crate::pipeline::aggregator;
use crate::pipeline::ingest;
use crate::pipeline::scoring::{self, ScoredMessage};
use crate::pipeline::summarizer;
use crate::pipeline::types::{PersistedEmail, RunOptions, RunOutcome, RunResult};
use crate::status::{Admission, ProcessingStatus, RunStage, RunTracker};
use crate::store::EmailStore;
use crate::usage::{self, RunTally};

/// Which entry point started the run. Decides the fetch defaults and
/// the digest type label.
#[derive(Debug, Clone, Copy)]
enum RunKind {
    Daily,
    OnDemand,
}

impl RunKind {
    fn digest_type(self) -> &'static str {
        match self {
            RunKind::Daily => "daily",
            RunKind::OnDemand => "on_demand",
        }
    }
}

/// The digest pipeline. Holds the three external seams and the
/// per-user run gate.
pub struct EmailPipeline {
    mail: Arc<dyn MailProvider>,
    model: Arc<dyn SummaryModel>,
    store: Arc<dyn EmailStore>,
    runs: RunTracker,
    config: PipelineConfig,
}

impl EmailPipeline {
    pub fn new(
        mail: Arc<dyn MailProvider>,
        model: Arc<dyn SummaryModel>,
        store: Arc<dyn EmailStore>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            mail,
            model,
            store,
            runs: RunTracker::new(),
            config,
        }
    }

    /// Run the scheduled daily digest for one user. Defaults to the
    /// previous calendar day with the daily fetch cap.
    pub async fn process_daily_emails(
        &self,
        user_id: &str,
        options: RunOptions,
    ) -> Result<RunResult> {
        self.process(user_id, options, RunKind::Daily).await
    }

    /// Run an on-demand digest for one user. Defaults to the last four
    /// hours with a small fetch cap.
    pub async fn process_on_demand(
        &self,
        user_id: &str,
        options: RunOptions,
    ) -> Result<RunResult> {
        self.process(user_id, options, RunKind::OnDemand).await
    }

    /// Current run status for a user.
    pub fn processing_status(&self, user_id: &str) -> ProcessingStatus {
        self.runs.query(user_id)
    }

    async fn process(
        &self,
        user_id: &str,
        options: RunOptions,
        kind: RunKind,
    ) -> Result<RunResult> {
        match self.runs.begin(user_id) {
            Admission::AlreadyRunning(status) => {
                info!(
                    user_id = %user_id,
                    stage = %status.stage,
                    "Run already in flight, declining"
                );
                return Ok(RunResult::empty(RunOutcome::AlreadyProcessing));
            }
            Admission::Admitted => {}
        }

        // The tracker entry must go away on every outcome, including
        // errors, or the user would be locked out until restart.
        let result = self.run_pipeline(user_id, options, kind).await;
        self.runs.finish(user_id);
        result
    }

    async fn run_pipeline(
        &self,
        user_id: &str,
        options: RunOptions,
        kind: RunKind,
    ) -> Result<RunResult> {
        let started = Instant::now();
        let profile = self.store.get_profile(user_id).await?;

        let query = self.build_query(&options, kind, profile.is_some());
        info!(
            user_id = %user_id,
            kind = kind.digest_type(),
            after = %query.after,
            before = %query.before,
            max_results = query.max_results,
            "Starting digest run"
        );

        let messages = self
            .mail
            .fetch_recent_messages(user_id, &query)
            .await
            .map_err(PipelineError::Fetch)?;
        if messages.is_empty() {
            info!(user_id = %user_id, "No messages in window");
            return Ok(RunResult::empty(RunOutcome::NoEmailsFound));
        }

        self.runs.set_stage(user_id, RunStage::Filtering);
        let scored = match &profile {
            Some(profile) => scoring::filter_and_rank(messages, profile),
            None => {
                info!(user_id = %user_id, "No persona profile, applying basic filter");
                scoring::basic_filter(messages, self.config.basic_filter_cap)
            }
        };
        if scored.is_empty() {
            info!(user_id = %user_id, "No messages survived filtering");
            return Ok(RunResult::empty(RunOutcome::NoRelevantEmails));
        }

        self.runs.set_stage(user_id, RunStage::Storing);
        let emails = self.ingest_all(user_id, &scored).await;
        if emails.is_empty() {
            // Every single insert failed; nothing downstream can run.
            // The result reads `no_relevant_emails`, so the warn log is
            // the only signal distinguishing this from a filter miss.
            warn!(
                user_id = %user_id,
                attempted = scored.len(),
                "Every ingest failed, ending run with no entities"
            );
            return Ok(RunResult::empty(RunOutcome::NoRelevantEmails));
        }
        let processed_count = emails.len();

        self.runs.set_stage(user_id, RunStage::Summarizing);
        let report = summarizer::summarize_selected(
            &self.model,
            &self.store,
            &emails,
            profile.as_ref(),
            &self.config,
        )
        .await;

        self.runs.set_stage(user_id, RunStage::Aggregating);
        let digest_id = aggregator::build_digest(
            &self.model,
            &self.store,
            user_id,
            kind.digest_type(),
            &report.summaries,
            profile.as_ref(),
            Some((query.after, query.before)),
            started,
        )
        .await;

        self.runs.set_stage(user_id, RunStage::UpdatingStats);
        let tally = RunTally {
            emails_processed: processed_count as u64,
            summaries_generated: report.summaries.len() as u64,
            api_calls: report.attempts as u64
                + if report.summaries.is_empty() { 0 } else { 1 },
        };
        if let Err(e) = usage::record_run(&self.store, user_id, tally).await {
            // Accounting never fails a completed run.
            let e = PipelineError::Accounting(e.to_string());
            error!(user_id = %user_id, error = %e, "Failed to update usage counters");
        }

        info!(
            user_id = %user_id,
            processed = processed_count,
            summarized = report.summaries.len(),
            digest = digest_id.map(|id| id.to_string()).unwrap_or_default(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Digest run complete"
        );
        Ok(RunResult {
            status: RunOutcome::Completed,
            processed_count,
            summarized_count: report.summaries.len(),
            digest_id,
            processed_at: Utc::now(),
        })
    }

    /// Resolve the fetch window and caps from options plus run-kind
    /// defaults. Profileless users get the smaller basic-filter cap.
    fn build_query(&self, options: &RunOptions, kind: RunKind, has_profile: bool) -> FetchQuery {
        let (default_after, default_before, default_max) = match kind {
            RunKind::Daily => {
                let (after, before) = previous_day_window(Utc::now());
                (after, before, self.config.daily_max_results)
            }
            RunKind::OnDemand => {
                let now = Utc::now();
                let lookback = ChronoDuration::from_std(self.config.on_demand_lookback)
                    .unwrap_or_else(|_| ChronoDuration::hours(4));
                (now - lookback, now, self.config.on_demand_max_results)
            }
        };

        let mut max_results = options.max_results.unwrap_or(default_max);
        if !has_profile {
            max_results = max_results.min(self.config.basic_filter_cap as u32);
        }

        FetchQuery {
            after: options.after.unwrap_or(default_after),
            before: options.before.unwrap_or(default_before),
            max_results,
            include_read: options.include_read.unwrap_or(true),
            exclude_promotions: options.exclude_promotions.unwrap_or(true),
            exclude_social: options.exclude_social.unwrap_or(true),
        }
    }

    /// Ingest every scored message, skipping individual failures.
    async fn ingest_all(
        &self,
        user_id: &str,
        scored: &[ScoredMessage],
    ) -> Vec<PersistedEmail> {
        let mut emails = Vec::with_capacity(scored.len());
        for entry in scored {
            match ingest::ingest(
                self.store.as_ref(),
                user_id,
                entry,
                self.config.max_body_chars,
            )
            .await
            {
                Ok(outcome) => emails.push(outcome.email),
                Err(e) => {
                    let e = PipelineError::Ingest {
                        provider_message_id: entry.message.provider_message_id.clone(),
                        reason: e.to_string(),
                    };
                    error!(user_id = %user_id, error = %e, "Skipping message");
                }
            }
        }
        emails
    }
}

/// Window bounds for a daily run, exposed for schedulers that want to
/// log or display the covered period.
pub fn previous_day_window(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let today_start = now.date_naive().and_time(NaiveTime::MIN).and_utc();
    (
        today_start - ChronoDuration::days(1),
        today_start - ChronoDuration::milliseconds(1),
    )
}
