//! Summarization orchestrator: decides which entities earn a
//! summary and invokes the model per entity, isolating failures.
//!
//! Flow:
//! 1. `should_summarize()` per entity (pure decision)
//! 2. Bounded batches of concurrent model calls, short pause between
//!    batches (upstream rate limits)
//! 3. Gather outcomes: a failed entity is logged and skipped, never
//!    aborting its siblings or the run

use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use tracing::{debug, error, info};

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::llm::{EmailSummaryRequest, EntitySummary, SummaryModel};
use crate::pipeline::profile::{PersonaProfile, PlanTier};
use crate::pipeline::types::{EmailSummary, PersistedEmail};
use crate::store::EmailStore;

/// What the orchestrator hands to the aggregator and the accountant.
#[derive(Debug, Default)]
pub struct SummarizeReport {
    /// Successfully produced summaries, in entity order.
    pub summaries: Vec<EntitySummary>,
    /// Model invocations attempted (for usage accounting).
    pub attempts: usize,
    /// Entities that failed and were skipped.
    pub failed: usize,
}

/// Per-entity summarization decision.
///
/// Too-short bodies never qualify; otherwise importance, a
/// plan-dependent score threshold, or a long unread body earns a
/// summary.
pub fn should_summarize(
    email: &PersistedEmail,
    profile: Option<&PersonaProfile>,
    config: &PipelineConfig,
) -> bool {
    // Char counts, matching the units used by body normalization.
    let body_chars = email.body.chars().count();
    if body_chars < config.summarize_min_body_chars {
        return false;
    }
    if email.is_important {
        return true;
    }

    let plan = profile.map(|p| p.plan).unwrap_or(PlanTier::Free);
    if email.relevance_score >= plan.summarize_score_threshold() {
        return true;
    }

    !email.flags.is_read && body_chars > config.summarize_unread_body_chars
}

/// Summarize the qualifying entities and persist each summary.
///
/// Runs `config.summarize_batch_size` model calls concurrently per
/// batch with `config.summarize_batch_delay` between batches. One
/// failing call never fails its siblings.
pub async fn summarize_selected(
    model: &Arc<dyn SummaryModel>,
    store: &Arc<dyn EmailStore>,
    emails: &[PersistedEmail],
    profile: Option<&PersonaProfile>,
    config: &PipelineConfig,
) -> SummarizeReport {
    let selected: Vec<&PersistedEmail> = emails
        .iter()
        .filter(|e| should_summarize(e, profile, config))
        .collect();

    debug!(
        selected = selected.len(),
        total = emails.len(),
        "Summarization selection complete"
    );

    let mut report = SummarizeReport {
        attempts: selected.len(),
        ..Default::default()
    };

    let batch_size = config.summarize_batch_size.max(1);
    let batch_count = selected.len().div_ceil(batch_size);

    for (index, batch) in selected.chunks(batch_size).enumerate() {
        let outcomes = join_all(
            batch
                .iter()
                .map(|email| summarize_one(model, store, email, profile)),
        )
        .await;

        for outcome in outcomes {
            match outcome {
                Ok(summary) => report.summaries.push(summary),
                Err(e) => {
                    error!(error = %e, "Skipping entity after failed summary");
                    report.failed += 1;
                }
            }
        }

        if index + 1 < batch_count {
            tokio::time::sleep(config.summarize_batch_delay).await;
        }
    }

    info!(
        produced = report.summaries.len(),
        failed = report.failed,
        "Summarization complete"
    );
    report
}

/// Summarize one entity and attach the result. A failure here is
/// per-entity: callers log it, count it, and move on.
async fn summarize_one(
    model: &Arc<dyn SummaryModel>,
    store: &Arc<dyn EmailStore>,
    email: &PersistedEmail,
    profile: Option<&PersonaProfile>,
) -> Result<EntitySummary, PipelineError> {
    let request = EmailSummaryRequest {
        subject: email.subject.clone(),
        body: email.body.clone(),
        sender: email.sender.clone(),
        received_at: email.received_at,
        snippet: email.snippet.clone(),
    };

    let response = model
        .summarize_email(&request, profile)
        .await
        .map_err(|e| PipelineError::Summarization {
            email_id: email.record_id.to_string(),
            reason: e.to_string(),
        })?;

    let summary = EmailSummary {
        content: response.content,
        action_items: response.action_items,
        priority: response.priority,
        category: response.category,
        sentiment: response.sentiment,
        generated_at: Utc::now(),
    };

    store
        .attach_summary(email.record_id, &summary)
        .await
        .map_err(|e| PipelineError::Summarization {
            email_id: email.record_id.to_string(),
            reason: format!("persisting summary: {e}"),
        })?;

    Ok(EntitySummary {
        email_id: email.record_id,
        subject: email.subject.clone(),
        sender: email.sender.clone(),
        summary: summary.content,
    })
}
