//! Digest aggregation: rolls the run's individual summaries into one
//! persisted digest.
//!
//! Aggregation is best-effort: a model or store failure here is logged
//! and yields no digest, but the run itself still completes. Zero
//! summaries means no digest and is not an error.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Duration, NaiveTime, Utc};
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::error::PipelineError;
use crate::llm::{EntitySummary, SummaryModel};
use crate::pipeline::profile::PersonaProfile;
use crate::pipeline::types::{Digest, GenerationMetadata};
use crate::store::EmailStore;

/// Build and persist the digest for one run. Returns the digest id,
/// or `None` when there was nothing to aggregate or aggregation
/// failed.
#[allow(clippy::too_many_arguments)]
pub async fn build_digest(
    model: &Arc<dyn SummaryModel>,
    store: &Arc<dyn EmailStore>,
    user_id: &str,
    digest_type: &str,
    summaries: &[EntitySummary],
    profile: Option<&PersonaProfile>,
    period: Option<(DateTime<Utc>, DateTime<Utc>)>,
    run_started: Instant,
) -> Option<Uuid> {
    if summaries.is_empty() {
        debug!(user_id = %user_id, "No summaries to aggregate, skipping digest");
        return None;
    }

    let response = match model.summarize_digest(summaries, profile).await {
        Ok(response) => response,
        Err(e) => {
            let e = PipelineError::Aggregation(e.to_string());
            error!(
                user_id = %user_id,
                count = summaries.len(),
                error = %e,
                "Digest generation failed, run continues without one"
            );
            return None;
        }
    };

    let (period_start, period_end) = period.unwrap_or_else(default_period);

    let digest = Digest {
        digest_id: Uuid::new_v4(),
        user_id: user_id.to_string(),
        digest_type: digest_type.to_string(),
        content: response.content,
        email_ids: distinct_email_ids(summaries),
        action_items: response.action_items,
        highlights: response.highlights,
        category_counts: response.category_counts,
        period_start,
        period_end,
        generated_by: GenerationMetadata {
            provider: model.provider_name().to_string(),
            model: model.model_name().to_string(),
        },
        processing_time_ms: run_started.elapsed().as_millis() as u64,
        created_at: Utc::now(),
    };

    if let Err(e) = store.insert_digest(&digest).await {
        let e = PipelineError::Aggregation(format!("persisting digest: {e}"));
        error!(
            user_id = %user_id,
            digest_id = %digest.digest_id,
            error = %e,
            "Failed to persist digest, run continues without one"
        );
        return None;
    }

    info!(
        user_id = %user_id,
        digest_id = %digest.digest_id,
        emails = digest.email_ids.len(),
        "Digest stored"
    );
    Some(digest.digest_id)
}

/// Contributing record ids, first-occurrence order, no repeats.
fn distinct_email_ids(summaries: &[EntitySummary]) -> Vec<Uuid> {
    let mut seen = std::collections::HashSet::new();
    summaries
        .iter()
        .map(|s| s.email_id)
        .filter(|id| seen.insert(*id))
        .collect()
}

/// Previous calendar day, inclusive on both ends.
fn default_period() -> (DateTime<Utc>, DateTime<Utc>) {
    let today_start = Utc::now().date_naive().and_time(NaiveTime::MIN).and_utc();
    (
        today_start - Duration::days(1),
        today_start - Duration::milliseconds(1),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LlmError;
    use crate::llm::{DigestResponse, EmailSummaryRequest, EmailSummaryResponse};
    use crate::store::MemoryStore;
    use async_trait::async_trait;

    struct MockModel {
        fail_digest: bool,
    }

    #[async_trait]
    impl SummaryModel for MockModel {
        fn provider_name(&self) -> &str {
            "mock"
        }

        fn model_name(&self) -> &str {
            "mock-large"
        }

        async fn summarize_email(
            &self,
            _request: &EmailSummaryRequest,
            _profile: Option<&PersonaProfile>,
        ) -> Result<EmailSummaryResponse, LlmError> {
            unimplemented!("not used in these tests")
        }

        async fn summarize_digest(
            &self,
            summaries: &[EntitySummary],
            _profile: Option<&PersonaProfile>,
        ) -> Result<DigestResponse, LlmError> {
            if self.fail_digest {
                return Err(LlmError::RateLimited {
                    provider: "mock".into(),
                });
            }
            Ok(DigestResponse {
                content: format!("{} emails today", summaries.len()),
                action_items: vec![],
                highlights: vec!["highlight".into()],
                category_counts: vec![("work".into(), summaries.len() as u32)],
            })
        }
    }

    fn make_summary(id: Uuid, subject: &str) -> EntitySummary {
        EntitySummary {
            email_id: id,
            subject: subject.into(),
            sender: "alice@example.com".into(),
            summary: format!("Summary of {subject}"),
        }
    }

    #[tokio::test]
    async fn digest_persisted_with_distinct_ordered_ids() {
        let model: Arc<dyn SummaryModel> = Arc::new(MockModel { fail_digest: false });
        let store = Arc::new(MemoryStore::new());
        let store_dyn: Arc<dyn EmailStore> = store.clone();

        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let summaries = vec![
            make_summary(a, "first"),
            make_summary(b, "second"),
            make_summary(a, "first again"),
        ];

        let digest_id = build_digest(
            &model,
            &store_dyn,
            "u1",
            "daily",
            &summaries,
            None,
            None,
            Instant::now(),
        )
        .await
        .unwrap();

        let digests = store.digests().await;
        assert_eq!(digests.len(), 1);
        let digest = &digests[0];
        assert_eq!(digest.digest_id, digest_id);
        assert_eq!(digest.email_ids, vec![a, b]);
        assert_eq!(digest.digest_type, "daily");
        assert_eq!(digest.generated_by.provider, "mock");
        assert_eq!(digest.generated_by.model, "mock-large");
        assert_eq!(digest.content, "3 emails today");
        assert!(digest.period_start < digest.period_end);
    }

    #[tokio::test]
    async fn empty_summaries_produce_no_digest() {
        let model: Arc<dyn SummaryModel> = Arc::new(MockModel { fail_digest: false });
        let store = Arc::new(MemoryStore::new());
        let store_dyn: Arc<dyn EmailStore> = store.clone();

        let digest_id = build_digest(
            &model,
            &store_dyn,
            "u1",
            "daily",
            &[],
            None,
            None,
            Instant::now(),
        )
        .await;

        assert!(digest_id.is_none());
        assert!(store.digests().await.is_empty());
    }

    #[tokio::test]
    async fn model_failure_yields_none_without_persisting() {
        let model: Arc<dyn SummaryModel> = Arc::new(MockModel { fail_digest: true });
        let store = Arc::new(MemoryStore::new());
        let store_dyn: Arc<dyn EmailStore> = store.clone();

        let summaries = vec![make_summary(Uuid::new_v4(), "only")];
        let digest_id = build_digest(
            &model,
            &store_dyn,
            "u1",
            "daily",
            &summaries,
            None,
            None,
            Instant::now(),
        )
        .await;

        assert!(digest_id.is_none());
        assert!(store.digests().await.is_empty());
    }

    #[tokio::test]
    async fn explicit_period_is_respected() {
        let model: Arc<dyn SummaryModel> = Arc::new(MockModel { fail_digest: false });
        let store = Arc::new(MemoryStore::new());
        let store_dyn: Arc<dyn EmailStore> = store.clone();

        let start = Utc::now() - Duration::hours(4);
        let end = Utc::now();
        let summaries = vec![make_summary(Uuid::new_v4(), "only")];

        build_digest(
            &model,
            &store_dyn,
            "u1",
            "on_demand",
            &summaries,
            None,
            Some((start, end)),
            Instant::now(),
        )
        .await
        .unwrap();

        let digests = store.digests().await;
        assert_eq!(digests[0].period_start, start);
        assert_eq!(digests[0].period_end, end);
        assert_eq!(digests[0].digest_type, "on_demand");
    }

    #[test]
    fn default_period_is_previous_day() {
        let (start, end) = default_period();
        assert!(start < end);
        let today_start = Utc::now().date_naive().and_time(NaiveTime::MIN).and_utc();
        assert_eq!(start, today_start - Duration::days(1));
        assert_eq!(end, today_start - Duration::milliseconds(1));
    }
}
