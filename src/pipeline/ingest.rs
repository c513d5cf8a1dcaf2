//! Deduplicating ingest: normalizes raw messages into canonical
//! `PersistedEmail` records.
//!
//! Idempotent on `(user_id, provider_message_id)`: a second ingest of
//! the same key returns the stored record unchanged. Normalization is
//! explicit and happens before the write call, so every side effect is
//! visible in the pipeline's control flow.

use std::sync::OnceLock;

use chrono::Utc;
use regex::Regex;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::StoreError;
use crate::pipeline::scoring::ScoredMessage;
use crate::pipeline::types::{EmailFlags, PersistedEmail};
use crate::store::EmailStore;

/// Appended when a normalized body is cut at the length cap.
const TRUNCATION_MARKER: &str = " [truncated]";

/// Result of one ingest call.
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    pub email: PersistedEmail,
    /// False when the dedup key already existed.
    pub newly_created: bool,
}

/// Persist one scored message, deduplicating on the provider id.
pub async fn ingest(
    store: &dyn EmailStore,
    user_id: &str,
    scored: &ScoredMessage,
    max_body_chars: usize,
) -> Result<IngestOutcome, StoreError> {
    let message = &scored.message;

    if let Some(existing) = store
        .find_email(user_id, &message.provider_message_id)
        .await?
    {
        debug!(
            user_id = %user_id,
            id = %message.provider_message_id,
            "Message already ingested, reusing record"
        );
        return Ok(IngestOutcome {
            email: existing,
            newly_created: false,
        });
    }

    let email = PersistedEmail {
        record_id: Uuid::new_v4(),
        user_id: user_id.to_string(),
        provider_message_id: message.provider_message_id.clone(),
        thread_id: message.thread_id.clone(),
        subject: message.subject.clone(),
        sender: message.sender.clone(),
        recipients: message.recipients.clone(),
        body: normalize_body(&message.body, max_body_chars),
        snippet: message.snippet.clone(),
        labels: message.labels.clone(),
        is_important: message.is_important,
        relevance_score: scored.score,
        category: scored.category.clone(),
        flags: EmailFlags {
            is_read: message.is_read,
            is_archived: false,
            is_starred: false,
        },
        summary: None,
        received_at: message.received_at,
        created_at: Utc::now(),
    };

    match store.insert_email(&email).await {
        Ok(()) => Ok(IngestOutcome {
            email,
            newly_created: true,
        }),
        // The store owns the uniqueness key; a concurrent writer may
        // have won the insert. Resolve by re-reading.
        Err(StoreError::Constraint(reason)) => {
            warn!(
                user_id = %user_id,
                id = %message.provider_message_id,
                reason = %reason,
                "Insert lost a dedup race, re-reading existing record"
            );
            let existing = store
                .find_email(user_id, &message.provider_message_id)
                .await?
                .ok_or_else(|| StoreError::NotFound {
                    entity: "email".to_string(),
                    id: message.provider_message_id.clone(),
                })?;
            Ok(IngestOutcome {
                email: existing,
                newly_created: false,
            })
        }
        Err(e) => Err(e),
    }
}

/// Normalize a body for storage: strip signature/footer/disclaimer
/// blocks, collapse whitespace runs, and truncate at `max_chars` with
/// a marker.
pub fn normalize_body(body: &str, max_chars: usize) -> String {
    let mut text = body.to_string();
    for pattern in footer_patterns() {
        text = pattern.replace(&text, "").into_owned();
    }

    let collapsed = whitespace_run()
        .replace_all(text.trim(), " ")
        .into_owned();

    if collapsed.chars().count() <= max_chars {
        return collapsed;
    }
    let mut truncated: String = collapsed.chars().take(max_chars).collect();
    truncated.push_str(TRUNCATION_MARKER);
    truncated
}

/// Signature/footer/disclaimer blocks stripped before storage. Each
/// pattern anchors at a line start and consumes to end of text.
fn footer_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            // "-- " signature separator
            r"(?s)\r?\n-- ?\r?\n.*$",
            r"(?is)\r?\n\s*sent from my \w.*$",
            r"(?is)\r?\n\s*get outlook for (ios|android).*$",
            r"(?is)\r?\n\s*this (e-?mail|message) (and any attachments )?(is|are|may be) confidential.*$",
            r"(?is)\r?\n\s*if you are not the intended recipient.*$",
            r"(?is)\r?\n\s*(to|click here to) unsubscribe\b.*$",
            r"(?is)\r?\n\s*you (are receiving|received) this (e-?mail|message) because.*$",
        ]
        .iter()
        .map(|p| Regex::new(p).unwrap())
        .collect()
    })
}

fn whitespace_run() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").unwrap())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::types::RawMessage;
    use crate::store::MemoryStore;

    fn make_scored(provider_id: &str, body: &str) -> ScoredMessage {
        ScoredMessage {
            message: RawMessage {
                provider_message_id: provider_id.into(),
                thread_id: Some("t1".into()),
                subject: "Subject".into(),
                sender: "alice@example.com".into(),
                recipients: vec!["me@example.com".into()],
                body: body.into(),
                html_body: None,
                snippet: "preview".into(),
                labels: vec!["INBOX".into()],
                is_important: false,
                is_read: false,
                received_at: Utc::now(),
                attachments: vec![],
            },
            score: 9,
            category: "general".into(),
        }
    }

    #[tokio::test]
    async fn ingest_twice_is_idempotent() {
        let store = MemoryStore::new();
        let scored = make_scored("m1", "Hello there, quick question about the report.");

        let first = ingest(&store, "u1", &scored, 8000).await.unwrap();
        assert!(first.newly_created);

        let second = ingest(&store, "u1", &scored, 8000).await.unwrap();
        assert!(!second.newly_created);
        assert_eq!(second.email.record_id, first.email.record_id);
        assert_eq!(second.email.body, first.email.body);

        assert_eq!(store.emails_for_user("u1").await.len(), 1);
    }

    #[tokio::test]
    async fn ingest_carries_score_and_category() {
        let store = MemoryStore::new();
        let scored = make_scored("m2", "Body content for the record.");

        let outcome = ingest(&store, "u1", &scored, 8000).await.unwrap();
        assert_eq!(outcome.email.relevance_score, 9);
        assert_eq!(outcome.email.category, "general");
        assert!(!outcome.email.flags.is_read);
        assert!(outcome.email.summary.is_none());
    }

    #[tokio::test]
    async fn same_provider_id_different_users_both_stored() {
        let store = MemoryStore::new();
        let scored = make_scored("m1", "Shared provider id across users.");

        ingest(&store, "u1", &scored, 8000).await.unwrap();
        let other = ingest(&store, "u2", &scored, 8000).await.unwrap();
        assert!(other.newly_created);
    }

    #[test]
    fn normalize_collapses_whitespace() {
        let body = "Hello   there\n\n\nhow  are\tyou";
        assert_eq!(normalize_body(body, 8000), "Hello there how are you");
    }

    #[test]
    fn normalize_strips_signature_block() {
        let body = "Meeting is at 3pm.\n-- \nAlice Smith\nVP of Everything\n555-0100";
        assert_eq!(normalize_body(body, 8000), "Meeting is at 3pm.");
    }

    #[test]
    fn normalize_strips_mobile_footer() {
        let body = "On my way.\n\nSent from my iPhone";
        assert_eq!(normalize_body(body, 8000), "On my way.");
    }

    #[test]
    fn normalize_strips_disclaimer() {
        let body = "Numbers attached.\nIf you are not the intended recipient, delete this message.";
        assert_eq!(normalize_body(body, 8000), "Numbers attached.");
    }

    #[test]
    fn normalize_truncates_with_marker() {
        let body = "word ".repeat(100);
        let normalized = normalize_body(&body, 50);
        assert!(normalized.ends_with(TRUNCATION_MARKER));
        assert_eq!(
            normalized.chars().count(),
            50 + TRUNCATION_MARKER.chars().count()
        );
    }

    #[test]
    fn normalize_short_body_untouched() {
        assert_eq!(normalize_body("Just a line.", 8000), "Just a line.");
    }
}
