//! `EmailStore` trait: single async interface for all persistence.
//!
//! The pipeline assumes a document store with upsert-by-key semantics
//! and a uniqueness constraint on `(user_id, provider_message_id)`;
//! the store is the source of truth for that key even though the
//! pipeline also checks before inserting.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::StoreError;
use crate::pipeline::profile::PersonaProfile;
use crate::pipeline::types::{Digest, EmailSummary, PersistedEmail};
use crate::usage::UsageCounters;

/// Backend-agnostic store covering profiles, emails, digests, and
/// usage counters.
#[async_trait]
pub trait EmailStore: Send + Sync {
    // ── Profiles ────────────────────────────────────────────────────

    /// Load the user's persona profile, if one exists (0-or-1).
    async fn get_profile(&self, user_id: &str) -> Result<Option<PersonaProfile>, StoreError>;

    // ── Emails ──────────────────────────────────────────────────────

    /// Look up a canonical email by its dedup key.
    async fn find_email(
        &self,
        user_id: &str,
        provider_message_id: &str,
    ) -> Result<Option<PersistedEmail>, StoreError>;

    /// Insert a new canonical email.
    ///
    /// Fails with [`StoreError::Constraint`] when the
    /// `(user_id, provider_message_id)` key already exists.
    async fn insert_email(&self, email: &PersistedEmail) -> Result<(), StoreError>;

    /// Attach a generated summary to an existing email record.
    async fn attach_summary(
        &self,
        record_id: Uuid,
        summary: &EmailSummary,
    ) -> Result<(), StoreError>;

    // ── Digests ─────────────────────────────────────────────────────

    /// Persist a completed digest.
    async fn insert_digest(&self, digest: &Digest) -> Result<(), StoreError>;

    // ── Usage counters ──────────────────────────────────────────────

    /// Load the user's usage counters, if any have been recorded.
    async fn get_usage(&self, user_id: &str) -> Result<Option<UsageCounters>, StoreError>;

    /// Write back the user's usage counters.
    async fn put_usage(
        &self,
        user_id: &str,
        counters: &UsageCounters,
    ) -> Result<(), StoreError>;
}
