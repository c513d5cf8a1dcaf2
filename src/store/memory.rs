//! In-memory `EmailStore` backend.
//!
//! Backs the test suite and lightweight embedders. Enforces the same
//! `(user_id, provider_message_id)` uniqueness constraint a durable
//! document store would.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::StoreError;
use crate::pipeline::profile::PersonaProfile;
use crate::pipeline::types::{Digest, EmailSummary, PersistedEmail};
use crate::usage::UsageCounters;

use super::traits::EmailStore;

/// Map-backed store; all collections behind one async lock each.
#[derive(Default)]
pub struct MemoryStore {
    profiles: RwLock<HashMap<String, PersonaProfile>>,
    /// Keyed by (user_id, provider_message_id).
    emails: RwLock<HashMap<(String, String), PersistedEmail>>,
    digests: RwLock<Vec<Digest>>,
    usage: RwLock<HashMap<String, UsageCounters>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a profile (test convenience).
    pub async fn put_profile(&self, profile: PersonaProfile) {
        self.profiles
            .write()
            .await
            .insert(profile.user_id.clone(), profile);
    }

    /// All stored emails for a user, unordered.
    pub async fn emails_for_user(&self, user_id: &str) -> Vec<PersistedEmail> {
        self.emails
            .read()
            .await
            .values()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect()
    }

    /// All stored digests.
    pub async fn digests(&self) -> Vec<Digest> {
        self.digests.read().await.clone()
    }
}

#[async_trait]
impl EmailStore for MemoryStore {
    async fn get_profile(&self, user_id: &str) -> Result<Option<PersonaProfile>, StoreError> {
        Ok(self.profiles.read().await.get(user_id).cloned())
    }

    async fn find_email(
        &self,
        user_id: &str,
        provider_message_id: &str,
    ) -> Result<Option<PersistedEmail>, StoreError> {
        let key = (user_id.to_string(), provider_message_id.to_string());
        Ok(self.emails.read().await.get(&key).cloned())
    }

    async fn insert_email(&self, email: &PersistedEmail) -> Result<(), StoreError> {
        let key = (email.user_id.clone(), email.provider_message_id.clone());
        let mut emails = self.emails.write().await;
        if emails.contains_key(&key) {
            return Err(StoreError::Constraint(format!(
                "email already exists for ({}, {})",
                key.0, key.1
            )));
        }
        emails.insert(key, email.clone());
        Ok(())
    }

    async fn attach_summary(
        &self,
        record_id: Uuid,
        summary: &EmailSummary,
    ) -> Result<(), StoreError> {
        let mut emails = self.emails.write().await;
        let email = emails
            .values_mut()
            .find(|e| e.record_id == record_id)
            .ok_or_else(|| StoreError::NotFound {
                entity: "email".to_string(),
                id: record_id.to_string(),
            })?;
        email.summary = Some(summary.clone());
        Ok(())
    }

    async fn insert_digest(&self, digest: &Digest) -> Result<(), StoreError> {
        self.digests.write().await.push(digest.clone());
        Ok(())
    }

    async fn get_usage(&self, user_id: &str) -> Result<Option<UsageCounters>, StoreError> {
        Ok(self.usage.read().await.get(user_id).cloned())
    }

    async fn put_usage(
        &self,
        user_id: &str,
        counters: &UsageCounters,
    ) -> Result<(), StoreError> {
        self.usage
            .write()
            .await
            .insert(user_id.to_string(), counters.clone());
        Ok(())
    }
}
