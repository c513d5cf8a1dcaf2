//! Persona profile: per-user scoring and filtering configuration.
//!
//! One profile per user (0-or-1). Absence triggers the fixed basic
//! filter in `scoring`. The profile is plain data: all scoring and
//! categorization logic lives in pure functions that take it by
//! reference, so the same inputs always produce the same outputs.

use serde::{Deserialize, Serialize};

/// Default priorities for categories the profile does not configure.
/// Promotional buckets sit below the inclusion bar (priority >= 2).
const DEFAULT_CATEGORY_PRIORITIES: &[(&str, u8)] = &[
    ("work", 5),
    ("general", 5),
    ("social", 2),
    ("newsletters", 1),
    ("promotions", 1),
];

/// Subscription tier: drives the summarization score threshold.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanTier {
    #[default]
    Free,
    Pro,
}

impl PlanTier {
    /// Minimum relevance score at which an email earns a summary on
    /// this plan (unless importance or unread-length rules apply).
    pub fn summarize_score_threshold(self) -> u32 {
        match self {
            PlanTier::Free => 15,
            PlanTier::Pro => 10,
        }
    }
}

/// A user-configured category with its keyword list and priority.
///
/// Order matters: categorization picks the first matching rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryRule {
    pub name: String,
    /// 1 (noise) to 5 (critical). Categories below 2 are filtered out.
    pub priority: u8,
    pub keywords: Vec<String>,
}

/// Per-user scoring and filtering configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonaProfile {
    pub user_id: String,
    /// Sender substrings that mark a message important (+5).
    pub important_contacts: Vec<String>,
    /// Sender domains that mark a message important (+4).
    pub important_domains: Vec<String>,
    /// Subject/body terms worth +2 each (distinct matches).
    pub keywords: Vec<String>,
    /// Subject/body terms worth +1.5 each (distinct matches).
    pub interests: Vec<String>,
    /// Subject/body substrings that penalize (-5) and exclude.
    pub exclude_patterns: Vec<String>,
    /// Ordered category rules; first match wins.
    pub categories: Vec<CategoryRule>,
    /// Messages with shorter bodies are dropped by the filter.
    pub min_body_length: usize,
    /// Hard cap on entities surviving the filter per run.
    pub max_emails_per_digest: usize,
    /// Style hint forwarded to the model ("concise", "detailed", ...).
    pub summary_style: String,
    /// Length hint forwarded to the model ("short", "medium", "long").
    pub summary_length: String,
    pub plan: PlanTier,
}

impl PersonaProfile {
    /// A minimal profile with sensible limits and no scoring terms.
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            important_contacts: Vec::new(),
            important_domains: Vec::new(),
            keywords: Vec::new(),
            interests: Vec::new(),
            exclude_patterns: Vec::new(),
            categories: Vec::new(),
            min_body_length: 50,
            max_emails_per_digest: 15,
            summary_style: "concise".to_string(),
            summary_length: "medium".to_string(),
            plan: PlanTier::Free,
        }
    }

    /// Priority of `category`, falling back to the built-in defaults
    /// when the profile does not configure it.
    pub fn category_priority(&self, category: &str) -> u8 {
        if let Some(rule) = self
            .categories
            .iter()
            .find(|r| r.name.eq_ignore_ascii_case(category))
        {
            return rule.priority;
        }
        DEFAULT_CATEGORY_PRIORITIES
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(category))
            .map(|(_, p)| *p)
            .unwrap_or(3)
    }

    /// Whether the profile configures a category named "work".
    pub fn has_work_category(&self) -> bool {
        self.categories
            .iter()
            .any(|r| r.name.eq_ignore_ascii_case("work"))
    }
}
