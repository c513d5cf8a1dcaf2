//! Persona scorer & filter: ranks and trims raw messages.
//!
//! Everything here is a pure function of `(message, profile)`: same
//! inputs always produce the same score and category. Flow per run:
//! 1. `evaluate()`: additive score + category + exclusion flag
//! 2. `filter_and_rank()`: inclusion predicate, sort, truncate
//!
//! Users without a profile go through `basic_filter()` instead: a
//! fixed promotional/unsubscribe drop list with an importance-first
//! sort, capped at a small bound.

use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use crate::pipeline::profile::PersonaProfile;
use crate::pipeline::types::RawMessage;

/// Score weights (additive, order-independent, clamped to >= 0).
const WEIGHT_UNREAD: f64 = 2.0;
const WEIGHT_IMPORTANT: f64 = 3.0;
const WEIGHT_CONTACT: f64 = 5.0;
const WEIGHT_DOMAIN: f64 = 4.0;
const WEIGHT_KEYWORD: f64 = 2.0;
const WEIGHT_INTEREST: f64 = 1.5;
const PENALTY_EXCLUDE: f64 = 5.0;

/// Categories below this priority are filtered out.
const MIN_INCLUDED_PRIORITY: u8 = 2;

/// Sender domains resolved to the "social" category.
const SOCIAL_DOMAINS: &[&str] = &[
    "facebook.com",
    "facebookmail.com",
    "twitter.com",
    "x.com",
    "instagram.com",
    "linkedin.com",
    "tiktok.com",
    "reddit.com",
    "pinterest.com",
];

/// A raw message annotated with its score and resolved category.
#[derive(Debug, Clone)]
pub struct ScoredMessage {
    pub message: RawMessage,
    pub score: u32,
    pub category: String,
}

/// Full scoring outcome, including the exclusion signal the filter
/// uses. The exclude penalty lowers the score; the hard exclusion is
/// decided separately in `filter_and_rank`.
#[derive(Debug, Clone)]
pub struct ScoreOutcome {
    pub score: u32,
    pub category: String,
    pub matched_exclude: bool,
}

/// Score one message against a profile.
pub fn evaluate(message: &RawMessage, profile: &PersonaProfile) -> ScoreOutcome {
    let haystack = format!("{}\n{}", message.subject, message.body).to_lowercase();
    let sender = message.sender.to_lowercase();

    let mut score = 0.0;

    if !message.is_read {
        score += WEIGHT_UNREAD;
    }
    if message.is_important {
        score += WEIGHT_IMPORTANT;
    }
    if profile
        .important_contacts
        .iter()
        .any(|c| sender.contains(&c.to_lowercase()))
    {
        score += WEIGHT_CONTACT;
    }
    if let Some(domain) = sender_domain(&message.sender) {
        if profile
            .important_domains
            .iter()
            .any(|d| domain_matches(&domain, d))
        {
            score += WEIGHT_DOMAIN;
        }
    }

    let keyword_hits = distinct_matches(&haystack, &profile.keywords);
    score += WEIGHT_KEYWORD * keyword_hits as f64;

    let interest_hits = distinct_matches(&haystack, &profile.interests);
    score += WEIGHT_INTEREST * interest_hits as f64;

    let category = categorize(message, profile);
    score += f64::from(profile.category_priority(&category));

    let matched_exclude = profile
        .exclude_patterns
        .iter()
        .any(|p| haystack.contains(&p.to_lowercase()));
    if matched_exclude {
        score -= PENALTY_EXCLUDE;
    }

    ScoreOutcome {
        score: score.max(0.0).round() as u32,
        category,
        matched_exclude,
    }
}

/// Resolve a message's category. Pure and deterministic: profile
/// categories are checked in configured order, then the fixed
/// heuristics, then the default bucket.
pub fn categorize(message: &RawMessage, profile: &PersonaProfile) -> String {
    let haystack = format!(
        "{}\n{}\n{}",
        message.subject, message.body, message.sender
    )
    .to_lowercase();
    let sender = message.sender.to_lowercase();

    for rule in &profile.categories {
        if rule
            .keywords
            .iter()
            .any(|k| haystack.contains(&k.to_lowercase()))
        {
            return rule.name.clone();
        }
    }

    if sender.contains("noreply") || sender.contains("no-reply") {
        return "newsletters".to_string();
    }

    let subject_body = format!("{}\n{}", message.subject, message.body).to_lowercase();
    if subject_body.contains("unsubscribe") {
        return "promotions".to_string();
    }

    if let Some(domain) = sender_domain(&message.sender) {
        if SOCIAL_DOMAINS.iter().any(|d| domain_matches(&domain, d)) {
            return "social".to_string();
        }
    }

    if profile.has_work_category() {
        "work".to_string()
    } else {
        "general".to_string()
    }
}

/// Apply the inclusion predicate, rank, and truncate.
///
/// Exclusions: body shorter than the profile minimum, any exclude
/// pattern matched, or resolved category priority below 2. Survivors
/// are sorted by score descending (ties: newest first) and capped at
/// `max_emails_per_digest`.
pub fn filter_and_rank(messages: Vec<RawMessage>, profile: &PersonaProfile) -> Vec<ScoredMessage> {
    let total = messages.len();
    let mut scored: Vec<ScoredMessage> = messages
        .into_iter()
        .filter_map(|message| {
            let outcome = evaluate(&message, profile);

            // Char count, matching the units used by body normalization.
            if message.body.chars().count() < profile.min_body_length {
                debug!(id = %message.provider_message_id, "Dropped: body below minimum length");
                return None;
            }
            if outcome.matched_exclude {
                debug!(id = %message.provider_message_id, "Dropped: exclude pattern matched");
                return None;
            }
            if profile.category_priority(&outcome.category) < MIN_INCLUDED_PRIORITY {
                debug!(
                    id = %message.provider_message_id,
                    category = %outcome.category,
                    "Dropped: category priority below inclusion bar"
                );
                return None;
            }

            Some(ScoredMessage {
                message,
                score: outcome.score,
                category: outcome.category,
            })
        })
        .collect();

    scored.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then(b.message.received_at.cmp(&a.message.received_at))
    });
    scored.truncate(profile.max_emails_per_digest);

    debug!(
        kept = scored.len(),
        total,
        cap = profile.max_emails_per_digest,
        "Persona filter applied"
    );
    scored
}

/// Fixed filter for users with no profile: drop obviously promotional
/// mail, sort important-first then newest-first, cap at `cap`.
///
/// Kept items are annotated with the importance weight as their score
/// and the default "general" category.
pub fn basic_filter(messages: Vec<RawMessage>, cap: usize) -> Vec<ScoredMessage> {
    let patterns = promo_patterns();

    let mut kept: Vec<ScoredMessage> = messages
        .into_iter()
        .filter(|m| {
            let dropped = patterns
                .iter()
                .any(|re| re.is_match(&m.sender) || re.is_match(&m.subject));
            if dropped {
                debug!(id = %m.provider_message_id, "Dropped by basic filter");
            }
            !dropped
        })
        .map(|message| {
            let score = if message.is_important {
                WEIGHT_IMPORTANT as u32
            } else {
                0
            };
            ScoredMessage {
                message,
                score,
                category: "general".to_string(),
            }
        })
        .collect();

    kept.sort_by(|a, b| {
        b.message
            .is_important
            .cmp(&a.message.is_important)
            .then(b.message.received_at.cmp(&a.message.received_at))
    });
    kept.truncate(cap);
    kept
}

/// Compiled promotional/unsubscribe patterns for the basic filter.
fn promo_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r"(?i)no[\-_.]?reply",
            r"(?i)\bnewsletter\b",
            r"(?i)\bunsubscribe\b",
            r"(?i)\bpromotion(s|al)?\b",
            r"(?i)\bmarketing\b",
            r"(?i)\b(sale|deal)s?\b",
        ]
        .iter()
        .map(|p| Regex::new(p).unwrap())
        .collect()
    })
}

/// Extract the lowercase domain of a sender address, handling
/// "Name <addr@domain>" forms.
fn sender_domain(sender: &str) -> Option<String> {
    let addr = sender
        .rsplit_once('<')
        .map(|(_, rest)| rest.trim_end_matches('>'))
        .unwrap_or(sender);
    addr.rsplit_once('@')
        .map(|(_, domain)| domain.trim().to_lowercase())
}

/// Domain equality, or subdomain-of (`mail.example.com` matches
/// `example.com`).
fn domain_matches(domain: &str, candidate: &str) -> bool {
    let candidate = candidate.to_lowercase();
    domain == candidate || domain.ends_with(&format!(".{candidate}"))
}

/// Count profile terms with at least one case-insensitive hit.
fn distinct_matches(haystack: &str, terms: &[String]) -> usize {
    terms
        .iter()
        .filter(|t| !t.is_empty() && haystack.contains(&t.to_lowercase()))
        .count()
}
