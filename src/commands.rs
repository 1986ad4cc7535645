//! Command matching module
//!
//! Maps normalized transcripts to canned responses.

use crate::core::text_normalizer::{normalize, NormalizedText};
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use strsim::normalized_levenshtein;
use tracing::{debug, info};

/// How a normalized transcript is compared against the table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MatchPolicy {
    /// Exact membership. The grammar already limits what can be heard.
    #[default]
    Exact,
    /// Best candidate by normalized Levenshtein similarity, if at or above
    /// `threshold`.
    Fuzzy { threshold: f64 },
}

/// A matched table entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Command<'a> {
    pub phrase: &'a str,
    pub response: &'a str,
}

/// Immutable phrase → response table, keyed by normalized phrase.
#[derive(Debug, Clone)]
pub struct CommandTable {
    entries: HashMap<String, String>,
}

impl CommandTable {
    /// Build a table, normalizing every key.
    ///
    /// Two phrases that normalize to the same key, or a phrase that
    /// normalizes to nothing, are rejected.
    pub fn new<I, K, V>(commands: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut entries = HashMap::new();
        for (phrase, response) in commands {
            let key = normalize(phrase.as_ref());
            if key.is_empty() {
                return Err(ConfigError::CommandTable(format!(
                    "phrase '{}' is empty after normalization",
                    phrase.as_ref()
                )));
            }
            if entries.contains_key(key.as_str()) {
                return Err(ConfigError::CommandTable(format!(
                    "duplicate command phrase '{key}'"
                )));
            }
            let response = response.into();
            info!("  {} -> \"{}\"", key, response);
            entries.insert(key.into_string(), response);
        }
        Ok(Self { entries })
    }

    /// Exact lookup of an already normalized phrase.
    pub fn lookup(&self, normalized: &str) -> Option<Command<'_>> {
        self.entries
            .get_key_value(normalized)
            .map(|(phrase, response)| Command { phrase, response })
    }

    pub fn contains(&self, normalized: &str) -> bool {
        self.entries.contains_key(normalized)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn phrases(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

/// Stateless matcher over a shared table
#[derive(Debug, Clone, Copy)]
pub struct CommandMatcher {
    policy: MatchPolicy,
}

impl Default for CommandMatcher {
    fn default() -> Self {
        Self::new(MatchPolicy::Exact)
    }
}

impl CommandMatcher {
    pub fn new(policy: MatchPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> MatchPolicy {
        self.policy
    }

    /// Match a normalized transcript.
    pub fn find<'t>(&self, normalized: &NormalizedText, table: &'t CommandTable) -> Option<Command<'t>> {
        self.find_str(normalized.as_str(), table)
    }

    /// Same as [`find`](Self::find), for text already known to be normalized.
    pub fn find_str<'t>(&self, normalized: &str, table: &'t CommandTable) -> Option<Command<'t>> {
        if normalized.is_empty() {
            return None;
        }
        match self.policy {
            MatchPolicy::Exact => table.lookup(normalized),
            MatchPolicy::Fuzzy { threshold } => {
                if let Some(cmd) = table.lookup(normalized) {
                    return Some(cmd);
                }
                let (phrase, score) = table
                    .phrases()
                    .map(|p| (p, normalized_levenshtein(normalized, p)))
                    .max_by(|a, b| a.1.total_cmp(&b.1))?;
                if score >= threshold {
                    debug!("🎯 Fuzzy match '{}' -> '{}' ({:.2})", normalized, phrase, score);
                    table.lookup(phrase)
                } else {
                    None
                }
            }
        }
    }
}
