//! Maps raw ledger failures to retry decisions.
//!
//! The policy is an ordered table of [Rule]s; the first rule matching a
//! failure decides its [Classification] and unmatched failures are fatal.
//! Tables can be loaded from configuration, so matching strings are updated
//! without touching call sites.
use crate::LedgerError;
use serde::{Deserialize, Serialize};

/// Sentinel reason for an attack on a protected target.
pub const TARGET_PROTECTED: &str = "target_protected";

/// Sentinel reason for starting a game whose identifier is already in use.
pub const GAME_EXISTS: &str = "game_exists";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Classification {
    /// Retry after backoff.
    Transient,
    /// Expected domain rejection, surfaced as a normal outcome.
    Sentinel(String),
    /// Propagate without retrying.
    Fatal,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Class {
    Transient,
    Sentinel,
    Fatal,
}

/// One row of the classification table. A rule matches when every matcher it
/// sets matches; `message` is a case-insensitive substring.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    pub class: Class,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl Rule {
    pub fn message(pattern: &str, class: Class) -> Self {
        Self {
            message: Some(pattern.to_string()),
            status: None,
            class,
            reason: None,
        }
    }

    pub fn status(status: u16, class: Class) -> Self {
        Self {
            message: None,
            status: Some(status),
            class,
            reason: None,
        }
    }

    pub fn sentinel(pattern: &str, reason: &str) -> Self {
        Self {
            reason: Some(reason.to_string()),
            ..Self::message(pattern, Class::Sentinel)
        }
    }

    fn matches(&self, error: &LedgerError, message: &str) -> bool {
        if self.message.is_none() && self.status.is_none() {
            return false;
        }
        let message_matches = self
            .message
            .as_ref()
            .map_or(true, |pattern| message.contains(&pattern.to_lowercase()));
        let status_matches = self
            .status
            .map_or(true, |status| error.status == Some(status));
        message_matches && status_matches
    }

    fn classification(&self) -> Classification {
        match self.class {
            Class::Transient => Classification::Transient,
            Class::Fatal => Classification::Fatal,
            Class::Sentinel => Classification::Sentinel(
                self.reason
                    .clone()
                    .or_else(|| self.message.clone())
                    .unwrap_or_default(),
            ),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ErrorClassifier {
    rules: Vec<Rule>,
}

impl ErrorClassifier {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    pub fn default_rules() -> Vec<Rule> {
        vec![
            Rule::sentinel("Target protected", TARGET_PROTECTED),
            Rule::sentinel("Game already exists", GAME_EXISTS),
            Rule::sentinel("Game already started", GAME_EXISTS),
            Rule::message("timed out", Class::Transient),
            Rule::message("timeout", Class::Transient),
            Rule::message("node unavailable", Class::Transient),
            Rule::message("nonce", Class::Transient),
            Rule::status(429, Class::Transient),
            Rule::status(503, Class::Transient),
        ]
    }

    pub fn classify(&self, error: &LedgerError) -> Classification {
        let message = error.message.to_lowercase();
        self.rules
            .iter()
            .find(|rule| rule.matches(error, &message))
            .map(Rule::classification)
            .unwrap_or(Classification::Fatal)
    }
}

impl Default for ErrorClassifier {
    fn default() -> Self {
        Self::new(Self::default_rules())
    }
}
