//! The routing contract shared by the reconciler and its callers.
//!
//! [`RawDecision`] is whatever the oracle handed back and is never trusted.
//! [`RoutingDecision`] is the reconciled result: its suggestions are
//! [`ColumnRef`]s, which can only be obtained from a [`SchemaIndex`].

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::error::RouterResult;
use crate::schema::{ColumnRef, SchemaIndex};

/// The two handling paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    SqlQuery,
    Clarify,
}

impl Route {
    pub fn as_str(&self) -> &'static str {
        match self {
            Route::SqlQuery => "sql_query",
            Route::Clarify => "clarify",
        }
    }

    /// Map an untrusted route string; anything unrecognized degrades to `Clarify`.
    pub fn from_untrusted(raw: &str) -> Self {
        raw.parse().unwrap_or(Route::Clarify)
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown route: '{0}'. Expected: sql_query or clarify")]
pub struct UnknownRoute(pub String);

impl FromStr for Route {
    type Err = UnknownRoute;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("sql_query") {
            Ok(Route::SqlQuery)
        } else if trimmed.eq_ignore_ascii_case("clarify") {
            Ok(Route::Clarify)
        } else {
            Err(UnknownRoute(s.to_string()))
        }
    }
}

/// The human-readable half of a decision.
///
/// Oracle protocols differ: some return a single `message`, others a
/// `reason` with optional follow-up questions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Explanation {
    Message {
        message: String,
    },
    Reasoned {
        reason: String,
        follow_up: Vec<String>,
    },
    Empty {},
}

impl Explanation {
    /// A one-line summary suitable for terminal output.
    pub fn summary(&self) -> &str {
        match self {
            Explanation::Message { message } => message,
            Explanation::Reasoned { reason, .. } => reason,
            Explanation::Empty {} => "",
        }
    }

    pub fn follow_up(&self) -> &[String] {
        match self {
            Explanation::Reasoned { follow_up, .. } => follow_up,
            _ => &[],
        }
    }
}

/// Untrusted oracle output, as decoded from its function-call arguments.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawDecision {
    pub route: String,
    pub suggestions: Vec<String>,
    pub message: Option<String>,
    pub reason: Option<String>,
    pub follow_up: Vec<String>,
}

impl RawDecision {
    pub fn new(route: impl Into<String>, suggestions: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            route: route.into(),
            suggestions: suggestions.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// The substitute used when the oracle fails or times out.
    pub fn fallback() -> Self {
        Self::new(Route::Clarify.as_str(), Vec::<String>::new())
    }

    /// Decode oracle function-call arguments.
    pub fn from_json(json: &str) -> RouterResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>, follow_up: Vec<String>) -> Self {
        self.reason = Some(reason.into());
        self.follow_up = follow_up;
        self
    }

    /// Pick the explanation variant the oracle actually used.
    pub fn explanation(&self) -> Explanation {
        match (&self.message, &self.reason) {
            (Some(message), _) => Explanation::Message {
                message: message.clone(),
            },
            (None, Some(reason)) => Explanation::Reasoned {
                reason: reason.clone(),
                follow_up: self.follow_up.clone(),
            },
            (None, None) if !self.follow_up.is_empty() => Explanation::Reasoned {
                reason: String::new(),
                follow_up: self.follow_up.clone(),
            },
            (None, None) => Explanation::Empty {},
        }
    }
}

/// A reconciled, schema-true decision.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutingDecision {
    pub route: Route,
    #[serde(flatten)]
    pub explanation: Explanation,
    pub suggestions: Vec<ColumnRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

/// A rule of the routing contract that a decision breaks.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContractViolation {
    #[error("Suggestion '{0}' is not a column of the schema")]
    UnknownColumn(String),

    #[error("Suggestion '{0}' appears more than once")]
    Duplicate(String),

    #[error("{count} suggestions exceed the cap of {cap}")]
    TooMany { count: usize, cap: usize },

    #[error("A clarify decision carries {0} suggestion(s)")]
    ClarifyWithSuggestions(usize),
}

impl RoutingDecision {
    pub fn suggestion_strs(&self) -> impl Iterator<Item = &str> {
        self.suggestions.iter().map(ColumnRef::as_str)
    }

    /// Check the decision against the contract, reporting the first broken rule.
    pub fn validate(&self, index: &SchemaIndex, cap: usize) -> Result<(), ContractViolation> {
        if self.route == Route::Clarify && !self.suggestions.is_empty() {
            return Err(ContractViolation::ClarifyWithSuggestions(self.suggestions.len()));
        }
        if self.suggestions.len() > cap {
            return Err(ContractViolation::TooMany {
                count: self.suggestions.len(),
                cap,
            });
        }
        let mut seen = HashSet::new();
        for col in &self.suggestions {
            if !index.contains(col.as_str()) {
                return Err(ContractViolation::UnknownColumn(col.to_string()));
            }
            if !seen.insert(col.as_str()) {
                return Err(ContractViolation::Duplicate(col.to_string()));
            }
        }
        Ok(())
    }
}
