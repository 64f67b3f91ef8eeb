//! Suggestion reconciliation.
//!
//! Turns an untrusted [`RawDecision`] into a [`RoutingDecision`] whose every
//! suggestion is a column of the index. Rules, in order:
//!
//! 1. keep only raw suggestions that exactly match an index column (deduplicated, capped)
//! 2. a `clarify` route carries no suggestions at all
//! 3. a `sql_query` route short of the cap is topped up from the fuzzy hints
//! 4. the caller's language tag is attached as-is

use std::collections::HashSet;
use tracing::debug;

use crate::config::ReconcileConfig;
use crate::fuzzy::HintList;
use crate::route::{RawDecision, Route, RoutingDecision};
use crate::schema::{ColumnRef, SchemaIndex};

#[derive(Debug, Clone)]
pub struct Reconciler {
    max_suggestions: usize,
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new(&ReconcileConfig::default())
    }
}

impl Reconciler {
    pub fn new(config: &ReconcileConfig) -> Self {
        Self {
            max_suggestions: config.max_suggestions,
        }
    }

    pub fn max_suggestions(&self) -> usize {
        self.max_suggestions
    }

    /// Reconcile without a language tag.
    pub fn reconcile(&self, raw: &RawDecision, hints: &HintList, index: &SchemaIndex) -> RoutingDecision {
        self.reconcile_with_language(raw, hints, index, None)
    }

    /// Reconcile a raw decision. Never fails; at worst the suggestions are empty.
    pub fn reconcile_with_language(
        &self,
        raw: &RawDecision,
        hints: &HintList,
        index: &SchemaIndex,
        language: Option<&str>,
    ) -> RoutingDecision {
        let route = Route::from_untrusted(&raw.route);
        if route.as_str() != raw.route.trim().to_ascii_lowercase() {
            debug!(raw_route = %raw.route, "unrecognized route, degrading to clarify");
        }

        let suggestions = match route {
            Route::Clarify => Vec::new(),
            Route::SqlQuery => {
                let mut picked = self.validated(raw, index);
                self.backfill(&mut picked, hints, index);
                picked
            }
        };

        RoutingDecision {
            route,
            explanation: raw.explanation(),
            suggestions,
            language: language.map(str::to_string),
        }
    }

    fn validated(&self, raw: &RawDecision, index: &SchemaIndex) -> Vec<ColumnRef> {
        let mut seen = HashSet::new();
        let mut picked = Vec::new();

        for candidate in &raw.suggestions {
            match index.resolve(candidate) {
                Some(col) if seen.insert(col.as_str()) => {
                    if picked.len() < self.max_suggestions {
                        picked.push(col.clone());
                    }
                }
                Some(_) => {}
                None => debug!(suggestion = %candidate, "dropping suggestion not in schema"),
            }
        }
        picked
    }

    fn backfill(&self, picked: &mut Vec<ColumnRef>, hints: &HintList, index: &SchemaIndex) {
        for hint in hints {
            if picked.len() >= self.max_suggestions {
                break;
            }
            // hints may come from an older index
            if !index.contains(hint.column.as_str()) || picked.contains(&hint.column) {
                continue;
            }
            picked.push(hint.column.clone());
        }
    }
}
