//! End-to-end routing: hints, oracle, reconciliation.
//!
//! The oracle is whatever external classifier the caller plugs in (usually a
//! language model behind an HTTP client). It only ever sees an
//! [`OracleRequest`] and its answer only ever reaches the caller through the
//! [`Reconciler`].

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::RouterConfig;
use crate::error::RouterResult;
use crate::fuzzy::{HintEngine, HintList};
use crate::reconcile::Reconciler;
use crate::route::{RawDecision, RoutingDecision};
use crate::schema::{ColumnRef, SchemaIndex, SchemaIndexBuilder};

/// One earlier message of the conversation, in chat-completion shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: String,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// Everything an oracle prompt may be built from.
#[derive(Debug, Clone)]
pub struct OracleRequest<'a> {
    pub question: &'a str,
    pub hints: &'a HintList,
    /// The first `prompt.max_columns` flat columns.
    pub known_columns: &'a [ColumnRef],
    /// Earlier turns, oldest first. Placed between the system prompt and the question.
    pub history: &'a [ChatTurn],
    pub language: Option<&'a str>,
}

impl<'a> OracleRequest<'a> {
    pub fn with_history(mut self, history: &'a [ChatTurn]) -> Self {
        self.history = history;
        self
    }
}

/// Failure reported by an oracle implementation.
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("Oracle timed out")]
    Timeout,

    #[error("Oracle returned no decision")]
    NoDecision,

    #[error("Oracle transport error: {0}")]
    Transport(String),

    #[error("Oracle returned malformed output: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// An external classifier proposing a route and raw suggestions.
pub trait Oracle {
    fn decide(&self, request: &OracleRequest<'_>) -> Result<RawDecision, OracleError>;
}

impl<F> Oracle for F
where
    F: Fn(&OracleRequest<'_>) -> Result<RawDecision, OracleError>,
{
    fn decide(&self, request: &OracleRequest<'_>) -> Result<RawDecision, OracleError> {
        self(request)
    }
}

/// An oracle that always answers with the same decision.
#[derive(Debug, Clone)]
pub struct StaticOracle(pub RawDecision);

impl Oracle for StaticOracle {
    fn decide(&self, _request: &OracleRequest<'_>) -> Result<RawDecision, OracleError> {
        Ok(self.0.clone())
    }
}

/// Owns the shared schema index and the components built from one config.
#[derive(Debug, Clone)]
pub struct Router {
    index: Arc<SchemaIndex>,
    config: RouterConfig,
    engine: HintEngine,
    reconciler: Reconciler,
}

impl Router {
    pub fn new(index: impl Into<Arc<SchemaIndex>>, config: RouterConfig) -> Self {
        Self {
            index: index.into(),
            engine: HintEngine::new(&config.hints),
            reconciler: Reconciler::new(&config.reconcile),
            config,
        }
    }

    /// Build the index from a schema description file using `config.schema`.
    pub fn from_path(path: impl AsRef<Path>, config: RouterConfig) -> RouterResult<Self> {
        let index = SchemaIndexBuilder::new(&config.schema).build_from_path(path)?;
        Ok(Self::new(index, config))
    }

    pub fn index(&self) -> &Arc<SchemaIndex> {
        &self.index
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Swap in a freshly built index. Requests already holding the old
    /// `Arc` finish against it.
    pub fn replace_schema(&mut self, index: impl Into<Arc<SchemaIndex>>) -> Arc<SchemaIndex> {
        std::mem::replace(&mut self.index, index.into())
    }

    /// Columns to embed in an oracle prompt.
    pub fn known_columns(&self) -> &[ColumnRef] {
        self.index.known_columns(self.config.prompt.max_columns)
    }

    pub fn hints(&self, question: &str) -> HintList {
        self.engine.suggest(question, &self.index)
    }

    pub fn request<'a>(
        &'a self,
        question: &'a str,
        hints: &'a HintList,
        language: Option<&'a str>,
    ) -> OracleRequest<'a> {
        OracleRequest {
            question,
            hints,
            known_columns: self.known_columns(),
            history: &[],
            language,
        }
    }

    /// Reconcile an oracle answer obtained elsewhere.
    pub fn reconcile(&self, raw: &RawDecision, hints: &HintList, language: Option<&str>) -> RoutingDecision {
        self.reconciler
            .reconcile_with_language(raw, hints, &self.index, language)
    }

    /// Route one question. Oracle failures fall back to a clarify decision.
    pub fn route(&self, question: &str, language: Option<&str>, oracle: &dyn Oracle) -> RoutingDecision {
        self.route_with_history(question, &[], language, oracle)
    }

    /// Route a question asked after `history`. Only the question is hinted.
    pub fn route_with_history(
        &self,
        question: &str,
        history: &[ChatTurn],
        language: Option<&str>,
        oracle: &dyn Oracle,
    ) -> RoutingDecision {
        let hints = self.hints(question);
        debug!(hints = hints.len(), turns = history.len(), "computed column hints");

        let request = self.request(question, &hints, language).with_history(history);
        let raw = match oracle.decide(&request) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "oracle failed, falling back to clarify");
                RawDecision::fallback()
            }
        };

        self.reconcile(&raw, &hints, language)
    }
}
