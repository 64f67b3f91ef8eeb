//! # sqlroute — schema-true routing for SQL chat assistants
//!
//! A conversational database assistant has to decide, for every question,
//! whether to generate SQL or to ask a clarifying question. The decision
//! itself comes from an external oracle (usually a language model). This
//! crate is the deterministic machinery around it:
//!
//! - [`schema`] turns a markdown-style schema description into a [`SchemaIndex`]
//! - [`fuzzy`] ranks `table.column` hints for a question
//! - [`reconcile`] repairs the oracle's answer so only real columns come out
//!
//! ## Quick Example
//!
//! ```
//! use sqlroute::prelude::*;
//!
//! let index = sqlroute::build_schema_index("### products\n- name: text\n- ingredients: text\n");
//! let hints = sqlroute::suggest("List all products containing peanuts", &index, 3);
//!
//! let raw = RawDecision::new("sql_query", ["products.fake_col"]);
//! let decision = sqlroute::reconcile(&raw, &hints, &index);
//!
//! assert_eq!(decision.route, Route::SqlQuery);
//! assert!(decision.suggestions.iter().all(|c| index.contains(c.as_str())));
//! ```

pub mod config;
pub mod error;
pub mod fuzzy;
pub mod reconcile;
pub mod route;
pub mod router;
pub mod schema;

pub mod prelude {
    pub use crate::config::RouterConfig;
    pub use crate::error::*;
    pub use crate::fuzzy::{Hint, HintEngine, HintList};
    pub use crate::reconcile::Reconciler;
    pub use crate::route::{ContractViolation, Explanation, RawDecision, Route, RoutingDecision};
    pub use crate::router::{ChatTurn, Oracle, OracleError, OracleRequest, Router, StaticOracle};
    pub use crate::schema::{ColumnRef, SchemaIndex, SchemaIndexBuilder};
}

pub use schema::{ColumnRef, SchemaIndex};

/// Parse a schema description into an index.
///
/// # Example
///
/// ```
/// let index = sqlroute::build_schema_index("### users\n- id: uuid\n- email: text\n");
/// assert_eq!(index.flat_columns(), &["users.id", "users.email"]);
/// ```
pub fn build_schema_index(text: &str) -> SchemaIndex {
    SchemaIndex::parse(text)
}

/// Up to `k` fuzzy column hints for `text`, with default thresholds.
pub fn suggest(text: &str, index: &SchemaIndex, k: usize) -> fuzzy::HintList {
    fuzzy::HintEngine::default().suggest_top(text, index, k)
}

/// Reconcile an untrusted oracle decision with the default suggestion cap.
pub fn reconcile(
    raw: &route::RawDecision,
    hints: &fuzzy::HintList,
    index: &SchemaIndex,
) -> route::RoutingDecision {
    reconcile::Reconciler::default().reconcile(raw, hints, index)
}
