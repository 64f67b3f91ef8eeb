//! Fuzzy column hints.
//!
//! Question text is split into lowercase `[a-z0-9_]` tokens and every token
//! is scored against every flat column reference with [`partial_ratio`].
//! The hints point at *schema identifiers*, not at data values: a token only
//! matches when it overlaps the `table.column` text itself.

use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::LazyLock;
use tracing::trace;

use crate::config::HintConfig;
use crate::schema::{ColumnRef, SchemaIndex};

/// A candidate column and the best score any token gave it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Hint {
    pub column: ColumnRef,
    pub score: f64,
}

/// Ranked, duplicate-free hints, best first.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct HintList {
    hints: Vec<Hint>,
}

impl HintList {
    pub fn len(&self) -> usize {
        self.hints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hints.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Hint> {
        self.hints.iter()
    }

    /// The hinted columns in rank order.
    pub fn columns(&self) -> impl Iterator<Item = &ColumnRef> {
        self.hints.iter().map(|h| &h.column)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.hints.iter().any(|h| h.column == column)
    }

    pub fn into_columns(self) -> Vec<ColumnRef> {
        self.hints.into_iter().map(|h| h.column).collect()
    }
}

impl<'a> IntoIterator for &'a HintList {
    type Item = &'a Hint;
    type IntoIter = std::slice::Iter<'a, Hint>;

    fn into_iter(self) -> Self::IntoIter {
        self.hints.iter()
    }
}

static TOKEN_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("[a-z0-9_]+").expect("token pattern is a fixed character class"));

/// Scores question text against a schema index.
#[derive(Debug, Clone)]
pub struct HintEngine {
    config: HintConfig,
}

impl Default for HintEngine {
    fn default() -> Self {
        Self::new(&HintConfig::default())
    }
}

impl HintEngine {
    pub fn new(config: &HintConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    pub fn config(&self) -> &HintConfig {
        &self.config
    }

    /// Split text into lowercase tokens long enough to be worth scoring.
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        let lowered = text.to_lowercase();
        let min_len = self.config.min_token_len.max(1);
        TOKEN_PATTERN
            .find_iter(&lowered)
            .filter(|m| m.as_str().len() >= min_len)
            .map(|m| m.as_str().to_string())
            .collect()
    }

    /// Up to `config.limit` hints for `text`.
    pub fn suggest(&self, text: &str, index: &SchemaIndex) -> HintList {
        self.suggest_top(text, index, self.config.limit)
    }

    /// Up to `k` hints for `text`.
    ///
    /// Each candidate keeps only its single best token score; ties rank by
    /// declaration order in the index.
    pub fn suggest_top(&self, text: &str, index: &SchemaIndex, k: usize) -> HintList {
        if k == 0 || index.is_empty() {
            return HintList::default();
        }

        let flat = index.flat_columns();
        let mut best: HashMap<usize, f64> = HashMap::new();

        for token in self.tokenize(text) {
            let mut scored: Vec<(usize, f64)> = flat
                .iter()
                .enumerate()
                .map(|(i, col)| (i, partial_ratio(&token, col.as_str())))
                .collect();
            scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));

            let mut kept = 0usize;
            for (i, score) in scored.into_iter().take(self.config.per_token_limit) {
                if score < self.config.threshold {
                    break;
                }
                // duplicate references collapse onto their first declaration
                let pos = index.position(flat[i].as_str()).unwrap_or(i);
                let slot = best.entry(pos).or_insert(score);
                if score > *slot {
                    *slot = score;
                }
                kept += 1;
            }
            trace!(token = %token, kept, "token scored");
        }

        let mut ranked: Vec<(usize, f64)> = best.into_iter().collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));

        HintList {
            hints: ranked
                .into_iter()
                .take(k)
                .map(|(pos, score)| Hint {
                    column: flat[pos].clone(),
                    score,
                })
                .collect(),
        }
    }
}

/// Normalized Indel similarity of two strings, 0 to 100.
///
/// `100 * 2 * lcs / (len(a) + len(b))`, where `lcs` is the longest common
/// subsequence counted in chars. Two empty strings score 100.
pub fn ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    ratio_chars(&a, &b)
}

fn ratio_chars(a: &[char], b: &[char]) -> f64 {
    let total = a.len() + b.len();
    if total == 0 {
        return 100.0;
    }
    100.0 * (2 * lcs_len(a, b)) as f64 / total as f64
}

/// Best [`ratio`] of the shorter string against any same-length window of
/// the longer one, including the partial windows hanging off either end.
///
/// A substring match scores 100 no matter how much longer the other string is.
pub fn partial_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let (needle, hay) = if a.len() <= b.len() { (a, b) } else { (b, a) };

    if needle.is_empty() {
        return if hay.is_empty() { 100.0 } else { 0.0 };
    }

    let n = needle.len();
    let m = hay.len();
    let windows = (1..n)
        .map(|end| &hay[..end])
        .chain((0..=m - n).map(|start| &hay[start..start + n]))
        .chain((m - n + 1..m).map(|start| &hay[start..]));

    let mut best = 0.0f64;
    for window in windows {
        let score = ratio_chars(&needle, window);
        if score > best {
            best = score;
            if best >= 100.0 {
                break;
            }
        }
    }
    best
}

/// Longest common subsequence length, single rolling row.
fn lcs_len(a: &[char], b: &[char]) -> usize {
    let (short, long) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    let mut row = vec![0usize; short.len() + 1];

    for &lc in long {
        let mut diag = 0;
        for (j, &sc) in short.iter().enumerate() {
            let up = row[j + 1];
            row[j + 1] = if lc == sc { diag + 1 } else { up.max(row[j]) };
            diag = up;
        }
    }
    row[short.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shop() -> SchemaIndex {
        SchemaIndex::from_tables([
            ("customers", vec!["id", "full_name", "email", "city"]),
            ("products", vec!["id", "name", "category", "price_cents"]),
            ("campaigns", vec!["id", "name", "budget_cents"]),
        ])
    }

    #[test]
    fn test_lcs() {
        let chars = |s: &str| s.chars().collect::<Vec<_>>();
        assert_eq!(lcs_len(&chars("abcde"), &chars("ace")), 3);
        assert_eq!(lcs_len(&chars("abc"), &chars("xyz")), 0);
        assert_eq!(lcs_len(&chars(""), &chars("abc")), 0);
    }

    #[test]
    fn test_ratio() {
        assert_eq!(ratio("", ""), 100.0);
        assert_eq!(ratio("abc", "abc"), 100.0);
        assert_eq!(ratio("abc", ""), 0.0);
        // lcs("kitten", "sitting") = 4 ("ittn")
        assert!((ratio("kitten", "sitting") - 800.0 / 13.0).abs() < 1e-9);
    }

    #[test]
    fn test_partial_ratio_substring() {
        assert_eq!(partial_ratio("products", "products.name"), 100.0);
        assert_eq!(partial_ratio("products.name", "name"), 100.0);
        assert_eq!(partial_ratio("", ""), 100.0);
        assert_eq!(partial_ratio("", "abc"), 0.0);
    }

    #[test]
    fn test_partial_ratio_edge_windows() {
        // best window is the one-char prefix "b": ratio("ab", "b") = 2*1/3
        assert!((partial_ratio("ab", "bzzz") - 200.0 / 3.0).abs() < 1e-9);
        // suffix window "za" of "zzza"
        assert!((partial_ratio("ab", "zzza") - 200.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_partial_ratio_symmetric() {
        assert_eq!(
            partial_ratio("budget", "campaigns.budget_cents"),
            partial_ratio("campaigns.budget_cents", "budget")
        );
    }

    #[test]
    fn test_tokenize() {
        let engine = HintEngine::default();
        assert_eq!(
            engine.tokenize("Show top-10 Customers in NY, by e_mail!"),
            vec!["show", "top", "customers", "e_mail"]
        );
        assert!(engine.tokenize("Покажи кампанії").is_empty());
    }

    #[test]
    fn test_suggest_ranks_and_caps() {
        let hints = HintEngine::default().suggest("What is the total budget?", &shop());
        assert!(hints.len() <= 3);
        assert_eq!(
            hints.columns().next().map(ColumnRef::as_str),
            Some("campaigns.budget_cents")
        );
    }

    #[test]
    fn test_tie_breaks_on_declaration_order() {
        // "name" is a full substring of three references; the first declared wins
        let hints = HintEngine::default().suggest_top("name", &shop(), 2);
        let cols: Vec<&str> = hints.columns().map(ColumnRef::as_str).collect();
        assert_eq!(cols, vec!["customers.full_name", "products.name"]);
        assert!(hints.iter().all(|h| h.score == 100.0));
    }

    #[test]
    fn test_no_boost_across_tokens() {
        let index = shop();
        let engine = HintEngine::default();
        let once = engine.suggest_top("email", &index, 1);
        let twice = engine.suggest_top("email email email", &index, 1);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_below_threshold_is_empty() {
        let hints = HintEngine::default().suggest("Why is the sky blue?", &SchemaIndex::from_tables([
            ("orders", vec!["id"]),
        ]));
        assert!(hints.is_empty());
    }

    #[test]
    fn test_duplicate_columns_not_repeated() {
        let index = SchemaIndex::parse("### t\n- email: a\n- email: b\n- phone: c\n");
        let hints = HintEngine::default().suggest("email", &index);
        let cols: Vec<&str> = hints.columns().map(ColumnRef::as_str).collect();
        assert_eq!(cols.iter().filter(|c| **c == "t.email").count(), 1);
    }

    #[test]
    fn test_per_token_limit() {
        let config = HintConfig {
            per_token_limit: 1,
            ..HintConfig::default()
        };
        let hints = HintEngine::new(&config).suggest("name", &shop());
        assert_eq!(hints.len(), 1);
    }

    #[test]
    fn test_huge_min_token_len_yields_no_tokens() {
        let config = HintConfig {
            min_token_len: 1_000_000,
            ..HintConfig::default()
        };
        let engine = HintEngine::new(&config);
        assert!(engine.tokenize("products containing peanuts").is_empty());
        assert!(engine.suggest("products", &shop()).is_empty());
    }

    #[test]
    fn test_min_token_len_filters_short_tokens() {
        let config = HintConfig {
            min_token_len: 5,
            ..HintConfig::default()
        };
        assert_eq!(
            HintEngine::new(&config).tokenize("show all orders by email"),
            vec!["orders", "email"]
        );
    }

    #[test]
    fn test_zero_k() {
        assert!(HintEngine::default().suggest_top("products", &shop(), 0).is_empty());
    }
}
