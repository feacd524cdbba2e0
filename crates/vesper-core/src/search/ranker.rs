use nucleo_matcher::pattern::{AtomKind, CaseMatching, Normalization, Pattern};
use nucleo_matcher::{Config, Matcher, Utf32Str};
use tracing::debug;
use vesper_types::{CatalogEntry, SearchHit};

/// Pluggable ranking policy for the launcher result list.
///
/// Ranking is the one place the search loop is expected to vary per
/// deployment, so the comparator is a trait rather than a constant.
pub trait Ranker {
    /// Rank `catalog` against `query`, best first, truncated to
    /// `limit`. An empty query yields no results.
    fn rank(&mut self, query: &str, catalog: &[CatalogEntry], limit: usize) -> Vec<SearchHit>;
}

/// Default ranker: case-insensitive substring matching over labels
/// (and keywords at lower weight), with exact and prefix bonuses so
/// "Settings" ranks above incidental matches when searching "setting".
#[derive(Debug, Default)]
pub struct SubstringRanker;

const EXACT_BONUS: f64 = 500.0;
const PREFIX_BONUS_BASE: f64 = 250.0;
const SUBSTRING_SCORE: f64 = 100.0;
const KEYWORD_SCORE: f64 = 30.0;

impl SubstringRanker {
    /// Score one label against the query.
    /// - Exact match: 500
    /// - Prefix match: 250 to 500 based on coverage (query.len / label.len)
    /// - Other substring: 100
    /// - No match: none
    // String lengths are usize, coverage ratio uses f64 for precision
    #[allow(clippy::cast_precision_loss)]
    fn label_score(query: &str, label: &str) -> Option<f64> {
        let query_lower = query.to_lowercase();
        let label_lower = label.to_lowercase();

        if query_lower == label_lower {
            return Some(EXACT_BONUS);
        }

        if label_lower.starts_with(&query_lower) {
            let coverage = query.len() as f64 / label.len() as f64;
            return Some(PREFIX_BONUS_BASE + coverage * PREFIX_BONUS_BASE);
        }

        if label_lower.contains(&query_lower) {
            return Some(SUBSTRING_SCORE);
        }

        None
    }

    fn keyword_score(query: &str, entry: &CatalogEntry) -> Option<f64> {
        let query_lower = query.to_lowercase();
        entry
            .keywords
            .iter()
            .any(|kw| kw.to_lowercase().contains(&query_lower))
            .then_some(KEYWORD_SCORE)
    }
}

impl Ranker for SubstringRanker {
    fn rank(&mut self, query: &str, catalog: &[CatalogEntry], limit: usize) -> Vec<SearchHit> {
        if query.is_empty() {
            return Vec::new();
        }

        let mut results: Vec<SearchHit> = catalog
            .iter()
            .filter_map(|entry| {
                let label = Self::label_score(query, &entry.label);
                let keyword = Self::keyword_score(query, entry);
                let score = match (label, keyword) {
                    (Some(l), Some(k)) => l + k,
                    (Some(l), None) => l,
                    (None, Some(k)) => k,
                    (None, None) => return None,
                };
                Some(SearchHit {
                    entry: entry.clone(),
                    score,
                })
            })
            .collect();

        sort_and_truncate(&mut results, limit);
        results
    }
}

/// Fuzzy ranker backed by nucleo
pub struct FuzzyRanker {
    matcher: Matcher,

    /// Weight for keyword matches relative to label matches
    keyword_weight: f64,
}

impl FuzzyRanker {
    #[must_use]
    pub fn new() -> Self {
        Self {
            matcher: Matcher::new(Config::DEFAULT),
            keyword_weight: 0.3,
        }
    }

    fn score_entry(&mut self, pattern: &Pattern, entry: &CatalogEntry) -> Option<f64> {
        let mut buf = Vec::new();

        let label_haystack = Utf32Str::new(&entry.label, &mut buf);
        let label_score = pattern.score(label_haystack, &mut self.matcher)?;

        let keyword_score = if entry.keywords.is_empty() {
            0
        } else {
            let keywords_text = entry.keywords.join(" ");
            let mut kw_buf = Vec::new();
            let kw_haystack = Utf32Str::new(&keywords_text, &mut kw_buf);
            pattern.score(kw_haystack, &mut self.matcher).unwrap_or(0)
        };

        Some(f64::from(label_score) + f64::from(keyword_score) * self.keyword_weight)
    }
}

impl Default for FuzzyRanker {
    fn default() -> Self {
        Self::new()
    }
}

impl Ranker for FuzzyRanker {
    fn rank(&mut self, query: &str, catalog: &[CatalogEntry], limit: usize) -> Vec<SearchHit> {
        if query.is_empty() {
            return Vec::new();
        }

        let pattern = Pattern::new(
            query,
            CaseMatching::Smart,
            Normalization::Smart,
            AtomKind::Fuzzy,
        );

        let mut results: Vec<SearchHit> = catalog
            .iter()
            .filter_map(|entry| {
                self.score_entry(&pattern, entry).map(|score| SearchHit {
                    entry: entry.clone(),
                    score,
                })
            })
            .collect();

        debug!("Fuzzy search found {} matches", results.len());
        sort_and_truncate(&mut results, limit);
        results
    }
}

fn sort_and_truncate(results: &mut Vec<SearchHit>, limit: usize) {
    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    results.truncate(limit);
}
