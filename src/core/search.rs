//! Boolean catalog search.
//!
//! Query terms carry a disposition prefix: `+` required, `-` excluded, no
//! prefix optional. One pair of matching surrounding quotes turns a term
//! into a multi-word phrase. Matching is case-insensitive substring search
//! over each entry's id, title, and tags.

use crate::core::types::IndexEntry;

/// A parsed query: terms bucketed by disposition, already case-folded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    pub required: Vec<String>,
    pub excluded: Vec<String>,
    pub optional: Vec<String>,
}

impl Query {
    /// Parse raw terms as typed by a caller. Empty bodies after prefix and
    /// quote stripping are discarded.
    pub fn parse<S: AsRef<str>>(terms: &[S]) -> Self {
        let mut query = Self::default();
        for raw in terms {
            let term = raw.as_ref().trim();
            let (prefix, rest) = match term.as_bytes().first() {
                Some(b'+') => (Some(b'+'), &term[1..]),
                Some(b'-') => (Some(b'-'), &term[1..]),
                _ => (None, term),
            };
            let body = strip_quotes(rest).to_lowercase();
            if body.is_empty() {
                continue;
            }
            match prefix {
                Some(b'+') => query.required.push(body),
                Some(b'-') => query.excluded.push(body),
                _ => query.optional.push(body),
            }
        }
        query
    }

    /// An entry matches iff every required term is present, no excluded term
    /// is present, and (only when optional terms exist) at least one optional
    /// term is present.
    pub fn matches(&self, entry: &IndexEntry) -> bool {
        let hay = haystack(entry);
        if self.required.iter().any(|t| !hay.contains(t.as_str())) {
            return false;
        }
        if self.excluded.iter().any(|t| hay.contains(t.as_str())) {
            return false;
        }
        if !self.optional.is_empty() && !self.optional.iter().any(|t| hay.contains(t.as_str())) {
            return false;
        }
        true
    }
}

/// Strip one pair of matching surrounding quotes, if present.
fn strip_quotes(term: &str) -> &str {
    let bytes = term.as_bytes();
    if term.len() >= 2
        && (bytes[0] == b'\'' || bytes[0] == b'"')
        && bytes[bytes.len() - 1] == bytes[0]
    {
        &term[1..term.len() - 1]
    } else {
        term
    }
}

/// Case-folded search text for an entry: id, title, and tags joined by spaces.
fn haystack(entry: &IndexEntry) -> String {
    let mut hay = String::with_capacity(
        entry.id.len() + entry.title.len() + entry.tags.iter().map(|t| t.len() + 1).sum::<usize>() + 2,
    );
    hay.push_str(&entry.id);
    hay.push(' ');
    hay.push_str(&entry.title);
    for tag in &entry.tags {
        hay.push(' ');
        hay.push_str(tag);
    }
    hay.to_lowercase()
}

/// Filter an index by raw query terms, preserving original order.
/// An empty result is a legitimate "no matches" outcome, not an error.
pub fn evaluate<'a, S: AsRef<str>>(index: &'a [IndexEntry], terms: &[S]) -> Vec<&'a IndexEntry> {
    let query = Query::parse(terms);
    index.iter().filter(|entry| query.matches(entry)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, title: &str, tags: &[&str]) -> IndexEntry {
        IndexEntry {
            id: id.to_string(),
            title: title.to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    fn fixture() -> Vec<IndexEntry> {
        vec![
            entry(
                "windows/process/list",
                "Process list and triage",
                &["windows", "process"],
            ),
            entry(
                "windows/network/connections",
                "Active network connections",
                &["windows", "network"],
            ),
            entry("linux/process/list", "Process list", &["linux", "process"]),
            entry(
                "windows/persistence/autostarts",
                "Autostarts",
                &["windows", "persistence"],
            ),
        ]
    }

    fn ids<'a>(hits: &[&'a IndexEntry]) -> Vec<&'a str> {
        hits.iter().map(|e| e.id.as_str()).collect()
    }

    #[test]
    fn test_required_excluded_optional() {
        let idx = fixture();
        let hits = evaluate(&idx, &["+windows", "-persistence", "process"]);
        assert_eq!(ids(&hits), vec!["windows/process/list"]);
    }

    #[test]
    fn test_quoted_phrase_matches_exact_substring() {
        let idx = fixture();
        let hits = evaluate(&idx, &["+\"active network\""]);
        assert_eq!(ids(&hits), vec!["windows/network/connections"]);

        // The two words separately live in other entries, but the phrase
        // must appear contiguously.
        let none = evaluate(&idx, &["+\"network active\""]);
        assert!(none.is_empty());
    }

    #[test]
    fn test_required_phrase_plus_required_term() {
        let idx = fixture();
        let hits = evaluate(&idx, &["+\"process list\"", "+windows"]);
        assert_eq!(ids(&hits), vec!["windows/process/list"]);
    }

    #[test]
    fn test_single_quotes_also_form_phrases() {
        let idx = fixture();
        let hits = evaluate(&idx, &["'active network'"]);
        assert_eq!(ids(&hits), vec!["windows/network/connections"]);
    }

    #[test]
    fn test_matching_is_case_insensitive() {
        let idx = fixture();
        let hits = evaluate(&idx, &["+WINDOWS", "NetWork"]);
        assert_eq!(ids(&hits), vec!["windows/network/connections"]);
    }

    #[test]
    fn test_optional_terms_or_together() {
        let idx = fixture();
        let hits = evaluate(&idx, &["persistence", "linux"]);
        assert_eq!(
            ids(&hits),
            vec!["linux/process/list", "windows/persistence/autostarts"]
        );
    }

    #[test]
    fn test_empty_query_matches_everything_in_order() {
        let idx = fixture();
        let hits = evaluate::<&str>(&idx, &[]);
        assert_eq!(hits.len(), 4);
        assert_eq!(ids(&hits)[0], "windows/process/list");
    }

    #[test]
    fn test_empty_result_is_not_an_error() {
        let idx = fixture();
        let hits = evaluate(&idx, &["+windows", "+linux"]);
        assert!(hits.is_empty());
    }

    #[test]
    fn test_bare_prefix_and_empty_quotes_are_discarded() {
        let query = Query::parse(&["+", "-", "\"\"", "''", "+''"]);
        assert_eq!(query, Query::default());
    }

    #[test]
    fn test_quote_stripping_needs_matching_pair() {
        let query = Query::parse(&["\"half", "'mixed\""]);
        assert_eq!(query.optional, vec!["\"half", "'mixed\""]);
    }

    #[test]
    fn test_only_one_quote_pair_is_stripped() {
        let query = Query::parse(&["\"\"double\"\""]);
        assert_eq!(query.optional, vec!["\"double\""]);
    }

    proptest::proptest! {
        #[test]
        fn prop_parse_never_panics(terms in proptest::collection::vec(".*", 0..8)) {
            let query = Query::parse(&terms);
            // Parsed bodies never keep a disposition prefix or stay empty
            for bucket in [&query.required, &query.excluded, &query.optional] {
                for term in bucket {
                    proptest::prop_assert!(!term.is_empty());
                }
            }
        }
    }
}
