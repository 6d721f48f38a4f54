//! Query parser: extracts directives from a raw query string
//! before it reaches lexical/vector search.
//!
//! Two directives are recognized: `after:<RFC-3339>` for a temporal
//! filter, and recency cues (`recent:`, `latest`) that boost
//! `boost_recency` within `[1.0, 3.0]`. Everything else passes through
//! as search text.

use crate::types::{ParsedQuery, TimeHint};

const BASE_RECENCY: f64 = 1.0;
const MAX_RECENCY: f64 = 3.0;
const RECENCY_STEP: f64 = 1.0;

/// Parse directives out of `raw`, returning the cleaned query text plus
/// any extracted hints.
#[must_use]
pub fn parse_query(raw: &str) -> ParsedQuery {
    let mut boost_recency = BASE_RECENCY;
    let mut time_hint = None;
    let mut kept_tokens: Vec<&str> = Vec::new();

    for token in raw.split_whitespace() {
        let lower = token.to_lowercase();
        if let Some(value) = token.strip_prefix("after:") {
            if !value.is_empty() {
                time_hint = Some(TimeHint { after: value.to_string() });
            }
            continue;
        }
        if lower.starts_with("recent:") || lower == "latest" {
            boost_recency = (boost_recency + RECENCY_STEP).min(MAX_RECENCY);
            continue;
        }
        kept_tokens.push(token);
    }

    ParsedQuery {
        text: kept_tokens.join(" "),
        time_hint,
        boost_recency,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_after_directive_into_time_hint() {
        let parsed = parse_query("rate limiter after:2026-01-01T00:00:00Z");
        assert_eq!(parsed.text, "rate limiter");
        assert_eq!(
            parsed.time_hint,
            Some(TimeHint { after: "2026-01-01T00:00:00Z".into() })
        );
        assert_eq!(parsed.boost_recency, 1.0);
    }

    #[test]
    fn recency_cues_boost_and_clip() {
        let parsed = parse_query("latest recent: recent: auth flow");
        assert_eq!(parsed.text, "auth flow");
        assert!(parsed.boost_recency > 1.0);
        assert!(parsed.boost_recency <= 3.0);
    }

    #[test]
    fn plain_query_has_defaults() {
        let parsed = parse_query("connection pooling");
        assert_eq!(parsed.text, "connection pooling");
        assert!(parsed.time_hint.is_none());
        assert_eq!(parsed.boost_recency, 1.0);
    }

    #[test]
    fn empty_directive_values_are_ignored() {
        let parsed = parse_query("after: recent: search terms");
        assert!(parsed.time_hint.is_none());
        assert_eq!(parsed.text, "search terms");
    }
}
