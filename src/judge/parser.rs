//! Permissive extraction of numeric scores from a free-text judge reply.
//!
//! The judge is asked for comma-separated numbers but is not trusted to
//! comply: any integer or decimal substrings are taken in order of
//! appearance and aligned to the expected slot count.

use std::sync::OnceLock;

use regex::Regex;

use super::ScoreRange;

/// Outcome of scanning one judge reply against an expected slot count.
///
/// `Partial` and `Unparseable` both end up on the fallback policy, but
/// they are distinct failure modes and are reported separately.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedScores {
    /// One clamped score per slot
    Complete(Vec<f64>),
    /// Fewer numbers than slots; missing slots are `None`
    Partial(Vec<Option<f64>>),
    /// No numbers at all in the reply
    Unparseable,
}

fn number_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"-?\d+(?:\.\d+)?").expect("hard-coded pattern"))
}

/// Scan `reply` for numeric substrings, clamp each into `range`, and align
/// the first `expected` of them to the response slots in order.
pub fn parse_scores(reply: &str, expected: usize, range: ScoreRange) -> ParsedScores {
    let found: Vec<f64> = number_pattern()
        .find_iter(reply)
        .take(expected)
        .filter_map(|m| m.as_str().parse::<f64>().ok())
        .map(|value| range.clamp(value))
        .collect();

    if found.is_empty() {
        ParsedScores::Unparseable
    } else if found.len() < expected {
        let mut aligned: Vec<Option<f64>> = found.into_iter().map(Some).collect();
        aligned.resize(expected, None);
        ParsedScores::Partial(aligned)
    } else {
        ParsedScores::Complete(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn range() -> ScoreRange {
        ScoreRange::new(1.0, 5.0)
    }

    #[test]
    fn clean_reply_parses_completely() {
        let parsed = parse_scores("4.5, 3.0, 5.0", 3, range());
        assert_eq!(parsed, ParsedScores::Complete(vec![4.5, 3.0, 5.0]));
    }

    #[rstest]
    #[case("Scores: 4 and 2.5", vec![4.0, 2.5])]
    #[case("1) 3.5\n2) 4", vec![1.0, 3.5])]
    #[case("I'd say 4.5/5 and 3/5", vec![4.5, 5.0])]
    fn numbers_are_taken_in_order_of_appearance(
        #[case] reply: &str,
        #[case] expected: Vec<f64>,
    ) {
        assert_eq!(parse_scores(reply, 2, range()), ParsedScores::Complete(expected));
    }

    #[test]
    fn out_of_range_scores_are_clamped() {
        let parsed = parse_scores("0.5, 9, -2", 3, range());
        assert_eq!(parsed, ParsedScores::Complete(vec![1.0, 5.0, 1.0]));
    }

    #[test]
    fn excess_numbers_are_ignored() {
        let parsed = parse_scores("4, 3, 2, 1", 2, range());
        assert_eq!(parsed, ParsedScores::Complete(vec![4.0, 3.0]));
    }

    #[test]
    fn short_reply_is_partial_with_trailing_none() {
        let parsed = parse_scores("only 4.0 here", 3, range());
        assert_eq!(
            parsed,
            ParsedScores::Partial(vec![Some(4.0), None, None])
        );
    }

    #[test]
    fn reply_without_numbers_is_unparseable() {
        assert_eq!(
            parse_scores("I cannot rank these responses.", 2, range()),
            ParsedScores::Unparseable
        );
        assert_eq!(parse_scores("", 2, range()), ParsedScores::Unparseable);
    }
}
