//! Range-filtered token retrieval.
//!
//! Extracts the tokens lying inside a range from a token list sorted by
//! start position, without scanning the whole list.

use crate::domain::{Range, Token};

/// Return the contiguous run of `tokens` fully contained in `range`.
///
/// `tokens` must be sorted by start and non-overlapping. Two binary searches
/// bound the run: the first token starting at or after `range.start`, and
/// the first starting at or after `range.end`. The right bound then steps
/// back over tokens that start inside the range but run past its end.
pub fn filter_tokens_by_range<'a>(tokens: &'a [Token], range: &Range) -> &'a [Token] {
    if tokens.is_empty() {
        return &[];
    }

    let left = tokens.partition_point(|token| token.location.range.start < range.start);
    if left == tokens.len() {
        return &[];
    }

    // First token starting at or after range.end, clamped to the last token:
    // a zero-length token sitting exactly on range.end is still contained.
    let mut right = tokens
        .partition_point(|token| token.location.range.start < range.end)
        .min(tokens.len() - 1);

    while !range.includes(&tokens[right].location.range) {
        if right == left {
            return &[];
        }
        right -= 1;
    }
    &tokens[left..=right]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Location, Position};
    use url::Url;

    fn range(sl: u32, sc: u32, el: u32, ec: u32) -> Range {
        Range::new(Position::new(sl, sc), Position::new(el, ec))
    }

    fn token(r: Range, text: &str) -> Token {
        Token {
            location: Location::new(Url::parse("file:///a.go").unwrap(), r),
            token_type: "variable".to_string(),
            modifiers: Vec::new(),
            text: text.to_string(),
        }
    }

    fn texts(tokens: &[Token]) -> Vec<&str> {
        tokens.iter().map(|t| t.text.as_str()).collect()
    }

    fn sample() -> Vec<Token> {
        vec![
            token(range(0, 0, 0, 3), "one"),
            token(range(1, 0, 1, 2), "two"),
            token(range(2, 5, 2, 8), "three"),
        ]
    }

    #[test]
    fn selects_tokens_inside_range() {
        let tokens = sample();
        let selected = filter_tokens_by_range(&tokens, &range(1, 0, 2, 8));
        assert_eq!(texts(selected), vec!["two", "three"]);
    }

    #[test]
    fn range_matching_nothing_is_empty() {
        let tokens = sample();
        assert!(filter_tokens_by_range(&tokens, &range(0, 5, 0, 9)).is_empty());
        assert!(filter_tokens_by_range(&tokens, &range(7, 0, 9, 0)).is_empty());
    }

    #[test]
    fn empty_token_list_is_empty() {
        assert!(filter_tokens_by_range(&[], &range(0, 0, 9, 0)).is_empty());
    }

    #[test]
    fn token_straddling_the_end_is_excluded() {
        let tokens = sample();
        let selected = filter_tokens_by_range(&tokens, &range(1, 0, 2, 6));
        assert_eq!(texts(selected), vec!["two"]);
    }

    #[test]
    fn token_straddling_the_start_is_excluded() {
        let tokens = sample();
        let selected = filter_tokens_by_range(&tokens, &range(0, 1, 1, 2));
        assert_eq!(texts(selected), vec!["two"]);
    }

    #[test]
    fn whole_document_range_selects_everything() {
        let tokens = sample();
        let selected = filter_tokens_by_range(&tokens, &range(0, 0, u32::MAX, 0));
        assert_eq!(selected.len(), 3);
    }

    #[test]
    fn single_token_range_selects_exactly_it() {
        let tokens = sample();
        let selected = filter_tokens_by_range(&tokens, &range(1, 0, 1, 2));
        assert_eq!(texts(selected), vec!["two"]);
    }
}
