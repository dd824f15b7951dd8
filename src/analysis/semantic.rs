//! Semantic token stream decoding.
//!
//! Servers send tokens as a flat `u32` array, five integers per token:
//! `deltaLine, deltaStart, length, tokenType, tokenModifiers`. `deltaStart`
//! is relative to the previous token when both sit on the same line and
//! absolute otherwise.

use crate::document::{Document, PositionEncoding};
use crate::domain::{Location, Position, Range, Token, TokenLegend, TokenWindow};
use crate::error::{ClientError, ClientResult};

/// Integers per encoded token.
pub const TOKEN_STRIDE: usize = 5;

/// A token with absolute coordinates, before names and text are resolved.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AbsoluteToken {
    pub range: Range,
    pub token_type: u32,
    pub modifiers: u32,
}

/// Convert delta-encoded data to absolute positions.
///
/// A stream whose length is not a multiple of five, or whose deltas run past
/// `u32` coordinates, is rejected as a whole.
pub fn decode_positions(data: &[u32]) -> ClientResult<Vec<AbsoluteToken>> {
    let malformed = || ClientError::MalformedTokenStream { len: data.len() };
    if data.len() % TOKEN_STRIDE != 0 {
        return Err(malformed());
    }

    let mut tokens = Vec::with_capacity(data.len() / TOKEN_STRIDE);
    let mut line = 0u32;
    let mut character = 0u32;

    for chunk in data.chunks_exact(TOKEN_STRIDE) {
        let (delta_line, delta_start, length) = (chunk[0], chunk[1], chunk[2]);
        let (token_type, modifiers) = (chunk[3], chunk[4]);

        line = line.checked_add(delta_line).ok_or_else(malformed)?;
        character = if delta_line == 0 {
            character.checked_add(delta_start).ok_or_else(malformed)?
        } else {
            delta_start
        };
        let end_character = character.checked_add(length).ok_or_else(malformed)?;

        tokens.push(AbsoluteToken {
            range: Range::new(
                Position::new(line, character),
                Position::new(line, end_character),
            ),
            token_type,
            modifiers,
        });
    }

    Ok(tokens)
}

/// Decode a raw stream into named tokens with their source text.
///
/// Only tokens starting inside `window` are kept. Names come from `legend`;
/// indices it does not cover become `unknown(N)` placeholders. Text that the
/// document cannot supply (a token past the end of the file) resolves to an
/// empty string.
pub fn decode_tokens(
    data: &[u32],
    legend: &TokenLegend,
    document: &Document,
    window: TokenWindow,
    encoding: PositionEncoding,
) -> ClientResult<Vec<Token>> {
    let tokens = decode_positions(data)?
        .into_iter()
        .filter(|token| window.accepts(token.range.start))
        .map(|token| {
            let text = match document.locate(&token.range, encoding) {
                Ok(text) => text.to_string(),
                Err(e) => {
                    log::warn!(target: "lsp_semcache::semantic", "{}", e);
                    String::new()
                }
            };
            Token {
                location: Location::new(document.uri().clone(), token.range),
                token_type: legend.type_name(token.token_type),
                modifiers: legend.modifier_names(token.modifiers),
                text,
            }
        })
        .collect();
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn range(sl: u32, sc: u32, el: u32, ec: u32) -> Range {
        Range::new(Position::new(sl, sc), Position::new(el, ec))
    }

    fn legend() -> TokenLegend {
        TokenLegend::new(["keyword", "variable"], ["declaration", "readonly"])
    }

    fn document(text: &str) -> Document {
        Document::new(Url::parse("file:///src/lib.rs").unwrap(), text.to_string())
    }

    #[test]
    fn same_line_deltas_are_relative() {
        let tokens = decode_positions(&[2, 4, 3, 0, 0, 0, 6, 1, 0, 0]).unwrap();
        assert_eq!(tokens[0].range, range(2, 4, 2, 7));
        assert_eq!(tokens[1].range, range(2, 10, 2, 11));
    }

    #[test]
    fn new_line_start_is_absolute() {
        let tokens = decode_positions(&[0, 8, 2, 0, 0, 3, 1, 4, 0, 0]).unwrap();
        assert_eq!(tokens[1].range, range(3, 1, 3, 5));
    }

    #[test]
    fn decodes_names_modifiers_and_text() {
        let doc = document("let\n  abcd\n");
        let tokens = decode_tokens(
            &[0, 0, 3, 1, 0, 1, 2, 4, 2, 1],
            &legend(),
            &doc,
            TokenWindow::unbounded(),
            PositionEncoding::Utf8,
        )
        .unwrap();

        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].location.range, range(0, 0, 0, 3));
        assert_eq!(tokens[0].token_type, "variable");
        assert!(tokens[0].modifiers.is_empty());
        assert_eq!(tokens[0].text, "let");

        assert_eq!(tokens[1].location.range, range(1, 2, 1, 6));
        assert_eq!(tokens[1].token_type, "unknown(2)");
        assert_eq!(tokens[1].modifiers, vec!["declaration"]);
        assert_eq!(tokens[1].text, "abcd");
    }

    #[test]
    fn window_keeps_tokens_starting_before_its_end() {
        let doc = document("aa bb\ncc dd\n");
        let data = [0, 0, 2, 0, 0, 0, 3, 2, 0, 0, 1, 0, 2, 0, 0, 0, 3, 2, 0, 0];
        let tokens = decode_tokens(
            &data,
            &legend(),
            &doc,
            TokenWindow::from(range(0, 3, 1, 3)),
            PositionEncoding::Utf8,
        )
        .unwrap();

        let texts: Vec<_> = tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["bb", "cc"]);
    }

    #[test]
    fn incomplete_stride_is_rejected() {
        let err = decode_positions(&[0, 0, 3, 1]).unwrap_err();
        assert!(matches!(err, ClientError::MalformedTokenStream { len: 4 }));
    }

    #[test]
    fn overflowing_delta_is_rejected() {
        let err = decode_positions(&[u32::MAX, 0, 1, 0, 0, 1, 0, 1, 0, 0]).unwrap_err();
        assert!(matches!(err, ClientError::MalformedTokenStream { len: 10 }));
    }

    #[test]
    fn empty_stream_decodes_to_nothing() {
        assert!(decode_positions(&[]).unwrap().is_empty());
    }

    #[test]
    fn token_past_end_of_text_gets_empty_text() {
        let doc = document("x");
        let tokens = decode_tokens(
            &[4, 0, 3, 0, 0],
            &legend(),
            &doc,
            TokenWindow::unbounded(),
            PositionEncoding::Utf8,
        )
        .unwrap();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].text, "");
    }
}
