use serde::{Deserialize, Serialize};

use crate::domain::{Position, Range};

/// Unit in which a position's `character` is counted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionEncoding {
    /// Characters are byte offsets within the line.
    #[default]
    #[serde(rename = "utf-8")]
    Utf8,
    /// Characters are UTF-16 code units (the protocol's default).
    #[serde(rename = "utf-16")]
    Utf16,
}

impl PositionEncoding {
    /// Parse the `positionEncoding` value a server announces.
    pub fn from_protocol(kind: &str) -> Option<Self> {
        match kind {
            "utf-8" => Some(Self::Utf8),
            "utf-16" => Some(Self::Utf16),
            _ => None,
        }
    }
}

/// Byte offset of the first character of every line.
///
/// `"a\nbb\nccc"` yields `[0, 2, 5]`; the last line ends at end-of-text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LineIndex {
    line_starts: Vec<usize>,
    text_len: usize,
}

impl LineIndex {
    pub fn new(text: &str) -> Self {
        Self {
            line_starts: compute_line_starts(text),
            text_len: text.len(),
        }
    }

    pub fn line_starts(&self) -> &[usize] {
        &self.line_starts
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// Byte span of a line, terminator included. `None` past the last line.
    pub fn line_span(&self, line: usize) -> Option<(usize, usize)> {
        let start = *self.line_starts.get(line)?;
        let end = self
            .line_starts
            .get(line + 1)
            .copied()
            .unwrap_or(self.text_len);
        Some((start, end))
    }

    /// Absolute byte offset of a position.
    ///
    /// With UTF-8 this is `line_starts[line] + character`; with UTF-16 the
    /// character is converted against the line's text. The caller still has
    /// to check the offset lands on a char boundary.
    pub fn offset(&self, text: &str, position: Position, encoding: PositionEncoding) -> Option<usize> {
        let line = position.line as usize;
        let character = position.character as usize;
        match encoding {
            PositionEncoding::Utf8 => {
                let start = *self.line_starts.get(line)?;
                start.checked_add(character)
            }
            PositionEncoding::Utf16 => {
                let (start, end) = self.line_span(line)?;
                let line_text = text.get(start..end)?;
                convert_utf16_to_byte_in_line(line_text, character).map(|offset| start + offset)
            }
        }
    }

    /// Borrow the text covered by `range`, if it addresses valid text.
    pub fn slice<'a>(&self, text: &'a str, range: &Range, encoding: PositionEncoding) -> Option<&'a str> {
        let start = self.offset(text, range.start, encoding)?;
        let end = self.offset(text, range.end, encoding)?;
        text.get(start..end)
    }
}

/// Compute line start offsets for efficient position mapping
pub fn compute_line_starts(text: &str) -> Vec<usize> {
    let mut line_starts = vec![0];
    line_starts.extend(
        text.char_indices()
            .filter(|&(_, ch)| ch == '\n')
            .map(|(offset, _)| offset + 1),
    );
    line_starts
}

/// Convert UTF-16 position to byte position within a line
/// Returns None if the UTF-16 position is invalid
#[inline(always)]
pub fn convert_utf16_to_byte_in_line(line_text: &str, utf16_pos: usize) -> Option<usize> {
    let mut byte_offset = 0;
    let mut utf16_offset = 0;

    for ch in line_text.chars() {
        if utf16_offset >= utf16_pos {
            return (utf16_offset == utf16_pos).then_some(byte_offset);
        }
        utf16_offset += ch.len_utf16();
        byte_offset += ch.len_utf8();
    }

    // The end of the line is addressable
    (utf16_offset == utf16_pos).then_some(byte_offset)
}
