use serde::{Deserialize, Serialize};

/// LSP-style position within a text document.
///
/// Zero-based. Ordering is lexicographic with the line as the major key, so
/// the derived `Ord` is exactly the protocol's "less than" relation.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Position {
    pub line: u32,
    pub character: u32,
}

impl Position {
    pub const fn new(line: u32, character: u32) -> Self {
        Self { line, character }
    }
}

/// A span between two positions. `start <= end` is a server guarantee.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    pub const fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// Non-strict containment: `other` lies entirely within `self`.
    ///
    /// A range includes itself.
    pub fn includes(&self, other: &Range) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Half-open membership test: `start <= position < end`.
    pub fn contains_position(&self, position: Position) -> bool {
        self.start <= position && position < self.end
    }

    /// Coarse size used to rank ranges that do not nest.
    ///
    /// Lines spanned first, then the character delta between the endpoints.
    pub fn span_key(&self) -> (u32, i64) {
        (
            self.end.line.saturating_sub(self.start.line),
            i64::from(self.end.character) - i64::from(self.start.character),
        )
    }
}

/// Upper bound of a decode window.
///
/// `Unbounded` stands for "end of document" without a magic coordinate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RangeEnd {
    At(Position),
    Unbounded,
}

/// The window of positions a decode pass keeps tokens from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TokenWindow {
    pub start: Position,
    pub end: RangeEnd,
}

impl TokenWindow {
    /// The whole document.
    pub const fn unbounded() -> Self {
        Self {
            start: Position::new(0, 0),
            end: RangeEnd::Unbounded,
        }
    }

    pub fn accepts(&self, position: Position) -> bool {
        if position < self.start {
            return false;
        }
        match self.end {
            RangeEnd::At(end) => position < end,
            RangeEnd::Unbounded => true,
        }
    }
}

impl From<Range> for TokenWindow {
    fn from(range: Range) -> Self {
        Self {
            start: range.start,
            end: RangeEnd::At(range.end),
        }
    }
}

impl Default for TokenWindow {
    fn default() -> Self {
        Self::unbounded()
    }
}
