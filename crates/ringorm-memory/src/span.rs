//! Byte ranges into command text, for pointing at parse errors.

use std::ops::Range;

/// Half-open byte range `start..end` in a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Width in bytes; the caret line under an error is this long.
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }
}

impl From<Range<usize>> for Span {
    fn from(range: Range<usize>) -> Self {
        Self::new(range.start, range.end)
    }
}

/// 1-based character column of `offset`. Commands are single-line.
pub fn offset_to_column(source: &str, offset: usize) -> usize {
    source
        .char_indices()
        .take_while(|(i, _)| *i < offset)
        .count()
        + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_from_lexer_range() {
        let span = Span::from(7..12);
        assert_eq!(span, Span::new(7, 12));
        assert_eq!(span.len(), 5);
        assert_eq!(Span::new(4, 4).len(), 0);
    }

    #[test]
    fn test_offset_to_column() {
        assert_eq!(offset_to_column("SELECT *", 0), 1);
        assert_eq!(offset_to_column("SELECT *", 7), 8);
    }
}
