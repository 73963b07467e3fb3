//! Source location tracking for scanned blocks.
//!
//! Every block carries a `Span` of the lines it occupies in the file it was
//! scanned from. Warnings and procedures report these spans so callers can
//! point a reader at the offending source.

use serde::Serialize;

/// A range of lines in a source file.
///
/// Line numbers are 1-based and both ends are inclusive: a single-line
/// block has `start == end`.
///
/// # Example
///
/// ```rust
/// use procscan_core::span::Span;
///
/// let span = Span::new(3, 7);
/// assert_eq!(span.len(), 5);
/// assert!(span.contains(7));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Span {
    /// First line (inclusive).
    pub start: u32,
    /// Last line (inclusive).
    pub end: u32,
}

impl Span {
    /// Create a new span from line numbers.
    #[inline]
    pub const fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    /// A span covering exactly one line.
    #[inline]
    pub const fn line(line: u32) -> Self {
        Self {
            start: line,
            end: line,
        }
    }

    /// Number of lines covered.
    #[inline]
    pub const fn len(&self) -> u32 {
        if self.end < self.start {
            0
        } else {
            self.end - self.start + 1
        }
    }

    /// Check if this span covers no lines.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.end < self.start
    }

    /// Check if this span contains a line number.
    #[inline]
    pub const fn contains(&self, line: u32) -> bool {
        line >= self.start && line <= self.end
    }

    /// Merge two spans into one covering both.
    #[inline]
    pub fn merge(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

impl std::fmt::Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.start == self.end {
            write!(f, "line {}", self.start)
        } else {
            write!(f, "lines {}-{}", self.start, self.end)
        }
    }
}
