//! Line splitting for the block scanner.
//!
//! reStructuredText nests by indentation, so the scanner works on whole
//! lines that know their number and indent width. Newlines are located with
//! `memchr`; `\r\n` endings are accepted. Tabs count as four columns.

use memchr::memchr;

/// Columns a tab character advances.
pub const TAB_WIDTH: usize = 4;

/// One input line and its 1-based number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Line<'a> {
    /// Text without the line terminator.
    pub text: &'a str,
    pub number: u32,
}

impl<'a> Line<'a> {
    #[inline]
    pub fn is_blank(&self) -> bool {
        self.text.bytes().all(|b| b == b' ' || b == b'\t')
    }

    /// Width of the leading whitespace, with tabs expanded.
    #[inline]
    pub fn indent(&self) -> usize {
        indent_width(self.text)
    }

    #[inline]
    pub fn trimmed(&self) -> &'a str {
        self.text.trim()
    }

    /// The line after its indentation, trailing whitespace kept.
    #[inline]
    pub fn content(&self) -> &'a str {
        self.text.trim_start()
    }

    /// Drop `columns` of leading indentation, keeping anything deeper.
    ///
    /// Lines indented less than `columns` lose all of their indentation.
    pub fn dedent(&self, columns: usize) -> String {
        let mut width = 0;
        for (i, c) in self.text.char_indices() {
            if width >= columns {
                return self.text[i..].trim_end().to_string();
            }
            match c {
                ' ' => width += 1,
                '\t' => width += TAB_WIDTH,
                _ => return self.text[i..].trim_end().to_string(),
            }
        }
        String::new()
    }
}

/// Measure leading whitespace of `text` with tabs expanded.
#[inline]
pub fn indent_width(text: &str) -> usize {
    let mut width = 0;
    for b in text.bytes() {
        match b {
            b' ' => width += 1,
            b'\t' => width += TAB_WIDTH,
            _ => break,
        }
    }
    width
}

/// Iterator over the numbered lines of a document.
///
/// A trailing newline does not produce an extra empty line.
#[derive(Debug, Clone)]
pub struct Lexer<'a> {
    input: &'a str,
    pos: usize,
    number: u32,
}

impl<'a> Lexer<'a> {
    #[inline]
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            number: 0,
        }
    }

    /// Whether every line has been returned.
    #[inline]
    pub fn is_eof(&self) -> bool {
        self.pos >= self.input.len()
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Line<'a>;

    fn next(&mut self) -> Option<Line<'a>> {
        if self.is_eof() {
            return None;
        }
        let rest = &self.input.as_bytes()[self.pos..];
        let (len, advance) = match memchr(b'\n', rest) {
            Some(nl) => (nl, nl + 1),
            None => (rest.len(), rest.len()),
        };
        let len = if rest[..len].ends_with(b"\r") { len - 1 } else { len };

        // Both ends sit at the input bounds or next to an ASCII byte, so
        // slicing by byte offset cannot split a character.
        let text = &self.input[self.pos..self.pos + len];
        self.pos += advance;
        self.number += 1;
        Some(Line {
            text,
            number: self.number,
        })
    }
}
