//! Block scanner for the reStructuredText subset procedures are written in.
//!
//! Nesting follows indentation: a directive owns every following line that
//! is blank or indented deeper than its header. The scanner never fails.
//! Malformed containers are closed where their indentation ends and
//! reported through [`Diagnostics`].

use once_cell::sync::Lazy;
use regex::Regex;

use crate::block::{BlockId, BlockKind, BlockTree, IncludeState, ListMarker};
use crate::error::{Diagnostic, Diagnostics};
use crate::lexer::{Lexer, Line};
use crate::span::Span;
use crate::text::{slugify, split_list};

static DIRECTIVE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\.\.\s+([^\s:]+(?::[^\s:]+)*)::(?:\s+(.*))?$").expect("valid directive regex")
});

static OPTION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^:([^:]+):\s*(.*)$").expect("valid option regex"));

static LIST_ITEM_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d+|[A-Za-z]|#)[.)](?:\s+(.*))?$").expect("valid list item regex")
});

static NUMBERED_HEADING_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+\.\s*\S").expect("valid numbered heading regex"));

/// Characters that may form a section underline.
const ADORNMENT_CHARS: &str = "=-~`^\"'+*#";

/// Output of a scan: the block tree plus structural warnings.
#[derive(Debug)]
pub struct ScanResult {
    pub tree: BlockTree,
    pub diagnostics: Diagnostics,
}

/// Indentation-driven block scanner.
///
/// Heading levels are assigned in the order adornment styles first appear,
/// as reStructuredText does.
#[derive(Debug, Default)]
pub struct Scanner {
    tree: BlockTree,
    diagnostics: Diagnostics,
    adornments: Vec<(char, bool)>,
}

impl Scanner {
    /// Create a new scanner.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Scan `input` into a block tree.
    pub fn scan(&mut self, input: &str) -> ScanResult {
        self.tree = BlockTree::new();
        self.diagnostics = Diagnostics::new();
        self.adornments.clear();

        let lines: Vec<Line<'_>> = Lexer::new(input).collect();
        self.scan_range(&lines, 0, lines.len(), None);

        ScanResult {
            tree: std::mem::take(&mut self.tree),
            diagnostics: std::mem::take(&mut self.diagnostics),
        }
    }

    fn scan_range(&mut self, lines: &[Line<'_>], start: usize, end: usize, parent: Option<BlockId>) {
        let mut i = start;
        while i < end {
            if lines[i].is_blank() {
                i += 1;
                continue;
            }

            let content = lines[i].content();
            i = if let Some(next) = self.scan_heading(lines, i, end, parent) {
                next
            } else if content.starts_with("..") {
                self.scan_explicit(lines, i, end, parent)
            } else if LIST_ITEM_RE.is_match(content) {
                self.scan_list_item(lines, i, end, parent)
            } else {
                self.scan_paragraph(lines, i, end, parent)
            };
        }
    }

    /// Recognize an underlined or over-and-underlined section title at `i`.
    fn scan_heading(
        &mut self,
        lines: &[Line<'_>],
        i: usize,
        end: usize,
        parent: Option<BlockId>,
    ) -> Option<usize> {
        let line = lines[i];
        let content = line.trimmed();

        let (text, style, consumed) = if let Some(over) = adornment(content) {
            if i + 2 == lines.len() && !lines[i + 1].is_blank() && adornment(lines[i + 1].trimmed()).is_none() {
                self.diagnostics.push(Diagnostic::unterminated(
                    "section title",
                    Span::new(line.number, lines[i + 1].number),
                ));
                return None;
            }
            let title = lines.get(i + 1).filter(|_| i + 2 < end)?;
            let under = adornment(lines[i + 2].trimmed())?;
            let text = title.trimmed();
            if title.is_blank() || under != over || content.chars().count() < text.chars().count() {
                return None;
            }
            (text, (over, true), 3)
        } else {
            if i + 1 >= end || content.starts_with("..") {
                return None;
            }
            let next = lines[i + 1];
            let under = adornment(next.trimmed())?;
            if next.indent() != line.indent()
                || next.trimmed().chars().count() < content.chars().count()
            {
                return None;
            }
            (content, (under, false), 2)
        };

        let level = match self.adornments.iter().position(|s| *s == style) {
            Some(pos) => pos + 1,
            None => {
                self.adornments.push(style);
                self.adornments.len()
            }
        };

        let last = lines[i + consumed - 1].number;
        self.tree.push(
            parent,
            BlockKind::Heading {
                text: text.to_string(),
                level: level.min(u8::MAX as usize) as u8,
                numbered: NUMBERED_HEADING_RE.is_match(text),
            },
            Span::new(line.number, last),
            line.indent(),
        );
        Some(i + consumed)
    }

    /// Directives, comments and hyperlink targets all start with `..`.
    fn scan_explicit(&mut self, lines: &[Line<'_>], i: usize, end: usize, parent: Option<BlockId>) -> usize {
        let header = lines[i];
        let indent = header.indent();

        let Some(caps) = DIRECTIVE_RE.captures(header.content()) else {
            let body_end = block_end(lines, i + 1, end, indent);
            self.push_prose(lines, i, body_end, parent);
            return body_end;
        };
        let name = caps.get(1).map_or("", |m| m.as_str());
        let argument = caps.get(2).map_or("", |m| m.as_str().trim());

        let mut j = i + 1;
        let mut options: Vec<(String, String)> = Vec::new();
        while j < end && !lines[j].is_blank() && lines[j].indent() > indent {
            let Some(opt) = OPTION_RE.captures(lines[j].content()) else {
                break;
            };
            options.push((opt[1].trim().to_string(), opt[2].trim().to_string()));
            j += 1;
        }
        let option = |key: &str| {
            options
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str())
        };

        let body_end = block_end(lines, j, end, indent).max(j);
        let span = Span::new(header.number, lines[body_end - 1].number);

        let kind = match name {
            "procedure" => BlockKind::Procedure,
            "step" => BlockKind::Step {
                title: argument.to_string(),
            },
            "composable-tutorial" => {
                if option("options").is_none() {
                    self.diagnostics
                        .push(Diagnostic::missing_attribute(name, "options", span));
                }
                BlockKind::Composable {
                    options: option("options").map(split_list).unwrap_or_default(),
                    defaults: option("defaults").map(split_list).unwrap_or_default(),
                }
            }
            "selected-content" => {
                if option("selections").is_none() {
                    self.diagnostics
                        .push(Diagnostic::missing_attribute(name, "selections", span));
                }
                BlockKind::ConditionalContent {
                    selections: option("selections").map(split_list).unwrap_or_default(),
                }
            }
            "tabs" => BlockKind::TabGroup {
                directive: name.to_string(),
            },
            _ if name.starts_with("tabs-") => BlockKind::TabGroup {
                directive: name.to_string(),
            },
            "tab" => {
                let id = match option("tabid") {
                    Some(id) if !id.is_empty() => id.to_string(),
                    _ => {
                        self.diagnostics
                            .push(Diagnostic::missing_attribute(name, "tabid", span));
                        let slug = slugify(argument);
                        if slug.is_empty() {
                            "untitled".to_string()
                        } else {
                            slug
                        }
                    }
                };
                BlockKind::Tab {
                    id,
                    title: argument.to_string(),
                }
            }
            "include" if !argument.is_empty() => {
                self.tree.push(
                    parent,
                    BlockKind::Include {
                        target: argument.to_string(),
                        state: IncludeState::Pending,
                    },
                    span,
                    indent,
                );
                return body_end;
            }
            _ => {
                self.push_prose(lines, i, body_end, parent);
                return body_end;
            }
        };

        let id = self.tree.push(parent, kind, span, indent);
        self.check_body(lines, id, j, body_end);
        self.scan_range(lines, j, body_end, Some(id));
        body_end
    }

    /// Report body lines indented less than the first one.
    ///
    /// An empty body is not a problem: the container simply holds nothing.
    fn check_body(&mut self, lines: &[Line<'_>], id: BlockId, start: usize, end: usize) {
        let name = self.tree.kind(id).name();

        let mut body = lines[start..end].iter().filter(|l| !l.is_blank());
        let Some(first) = body.next() else {
            return;
        };

        let body_indent = first.indent();
        if let Some(stray) = body.find(|l| l.indent() < body_indent) {
            self.diagnostics
                .push(Diagnostic::misaligned(name, Span::line(stray.number)));
        }
    }

    fn scan_list_item(&mut self, lines: &[Line<'_>], i: usize, end: usize, parent: Option<BlockId>) -> usize {
        let line = lines[i];
        let indent = line.indent();
        let Some(caps) = LIST_ITEM_RE.captures(line.content()) else {
            return self.scan_paragraph(lines, i, end, parent);
        };

        let marker = match &caps[1] {
            "#" => ListMarker::Continuation,
            m => match m.parse::<u32>() {
                Ok(n) => ListMarker::Numeric(n),
                Err(_) => match m.chars().next() {
                    Some(c) if m.len() == 1 && c.is_ascii_alphabetic() => ListMarker::Alpha(c),
                    _ => return self.scan_paragraph(lines, i, end, parent),
                },
            },
        };

        let body_end = block_end(lines, i + 1, end, indent);
        let mut text = caps.get(2).map_or("", |m| m.as_str().trim()).to_string();
        let mut j = i + 1;
        while j < body_end && !lines[j].is_blank() && !starts_construct(lines[j].content()) {
            if !text.is_empty() {
                text.push(' ');
            }
            text.push_str(lines[j].trimmed());
            j += 1;
        }

        let last = lines[body_end.max(i + 1) - 1].number;
        let id = self.tree.push(
            parent,
            BlockKind::ListItem { marker, text },
            Span::new(line.number, last),
            indent,
        );
        self.scan_range(lines, j, body_end, Some(id));
        body_end.max(i + 1)
    }

    fn scan_paragraph(&mut self, lines: &[Line<'_>], i: usize, end: usize, parent: Option<BlockId>) -> usize {
        let indent = lines[i].indent();
        let mut j = i + 1;
        while j < end {
            let line = lines[j];
            if line.is_blank()
                || line.indent() < indent
                || starts_construct(line.content())
                || starts_heading(lines, j, end)
            {
                break;
            }
            j += 1;
        }

        // `::` introduces a literal block that must stay opaque.
        if lines[j - 1].trimmed().ends_with("::") {
            j = block_end(lines, j, end, indent).max(j);
        }

        self.push_prose(lines, i, j, parent);
        j
    }

    fn push_prose(&mut self, lines: &[Line<'_>], start: usize, end: usize, parent: Option<BlockId>) {
        let indent = lines[start].indent();
        let text = lines[start..end]
            .iter()
            .map(|l| l.dedent(indent))
            .collect::<Vec<_>>()
            .join("\n");
        self.tree.push(
            parent,
            BlockKind::Prose {
                text: text.trim_end().to_string(),
            },
            Span::new(lines[start].number, lines[end - 1].number),
            indent,
        );
    }
}

/// Scan `input` with a fresh [`Scanner`].
pub fn scan(input: &str) -> ScanResult {
    Scanner::new().scan(input)
}

/// End (exclusive) of the body that follows a header at `indent`.
///
/// Trailing blank lines are not part of the body.
fn block_end(lines: &[Line<'_>], from: usize, end: usize, indent: usize) -> usize {
    let mut last = from;
    let mut j = from;
    while j < end {
        let line = lines[j];
        if !line.is_blank() {
            if line.indent() <= indent {
                break;
            }
            last = j + 1;
        }
        j += 1;
    }
    last
}

fn starts_construct(content: &str) -> bool {
    content.starts_with("..") || LIST_ITEM_RE.is_match(content)
}

fn starts_heading(lines: &[Line<'_>], i: usize, end: usize) -> bool {
    if i + 1 >= end || adornment(lines[i].trimmed()).is_some() {
        return false;
    }
    let next = lines[i + 1];
    adornment(next.trimmed()).is_some()
        && next.indent() == lines[i].indent()
        && next.trimmed().chars().count() >= lines[i].trimmed().chars().count()
}

/// The repeated character of an adornment line, if `text` is one.
fn adornment(text: &str) -> Option<char> {
    let first = text.chars().next()?;
    if !ADORNMENT_CHARS.contains(first) || text.len() < 2 {
        return None;
    }
    text.chars().all(|c| c == first).then_some(first)
}
