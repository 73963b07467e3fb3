//! Document parser.
//!
//! Runs the stages in order: block scanning, include expansion, procedure
//! assembly. Structural and resolution problems are collected as
//! [`Diagnostics`] and never stop the pass; only unreadable files and, when
//! requested, include cycles are fatal.

use std::path::Path;

use crate::error::{Diagnostics, ParseError};
use crate::expander::{ExpansionPolicy, IncludeExpander, DEFAULT_MAX_DEPTH};
use crate::grouping::{Assembler, ProcedureSet};
use crate::resolve::{FileReader, PathResolver};
use crate::scanner::Scanner;

/// Parser configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseOptions {
    /// Expand `include` directives. When off they stay opaque.
    pub expand_includes: bool,
    pub max_include_depth: usize,
    /// Abort the parse on an include cycle.
    pub fail_on_cycle: bool,
    /// Headings that never name a procedure, compared case-insensitively.
    pub generic_headings: Vec<String>,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            expand_includes: true,
            max_include_depth: DEFAULT_MAX_DEPTH,
            fail_on_cycle: false,
            generic_headings: vec!["overview".to_string()],
        }
    }
}

impl ParseOptions {
    pub fn with_includes(mut self, expand: bool) -> Self {
        self.expand_includes = expand;
        self
    }

    pub fn with_max_include_depth(mut self, depth: usize) -> Self {
        self.max_include_depth = depth;
        self
    }

    pub fn with_fail_on_cycle(mut self, fail: bool) -> Self {
        self.fail_on_cycle = fail;
        self
    }

    pub fn with_generic_headings<I, S>(mut self, headings: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.generic_headings = headings.into_iter().map(Into::into).collect();
        self
    }
}

/// Result of parsing one document.
#[derive(Debug, Clone)]
pub struct ParseOutcome {
    pub procedures: ProcedureSet,
    /// Everything recoverable that went wrong, in the order it was found.
    pub diagnostics: Diagnostics,
    /// Include policy in effect; `None` when includes were not expanded.
    pub policy: Option<ExpansionPolicy>,
    /// A speculative pass was promoted to conditional scoping.
    pub promoted: bool,
}

impl ParseOutcome {
    /// Check if parsing completed without diagnostics.
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

/// Procedure parser with configurable include handling.
#[derive(Debug, Clone, Default)]
pub struct ProcedureParser {
    options: ParseOptions,
}

impl ProcedureParser {
    /// Create a new parser with the given options.
    #[inline]
    pub fn new(options: ParseOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ParseOptions {
        &self.options
    }

    /// Parse `text`, read from `path`, expanding includes through
    /// `resolver` and `reader`.
    pub fn parse(
        &self,
        path: &Path,
        text: &str,
        resolver: &dyn PathResolver,
        reader: &dyn FileReader,
    ) -> Result<ParseOutcome, ParseError> {
        let mut scanned = Scanner::new().scan(text);
        let mut diagnostics = scanned.diagnostics;
        diagnostics.set_file(path);

        let mut policy = None;
        let mut promoted = false;
        if self.options.expand_includes {
            let report = IncludeExpander::new(resolver, reader)
                .with_max_depth(self.options.max_include_depth)
                .with_fatal_cycles(self.options.fail_on_cycle)
                .expand(&mut scanned.tree, path)?;
            policy = Some(report.policy);
            promoted = report.promoted;
            diagnostics.append(report.diagnostics);
        } else {
            scanned.tree.add_file(path.to_path_buf());
        }

        let (procedures, assembly) = Assembler::new(&scanned.tree, &self.options.generic_headings).run();
        diagnostics.append(assembly);

        Ok(ParseOutcome {
            procedures,
            diagnostics,
            policy,
            promoted,
        })
    }

    /// Parse `text` on its own, leaving includes unexpanded.
    pub fn parse_text(&self, text: &str) -> ParseOutcome {
        let scanned = Scanner::new().scan(text);
        let mut diagnostics = scanned.diagnostics;
        let (procedures, assembly) = Assembler::new(&scanned.tree, &self.options.generic_headings).run();
        diagnostics.append(assembly);

        ParseOutcome {
            procedures,
            diagnostics,
            policy: None,
            promoted: false,
        }
    }
}

/// Parse `text` with default options and no include expansion.
pub fn parse_str(text: &str) -> ParseOutcome {
    ProcedureParser::default().parse_text(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = ParseOptions::default();
        assert!(options.expand_includes);
        assert_eq!(options.max_include_depth, 10);
        assert!(!options.fail_on_cycle);
        assert_eq!(options.generic_headings, vec!["overview".to_string()]);
    }

    #[test]
    fn test_parse_text_leaves_includes_alone() {
        let outcome = parse_str("Setup\n=====\n\n.. include:: /shared.rst\n");
        assert!(outcome.procedures.is_empty());
        assert!(outcome.is_clean());
        assert!(outcome.policy.is_none());
    }
}
