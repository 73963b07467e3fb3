use crate::span::Span;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Broad class of a recoverable problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Malformed markup. Parsing recovers locally and continues.
    Structural,
    /// An include reference that could not be expanded.
    Resolution,
}

/// Diagnostic kinds for categorizing recoverable problems.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiagnosticKind {
    /// Construct still open at end of input, such as an overlined title
    /// with no underline
    UnterminatedContainer,
    /// Body line indented inconsistently with its siblings
    MisalignedContent,
    /// List marker that skips or breaks the running sequence
    UnknownMarker,
    /// Directive missing an attribute it needs
    MissingAttribute,
    /// Block found outside the container it belongs in
    StrayBlock,
    /// Include target not found under any candidate path
    IncludeNotFound,
    /// Include chain refers back to a file already being expanded
    IncludeCycle,
    /// Include chain deeper than the configured limit
    IncludeDepthExceeded,
    /// YAML steps file that could not be decoded
    InvalidStepsFile,
}

impl DiagnosticKind {
    /// The category this kind belongs to.
    pub const fn category(self) -> Category {
        match self {
            DiagnosticKind::UnterminatedContainer
            | DiagnosticKind::MisalignedContent
            | DiagnosticKind::UnknownMarker
            | DiagnosticKind::MissingAttribute
            | DiagnosticKind::StrayBlock => Category::Structural,
            DiagnosticKind::IncludeNotFound
            | DiagnosticKind::IncludeCycle
            | DiagnosticKind::IncludeDepthExceeded
            | DiagnosticKind::InvalidStepsFile => Category::Resolution,
        }
    }
}

/// A recoverable problem with location information.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    /// Human-readable message
    pub message: String,
    /// Diagnostic categorization
    pub kind: DiagnosticKind,
    /// Lines the problem was found on
    pub span: Option<Span>,
    /// File the lines belong to, when known
    pub file: Option<PathBuf>,
}

impl Diagnostic {
    /// Create a new diagnostic.
    pub fn new(kind: DiagnosticKind, message: impl Into<String>, span: Option<Span>) -> Self {
        Self {
            message: message.into(),
            kind,
            span,
            file: None,
        }
    }

    /// A construct that reached end of input before it was closed.
    pub fn unterminated(container: &str, span: Span) -> Self {
        Self::new(
            DiagnosticKind::UnterminatedContainer,
            format!("unterminated {} at end of input", container),
            Some(span),
        )
    }

    /// A body line that does not line up with the rest of its container.
    pub fn misaligned(container: &str, span: Span) -> Self {
        Self::new(
            DiagnosticKind::MisalignedContent,
            format!("content of {} is not consistently indented", container),
            Some(span),
        )
    }

    /// A list marker inconsistent with the sequence it continues.
    pub fn unknown_marker(found: &str, expected: &str, span: Span) -> Self {
        Self::new(
            DiagnosticKind::UnknownMarker,
            format!("list marker '{}' does not follow '{}'", found, expected),
            Some(span),
        )
    }

    /// A directive lacking a required attribute.
    pub fn missing_attribute(directive: &str, attribute: &str, span: Span) -> Self {
        Self::new(
            DiagnosticKind::MissingAttribute,
            format!("{} has no :{}: attribute", directive, attribute),
            Some(span),
        )
    }

    /// A block outside the container that gives it meaning.
    pub fn stray(block: &str, expected: &str, span: Span) -> Self {
        Self::new(
            DiagnosticKind::StrayBlock,
            format!("{} found outside of {}", block, expected),
            Some(span),
        )
    }

    /// An include whose target could not be found.
    pub fn include_not_found(target: &str, span: Span) -> Self {
        Self::new(
            DiagnosticKind::IncludeNotFound,
            format!("include target not found: {}", target),
            Some(span),
        )
    }

    /// An include that refers back into its own chain.
    pub fn include_cycle(target: &str, span: Span) -> Self {
        Self::new(
            DiagnosticKind::IncludeCycle,
            format!("include cycle detected at {}", target),
            Some(span),
        )
    }

    /// An include nested past the depth limit.
    pub fn depth_exceeded(target: &str, limit: usize, span: Span) -> Self {
        Self::new(
            DiagnosticKind::IncludeDepthExceeded,
            format!("include depth limit of {} reached at {}", limit, target),
            Some(span),
        )
    }

    /// A YAML steps file that could not be decoded.
    pub fn invalid_steps_file(path: &Path, reason: impl fmt::Display) -> Self {
        Self::new(
            DiagnosticKind::InvalidStepsFile,
            format!("invalid steps file {}: {}", path.display(), reason),
            None,
        )
    }

    /// Attach the file the diagnostic was found in.
    pub fn in_file(mut self, file: Option<&Path>) -> Self {
        self.file = file.map(Path::to_path_buf);
        self
    }

    /// Category of this diagnostic.
    pub fn category(&self) -> Category {
        self.kind.category()
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(file) = &self.file {
            write!(f, "{}: ", file.display())?;
        }
        write!(f, "{}", self.message)?;
        if let Some(span) = self.span {
            write!(f, " at {}", span)?;
        }
        Ok(())
    }
}

/// A collection of diagnostics accumulated during a parse pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    /// Create an empty collection.
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Add a diagnostic to the collection.
    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.items.push(diagnostic);
    }

    /// Move every diagnostic of `other` into this collection.
    pub fn append(&mut self, other: Diagnostics) {
        self.items.extend(other.items);
    }

    /// Attach `file` to every diagnostic that does not name one yet.
    pub fn set_file(&mut self, file: &Path) {
        for diagnostic in &mut self.items {
            if diagnostic.file.is_none() {
                diagnostic.file = Some(file.to_path_buf());
            }
        }
    }

    /// Check if any diagnostics were collected.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Get the number of diagnostics.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Iterate over the diagnostics.
    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    /// Iterate over diagnostics of one category.
    pub fn of_category(&self, category: Category) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter().filter(move |d| d.category() == category)
    }

    /// Check if any diagnostic of the given kind was recorded.
    pub fn contains_kind(&self, kind: DiagnosticKind) -> bool {
        self.items.iter().any(|d| d.kind == kind)
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

/// Failure reported by a [`FileReader`](crate::resolve::FileReader).
#[derive(Debug, Error)]
pub enum ReadError {
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failures that abort a whole parse pass.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("include cycle: {}", format_chain(.chain))]
    IncludeCycle { chain: Vec<PathBuf> },
}

fn format_chain(chain: &[PathBuf]) -> String {
    chain
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}
