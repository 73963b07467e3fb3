//! # procscan core
//!
//! Finds procedures in reStructuredText documentation and classifies them.
//!
//! A procedure can be written as a `procedure` directive with `step`
//! children, a top-level ordered list, numbered headings under a
//! "Procedure" heading, or a generated `steps-*.yaml` file. All of them
//! end up as the same [`Procedure`] model with sub-procedures, variations
//! and a content hash, ready to be grouped for analysis or extraction.
//!
//! ## Quick Start
//!
//! ```rust
//! use procscan_core::parse_str;
//!
//! let input = "\
//! Install
//! =======
//!
//! .. procedure::
//!
//!    .. step:: Download the archive
//!
//!       Fetch the latest release.
//!
//!    .. step:: Unpack it
//!
//!       a. Open a terminal
//!       #. Run ``tar -xzf``
//! ";
//!
//! let outcome = parse_str(input);
//! let analysis = outcome.procedures.analysis();
//! assert_eq!(analysis.entries[0].heading, "Install");
//! assert!(outcome.procedures.procedures()[0].has_sub_steps);
//! ```
//!
//! ## Includes
//!
//! Include directives are resolved through a [`PathResolver`] and read
//! through a [`FileReader`], so the core never touches the file system:
//!
//! ```rust
//! use std::path::Path;
//! use procscan_core::{MemoryFiles, ParseOptions, ProcedureParser, SourceRootResolver};
//!
//! let files = MemoryFiles::new().with(
//!     "/docs/source/includes/steps.rst",
//!     ".. procedure::\n\n   .. step:: Shared step\n\n      Text.\n",
//! );
//! let resolver = SourceRootResolver::new("/docs/source");
//! let parser = ProcedureParser::new(ParseOptions::default());
//!
//! let outcome = parser
//!     .parse(
//!         Path::new("/docs/source/page.txt"),
//!         ".. include:: /includes/steps.rst\n",
//!         &resolver,
//!         &files,
//!     )
//!     .unwrap();
//! assert_eq!(outcome.procedures.len(), 1);
//! ```

pub mod block;
pub mod error;
pub mod expander;
pub mod grouping;
pub mod hasher;
pub mod lexer;
pub mod model;
pub mod parser;
pub mod render;
pub mod resolve;
pub mod scanner;
pub mod span;
pub mod text;
pub mod tracker;
pub mod variation;
pub mod yaml_steps;

pub use error::{Category, Diagnostic, DiagnosticKind, Diagnostics, ParseError, ReadError};
pub use expander::ExpansionPolicy;
pub use grouping::{AnalysisEntry, AnalysisView, ExtractionUnit, ExtractionView, ProcedureSet};
pub use model::{
    IdentityHash, MarkerType, Procedure, ProcedureFormat, ProcedureId, Step, SubProcedure, SubStep,
    TabSet, TabSetId, Variation,
};
pub use parser::{parse_str, ParseOptions, ParseOutcome, ProcedureParser};
pub use render::render_procedure;
pub use resolve::{FileReader, MemoryFiles, PathResolver, SourceRootResolver};
pub use span::Span;
