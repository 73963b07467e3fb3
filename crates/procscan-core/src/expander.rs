//! Include expansion.
//!
//! Included files are scanned on their own and grafted under the include
//! block that referenced them, so container boundaries of the including
//! document are never merged or reordered. Later stages look through
//! expanded includes with [`BlockTree::transparent`].
//!
//! The policy is chosen by looking at the document before anything is
//! expanded:
//!
//! - `selected-content` blocks in the document itself:
//!   [`ExpansionPolicy::ConditionalScoped`]
//! - no `selected-content` and no `composable-tutorial` wrapper:
//!   [`ExpansionPolicy::Unconditional`]
//! - a wrapper without any `selected-content` of its own:
//!   [`ExpansionPolicy::Speculative`]. Includes inside steps are expanded
//!   first and then inspected; if they brought conditional content in, the
//!   pass continues as `ConditionalScoped`.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::block::{BlockId, BlockKind, BlockTree, IncludeState};
use crate::error::{Diagnostic, Diagnostics, ParseError, ReadError};
use crate::resolve::{FileReader, PathResolver};
use crate::scanner::Scanner;
use crate::yaml_steps;

/// Default limit on nested includes.
pub const DEFAULT_MAX_DEPTH: usize = 10;

/// How includes are treated for one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExpansionPolicy {
    /// No composable wrapper: every include is expanded.
    Unconditional,
    /// Conditional blocks are present; includes inside them stay inside them.
    ConditionalScoped,
    /// Includes in steps may hide conditional blocks and are inspected.
    Speculative,
}

impl ExpansionPolicy {
    /// Pick a policy from the structure of an unexpanded document.
    pub fn select(tree: &BlockTree) -> Self {
        let mut wrapper = false;
        let mut conditional = false;
        for id in tree.ids() {
            match tree.kind(id) {
                BlockKind::Composable { .. } => wrapper = true,
                BlockKind::ConditionalContent { .. } => conditional = true,
                _ => {}
            }
        }
        match (conditional, wrapper) {
            (true, _) => ExpansionPolicy::ConditionalScoped,
            (false, false) => ExpansionPolicy::Unconditional,
            (false, true) => ExpansionPolicy::Speculative,
        }
    }
}

/// Summary of one expansion pass.
#[derive(Debug, Clone)]
pub struct ExpansionReport {
    /// Policy in effect when the pass finished.
    pub policy: ExpansionPolicy,
    /// Whether a speculative pass found conditional content behind an include.
    pub promoted: bool,
    /// Includes replaced by file content.
    pub expanded: usize,
    /// Includes left as opaque prose.
    pub unresolved: usize,
    pub diagnostics: Diagnostics,
}

/// Expands include blocks in place.
pub struct IncludeExpander<'a> {
    resolver: &'a dyn PathResolver,
    reader: &'a dyn FileReader,
    max_depth: usize,
    cycles_are_fatal: bool,
}

impl<'a> IncludeExpander<'a> {
    pub fn new(resolver: &'a dyn PathResolver, reader: &'a dyn FileReader) -> Self {
        Self {
            resolver,
            reader,
            max_depth: DEFAULT_MAX_DEPTH,
            cycles_are_fatal: false,
        }
    }

    /// Set the maximum include nesting depth.
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Fail the whole pass on an include cycle instead of dropping that chain.
    pub fn with_fatal_cycles(mut self, fatal: bool) -> Self {
        self.cycles_are_fatal = fatal;
        self
    }

    /// Expand every include in `tree`, which was scanned from `path`.
    pub fn expand(&self, tree: &mut BlockTree, path: &Path) -> Result<ExpansionReport, ParseError> {
        // Blocks default to the first registered file.
        tree.add_file(path.to_path_buf());

        let mut pass = Pass {
            policy: ExpansionPolicy::select(tree),
            promoted: false,
            expanded: 0,
            unresolved: 0,
            diagnostics: Diagnostics::new(),
            chain: vec![path.to_path_buf()],
        };

        let roots = tree.roots().to_vec();
        self.walk(tree, &roots, false, &mut pass)?;

        Ok(ExpansionReport {
            policy: pass.policy,
            promoted: pass.promoted,
            expanded: pass.expanded,
            unresolved: pass.unresolved,
            diagnostics: pass.diagnostics,
        })
    }

    fn walk(
        &self,
        tree: &mut BlockTree,
        ids: &[BlockId],
        in_step: bool,
        pass: &mut Pass,
    ) -> Result<(), ParseError> {
        for &id in ids {
            match tree.kind(id) {
                BlockKind::Include {
                    state: IncludeState::Pending,
                    ..
                } => self.expand_one(tree, id, in_step, pass)?,
                BlockKind::Include { .. } => {}
                kind => {
                    let in_step = in_step || matches!(kind, BlockKind::Step { .. });
                    let children = tree.children(id).to_vec();
                    self.walk(tree, &children, in_step, pass)?;
                }
            }
        }
        Ok(())
    }

    fn expand_one(
        &self,
        tree: &mut BlockTree,
        id: BlockId,
        in_step: bool,
        pass: &mut Pass,
    ) -> Result<(), ParseError> {
        let BlockKind::Include { target, .. } = tree.kind(id).clone() else {
            return Ok(());
        };
        let span = tree.get(id).span;
        let current = pass.chain.last().cloned().unwrap_or_default();

        if pass.chain.len() > self.max_depth {
            pass.reject(tree, id, Diagnostic::depth_exceeded(&target, self.max_depth, span), &current);
            return Ok(());
        }

        let mut found = None;
        for candidate in self.resolver.resolve(&current, &target) {
            if pass.chain.contains(&candidate) {
                if self.cycles_are_fatal {
                    let mut chain = pass.chain.clone();
                    chain.push(candidate);
                    return Err(ParseError::IncludeCycle { chain });
                }
                pass.reject(tree, id, Diagnostic::include_cycle(&target, span), &current);
                return Ok(());
            }
            match self.reader.read(&candidate) {
                Ok(text) => {
                    found = Some((candidate, text));
                    break;
                }
                Err(ReadError::NotFound(_)) => continue,
                Err(ReadError::Io { path, source }) => {
                    return Err(ParseError::Read { path, source });
                }
            }
        }

        let Some((path, mut text)) = found else {
            pass.reject(tree, id, Diagnostic::include_not_found(&target, span), &current);
            return Ok(());
        };

        if yaml_steps::is_steps_file(&path) {
            match yaml_steps::to_rst(&text) {
                Ok(rst) => text = rst,
                Err(err) => {
                    pass.reject(tree, id, Diagnostic::invalid_steps_file(&path, err), &current);
                    return Ok(());
                }
            }
        }

        let mut scanned = Scanner::new().scan(&text);
        scanned.diagnostics.set_file(&path);
        pass.diagnostics.append(scanned.diagnostics);

        let file = tree.add_file(path.clone());
        let roots = tree.graft(id, scanned.tree, file);
        if let BlockKind::Include { state, .. } = &mut tree.get_mut(id).kind {
            *state = IncludeState::Expanded(file);
        }
        pass.expanded += 1;

        pass.chain.push(path);
        let result = self.walk(tree, &roots, in_step, pass);
        pass.chain.pop();
        result?;

        if in_step && pass.policy == ExpansionPolicy::Speculative && reveals_conditional(tree, &roots) {
            pass.policy = ExpansionPolicy::ConditionalScoped;
            pass.promoted = true;
        }
        Ok(())
    }
}

/// Mutable state threaded through one expansion pass.
struct Pass {
    policy: ExpansionPolicy,
    promoted: bool,
    expanded: usize,
    unresolved: usize,
    diagnostics: Diagnostics,
    /// Files currently being expanded, outermost first.
    chain: Vec<PathBuf>,
}

impl Pass {
    fn reject(&mut self, tree: &mut BlockTree, id: BlockId, diagnostic: Diagnostic, current: &Path) {
        if let BlockKind::Include { state, .. } = &mut tree.get_mut(id).kind {
            *state = IncludeState::Unresolved;
        }
        self.unresolved += 1;
        self.diagnostics.push(diagnostic.in_file(Some(current)));
    }
}

fn reveals_conditional(tree: &BlockTree, roots: &[BlockId]) -> bool {
    roots.iter().any(|&root| {
        tree.descendants(root)
            .into_iter()
            .any(|id| matches!(tree.kind(id), BlockKind::ConditionalContent { .. }))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::{MemoryFiles, SourceRootResolver};
    use crate::scanner::scan;

    #[test]
    fn test_policy_selection() {
        let plain = scan(".. procedure::\n\n   .. step:: One\n\n      Text.\n").tree;
        assert_eq!(ExpansionPolicy::select(&plain), ExpansionPolicy::Unconditional);

        let scoped = scan(
            ".. composable-tutorial::\n   :options: driver\n\n   .. selected-content::\n      :selections: nodejs\n\n      Text.\n",
        )
        .tree;
        assert_eq!(ExpansionPolicy::select(&scoped), ExpansionPolicy::ConditionalScoped);

        let unwrapped = scan(".. selected-content::\n   :selections: nodejs\n\n   Text.\n").tree;
        assert_eq!(ExpansionPolicy::select(&unwrapped), ExpansionPolicy::ConditionalScoped);

        let speculative = scan(".. composable-tutorial::\n   :options: driver\n\n   Text.\n").tree;
        assert_eq!(ExpansionPolicy::select(&speculative), ExpansionPolicy::Speculative);
    }

    #[test]
    fn test_expanded_include_is_not_revisited() {
        let files = MemoryFiles::new().with("/src/a.rst", "Shared text.\n");
        let resolver = SourceRootResolver::new("/src");
        let mut tree = scan(".. include:: /a.rst\n").tree;

        let expander = IncludeExpander::new(&resolver, &files);
        let first = expander.expand(&mut tree, Path::new("/src/page.txt")).expect("expands");
        assert_eq!(first.expanded, 1);

        let again = expander.expand(&mut tree, Path::new("/src/page.txt")).expect("expands");
        assert_eq!(again.expanded, 0);
    }
}
