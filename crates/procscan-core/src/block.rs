//! Block arena produced by the scanner.
//!
//! Blocks reference each other by [`BlockId`] handles into one flat arena
//! rather than owning their children. Expanded includes are grafted into the
//! same arena, so a single tree covers a document and everything it pulls in.

use std::path::{Path, PathBuf};

use crate::span::Span;

/// Handle of a block inside a [`BlockTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockId(u32);

impl BlockId {
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Handle of a source file registered with a [`BlockTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct FileId(u32);

/// Marker in front of an ordered-list item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListMarker {
    /// `1.` or `1)`
    Numeric(u32),
    /// `a.` or `A)`
    Alpha(char),
    /// `#.` auto-numbered continuation
    Continuation,
}

impl ListMarker {
    /// Marker as written, without the delimiter.
    pub fn as_written(&self) -> String {
        match self {
            ListMarker::Numeric(n) => n.to_string(),
            ListMarker::Alpha(c) => c.to_string(),
            ListMarker::Continuation => "#".to_string(),
        }
    }
}

/// How far an include reference got.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncludeState {
    /// Not visited by the expander yet.
    Pending,
    /// Children hold the scanned content of `file`.
    Expanded(FileId),
    /// Could not be expanded; treated as opaque prose.
    Unresolved,
}

/// Block kinds recognized by the scanner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockKind {
    /// `.. procedure::`
    Procedure,
    /// `.. step:: <title>`
    Step { title: String },
    /// Ordered-list item with its first paragraph.
    ListItem { marker: ListMarker, text: String },
    /// Section heading.
    Heading {
        text: String,
        level: u8,
        numbered: bool,
    },
    /// `.. composable-tutorial::`
    Composable {
        options: Vec<String>,
        defaults: Vec<String>,
    },
    /// `.. selected-content::`
    ConditionalContent { selections: Vec<String> },
    /// `.. tabs::` and its flavored variants.
    TabGroup { directive: String },
    /// `.. tab::`
    Tab { id: String, title: String },
    /// `.. include:: <target>`
    Include { target: String, state: IncludeState },
    /// Anything else, dedented to the block's own indentation.
    Prose { text: String },
}

impl BlockKind {
    /// Short name used in diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            BlockKind::Procedure => "procedure",
            BlockKind::Step { .. } => "step",
            BlockKind::ListItem { .. } => "list item",
            BlockKind::Heading { .. } => "heading",
            BlockKind::Composable { .. } => "composable-tutorial",
            BlockKind::ConditionalContent { .. } => "selected-content",
            BlockKind::TabGroup { .. } => "tabs",
            BlockKind::Tab { .. } => "tab",
            BlockKind::Include { .. } => "include",
            BlockKind::Prose { .. } => "prose",
        }
    }
}

/// A single scanned block.
#[derive(Debug, Clone)]
pub struct Block {
    pub kind: BlockKind,
    /// Lines occupied in the file the block came from.
    pub span: Span,
    /// Indentation of the block's first line.
    pub indent: usize,
    /// File the block was scanned from.
    pub file: FileId,
    pub children: Vec<BlockId>,
}

/// Arena of blocks with an ordered list of top-level roots.
#[derive(Debug, Clone, Default)]
pub struct BlockTree {
    blocks: Vec<Block>,
    roots: Vec<BlockId>,
    files: Vec<PathBuf>,
}

impl BlockTree {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a block under `parent`, or as a root when `parent` is `None`.
    pub fn push(
        &mut self,
        parent: Option<BlockId>,
        kind: BlockKind,
        span: Span,
        indent: usize,
    ) -> BlockId {
        let id = BlockId(self.blocks.len() as u32);
        self.blocks.push(Block {
            kind,
            span,
            indent,
            file: FileId::default(),
            children: Vec::new(),
        });
        match parent {
            Some(parent) => self.blocks[parent.index()].children.push(id),
            None => self.roots.push(id),
        }
        id
    }

    /// Get a block by handle.
    #[inline]
    pub fn get(&self, id: BlockId) -> &Block {
        &self.blocks[id.index()]
    }

    /// Get a block mutably by handle.
    #[inline]
    pub fn get_mut(&mut self, id: BlockId) -> &mut Block {
        &mut self.blocks[id.index()]
    }

    /// Shorthand for the kind of a block.
    #[inline]
    pub fn kind(&self, id: BlockId) -> &BlockKind {
        &self.blocks[id.index()].kind
    }

    /// Top-level blocks in document order.
    pub fn roots(&self) -> &[BlockId] {
        &self.roots
    }

    /// Direct children of a block in document order.
    pub fn children(&self, id: BlockId) -> &[BlockId] {
        &self.blocks[id.index()].children
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// All block handles in creation order.
    pub fn ids(&self) -> impl Iterator<Item = BlockId> {
        (0..self.blocks.len() as u32).map(BlockId)
    }

    /// Register a source file and return its handle.
    pub fn add_file(&mut self, path: PathBuf) -> FileId {
        if let Some(pos) = self.files.iter().position(|p| *p == path) {
            return FileId(pos as u32);
        }
        self.files.push(path);
        FileId(self.files.len() as u32 - 1)
    }

    /// Path of a registered file.
    pub fn file_path(&self, file: FileId) -> Option<&Path> {
        self.files.get(file.0 as usize).map(PathBuf::as_path)
    }

    /// Path of the file a block came from.
    pub fn source_of(&self, id: BlockId) -> Option<&Path> {
        self.file_path(self.get(id).file)
    }

    /// Move the roots of `other` under `parent`, keeping their structure.
    ///
    /// Handles of `other` are not valid in `self` afterwards; the returned
    /// vector holds the new handles of its roots.
    pub fn graft(&mut self, parent: BlockId, other: BlockTree, file: FileId) -> Vec<BlockId> {
        let offset = self.blocks.len() as u32;
        let shift = |id: BlockId| BlockId(id.0 + offset);

        for mut block in other.blocks {
            for child in &mut block.children {
                *child = shift(*child);
            }
            block.file = file;
            self.blocks.push(block);
        }

        let roots: Vec<BlockId> = other.roots.into_iter().map(shift).collect();
        self.blocks[parent.index()].children.extend(roots.iter().copied());
        roots
    }

    /// Children of `id` with expanded includes replaced by their content.
    pub fn content_of(&self, id: BlockId) -> Vec<BlockId> {
        self.transparent(self.children(id))
    }

    /// Roots with expanded includes replaced by their content.
    pub fn root_content(&self) -> Vec<BlockId> {
        self.transparent(&self.roots)
    }

    /// Replace every expanded include in `ids` by its content, recursively.
    pub fn transparent(&self, ids: &[BlockId]) -> Vec<BlockId> {
        let mut out = Vec::with_capacity(ids.len());
        for &id in ids {
            match self.kind(id) {
                BlockKind::Include {
                    state: IncludeState::Expanded(_),
                    ..
                } => out.extend(self.transparent(self.children(id))),
                _ => out.push(id),
            }
        }
        out
    }

    /// Depth-first walk over `id` and everything below it.
    pub fn descendants(&self, id: BlockId) -> Vec<BlockId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.children(next).iter().rev().copied());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prose(text: &str) -> BlockKind {
        BlockKind::Prose {
            text: text.to_string(),
        }
    }

    #[test]
    fn test_graft_rebases_handles() {
        let mut tree = BlockTree::new();
        let include = tree.push(
            None,
            BlockKind::Include {
                target: "/a.rst".to_string(),
                state: IncludeState::Pending,
            },
            Span::line(1),
            0,
        );

        let mut other = BlockTree::new();
        let proc_id = other.push(None, BlockKind::Procedure, Span::new(1, 3), 0);
        other.push(Some(proc_id), prose("inner"), Span::line(3), 3);

        let file = tree.add_file(PathBuf::from("a.rst"));
        let roots = tree.graft(include, other, file);
        assert_eq!(roots.len(), 1);
        assert_eq!(tree.kind(roots[0]), &BlockKind::Procedure);
        assert_eq!(tree.children(roots[0]).len(), 1);
        assert_eq!(tree.source_of(roots[0]), Some(Path::new("a.rst")));
    }

    #[test]
    fn test_transparent_skips_expanded_includes() {
        let mut tree = BlockTree::new();
        let first = tree.push(None, prose("one"), Span::line(1), 0);
        let include = tree.push(
            None,
            BlockKind::Include {
                target: "x".to_string(),
                state: IncludeState::Expanded(FileId::default()),
            },
            Span::line(2),
            0,
        );
        let inner = tree.push(Some(include), prose("two"), Span::line(1), 0);
        assert_eq!(tree.root_content(), vec![first, inner]);
    }
}
