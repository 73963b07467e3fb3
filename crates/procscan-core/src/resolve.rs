//! Collaborators that turn include targets into text.
//!
//! The core never touches the file system. Callers hand it a
//! [`PathResolver`] that maps a target to candidate paths and a
//! [`FileReader`] that loads them.

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

use crate::error::ReadError;

/// Reads the raw text of a file.
pub trait FileReader {
    /// Return the file's text, [`ReadError::NotFound`] if it does not exist,
    /// or [`ReadError::Io`] for any other failure.
    fn read(&self, path: &Path) -> Result<String, ReadError>;
}

/// Maps an include target to the paths it may refer to.
pub trait PathResolver {
    /// Candidate paths for `target` as written in `current`, most specific first.
    fn resolve(&self, current: &Path, target: &str) -> Vec<PathBuf>;
}

/// Resolves `/`-rooted targets against a documentation source root and
/// everything else against the including file's directory.
///
/// Includes of `steps/<name>.rst` first try the generated
/// `steps-<name>.yaml` next to the `steps` directory. Extensionless targets
/// also try `<target>.rst`.
#[derive(Debug, Clone)]
pub struct SourceRootResolver {
    root: PathBuf,
}

impl SourceRootResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Use the nearest ancestor directory named `source`, falling back to
    /// the file's own directory.
    pub fn discover(file: &Path) -> Self {
        let root = file
            .ancestors()
            .skip(1)
            .find(|dir| dir.file_name().is_some_and(|name| name == "source"))
            .or_else(|| file.parent())
            .unwrap_or_else(|| Path::new(""));
        Self::new(root)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl PathResolver for SourceRootResolver {
    fn resolve(&self, current: &Path, target: &str) -> Vec<PathBuf> {
        let target = target.trim();
        let base = match target.strip_prefix('/') {
            Some(rooted) => self.root.join(rooted),
            None => current.parent().unwrap_or_else(|| Path::new("")).join(target),
        };
        let base = normalize(&base);

        let mut candidates = Vec::with_capacity(3);
        if let Some(yaml) = steps_yaml(&base) {
            candidates.push(yaml);
        }
        if base.extension().is_none() {
            candidates.push(base.with_extension("rst"));
        }
        candidates.push(base);
        candidates
    }
}

/// `.../steps/name.rst` becomes `.../steps-name.yaml`.
fn steps_yaml(path: &Path) -> Option<PathBuf> {
    let dir = path.parent()?;
    if dir.file_name()? != "steps" {
        return None;
    }
    if path.extension().is_some_and(|ext| ext != "rst") {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    Some(dir.parent()?.join(format!("steps-{}.yaml", stem)))
}

/// Fold `.` and `..` components without touching the file system.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// In-memory [`FileReader`] keyed by path.
#[derive(Debug, Clone, Default)]
pub struct MemoryFiles {
    files: BTreeMap<PathBuf, String>,
}

impl MemoryFiles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a file.
    pub fn insert(&mut self, path: impl Into<PathBuf>, text: impl Into<String>) {
        self.files.insert(path.into(), text.into());
    }

    /// Builder form of [`MemoryFiles::insert`].
    pub fn with(mut self, path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        self.insert(path, text);
        self
    }
}

impl FileReader for MemoryFiles {
    fn read(&self, path: &Path) -> Result<String, ReadError> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| ReadError::NotFound(path.to_path_buf()))
    }
}
