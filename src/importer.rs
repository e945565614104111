//! Import path resolution and circular-import tracking

use crate::error::{CompileError, CompileErrorKind, Result};
use std::path::{Path, PathBuf};

/// Resolve a quoted import path to an absolute canonical file path.
///
/// A path that leads with a separator is rooted at `root`; anything else is
/// relative to the directory of the importing file. The file must exist
/// (canonicalization doubles as the existence check).
pub fn resolve_import(
    path: &str,
    root: &Path,
    importing_file: &Path,
    line: usize,
) -> Result<PathBuf> {
    let missing = || {
        CompileError::new(
            CompileErrorKind::MissingImportFile,
            importing_file.to_path_buf(),
            line,
        )
    };

    let candidate = if let Some(rooted) = path.strip_prefix(&['/', '\\'][..]) {
        root.join(rooted)
    } else {
        importing_file
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(path)
    };

    candidate.canonicalize().map_err(|_| missing())
}

/// The direct line of files leading to the one currently being lexed.
///
/// One hierarchy exists per import branch; sibling branches importing the
/// same file never see each other, so only direct-line cycles are rejected.
#[derive(Debug, Clone, Default)]
pub struct FileHierarchy {
    stack: Vec<PathBuf>,
}

impl FileHierarchy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter a file. Rejects a path already on the branch.
    pub fn push(&mut self, path: PathBuf, line: usize) -> Result<()> {
        if self.stack.contains(&path) {
            let importing = self.stack.last().cloned().unwrap_or_else(|| path.clone());
            return Err(CompileError::new(
                CompileErrorKind::CircularImport,
                importing,
                line,
            ));
        }
        self.stack.push(path);
        Ok(())
    }

    pub fn pop(&mut self) {
        self.stack.pop();
    }

    pub fn current(&self) -> Option<&Path> {
        self.stack.last().map(PathBuf::as_path)
    }
}
