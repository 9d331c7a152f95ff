//! core::paths
//!
//! Centralized path routing for checkouts and their sibling files.
//!
//! # Architecture
//!
//! Every checkout lives beneath the workspace root. Besides the checkout
//! directory itself, reposync owns exactly two sibling files per checkout,
//! placed next to it in the same parent directory:
//!
//! - `.<dir>.lock` - Advisory lock file (see [`crate::core::ops::lock`])
//! - `.<dir>.sync.json` - In-progress marker (see [`crate::core::ops::marker`])
//!
//! Keeping them outside the checkout means that removing a corrupted
//! checkout never removes the lock that protects it, and that a fresh clone
//! never sees reposync's own files in its working tree.
//!
//! **Hard rule:** no code outside this module computes lock or marker paths.
//!
//! # Example
//!
//! ```
//! use reposync::core::paths::{CheckoutPaths, WorkspacePaths};
//! use std::path::{Path, PathBuf};
//!
//! let workspace = WorkspacePaths::new("/workspace");
//! let checkout = workspace.resolve(Path::new("assisted-service")).unwrap();
//! let paths = CheckoutPaths::new(checkout);
//!
//! assert_eq!(paths.checkout(), Path::new("/workspace/assisted-service"));
//! assert_eq!(paths.lock_path(), PathBuf::from("/workspace/.assisted-service.lock"));
//! assert_eq!(paths.marker_path(), PathBuf::from("/workspace/.assisted-service.sync.json"));
//! ```

use std::path::{Component, Path, PathBuf};

use thiserror::Error;

/// Errors from resolving a checkout path beneath the workspace root.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PathError {
    #[error("checkout path '{0}' must be relative to the workspace root")]
    Absolute(PathBuf),

    #[error("checkout path '{0}' must not contain '..' or '.' components")]
    Escapes(PathBuf),

    #[error("checkout path cannot be empty")]
    Empty,
}

/// The workspace root under which all checkouts are stored.
///
/// This is normally a mounted persistent volume supplied by the hosting
/// environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspacePaths {
    root: PathBuf,
}

impl WorkspacePaths {
    /// Create workspace paths for a root directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The workspace root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a relative checkout path against the root.
    ///
    /// Only plain relative components are accepted, so the result is always
    /// strictly beneath the root.
    ///
    /// # Errors
    ///
    /// - [`PathError::Absolute`] for absolute paths or paths with a prefix
    /// - [`PathError::Escapes`] for `..` or `.` components
    /// - [`PathError::Empty`] if no components remain
    pub fn resolve(&self, relative: &Path) -> Result<PathBuf, PathError> {
        let mut resolved = self.root.clone();
        let mut depth = 0usize;

        for component in relative.components() {
            match component {
                Component::Normal(part) => {
                    resolved.push(part);
                    depth += 1;
                }
                Component::RootDir | Component::Prefix(_) => {
                    return Err(PathError::Absolute(relative.to_path_buf()))
                }
                Component::ParentDir | Component::CurDir => {
                    return Err(PathError::Escapes(relative.to_path_buf()))
                }
            }
        }

        if depth == 0 {
            return Err(PathError::Empty);
        }
        Ok(resolved)
    }
}

/// Paths owned by a single checkout.
///
/// # Invariants
///
/// - The lock and marker are siblings of the checkout directory
/// - Both sibling names are derived from the checkout's final component
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutPaths {
    checkout: PathBuf,
}

impl CheckoutPaths {
    /// Create paths for a checkout directory.
    pub fn new(checkout: impl Into<PathBuf>) -> Self {
        Self {
            checkout: checkout.into(),
        }
    }

    /// The checkout (working copy) directory.
    pub fn checkout(&self) -> &Path {
        &self.checkout
    }

    /// The directory containing the checkout and its sibling files.
    pub fn parent(&self) -> &Path {
        self.checkout.parent().unwrap_or_else(|| Path::new("."))
    }

    /// The advisory lock file, `.<dir>.lock`.
    pub fn lock_path(&self) -> PathBuf {
        self.sibling("lock")
    }

    /// The in-progress marker, `.<dir>.sync.json`.
    pub fn marker_path(&self) -> PathBuf {
        self.sibling("sync.json")
    }

    fn sibling(&self, suffix: &str) -> PathBuf {
        let dir_name = self
            .checkout
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "checkout".to_string());
        self.parent().join(format!(".{dir_name}.{suffix}"))
    }
}
