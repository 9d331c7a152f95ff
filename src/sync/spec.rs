//! sync::spec
//!
//! What to sync: validated repository specs and their raw config form.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::paths::{CheckoutPaths, PathError, WorkspacePaths};
use crate::core::types::{BranchName, RemoteUrl, RepoName, TypeError};

/// Why an entry could not become a [`RepositorySpec`].
#[derive(Debug, Error)]
pub enum SpecError {
    #[error(transparent)]
    Field(#[from] TypeError),

    #[error(transparent)]
    Path(#[from] PathError),
}

/// A repository entry as written in configuration.
///
/// Nothing is validated at parse time, so one bad entry fails only its own
/// sync instead of the whole configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RepositoryEntry {
    /// Repository name, unique within the workspace.
    pub name: String,
    /// Where to fetch from.
    pub remote_url: String,
    /// Branch to check out and keep fast-forwarded.
    pub branch: String,
    /// Checkout path relative to the workspace root. Defaults to `name`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl RepositoryEntry {
    /// The checkout path relative to the workspace root.
    pub fn relative_path(&self) -> &Path {
        self.path
            .as_deref()
            .unwrap_or_else(|| Path::new(self.name.as_str()))
    }

    /// Validate every field and resolve the checkout path.
    pub fn resolve(&self, workspace: &WorkspacePaths) -> Result<RepositorySpec, SpecError> {
        Ok(RepositorySpec {
            name: RepoName::new(self.name.as_str())?,
            remote_url: RemoteUrl::new(self.remote_url.as_str())?,
            branch: BranchName::new(self.branch.as_str())?,
            local_path: workspace.resolve(self.relative_path())?,
        })
    }
}

/// A fully validated repository to sync.
///
/// # Example
///
/// ```
/// use reposync::core::paths::WorkspacePaths;
/// use reposync::sync::RepositoryEntry;
/// use std::path::Path;
///
/// let entry = RepositoryEntry {
///     name: "assisted-service".into(),
///     remote_url: "https://github.com/openshift/assisted-service.git".into(),
///     branch: "master".into(),
///     path: None,
/// };
/// let spec = entry.resolve(&WorkspacePaths::new("/workspace")).unwrap();
/// assert_eq!(spec.local_path, Path::new("/workspace/assisted-service"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositorySpec {
    pub name: RepoName,
    pub remote_url: RemoteUrl,
    pub branch: BranchName,
    /// Absolute checkout directory beneath the workspace root.
    pub local_path: PathBuf,
}

impl RepositorySpec {
    /// Lock, marker and checkout paths for this spec.
    pub fn paths(&self) -> CheckoutPaths {
        CheckoutPaths::new(&self.local_path)
    }
}
