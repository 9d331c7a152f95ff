//! core::types
//!
//! Strong types for core domain concepts.
//!
//! # Types
//!
//! - [`RepoName`] - Validated repository identifier
//! - [`RemoteUrl`] - Validated fetchable remote reference
//! - [`BranchName`] - Validated Git branch name
//! - [`Oid`] - Git object identifier (SHA)
//! - [`RefName`] - Validated Git reference name
//! - [`UtcTimestamp`] - RFC3339 timestamp
//!
//! # Validation
//!
//! These types enforce validity at construction time. Invalid values
//! cannot be represented, so a `RepositorySpec` built from them is always
//! well-formed.
//!
//! # Examples
//!
//! ```
//! use reposync::core::types::{BranchName, Oid, RefName, RemoteUrl, RepoName};
//!
//! // Valid constructions
//! let name = RepoName::new("assisted-service").unwrap();
//! let url = RemoteUrl::new("https://example.com/openshift/assisted-service.git").unwrap();
//! let branch = BranchName::new("master").unwrap();
//! let oid = Oid::new("abc123def4567890abc123def4567890abc12345").unwrap();
//! let refname = RefName::for_branch(&branch);
//! assert_eq!(refname.as_str(), "refs/heads/master");
//!
//! // Invalid constructions fail at creation time
//! assert!(RepoName::new("../escape").is_err());
//! assert!(RemoteUrl::new("ftp://example.com/repo").is_err());
//! assert!(BranchName::new("invalid..name").is_err());
//! assert!(Oid::new("not-a-sha").is_err());
//! # let _ = (name, url, oid);
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from type validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid repository name: {0}")]
    InvalidRepoName(String),

    #[error("invalid remote url: {0}")]
    InvalidRemoteUrl(String),

    #[error("invalid branch name: {0}")]
    InvalidBranchName(String),

    #[error("invalid object id: {0}")]
    InvalidOid(String),
}

/// A validated repository identifier.
///
/// Names double as the default checkout directory under the workspace root,
/// so they are restricted to a filesystem-safe alphabet:
/// - ASCII letters, digits, `-`, `_`, `.`
/// - Cannot be empty or longer than 100 characters
/// - Cannot start with `.` (keeps lock and marker siblings unambiguous)
///
/// # Example
///
/// ```
/// use reposync::core::types::RepoName;
///
/// let name = RepoName::new("assisted-service").unwrap();
/// assert_eq!(name.as_str(), "assisted-service");
///
/// assert!(RepoName::new("").is_err());
/// assert!(RepoName::new(".hidden").is_err());
/// assert!(RepoName::new("a/b").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RepoName(String);

impl RepoName {
    const MAX_LEN: usize = 100;

    /// Create a new validated repository name.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidRepoName` if the name is empty, too long,
    /// starts with `.`, or contains characters outside the allowed set.
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        Self::validate(&name)?;
        Ok(Self(name))
    }

    fn validate(name: &str) -> Result<(), TypeError> {
        if name.is_empty() {
            return Err(TypeError::InvalidRepoName(
                "repository name cannot be empty".into(),
            ));
        }
        if name.len() > Self::MAX_LEN {
            return Err(TypeError::InvalidRepoName(format!(
                "repository name cannot exceed {} characters",
                Self::MAX_LEN
            )));
        }
        if name.starts_with('.') {
            return Err(TypeError::InvalidRepoName(
                "repository name cannot start with '.'".into(),
            ));
        }
        if let Some(c) = name
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
        {
            return Err(TypeError::InvalidRepoName(format!(
                "repository name cannot contain {c:?}"
            )));
        }
        Ok(())
    }

    /// Get the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for RepoName {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<RepoName> for String {
    fn from(name: RepoName) -> Self {
        name.0
    }
}

impl AsRef<str> for RepoName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RepoName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A validated remote repository reference.
///
/// Accepted forms:
/// - `https://`, `http://`, `ssh://`, `git://` and `file://` URLs with a
///   non-empty path
/// - scp-like `user@host:path`
///
/// Which transports actually work at runtime depends on the enabled cargo
/// features (`https`, `ssh`); `file://` and `git://` are always available.
///
/// # Example
///
/// ```
/// use reposync::core::types::RemoteUrl;
///
/// assert!(RemoteUrl::new("https://example.com/org/repo.git").is_ok());
/// assert!(RemoteUrl::new("git@example.com:org/repo.git").is_ok());
/// assert!(RemoteUrl::new("file:///srv/git/repo.git").is_ok());
///
/// assert!(RemoteUrl::new("").is_err());
/// assert!(RemoteUrl::new("https://").is_err());
/// assert!(RemoteUrl::new("https://example.com/a repo").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RemoteUrl(String);

impl RemoteUrl {
    const SCHEMES: [&'static str; 5] = ["https://", "http://", "ssh://", "git://", "file://"];

    /// Create a new validated remote URL.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidRemoteUrl` for empty strings, whitespace or
    /// control characters, unknown schemes, and URLs without a path.
    pub fn new(url: impl Into<String>) -> Result<Self, TypeError> {
        let url = url.into();
        Self::validate(&url)?;
        Ok(Self(url))
    }

    fn validate(url: &str) -> Result<(), TypeError> {
        if url.is_empty() {
            return Err(TypeError::InvalidRemoteUrl("url cannot be empty".into()));
        }
        if url.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(TypeError::InvalidRemoteUrl(
                "url cannot contain whitespace or control characters".into(),
            ));
        }

        if let Some(rest) = Self::SCHEMES.iter().find_map(|s| url.strip_prefix(s)) {
            // file:///path has an empty authority; everything else needs a host.
            let (host, path) = match rest.split_once('/') {
                Some((host, path)) => (host, path),
                None => (rest, ""),
            };
            if host.is_empty() && !url.starts_with("file://") {
                return Err(TypeError::InvalidRemoteUrl(format!(
                    "url '{url}' has no host"
                )));
            }
            if path.trim_matches('/').is_empty() {
                return Err(TypeError::InvalidRemoteUrl(format!(
                    "url '{url}' has no repository path"
                )));
            }
            return Ok(());
        }

        if url.contains("://") {
            return Err(TypeError::InvalidRemoteUrl(format!(
                "unsupported scheme in '{url}'"
            )));
        }

        // scp-like syntax: [user@]host:path
        match url.split_once(':') {
            Some((host, path))
                if !host.is_empty()
                    && !host.contains('/')
                    && !path.is_empty()
                    && !host.ends_with('@') =>
            {
                Ok(())
            }
            _ => Err(TypeError::InvalidRemoteUrl(format!(
                "'{url}' is neither a url nor scp-like host:path"
            ))),
        }
    }

    /// Get the URL as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for RemoteUrl {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<RemoteUrl> for String {
    fn from(url: RemoteUrl) -> Self {
        url.0
    }
}

impl AsRef<str> for RemoteUrl {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RemoteUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A validated Git branch name.
///
/// Branch names must conform to Git's refname rules (see `git check-ref-format`):
/// - Cannot be empty
/// - Cannot start with `.` or `-`
/// - Cannot end with `.lock` or `/`
/// - Cannot contain `..`, `@{`, `//`, or ASCII control characters
/// - Cannot contain spaces, `~`, `^`, `:`, `\`, `?`, `*`, `[`
/// - Cannot be exactly `@`
///
/// # Example
///
/// ```
/// use reposync::core::types::BranchName;
///
/// let name = BranchName::new("release/4.14").unwrap();
/// assert_eq!(name.as_str(), "release/4.14");
///
/// assert!(BranchName::new("").is_err());
/// assert!(BranchName::new(".hidden").is_err());
/// assert!(BranchName::new("branch.lock").is_err());
/// assert!(BranchName::new("has space").is_err());
/// assert!(BranchName::new("@").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BranchName(String);

impl BranchName {
    /// Create a new validated branch name.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidBranchName` if the name violates Git's refname rules.
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        Self::validate(&name)?;
        Ok(Self(name))
    }

    fn validate(name: &str) -> Result<(), TypeError> {
        if name.is_empty() {
            return Err(TypeError::InvalidBranchName(
                "branch name cannot be empty".into(),
            ));
        }

        if name == "@" {
            return Err(TypeError::InvalidBranchName(
                "branch name cannot be '@' (reserved)".into(),
            ));
        }

        if name.starts_with('.') {
            return Err(TypeError::InvalidBranchName(
                "branch name cannot start with '.'".into(),
            ));
        }
        if name.starts_with('-') {
            return Err(TypeError::InvalidBranchName(
                "branch name cannot start with '-'".into(),
            ));
        }

        if name.ends_with(".lock") {
            return Err(TypeError::InvalidBranchName(
                "branch name cannot end with '.lock'".into(),
            ));
        }
        if name.ends_with('/') {
            return Err(TypeError::InvalidBranchName(
                "branch name cannot end with '/'".into(),
            ));
        }

        for bad in ["..", "@{", "//"] {
            if name.contains(bad) {
                return Err(TypeError::InvalidBranchName(format!(
                    "branch name cannot contain '{bad}'"
                )));
            }
        }

        const INVALID_CHARS: [char; 8] = [' ', '~', '^', ':', '\\', '?', '*', '['];
        for c in INVALID_CHARS {
            if name.contains(c) {
                return Err(TypeError::InvalidBranchName(format!(
                    "branch name cannot contain '{c}'"
                )));
            }
        }

        if name.chars().any(|c| c.is_ascii_control()) {
            return Err(TypeError::InvalidBranchName(
                "branch name cannot contain control characters".into(),
            ));
        }

        for component in name.split('/') {
            if component.starts_with('.') {
                return Err(TypeError::InvalidBranchName(
                    "path component cannot start with '.'".into(),
                ));
            }
            if component.ends_with(".lock") {
                return Err(TypeError::InvalidBranchName(
                    "path component cannot end with '.lock'".into(),
                ));
            }
        }

        Ok(())
    }

    /// Get the branch name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for BranchName {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<BranchName> for String {
    fn from(name: BranchName) -> Self {
        name.0
    }
}

impl AsRef<str> for BranchName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BranchName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A Git object identifier (SHA-1 or SHA-256).
///
/// OIDs are normalized to lowercase for consistency.
///
/// # Example
///
/// ```
/// use reposync::core::types::Oid;
///
/// let oid = Oid::new("ABC123DEF4567890ABC123DEF4567890ABC12345").unwrap();
/// assert_eq!(oid.as_str(), "abc123def4567890abc123def4567890abc12345");
/// assert_eq!(oid.short(7), "abc123d");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Oid(String);

impl Oid {
    /// Create a new validated object id.
    ///
    /// The OID is normalized to lowercase.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidOid` if the string is not a valid hex OID.
    pub fn new(oid: impl Into<String>) -> Result<Self, TypeError> {
        let oid = oid.into().to_ascii_lowercase();
        Self::validate(&oid)?;
        Ok(Self(oid))
    }

    /// Get an abbreviated form of the OID.
    ///
    /// Returns the first `len` characters. If `len` exceeds the OID length,
    /// returns the full OID.
    pub fn short(&self, len: usize) -> &str {
        let end = len.min(self.0.len());
        &self.0[..end]
    }

    fn validate(oid: &str) -> Result<(), TypeError> {
        // SHA-1 is 40 hex chars, SHA-256 is 64
        if oid.len() != 40 && oid.len() != 64 {
            return Err(TypeError::InvalidOid(format!(
                "expected 40 or 64 hex characters, got {}",
                oid.len()
            )));
        }
        if !oid.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(TypeError::InvalidOid(
                "object id must be hexadecimal".into(),
            ));
        }
        Ok(())
    }

    /// Get the object id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Oid {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<Oid> for String {
    fn from(oid: Oid) -> Self {
        oid.0
    }
}

impl AsRef<str> for Oid {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Oid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A Git reference name derived from validated parts.
///
/// Only constructed from a [`BranchName`] (and a remote name for
/// remote-tracking refs), so it is valid by construction.
///
/// # Example
///
/// ```
/// use reposync::core::types::{BranchName, RefName};
///
/// let branch = BranchName::new("main").unwrap();
/// assert_eq!(RefName::for_branch(&branch).as_str(), "refs/heads/main");
/// assert_eq!(
///     RefName::for_remote_branch("origin", &branch).as_str(),
///     "refs/remotes/origin/main"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RefName(String);

impl RefName {
    /// Ref name for a local branch (`refs/heads/<branch>`).
    pub fn for_branch(branch: &BranchName) -> Self {
        Self(format!("refs/heads/{}", branch.as_str()))
    }

    /// Ref name for a remote-tracking branch (`refs/remotes/<remote>/<branch>`).
    pub fn for_remote_branch(remote: &str, branch: &BranchName) -> Self {
        Self(format!("refs/remotes/{}/{}", remote, branch.as_str()))
    }

    /// Force-update refspec fetching `branch` into its remote-tracking ref.
    pub fn fetch_refspec(remote: &str, branch: &BranchName) -> String {
        format!(
            "+{}:{}",
            Self::for_branch(branch),
            Self::for_remote_branch(remote, branch)
        )
    }

    /// Get the ref name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for RefName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RefName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A UTC timestamp, serialized as RFC3339.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtcTimestamp(chrono::DateTime<chrono::Utc>);

impl UtcTimestamp {
    /// Create a timestamp for the current moment.
    pub fn now() -> Self {
        Self(chrono::Utc::now())
    }
}

impl std::fmt::Display for UtcTimestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}
