//! Hierarchical error types for pod preparation and status queries.
//!
//! Errors are categorized by how the caller should react:
//! - [`SecurityError`]: a path or symlink tried to leave the app root (never retried)
//! - [`ManifestError`]: the manifest contradicts itself or references missing entries
//! - [`ResolveError`]: every resolution strategy was exhausted
//! - `Io` / `Parse`: host state problems, wrapped with the operation and path
//! - `InvariantViolated`: a caller broke a contract (e.g. empty exec array)

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result alias used throughout the crate.
pub type PodliteResult<T> = Result<T, PodliteError>;

// ============================================================================
// Top-Level Error
// ============================================================================

/// Errors that can occur while preparing a pod or querying its state.
///
/// ```ignore
/// match stage1.prepare() {
///     Err(PodliteError::Security(_)) => { /* hostile image, discard pod */ }
///     Err(PodliteError::Manifest(_)) => { /* user should fix manifest */ }
///     Err(e) => { /* abort this pod's preparation */ }
///     Ok(prepared) => { /* hand args to the supervisor */ }
/// }
/// ```
#[derive(Debug, Error)]
pub enum PodliteError {
    /// A derived path would escape the app root.
    #[error("security: {0}")]
    Security(#[from] SecurityError),

    /// The manifest is contradictory or incomplete.
    #[error("manifest: {0}")]
    Manifest(#[from] ManifestError),

    /// No resolution strategy succeeded.
    #[error("resolve: {0}")]
    Resolve(#[from] ResolveError),

    /// Filesystem operation failed.
    #[error("{op} {}: {source}", path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Marker or pid file content could not be parsed.
    #[error("cannot parse {what} in {}: {value:?}", path.display())]
    Parse {
        what: &'static str,
        path: PathBuf,
        value: String,
    },

    /// No pod with this UUID exists in any phase directory.
    #[error("pod {0} not found")]
    PodNotFound(String),

    /// Pod UUID string is not a valid UUID.
    #[error("invalid pod uuid {0:?}")]
    InvalidUuid(String),

    /// A programming contract was broken by the caller.
    #[error("invariant violated: {0}")]
    InvariantViolated(String),
}

// ============================================================================
// Security Errors (always fatal)
// ============================================================================

/// Root-containment violations found while walking app paths.
#[derive(Debug, Error)]
pub enum SecurityError {
    /// A path component (usually `..`) walks above the app root.
    #[error("path escapes app's root: {path:?}")]
    PathEscapesRoot { path: String },

    /// A symlink target points above the app root.
    #[error("symlink {} escapes app's root with value {}", link.display(), target.display())]
    SymlinkEscapesRoot { link: PathBuf, target: PathBuf },

    /// Symlink chain longer than the walk allows (loops included).
    #[error("too many levels of symbolic links resolving {path:?} (limit {limit})")]
    TooManySymlinks { path: String, limit: usize },
}

// ============================================================================
// Manifest Errors (bad pod input)
// ============================================================================

/// Errors caused by the pod manifest itself.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error(
        "cannot have both os/linux/capabilities-retain-set and os/linux/capabilities-remove-set"
    )]
    ConflictingCapabilitySets,

    #[error("unknown capability {0:?}")]
    UnknownCapability(String),

    #[error("invalid volume kind {kind:?} for volume {volume:?}. Must be one of \"host\" or \"empty\"")]
    InvalidVolumeKind { volume: String, kind: String },

    #[error("cannot find corresponding volume {volume:?} for app {app:?}")]
    MissingVolume { app: String, volume: String },

    #[error("invalid isolator {name:?}: {reason}")]
    InvalidIsolator { name: String, reason: String },

    #[error("invalid name {0:?}: must be a single path component")]
    InvalidName(String),

    #[error("duplicate app name {0:?}")]
    DuplicateApp(String),

    #[error("app {0:?} not found in pod manifest")]
    AppNotFound(String),

    #[error("app {0:?} has an empty exec")]
    MissingExec(String),

    #[error("invalid volume mode {mode:?} for volume {volume:?}")]
    InvalidVolumeMode { volume: String, mode: String },

    #[error("invalid uid range {0:?}")]
    InvalidUidRange(String),

    #[error("malformed pod manifest {}: {source}", path.display())]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

// ============================================================================
// Resolve Errors (search space exhausted)
// ============================================================================

/// Errors raised after every lookup strategy failed.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("invalid user {spec:?} ({})", attempts.join("; "))]
    InvalidUser { spec: String, attempts: Vec<String> },

    #[error("invalid group {spec:?} ({})", attempts.join("; "))]
    InvalidGroup { spec: String, attempts: Vec<String> },

    #[error("unable to find {bin:?} in {:?}", search.join(":"))]
    BinaryNotFound { bin: String, search: Vec<String> },

    #[error("id {id} is outside uid range {range}")]
    IdOutOfRange { id: u32, range: String },
}

// ============================================================================
// Convenience Constructors
// ============================================================================

impl PodliteError {
    /// Wrap an IO error with the failed operation and path.
    pub fn io(op: &'static str, path: impl AsRef<Path>, source: io::Error) -> Self {
        Self::Io {
            op,
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Create a parse error for marker/pid file content.
    pub fn parse(what: &'static str, path: impl AsRef<Path>, value: impl Into<String>) -> Self {
        Self::Parse {
            what,
            path: path.as_ref().to_path_buf(),
            value: value.into(),
        }
    }

    /// Whether this error signals a malformed or hostile image/manifest.
    pub fn is_security(&self) -> bool {
        matches!(self, Self::Security(_))
    }
}
