//! Pod manifest schema.
//!
//! JSON field names follow the appc pod manifest so manifests written by the
//! image/manifest layer deserialize without translation.

use crate::error::{ManifestError, PodliteError, PodliteResult};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path};

/// Isolator names consumed by the capability resolver.
pub mod isolators {
    pub const CAPABILITIES_RETAIN_SET: &str = "os/linux/capabilities-retain-set";
    pub const CAPABILITIES_REMOVE_SET: &str = "os/linux/capabilities-remove-set";
    pub const NO_NEW_PRIVILEGES: &str = "os/linux/no-new-privileges";
}

// ============================================================================
// Pod Manifest
// ============================================================================

/// Top-level pod manifest: ordered apps plus named volumes.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodManifest {
    #[serde(default = "default_ac_kind")]
    pub ac_kind: String,

    #[serde(default)]
    pub ac_version: String,

    #[serde(default)]
    pub apps: Vec<RuntimeApp>,

    #[serde(default)]
    pub volumes: Vec<Volume>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<Annotation>,
}

fn default_ac_kind() -> String {
    "PodManifest".to_string()
}

impl PodManifest {
    /// Read and validate a manifest from disk.
    pub fn load(path: &Path) -> PodliteResult<Self> {
        let bytes =
            std::fs::read(path).map_err(|e| PodliteError::io("read pod manifest", path, e))?;
        let manifest: PodManifest =
            serde_json::from_slice(&bytes).map_err(|source| ManifestError::Malformed {
                path: path.to_path_buf(),
                source,
            })?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Reject duplicate app names and names that are not a single path component.
    pub fn validate(&self) -> PodliteResult<()> {
        let names = self
            .apps
            .iter()
            .map(|a| &a.name)
            .chain(self.volumes.iter().map(|v| &v.name));
        for name in names {
            if !is_plain_name(name) {
                return Err(ManifestError::InvalidName(name.clone()).into());
            }
        }

        for (i, app) in self.apps.iter().enumerate() {
            if self.apps[..i].iter().any(|other| other.name == app.name) {
                return Err(ManifestError::DuplicateApp(app.name.clone()).into());
            }
        }
        Ok(())
    }

    /// Find an app by name.
    pub fn app(&self, name: &str) -> Option<&RuntimeApp> {
        self.apps.iter().find(|a| a.name == name)
    }

    /// Find a volume by name.
    pub fn volume(&self, name: &str) -> Option<&Volume> {
        self.volumes.iter().find(|v| v.name == name)
    }
}

/// App and volume names become file names under the pod directory.
fn is_plain_name(name: &str) -> bool {
    matches!(
        Path::new(name).components().collect::<Vec<_>>().as_slice(),
        [Component::Normal(_)]
    ) && !name.contains('/')
}

// ============================================================================
// Runtime App
// ============================================================================

/// One app inside the pod.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RuntimeApp {
    pub name: String,

    #[serde(default)]
    pub image: ImageRef,

    #[serde(default)]
    pub app: App,

    /// Explicit pod-level mounts (volume name → in-container path).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mounts: Vec<Mount>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<Annotation>,
}

/// Image the app was rendered from.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub id: String,
}

/// App runtime parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct App {
    #[serde(default)]
    pub exec: Vec<String>,

    /// Numeric ID, absolute path inside the image, or passwd name.
    #[serde(default = "default_id_spec")]
    pub user: String,

    /// Numeric ID, absolute path inside the image, or group name.
    #[serde(default = "default_id_spec")]
    pub group: String,

    #[serde(default, rename = "supplementaryGIDs")]
    pub supplementary_gids: Vec<u32>,

    #[serde(default)]
    pub working_directory: String,

    #[serde(default)]
    pub environment: Vec<EnvVar>,

    #[serde(default)]
    pub mount_points: Vec<MountPoint>,

    #[serde(default)]
    pub isolators: Vec<Isolator>,
}

fn default_id_spec() -> String {
    "0".to_string()
}

impl Default for App {
    fn default() -> Self {
        Self {
            exec: Vec::new(),
            user: default_id_spec(),
            group: default_id_spec(),
            supplementary_gids: Vec::new(),
            working_directory: String::new(),
            environment: Vec::new(),
            mount_points: Vec::new(),
            isolators: Vec::new(),
        }
    }
}

impl App {
    /// Look up a declared environment variable (last declaration wins).
    pub fn env_get(&self, name: &str) -> Option<&str> {
        self.environment
            .iter()
            .rev()
            .find(|e| e.name == name)
            .map(|e| e.value.as_str())
    }

    /// Working directory, defaulting to `/`.
    pub fn working_dir(&self) -> &str {
        if self.working_directory.is_empty() {
            "/"
        } else {
            &self.working_directory
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvVar {
    pub name: String,
    #[serde(default)]
    pub value: String,
}

impl EnvVar {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    pub name: String,
    #[serde(default)]
    pub value: String,
}

/// App-declared attachment point for a named volume.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MountPoint {
    pub name: String,
    pub path: String,
    #[serde(default)]
    pub read_only: bool,
}

/// Pod-level mount binding a volume to a path in one app.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mount {
    pub volume: String,
    pub path: String,
}

// ============================================================================
// Volumes
// ============================================================================

/// Backing storage kind of a volume.
///
/// Unknown kinds deserialize into `Other` and are rejected when the volume
/// is mounted, so the error can name the offending volume.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum VolumeKind {
    /// Path in the host filesystem.
    Host,
    /// Ephemeral directory shared by the pod's apps.
    Empty,
    Other(String),
}

impl VolumeKind {
    pub fn as_str(&self) -> &str {
        match self {
            VolumeKind::Host => "host",
            VolumeKind::Empty => "empty",
            VolumeKind::Other(s) => s,
        }
    }
}

impl From<String> for VolumeKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "host" => VolumeKind::Host,
            "empty" => VolumeKind::Empty,
            _ => VolumeKind::Other(s),
        }
    }
}

impl From<VolumeKind> for String {
    fn from(kind: VolumeKind) -> Self {
        kind.as_str().to_string()
    }
}

impl std::fmt::Display for VolumeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Named storage source available for mounting.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Volume {
    pub name: String,

    pub kind: VolumeKind,

    /// Host path (`host` volumes only).
    #[serde(default)]
    pub source: String,

    /// Overrides the mount point's read-only flag when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_only: Option<bool>,

    /// rbind vs. bind; unset means recursive.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recursive: Option<bool>,

    /// Octal permission string for `empty` volumes, e.g. "0755".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gid: Option<u32>,
}

impl Volume {
    /// A `host` volume with no overrides.
    pub fn host(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: VolumeKind::Host,
            source: source.into(),
            read_only: None,
            recursive: None,
            mode: None,
            uid: None,
            gid: None,
        }
    }

    /// An `empty` volume with no overrides.
    pub fn empty(name: impl Into<String>) -> Self {
        Self {
            kind: VolumeKind::Empty,
            ..Self::host(name, "")
        }
    }

    /// Recursive-bind flag, defaulting to true.
    pub fn is_recursive(&self) -> bool {
        self.recursive.unwrap_or(true)
    }
}

// ============================================================================
// Isolators
// ============================================================================

/// Typed isolator directive.
///
/// Only the capability sets and no-new-privileges are interpreted; anything
/// else is carried through untouched.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawIsolator", into = "RawIsolator")]
pub enum Isolator {
    CapabilitiesRetainSet(Vec<String>),
    CapabilitiesRemoveSet(Vec<String>),
    NoNewPrivileges(bool),
    Other {
        name: String,
        value: serde_json::Value,
    },
}

impl Isolator {
    pub fn name(&self) -> &str {
        match self {
            Isolator::CapabilitiesRetainSet(_) => isolators::CAPABILITIES_RETAIN_SET,
            Isolator::CapabilitiesRemoveSet(_) => isolators::CAPABILITIES_REMOVE_SET,
            Isolator::NoNewPrivileges(_) => isolators::NO_NEW_PRIVILEGES,
            Isolator::Other { name, .. } => name,
        }
    }
}

/// Wire form of an isolator: `{"name": ..., "value": ...}`.
#[derive(Clone, Debug, Serialize, Deserialize)]
struct RawIsolator {
    name: String,
    #[serde(default)]
    value: serde_json::Value,
}

#[derive(Deserialize, Serialize)]
struct CapabilitySetValue {
    set: Vec<String>,
}

impl TryFrom<RawIsolator> for Isolator {
    type Error = ManifestError;

    fn try_from(raw: RawIsolator) -> Result<Self, Self::Error> {
        let invalid = |reason: String| ManifestError::InvalidIsolator {
            name: raw.name.clone(),
            reason,
        };

        match raw.name.as_str() {
            isolators::CAPABILITIES_RETAIN_SET | isolators::CAPABILITIES_REMOVE_SET => {
                let value: CapabilitySetValue = serde_json::from_value(raw.value.clone())
                    .map_err(|e| invalid(e.to_string()))?;
                if value.set.is_empty() {
                    return Err(invalid("capability set must not be empty".into()));
                }
                if raw.name == isolators::CAPABILITIES_RETAIN_SET {
                    Ok(Isolator::CapabilitiesRetainSet(value.set))
                } else {
                    Ok(Isolator::CapabilitiesRemoveSet(value.set))
                }
            }
            isolators::NO_NEW_PRIVILEGES => match raw.value {
                serde_json::Value::Bool(b) => Ok(Isolator::NoNewPrivileges(b)),
                ref other => Err(invalid(format!("expected a boolean, got {other}"))),
            },
            _ => Ok(Isolator::Other {
                name: raw.name,
                value: raw.value,
            }),
        }
    }
}

impl From<Isolator> for RawIsolator {
    fn from(isolator: Isolator) -> Self {
        let name = isolator.name().to_string();
        let value = match isolator {
            Isolator::CapabilitiesRetainSet(set) | Isolator::CapabilitiesRemoveSet(set) => {
                serde_json::json!({ "set": set })
            }
            Isolator::NoNewPrivileges(b) => serde_json::Value::Bool(b),
            Isolator::Other { value, .. } => value,
        };
        RawIsolator { name, value }
    }
}
