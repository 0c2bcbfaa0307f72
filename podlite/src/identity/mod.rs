//! Identity resolution for app `user`/`group` specs.
//!
//! Each spec is resolved on its own by the first strategy that succeeds:
//!
//! 1. numeric literal (`"1000"`)
//! 2. absolute path inside the app rootfs: owner of that file, unshifted
//! 3. symbolic name in the image's `/etc/passwd` or `/etc/group`
//!
//! The error for an unresolvable spec lists every attempt in order.

pub mod etc;
pub mod sysusers;
pub mod uid_range;

pub use sysusers::write_sysusers;
pub use uid_range::UidRange;

use crate::error::{PodliteResult, ResolveError};
use crate::mounts::symlink::resolve_on_host;
use crate::pod::App;
use std::os::unix::fs::MetadataExt;
use std::path::Path;

/// Which id a spec is being resolved to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum IdKind {
    User,
    Group,
}

/// One resolution strategy, tried in declaration order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Strategy {
    Numeric,
    Stat,
    Etc,
}

impl Strategy {
    const ORDER: [Strategy; 3] = [Strategy::Numeric, Strategy::Stat, Strategy::Etc];

    fn as_str(&self) -> &'static str {
        match self {
            Strategy::Numeric => "numeric",
            Strategy::Stat => "stat",
            Strategy::Etc => "etc",
        }
    }

    /// `Err` carries why this strategy did not produce an id.
    fn resolve(
        &self,
        kind: IdKind,
        app_root: &Path,
        spec: &str,
        uid_range: &UidRange,
    ) -> Result<u32, String> {
        match self {
            Strategy::Numeric => spec.parse::<u32>().map_err(|e| e.to_string()),
            Strategy::Stat => {
                if !spec.starts_with('/') {
                    return Err("not an absolute path".into());
                }
                let host_path = resolve_on_host(app_root, spec).map_err(|e| e.to_string())?;
                let metadata = std::fs::metadata(&host_path)
                    .map_err(|e| format!("{}: {e}", host_path.display()))?;
                let id = match kind {
                    IdKind::User => metadata.uid(),
                    IdKind::Group => metadata.gid(),
                };
                uid_range.unshift_id(id).map_err(|e| e.to_string())
            }
            Strategy::Etc => {
                let found = match kind {
                    IdKind::User => etc::lookup_user(app_root, spec),
                    IdKind::Group => etc::lookup_group(app_root, spec),
                };
                match found {
                    Ok(Some(id)) => Ok(id),
                    Ok(None) => Err(match kind {
                        IdKind::User => format!("no such user in {}", etc::PASSWD_PATH),
                        IdKind::Group => format!("no such group in {}", etc::GROUP_PATH),
                    }),
                    Err(e) => Err(e.to_string()),
                }
            }
        }
    }
}

fn resolve_id(
    kind: IdKind,
    app_root: &Path,
    spec: &str,
    uid_range: &UidRange,
) -> PodliteResult<u32> {
    // Unset spec means root, as in the manifest default
    let effective = if spec.is_empty() { "0" } else { spec };

    let mut attempts = Vec::with_capacity(Strategy::ORDER.len());
    for strategy in Strategy::ORDER {
        match strategy.resolve(kind, app_root, effective, uid_range) {
            Ok(id) => {
                tracing::trace!(spec, id, strategy = strategy.as_str(), "Resolved id");
                return Ok(id);
            }
            Err(reason) => attempts.push(format!("{}: {reason}", strategy.as_str())),
        }
    }

    let spec = spec.to_string();
    Err(match kind {
        IdKind::User => ResolveError::InvalidUser { spec, attempts },
        IdKind::Group => ResolveError::InvalidGroup { spec, attempts },
    }
    .into())
}

/// Resolve a user spec to a container uid.
pub fn resolve_user(app_root: &Path, spec: &str, uid_range: &UidRange) -> PodliteResult<u32> {
    resolve_id(IdKind::User, app_root, spec, uid_range)
}

/// Resolve a group spec to a container gid.
pub fn resolve_group(app_root: &Path, spec: &str, uid_range: &UidRange) -> PodliteResult<u32> {
    resolve_id(IdKind::Group, app_root, spec, uid_range)
}

/// Resolve an app's `(uid, gid)`.
pub fn resolve_user_group(
    app_root: &Path,
    app: &App,
    uid_range: &UidRange,
) -> PodliteResult<(u32, u32)> {
    let uid = resolve_user(app_root, &app.user, uid_range)?;
    let gid = resolve_group(app_root, &app.group, uid_range)?;
    Ok((uid, gid))
}
