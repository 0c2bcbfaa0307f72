//! Volume and mount point resolution into bind-mount directives.

use crate::error::{ManifestError, PodliteError, PodliteResult};
use crate::identity::UidRange;
use crate::mounts::symlink::evaluate_symlinks_inside_app;
use crate::pod::layout::{join_under, rel_app_rootfs};
use crate::pod::{MountPoint, PodLayout, RuntimeApp, Volume, VolumeKind};
use crate::util::{create_dir_and_shift, shift_files};
use nix::unistd::{Gid, Uid, chown};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

/// Permission bits of the shared-volumes parent directory.
pub const SHARED_VOLUMES_MODE: u32 = 0o755;

/// Default permission bits of an `empty` volume's backing directory.
pub const DEFAULT_EMPTY_VOLUME_MODE: u32 = 0o755;

/// A volume attached at a path in one app, before path resolution.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppMount {
    pub volume: String,
    pub path: String,
}

/// Bind mount ready to be rendered as a launch argument.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BindMount {
    pub volume: String,
    /// Host path bound into the app.
    pub source: PathBuf,
    /// Target as seen from stage1: `/opt/stage2/<app>/rootfs/<resolved>`.
    pub target: PathBuf,
    /// Target on the host, under the pod directory.
    pub host_target: PathBuf,
    pub read_only: bool,
    pub recursive: bool,
}

fn find_volume<'a>(volumes: &'a [Volume], app: &str, name: &str) -> PodliteResult<&'a Volume> {
    volumes
        .iter()
        .find(|v| v.name == name)
        .ok_or_else(|| {
            ManifestError::MissingVolume {
                app: app.to_string(),
                volume: name.to_string(),
            }
            .into()
        })
}

/// Mounts of one app: explicit pod-level mounts first, then the app's mount
/// points not already covered by a mount of the same volume.
pub fn generate_mounts(app: &RuntimeApp, volumes: &[Volume]) -> PodliteResult<Vec<AppMount>> {
    let mut mounts: Vec<AppMount> = Vec::new();

    for m in &app.mounts {
        find_volume(volumes, &app.name, &m.volume)?;
        mounts.push(AppMount {
            volume: m.volume.clone(),
            path: m.path.clone(),
        });
    }

    for mp in &app.app.mount_points {
        if mounts.iter().any(|m| m.volume == mp.name) {
            continue;
        }
        find_volume(volumes, &app.name, &mp.name)?;
        mounts.push(AppMount {
            volume: mp.name.clone(),
            path: mp.path.clone(),
        });
    }

    Ok(mounts)
}

/// Volume override if set, else the flag of the app's mount point for it.
pub fn is_mount_read_only(volume: &Volume, mount_points: &[MountPoint]) -> bool {
    if let Some(read_only) = volume.read_only {
        return read_only;
    }
    mount_points
        .iter()
        .find(|mp| mp.name == volume.name)
        .map(|mp| mp.read_only)
        .unwrap_or(false)
}

/// Host source of a volume.
pub fn volume_source(layout: &PodLayout, volume: &Volume) -> PodliteResult<PathBuf> {
    match &volume.kind {
        VolumeKind::Host => Ok(PathBuf::from(&volume.source)),
        VolumeKind::Empty => Ok(layout.shared_volume(&volume.name)),
        VolumeKind::Other(kind) => Err(ManifestError::InvalidVolumeKind {
            volume: volume.name.clone(),
            kind: kind.clone(),
        }
        .into()),
    }
}

/// Resolve every mount of `app` into a [`BindMount`], in manifest order.
///
/// Targets go through the chroot-safe walk so a target that is itself a
/// symlink binds onto the link's destination.
pub fn resolve_bind_mounts(
    layout: &PodLayout,
    app: &RuntimeApp,
    volumes: &[Volume],
) -> PodliteResult<Vec<BindMount>> {
    let app_root = layout.app_rootfs(&app.name);
    let rel_root = rel_app_rootfs(&app.name);

    let mut binds = Vec::new();
    for mount in generate_mounts(app, volumes)? {
        let volume = find_volume(volumes, &app.name, &mount.volume)?;
        let source = volume_source(layout, volume)?;

        let resolved = evaluate_symlinks_inside_app(&app_root, &mount.path)?;

        binds.push(BindMount {
            volume: volume.name.clone(),
            source,
            target: join_under(&rel_root, &resolved),
            host_target: join_under(&app_root, &resolved),
            read_only: is_mount_read_only(volume, &app.app.mount_points),
            recursive: volume.is_recursive(),
        });
    }

    tracing::debug!(app = %app.name, count = binds.len(), "Resolved bind mounts");
    Ok(binds)
}

fn parse_mode(volume: &Volume) -> PodliteResult<u32> {
    let Some(mode) = volume.mode.as_deref() else {
        return Ok(DEFAULT_EMPTY_VOLUME_MODE);
    };
    match u32::from_str_radix(mode, 8) {
        Ok(bits) if bits <= 0o7777 => Ok(bits),
        _ => Err(ManifestError::InvalidVolumeMode {
            volume: volume.name.clone(),
            mode: mode.to_string(),
        }
        .into()),
    }
}

/// Create the backing directory of an `empty` volume and the mount target.
///
/// The empty volume gets the volume's mode; its owner is set only when the
/// volume names a uid/gid or the range shifts ids. A missing target is
/// created as an empty file when the source exists and is not a directory
/// (regular files and device nodes), else as a directory.
pub fn prepare_mountpoints(
    layout: &PodLayout,
    mount: &BindMount,
    volume: &Volume,
    uid_range: &UidRange,
) -> PodliteResult<()> {
    if volume.kind == VolumeKind::Empty {
        create_dir_and_shift(&layout.shared_volumes_dir(), SHARED_VOLUMES_MODE, uid_range)?;
        prepare_empty_volume(&mount.source, volume, uid_range)?;
    }

    if std::fs::symlink_metadata(&mount.host_target).is_ok() {
        return Ok(());
    }

    // Files and device nodes can only be bound onto a file
    let source_is_file = std::fs::metadata(&mount.source).is_ok_and(|m| !m.is_dir());
    if source_is_file {
        if let Some(parent) = mount.host_target.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| PodliteError::io("create directory", parent, e))?;
        }
        std::fs::File::create(&mount.host_target)
            .map_err(|e| PodliteError::io("create mount target", &mount.host_target, e))?;
        shift_files(&[&mount.host_target], uid_range)?;
    } else {
        create_dir_and_shift(&mount.host_target, 0o755, uid_range)?;
    }

    tracing::debug!(
        volume = %mount.volume,
        target = %mount.host_target.display(),
        "Created mount target"
    );
    Ok(())
}

fn prepare_empty_volume(path: &Path, volume: &Volume, uid_range: &UidRange) -> PodliteResult<()> {
    let mode = parse_mode(volume)?;

    std::fs::create_dir_all(path).map_err(|e| PodliteError::io("create directory", path, e))?;

    if volume.uid.is_some() || volume.gid.is_some() || uid_range.is_shifted() {
        let uid = uid_range.shift_id(volume.uid.unwrap_or(0))?;
        let gid = uid_range.shift_id(volume.gid.unwrap_or(0))?;
        chown(path, Some(Uid::from_raw(uid)), Some(Gid::from_raw(gid)))
            .map_err(|errno| PodliteError::io("chown", path, errno.into()))?;
    }

    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
        .map_err(|e| PodliteError::io("chmod", path, e))?;

    tracing::debug!(
        volume = %volume.name,
        path = %path.display(),
        mode = %format!("{mode:o}"),
        "Prepared empty volume"
    );
    Ok(())
}
