//! Device-node volumes surfaced as `DeviceAllow=` entries.
//!
//! `DeviceAllow=` only accepts paths under `/dev`, but the device lives at the
//! mount target inside the app. Each device volume gets a staging symlink in
//! `<stage1>/rkt/volumes/<volume>` that stage1 later exposes as
//! `/dev/.rkt/<volume>`.

use crate::error::{PodliteError, PodliteResult};
use crate::identity::UidRange;
use crate::mounts::volume::BindMount;
use crate::pod::layout::dirs;
use crate::pod::{PodLayout, Volume, VolumeKind};
use crate::util::{create_dir_and_shift, is_device_node};
use std::path::Path;

const VOLUME_LINKS_MODE: u32 = 0o700;

/// One `DeviceAllow=` entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceAllow {
    /// In-container link path, `/dev/.rkt/<volume>`.
    pub path: String,
    pub read_only: bool,
}

impl DeviceAllow {
    pub fn mode(&self) -> &'static str {
        if self.read_only { "r" } else { "rw" }
    }
}

impl std::fmt::Display for DeviceAllow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.path, self.mode())
    }
}

/// Link device volumes and build their allow entries, in mount order.
///
/// An existing staging link is left as is.
pub fn generate_device_allows(
    layout: &PodLayout,
    mounts: &[BindMount],
    volumes: &[Volume],
    uid_range: &UidRange,
) -> PodliteResult<Vec<DeviceAllow>> {
    let links_dir = layout.volume_links_dir();
    create_dir_and_shift(&links_dir, VOLUME_LINKS_MODE, uid_range)?;

    let mut allows = Vec::new();
    for mount in mounts {
        let Some(volume) = volumes.iter().find(|v| v.name == mount.volume) else {
            continue;
        };
        if volume.kind != VolumeKind::Host || !is_device_node(Path::new(&volume.source)) {
            continue;
        }

        let link = links_dir.join(&volume.name);
        match std::os::unix::fs::symlink(&mount.target, &link) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
            Err(e) => return Err(PodliteError::io("symlink device volume", &link, e)),
        }

        let allow = DeviceAllow {
            path: format!("{}/{}", dirs::DEVICE_LINKS_DIR, volume.name),
            read_only: mount.read_only,
        };
        tracing::debug!(volume = %volume.name, allow = %allow, "Allowing device volume");
        allows.push(allow);
    }

    Ok(allows)
}
