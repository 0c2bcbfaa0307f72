//! Write-then-shift helpers.
//!
//! Every file or directory emitted under an active [`UidRange`] is chowned
//! before the helper returns, so no caller ever sees a written but unshifted
//! path.

use crate::error::{PodliteError, PodliteResult};
use crate::identity::UidRange;
use nix::unistd::{Gid, Uid, chown};
use std::io::Write;
use std::os::unix::fs::{FileTypeExt, OpenOptionsExt, PermissionsExt};
use std::path::Path;

/// Chown `paths` to the range's base id. No-op for an unshifted range.
pub fn shift_files<P: AsRef<Path>>(paths: &[P], uid_range: &UidRange) -> PodliteResult<()> {
    if !uid_range.is_shifted() {
        return Ok(());
    }

    let uid = Uid::from_raw(uid_range.shift);
    let gid = Gid::from_raw(uid_range.shift);
    for path in paths {
        let path = path.as_ref();
        chown(path, Some(uid), Some(gid))
            .map_err(|errno| PodliteError::io("chown", path, errno.into()))?;
        tracing::trace!(path = %path.display(), shift = uid_range.shift, "Shifted ownership");
    }
    Ok(())
}

/// Write `contents` to `path` with `mode`, then shift it.
pub fn write_and_shift(
    path: &Path,
    contents: &[u8],
    mode: u32,
    uid_range: &UidRange,
) -> PodliteResult<()> {
    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(mode)
        .open(path)
        .map_err(|e| PodliteError::io("create file", path, e))?;
    file.write_all(contents)
        .map_err(|e| PodliteError::io("write file", path, e))?;

    // Mode passed to open() is filtered by the umask
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
        .map_err(|e| PodliteError::io("chmod", path, e))?;

    shift_files(&[path], uid_range)
}

/// Create `path` (and parents) with `mode`, then shift the leaf directory.
pub fn create_dir_and_shift(path: &Path, mode: u32, uid_range: &UidRange) -> PodliteResult<()> {
    std::fs::create_dir_all(path).map_err(|e| PodliteError::io("create directory", path, e))?;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
        .map_err(|e| PodliteError::io("chmod", path, e))?;
    shift_files(&[path], uid_range)
}

/// Regular file with at least one execute bit set (symlinks followed).
pub fn is_executable(path: &Path) -> bool {
    match std::fs::metadata(path) {
        Ok(m) => m.is_file() && m.permissions().mode() & 0o111 != 0,
        Err(_) => false,
    }
}

/// Block or character device (symlinks followed).
pub fn is_device_node(path: &Path) -> bool {
    match std::fs::metadata(path) {
        Ok(m) => {
            let ft = m.file_type();
            ft.is_block_device() || ft.is_char_device()
        }
        Err(_) => false,
    }
}
