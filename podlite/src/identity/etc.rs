//! Name lookups in the image's own `/etc/passwd` and `/etc/group`.
//!
//! The files are located through the chroot-safe walk, so an image that
//! symlinks `/etc/passwd` to the host's copy cannot leak host accounts.

use crate::error::{PodliteError, PodliteResult};
use crate::mounts::symlink::resolve_on_host;
use std::path::Path;

pub const PASSWD_PATH: &str = "/etc/passwd";
pub const GROUP_PATH: &str = "/etc/group";

/// One `/etc/passwd` entry (fields we use).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PasswdEntry {
    pub name: String,
    pub uid: u32,
    pub gid: u32,
}

/// One `/etc/group` entry (fields we use).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupEntry {
    pub name: String,
    pub gid: u32,
}

/// Parse `name:passwd:uid:gid:gecos:home:shell` lines.
///
/// Comments, blank lines and lines with non-numeric ids are skipped.
pub fn parse_passwd(content: &str) -> Vec<PasswdEntry> {
    content
        .lines()
        .filter(|l| !l.trim().is_empty() && !l.starts_with('#'))
        .filter_map(|line| {
            let mut fields = line.split(':');
            let name = fields.next()?;
            let _password = fields.next()?;
            let uid = fields.next()?.trim().parse().ok()?;
            let gid = fields.next()?.trim().parse().ok()?;
            Some(PasswdEntry {
                name: name.to_string(),
                uid,
                gid,
            })
        })
        .collect()
}

/// Parse `name:passwd:gid:members` lines.
pub fn parse_group(content: &str) -> Vec<GroupEntry> {
    content
        .lines()
        .filter(|l| !l.trim().is_empty() && !l.starts_with('#'))
        .filter_map(|line| {
            let mut fields = line.split(':');
            let name = fields.next()?;
            let _password = fields.next()?;
            let gid = fields.next()?.trim().parse().ok()?;
            Some(GroupEntry {
                name: name.to_string(),
                gid,
            })
        })
        .collect()
}

fn read_image_file(app_root: &Path, in_app: &str) -> PodliteResult<String> {
    let host_path = resolve_on_host(app_root, in_app)?;
    std::fs::read_to_string(&host_path).map_err(|e| PodliteError::io("read", &host_path, e))
}

/// Uid of `name` in the image's passwd file.
pub fn lookup_user(app_root: &Path, name: &str) -> PodliteResult<Option<u32>> {
    let content = read_image_file(app_root, PASSWD_PATH)?;
    Ok(parse_passwd(&content)
        .into_iter()
        .find(|e| e.name == name)
        .map(|e| e.uid))
}

/// Gid of `name` in the image's group file.
pub fn lookup_group(app_root: &Path, name: &str) -> PodliteResult<Option<u32>> {
    let content = read_image_file(app_root, GROUP_PATH)?;
    Ok(parse_group(&content)
        .into_iter()
        .find(|e| e.name == name)
        .map(|e| e.gid))
}
