//! systemd-sysusers fragments so `User=`/`Group=` resolve inside stage1.

use crate::error::PodliteResult;
use crate::identity::UidRange;
use crate::pod::{PodLayout, RuntimeApp};
use crate::util::{create_dir_and_shift, write_and_shift};
use std::path::PathBuf;

const SYSUSERS_DIR_MODE: u32 = 0o755;
const SYSUSERS_FILE_MODE: u32 = 0o640;

/// Synthetic account name for a numeric id.
pub fn generated_name(id: u32) -> String {
    format!("gen{id}")
}

/// Render the fragment: supplementary groups, primary group, then the user.
///
/// Groups keep manifest order with the primary last; repeated gids are
/// emitted once.
pub fn render_sysusers(uid: u32, gid: u32, supplementary_gids: &[u32]) -> String {
    let mut gids: Vec<u32> = Vec::with_capacity(supplementary_gids.len() + 1);
    for g in supplementary_gids.iter().copied().chain(std::iter::once(gid)) {
        if !gids.contains(&g) {
            gids.push(g);
        }
    }

    let mut out = String::new();
    for g in gids {
        out.push_str(&format!("g {} {g}\n", generated_name(g)));
    }
    let user = generated_name(uid);
    out.push_str(&format!("u {user} {uid} \"{user}\"\n"));
    out
}

/// Write `<stage1>/usr/lib/sysusers.d/<app>.conf`, shifting dir and file.
pub fn write_sysusers(
    layout: &PodLayout,
    app: &RuntimeApp,
    uid: u32,
    gid: u32,
    uid_range: &UidRange,
) -> PodliteResult<PathBuf> {
    create_dir_and_shift(&layout.sysusers_dir(), SYSUSERS_DIR_MODE, uid_range)?;

    let path = layout.sysusers_file(&app.name);
    let content = render_sysusers(uid, gid, &app.app.supplementary_gids);
    write_and_shift(&path, content.as_bytes(), SYSUSERS_FILE_MODE, uid_range)?;

    tracing::debug!(app = %app.name, uid, gid, path = %path.display(), "Wrote sysusers fragment");
    Ok(path)
}
