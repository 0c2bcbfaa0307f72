//! Executable lookup inside the app rootfs.

use crate::error::{PodliteResult, ResolveError};
use crate::mounts::symlink::evaluate_symlinks_inside_app;
use crate::pod::App;
use crate::util::is_executable;
use std::path::{Component, Path, PathBuf};

/// Lexically join `rel` under the absolute in-app directory `dir`.
///
/// `..` never climbs above `/`.
fn clean_join(dir: &str, rel: &str) -> PathBuf {
    let mut out = PathBuf::from("/");
    for c in Path::new(dir).join(rel).components() {
        match c {
            Component::Normal(name) => out.push(name),
            Component::ParentDir => {
                out.pop();
            }
            Component::RootDir | Component::CurDir | Component::Prefix(_) => {}
        }
    }
    out
}

/// Directories searched for a bare binary name.
///
/// The app's declared `PATH` if any, else the working directory followed by
/// the `confstr(_CS_PATH)` default.
pub fn app_search_paths(app: &App, workdir: &str) -> Vec<String> {
    match app.env_get("PATH") {
        Some(path) => path.split(':').map(str::to_string).collect(),
        None => vec![workdir.to_string(), "/bin".to_string(), "/usr/bin".to_string()],
    }
}

/// Find `bin` in `paths` inside `app_root`.
///
/// Relative (and empty) entries are taken from `workdir`. Each candidate is
/// resolved through the chroot-safe walk and accepted if the resolved file is
/// an executable. Returns the unresolved in-app path of the winner.
pub fn lookup_path_inside_app(
    bin: &str,
    paths: &[String],
    app_root: &Path,
    workdir: &str,
) -> PodliteResult<PathBuf> {
    for dir in paths {
        let dir = if dir.starts_with('/') {
            clean_join(dir, "")
        } else {
            clean_join(workdir, dir)
        };
        let candidate = dir.join(bin);

        let resolved = evaluate_symlinks_inside_app(app_root, &candidate)?;
        let on_host = app_root.join(resolved.strip_prefix("/").unwrap_or(&resolved));
        if is_executable(&on_host) {
            tracing::trace!(bin, path = %candidate.display(), "Found executable");
            return Ok(candidate);
        }
    }

    Err(ResolveError::BinaryNotFound {
        bin: bin.to_string(),
        search: paths.to_vec(),
    }
    .into())
}

/// Absolute in-app path of the app's binary, suitable for `ExecStart=`.
///
/// * absolute: used verbatim
/// * contains `/`: relative to `workdir`
/// * bare name: searched with [`app_search_paths`]
pub fn find_bin_path(app_root: &Path, app: &App, workdir: &str, bin: &str) -> PodliteResult<PathBuf> {
    if bin.starts_with('/') {
        return Ok(PathBuf::from(bin));
    }
    if bin.contains('/') {
        return Ok(clean_join(workdir, bin));
    }

    let paths = app_search_paths(app, workdir);
    lookup_path_inside_app(bin, &paths, app_root, workdir)
}
