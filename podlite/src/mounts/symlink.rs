//! Chroot-safe symlink resolution inside an app rootfs.
//!
//! Walks a path one component at a time from the app root, substituting
//! symlinks by hand so that absolute targets are re-rooted under the app
//! root instead of the host root. Containment is checked per component,
//! never by string prefix.

use crate::error::{PodliteError, PodliteResult, SecurityError};
use std::collections::VecDeque;
use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

/// Maximum symlink expansions in one walk, matching the Linux ELOOP limit.
pub const MAX_SYMLINK_STEPS: usize = 40;

#[derive(Debug)]
enum Step {
    Parent,
    Name(OsString),
}

/// Components of `path` that move the walk; `/` and `.` are dropped.
fn split_components(path: &Path) -> Vec<Step> {
    path.components()
        .filter_map(|c| match c {
            Component::ParentDir => Some(Step::Parent),
            Component::Normal(name) => Some(Step::Name(name.to_os_string())),
            Component::RootDir | Component::CurDir | Component::Prefix(_) => None,
        })
        .collect()
}

/// Whether lexically applying `rel` on top of `depth` components leaves the root.
fn escapes_lexically(depth: usize, rel: &Path) -> bool {
    let mut depth = depth;
    for step in split_components(rel) {
        match step {
            Step::Parent if depth == 0 => return true,
            Step::Parent => depth -= 1,
            Step::Name(_) => depth += 1,
        }
    }
    false
}

fn to_app_path(resolved: &[OsString]) -> PathBuf {
    let mut out = PathBuf::from("/");
    for name in resolved {
        out.push(name);
    }
    out
}

/// Resolve `path` against `app_root` as if `app_root` were `/`.
///
/// Returns the resolved path relative to the app root, as an absolute
/// in-app path (`/` for the root itself). Components that do not exist yet
/// are taken literally, so mount targets that will be created later still
/// resolve.
///
/// # Errors
/// * [`SecurityError::PathEscapesRoot`] - a `..` walks above the root
/// * [`SecurityError::SymlinkEscapesRoot`] - a symlink target lands above the root
/// * [`SecurityError::TooManySymlinks`] - more than [`MAX_SYMLINK_STEPS`] expansions
pub fn evaluate_symlinks_inside_app(
    app_root: &Path,
    path: impl AsRef<Path>,
) -> PodliteResult<PathBuf> {
    let path = path.as_ref();
    let escapes = || -> PodliteError {
        SecurityError::PathEscapesRoot {
            path: path.display().to_string(),
        }
        .into()
    };

    let mut pending: VecDeque<Step> = split_components(path).into();
    let mut resolved: Vec<OsString> = Vec::new();
    let mut expansions = 0usize;

    while let Some(step) = pending.pop_front() {
        let name = match step {
            Step::Parent => {
                resolved.pop().ok_or_else(escapes)?;
                continue;
            }
            Step::Name(name) => name,
        };

        let mut current = app_root.to_path_buf();
        current.extend(resolved.iter());
        let next = current.join(&name);

        let metadata = match std::fs::symlink_metadata(&next) {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Rest of the path does not exist yet: take it literally
                resolved.push(name);
                for rest in pending.drain(..) {
                    match rest {
                        Step::Parent => {
                            resolved.pop().ok_or_else(escapes)?;
                        }
                        Step::Name(n) => resolved.push(n),
                    }
                }
                break;
            }
            Err(e) => return Err(PodliteError::io("lstat", &next, e)),
        };

        if !metadata.file_type().is_symlink() {
            resolved.push(name);
            continue;
        }

        expansions += 1;
        if expansions > MAX_SYMLINK_STEPS {
            return Err(SecurityError::TooManySymlinks {
                path: path.display().to_string(),
                limit: MAX_SYMLINK_STEPS,
            }
            .into());
        }

        let target = std::fs::read_link(&next).map_err(|e| PodliteError::io("readlink", &next, e))?;
        let absolute = target.has_root();
        let base_depth = if absolute { 0 } else { resolved.len() };
        if escapes_lexically(base_depth, &target) {
            return Err(SecurityError::SymlinkEscapesRoot { link: next, target }.into());
        }

        tracing::trace!(
            link = %next.display(),
            target = %target.display(),
            "Following symlink inside app"
        );

        if absolute {
            resolved.clear();
        }
        for step in split_components(&target).into_iter().rev() {
            pending.push_front(step);
        }
    }

    Ok(to_app_path(&resolved))
}

/// Host path of `path` resolved inside `app_root`.
pub fn resolve_on_host(app_root: &Path, path: impl AsRef<Path>) -> PodliteResult<PathBuf> {
    let inside = evaluate_symlinks_inside_app(app_root, path)?;
    Ok(app_root.join(inside.strip_prefix("/").unwrap_or(&inside)))
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;
    use std::os::unix::fs::symlink;
    use tempfile::TempDir;

    fn nested(root: &Path, depth: usize) -> PathBuf {
        let mut rel = PathBuf::new();
        for i in 0..depth {
            rel.push(format!("d{i}"));
        }
        std::fs::create_dir_all(root.join(&rel)).unwrap();
        rel
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn parent_components_escape_iff_deeper_than_path(depth in 0usize..6, ups in 0usize..8) {
            let root = TempDir::new().unwrap();
            let mut path = nested(root.path(), depth);
            for _ in 0..ups {
                path.push("..");
            }
            path.push("x");

            let result = evaluate_symlinks_inside_app(root.path(), &path);
            if ups > depth {
                prop_assert!(result.unwrap_err().is_security());
            } else {
                let mut expected = PathBuf::from("/");
                for i in 0..(depth - ups) {
                    expected.push(format!("d{i}"));
                }
                expected.push("x");
                prop_assert_eq!(result.unwrap(), expected);
            }
        }

        #[test]
        fn relative_symlink_escapes_iff_target_climbs_past_root(depth in 0usize..5, ups in 0usize..7) {
            let root = TempDir::new().unwrap();
            let dir = nested(root.path(), depth);
            let mut target = PathBuf::new();
            for _ in 0..ups {
                target.push("..");
            }
            target.push("y");
            symlink(&target, root.path().join(&dir).join("link")).unwrap();

            let result = evaluate_symlinks_inside_app(root.path(), dir.join("link"));
            if ups > depth {
                prop_assert!(result.unwrap_err().is_security());
            } else {
                prop_assert!(result.unwrap().starts_with("/"));
            }
        }

        #[test]
        fn symlink_chains_bounded(len in 1usize..46) {
            let root = TempDir::new().unwrap();
            std::fs::create_dir(root.path().join("target")).unwrap();
            for i in 0..len {
                let next = if i + 1 == len { "target".to_string() } else { format!("l{}", i + 1) };
                symlink(&next, root.path().join(format!("l{i}"))).unwrap();
            }

            let result = evaluate_symlinks_inside_app(root.path(), "/l0");
            if len > MAX_SYMLINK_STEPS {
                let is_loop = matches!(
                    result,
                    Err(PodliteError::Security(SecurityError::TooManySymlinks { .. }))
                );
                prop_assert!(is_loop);
            } else {
                prop_assert_eq!(result.unwrap(), PathBuf::from("/target"));
            }
        }
    }
}
