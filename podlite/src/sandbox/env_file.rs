//! Per-app environment file.

use crate::error::PodliteResult;
use crate::identity::UidRange;
use crate::pod::{EnvVar, PodLayout, RuntimeApp};
use crate::util::{create_dir_and_shift, write_and_shift};
use std::path::PathBuf;

/// Variables every app gets unless it declares them itself.
pub const DEFAULT_ENV: [(&str, &str); 5] = [
    ("PATH", "/usr/local/sbin:/usr/local/bin:/usr/sbin:/usr/bin:/sbin:/bin"),
    ("SHELL", "/bin/sh"),
    ("USER", "root"),
    ("LOGNAME", "root"),
    ("HOME", "/root"),
];

const ENV_FILE_MODE: u32 = 0o644;

/// Undeclared defaults first, then the declared variables in order, each
/// entry terminated by `separator`.
pub fn render_env(env: &[EnvVar], separator: u8) -> Vec<u8> {
    let mut out = Vec::new();
    let mut entry = |name: &str, value: &str| {
        out.extend_from_slice(name.as_bytes());
        out.push(b'=');
        out.extend_from_slice(value.as_bytes());
        out.push(separator);
    };

    for (name, value) in DEFAULT_ENV {
        if !env.iter().any(|e| e.name == name) {
            entry(name, value);
        }
    }
    for e in env {
        entry(&e.name, &e.value);
    }
    out
}

/// Write `<stage1>/rkt/env/<app>`.
pub fn write_env_file(
    layout: &PodLayout,
    app: &RuntimeApp,
    separator: u8,
    uid_range: &UidRange,
) -> PodliteResult<PathBuf> {
    create_dir_and_shift(&layout.env_dir(), 0o755, uid_range)?;

    let path = layout.env_file(&app.name);
    let content = render_env(&app.app.environment, separator);
    write_and_shift(&path, &content, ENV_FILE_MODE, uid_range)?;

    tracing::debug!(app = %app.name, path = %path.display(), "Wrote env file");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_only() {
        let out = render_env(&[], b'\n');
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "PATH=/usr/local/sbin:/usr/local/bin:/usr/sbin:/usr/bin:/sbin:/bin\n\
             SHELL=/bin/sh\nUSER=root\nLOGNAME=root\nHOME=/root\n"
        );
    }

    #[test]
    fn test_declared_vars_skip_defaults() {
        let env = vec![EnvVar::new("HOME", "/srv"), EnvVar::new("FOO", "bar")];
        let out = render_env(&env, 0);
        assert_eq!(
            out,
            b"PATH=/usr/local/sbin:/usr/local/bin:/usr/sbin:/usr/bin:/sbin:/bin\0\
              SHELL=/bin/sh\0USER=root\0LOGNAME=root\0HOME=/srv\0FOO=bar\0"
                .to_vec()
        );
    }

    #[test]
    fn test_write_env_file() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let layout = PodLayout::new(temp_dir.path());
        let mut app = RuntimeApp {
            name: "web".into(),
            ..Default::default()
        };
        app.app.environment.push(EnvVar::new("A", "1"));

        let path = write_env_file(&layout, &app, b'\n', &UidRange::blank()).unwrap();
        assert_eq!(path, layout.env_file("web"));
        assert!(std::fs::read_to_string(path).unwrap().ends_with("HOME=/root\nA=1\n"));
    }

    #[test]
    fn test_write_env_file_shifted() {
        use std::os::unix::fs::MetadataExt;

        if unsafe { libc::geteuid() } != 0 {
            return;
        }
        let temp_dir = tempfile::TempDir::new().unwrap();
        let layout = PodLayout::new(temp_dir.path());
        let app = RuntimeApp {
            name: "web".into(),
            ..Default::default()
        };
        let range = UidRange::new(300_000, 65_536);

        let path = write_env_file(&layout, &app, b'\n', &range).unwrap();

        for p in [path, layout.env_dir()] {
            let meta = std::fs::metadata(&p).unwrap();
            assert_eq!((meta.uid(), meta.gid()), (300_000, 300_000), "{}", p.display());
        }
    }
}
