//! Test fixtures for podlite integration tests.
//!
//! [`PodFixture`] builds a throwaway data directory with a single pod in it,
//! plus helpers to populate app rootfs trees and lifecycle markers.

use filetime::FileTime;
use podlite::pod::layout::dirs;
use podlite::pod::{DataLayout, PodLayout};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use uuid::Uuid;

/// A pod directory under a temporary data directory.
pub struct PodFixture {
    temp_dir: TempDir,
    uuid: Uuid,
    root: PathBuf,
}

impl PodFixture {
    /// Create an empty pod in `phase_dir` (one of [`dirs`]' phase names).
    pub fn new(phase_dir: &str) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let uuid = Uuid::new_v4();
        let root = DataLayout::new(temp_dir.path())
            .phase_dir(phase_dir)
            .join(uuid.to_string());
        std::fs::create_dir_all(&root).expect("Failed to create pod dir");
        Self {
            temp_dir,
            uuid,
            root,
        }
    }

    pub fn data_dir(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn layout(&self) -> PodLayout {
        PodLayout::new(&self.root)
    }

    /// Scratch directory next to the data dir, for host volume sources.
    pub fn host_dir(&self, name: &str) -> PathBuf {
        let dir = self.temp_dir.path().join("host").join(name);
        std::fs::create_dir_all(&dir).expect("Failed to create host dir");
        dir
    }

    pub fn write_manifest(&self, manifest: &serde_json::Value) {
        let content = serde_json::to_vec_pretty(manifest).expect("Failed to encode manifest");
        std::fs::write(self.root.join(dirs::MANIFEST_FILE), content)
            .expect("Failed to write manifest");
    }

    pub fn write_pid(&self, pid: u32) {
        std::fs::write(self.root.join(dirs::PID_FILE), format!("{pid}\n"))
            .expect("Failed to write pid");
    }

    /// Host path of an app's rootfs, created if missing.
    pub fn app_rootfs(&self, app: &str) -> PathBuf {
        let rootfs = self.layout().app_rootfs(app);
        std::fs::create_dir_all(&rootfs).expect("Failed to create app rootfs");
        rootfs
    }

    /// Write `contents` at in-app `path`, creating parents.
    pub fn write_file(&self, app: &str, path: &str, contents: &str) -> PathBuf {
        let host = self.app_rootfs(app).join(path.trim_start_matches('/'));
        if let Some(parent) = host.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent dir");
        }
        std::fs::write(&host, contents).expect("Failed to write file");
        host
    }

    /// Install an executable script at in-app `path`.
    pub fn make_executable(&self, app: &str, path: &str) -> PathBuf {
        let host = self.write_file(app, path, "#!/bin/sh\n");
        std::fs::set_permissions(&host, std::fs::Permissions::from_mode(0o755))
            .expect("Failed to chmod");
        host
    }

    /// Create a symlink at in-app `link` with the literal `target`.
    pub fn symlink(&self, app: &str, link: &str, target: &str) {
        let host = self.app_rootfs(app).join(link.trim_start_matches('/'));
        if let Some(parent) = host.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent dir");
        }
        std::os::unix::fs::symlink(target, &host).expect("Failed to create symlink");
    }

    pub fn mark_created(&self, app: &str) -> PathBuf {
        let marker = self.layout().appsinfo_dir(app);
        std::fs::create_dir_all(&marker).expect("Failed to create appsinfo dir");
        marker
    }

    pub fn mark_started(&self, app: &str) -> PathBuf {
        let marker = self.layout().started_marker(app);
        self.write_marker(&marker, "")
    }

    pub fn mark_exited(&self, app: &str, code: i32) -> PathBuf {
        let marker = self.layout().exited_marker(app);
        self.write_marker(&marker, &format!("{code}\n"))
    }

    fn write_marker(&self, marker: &Path, contents: &str) -> PathBuf {
        std::fs::create_dir_all(self.layout().status_dir()).expect("Failed to create status dir");
        std::fs::write(marker, contents).expect("Failed to write marker");
        marker.to_path_buf()
    }

    /// Set the mtime of `path` to `unix_secs`.
    pub fn set_mtime(&self, path: &Path, unix_secs: i64) {
        filetime::set_file_mtime(path, FileTime::from_unix_time(unix_secs, 0))
            .expect("Failed to set mtime");
    }

    /// Rename the pod into another phase directory.
    pub fn move_to(&mut self, phase_dir: &str) {
        let target = DataLayout::new(self.temp_dir.path())
            .phase_dir(phase_dir)
            .join(self.uuid.to_string());
        std::fs::create_dir_all(target.parent().expect("pod dir has a parent"))
            .expect("Failed to create phase dir");
        std::fs::rename(&self.root, &target).expect("Failed to move pod");
        self.root = target;
    }
}
