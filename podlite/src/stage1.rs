//! Stage1 preparation driver.
//!
//! Walks the apps of a pod in manifest order and writes everything stage1's
//! systemd needs to run them, then renders the nspawn launch arguments.
//! Preparation must run under the pod's exclusive lock. A failed preparation
//! leaves a half-written pod that is discarded, never resumed.

use crate::capabilities::{app_capabilities, app_no_new_privileges};
use crate::error::{ManifestError, PodliteResult};
use crate::identity::{resolve_user_group, write_sysusers};
use crate::mounts::{
    BindMount, DeviceAllow, find_bin_path, generate_device_allows, prepare_mountpoints,
    resolve_bind_mounts,
};
use crate::options::PrepareOptions;
use crate::pod::layout::rel_app_rootfs;
use crate::pod::{Pod, RuntimeApp};
use crate::sandbox::{
    AppUnitConfig, app_unit, pod_to_nspawn_args, write_app_reaper, write_app_unit,
    write_env_file,
};
use std::path::PathBuf;
use std::time::Instant;

/// Artifacts written for one app.
#[derive(Clone, Debug)]
pub struct PreparedApp {
    pub name: String,
    pub uid: u32,
    pub gid: u32,
    /// In-app path that `ExecStart=` runs.
    pub bin_path: PathBuf,
    pub binds: Vec<BindMount>,
    pub device_allows: Vec<DeviceAllow>,
    pub sysusers_file: PathBuf,
    pub env_file: PathBuf,
    pub unit_file: PathBuf,
    pub reaper_file: PathBuf,
}

/// Outcome of a successful preparation.
#[derive(Clone, Debug)]
pub struct PreparedPod {
    /// systemd-nspawn arguments, in launch order.
    pub args: Vec<String>,
    pub apps: Vec<PreparedApp>,
}

/// Prepares one pod's stage1 tree.
pub struct Stage1<'a> {
    pod: &'a Pod,
    options: PrepareOptions,
}

impl<'a> Stage1<'a> {
    pub fn new(pod: &'a Pod) -> Self {
        Self {
            pod,
            options: PrepareOptions::default(),
        }
    }

    pub fn with_options(mut self, options: PrepareOptions) -> Self {
        self.options = options;
        self
    }

    /// Write every app's artifacts and build the launch arguments.
    pub fn prepare(&self) -> PodliteResult<PreparedPod> {
        let start = Instant::now();
        let manifest = self.pod.manifest();
        manifest.validate()?;

        tracing::info!(
            uuid = %self.pod.uuid(),
            root = %self.pod.layout().root().display(),
            apps = manifest.apps.len(),
            "Preparing pod"
        );

        let mut apps = Vec::with_capacity(manifest.apps.len());
        for app in &manifest.apps {
            apps.push(self.prepare_app(app)?);
        }

        let args = pod_to_nspawn_args(self.pod, &self.options.insecure)?;

        tracing::info!(
            uuid = %self.pod.uuid(),
            args = args.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Pod prepared"
        );

        Ok(PreparedPod { args, apps })
    }

    fn prepare_app(&self, app: &RuntimeApp) -> PodliteResult<PreparedApp> {
        let layout = self.pod.layout();
        let volumes = &self.pod.manifest().volumes;
        let uid_range = self.pod.uid_range();
        let app_root = layout.app_rootfs(&app.name);
        let workdir = app.app.working_dir();

        let bin = app
            .app
            .exec
            .first()
            .ok_or_else(|| ManifestError::MissingExec(app.name.clone()))?;

        let (uid, gid) = resolve_user_group(&app_root, &app.app, uid_range)?;
        let sysusers_file = write_sysusers(layout, app, uid, gid, uid_range)?;

        let bin_path = find_bin_path(&app_root, &app.app, workdir, bin)?;
        let env_file = write_env_file(layout, app, self.options.env_separator, uid_range)?;

        let binds = resolve_bind_mounts(layout, app, volumes)?;
        for bind in &binds {
            if let Some(volume) = volumes.iter().find(|v| v.name == bind.volume) {
                prepare_mountpoints(layout, bind, volume, uid_range)?;
            }
        }
        let device_allows = generate_device_allows(layout, &binds, volumes, uid_range)?;

        let capabilities = app_capabilities(&app.app.isolators)?;
        let config = AppUnitConfig {
            uid,
            gid,
            bin_path: &bin_path,
            capabilities: &capabilities,
            no_new_privileges: app_no_new_privileges(&app.app.isolators),
            device_allows: &device_allows,
            insecure: &self.options.insecure,
        };
        let unit = app_unit(app, &config)?;
        let unit_file = write_app_unit(layout, app, &unit, uid_range)?;

        let reaper_file = write_app_reaper(
            layout,
            &app.name,
            &rel_app_rootfs(&app.name),
            &bin_path,
            &self.options.reaper_script,
            uid_range,
        )?;

        tracing::info!(
            app = %app.name,
            uid,
            gid,
            bin = %bin_path.display(),
            binds = binds.len(),
            "Prepared app"
        );

        Ok(PreparedApp {
            name: app.name.clone(),
            uid,
            gid,
            bin_path,
            binds,
            device_allows,
            sysusers_file,
            env_file,
            unit_file,
            reaper_file,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PodliteError;
    use crate::pod::{PodLayout, PodManifest, PodPhase};
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;
    use uuid::Uuid;

    fn pod_with_app(root: &std::path::Path, exec: Vec<String>) -> Pod {
        let mut manifest = PodManifest::default();
        let mut app = RuntimeApp {
            name: "web".into(),
            ..Default::default()
        };
        app.app.exec = exec;
        manifest.apps.push(app);
        Pod::from_parts(Uuid::new_v4(), PodLayout::new(root), PodPhase::Preparing, manifest)
    }

    #[test]
    fn test_prepare_writes_app_artifacts() {
        let temp_dir = TempDir::new().unwrap();
        let pod = pod_with_app(temp_dir.path(), vec!["/bin/run".into(), "--fast".into()]);
        let bin = pod.layout().app_rootfs("web").join("bin/run");
        std::fs::create_dir_all(bin.parent().unwrap()).unwrap();
        std::fs::write(&bin, "#!/bin/sh\n").unwrap();
        std::fs::set_permissions(&bin, std::fs::Permissions::from_mode(0o755)).unwrap();

        let prepared = Stage1::new(&pod).prepare().unwrap();
        let app = &prepared.apps[0];

        assert_eq!((app.uid, app.gid), (0, 0));
        assert_eq!(app.bin_path, PathBuf::from("/bin/run"));
        assert!(app.sysusers_file.is_file());
        assert!(app.env_file.is_file());
        assert!(app.reaper_file.is_file());

        let unit = std::fs::read_to_string(&app.unit_file).unwrap();
        assert!(unit.contains("ExecStart=\"/bin/run\" \"--fast\"\n"));
        assert!(unit.contains("CapabilityBoundingSet="));

        assert_eq!(prepared.args[0], format!("--uuid={}", pod.uuid()));
        assert!(prepared.args.last().unwrap().starts_with("--capability=CAP_"));
    }

    #[test]
    fn test_prepare_rejects_empty_exec() {
        let temp_dir = TempDir::new().unwrap();
        let pod = pod_with_app(temp_dir.path(), vec![]);

        assert!(matches!(
            Stage1::new(&pod).prepare(),
            Err(PodliteError::Manifest(ManifestError::MissingExec(_)))
        ));
    }
}
