use std::path::{Path, PathBuf};

/// Directory structure constants
pub mod dirs {
    /// Subdirectory of the data dir holding all pods
    pub const PODS_DIR: &str = "pods";

    /// Pods being prepared
    pub const PREPARE_DIR: &str = "prepare";

    /// Prepared pods waiting to run
    pub const PREPARED_DIR: &str = "prepared";

    /// Running (or exited, lock released) pods
    pub const RUN_DIR: &str = "run";

    /// Exited pods marked for garbage collection
    pub const EXITED_GARBAGE_DIR: &str = "exited-garbage";

    /// Aborted pods marked for garbage collection
    pub const GARBAGE_DIR: &str = "garbage";

    /// Pod manifest file
    pub const MANIFEST_FILE: &str = "pod";

    /// Supervisor PID file
    pub const PID_FILE: &str = "pid";

    /// Per-app created markers
    pub const APPSINFO_DIR: &str = "appsinfo";

    /// Backing directories for `empty` volumes
    pub const SHARED_VOLUMES_DIR: &str = "sharedVolumes";

    /// Stage-1 rootfs, relative to the pod root
    pub const STAGE1_ROOTFS_DIR: &str = "stage1/rootfs";

    /// App rootfs parent inside stage1
    pub const STAGE2_DIR: &str = "opt/stage2";

    /// systemd-sysusers fragments inside stage1
    pub const SYSUSERS_DIR: &str = "usr/lib/sysusers.d";

    /// Unit files inside stage1
    pub const UNITS_DIR: &str = "usr/lib/systemd/system";

    /// App env files inside stage1
    pub const ENV_DIR: &str = "rkt/env";

    /// Device volume staging links inside stage1
    pub const VOLUME_LINKS_DIR: &str = "rkt/volumes";

    /// App status markers inside stage1
    pub const STATUS_DIR: &str = "rkt/status";

    /// Where device links appear inside the container
    pub const DEVICE_LINKS_DIR: &str = "/dev/.rkt";
}

// ============================================================================
// DATA LAYOUT (data directory)
// ============================================================================

/// Layout of the data directory holding every pod generation.
#[derive(Clone, Debug)]
pub struct DataLayout {
    data_dir: PathBuf,
}

impl DataLayout {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// All pods: {data}/pods
    pub fn pods_dir(&self) -> PathBuf {
        self.data_dir.join(dirs::PODS_DIR)
    }

    /// One phase directory: {data}/pods/{phase}
    pub fn phase_dir(&self, phase_dir: &str) -> PathBuf {
        self.pods_dir().join(phase_dir)
    }
}

// ============================================================================
// POD LAYOUT (per-pod directory)
// ============================================================================

/// Filesystem layout of a single pod directory.
///
/// ```text
/// {pod}/
/// ├── pod                      manifest
/// ├── pid
/// ├── appsinfo/{app}/          created marker
/// ├── sharedVolumes/{volume}/
/// └── stage1/rootfs/
///     ├── opt/stage2/{app}/rootfs/
///     ├── usr/lib/sysusers.d/{app}.conf
///     ├── usr/lib/systemd/system/{app}.service, reaper-{app}.service
///     └── rkt/{env,volumes,status}/
/// ```
#[derive(Clone, Debug)]
pub struct PodLayout {
    root: PathBuf,
}

impl PodLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.root.join(dirs::MANIFEST_FILE)
    }

    pub fn pid_path(&self) -> PathBuf {
        self.root.join(dirs::PID_FILE)
    }

    /// Created marker: {pod}/appsinfo/{app}
    pub fn appsinfo_dir(&self, app: &str) -> PathBuf {
        self.root.join(dirs::APPSINFO_DIR).join(app)
    }

    pub fn shared_volumes_dir(&self) -> PathBuf {
        self.root.join(dirs::SHARED_VOLUMES_DIR)
    }

    /// Backing directory of an `empty` volume
    pub fn shared_volume(&self, volume: &str) -> PathBuf {
        self.shared_volumes_dir().join(volume)
    }

    pub fn stage1_rootfs(&self) -> PathBuf {
        self.root.join(dirs::STAGE1_ROOTFS_DIR)
    }

    /// Host path of an app's rootfs
    pub fn app_rootfs(&self, app: &str) -> PathBuf {
        self.stage1_rootfs().join(dirs::STAGE2_DIR).join(app).join("rootfs")
    }

    pub fn sysusers_dir(&self) -> PathBuf {
        self.stage1_rootfs().join(dirs::SYSUSERS_DIR)
    }

    pub fn sysusers_file(&self, app: &str) -> PathBuf {
        self.sysusers_dir().join(format!("{app}.conf"))
    }

    pub fn units_dir(&self) -> PathBuf {
        self.stage1_rootfs().join(dirs::UNITS_DIR)
    }

    pub fn app_unit_file(&self, app: &str) -> PathBuf {
        self.units_dir().join(service_unit_name(app))
    }

    pub fn reaper_unit_file(&self, app: &str) -> PathBuf {
        self.units_dir().join(reaper_unit_name(app))
    }

    pub fn env_dir(&self) -> PathBuf {
        self.stage1_rootfs().join(dirs::ENV_DIR)
    }

    pub fn env_file(&self, app: &str) -> PathBuf {
        self.env_dir().join(app)
    }

    pub fn volume_links_dir(&self) -> PathBuf {
        self.stage1_rootfs().join(dirs::VOLUME_LINKS_DIR)
    }

    pub fn status_dir(&self) -> PathBuf {
        self.stage1_rootfs().join(dirs::STATUS_DIR)
    }

    /// Running marker: {stage1}/rkt/status/{app}-started
    pub fn started_marker(&self, app: &str) -> PathBuf {
        self.status_dir().join(format!("{app}-started"))
    }

    /// Exit marker: {stage1}/rkt/status/{app}
    pub fn exited_marker(&self, app: &str) -> PathBuf {
        self.status_dir().join(app)
    }
}

// ============================================================================
// STAGE1-RELATIVE PATHS
// ============================================================================

/// App rootfs as seen from inside stage1: /opt/stage2/{app}/rootfs
pub fn rel_app_rootfs(app: &str) -> PathBuf {
    Path::new("/").join(dirs::STAGE2_DIR).join(app).join("rootfs")
}

/// Env file as seen from inside stage1: /rkt/env/{app}
pub fn rel_env_file(app: &str) -> PathBuf {
    Path::new("/").join(dirs::ENV_DIR).join(app)
}

/// Join an absolute in-app path under a base without discarding the base.
pub fn join_under(base: &Path, path: &Path) -> PathBuf {
    base.join(path.strip_prefix("/").unwrap_or(path))
}

pub fn service_unit_name(app: &str) -> String {
    format!("{app}.service")
}

pub fn reaper_unit_name(app: &str) -> String {
    format!("reaper-{app}.service")
}
