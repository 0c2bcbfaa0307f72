//! systemd-nspawn launch arguments for a prepared pod.
//!
//! Order is part of the contract with the supervisor:
//!
//! ```text
//! --uuid=<uuid> --machine=rkt-<uuid> --directory=<stage1 rootfs>
//! per app: --bind[-ro]=<src>:<tgt>:<rbind|norbind>... --capability=<c1,c2,...>
//! --capability=all            (only when capabilities are disabled)
//! ```

use crate::capabilities::{app_capabilities, join_capabilities};
use crate::error::PodliteResult;
use crate::mounts::{BindMount, resolve_bind_mounts};
use crate::options::InsecureOptions;
use crate::pod::{Pod, RuntimeApp};
use caps::Capability;
use std::path::Path;
use uuid::Uuid;

/// Prefix of the machine name registered with systemd-machined.
pub const MACHINE_PREFIX: &str = "rkt-";

/// Machine name of a pod.
pub fn machine_name(uuid: &Uuid) -> String {
    format!("{MACHINE_PREFIX}{uuid}")
}

/// Builder for nspawn arguments.
#[derive(Debug, Clone, Default)]
pub struct NspawnArgs {
    args: Vec<String>,
}

impl NspawnArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pod identity and machine name.
    pub fn with_identity(mut self, uuid: &Uuid) -> Self {
        self.args.push(format!("--uuid={uuid}"));
        self.args.push(format!("--machine={}", machine_name(uuid)));
        self
    }

    /// Root directory nspawn boots.
    pub fn directory(mut self, stage1_rootfs: impl AsRef<Path>) -> Self {
        self.args
            .push(format!("--directory={}", stage1_rootfs.as_ref().display()));
        self
    }

    /// One bind mount.
    pub fn bind(mut self, mount: &BindMount) -> Self {
        let flag = if mount.read_only { "--bind-ro=" } else { "--bind=" };
        let mode = if mount.recursive { "rbind" } else { "norbind" };
        self.args.push(format!(
            "{flag}{}:{}:{mode}",
            mount.source.display(),
            mount.target.display()
        ));
        self
    }

    /// Capability set of one app.
    pub fn capabilities(mut self, caps: &[Capability]) -> Self {
        self.args
            .push(format!("--capability={}", join_capabilities(caps, ",")));
        self
    }

    /// Grant every capability.
    pub fn all_capabilities(mut self) -> Self {
        self.args.push("--capability=all".to_string());
        self
    }

    /// Append pre-rendered arguments.
    pub fn extend(mut self, args: impl IntoIterator<Item = String>) -> Self {
        self.args.extend(args);
        self
    }

    /// Get the arguments as a vector.
    pub fn build(self) -> Vec<String> {
        self.args
    }
}

/// Bind and capability arguments of one app.
pub fn app_to_nspawn_args(
    pod: &Pod,
    app: &RuntimeApp,
    insecure: &InsecureOptions,
) -> PodliteResult<Vec<String>> {
    let binds = resolve_bind_mounts(pod.layout(), app, &pod.manifest().volumes)?;

    let mut args = NspawnArgs::new();
    for bind in &binds {
        args = args.bind(bind);
    }

    if !insecure.disable_capabilities {
        let caps = app_capabilities(&app.app.isolators)?;
        args = args.capabilities(&caps);
    }

    Ok(args.build())
}

/// Full launch argument list of a pod.
pub fn pod_to_nspawn_args(pod: &Pod, insecure: &InsecureOptions) -> PodliteResult<Vec<String>> {
    let mut args = NspawnArgs::new()
        .with_identity(pod.uuid())
        .directory(pod.layout().stage1_rootfs());

    for app in &pod.manifest().apps {
        args = args.extend(app_to_nspawn_args(pod, app, insecure)?);
    }

    if insecure.disable_capabilities {
        args = args.all_capabilities();
    }

    Ok(args.build())
}
