//! podlite: turns a pod manifest into a bootable stage1 tree.
//!
//! Preparation ([`Stage1`]) resolves each app's identity, binary, mounts and
//! capabilities and writes the sysusers fragments, env files and systemd
//! units stage1 boots, returning the systemd-nspawn arguments. Status queries
//! ([`lifecycle`]) read the markers a running pod leaves on disk and never
//! block on a live pod.
//!
//! ```ignore
//! let pod = Pod::load(pod_dir, uuid)?;
//! let prepared = Stage1::new(&pod).with_options(PrepareOptions::default()).prepare()?;
//! supervisor.spawn("systemd-nspawn", &prepared.args)?;
//!
//! for app in apps_for_pod(data_dir, &uuid.to_string(), None)? {
//!     println!("{} {}", app.name, app.state);
//! }
//! ```

#[cfg(not(target_os = "linux"))]
compile_error!("podlite only supports Linux");

pub mod capabilities;
pub mod error;
pub mod identity;
pub mod lifecycle;
pub mod logging;
pub mod mounts;
pub mod options;
pub mod pod;
pub mod sandbox;
pub mod stage1;
pub mod util;

pub use error::{ManifestError, PodliteError, PodliteResult, ResolveError, SecurityError};
pub use identity::UidRange;
pub use lifecycle::{AppInfo, AppState, PodStatus, apps_for_pod, pod_status};
pub use options::{InsecureOptions, PrepareOptions};
pub use pod::{Pod, PodLayout, PodManifest, PodPhase};
pub use stage1::{PreparedApp, PreparedPod, Stage1};
