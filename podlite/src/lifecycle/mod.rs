//! Pod and app lifecycle state, derived purely from on-disk markers.

pub mod state;
pub mod status;
pub mod timestamp;

pub use state::{AppState, AppStateProbe, app_state, probe_app_state, read_exit_code};
pub use status::{
    AppInfo, MountInfo, PodStatus, app_info, apps_for_pod, exit_statuses, pod_apps, pod_status,
};
pub use timestamp::{MtimeSource, TimestampSource, unix_nanos};
