//! Status queries over pods and their apps.

use crate::error::{ManifestError, PodliteResult};
use crate::lifecycle::state::{AppState, probe_app_state, read_exit_code};
use crate::lifecycle::timestamp::{MtimeSource, TimestampSource, unix_nanos};
use crate::pod::{Annotation, Pod, PodPhase, RuntimeApp, VolumeKind};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;

/// A mount point of an app, cross-referenced to its volume.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MountInfo {
    pub name: String,
    pub container_path: String,
    pub host_path: String,
    pub read_only: bool,
}

/// Status of one app.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AppInfo {
    pub name: String,
    pub state: AppState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    pub image_id: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub mounts: Vec<MountInfo>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<Annotation>,
}

impl AppInfo {
    /// Creation time in nanoseconds since the Unix epoch.
    pub fn created_at_nanos(&self) -> Option<i64> {
        self.created_at.as_ref().map(unix_nanos)
    }

    pub fn started_at_nanos(&self) -> Option<i64> {
        self.started_at.as_ref().map(unix_nanos)
    }

    pub fn finished_at_nanos(&self) -> Option<i64> {
        self.finished_at.as_ref().map(unix_nanos)
    }
}

fn app_mounts(pod: &Pod, app: &RuntimeApp) -> PodliteResult<Vec<MountInfo>> {
    let manifest = pod.manifest();
    let mut mounts = Vec::with_capacity(app.app.mount_points.len());

    for mp in &app.app.mount_points {
        let volume = manifest
            .volume(&mp.name)
            .ok_or_else(|| ManifestError::MissingVolume {
                app: app.name.clone(),
                volume: mp.name.clone(),
            })?;

        let host_path = match volume.kind {
            VolumeKind::Empty => pod
                .layout()
                .shared_volume(&volume.name)
                .display()
                .to_string(),
            _ => volume.source.clone(),
        };

        mounts.push(MountInfo {
            name: mp.name.clone(),
            container_path: mp.path.clone(),
            host_path,
            // Either side asking for read-only wins here, unlike the bind rule
            read_only: mp.read_only || volume.read_only.unwrap_or(false),
        });
    }

    Ok(mounts)
}

/// Status of one app of `pod`.
pub fn app_info(
    pod: &Pod,
    app: &RuntimeApp,
    source: &dyn TimestampSource,
) -> PodliteResult<AppInfo> {
    let mounts = app_mounts(pod, app)?;
    let probe = probe_app_state(pod, &app.name, source)?;

    Ok(AppInfo {
        name: app.name.clone(),
        state: probe.state,
        created_at: probe.created_at,
        started_at: probe.started_at,
        finished_at: probe.finished_at,
        exit_code: probe.exit_code,
        image_id: app.image.id.clone(),
        mounts,
        annotations: app.annotations.clone(),
    })
}

/// Status of the apps of an opened pod, optionally only `app_name`.
///
/// An app whose status cannot be determined is logged and left out.
pub fn pod_apps(
    pod: &Pod,
    app_name: Option<&str>,
    source: &dyn TimestampSource,
) -> PodliteResult<Vec<AppInfo>> {
    if let Some(name) = app_name
        && pod.manifest().app(name).is_none()
    {
        return Err(ManifestError::AppNotFound(name.to_string()).into());
    }

    let mut apps = Vec::new();
    for app in &pod.manifest().apps {
        if app_name.is_some_and(|name| name != app.name) {
            continue;
        }
        match app_info(pod, app, source) {
            Ok(info) => apps.push(info),
            Err(e) => {
                tracing::warn!(uuid = %pod.uuid(), app = %app.name, error = %e, "Cannot get app status");
            }
        }
    }
    Ok(apps)
}

/// Status of the apps of pod `uuid` under `data_dir`.
pub fn apps_for_pod(
    data_dir: &Path,
    uuid: &str,
    app_name: Option<&str>,
) -> PodliteResult<Vec<AppInfo>> {
    let pod = Pod::open(data_dir, uuid)?;
    pod_apps(&pod, app_name, &MtimeSource)
}

/// Pod-level status.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PodStatus {
    pub uuid: String,
    pub phase: PodPhase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    pub exited: bool,
    /// Exit codes of apps that wrote one, in manifest order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub app_exit_codes: Vec<(String, i32)>,
}

/// Exit codes of every app with a readable exit marker.
pub fn exit_statuses(pod: &Pod) -> Vec<(String, i32)> {
    pod.manifest()
        .apps
        .iter()
        .filter_map(|app| {
            read_exit_code(&pod.layout().exited_marker(&app.name))
                .ok()
                .map(|code| (app.name.clone(), code))
        })
        .collect()
}

/// Phase, timestamps, pid and exit codes of `pod`.
///
/// Created time is the manifest's timestamp, start time the pid file's.
pub fn pod_status(pod: &Pod, source: &dyn TimestampSource) -> PodliteResult<PodStatus> {
    let layout = pod.layout();
    let phase = pod.phase();

    let created_at = source.timestamp(&layout.manifest_path())?;
    let started_at = source.timestamp(&layout.pid_path())?;

    let pid = if phase.has_pid() { pod.pid()? } else { None };
    let app_exit_codes = if phase.has_pid() && phase != PodPhase::Running {
        exit_statuses(pod)
    } else {
        Vec::new()
    };

    Ok(PodStatus {
        uuid: pod.uuid().to_string(),
        phase,
        created_at,
        started_at,
        pid,
        exited: matches!(phase, PodPhase::Exited | PodPhase::ExitedGarbage),
        app_exit_codes,
    })
}
