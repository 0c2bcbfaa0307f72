//! App lifecycle state, reconstructed from marker files.
//!
//! ```text
//! unknown ──appsinfo/<app>/──→ created ──<app>-started──→ running ──status/<app>──→ exited
//! ```
//!
//! Each state is evidenced by one marker and timestamped by it. States only
//! move forward; a probe racing with the supervisor at worst sees an older
//! state.

use crate::error::{PodliteError, PodliteResult};
use crate::lifecycle::timestamp::{MtimeSource, TimestampSource};
use crate::pod::Pod;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Lifecycle state of one app.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppState {
    /// No marker yet.
    Unknown,

    /// App-info directory exists.
    Created,

    /// Started marker exists.
    Running,

    /// Exit status written, or the pod was torn down underneath the app.
    Exited,
}

impl AppState {
    pub fn is_exited(&self) -> bool {
        matches!(self, AppState::Exited)
    }

    /// Check if transition to target state is valid (forward only).
    pub fn can_transition_to(&self, target: AppState) -> bool {
        target > *self
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AppState::Unknown => "unknown",
            AppState::Created => "created",
            AppState::Running => "running",
            AppState::Exited => "exited",
        }
    }
}

impl std::str::FromStr for AppState {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unknown" => Ok(AppState::Unknown),
            "created" => Ok(AppState::Created),
            "running" => Ok(AppState::Running),
            "exited" => Ok(AppState::Exited),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of probing one app's markers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppStateProbe {
    pub state: AppState,
    pub created_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub exit_code: Option<i32>,
}

impl AppStateProbe {
    fn unknown() -> Self {
        Self {
            state: AppState::Unknown,
            created_at: None,
            started_at: None,
            finished_at: None,
            exit_code: None,
        }
    }

    fn advance(&mut self, target: AppState) {
        if self.state.can_transition_to(target) {
            self.state = target;
        }
    }
}

/// Decimal exit code of an exit marker; surrounding whitespace is ignored.
pub fn read_exit_code(path: &Path) -> PodliteResult<i32> {
    let content =
        std::fs::read_to_string(path).map_err(|e| PodliteError::io("read exit status", path, e))?;
    content
        .trim()
        .parse::<i32>()
        .map_err(|_| PodliteError::parse("exit code", path, content.trim()))
}

fn probe_markers(
    pod: &Pod,
    app: &str,
    source: &dyn TimestampSource,
    probe: &mut AppStateProbe,
) -> PodliteResult<()> {
    let layout = pod.layout();

    let Some(created) = source.timestamp(&layout.appsinfo_dir(app))? else {
        return Ok(());
    };
    probe.advance(AppState::Created);
    probe.created_at = Some(created);

    let Some(started) = source.timestamp(&layout.started_marker(app))? else {
        return Ok(());
    };
    probe.advance(AppState::Running);
    probe.started_at = Some(started);

    let exited_marker = layout.exited_marker(app);
    let Some(finished) = source.timestamp(&exited_marker)? else {
        return Ok(());
    };
    probe.advance(AppState::Exited);
    probe.finished_at = Some(finished);
    probe.exit_code = Some(read_exit_code(&exited_marker)?);

    Ok(())
}

/// Probe the lifecycle state of `app` in `pod`.
///
/// If the pod is past its run phase and the app never wrote an exit
/// marker, the app is reported `exited` without exit code, finished at the
/// pod's garbage-collection mark time when known.
pub fn probe_app_state(
    pod: &Pod,
    app: &str,
    source: &dyn TimestampSource,
) -> PodliteResult<AppStateProbe> {
    let mut probe = AppStateProbe::unknown();
    probe_markers(pod, app, source, &mut probe)?;

    if pod.phase().after_run() && !probe.state.is_exited() {
        probe.state = AppState::Exited;
        probe.exit_code = None;
        probe.finished_at = match pod.gc_marked_time(source) {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!(app, error = %e, "Cannot get GC marked time");
                None
            }
        };
        tracing::debug!(app, phase = %pod.phase(), "App forced to exited by pod teardown");
    }

    Ok(probe)
}

/// Current state of `app`, using file modification times.
pub fn app_state(pod: &Pod, app: &str) -> PodliteResult<AppState> {
    probe_app_state(pod, app, &MtimeSource).map(|probe| probe.state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_only_transitions() {
        use AppState::*;
        assert!(Unknown.can_transition_to(Created));
        assert!(Created.can_transition_to(Exited));
        assert!(Running.can_transition_to(Exited));
        assert!(!Running.can_transition_to(Created));
        assert!(!Exited.can_transition_to(Running));
        assert!(!Exited.can_transition_to(Exited));
    }

    #[test]
    fn test_state_strings() {
        for state in [
            AppState::Unknown,
            AppState::Created,
            AppState::Running,
            AppState::Exited,
        ] {
            assert_eq!(state.as_str().parse::<AppState>(), Ok(state));
        }
        assert_eq!(
            serde_json::to_string(&AppState::Running).unwrap(),
            "\"running\""
        );
        assert!("stopped".parse::<AppState>().is_err());
    }

    #[test]
    fn test_read_exit_code() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("web");

        std::fs::write(&path, " 42\n").unwrap();
        assert_eq!(read_exit_code(&path).unwrap(), 42);

        std::fs::write(&path, "-1").unwrap();
        assert_eq!(read_exit_code(&path).unwrap(), -1);

        std::fs::write(&path, "crashed").unwrap();
        assert!(matches!(
            read_exit_code(&path),
            Err(PodliteError::Parse { .. })
        ));
    }

    /// Reports a fixed time for every existing path.
    struct FixedSource(DateTime<Utc>);

    impl TimestampSource for FixedSource {
        fn timestamp(&self, path: &Path) -> PodliteResult<Option<DateTime<Utc>>> {
            Ok(path.exists().then_some(self.0))
        }
    }

    fn pod_in(root: &Path, phase: crate::pod::PodPhase) -> Pod {
        Pod::from_parts(
            uuid::Uuid::new_v4(),
            crate::pod::PodLayout::new(root),
            phase,
            crate::pod::PodManifest::default(),
        )
    }

    #[test]
    fn test_probe_follows_markers() {
        use crate::pod::PodPhase;
        let temp_dir = tempfile::TempDir::new().unwrap();
        let pod = pod_in(temp_dir.path(), PodPhase::Running);
        let layout = pod.layout().clone();
        let source = FixedSource(DateTime::from_timestamp(1_700_000_000, 0).unwrap());

        assert_eq!(
            probe_app_state(&pod, "web", &source).unwrap().state,
            AppState::Unknown
        );

        std::fs::create_dir_all(layout.appsinfo_dir("web")).unwrap();
        let probe = probe_app_state(&pod, "web", &source).unwrap();
        assert_eq!(probe.state, AppState::Created);
        assert_eq!(probe.created_at, Some(source.0));
        assert_eq!(probe.started_at, None);

        std::fs::create_dir_all(layout.status_dir()).unwrap();
        std::fs::write(layout.started_marker("web"), "").unwrap();
        assert_eq!(
            probe_app_state(&pod, "web", &source).unwrap().state,
            AppState::Running
        );

        std::fs::write(layout.exited_marker("web"), "3\n").unwrap();
        let probe = probe_app_state(&pod, "web", &source).unwrap();
        assert_eq!(probe.state, AppState::Exited);
        assert_eq!(probe.exit_code, Some(3));
        assert_eq!(probe.finished_at, Some(source.0));
    }

    #[test]
    fn test_garbage_pod_forces_exit() {
        use crate::pod::PodPhase;
        let temp_dir = tempfile::TempDir::new().unwrap();
        let pod = pod_in(temp_dir.path(), PodPhase::Garbage);
        let source = FixedSource(DateTime::from_timestamp(1_700_000_500, 0).unwrap());

        let probe = probe_app_state(&pod, "web", &source).unwrap();
        assert_eq!(probe.state, AppState::Exited);
        assert_eq!(probe.exit_code, None);
        assert_eq!(probe.finished_at, Some(source.0));
    }

    #[test]
    fn test_bad_exit_marker_is_an_error() {
        use crate::pod::PodPhase;
        let temp_dir = tempfile::TempDir::new().unwrap();
        let pod = pod_in(temp_dir.path(), PodPhase::Exited);
        let layout = pod.layout();
        std::fs::create_dir_all(layout.appsinfo_dir("web")).unwrap();
        std::fs::create_dir_all(layout.status_dir()).unwrap();
        std::fs::write(layout.started_marker("web"), "").unwrap();
        std::fs::write(layout.exited_marker("web"), "oops").unwrap();

        assert!(app_state(&pod, "web").is_err());
    }
}
