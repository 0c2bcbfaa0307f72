//! Pod phase, derived from which data-dir subdirectory holds the pod.
//!
//! ```text
//! prepare/ → prepared/ → run/ ──(lock released)──→ exited-garbage/
//!     └──────────(aborted)─────────────────────────→ garbage/
//! ```

use super::layout::{DataLayout, dirs};
use super::lock;
use crate::error::{PodliteError, PodliteResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Coarse lifecycle phase of a pod.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PodPhase {
    /// In `prepare/`, stage1 being rendered.
    Preparing,
    /// In `prepared/`, waiting to be run.
    Prepared,
    /// In `run/` with the supervisor holding the pod lock.
    Running,
    /// In `run/` but nobody holds the lock anymore.
    Exited,
    /// Exited and marked for garbage collection.
    ExitedGarbage,
    /// Never ran, marked for garbage collection.
    Garbage,
}

impl PodPhase {
    /// Whether the pod has progressed past its active-run phase.
    ///
    /// Apps of such a pod can no longer change state; any app without an
    /// exit marker was killed without a clean shutdown.
    pub fn after_run(&self) -> bool {
        matches!(
            self,
            PodPhase::Exited | PodPhase::ExitedGarbage | PodPhase::Garbage
        )
    }

    /// Whether the pod has been marked for garbage collection.
    pub fn is_garbage(&self) -> bool {
        matches!(self, PodPhase::ExitedGarbage | PodPhase::Garbage)
    }

    /// Whether the supervisor PID is meaningful for this phase.
    pub fn has_pid(&self) -> bool {
        matches!(
            self,
            PodPhase::Running | PodPhase::Exited | PodPhase::ExitedGarbage
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PodPhase::Preparing => "preparing",
            PodPhase::Prepared => "prepared",
            PodPhase::Running => "running",
            PodPhase::Exited => "exited",
            PodPhase::ExitedGarbage => "exited-garbage",
            PodPhase::Garbage => "garbage",
        }
    }
}

impl std::fmt::Display for PodPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Phase directories in lifecycle order.
///
/// Searching in this order finds a pod even if it is renamed forward between
/// two probes.
const SEARCH_ORDER: [&str; 5] = [
    dirs::PREPARE_DIR,
    dirs::PREPARED_DIR,
    dirs::RUN_DIR,
    dirs::EXITED_GARBAGE_DIR,
    dirs::GARBAGE_DIR,
];

/// Find a pod directory and derive its phase.
pub fn locate(data: &DataLayout, uuid: &str) -> PodliteResult<(PodPhase, PathBuf)> {
    for dir in SEARCH_ORDER {
        let path = data.phase_dir(dir).join(uuid);
        if !path.is_dir() {
            continue;
        }

        let phase = match dir {
            dirs::PREPARE_DIR => PodPhase::Preparing,
            dirs::PREPARED_DIR => PodPhase::Prepared,
            dirs::RUN_DIR => match lock::is_locked(&path) {
                Ok(true) => PodPhase::Running,
                Ok(false) => PodPhase::Exited,
                // Renamed to exited-garbage between the two probes
                Err(_) if !path.exists() => continue,
                Err(e) => return Err(e),
            },
            dirs::EXITED_GARBAGE_DIR => PodPhase::ExitedGarbage,
            _ => PodPhase::Garbage,
        };

        tracing::trace!(uuid, phase = %phase, path = %path.display(), "Located pod");
        return Ok((phase, path));
    }

    Err(PodliteError::PodNotFound(uuid.to_string()))
}
