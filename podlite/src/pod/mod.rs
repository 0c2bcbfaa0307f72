//! Pod model: manifest, directory layout, phase and locking.

pub mod layout;
pub mod lock;
pub mod manifest;
pub mod phase;

pub use layout::{DataLayout, PodLayout};
pub use lock::{PodLock, is_locked};
pub use manifest::{
    Annotation, App, EnvVar, ImageRef, Isolator, Mount, MountPoint, PodManifest, RuntimeApp,
    Volume, VolumeKind,
};
pub use phase::PodPhase;

use crate::error::{PodliteError, PodliteResult};
use crate::identity::UidRange;
use crate::lifecycle::timestamp::TimestampSource;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// A pod directory together with its parsed manifest.
#[derive(Clone, Debug)]
pub struct Pod {
    uuid: Uuid,
    layout: PodLayout,
    phase: PodPhase,
    manifest: PodManifest,
    uid_range: UidRange,
}

impl Pod {
    /// Open a pod by UUID, searching every phase directory under `data_dir`.
    pub fn open(data_dir: &Path, uuid: &str) -> PodliteResult<Self> {
        let parsed = Uuid::parse_str(uuid).map_err(|_| PodliteError::InvalidUuid(uuid.into()))?;
        let data_dir = std::path::absolute(data_dir)
            .map_err(|e| PodliteError::io("resolve data dir", data_dir, e))?;
        let data = DataLayout::new(data_dir);

        let (phase, root) = phase::locate(&data, &parsed.to_string())?;
        let layout = PodLayout::new(root);
        let manifest = PodManifest::load(&layout.manifest_path())?;

        tracing::debug!(uuid = %parsed, phase = %phase, "Opened pod");

        Ok(Self {
            uuid: parsed,
            layout,
            phase,
            manifest,
            uid_range: UidRange::blank(),
        })
    }

    /// Load the pod being prepared at `root`.
    ///
    /// The caller must hold the pod's exclusive lock.
    pub fn load(root: impl AsRef<Path>, uuid: Uuid) -> PodliteResult<Self> {
        let root = root.as_ref();
        let root =
            std::path::absolute(root).map_err(|e| PodliteError::io("resolve pod dir", root, e))?;
        let layout = PodLayout::new(root);
        let manifest = PodManifest::load(&layout.manifest_path())?;
        Ok(Self::from_parts(uuid, layout, PodPhase::Preparing, manifest))
    }

    /// Assemble a pod from already-loaded parts.
    pub fn from_parts(
        uuid: Uuid,
        layout: PodLayout,
        phase: PodPhase,
        manifest: PodManifest,
    ) -> Self {
        Self {
            uuid,
            layout,
            phase,
            manifest,
            uid_range: UidRange::blank(),
        }
    }

    /// Set the user-namespace range used for ownership shifting.
    pub fn with_uid_range(mut self, uid_range: UidRange) -> Self {
        self.uid_range = uid_range;
        self
    }

    pub fn uuid(&self) -> &Uuid {
        &self.uuid
    }

    pub fn layout(&self) -> &PodLayout {
        &self.layout
    }

    pub fn phase(&self) -> PodPhase {
        self.phase
    }

    pub fn manifest(&self) -> &PodManifest {
        &self.manifest
    }

    pub fn uid_range(&self) -> &UidRange {
        &self.uid_range
    }

    /// When the pod was marked for garbage collection.
    pub fn gc_marked_time(
        &self,
        source: &dyn TimestampSource,
    ) -> PodliteResult<Option<DateTime<Utc>>> {
        if !self.phase.is_garbage() {
            return Ok(None);
        }
        source.timestamp(self.layout.root())
    }

    /// Supervisor PID, if the pid file has been written.
    pub fn pid(&self) -> PodliteResult<Option<u32>> {
        let path = self.layout.pid_path();
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(PodliteError::io("read pid file", &path, e)),
        };
        // Written by the supervisor after start; may still be empty
        if content.trim().is_empty() {
            return Ok(None);
        }
        content
            .trim()
            .parse::<u32>()
            .map(Some)
            .map_err(|_| PodliteError::parse("pid", &path, content.trim()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::timestamp::MtimeSource;
    use tempfile::TempDir;

    fn write_pod(data_dir: &Path, phase_dir: &str, uuid: &Uuid) -> PathBuf {
        let root = DataLayout::new(data_dir)
            .phase_dir(phase_dir)
            .join(uuid.to_string());
        std::fs::create_dir_all(&root).unwrap();
        std::fs::write(root.join(layout::dirs::MANIFEST_FILE), br#"{"apps": []}"#).unwrap();
        root
    }

    #[test]
    fn test_open_locates_phase() {
        let temp_dir = TempDir::new().unwrap();
        let uuid = Uuid::new_v4();
        write_pod(temp_dir.path(), layout::dirs::PREPARED_DIR, &uuid);

        let pod = Pod::open(temp_dir.path(), &uuid.to_string()).unwrap();
        assert_eq!(pod.phase(), PodPhase::Prepared);
        assert_eq!(pod.uuid(), &uuid);
        assert!(pod.manifest().apps.is_empty());
    }

    #[test]
    fn test_open_rejects_bad_uuid() {
        let temp_dir = TempDir::new().unwrap();
        let err = Pod::open(temp_dir.path(), "not-a-uuid").unwrap_err();
        assert!(matches!(err, PodliteError::InvalidUuid(_)));
    }

    #[test]
    fn test_pid() {
        let temp_dir = TempDir::new().unwrap();
        let uuid = Uuid::new_v4();
        let root = write_pod(temp_dir.path(), layout::dirs::RUN_DIR, &uuid);
        let pod = Pod::open(temp_dir.path(), &uuid.to_string()).unwrap();

        assert_eq!(pod.pid().unwrap(), None);

        std::fs::write(root.join("pid"), "4242\n").unwrap();
        assert_eq!(pod.pid().unwrap(), Some(4242));

        std::fs::write(root.join("pid"), "abc").unwrap();
        assert!(matches!(pod.pid(), Err(PodliteError::Parse { .. })));
    }

    #[test]
    fn test_gc_marked_time_only_for_garbage() {
        let temp_dir = TempDir::new().unwrap();
        let uuid = Uuid::new_v4();
        write_pod(temp_dir.path(), layout::dirs::RUN_DIR, &uuid);
        let pod = Pod::open(temp_dir.path(), &uuid.to_string()).unwrap();
        assert_eq!(pod.phase(), PodPhase::Exited);
        assert!(pod.gc_marked_time(&MtimeSource).unwrap().is_none());

        let uuid = Uuid::new_v4();
        write_pod(temp_dir.path(), layout::dirs::EXITED_GARBAGE_DIR, &uuid);
        let pod = Pod::open(temp_dir.path(), &uuid.to_string()).unwrap();
        assert!(pod.gc_marked_time(&MtimeSource).unwrap().is_some());
    }
}
