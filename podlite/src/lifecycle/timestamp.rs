//! Where lifecycle timestamps come from.
//!
//! Markers carry their timestamps in filesystem metadata. The state machine
//! only sees a [`TimestampSource`], so a written-timestamp format can replace
//! mtimes later without touching it.

use crate::error::{PodliteError, PodliteResult};
use chrono::{DateTime, Utc};
use std::path::Path;

/// Produces the timestamp recorded by a marker path.
pub trait TimestampSource: Send + Sync {
    /// Timestamp of `path`, or `None` if the marker does not exist.
    fn timestamp(&self, path: &Path) -> PodliteResult<Option<DateTime<Utc>>>;
}

/// Modification time of the marker.
#[derive(Clone, Copy, Debug, Default)]
pub struct MtimeSource;

impl TimestampSource for MtimeSource {
    fn timestamp(&self, path: &Path) -> PodliteResult<Option<DateTime<Utc>>> {
        let metadata = match std::fs::metadata(path) {
            Ok(m) => m,
            // Marker not written (yet)
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(PodliteError::io("stat marker", path, e)),
        };
        let modified = metadata
            .modified()
            .map_err(|e| PodliteError::io("read mtime", path, e))?;
        Ok(Some(DateTime::<Utc>::from(modified)))
    }
}

/// Nanoseconds since the Unix epoch, saturating outside the `i64` range.
pub fn unix_nanos(ts: &DateTime<Utc>) -> i64 {
    ts.timestamp_nanos_opt().unwrap_or(if ts.timestamp() < 0 {
        i64::MIN
    } else {
        i64::MAX
    })
}
