//! User-namespace ownership range.

use crate::error::{ManifestError, PodliteError, PodliteResult, ResolveError};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Host-side offset of a user-namespace mapping.
///
/// `count == 0` is the blank range: ids are used as-is and nothing is chowned.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UidRange {
    pub shift: u32,
    pub count: u32,
}

impl UidRange {
    /// No shifting (host-native execution).
    pub const fn blank() -> Self {
        Self { shift: 0, count: 0 }
    }

    pub const fn new(shift: u32, count: u32) -> Self {
        Self { shift, count }
    }

    /// Whether files written for the pod must be chowned.
    pub fn is_shifted(&self) -> bool {
        self.shift != 0 && self.count != 0
    }

    /// Container id → host id.
    pub fn shift_id(&self, id: u32) -> PodliteResult<u32> {
        if self.count == 0 {
            return Ok(id);
        }
        if id >= self.count {
            return Err(self.out_of_range(id));
        }
        self.shift
            .checked_add(id)
            .ok_or_else(|| self.out_of_range(id))
    }

    /// Host id → container id.
    pub fn unshift_id(&self, id: u32) -> PodliteResult<u32> {
        if self.count == 0 {
            return Ok(id);
        }
        match id.checked_sub(self.shift) {
            Some(inner) if inner < self.count => Ok(inner),
            _ => Err(self.out_of_range(id)),
        }
    }

    fn out_of_range(&self, id: u32) -> PodliteError {
        ResolveError::IdOutOfRange {
            id,
            range: self.to_string(),
        }
        .into()
    }
}

impl FromStr for UidRange {
    type Err = PodliteError;

    /// Parses `"shift:count"`; the empty string is the blank range.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Ok(Self::blank());
        }
        let invalid = || PodliteError::from(ManifestError::InvalidUidRange(s.to_string()));
        let (shift, count) = s.split_once(':').ok_or_else(invalid)?;
        let shift = shift.parse::<u32>().map_err(|_| invalid())?;
        let count = count.parse::<u32>().map_err(|_| invalid())?;
        if shift.checked_add(count).is_none() {
            return Err(invalid());
        }
        Ok(Self { shift, count })
    }
}

impl std::fmt::Display for UidRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.shift, self.count)
    }
}
