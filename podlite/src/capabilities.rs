//! Effective Linux capability set of an app.
//!
//! Derived from the app's isolators:
//! - no capability isolator: [`DEFAULT_CAPABILITIES`]
//! - retain set: exactly the retained capabilities
//! - remove set: the defaults minus the removed ones, default order kept
//!
//! Retain and remove sets are mutually exclusive.

use crate::error::{ManifestError, PodliteResult};
use crate::pod::Isolator;
use caps::Capability;

/// Capabilities granted when the manifest says nothing.
pub const DEFAULT_CAPABILITIES: [Capability; 14] = [
    Capability::CAP_AUDIT_WRITE,
    Capability::CAP_CHOWN,
    Capability::CAP_DAC_OVERRIDE,
    Capability::CAP_FSETID,
    Capability::CAP_FOWNER,
    Capability::CAP_KILL,
    Capability::CAP_MKNOD,
    Capability::CAP_NET_RAW,
    Capability::CAP_NET_BIND_SERVICE,
    Capability::CAP_SETUID,
    Capability::CAP_SETGID,
    Capability::CAP_SETPCAP,
    Capability::CAP_SETFCAP,
    Capability::CAP_SYS_CHROOT,
];

/// Parse a capability name such as `CAP_NET_ADMIN` (case-insensitive).
pub fn parse_capability(name: &str) -> PodliteResult<Capability> {
    name.trim()
        .to_ascii_uppercase()
        .parse::<Capability>()
        .map_err(|_| ManifestError::UnknownCapability(name.to_string()).into())
}

/// Compute the ordered capability set for an app.
pub fn app_capabilities(isolators: &[Isolator]) -> PodliteResult<Vec<Capability>> {
    let mut retain: Vec<&str> = Vec::new();
    let mut remove: Vec<&str> = Vec::new();

    for isolator in isolators {
        match isolator {
            Isolator::CapabilitiesRetainSet(set) => retain.extend(set.iter().map(String::as_str)),
            Isolator::CapabilitiesRemoveSet(set) => remove.extend(set.iter().map(String::as_str)),
            _ => {}
        }
    }

    match (retain.is_empty(), remove.is_empty()) {
        (false, false) => Err(ManifestError::ConflictingCapabilitySets.into()),
        (true, true) => Ok(DEFAULT_CAPABILITIES.to_vec()),
        (false, true) => retain.into_iter().map(parse_capability).collect(),
        (true, false) => {
            let removed = remove
                .into_iter()
                .map(parse_capability)
                .collect::<PodliteResult<Vec<_>>>()?;
            Ok(DEFAULT_CAPABILITIES
                .iter()
                .copied()
                .filter(|c| !removed.contains(c))
                .collect())
        }
    }
}

/// Whether any no-new-privileges isolator is set to true.
pub fn app_no_new_privileges(isolators: &[Isolator]) -> bool {
    isolators
        .iter()
        .any(|i| matches!(i, Isolator::NoNewPrivileges(true)))
}

/// Render capabilities joined by `sep`, e.g. `CAP_CHOWN,CAP_KILL`.
pub fn join_capabilities(caps: &[Capability], sep: &str) -> String {
    caps.iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join(sep)
}
