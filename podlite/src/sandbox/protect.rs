//! Restricted `/proc` and `/sys` visibility for app services.

use crate::pod::layout::rel_app_rootfs;
use crate::sandbox::unit::{UnitFile, UnitOption};

/// Mounted read-only inside the app.
pub const READ_ONLY_PATHS: &[&str] = &[
    "/proc/bus/",
    "/proc/sys/kernel/core_pattern",
    "/proc/sys/kernel/modprobe",
    "/proc/sys/vm/panic_on_oom",
    "/proc/sysrq-trigger",
    "/sys/block/",
    "/sys/bus/",
    "/sys/class/",
    "/sys/dev/",
    "/sys/devices/",
    "/sys/kernel/",
];

/// Hidden from the app entirely.
pub const HIDDEN_PATHS: &[&str] = &[
    "/sys/firmware/",
    "/sys/fs/",
    "/sys/hypervisor/",
    "/sys/module/",
    "/sys/power/",
];

/// `-<app rootfs><path>`; the leading `-` tells systemd to ignore missing paths.
fn optional_app_path(app: &str, path: &str) -> String {
    let root = rel_app_rootfs(app);
    format!(
        "-{}/{}",
        root.display(),
        path.trim_start_matches('/').trim_end_matches('/')
    )
}

/// Append `InaccessibleDirectories=` then `ReadOnlyDirectories=` entries.
pub fn protect_system_files(unit: &mut UnitFile, app: &str) {
    for path in HIDDEN_PATHS {
        unit.push(UnitOption::new(
            "Service",
            "InaccessibleDirectories",
            optional_app_path(app, path),
        ));
    }
    for path in READ_ONLY_PATHS {
        unit.push(UnitOption::new(
            "Service",
            "ReadOnlyDirectories",
            optional_app_path(app, path),
        ));
    }
}
