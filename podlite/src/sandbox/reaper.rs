//! Per-app reaper service.
//!
//! The reaper does nothing while the pod runs. On shutdown its `ExecStop=`
//! runs the reaper script, which records the app's exit status. It is
//! ordered after `shutdown.service` and conflicts with the power-state
//! targets so it is stopped last.

use crate::error::PodliteResult;
use crate::identity::UidRange;
use crate::pod::PodLayout;
use crate::sandbox::unit::UnitFile;
use crate::util::create_dir_and_shift;
use std::path::{Path, PathBuf};

/// Build the reaper unit for `app`.
pub fn reaper_unit(app: &str, app_root_rel: &Path, bin_path: &Path, reaper_script: &str) -> UnitFile {
    UnitFile::new()
        .option("Unit", "Description", format!("{app} Reaper"))
        .option("Unit", "DefaultDependencies", "false")
        .option("Unit", "StopWhenUnneeded", "yes")
        .option("Unit", "Wants", "shutdown.service")
        .option("Unit", "After", "shutdown.service")
        .option("Unit", "Conflicts", "exit.target")
        .option("Unit", "Conflicts", "halt.target")
        .option("Unit", "Conflicts", "poweroff.target")
        .option("Service", "RemainAfterExit", "yes")
        .option(
            "Service",
            "ExecStop",
            format!(
                "{reaper_script} \"{app}\" \"{}\" \"{}\"",
                app_root_rel.display(),
                bin_path.display()
            ),
        )
}

/// Write `reaper-<app>.service` into the stage1 units directory.
pub fn write_app_reaper(
    layout: &PodLayout,
    app: &str,
    app_root_rel: &Path,
    bin_path: &Path,
    reaper_script: &str,
    uid_range: &UidRange,
) -> PodliteResult<PathBuf> {
    create_dir_and_shift(&layout.units_dir(), 0o755, uid_range)?;

    let path = layout.reaper_unit_file(app);
    reaper_unit(app, app_root_rel, bin_path, reaper_script).write(&path, uid_range)?;

    tracing::debug!(app, path = %path.display(), "Wrote reaper unit");
    Ok(path)
}
