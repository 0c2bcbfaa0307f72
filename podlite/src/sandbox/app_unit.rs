//! Per-app service unit run by systemd inside stage1.

use crate::capabilities::join_capabilities;
use crate::error::{ManifestError, PodliteResult};
use crate::identity::UidRange;
use crate::mounts::DeviceAllow;
use crate::options::InsecureOptions;
use crate::pod::layout::{reaper_unit_name, rel_app_rootfs, rel_env_file};
use crate::pod::{PodLayout, RuntimeApp};
use crate::sandbox::protect::protect_system_files;
use crate::sandbox::quote::quote_exec;
use crate::sandbox::unit::UnitFile;
use crate::util::create_dir_and_shift;
use caps::Capability;
use std::path::{Path, PathBuf};

/// Resolved values an app unit is rendered from.
#[derive(Clone, Debug)]
pub struct AppUnitConfig<'a> {
    pub uid: u32,
    pub gid: u32,
    /// Absolute in-app path of `exec[0]`.
    pub bin_path: &'a Path,
    pub capabilities: &'a [Capability],
    pub no_new_privileges: bool,
    pub device_allows: &'a [DeviceAllow],
    pub insecure: &'a InsecureOptions,
}

/// Build `<app>.service`.
pub fn app_unit(app: &RuntimeApp, config: &AppUnitConfig<'_>) -> PodliteResult<UnitFile> {
    let name = app.name.as_str();

    let mut exec = app.app.exec.clone();
    match exec.first_mut() {
        Some(bin) => *bin = config.bin_path.display().to_string(),
        None => return Err(ManifestError::MissingExec(name.to_string()).into()),
    }

    let mut unit = UnitFile::new()
        .option(
            "Unit",
            "Description",
            format!("Application={name} Image={}", app.image.name),
        )
        .option("Unit", "DefaultDependencies", "false")
        .option("Unit", "Wants", reaper_unit_name(name))
        .option("Service", "Restart", "no")
        .option("Service", "ExecStart", quote_exec(&exec)?)
        .option(
            "Service",
            "RootDirectory",
            rel_app_rootfs(name).display().to_string(),
        )
        .option("Service", "WorkingDirectory", app.app.working_dir())
        .option(
            "Service",
            "EnvironmentFile",
            rel_env_file(name).display().to_string(),
        )
        .option("Service", "User", config.uid.to_string())
        .option("Service", "Group", config.gid.to_string());

    if !app.app.supplementary_gids.is_empty() {
        let gids: Vec<String> = app
            .app
            .supplementary_gids
            .iter()
            .map(|g| g.to_string())
            .collect();
        unit = unit.option("Service", "SupplementaryGroups", gids.join(" "));
    }

    unit = unit.option(
        "Service",
        "NoNewPrivileges",
        if config.no_new_privileges { "true" } else { "false" },
    );

    if !config.insecure.disable_capabilities {
        unit = unit.option(
            "Service",
            "CapabilityBoundingSet",
            join_capabilities(config.capabilities, " "),
        );
    }

    for allow in config.device_allows {
        unit = unit.option("Service", "DeviceAllow", allow.to_string());
    }

    if !config.insecure.disable_paths {
        protect_system_files(&mut unit, name);
    }

    Ok(unit)
}

/// Write `<app>.service` into the stage1 units directory.
pub fn write_app_unit(
    layout: &PodLayout,
    app: &RuntimeApp,
    unit: &UnitFile,
    uid_range: &UidRange,
) -> PodliteResult<PathBuf> {
    create_dir_and_shift(&layout.units_dir(), 0o755, uid_range)?;

    let path = layout.app_unit_file(&app.name);
    unit.write(&path, uid_range)?;

    tracing::debug!(app = %app.name, path = %path.display(), "Wrote app unit");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::DEFAULT_CAPABILITIES;
    use crate::error::PodliteError;

    fn web_app() -> RuntimeApp {
        let mut app = RuntimeApp {
            name: "web".into(),
            ..Default::default()
        };
        app.image.name = "example.com/web".into();
        app.app.exec = vec!["httpd".into(), "-p".into(), "$PORT".into()];
        app.app.supplementary_gids = vec![10, 20];
        app
    }

    #[test]
    fn test_app_unit_contents() {
        let insecure = InsecureOptions::secure();
        let allows = [DeviceAllow {
            path: "/dev/.rkt/disk".into(),
            read_only: true,
        }];
        let config = AppUnitConfig {
            uid: 1000,
            gid: 100,
            bin_path: Path::new("/usr/sbin/httpd"),
            capabilities: &DEFAULT_CAPABILITIES[..2],
            no_new_privileges: true,
            device_allows: &allows,
            insecure: &insecure,
        };

        let unit = app_unit(&web_app(), &config).unwrap();
        let text = unit.serialize();

        assert!(text.starts_with(
            "[Unit]\nDescription=Application=web Image=example.com/web\n\
             DefaultDependencies=false\nWants=reaper-web.service\n\n[Service]\n"
        ));
        assert!(text.contains("ExecStart=\"/usr/sbin/httpd\" \"-p\" \"$$PORT\"\n"));
        assert!(text.contains("RootDirectory=/opt/stage2/web/rootfs\n"));
        assert!(text.contains("EnvironmentFile=/rkt/env/web\n"));
        assert!(text.contains("User=1000\nGroup=100\nSupplementaryGroups=10 20\n"));
        assert!(text.contains("NoNewPrivileges=true\n"));
        assert!(text.contains("CapabilityBoundingSet=CAP_AUDIT_WRITE CAP_CHOWN\n"));
        assert!(text.contains("DeviceAllow=/dev/.rkt/disk r\n"));
        assert!(text.contains("InaccessibleDirectories=-/opt/stage2/web/rootfs/sys/firmware\n"));
    }

    #[test]
    fn test_insecure_options_drop_entries() {
        let insecure = InsecureOptions::insecure_all();
        let config = AppUnitConfig {
            uid: 0,
            gid: 0,
            bin_path: Path::new("/bin/httpd"),
            capabilities: &DEFAULT_CAPABILITIES,
            no_new_privileges: false,
            device_allows: &[],
            insecure: &insecure,
        };

        let text = app_unit(&web_app(), &config).unwrap().serialize();
        assert!(!text.contains("CapabilityBoundingSet="));
        assert!(!text.contains("InaccessibleDirectories="));
        assert!(!text.contains("ReadOnlyDirectories="));
    }

    #[test]
    fn test_missing_exec() {
        let insecure = InsecureOptions::secure();
        let config = AppUnitConfig {
            uid: 0,
            gid: 0,
            bin_path: Path::new("/bin/sh"),
            capabilities: &[],
            no_new_privileges: false,
            device_allows: &[],
            insecure: &insecure,
        };
        let app = RuntimeApp {
            name: "empty".into(),
            ..Default::default()
        };
        let err = app_unit(&app, &config).unwrap_err();
        assert!(matches!(
            err,
            PodliteError::Manifest(ManifestError::MissingExec(_))
        ));
    }
}
