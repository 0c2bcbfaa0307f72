//! Integration tests for stage1 preparation.
//!
//! Each test builds a pod under a temporary data directory, runs
//! [`Stage1::prepare`] and checks the written artifacts and launch arguments.

use podlite::capabilities::{DEFAULT_CAPABILITIES, join_capabilities};
use podlite::pod::layout::dirs;
use podlite::{InsecureOptions, Pod, PodliteError, PrepareOptions, Stage1};
use podlite_test_utils::PodFixture;
use serde_json::json;

// ============================================================================
// TEST FIXTURES
// ============================================================================

fn web_pod(fixture: &PodFixture, source: &str) -> Pod {
    fixture.write_manifest(&json!({
        "acKind": "PodManifest",
        "acVersion": "0.8.11",
        "apps": [{
            "name": "web",
            "image": { "name": "example.com/web", "id": "sha512-0123" },
            "app": {
                "exec": ["/bin/server", "--port", "$PORT"],
                "mountPoints": [{ "name": "data", "path": "/data" }]
            }
        }],
        "volumes": [
            { "name": "data", "kind": "host", "source": source, "recursive": false }
        ]
    }));
    fixture.make_executable("web", "/bin/server");
    Pod::load(fixture.root(), fixture.uuid()).unwrap()
}

// ============================================================================
// LAUNCH ARGUMENTS
// ============================================================================

#[test]
fn prepare_renders_exact_nspawn_args() {
    let fixture = PodFixture::new(dirs::PREPARE_DIR);
    let source = fixture.host_dir("data");
    let pod = web_pod(&fixture, source.to_str().unwrap());

    let prepared = Stage1::new(&pod).prepare().unwrap();

    let uuid = fixture.uuid();
    assert_eq!(
        prepared.args,
        vec![
            format!("--uuid={uuid}"),
            format!("--machine=rkt-{uuid}"),
            format!("--directory={}", fixture.layout().stage1_rootfs().display()),
            format!(
                "--bind={}:/opt/stage2/web/rootfs/data:norbind",
                source.display()
            ),
            format!(
                "--capability={}",
                join_capabilities(&DEFAULT_CAPABILITIES, ",")
            ),
        ]
    );
}

#[test]
fn prepare_with_capabilities_disabled_grants_all() {
    let fixture = PodFixture::new(dirs::PREPARE_DIR);
    let source = fixture.host_dir("data");
    let pod = web_pod(&fixture, source.to_str().unwrap());

    let prepared = Stage1::new(&pod)
        .with_options(PrepareOptions::default().with_insecure(InsecureOptions::insecure_all()))
        .prepare()
        .unwrap();

    assert_eq!(prepared.args.last().unwrap(), "--capability=all");
    assert_eq!(
        prepared
            .args
            .iter()
            .filter(|a| a.starts_with("--capability="))
            .count(),
        1
    );

    let unit = std::fs::read_to_string(fixture.layout().app_unit_file("web")).unwrap();
    assert!(!unit.contains("CapabilityBoundingSet="));
    assert!(!unit.contains("InaccessibleDirectories="));
}

// ============================================================================
// WRITTEN ARTIFACTS
// ============================================================================

#[test]
fn prepare_writes_units_env_and_sysusers() {
    let fixture = PodFixture::new(dirs::PREPARE_DIR);
    let source = fixture.host_dir("data");
    let pod = web_pod(&fixture, source.to_str().unwrap());
    let layout = fixture.layout();

    Stage1::new(&pod).prepare().unwrap();

    let unit = std::fs::read_to_string(layout.app_unit_file("web")).unwrap();
    assert!(unit.starts_with(
        "[Unit]\nDescription=Application=web Image=example.com/web\n\
         DefaultDependencies=false\nWants=reaper-web.service\n\n[Service]\n"
    ));
    assert!(unit.contains("ExecStart=\"/bin/server\" \"--port\" \"$$PORT\"\n"));
    assert!(unit.contains("RootDirectory=/opt/stage2/web/rootfs\n"));
    assert!(unit.contains("WorkingDirectory=/\n"));
    assert!(unit.contains("EnvironmentFile=/rkt/env/web\n"));
    assert!(unit.contains("User=0\nGroup=0\n"));
    assert!(unit.contains(
        "InaccessibleDirectories=-/opt/stage2/web/rootfs/sys/firmware\n"
    ));

    let reaper = std::fs::read_to_string(layout.reaper_unit_file("web")).unwrap();
    assert!(reaper.contains("Description=web Reaper\n"));

    let env = std::fs::read_to_string(layout.env_file("web")).unwrap();
    assert!(env.starts_with("PATH="));
    assert!(env.ends_with("HOME=/root\n"));

    let sysusers = std::fs::read_to_string(layout.sysusers_file("web")).unwrap();
    assert_eq!(sysusers, "g gen0 0\nu gen0 0 \"gen0\"\n");

    // The missing mount target is created inside the app rootfs.
    assert!(layout.app_rootfs("web").join("data").is_dir());
}

#[test]
fn prepare_resolves_named_user_from_image() {
    let fixture = PodFixture::new(dirs::PREPARE_DIR);
    fixture.write_manifest(&json!({
        "apps": [{
            "name": "worker",
            "app": {
                "exec": ["run"],
                "user": "daemon",
                "group": "staff",
                "supplementaryGIDs": [27],
                "environment": [{ "name": "PATH", "value": "/opt/bin" }]
            }
        }]
    }));
    fixture.write_file(
        "worker",
        "/etc/passwd",
        "root:x:0:0:root:/root:/bin/sh\ndaemon:x:2:2:daemon:/sbin:/sbin/nologin\n",
    );
    fixture.write_file("worker", "/etc/group", "root:x:0:\nstaff:x:50:\n");
    fixture.make_executable("worker", "/opt/bin/run");
    let pod = Pod::load(fixture.root(), fixture.uuid()).unwrap();

    let prepared = Stage1::new(&pod).prepare().unwrap();
    let app = &prepared.apps[0];

    assert_eq!((app.uid, app.gid), (2, 50));
    assert_eq!(app.bin_path.to_str(), Some("/opt/bin/run"));

    let sysusers = std::fs::read_to_string(&app.sysusers_file).unwrap();
    assert_eq!(sysusers, "g gen27 27\ng gen50 50\nu gen2 2 \"gen2\"\n");

    let unit = std::fs::read_to_string(&app.unit_file).unwrap();
    assert!(unit.contains("User=2\nGroup=50\nSupplementaryGroups=27\n"));
}

// ============================================================================
// FAILURES
// ============================================================================

#[test]
fn prepare_rejects_mount_target_escaping_app_root() {
    let fixture = PodFixture::new(dirs::PREPARE_DIR);
    let source = fixture.host_dir("data");
    fixture.symlink("web", "/data", "../../../../..");
    let pod = web_pod(&fixture, source.to_str().unwrap());

    let err = Stage1::new(&pod).prepare().unwrap_err();
    assert!(err.is_security(), "unexpected error: {err}");
}

#[test]
fn prepare_reports_missing_binary() {
    let fixture = PodFixture::new(dirs::PREPARE_DIR);
    fixture.write_manifest(&json!({
        "apps": [{ "name": "web", "app": { "exec": ["nope"] } }]
    }));
    fixture.app_rootfs("web");
    let pod = Pod::load(fixture.root(), fixture.uuid()).unwrap();

    let err = Stage1::new(&pod).prepare().unwrap_err();
    assert!(matches!(err, PodliteError::Resolve(_)), "unexpected error: {err}");
}

#[test]
fn prepare_rejects_conflicting_capability_sets() {
    let fixture = PodFixture::new(dirs::PREPARE_DIR);
    fixture.write_manifest(&json!({
        "apps": [{
            "name": "web",
            "app": {
                "exec": ["/bin/server"],
                "isolators": [
                    { "name": "os/linux/capabilities-retain-set", "value": { "set": ["CAP_KILL"] } },
                    { "name": "os/linux/capabilities-remove-set", "value": { "set": ["CAP_CHOWN"] } }
                ]
            }
        }]
    }));
    fixture.make_executable("web", "/bin/server");
    let pod = Pod::load(fixture.root(), fixture.uuid()).unwrap();

    let err = Stage1::new(&pod).prepare().unwrap_err();
    assert!(matches!(err, PodliteError::Manifest(_)), "unexpected error: {err}");
}
