//! Integration tests for gocache

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::path::Path;
    use tempfile::TempDir;

    /// Command isolated from the surrounding CI job
    fn gocache(dir: &Path) -> Command {
        let mut cmd = cargo_bin_cmd!("gocache");
        cmd.current_dir(dir)
            .env_remove("GITHUB_ACTIONS")
            .env_remove("GITHUB_REPOSITORY")
            .env_remove("BORINGCACHE_DEFAULT_WORKSPACE")
            .env_remove("INPUT_WORKSPACE")
            .env_remove("INPUT_GOCACHEPROG")
            .env_remove("RUST_LOG")
            .env("GOCACHE_STATE_FILE", dir.join("job.json"))
            .env("GOCACHE_CONFIG", dir.join("config.toml"));
        cmd
    }

    #[test]
    fn help_displays() {
        let dir = TempDir::new().unwrap();
        gocache(dir.path())
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("Go toolchain and build cache steps"));
    }

    #[test]
    fn version_displays() {
        let dir = TempDir::new().unwrap();
        gocache(dir.path())
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("gocache"));
    }

    #[test]
    fn restore_requires_workspace() {
        let dir = TempDir::new().unwrap();
        gocache(dir.path())
            .arg("restore")
            .assert()
            .failure()
            .stderr(predicate::str::contains("Workspace required"));
    }

    #[test]
    fn restore_rejects_invalid_config() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("config.toml"), "[proxy\nready = ").unwrap();

        gocache(dir.path())
            .args(["restore", "--workspace", "org/proj"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid configuration"));
    }

    #[test]
    fn save_without_workspace_is_a_no_op() {
        let dir = TempDir::new().unwrap();
        gocache(dir.path()).arg("save").assert().success();
    }

    #[test]
    fn save_never_fails_the_job() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("config.toml"),
            "[cli]\nbinary = \"/nonexistent/boringcache\"\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("job.json"),
            r#"{
                "state": {
                    "stateVersion": "1",
                    "workspace": "org/proj",
                    "goVersion": "1.23.4",
                    "cacheTagPrefix": "proj",
                    "modulesTag": "proj-go-modules",
                    "buildTag": "proj-go-build-1.23"
                }
            }"#,
        )
        .unwrap();

        gocache(dir.path()).arg("save").assert().success();
    }

    #[test]
    fn save_ignores_unknown_state_version() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("job.json"),
            r#"{"state": {"stateVersion": "9", "workspace": "org/proj", "modulesTag": "x"}}"#,
        )
        .unwrap();

        gocache(dir.path()).arg("save").assert().success();
    }
}
