//! Integration tests for leo-setup

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use tempfile::TempDir;

    /// Binary isolated from the user's config and any local overrides
    fn leo_setup(config_dir: &TempDir) -> Command {
        let mut cmd = cargo_bin_cmd!("leo-setup");
        cmd.env("LEO_SETUP_CONFIG", config_dir.path().join("config.toml"))
            .env_remove("LEO_VERSION")
            .env_remove("LEO_SETUP_TOOLCHAIN")
            .env_remove("GITHUB_OUTPUT")
            .arg("--no-local");
        cmd
    }

    #[test]
    fn help_displays() {
        let dir = TempDir::new().unwrap();
        leo_setup(&dir)
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("build and cache the Leo compiler"));
    }

    #[test]
    fn version_displays() {
        let dir = TempDir::new().unwrap();
        leo_setup(&dir)
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("leo-setup"));
    }

    #[test]
    fn keys_prints_both_tiers() {
        let dir = TempDir::new().unwrap();
        leo_setup(&dir)
            .args(["keys", "v3.4.0", "--os", "Linux", "--arch", "amd64"])
            .assert()
            .success()
            .stdout(predicate::str::contains(
                "binary-key=leo-binary-v3.4.0-linux-x86_64",
            ))
            .stdout(predicate::str::contains(
                "dependency-key=leo-cargo-v3.4.0-stable-linux-x86_64",
            ));
    }

    #[test]
    fn keys_toolchain_changes_only_dependency_key() {
        let dir = TempDir::new().unwrap();
        leo_setup(&dir)
            .args([
                "keys", "3.4.0", "--os", "macos", "--arch", "arm64", "--toolchain", "1.82.0",
            ])
            .assert()
            .success()
            .stdout(predicate::str::contains(
                "binary-key=leo-binary-v3.4.0-macos-arm64",
            ))
            .stdout(predicate::str::contains(
                "dependency-key=leo-cargo-v3.4.0-1.82.0-macos-arm64",
            ));
    }

    #[test]
    fn keys_json_output() {
        let dir = TempDir::new().unwrap();
        leo_setup(&dir)
            .args(["keys", "3.4.0", "--os", "linux", "--arch", "x86_64", "-f", "json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"dependency_restore_keys\""));
    }

    #[test]
    fn invalid_version_names_parameter() {
        let dir = TempDir::new().unwrap();
        leo_setup(&dir)
            .args(["keys", "3.4.0;rm", "--os", "linux", "--arch", "x86_64"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("[parameters]"))
            .stderr(predicate::str::contains("version"));
    }

    #[test]
    fn unsupported_os_is_rejected() {
        let dir = TempDir::new().unwrap();
        leo_setup(&dir)
            .args(["keys", "3.4.0", "--os", "freebsd", "--arch", "x86_64"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("os"));
    }

    #[test]
    fn config_path_uses_override() {
        let dir = TempDir::new().unwrap();
        leo_setup(&dir)
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config.toml"));
    }

    #[test]
    fn config_init_set_show() {
        let dir = TempDir::new().unwrap();
        leo_setup(&dir).args(["config", "init"]).assert().success();
        leo_setup(&dir)
            .args(["config", "set", "cache.save_policy", "always"])
            .assert()
            .success();
        leo_setup(&dir)
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("save_policy = \"always\""));
    }

    #[test]
    fn config_set_unknown_key_fails() {
        let dir = TempDir::new().unwrap();
        leo_setup(&dir)
            .args(["config", "set", "vm.name", "x"])
            .assert()
            .failure();
    }

    #[test]
    fn cache_list_empty_store() {
        let dir = TempDir::new().unwrap();
        let store = dir.path().join("store");
        leo_setup(&dir)
            .args(["cache", "list", "-f", "json", "--dir"])
            .arg(&store)
            .assert()
            .success()
            .stdout(predicate::str::contains("[]"));
    }
}
