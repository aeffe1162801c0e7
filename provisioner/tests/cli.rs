//! CLI tests for the provisioner binary.
//!
//! Only read-only surfaces (`--plan`, `--verify-only`, the privilege check)
//! are exercised; a full run mutates host state and is covered by scripted
//! sequencer tests instead.

use std::process::Command;

use provisioner::exit_codes;

fn provisioner() -> Command {
    Command::new(env!("CARGO_BIN_EXE_provisioner"))
}

fn missing_config(temp: &tempfile::TempDir) -> std::path::PathBuf {
    temp.path().join("provisioner.toml")
}

#[test]
fn plan_lists_base_steps() {
    let temp = tempfile::tempdir().expect("tempdir");
    let output = provisioner()
        .arg("--plan")
        .arg("--config")
        .arg(missing_config(&temp))
        .output()
        .expect("run --plan");

    assert_eq!(output.status.code(), Some(exit_codes::OK));
    let stdout = String::from_utf8_lossy(&output.stdout);
    for step in [
        "refresh-packages",
        "install-docker",
        "enable-docker-service",
        "docker-group",
        "compose",
        "aws-cli",
    ] {
        assert!(stdout.contains(step), "missing step {step} in:\n{stdout}");
    }
    assert!(stdout.contains("best-effort"));
    assert!(!stdout.contains("kubectl"));
}

#[test]
fn plan_with_kubernetes_adds_client_tooling() {
    let temp = tempfile::tempdir().expect("tempdir");
    let output = provisioner()
        .arg("--plan")
        .arg("--kubernetes")
        .arg("--config")
        .arg(missing_config(&temp))
        .output()
        .expect("run --plan");

    assert_eq!(output.status.code(), Some(exit_codes::OK));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("eksctl"));
    assert!(stdout.contains("kubectl"));
}

#[test]
fn verify_only_reports_every_required_tool() {
    let temp = tempfile::tempdir().expect("tempdir");
    let output = provisioner()
        .arg("--verify-only")
        .arg("--config")
        .arg(missing_config(&temp))
        .output()
        .expect("run --verify-only");

    // Readiness depends on the machine running the tests; the report shape
    // and exit code contract do not.
    let code = output.status.code();
    assert!(code == Some(exit_codes::OK) || code == Some(exit_codes::FAILED));
    let stdout = String::from_utf8_lossy(&output.stdout);
    for tool in ["docker", "compose", "aws"] {
        assert!(stdout.contains(tool), "missing {tool} in:\n{stdout}");
    }
}

#[test]
fn full_run_requires_root() {
    let uid = Command::new("id").arg("-u").output().expect("id -u");
    if String::from_utf8_lossy(&uid.stdout).trim() == "0" {
        // Running the suite as root: the privilege check cannot be
        // observed without actually provisioning.
        return;
    }

    let temp = tempfile::tempdir().expect("tempdir");
    let output = provisioner()
        .arg("--config")
        .arg(missing_config(&temp))
        .arg("--log-dir")
        .arg(temp.path().join("logs"))
        .output()
        .expect("run");

    assert_eq!(output.status.code(), Some(exit_codes::NOT_ROOT));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("root"));
    // The privilege check fires before any side effect, including the log.
    assert!(!temp.path().join("logs").exists());
}
