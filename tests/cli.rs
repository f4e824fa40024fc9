use assert_cmd::Command;
use predicates::str::contains;

fn cmd() -> Command {
    Command::cargo_bin("sysvol-control").unwrap()
}

#[test]
fn missing_sysvol_prints_usage() {
    cmd()
        .args(["-s", "127.0.0.1"])
        .assert()
        .failure()
        .code(1)
        .stderr(contains("--sysvol"))
        .stderr(contains("Sysvol options"));
}

#[test]
fn unknown_options_are_not_fatal() {
    // Stripped before parsing: the run then stops on the missing SYSVOL path
    cmd()
        .args(["--frobnicate", "-Z", "value"])
        .assert()
        .code(1)
        .stderr(contains("Skipping unknown option or argument '--frobnicate'"))
        .stderr(contains("Usage"));
}

#[test]
fn help_lists_option_groups() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("LDAP options"))
        .stdout(contains("--backup-privilege"))
        .stdout(contains("control.sysvol.owner.tsv"));
}

#[cfg(not(windows))]
#[test]
fn backup_privilege_unavailable_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    cmd()
        .current_dir(dir.path())
        .args(["-S", "/sysvol/corp.local/Policies", "-B", "-s", "127.0.0.1"])
        .assert()
        .code(1)
        .stderr(contains("Cannot enable backup privilege"));
    assert!(!dir.path().join("control.sysvol.owner.tsv").exists());
}

#[test]
fn unreachable_directory_fails() {
    let dir = tempfile::tempdir().unwrap();
    cmd()
        .current_dir(dir.path())
        .args(["-S", "Policies", "-s", "127.0.0.1", "-n", "1", "--timeout", "2"])
        .assert()
        .code(1)
        .stderr(contains("Cannot connect to the directory"));
}
