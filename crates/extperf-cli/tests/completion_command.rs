use assert_cmd::Command;
use predicates::prelude::*;
use std::path::PathBuf;

#[allow(deprecated)]
fn get_extperf_bin() -> PathBuf {
    assert_cmd::cargo::cargo_bin("extperf")
}

#[test]
fn test_completion_command_help() {
    let mut cmd = Command::new(get_extperf_bin());
    cmd.arg("completion").arg("--help");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Generate shell completion scripts"))
        .stdout(predicate::str::contains("SUPPORTED SHELLS"))
        .stdout(predicate::str::contains("powershell"))
        .stdout(predicate::str::contains("INSTALLATION"))
        .stdout(predicate::str::contains("~/.bashrc"))
        .stdout(predicate::str::contains("~/.zshrc"));
}

#[test]
fn test_completion_bash_generates_script() {
    let mut cmd = Command::new(get_extperf_bin());
    cmd.arg("completion").arg("--shell").arg("bash");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("_extperf()"))
        .stdout(predicate::str::contains("complete -F _extperf"));
}

#[test]
fn test_completion_zsh_generates_script() {
    let mut cmd = Command::new(get_extperf_bin());
    cmd.arg("completion").arg("--shell").arg("zsh");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("#compdef extperf"))
        .stdout(predicate::str::contains("_extperf()"));
}

#[test]
fn test_completion_fish_lists_subcommands() {
    let mut cmd = Command::new(get_extperf_bin());
    cmd.arg("completion").arg("--shell").arg("fish");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("complete -c extperf"))
        .stdout(predicate::str::contains("impact"))
        .stdout(predicate::str::contains("page-state"));
}

#[test]
fn test_completion_requires_shell() {
    let mut cmd = Command::new(get_extperf_bin());
    cmd.arg("completion");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("--shell"));
}
