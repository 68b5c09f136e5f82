use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn version_prints_package_version() {
    let mut cmd = Command::cargo_bin("policyscope").unwrap();
    cmd.arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn help_lists_subcommands() {
    let mut cmd = Command::cargo_bin("policyscope").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("analyze"))
        .stdout(predicate::str::contains("find-link"));
}

#[test]
fn analyze_unreachable_host_exits_nonzero_with_complete_record() {
    let mut cmd = Command::cargo_bin("policyscope").unwrap();
    // Port 1 on loopback: refused immediately, no external network involved.
    cmd.args(["analyze", "http://127.0.0.1:1/", "--fetch-timeout-ms", "2000"])
        .env("POLICYSCOPE_API_KEY", "sk-test")
        .assert()
        .failure()
        .stdout(predicate::str::contains("\"scrape_success\": false"))
        .stdout(predicate::str::contains("Failed to fetch the page"));
}

#[test]
fn analyze_rejects_unparsable_url() {
    let mut cmd = Command::cargo_bin("policyscope").unwrap();
    cmd.args(["analyze", "http://exa mple.com/"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("invalid url"));
}
