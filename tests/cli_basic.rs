//! Integration tests for basic CLI behavior.
//!
//! Tests that the binary accepts standard flags, translates option flags
//! into session options, and reports invalid values with a non-zero exit.

#![allow(deprecated)] // cargo_bin deprecation; replacement not yet stable

use std::io::Write;

use assert_cmd::Command;
use predicates::prelude::*;

/// Helper: get a Command for the `streamtap` binary with a clean logging
/// and CA bundle environment.
fn streamtap() -> Command {
    let mut cmd = Command::cargo_bin("streamtap").expect("binary 'streamtap' should be built");
    cmd.env_remove("RUST_LOG").env_remove("SSL_CERT_FILE");
    cmd
}

fn streamtap_no_config() -> Command {
    let mut cmd = streamtap();
    cmd.arg("--no-config");
    cmd
}

// ─── Top-level flags ─────────────────────────────────────────────────────────

#[test]
fn help_flag_shows_usage() {
    streamtap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage: streamtap"))
        .stdout(predicate::str::contains("--http-proxy"))
        .stdout(predicate::str::contains("--set"))
        .stdout(predicate::str::contains("--https-proxy").not());
}

#[test]
fn version_flag_shows_semver() {
    streamtap()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::is_match(r"^streamtap \d+\.\d+\.\d+\n$").unwrap());
}

#[test]
fn config_and_no_config_conflict() {
    streamtap()
        .args(["--no-config", "--config", "x.toml"])
        .assert()
        .failure();
}

// ─── Option output ───────────────────────────────────────────────────────────

#[test]
fn prints_all_options_as_json() {
    streamtap_no_config()
        .assert()
        .success()
        .stdout(predicate::str::starts_with("{"))
        .stdout(predicate::str::contains("\"hls-live-edge\": 3"))
        .stdout(predicate::str::contains("\"http-timeout\": 20.0"))
        .stdout(predicate::str::contains("\"user-input-requester\": null"));
}

#[test]
fn proxy_flag_is_normalized() {
    streamtap_no_config()
        .args(["--http-proxy", "proxy.example:8080", "--get", "http-proxy"])
        .assert()
        .success()
        .stdout("\"https://proxy.example:8080\"\n");
}

#[test]
fn ipv4_flag_clears_ipv6() {
    streamtap_no_config()
        .args(["-4", "--get", "ipv4"])
        .assert()
        .success()
        .stdout("true\n");
    streamtap_no_config()
        .args(["-4", "-6", "--get", "ipv4"])
        .assert()
        .success()
        .stdout("false\n");
}

#[test]
fn header_flag_merges_into_defaults() {
    streamtap_no_config()
        .args(["--http-header", "X-A=1", "--get", "http-headers"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"X-A\": \"1\""))
        .stdout(predicate::str::contains("\"Accept\": \"*/*\""));
}

#[test]
fn no_ssl_verify_flag() {
    streamtap_no_config()
        .args(["--http-no-ssl-verify", "--get", "http-ssl-verify"])
        .assert()
        .success()
        .stdout("false\n");
}

#[test]
fn set_parses_like_the_default() {
    streamtap_no_config()
        .args(["--set", "hls-live-edge=7", "--get", "hls-live-edge"])
        .assert()
        .success()
        .stdout("7\n");
    streamtap_no_config()
        .args(["--set", "hls-audio-select=en,de", "--get", "hls-audio-select"])
        .assert()
        .success()
        .stdout("[\n  \"en\",\n  \"de\"\n]\n");
    streamtap_no_config()
        .args(["--set", "webbrowser-headless=no", "--get", "webbrowser-headless"])
        .assert()
        .success()
        .stdout("false\n");
}

#[test]
fn set_accepts_unknown_keys() {
    streamtap_no_config()
        .args(["--set", "plugin-token=abc", "--get", "plugin-token"])
        .assert()
        .success()
        .stdout("\"abc\"\n");
}

#[test]
fn verify_booleans_win_over_ca_bundle_default() {
    let bundle = tempfile::NamedTempFile::new().unwrap();
    let bundle_name = bundle.path().file_name().unwrap().to_string_lossy().into_owned();

    streamtap_no_config()
        .env("SSL_CERT_FILE", bundle.path())
        .args(["--get", "http-ssl-verify"])
        .assert()
        .success()
        .stdout(predicate::str::contains(bundle_name));
    streamtap_no_config()
        .env("SSL_CERT_FILE", bundle.path())
        .args(["--set", "http-ssl-verify=false", "--get", "http-ssl-verify"])
        .assert()
        .success()
        .stdout("false\n");
    streamtap_no_config()
        .env("SSL_CERT_FILE", bundle.path())
        .args(["--set", "http-no-ssl-verify=true", "--get", "http-ssl-verify"])
        .assert()
        .success()
        .stdout("false\n");
    streamtap_no_config()
        .env("SSL_CERT_FILE", bundle.path())
        .args(["--get", "http-no-ssl-verify"])
        .assert()
        .success()
        .stdout("false\n");
}

// ─── Deprecated keys ─────────────────────────────────────────────────────────

#[test]
fn deprecated_key_is_routed_and_warned() {
    streamtap_no_config()
        .args(["--set", "hls-timeout=30", "--get", "stream-timeout"])
        .assert()
        .success()
        .stdout("30.0\n")
        .stderr(predicate::str::contains(
            "`hls-timeout` has been deprecated in favor of the `stream-timeout` option",
        ));
}

#[test]
fn negated_alias_via_set() {
    streamtap_no_config()
        .args(["--set", "http-no-ssl-verify=true", "--get", "http-ssl-verify"])
        .assert()
        .success()
        .stdout("false\n");
}

#[test]
fn hidden_https_proxy_flag_still_works() {
    streamtap_no_config()
        .args(["--https-proxy", "http://p:1", "--get", "http-proxy"])
        .assert()
        .success()
        .stdout("\"http://p:1\"\n")
        .stderr(predicate::str::contains("`https-proxy` has been deprecated"));
}

// ─── Config file ─────────────────────────────────────────────────────────────

#[test]
fn config_file_options_are_applied() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[options]\nhls-live-edge = 9\nhttp-proxy = \"cfg:1\"").unwrap();
    streamtap()
        .arg("--config")
        .arg(file.path())
        .args(["--get", "hls-live-edge"])
        .assert()
        .success()
        .stdout("9\n");
}

#[test]
fn flags_override_config_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[options]\nhttp-proxy = \"cfg:1\"").unwrap();
    streamtap()
        .arg("--config")
        .arg(file.path())
        .args(["--http-proxy", "flag:2", "--get", "http-proxy"])
        .assert()
        .success()
        .stdout("\"https://flag:2\"\n");
}

#[test]
fn missing_config_file_fails() {
    streamtap()
        .args(["--config", "/nonexistent/streamtap/config.toml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to read"));
}

// ─── Errors ──────────────────────────────────────────────────────────────────

#[test]
fn invalid_timeout_fails() {
    streamtap_no_config()
        .args(["--set", "http-timeout=-1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid value for `http-timeout`"));
}

#[test]
fn unparsable_value_fails() {
    streamtap_no_config()
        .args(["--set", "ipv4=maybe"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid value for `ipv4`"));
}

#[test]
fn invalid_interface_fails() {
    streamtap_no_config()
        .args(["--interface", "eth0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid value for `interface`"));
}

#[test]
fn assignment_without_equals_fails() {
    streamtap_no_config()
        .args(["--set", "hls-live-edge"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("expected KEY=VALUE"));
}

#[test]
fn unknown_key_get_fails() {
    streamtap_no_config()
        .args(["--get", "no-such-option"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown option `no-such-option`"));
}
