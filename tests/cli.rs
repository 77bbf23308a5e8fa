use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

fn bin_path() -> &'static str {
    env!("CARGO_BIN_EXE_usage-footer")
}

fn app_home(home: &TempDir) -> PathBuf {
    home.path().join("app")
}

fn run_cmd(home: &TempDir, args: &[&str], env: &[(&str, &str)]) -> Output {
    let mut cmd = Command::new(bin_path());
    cmd.args(args)
        .env("USAGE_FOOTER_HOME", app_home(home))
        .env("USAGE_FOOTER_USE_KEYRING", "false")
        .env("HOME", home.path())
        .env("CODEX_HOME", home.path().join(".codex"))
        .env_remove("RUST_LOG");
    for (key, value) in env {
        cmd.env(key, value);
    }
    cmd.output().expect("run usage-footer command")
}

fn write_agent_auth(home: &Path, body: Value) {
    let dir = home.join(".pi").join("agent");
    fs::create_dir_all(&dir).expect("create agent dir");
    fs::write(dir.join("auth.json"), body.to_string()).expect("write auth file");
}

#[test]
fn init_creates_config_file() {
    let home = TempDir::new().expect("temp home");
    let output = run_cmd(&home, &["init"], &[]);
    assert!(output.status.success());

    let cfg = app_home(&home).join("config").join("config.toml");
    let raw = fs::read_to_string(cfg).expect("read config");
    assert!(raw.contains("refresh_seconds = 60"));
    assert!(raw.contains("bar_width = 12"));
}

#[test]
fn init_is_idempotent() {
    let home = TempDir::new().expect("temp home");
    let cfg = app_home(&home).join("config").join("config.toml");

    assert!(run_cmd(&home, &["init"], &[]).status.success());
    let first = fs::read_to_string(&cfg).expect("read config after first init");

    assert!(run_cmd(&home, &["init"], &[]).status.success());
    let second = fs::read_to_string(&cfg).expect("read config after second init");

    assert_eq!(first, second);
}

#[test]
fn status_rejects_unknown_provider() {
    let home = TempDir::new().expect("temp home");
    let output = run_cmd(&home, &["status", "--provider", "anthropic"], &[]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Unsupported provider 'anthropic'"));
}

#[test]
fn status_without_credentials_reports_reason() {
    let home = TempDir::new().expect("temp home");
    let output = run_cmd(&home, &["status", "--provider", "copilot"], &[]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("no Copilot credentials found"));
}

#[test]
fn status_json_without_credentials_is_an_empty_snapshot() {
    let home = TempDir::new().expect("temp home");
    let output = run_cmd(&home, &["status", "--provider", "codex", "--json"], &[]);
    assert!(output.status.success());

    let parsed: Value = serde_json::from_slice(&output.stdout).expect("valid json output");
    assert_eq!(parsed["windows"].as_array().map(Vec::len), Some(0));
    assert_eq!(parsed["error"], "no Codex credentials found");
}

#[test]
fn status_json_reports_codex_windows() {
    let home = TempDir::new().expect("temp home");
    write_agent_auth(
        home.path(),
        json!({ "openai-codex": { "type": "oauth", "access": "cli-tok", "accountId": "acct-7" } }),
    );

    let mut server = mockito::Server::new();
    let mock = server
        .mock("GET", "/wham/usage")
        .match_header("authorization", "Bearer cli-tok")
        .match_header("chatgpt-account-id", "acct-7")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "rate_limit": {
                    "primary_window": { "used_percent": 72, "limit_window_seconds": 18_000 },
                    "secondary_window": { "used_percent": 14, "limit_window_seconds": 604_800 }
                }
            })
            .to_string(),
        )
        .create();

    let url = format!("{}/wham/usage", server.url());
    let output = run_cmd(
        &home,
        &["status", "--provider", "codex", "--json"],
        &[("USAGE_FOOTER_CODEX_URL", &url)],
    );
    assert!(output.status.success());
    mock.assert();

    let parsed: Value = serde_json::from_slice(&output.stdout).expect("valid json output");
    assert_eq!(parsed["error"], Value::Null);
    assert_eq!(parsed["windows"][0]["label"], "5h");
    assert_eq!(parsed["windows"][0]["used_percent"], 72.0);
    assert_eq!(parsed["windows"][1]["label"], "Week");
}

#[test]
fn status_reads_codex_auth_from_codex_home() {
    let home = TempDir::new().expect("temp home");
    let codex_home = home.path().join("custom-codex");
    fs::create_dir_all(&codex_home).expect("create codex home");
    fs::write(
        codex_home.join("auth.json"),
        json!({ "tokens": { "access_token": "custom-tok", "account_id": "acct-c" } }).to_string(),
    )
    .expect("write codex auth");

    let mut server = mockito::Server::new();
    let mock = server
        .mock("GET", "/wham/usage")
        .match_header("authorization", "Bearer custom-tok")
        .match_header("chatgpt-account-id", "acct-c")
        .with_status(200)
        .with_body(
            json!({ "rate_limit": { "primary_window": { "used_percent": 10 } } }).to_string(),
        )
        .create();

    let url = format!("{}/wham/usage", server.url());
    let codex_home = codex_home.to_string_lossy().into_owned();
    let output = run_cmd(
        &home,
        &["status", "--provider", "codex", "--json"],
        &[("USAGE_FOOTER_CODEX_URL", &url), ("CODEX_HOME", &codex_home)],
    );
    assert!(output.status.success());
    mock.assert();

    let parsed: Value = serde_json::from_slice(&output.stdout).expect("valid json output");
    assert_eq!(parsed["error"], Value::Null);
    assert_eq!(parsed["windows"][0]["used_percent"], 10.0);
}

#[test]
fn status_prints_copilot_quota_line() {
    let home = TempDir::new().expect("temp home");
    write_agent_auth(
        home.path(),
        json!({ "github-copilot": { "type": "oauth", "refresh": "gho_cli", "access": "tid=1" } }),
    );

    let mut server = mockito::Server::new();
    let _mock = server
        .mock("GET", "/copilot_internal/user")
        .match_header("authorization", "token gho_cli")
        .with_status(200)
        .with_body(
            json!({
                "quota_snapshots": {
                    "premium_interactions": {
                        "entitlement": 300, "remaining": 120, "percent_remaining": 40.0
                    }
                }
            })
            .to_string(),
        )
        .create();

    let url = format!("{}/copilot_internal/user", server.url());
    let output = run_cmd(
        &home,
        &["status", "--provider", "github-copilot"],
        &[("USAGE_FOOTER_COPILOT_URL", &url)],
    );
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(
        stdout.trim_end(),
        "Copilot | Premium ███████░░░░░ 60% used (120/300)"
    );
}

#[test]
fn set_token_rejects_unknown_provider() {
    let home = TempDir::new().expect("temp home");
    let output = run_cmd(&home, &["set-token", "gemini", "--token", "x"], &[]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Unsupported provider 'gemini'"));
}
