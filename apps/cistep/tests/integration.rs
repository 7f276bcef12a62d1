//! Integration tests for the cistep CLI

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

struct Workspace {
    dir: tempfile::TempDir,
}

impl Workspace {
    fn new() -> Self {
        let workspace = Self {
            dir: tempfile::tempdir().expect("temp dir"),
        };
        workspace.write("config.toml", "[general]\ncolor = \"never\"\n");
        workspace
    }

    fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, contents).expect("write file");
        path
    }

    fn config(&self) -> PathBuf {
        self.dir.path().join("config.toml")
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut command = Command::new(env!("CARGO_BIN_EXE_cistep"));
        command
            .arg("--config")
            .arg(self.config())
            .args(args)
            .env_remove("RUST_LOG")
            .env_remove("CISTEP_OUTPUT")
            .env_remove("CISTEP_COLOR");
        command
    }

    fn cistep(&self, args: &[&str]) -> Output {
        self.command(args).output().expect("Failed to execute cistep")
    }
}

fn path_arg(path: &Path) -> &str {
    path.to_str().expect("utf-8 temp path")
}

fn stdout_json(output: &Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).expect("JSON on stdout")
}

#[test]
fn test_cli_version() {
    let output = Command::new(env!("CARGO_BIN_EXE_cistep"))
        .arg("--version")
        .output()
        .expect("Failed to execute cistep");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("cistep"));
}

#[test]
fn test_cli_help() {
    let output = Command::new(env!("CARGO_BIN_EXE_cistep"))
        .arg("--help")
        .output()
        .expect("Failed to execute cistep");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Resolve and run CI source checkout steps"));
    assert!(stdout.contains("describe"));
    assert!(stdout.contains("members"));
    assert!(stdout.contains("run"));
}

#[test]
fn test_cli_invalid_command() {
    let output = Command::new(env!("CARGO_BIN_EXE_cistep"))
        .arg("invalid-command")
        .output()
        .expect("Failed to execute cistep");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unrecognized subcommand"));
}

#[test]
fn test_describe_with_codebase() {
    let ws = Workspace::new();
    let step = ws.write(
        "step.toml",
        "backend = \"dry-run\"\ncodebase = \"my-code\"\ndescription_suffix = \"suffix\"\n",
    );

    let output = ws.cistep(&["--json", "describe", path_arg(&step)]);
    assert!(output.status.success());
    let json = stdout_json(&output);
    assert_eq!(json["description"], serde_json::json!(["updating", "suffix"]));
    assert_eq!(json["name"], "dry-run-my-code");
}

#[test]
fn test_describe_keeps_template_when_property_is_unknown() {
    let ws = Workspace::new();
    let step = ws.write(
        "step.toml",
        "backend = \"dry-run\"\nname = \"{prop:buildername}\"\ncodebase = \"lib\"\n",
    );

    let output = ws.cistep(&["--json", "describe", path_arg(&step)]);
    assert!(output.status.success());
    let json = stdout_json(&output);
    assert_eq!(json["name"], "{prop:buildername}-{kw:codebase}");
}

#[test]
fn test_output_format_from_environment() {
    let ws = Workspace::new();
    let step = ws.write("step.toml", "backend = \"dry-run\"\ncodebase = \"lib\"\n");

    let output = ws
        .command(&["describe", path_arg(&step)])
        .env("CISTEP_OUTPUT", "json")
        .output()
        .expect("Failed to execute cistep");
    assert!(output.status.success());
    let json = stdout_json(&output);
    assert_eq!(json["name"], "dry-run-lib");
    assert_eq!(json["description"], serde_json::json!(["updating", "lib"]));
}

#[test]
fn test_output_format_from_config_file() {
    let ws = Workspace::new();
    ws.write(
        "config.toml",
        "[general]\ncolor = \"never\"\ndefault_output = \"json\"\n",
    );

    let output = ws.cistep(&["members", "dry-run", "method"]);
    assert!(output.status.success());
    let json = stdout_json(&output);
    assert_eq!(json["backend"], "dry-run");
    assert_eq!(
        json["groups"]["method"],
        serde_json::json!(["clean", "clobber", "copy", "fresh"])
    );
}

#[test]
fn test_zero_interrupt_grace_warns() {
    let ws = Workspace::new();
    ws.write(
        "config.toml",
        "[general]\ncolor = \"never\"\n\n[steps]\ninterrupt_grace_secs = 0\n",
    );

    let output = ws.cistep(&["members", "dry-run"]);
    assert!(output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("steps.interrupt_grace_secs is 0"));
}

#[test]
fn test_members_of_dry_run() {
    let ws = Workspace::new();
    let output = ws.cistep(&["--json", "members", "dry-run", "mode"]);
    assert!(output.status.success());
    let json = stdout_json(&output);
    assert_eq!(json["groups"]["mode"], serde_json::json!(["full", "incremental"]));
}

#[test]
fn test_run_against_stamped_build() {
    let ws = Workspace::new();
    let step = ws.write(
        "step.toml",
        r#"
backend = "dry-run"
codebase = "lib"
branch = "main"
mode = "full"
method = "clobber"
"#,
    );
    let build = ws.write(
        "build.toml",
        r#"
[properties]
buildername = "linux"

[[sourcestamp]]
codebase = "lib"
branch = "feature"
revision = "abc123"

[sourcestamp.patch]
body = "--- a/x\n+++ b/x\n"
"#,
    );

    let output = ws.cistep(&["--json", "run", path_arg(&step), "--build", path_arg(&build)]);
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let json = stdout_json(&output);
    assert_eq!(json["name"], "dry-run-lib");
    assert_eq!(json["result"], "success");
    assert_eq!(json["logs"]["patch"], "--- a/x\n+++ b/x\n");
    assert_eq!(json["codebase"], "lib");
    assert_eq!(json["branch"], "main");
    assert_eq!(
        json["properties"]["buildername"],
        serde_json::json!(["linux", "build"])
    );
}

#[test]
fn test_run_without_stamp_reports_missing_codebase() {
    let ws = Workspace::new();
    let step = ws.write("step.toml", "backend = \"dry-run\"\ncodebase = \"docs\"\n");

    let output = ws.cistep(&["--json", "run", path_arg(&step)]);
    assert!(output.status.success());
    let json = stdout_json(&output);
    assert_eq!(
        json["description"],
        serde_json::json!(["Codebase", "docs", "not", "in", "build", "docs"])
    );
    assert_eq!(
        json["logs"]["log"],
        "No sourcestamp found in build for codebase 'docs'"
    );
}

#[test]
fn test_unknown_mode_is_rejected_before_running() {
    let ws = Workspace::new();
    let step = ws.write("step.toml", "backend = \"dry-run\"\nmode = \"mirror\"\n");

    let output = ws.cistep(&["run", path_arg(&step)]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unsupported mode 'mirror'"));
    assert!(stderr.contains("full, incremental"));
}

#[test]
fn test_malformed_description_fails_at_load() {
    let ws = Workspace::new();
    let step = ws.write("step.toml", "backend = \"dry-run\"\ndescription = 42\n");

    let output = ws.cistep(&["describe", path_arg(&step)]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("parse error"));
}
