#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};
use std::time::{SystemTime, UNIX_EPOCH};

pub struct CmdResult {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
    pub log_path: PathBuf,
}

impl CmdResult {
    pub fn code(&self) -> Option<i32> {
        self.status.code()
    }
}

fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis())
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

fn resolve_bin_path() -> PathBuf {
    if let Ok(path) = std::env::var("CARGO_BIN_EXE_adsel") {
        return PathBuf::from(path);
    }

    let exe_name = if cfg!(windows) { "adsel.exe" } else { "adsel" };
    let fallback = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(PathBuf::from))
        .and_then(|deps| deps.parent().map(PathBuf::from))
        .map(|debug_dir| debug_dir.join(exe_name));

    match fallback {
        Some(path) if path.exists() => path,
        _ => panic!("unable to resolve adsel binary path for integration test"),
    }
}

/// Run the binary with a scrubbed environment: a throwaway `HOME` so no
/// user config is picked up, and no `ADSEL_*` overrides.
pub fn run_cli_case(case_name: &str, args: &[&str]) -> CmdResult {
    let root = std::env::temp_dir().join("adsel-test-logs");
    fs::create_dir_all(&root).expect("create temp test log dir");
    let home = root.join("home");
    fs::create_dir_all(&home).expect("create temp home");

    let log_path = root.join(format!("{}-{}.log", sanitize(case_name), now_millis()));
    let bin_path = resolve_bin_path();

    let mut command = Command::new(&bin_path);
    command
        .args(args)
        .env("HOME", &home)
        .env("RUST_BACKTRACE", "1");
    for (name, _) in std::env::vars() {
        if name.starts_with("ADSEL_") {
            command.env_remove(name);
        }
    }
    let output = command.output().expect("execute adsel command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();

    let mut log_content = String::new();
    log_content.push_str(&format!("case={case_name}\n"));
    log_content.push_str(&format!("bin={}\n", bin_path.display()));
    log_content.push_str(&format!("args={args:?}\n"));
    log_content.push_str(&format!("status={}\n", output.status));
    log_content.push_str("----- stdout -----\n");
    log_content.push_str(&stdout);
    log_content.push('\n');
    log_content.push_str("----- stderr -----\n");
    log_content.push_str(&stderr);
    log_content.push('\n');
    fs::write(&log_path, log_content).expect("write test log");

    CmdResult {
        status: output.status,
        stdout,
        stderr,
        log_path,
    }
}

/// Write `files` (relative path, contents) under `root`.
pub fn write_tree(root: &Path, files: &[(&str, &str)]) {
    for (relative, contents) in files {
        let path = root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create scenario dir");
        }
        fs::write(&path, contents).expect("write scenario file");
    }
}

pub const PASSING: &str = "devices = [\"Internal\", \"HDMI\"]\nsteps = [\"plug A\", \"plug B\", \"expect B\"]\n";
pub const FAILING: &str = "devices = [\"Internal\", \"USB\"]\nsteps = [\"plug A\", \"plug B\", \"expect A\"]\n";
pub const BROKEN: &str = "devices = [\"Internal\"]\nsteps = [\"plug A\", \"unplug A\", \"unplug A\"]\n";
