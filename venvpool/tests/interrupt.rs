//! Ctrl+C during `venvpool run` must not leave a write-locked environment behind.

#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;

/// A `python3.99` whose `-m venv DEST` builds an environment with a slow `pip`.
fn fake_interpreter(dir: &Path) -> PathBuf {
    let bin = dir.join("fakebin");
    fs::create_dir_all(&bin).unwrap();
    let python = bin.join("python3.99");
    fs::write(
        &python,
        r#"#!/bin/sh
dest="$3"
mkdir -p "$dest/bin"
printf '#!/bin/sh\nsleep 3\nexit 0\n' > "$dest/bin/pip"
chmod +x "$dest/bin/pip"
"#,
    )
    .unwrap();
    fs::set_permissions(&python, fs::Permissions::from_mode(0o755)).unwrap();
    bin
}

fn environments(pool: &Path) -> Vec<PathBuf> {
    match fs::read_dir(pool.join("3.99")) {
        Ok(entries) => entries.flatten().map(|e| e.path()).collect(),
        Err(_) => Vec::new(),
    }
}

#[test]
fn test_sigint_during_install_removes_half_built_environment() {
    let tmp = tempfile::tempdir().unwrap();
    let fakebin = fake_interpreter(tmp.path());
    let pool = tmp.path().join("pool");
    let path = match std::env::var_os("PATH") {
        Some(existing) => {
            let mut entries = vec![fakebin];
            entries.extend(std::env::split_paths(&existing));
            std::env::join_paths(entries).unwrap()
        }
        None => fakebin.into_os_string(),
    };

    let mut child = Command::new(env!("CARGO_BIN_EXE_venvpool"))
        .arg("--pool-dir")
        .arg(&pool)
        .args(["run", "--python", "3.99", "--req", "yay==1", "--", "true"])
        .current_dir(tmp.path())
        .env("PATH", path)
        .env("VENVPOOL_QUIET", "1")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();

    // Wait until the environment exists, i.e. pip is running.
    let deadline = Instant::now() + Duration::from_secs(10);
    while !environments(&pool).iter().any(|env| env.join("bin/pip").exists()) {
        assert!(Instant::now() < deadline, "environment was never provisioned");
        std::thread::sleep(Duration::from_millis(50));
    }
    std::thread::sleep(Duration::from_millis(300));
    kill(Pid::from_raw(child.id() as i32), Signal::SIGINT).unwrap();

    let status = child.wait().unwrap();
    assert_eq!(status.code(), Some(venvpool::EXIT_INTERRUPTED), "{:?}", status);
    let leaked: Vec<_> = environments(&pool)
        .into_iter()
        .filter(|env| !env.join("readlocks").is_dir())
        .collect();
    assert!(leaked.is_empty(), "write-locked leftovers: {:?}", leaked);
    assert!(environments(&pool).is_empty());
}
