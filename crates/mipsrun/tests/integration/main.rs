//! Integration tests for mipsrun
//!
//! These tests run the fake simulators in `tests/fixtures/simulators`, which
//! are POSIX shell scripts, so they only build on unix hosts.

#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use mipsrun::config::{Config, SimulatorContract};

mod concurrency;
mod config_loading;
mod failures;
mod legacy_contract;
mod structured_contract;
mod workspace_cleanup;

const FIXTURES_PATH: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures");

/// Three instructions leaving `$t2 = 8`
pub(crate) const ADD_PROGRAM: &str = "addi $t0, $zero, 5\naddi $t1, $zero, 3\nadd $t2, $t0, $t1";

/// Path to a fake simulator script, made executable if a checkout lost the mode bits
pub(crate) fn fake_simulator(name: &str) -> PathBuf {
    let path = PathBuf::from(format!("{FIXTURES_PATH}/simulators/{name}.sh"));
    let metadata = std::fs::metadata(&path)
        .unwrap_or_else(|e| panic!("Failed to read fixture {}: {e}", path.display()));
    if metadata.permissions().mode() & 0o111 == 0 {
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
            .unwrap_or_else(|e| panic!("Failed to chmod fixture {}: {e}", path.display()));
    }
    path
}

/// A config pointing at a fake simulator, with workspaces under `root`
pub(crate) fn test_config(simulator: &str, contract: SimulatorContract, root: &Path) -> Config {
    Config {
        simulator_path: Some(fake_simulator(simulator)),
        contract,
        workspace_root: Some(root.to_path_buf()),
        timeout_secs: 10.0,
        ..Config::empty()
    }
}

/// Number of entries left under a workspace root
pub(crate) fn workspace_count(root: &Path) -> usize {
    std::fs::read_dir(root)
        .map(|entries| entries.count())
        .unwrap_or(0)
}

/// Whether `pid` names a live process; zombies count as exited
fn is_running(pid: &str) -> bool {
    match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
        Ok(stat) => stat
            .rsplit_once(')')
            .is_some_and(|(_, rest)| !rest.trim_start().starts_with('Z')),
        Err(_) if Path::new("/proc/self/stat").exists() => false,
        Err(_) => std::process::Command::new("kill")
            .args(["-0", pid])
            .status()
            .is_ok_and(|status| status.success()),
    }
}

/// Poll for up to a second until `pid` has exited
pub(crate) async fn exits_soon(pid: &str) -> bool {
    for _ in 0..50 {
        if !is_running(pid) {
            return true;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    false
}
