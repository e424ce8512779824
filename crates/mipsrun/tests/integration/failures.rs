use std::time::{Duration, Instant};

use mipsrun::config::SimulatorContract;
use mipsrun::{ErrorKind, SimulationRequest, Simulator};

use super::{ADD_PROGRAM, exits_soon, test_config, workspace_count};

#[tokio::test]
async fn test_nonzero_exit_is_process_error() {
    let root = tempfile::tempdir().unwrap();
    let simulator =
        Simulator::new(test_config("crash", SimulatorContract::Legacy, root.path())).unwrap();

    let result = simulator.simulate(SimulationRequest::new(ADD_PROGRAM)).await;
    let failure = result.failure_info().unwrap();
    assert_eq!(failure.kind, ErrorKind::Process);
    assert_eq!(failure.message, "Segmentation fault in decode stage");
}

#[tokio::test]
async fn test_unparseable_output_is_parse_error() {
    let root = tempfile::tempdir().unwrap();
    let simulator =
        Simulator::new(test_config("stateless", SimulatorContract::Legacy, root.path())).unwrap();

    let result = simulator.simulate(SimulationRequest::new(ADD_PROGRAM)).await;
    let failure = result.failure_info().unwrap();
    assert_eq!(failure.kind, ErrorKind::Parse);
    assert!(failure.message.contains("MIPS Simulator"));
}

#[tokio::test]
async fn test_output_flood_is_process_error() {
    let root = tempfile::tempdir().unwrap();
    let mut config = test_config("flood", SimulatorContract::Legacy, root.path());
    config.max_output_bytes = 1024;
    let simulator = Simulator::new(config).unwrap();

    let result = simulator.simulate(SimulationRequest::new(ADD_PROGRAM)).await;
    assert_eq!(result.error_kind(), Some(ErrorKind::Process));
}

#[tokio::test]
async fn test_missing_simulator_is_internal_error() {
    let root = tempfile::tempdir().unwrap();
    let mut config = test_config("crash", SimulatorContract::Legacy, root.path());
    config.simulator_path = Some(root.path().join("no-such-simulator"));
    let simulator = Simulator::new(config).unwrap();

    let result = simulator.simulate(SimulationRequest::new(ADD_PROGRAM)).await;
    assert_eq!(result.error_kind(), Some(ErrorKind::Internal));
}

#[tokio::test]
async fn test_timeout_kills_simulator() {
    let root = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    let pid_file = scratch.path().join("simulator.pid");

    let mut config = test_config("hang", SimulatorContract::Legacy, root.path());
    config.timeout_secs = 0.5;
    config.simulator_args = vec![pid_file.to_string_lossy().into_owned()];
    let simulator = Simulator::new(config).unwrap();

    let started = Instant::now();
    let result = simulator.simulate(SimulationRequest::new(ADD_PROGRAM)).await;
    let elapsed = started.elapsed();

    let failure = result.failure_info().unwrap();
    assert_eq!(failure.kind, ErrorKind::Timeout);
    assert_eq!(failure.message, "Simulation timed out");
    assert!(elapsed >= Duration::from_millis(500));
    assert!(elapsed < Duration::from_secs(10), "took {elapsed:?}");

    let pid = std::fs::read_to_string(&pid_file).unwrap();
    assert!(
        exits_soon(pid.trim()).await,
        "simulator process {} outlived its deadline",
        pid.trim()
    );
    assert_eq!(workspace_count(root.path()), 0);
}

#[tokio::test]
async fn test_timeout_kills_forked_simulator_processes() {
    let root = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    let pid_file = scratch.path().join("child.pid");

    let mut config = test_config("forking", SimulatorContract::Legacy, root.path());
    config.timeout_secs = 0.5;
    config.simulator_args = vec![pid_file.to_string_lossy().into_owned()];
    let simulator = Simulator::new(config).unwrap();

    let result = simulator.simulate(SimulationRequest::new(ADD_PROGRAM)).await;
    assert_eq!(result.error_kind(), Some(ErrorKind::Timeout));

    let pid = std::fs::read_to_string(&pid_file).unwrap();
    assert!(
        exits_soon(pid.trim()).await,
        "forked process {} outlived its deadline",
        pid.trim()
    );
    assert_eq!(workspace_count(root.path()), 0);
}

#[tokio::test]
async fn test_validation_never_reaches_simulator() {
    let root = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    let pid_file = scratch.path().join("simulator.pid");

    let mut config = test_config("hang", SimulatorContract::Legacy, root.path());
    config.simulator_args = vec![pid_file.to_string_lossy().into_owned()];
    let simulator = Simulator::new(config).unwrap();

    let result = simulator
        .simulate(SimulationRequest::new(ADD_PROGRAM).option("memory_length", 0))
        .await;
    assert_eq!(result.error_kind(), Some(ErrorKind::Validation));

    let result = simulator.simulate(SimulationRequest::new("")).await;
    assert_eq!(result.error_kind(), Some(ErrorKind::Validation));

    assert!(!pid_file.exists(), "simulator was spawned for an invalid request");
    assert_eq!(workspace_count(root.path()), 0);
}
