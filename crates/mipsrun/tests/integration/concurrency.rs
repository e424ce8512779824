use std::sync::Arc;
use std::time::{Duration, Instant};

use mipsrun::config::SimulatorContract;
use mipsrun::{ErrorKind, SimulationRequest, Simulator};

use super::{test_config, workspace_count};

/// Run one request per sentinel concurrently and return (sentinel, console) pairs
async fn run_sentinels(simulator: Arc<Simulator>, count: usize) -> Vec<(String, Option<String>)> {
    let mut handles = Vec::new();
    for i in 0..count {
        let simulator = simulator.clone();
        handles.push(tokio::spawn(async move {
            let sentinel = format!("SENTINEL_{i}");
            let mode = if i % 2 == 0 { "step" } else { "run" };
            let request = SimulationRequest::new(sentinel.clone()).option("mode", mode);
            let result = simulator.simulate(request).await;
            let console = result.output().and_then(|o| o.console.clone());
            (format!("{mode}:{sentinel}"), console)
        }));
    }

    let mut results = Vec::new();
    for handle in handles {
        results.push(handle.await.unwrap());
    }
    results
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_are_isolated() {
    let root = tempfile::tempdir().unwrap();
    let simulator = Arc::new(
        Simulator::new(test_config(
            "structured",
            SimulatorContract::Structured,
            root.path(),
        ))
        .unwrap(),
    );

    for (expected, console) in run_sentinels(simulator.clone(), 24).await {
        assert_eq!(console.as_deref(), Some(expected.as_str()));
    }
    assert_eq!(workspace_count(root.path()), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_requests_beyond_capacity_wait_their_turn() {
    let root = tempfile::tempdir().unwrap();
    let mut config = test_config("structured", SimulatorContract::Structured, root.path());
    config.max_concurrent = 2;
    let simulator = Arc::new(Simulator::new(config).unwrap());

    for (expected, console) in run_sentinels(simulator.clone(), 12).await {
        assert_eq!(console.as_deref(), Some(expected.as_str()));
    }
    assert_eq!(simulator.workspaces().available(), 2);
    assert_eq!(workspace_count(root.path()), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_timeouts_run_in_parallel() {
    let root = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    let mut config = test_config("hang", SimulatorContract::Legacy, root.path());
    config.timeout_secs = 1.0;
    config.simulator_args = vec![scratch.path().join("pid").to_string_lossy().into_owned()];
    let simulator = Arc::new(Simulator::new(config).unwrap());

    let started = Instant::now();
    let mut handles = Vec::new();
    for _ in 0..4 {
        let simulator = simulator.clone();
        handles.push(tokio::spawn(async move {
            simulator.simulate(SimulationRequest::new("nop")).await
        }));
    }
    for handle in handles {
        let result = handle.await.unwrap();
        assert_eq!(result.error_kind(), Some(ErrorKind::Timeout));
    }

    // Four one-second deadlines in parallel, not in sequence
    assert!(started.elapsed() < Duration::from_secs(4));
    assert_eq!(workspace_count(root.path()), 0);
}
