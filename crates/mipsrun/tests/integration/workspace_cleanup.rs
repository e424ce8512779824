use mipsrun::config::SimulatorContract;
use mipsrun::{ErrorKind, SimulationRequest, Simulator};

use super::{ADD_PROGRAM, test_config, workspace_count};

/// Every outcome, success or failure, leaves the workspace root empty
#[tokio::test]
async fn test_no_workspace_survives_any_outcome() {
    let cases = [
        ("legacy_text", SimulatorContract::Legacy, None),
        ("structured", SimulatorContract::Structured, None),
        ("crash", SimulatorContract::Legacy, Some(ErrorKind::Process)),
        ("stateless", SimulatorContract::Legacy, Some(ErrorKind::Parse)),
        ("flood", SimulatorContract::Legacy, Some(ErrorKind::Process)),
    ];

    for (name, contract, expected) in cases {
        let root = tempfile::tempdir().unwrap();
        let mut config = test_config(name, contract, root.path());
        config.max_output_bytes = 4096;
        let simulator = Simulator::new(config).unwrap();

        let result = simulator.simulate(SimulationRequest::new(ADD_PROGRAM)).await;
        assert_eq!(result.error_kind(), expected, "{name}");
        assert_eq!(workspace_count(root.path()), 0, "{name} left a workspace");
        assert_eq!(
            simulator.workspaces().available(),
            simulator.workspaces().capacity()
        );
    }
}

#[tokio::test]
async fn test_workspace_root_is_created() {
    let parent = tempfile::tempdir().unwrap();
    let root = parent.path().join("workspaces");
    let simulator = Simulator::new(test_config(
        "legacy_text",
        SimulatorContract::Legacy,
        &root,
    ))
    .unwrap();

    let result = simulator.simulate(SimulationRequest::new(ADD_PROGRAM)).await;
    assert!(result.is_success());
    assert!(root.is_dir());
    assert_eq!(workspace_count(&root), 0);
}
