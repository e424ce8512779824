use mipsrun::config::SimulatorContract;
use mipsrun::{OutputFormat, SimulationRequest, Simulator};

use super::{ADD_PROGRAM, test_config};

fn simulator(root: &std::path::Path) -> Simulator {
    Simulator::new(test_config(
        "structured",
        SimulatorContract::Structured,
        root,
    ))
    .unwrap()
}

#[tokio::test]
async fn test_structured_output() {
    let root = tempfile::tempdir().unwrap();
    let simulator = simulator(root.path());

    let result = simulator
        .simulate(SimulationRequest::new(ADD_PROGRAM).option("mode", "run"))
        .await;

    let output = result.output().expect("simulation should succeed");
    assert_eq!(output.format, OutputFormat::Structured);
    assert_eq!(output.register("$t2"), Some(8));
    assert_eq!(output.cycles, Some(7));
    assert_eq!(output.halted, Some(true));
    assert_eq!(output.raw, None);
}

#[tokio::test]
async fn test_config_document_reaches_simulator() {
    let root = tempfile::tempdir().unwrap();
    let simulator = simulator(root.path());

    let result = simulator.simulate(SimulationRequest::new("SENTINEL")).await;
    assert_eq!(
        result.output().unwrap().console.as_deref(),
        Some("step:SENTINEL")
    );

    let result = simulator
        .simulate(SimulationRequest::new("SENTINEL").option("mode", "run"))
        .await;
    assert_eq!(
        result.output().unwrap().console.as_deref(),
        Some("run:SENTINEL")
    );
}

#[tokio::test]
async fn test_extended_predictors_accepted() {
    let root = tempfile::tempdir().unwrap();
    let simulator = simulator(root.path());

    for (predictor, param) in [
        ("gshare", "history_bits"),
        ("local_history", "pattern_bits"),
        ("tournament", "choice_bits"),
    ] {
        let request = SimulationRequest::new(ADD_PROGRAM)
            .option("branch_prediction", true)
            .option("predictor", predictor)
            .option(param, 12);
        let result = simulator.simulate(request).await;
        assert!(result.is_success(), "{predictor}: {:?}", result.failure_info());
    }
}

#[tokio::test]
async fn test_custom_workspace_file_names() {
    let root = tempfile::tempdir().unwrap();
    let mut config = test_config("structured", SimulatorContract::Structured, root.path());
    config.program_file = "input.s".to_string();
    config.config_file = "sim.json".to_string();
    let simulator = Simulator::new(config).unwrap();

    let result = simulator.simulate(SimulationRequest::new("CUSTOM")).await;
    assert_eq!(
        result.output().unwrap().console.as_deref(),
        Some("step:CUSTOM")
    );
}

#[tokio::test]
async fn test_legacy_simulator_under_structured_contract_fails() {
    let root = tempfile::tempdir().unwrap();
    let simulator = Simulator::new(test_config(
        "legacy_text",
        SimulatorContract::Structured,
        root.path(),
    ))
    .unwrap();

    // `--program` is not a file, so the legacy script exits 1
    let result = simulator.simulate(SimulationRequest::new(ADD_PROGRAM)).await;
    let failure = result.failure_info().unwrap();
    assert_eq!(failure.kind, mipsrun::ErrorKind::Process);
    assert!(failure.message.contains("Could not load program file"));
}
