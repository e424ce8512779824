use mipsrun::config::SimulatorContract;
use mipsrun::{OutputFormat, SimulationRequest, Simulator};
use serde_json::json;

use super::{ADD_PROGRAM, test_config};

fn simulator(root: &std::path::Path) -> Simulator {
    Simulator::new(test_config("legacy_text", SimulatorContract::Legacy, root)).unwrap()
}

fn args_line(raw: &str) -> &str {
    raw.lines()
        .find_map(|line| line.strip_prefix("Args:"))
        .map(str::trim)
        .unwrap_or_default()
}

#[tokio::test]
async fn test_add_program_reports_t2() {
    let root = tempfile::tempdir().unwrap();
    let simulator = simulator(root.path());

    let request = SimulationRequest::new(ADD_PROGRAM)
        .option("mode", "run")
        .option("pipeline", true);
    let result = simulator.simulate(request).await;

    let output = result.output().expect("simulation should succeed");
    assert_eq!(output.format, OutputFormat::Text);
    assert_eq!(output.register("$t2"), Some(8));
    assert_eq!(output.register("$t0"), Some(5));
    assert_eq!(output.pc, Some(0x0c));
    assert_eq!(output.halted, Some(true));
    assert_eq!(output.pipeline.len(), 5);
    assert_eq!(args_line(output.raw.as_deref().unwrap()), "--pipeline");
}

#[tokio::test]
async fn test_step_mode_is_default() {
    let root = tempfile::tempdir().unwrap();
    let simulator = simulator(root.path());

    let result = simulator.simulate(SimulationRequest::new(ADD_PROGRAM)).await;
    let output = result.output().unwrap();
    assert_eq!(args_line(output.raw.as_deref().unwrap()), "--step");
    assert!(output.pipeline.is_empty());
}

#[tokio::test]
async fn test_branch_prediction_flags() {
    let root = tempfile::tempdir().unwrap();
    let simulator = simulator(root.path());

    let request = SimulationRequest::new(ADD_PROGRAM)
        .option("mode", "run")
        .option("branch_prediction", true)
        .option("predictor", "two_bit");
    let result = simulator.simulate(request).await;

    let output = result.output().unwrap();
    assert_eq!(
        args_line(output.raw.as_deref().unwrap()),
        "--branch-pred --pred-type 2bit"
    );
    let stats = output.branch_prediction.unwrap();
    assert_eq!(stats.total, 4);
    assert_eq!(stats.correct, 3);
}

#[tokio::test]
async fn test_nested_config_schema() {
    let root = tempfile::tempdir().unwrap();
    let simulator = simulator(root.path());

    let request = SimulationRequest::from_json(json!({
        "program": ADD_PROGRAM,
        "config": {
            "mode": "step",
            "pipeline": {"enabled": true},
            "branch_prediction": {"enabled": true, "scheme": "1bit", "index_bits": 8}
        }
    }))
    .unwrap();
    let result = simulator.simulate(request).await;

    let output = result.output().unwrap();
    assert_eq!(
        args_line(output.raw.as_deref().unwrap()),
        "--step --pipeline --branch-pred --pred-type 1bit"
    );
}

#[tokio::test]
async fn test_service_defaults_apply() {
    let root = tempfile::tempdir().unwrap();
    let mut config = test_config("legacy_text", SimulatorContract::Legacy, root.path());
    config.defaults.mode = Some(mipsrun::config::ExecutionMode::Run);
    config.defaults.pipeline = Some(true);
    let simulator = Simulator::new(config).unwrap();

    let result = simulator.simulate(SimulationRequest::new(ADD_PROGRAM)).await;
    assert_eq!(
        args_line(result.output().unwrap().raw.as_deref().unwrap()),
        "--pipeline"
    );

    // request fields override the defaults
    let request = SimulationRequest::new(ADD_PROGRAM).option("pipeline", false);
    let result = simulator.simulate(request).await;
    assert_eq!(args_line(result.output().unwrap().raw.as_deref().unwrap()), "");
}

#[tokio::test]
async fn test_extra_args_appended() {
    let root = tempfile::tempdir().unwrap();
    let mut config = test_config("legacy_text", SimulatorContract::Legacy, root.path());
    config.simulator_args = vec!["--trace".to_string()];
    let simulator = Simulator::new(config).unwrap();

    let result = simulator
        .simulate(SimulationRequest::new(ADD_PROGRAM).option("mode", "run"))
        .await;
    assert_eq!(
        args_line(result.output().unwrap().raw.as_deref().unwrap()),
        "--trace"
    );
}

#[tokio::test]
async fn test_result_wire_shape() {
    let root = tempfile::tempdir().unwrap();
    let simulator = simulator(root.path());

    let result = simulator.simulate(SimulationRequest::new(ADD_PROGRAM)).await;
    let value = serde_json::to_value(&result).unwrap();

    assert_eq!(value["success"], true);
    assert_eq!(value["output"]["format"], "text");
    let t2 = value["output"]["registers"]
        .as_array()
        .unwrap()
        .iter()
        .find(|r| r["name"] == "$t2")
        .unwrap();
    assert_eq!(t2["value"], 8);
    assert!(value.get("error").is_none());
}
