use std::path::PathBuf;

use mipsrun::config::{Config, ConfigError, PredictorScheme, SimulatorContract};
use mipsrun::Simulator;

use super::FIXTURES_PATH;

#[test]
fn test_load_valid_config() {
    let path = format!("{FIXTURES_PATH}/configs/valid_full.toml");
    let config = Config::from_file(&path).expect("Failed to load config");

    assert_eq!(
        config.simulator_path,
        Some(PathBuf::from("/opt/mips/build/mips_simulator"))
    );
    assert_eq!(config.contract, SimulatorContract::Structured);
    assert_eq!(config.timeout_secs, 10.0);
    assert_eq!(config.max_concurrent, 4);
    assert_eq!(config.program_file, "input.s");
    assert_eq!(config.server.bind, "127.0.0.1:5501");

    let defaults = config.default_simulation().unwrap();
    assert!(defaults.pipeline.enabled);
    assert_eq!(
        defaults.branch_prediction.predictor,
        PredictorScheme::Gshare {
            history_bits: 8,
            index_bits: 12
        }
    );
    assert_eq!(defaults.memory_window.start, 0x1000);
    assert_eq!(defaults.memory_window.length, 32);
}

#[test]
fn test_load_minimal_config() {
    let path = format!("{FIXTURES_PATH}/configs/valid_minimal.toml");
    let config = Config::from_file(&path).expect("Failed to load config");

    assert_eq!(config.timeout_secs, 5.0);
    assert_eq!(config.contract, SimulatorContract::Legacy);
    assert_eq!(config.max_program_bytes, 256 * 1024);
}

#[test]
fn test_load_invalid_timeout() {
    let path = format!("{FIXTURES_PATH}/configs/invalid_timeout.toml");
    assert!(matches!(
        Config::from_file(&path),
        Err(ConfigError::Invalid(_))
    ));
}

#[test]
fn test_load_invalid_defaults() {
    let path = format!("{FIXTURES_PATH}/configs/invalid_defaults.toml");
    assert!(matches!(
        Config::from_file(&path),
        Err(ConfigError::InvalidDefaults(_))
    ));
}

#[test]
fn test_load_invalid_contract() {
    let path = format!("{FIXTURES_PATH}/configs/invalid_contract.toml");
    assert!(matches!(Config::from_file(&path), Err(ConfigError::Parse(_))));
}

#[test]
fn test_load_nonexistent_config() {
    let result = Config::from_file("/nonexistent/path/config.toml");
    assert!(result.is_err());
}

#[test]
fn test_example_config_builds_simulator() {
    let config = Config::parse_toml(mipsrun::EXAMPLE_CONFIG).unwrap();
    assert!(Simulator::new(config).is_ok());
}
