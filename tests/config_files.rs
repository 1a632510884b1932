//! Shipped configuration files load and run.

use std::path::PathBuf;

use queuenet::{HandoffMode, SectionKind, SimConfig, SimulationEngine};

fn config_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("configs").join(name)
}

#[test]
fn test_reference_file_matches_builtin() {
    let loaded = SimConfig::from_file(config_path("reference.yaml")).unwrap();
    let builtin = SimConfig::reference();

    assert_eq!(loaded.arrival_rate, builtin.arrival_rate);
    assert_eq!(loaded.warmup_ticks, builtin.warmup_ticks);
    assert_eq!(loaded.sections, builtin.sections);
    assert_eq!(loaded.routes, builtin.routes);
    assert_eq!(loaded.kind_thresholds, builtin.kind_thresholds);
    assert_eq!(loaded.processing_order, builtin.processing_order);
    assert_eq!(loaded.drain_order, builtin.drain_order);
    assert_eq!(loaded.admission, builtin.admission);
    assert_eq!(loaded.handoff, HandoffMode::Immediate);
    assert_eq!(loaded.seed, Some(42));
}

#[test]
fn test_light_load_file_fills_defaults() {
    let config = SimConfig::from_file(config_path("light_load.yaml")).unwrap();
    assert_eq!(config.handoff, HandoffMode::NextTick);
    assert_eq!(config.section(SectionKind::Payment).unwrap().capacity, 3);
    assert_eq!(config.routes, SimConfig::reference().routes);

    let report = SimulationEngine::new(config).unwrap().run().unwrap();
    assert_eq!(report.admitted, 1000);
    assert_eq!(report.in_flight, 0);
}

#[test]
fn test_yaml_and_json_files_roundtrip() {
    let dir = std::env::temp_dir().join(format!("queuenet-config-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let config = SimConfig::from_file(config_path("light_load.yaml")).unwrap();

    let yaml = dir.join("copy.yaml");
    let json = dir.join("copy.json");
    config.to_yaml_file(&yaml).unwrap();
    config.to_json_file(&json).unwrap();

    let from_yaml = SimConfig::from_file(&yaml).unwrap();
    let from_json = SimConfig::from_file(&json).unwrap();
    assert_eq!(from_yaml.sections, config.sections);
    assert_eq!(from_json.processing_order, config.processing_order);
    assert_eq!(from_json.seed, config.seed);

    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_unknown_extension_rejected() {
    assert!(SimConfig::from_file(config_path("reference.toml")).is_err());
}
