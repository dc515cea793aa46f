//! Configuration fixtures parsed and validated end to end.

use std::path::{Path, PathBuf};

use tidemark_engine::config::{parser, validator, StateBackendKind};

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

#[test]
fn fire_incident_fixture_parses_and_validates() {
    std::env::set_var("TIDEMARK_FIXTURE_DB_PASSWORD", "hunter2");

    let config = parser::read_pipeline_file(&fixture("fire_incidents.yaml"))
        .expect("Failed to parse fixture pipeline");

    assert_eq!(config.pipeline, "sf_fire_incidents");
    assert_eq!(
        config.source.resolved_endpoint(),
        "https://data.sfgov.org/resource/wr8u-xric.json"
    );
    assert_eq!(config.destination.password, "hunter2");
    assert_eq!(config.state.backend, StateBackendKind::File);
    validator::validate_pipeline(&config).expect("Validation should pass");

    let debug = format!("{:?}", config.destination);
    assert!(!debug.contains("hunter2"), "password leaked: {debug}");

    std::env::remove_var("TIDEMARK_FIXTURE_DB_PASSWORD");
}

#[test]
fn invalid_fixture_reports_every_problem() {
    let config = parser::read_pipeline_file(&fixture("invalid_pipeline.yaml"))
        .expect("structurally valid YAML");

    let err = validator::validate_pipeline(&config).unwrap_err().to_string();
    assert!(err.starts_with("Pipeline validation failed:"), "got: {err}");
    for needle in ["ftp://", "batch_size", "max_pages", "port", "unique_key", "loud"] {
        assert!(err.contains(needle), "missing '{needle}' in: {err}");
    }
}
