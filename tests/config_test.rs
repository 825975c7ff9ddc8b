//! Configuration system tests.

use periodic_metrics::core::{Config, ConfigBuilder, ExecutorKind, LogLevel};
use periodic_metrics::rotation::PeriodicRecorderBuilder;
use periodic_metrics::DispatchPolicy;
use std::io::Write;
use std::time::Duration;

#[test]
fn test_default_config() {
    let config = Config::default();
    assert!(config.validate().is_ok());
    assert_eq!(config.rotation.interval, Duration::from_millis(500));
    assert!(config.rotation.final_flush);
    assert_eq!(config.polling.executor, ExecutorKind::Inline);
    assert_eq!(config.polling.threads, 4);
    assert_eq!(config.polling.policy, DispatchPolicy::AwaitCompletion);
    assert_eq!(config.logging.level, LogLevel::Info);
}

#[test]
fn test_load_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.yaml");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(
        file,
        r#"
rotation:
  interval: 2s
  final_flush: false
polling:
  executor: rayon
  threads: 3
logging:
  level: debug
  structured: true
"#
    )
    .unwrap();

    let config = Config::load(&path).unwrap();

    assert_eq!(config.rotation.interval, Duration::from_secs(2));
    assert!(!config.rotation.final_flush);
    assert_eq!(config.polling.executor, ExecutorKind::Rayon);
    assert_eq!(config.polling.threads, 3);
    assert_eq!(config.polling.policy, DispatchPolicy::AwaitCompletion);
    assert_eq!(config.logging.level, LogLevel::Debug);
    assert!(config.logging.structured);
}

#[test]
fn test_load_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = Config::load(&dir.path().join("absent.yaml")).unwrap_err();
    assert_eq!(err.category(), "io");
}

#[test]
fn test_partial_yaml_keeps_defaults() {
    let config = ConfigBuilder::new()
        .from_yaml("polling:\n  policy: fire_and_forget\n")
        .unwrap()
        .build()
        .unwrap();

    assert_eq!(config.polling.policy, DispatchPolicy::FireAndForget);
    assert_eq!(config.polling.executor, ExecutorKind::Inline);
    assert_eq!(config.rotation.interval, Duration::from_millis(500));
}

#[test]
fn test_config_validation() {
    assert!(Config::default().validate().is_ok());

    let invalid = ConfigBuilder::new().rotation_interval(Duration::ZERO).build();
    assert!(invalid.is_err());

    let invalid = ConfigBuilder::new()
        .executor(ExecutorKind::Rayon)
        .polling_threads(0)
        .build();
    assert!(invalid.is_err());
}

#[test]
fn test_error_handling() {
    let result = ConfigBuilder::new().from_yaml("invalid: yaml: content: [");
    assert!(result.is_err());

    let result = ConfigBuilder::new().from_yaml(
        r#"
polling:
  executor: gpu
"#,
    );
    assert!(result.is_err());

    let result = ConfigBuilder::new().from_yaml(
        r#"
rotation:
  interval: "soon"
"#,
    );
    assert!(result.is_err());
}

#[test]
fn test_recorder_from_config() {
    let config = ConfigBuilder::new()
        .executor(ExecutorKind::Rayon)
        .polling_threads(2)
        .build()
        .unwrap();

    let (recorder, report) = PeriodicRecorderBuilder::from_config(&config)
        .unwrap()
        .build_with_report();

    assert_eq!(recorder.executor_name(), "rayon");
    assert!(!report.is_clean());
}

#[tokio::test]
async fn test_tokio_executor_from_config() {
    let config = ConfigBuilder::new()
        .executor(ExecutorKind::Tokio)
        .build()
        .unwrap();

    let recorder = PeriodicRecorderBuilder::from_config(&config).unwrap().build();
    assert_eq!(recorder.executor_name(), "tokio");
}
