use pagewatch_common::observability::{LogConfig, init_logging};

// Separate test binary: the global subscriber is still unset here.
#[test]
fn unwritable_log_dir_falls_back_to_stderr() {
    let tmp = tempfile::tempdir().unwrap();
    let blocker = tmp.path().join("plain-file");
    std::fs::write(&blocker, b"not a directory").unwrap();

    let resolved = init_logging(LogConfig {
        app_name: "pagewatch-fallback",
        log_dir: Some(blocker.join("sub")),
        emit_stderr: false,
        ..LogConfig::default()
    })
    .expect("logging setup never aborts on a bad directory");
    assert_eq!(resolved, None);

    tracing::info!("still.logging");
    assert_eq!(init_logging(LogConfig::default()).unwrap(), None);
    assert!(!blocker.join("sub").exists());
}
