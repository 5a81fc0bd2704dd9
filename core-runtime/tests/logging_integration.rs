//! Integration tests for logging system

use core_runtime::logging::{init_logging, LogEntry, LogFormat, LogLevel, LoggingConfig};
use core_runtime::Error;

#[test]
fn test_logging_initialization_once() {
    // Only one global subscriber per process; the second call must fail.
    let config = LoggingConfig::default()
        .with_format(LogFormat::Compact)
        .with_level(LogLevel::Debug);

    assert!(init_logging(config.clone()).is_ok());
    assert!(matches!(
        init_logging(config),
        Err(Error::AlreadyInitialized)
    ));
}

#[test]
fn test_format_selection() {
    // Debug builds should default to Pretty
    #[cfg(debug_assertions)]
    {
        let config = LoggingConfig::default();
        assert_eq!(config.format, LogFormat::Pretty);
    }

    // Release builds should default to JSON
    #[cfg(not(debug_assertions))]
    {
        let config = LoggingConfig::default();
        assert_eq!(config.format, LogFormat::Json);
    }
}

#[test]
fn test_filter_configuration() {
    let config = LoggingConfig::default().with_filter("core_playback::queue=trace");

    assert_eq!(
        config.filter,
        Some("core_playback::queue=trace".to_string())
    );
}

#[test]
fn test_invalid_filter_is_rejected() {
    let config = LoggingConfig::default().with_filter("core_playback=notalevel");
    assert!(matches!(init_logging(config), Err(Error::Config(_))));
}

#[test]
fn test_config_chaining() {
    let config = LoggingConfig::default()
        .with_format(LogFormat::Json)
        .with_level(LogLevel::Warn)
        .with_spans(false)
        .with_target(false)
        .with_thread_info(true);

    assert_eq!(config.format, LogFormat::Json);
    assert_eq!(config.level, LogLevel::Warn);
    assert!(!config.enable_spans);
    assert!(!config.display_target);
    assert!(config.display_thread_info);
}

#[test]
fn test_log_entry_builder() {
    let entry = LogEntry::new(LogLevel::Info, "core_playback::holder", "prepared")
        .with_field("holder", "7");

    assert_eq!(entry.level, LogLevel::Info);
    assert_eq!(entry.target, "core_playback::holder");
    assert_eq!(entry.fields.get("holder"), Some(&"7".to_string()));
    assert!(entry.span_id.is_none());
}
