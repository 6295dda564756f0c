#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
//! Configuration loading and validation.

use network_interceptor::config::{
    InterceptorConfig, CONNECTION_HANDLER_NAME, DEFAULT_ANCHOR_STAGES, MAX_FRAME_SIZE,
};

#[test]
fn defaults_match_constants() {
    let config = InterceptorConfig::default();
    assert_eq!(config.max_frame_size, MAX_FRAME_SIZE);
    assert_eq!(
        config.anchor_stages,
        DEFAULT_ANCHOR_STAGES
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
    );
    assert!(config.catch_up_existing);
    assert!(config.close_duplicate_connections);
    assert!(config.validate().is_empty());
}

#[test]
fn full_toml_round_trip() {
    let toml = r#"
        anchor_stages = ["custom-proxy", "custom-gate"]
        max_frame_size = 65536
        catch_up_existing = false
        close_duplicate_connections = false
    "#;
    let config = InterceptorConfig::from_toml(toml).unwrap();
    assert_eq!(config.anchor_stages, vec!["custom-proxy", "custom-gate"]);
    assert_eq!(config.max_frame_size, 65536);
    assert!(!config.catch_up_existing);
    assert!(!config.close_duplicate_connections);
    assert!(config.validate().is_empty());
}

#[test]
fn invalid_toml_is_a_config_error() {
    assert!(InterceptorConfig::from_toml("max_frame_size = \"huge\"").is_err());
    assert!(InterceptorConfig::from_toml("<<<").is_err());
}

#[test]
fn file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("interceptor.toml");

    let config = InterceptorConfig::default_with_overrides(|c| {
        c.max_frame_size = 4096;
        c.anchor_stages = vec!["proxy".into()];
    });
    config.save_to_file(&path).unwrap();

    let loaded = InterceptorConfig::from_file(&path).unwrap();
    assert_eq!(loaded.max_frame_size, 4096);
    assert_eq!(loaded.anchor_stages, vec!["proxy"]);
}

#[test]
fn missing_file_is_a_config_error() {
    assert!(InterceptorConfig::from_file("/nonexistent/interceptor.toml").is_err());
}

#[test]
fn env_overrides_apply() {
    std::env::set_var("INTERCEPTOR_ANCHOR_STAGES", "one, two ,three");
    std::env::set_var("INTERCEPTOR_MAX_FRAME_SIZE", "2048");
    std::env::set_var("INTERCEPTOR_CATCH_UP_EXISTING", "false");

    let config = InterceptorConfig::from_env().unwrap();

    std::env::remove_var("INTERCEPTOR_ANCHOR_STAGES");
    std::env::remove_var("INTERCEPTOR_MAX_FRAME_SIZE");
    std::env::remove_var("INTERCEPTOR_CATCH_UP_EXISTING");

    assert_eq!(config.anchor_stages, vec!["one", "two", "three"]);
    assert_eq!(config.max_frame_size, 2048);
    assert!(!config.catch_up_existing);
    assert!(config.close_duplicate_connections);
}

#[test]
fn validation_flags_reserved_collisions_and_duplicates() {
    let config = InterceptorConfig::default_with_overrides(|c| {
        c.anchor_stages = vec![
            "proxy".into(),
            "proxy".into(),
            CONNECTION_HANDLER_NAME.into(),
            String::new(),
        ];
        c.max_frame_size = 0;
    });

    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("reserved")));
    assert!(errors.iter().any(|e| e.contains("duplicate")));
    assert!(errors.iter().any(|e| e.contains("empty")));
    assert!(errors.iter().any(|e| e.contains("greater than zero")));
}

#[test]
fn example_config_parses_back() {
    let example = InterceptorConfig::example_config();
    let parsed = InterceptorConfig::from_toml(&example).unwrap();
    assert!(parsed.validate().is_empty());
}
