//! Configuration loading from secrets files.

use std::fs;

use paysync_service::ServiceConfig;

#[test]
fn secrets_file_takes_precedence_over_environment() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stripe.json");
    fs::write(
        &path,
        r#"{"api_key": "sk_test_from_file", "webhook_secret": "whsec_from_file"}"#,
    )
    .unwrap();

    let var = |key: &str| match key {
        "STRIPE_API_KEY" => Some("sk_test_from_env".to_string()),
        "STRIPE_WEBHOOK_SECRET" => Some("whsec_from_env".to_string()),
        _ => None,
    };
    let config = ServiceConfig::load(var, &[dir.path().join("missing.json"), path]).unwrap();

    assert_eq!(config.stripe_api_key.as_deref(), Some("sk_test_from_file"));
    assert_eq!(config.stripe_webhook_secret.as_deref(), Some("whsec_from_file"));
}

#[test]
fn unreadable_secrets_file_falls_back_to_environment() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stripe.json");
    fs::write(&path, "not json").unwrap();

    let var = |key: &str| (key == "STRIPE_API_KEY").then(|| "sk_test_from_env".to_string());
    let config = ServiceConfig::load(var, &[path]).unwrap();

    assert_eq!(config.stripe_api_key.as_deref(), Some("sk_test_from_env"));
    assert!(config.stripe_webhook_secret.is_none());
}

#[test]
fn secrets_file_without_webhook_secret() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stripe.json");
    fs::write(&path, r#"{"api_key": "sk_test_only_key"}"#).unwrap();

    let config = ServiceConfig::load(|_| None, &[path]).unwrap();

    assert_eq!(config.stripe_api_key.as_deref(), Some("sk_test_only_key"));
    assert!(config.stripe_webhook_secret.is_none());
    assert!(config.stripe_credentials().unwrap().webhook_secret.is_none());
}
