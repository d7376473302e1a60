//! Tests for uploader configuration.

use std::collections::HashMap;
use std::path::PathBuf;

use videogen_a2a_common::ConfigError;

use crate::config::*;
use crate::youtube::PrivacyStatus;

fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
    move |name: &str| map.get(name).cloned()
}

#[test]
fn defaults_when_nothing_is_set() {
    let config = UploadConfig::from_vars(vars(&[])).unwrap();
    assert_eq!(config, UploadConfig::default());
    assert_eq!(config.client_secrets, PathBuf::from("credentials.json"));
    assert_eq!(config.token_cache, PathBuf::from("token.json"));
    assert_eq!(config.privacy_status, PrivacyStatus::Private);
    assert_eq!(config.category_id, "22");
    assert!(config.temp_dir.is_none());
}

#[test]
fn overrides_from_environment() {
    let config = UploadConfig::from_vars(vars(&[
        (CLIENT_SECRETS_ENV, "/etc/yt/secrets.json"),
        (TOKEN_CACHE_ENV, "/var/lib/yt/token.json"),
        (PRIVACY_STATUS_ENV, "Unlisted"),
        (CATEGORY_ID_ENV, "28"),
        (TEMP_DIR_ENV, "/scratch"),
    ]))
    .unwrap();

    assert_eq!(config.client_secrets, PathBuf::from("/etc/yt/secrets.json"));
    assert_eq!(config.token_cache, PathBuf::from("/var/lib/yt/token.json"));
    assert_eq!(config.privacy_status, PrivacyStatus::Unlisted);
    assert_eq!(config.category_id, "28");
    assert_eq!(config.temp_dir, Some(PathBuf::from("/scratch")));
}

#[test]
fn blank_values_fall_back_to_defaults() {
    let config = UploadConfig::from_vars(vars(&[(PRIVACY_STATUS_ENV, "  "), (TEMP_DIR_ENV, "")])).unwrap();
    assert_eq!(config.privacy_status, PrivacyStatus::Private);
    assert!(config.temp_dir.is_none());
}

#[test]
fn rejects_unknown_privacy_status() {
    let err = UploadConfig::from_vars(vars(&[(PRIVACY_STATUS_ENV, "secret")])).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidValue(ref name, _) if name == PRIVACY_STATUS_ENV));
}

#[test]
fn rejects_non_numeric_category() {
    let err = UploadConfig::from_vars(vars(&[(CATEGORY_ID_ENV, "music")])).unwrap_err();
    assert!(err.to_string().contains(CATEGORY_ID_ENV));
}
