use form13f::{SecClient, SecConfig};
use std::{
    fs,
    path::{Path, PathBuf},
};

pub fn fixture_path(relative: impl AsRef<Path>) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(relative)
}

pub fn read_fixture(relative: impl AsRef<Path>) -> String {
    fs::read_to_string(fixture_path(relative)).expect("fixture file should be readable")
}

#[allow(dead_code)]
pub fn read_fixture_bytes(relative: impl AsRef<Path>) -> Vec<u8> {
    fs::read(fixture_path(relative)).expect("fixture file should be readable")
}

/// Client pointed at a mock server, with a rate limit high enough not to slow
/// the tests down.
#[allow(dead_code)]
pub fn mock_client(base_url: &str) -> SecClient {
    let config = SecConfig {
        user_agent: "test_agent example@example.com".to_string(),
        rate_limit: 1000,
        ..SecConfig::default()
    }
    .with_base_url(base_url);
    SecClient::with_config(config).unwrap()
}
