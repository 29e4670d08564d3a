// tests/config_roundtrip.rs

use mptui::config::{API_URL_ENV, AppConfig, DEFAULT_API_URL};
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

// Both tests touch the real config path, so they must not interleave
static CONFIG_LOCK: Mutex<()> = Mutex::new(());

/// Captures the developer's config file and puts it back on drop, even when
/// an assertion fails mid-test. A missing file is restored as missing.
struct PreservedConfig {
    path: PathBuf,
    contents: Option<Vec<u8>>,
}

impl PreservedConfig {
    fn capture() -> Self {
        let path = AppConfig::config_path();
        let contents = fs::read(&path).ok();
        // Tests start from a clean slate
        let _ = fs::remove_file(&path);
        Self { path, contents }
    }
}

impl Drop for PreservedConfig {
    fn drop(&mut self) {
        match self.contents.take() {
            Some(contents) => {
                let _ = fs::write(&self.path, contents);
            }
            None => {
                let _ = fs::remove_file(&self.path);
            }
        }
    }
}

#[test]
fn test_config_roundtrip() {
    let _guard = CONFIG_LOCK.lock().unwrap();
    let _preserved = PreservedConfig::capture();

    let config = AppConfig {
        api_url: "http://localhost:5000/api".into(),
        download_dir: PathBuf::from("/tmp/mptui-downloads"),
        alert_timeout_secs: 3,
    };

    config.save().unwrap();
    let loaded = AppConfig::load().unwrap();

    assert_eq!(config.api_url, loaded.api_url);
    assert_eq!(config.download_dir, loaded.download_dir);
    assert_eq!(config.alert_timeout_secs, loaded.alert_timeout_secs);
}

#[test]
fn test_env_override_wins() {
    let _guard = CONFIG_LOCK.lock().unwrap();
    let _preserved = PreservedConfig::capture();

    // First run creates the file with defaults
    unsafe { std::env::set_var(API_URL_ENV, "http://converter.internal:8080/api/") };
    let config = AppConfig::load_or_create().unwrap();
    unsafe { std::env::remove_var(API_URL_ENV) };

    // Override applies, with the trailing slash stripped, but the file keeps
    // the configured default
    assert_eq!(config.api_url, "http://converter.internal:8080/api");
    let on_disk = AppConfig::load().unwrap();
    assert_eq!(on_disk.api_url, DEFAULT_API_URL);
}
