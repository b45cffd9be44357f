use std::io::Write;

use serial_test::serial;
use tempfile::NamedTempFile;

use super::*;

const ENV_KEYS: [&str; 3] = [
    "QUERY_REMEMBER__CACHE__LENGTH_MINUTES",
    "QUERY_REMEMBER__CACHE__ON_STORE_ERROR",
    "QUERY_REMEMBER__LOGGING__JSON",
];

fn clear_env() {
    for key in ENV_KEYS {
        // SAFETY: env-touching tests are serialized with `#[serial]`.
        unsafe { std::env::remove_var(key) };
    }
}

fn toml_file(contents: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("temp config file");
    file.write_all(contents.as_bytes())
        .expect("write temp config");
    file
}

#[test]
fn defaults_apply_without_sources() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

    assert_eq!(settings.cache, CacheSettings::default());
    assert_eq!(settings.cache.default_store, "memory");
    assert_eq!(settings.cache.length.as_minutes(), 30);
    assert_eq!(settings.cache.capacity.get(), 1024);
    assert!(settings.cache.tagging);
    assert_eq!(settings.cache.options(), CacheOptions::default());
    assert_eq!(settings.logging.level, LevelFilter::INFO);
    assert_eq!(settings.logging.format, LogFormat::Compact);
}

#[test]
fn zero_length_disables_caching() {
    let mut raw = RawSettings::default();
    raw.cache.length_minutes = Some(0);

    let settings = Settings::from_raw(raw).expect("valid settings");
    assert!(!settings.cache.length.is_enabled());
    assert!(!settings.cache.configuration().length.is_enabled());
}

#[test]
fn negative_length_is_rejected() {
    let mut raw = RawSettings::default();
    raw.cache.length_minutes = Some(-1);

    let err = Settings::from_raw(raw).expect_err("negative length");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "cache.length_minutes",
            ..
        }
    ));
}

#[test]
fn zero_capacity_is_rejected() {
    let mut raw = RawSettings::default();
    raw.cache.capacity = Some(0);

    let err = Settings::from_raw(raw).expect_err("zero capacity");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "cache.capacity",
            ..
        }
    ));
}

#[test]
fn unknown_store_error_policy_is_rejected() {
    let mut raw = RawSettings::default();
    raw.cache.on_store_error = Some("retry".to_string());

    let err = Settings::from_raw(raw).expect_err("unknown policy");
    assert!(err.to_string().contains("cache.on_store_error"));
}

#[test]
fn bad_log_level_is_rejected() {
    let mut raw = RawSettings::default();
    raw.logging.level = Some("chatty".to_string());

    let err = Settings::from_raw(raw).expect_err("bad level");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "logging.level",
            ..
        }
    ));
}

#[test]
#[serial]
fn file_values_are_loaded() {
    clear_env();
    let file = toml_file(
        r#"
[cache]
default_store = "local"
length_minutes = 5
tagging = false
single_flight = false
on_store_error = "bypass"

[logging]
level = "debug"
json = true
"#,
    );

    let settings = load(Some(file.path())).expect("settings load");

    assert_eq!(settings.cache.default_store, "local");
    assert_eq!(settings.cache.length.as_minutes(), 5);
    assert!(!settings.cache.tagging);
    assert_eq!(
        settings.cache.options(),
        CacheOptions {
            single_flight: false,
            on_store_error: StoreErrorPolicy::Bypass,
        }
    );
    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
    assert_eq!(settings.logging.format, LogFormat::Json);
}

#[test]
#[serial]
fn environment_overrides_file() {
    clear_env();
    let file = toml_file(
        r#"
[cache]
length_minutes = 5
"#,
    );

    // SAFETY: env-touching tests are serialized with `#[serial]`.
    unsafe {
        std::env::set_var("QUERY_REMEMBER__CACHE__LENGTH_MINUTES", "45");
        std::env::set_var("QUERY_REMEMBER__CACHE__ON_STORE_ERROR", "bypass");
    }
    let settings = load(Some(file.path()));
    clear_env();

    let settings = settings.expect("settings load");
    assert_eq!(settings.cache.length.as_minutes(), 45);
    assert_eq!(settings.cache.on_store_error, StoreErrorPolicy::Bypass);
}

#[test]
#[serial]
fn missing_explicit_file_is_a_build_error() {
    clear_env();
    let dir = tempfile::tempdir().expect("temp dir");
    let missing = dir.path().join("absent.toml");

    let err = load(Some(missing.as_path())).expect_err("missing file");
    assert!(matches!(err, LoadError::Build(_)));
}
