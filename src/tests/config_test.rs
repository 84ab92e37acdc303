use crate::config::Config;
use std::path::Path;

#[test]
fn parses_key_value_lines() {
    let config = Config::parse_str("PORT=9090\nDOC_ROOT=www\nAUTH_TOKEN=s3cret\n");
    assert_eq!(config.port(), 9090);
    assert_eq!(config.doc_root(), Path::new("www"));
    assert_eq!(config.auth_token(), Some("s3cret"));
}

#[test]
fn skips_comments_and_blank_lines() {
    let config = Config::parse_str("# a comment\n\nPORT=7000\n# PORT=9\n");
    assert_eq!(config.port(), 7000);
}

#[test]
fn trims_whitespace_around_keys_and_values() {
    let config = Config::parse_str("  PORT = 6000  \n");
    assert_eq!(config.port(), 6000);
}

#[test]
fn keys_are_case_sensitive() {
    let config = Config::parse_str("port=9999\n");
    assert_eq!(config.get("port"), Some("9999"));
    assert_eq!(config.port(), 8080, "lowercase `port` is an unknown key");
}

#[test]
fn unknown_keys_are_preserved() {
    let config = Config::parse_str("PLUGIN_SPECIFIC=thing\n");
    assert_eq!(config.get("PLUGIN_SPECIFIC"), Some("thing"));
}

#[test]
fn defaults_apply_when_keys_are_absent() {
    let config = Config::new();
    assert_eq!(config.port(), 8080);
    assert_eq!(config.doc_root(), Path::new("public"));
    assert_eq!(config.default_file(), "index.html");
    assert_eq!(config.upload_dir(), Path::new("uploads"));
    assert_eq!(config.max_upload_size(), 10 * 1024 * 1024);
    assert_eq!(config.auth_token(), None);
    assert_eq!(config.queue_cap(), 1024);
    assert!(config.thread_count() >= 1);
}

#[test]
fn unparseable_values_fall_back_to_defaults() {
    let config = Config::parse_str("PORT=not-a-port\nMAX_UPLOAD_SIZE=lots\n");
    assert_eq!(config.port(), 8080);
    assert_eq!(config.max_upload_size(), 10 * 1024 * 1024);
}

#[test]
fn zero_thread_count_falls_back_to_cpu_count() {
    let config = Config::parse_str("THREAD_COUNT=0\n");
    assert!(config.thread_count() >= 1);
}

#[test]
fn empty_auth_token_counts_as_unset() {
    let config = Config::parse_str("AUTH_TOKEN=\n");
    assert_eq!(config.auth_token(), None);
}

#[test]
fn lines_without_equals_are_ignored() {
    let config = Config::parse_str("JUSTAKEY\nPORT=5000\n");
    assert_eq!(config.get("JUSTAKEY"), None);
    assert_eq!(config.port(), 5000);
}

#[test]
fn programmatic_set_overrides() {
    let mut config = Config::new();
    config.set("PORT", "0").set("THREAD_COUNT", "2");
    assert_eq!(config.port(), 0);
    assert_eq!(config.thread_count(), 2);
}

#[test]
fn loads_from_a_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.conf");
    std::fs::write(&path, "PORT=4321\n").unwrap();

    let config = Config::load(&path).unwrap();
    assert_eq!(config.port(), 4321);

    assert!(Config::load(dir.path().join("missing.conf")).is_err());
}
