use std::{env, fs, time::Duration};

use ozone_server::LogFormat;
use ozone_server::config::loader::load_config;

#[test]
fn config_parsing_and_env_overrides_and_validation() {
    // Create a temporary TOML configuration file
    let dir = tempfile::tempdir().expect("tmp dir");
    let path = dir.path().join("ozone.toml");

    let toml_content = r#"
[server]
host = "127.0.0.1"
port = 8081
request_timeout_ms = 2500

[logging]
level = "debug"
format = "pretty"

[otel]
enabled = false

[auth]
default_issuer = "bouncer"
upstream_timeout = "750ms"

[auth.issuers.bouncer]
url = "http://bouncer-hydra:4445"
introspect_path = "/oauth2/introspect"

[auth.issuers.accounts]
url = "http://accounts-hydra:4445"
introspect_path = "/admin/oauth2/introspect"

[auth.policy]
read_url = "http://keto:4466"

[auth.cache]
enabled = true
failsafe_interval = "2s"
cleanup_interval = "30s"
"#;
    fs::write(&path, toml_content).expect("write toml");

    // 1) Valid config parses
    let cfg = load_config(path.to_str()).expect("should parse config");
    assert_eq!(cfg.server.port, 8081);
    assert_eq!(cfg.request_timeout(), Duration::from_millis(2500));
    assert_eq!(cfg.logging.level.to_ascii_lowercase(), "debug");
    assert_eq!(cfg.logging.format, LogFormat::Pretty);
    assert_eq!(cfg.auth.issuers.len(), 2);
    assert_eq!(
        cfg.auth.issuers["accounts"].introspect_path,
        "/admin/oauth2/introspect"
    );
    assert_eq!(cfg.auth.upstream_timeout, Duration::from_millis(750));
    assert_eq!(cfg.auth.cache.failsafe_interval, Duration::from_secs(2));
    assert_eq!(cfg.auth.cache.cleanup_interval, Duration::from_secs(30));

    // 2) Env override should win over file
    unsafe {
        env::set_var("OZONE__SERVER__REQUEST_TIMEOUT_MS", "4000");
    }
    let cfg_env = load_config(path.to_str()).expect("should parse config with env overrides");
    assert_eq!(cfg_env.server.request_timeout_ms, 4000);
    // cleanup env var
    unsafe {
        env::remove_var("OZONE__SERVER__REQUEST_TIMEOUT_MS");
    }

    // 3) Invalid values are rejected
    let bad_path = dir.path().join("bad.toml");
    fs::write(
        &bad_path,
        r#"
[logging]
level = "loud"
"#,
    )
    .expect("write bad toml");
    let err = load_config(bad_path.to_str()).unwrap_err();
    assert!(err.contains("logging.level"), "{err}");

    let bad_auth = dir.path().join("bad_auth.toml");
    fs::write(
        &bad_auth,
        r#"
[auth]
default_issuer = "missing"
"#,
    )
    .expect("write bad auth toml");
    let err = load_config(bad_auth.to_str()).unwrap_err();
    assert!(err.contains("auth config error"), "{err}");
}

#[test]
fn explicit_missing_file_is_an_error() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let path = dir.path().join("absent.toml");
    let err = load_config(path.to_str()).unwrap_err();
    assert!(err.contains("not found"), "{err}");
}

#[test]
fn absent_default_file_falls_back_to_defaults() {
    // No ozone.toml next to the crate: defaults plus environment apply.
    let cfg = load_config(None).expect("defaults should load");
    assert_eq!(cfg.server.port, 8080);
    assert_eq!(cfg.auth.default_issuer, "bouncer");
}
