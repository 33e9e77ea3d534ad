use std::io::Write;

use serial_test::serial;
use tempfile::NamedTempFile;

use super::*;

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("tmp file");
    file.write_all(contents.as_bytes()).expect("write temp config");
    file
}

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = RawSettings::default();
    raw.server.admin_port = Some(4000);
    raw.logging.level = Some("info".to_string());

    let overrides = ServeOverrides {
        admin_port: Some(4321),
        log_level: Some("debug".to_string()),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.server.admin_addr.port(), 4321);
    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
}

#[test]
fn defaults_are_valid() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

    assert_eq!(settings.server.admin_addr.port(), DEFAULT_ADMIN_PORT);
    assert_eq!(settings.server.graceful_shutdown, Duration::from_secs(30));
    assert!(settings.upstream.base_url.is_none());
    assert_eq!(settings.rate_limit.max_requests.get(), 120);
    assert_eq!(settings.cache.ttl.search_secs, 60);
    assert!(matches!(settings.logging.format, LogFormat::Compact));
}

#[test]
fn cli_json_logging_enforces_format() {
    let mut raw = RawSettings::default();
    let overrides = ServeOverrides {
        log_json: Some(true),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert!(matches!(settings.logging.format, LogFormat::Json));
}

#[test]
fn cache_overrides_apply() {
    let mut raw = RawSettings::default();
    let overrides = ServeOverrides {
        cache_sweep_interval_ms: Some(250),
        cache_background_sweep: Some(false),
        cache_warm_on_startup: Some(false),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.cache.sweep_interval(), Duration::from_millis(250));
    assert!(!settings.cache.enable_background_sweep);
    assert!(!settings.cache.warm_on_startup);
}

#[test]
fn zero_values_are_rejected_with_key() {
    let mut raw = RawSettings::default();
    raw.rate_limit.max_requests = Some(0);
    match Settings::from_raw(raw) {
        Err(LoadError::Invalid { key, .. }) => assert_eq!(key, "rate_limit.max_requests"),
        other => panic!("unexpected result: {other:?}"),
    }

    let mut raw = RawSettings::default();
    raw.cache.sweep_interval_ms = 0;
    match Settings::from_raw(raw) {
        Err(LoadError::Invalid { key, .. }) => assert_eq!(key, "cache.sweep_interval_ms"),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn upstream_url_is_validated() {
    let mut raw = RawSettings::default();
    raw.upstream.base_url = Some("ftp://cms.example".to_string());
    assert!(matches!(
        Settings::from_raw(raw),
        Err(LoadError::Invalid {
            key: "upstream.base_url",
            ..
        })
    ));

    let mut raw = RawSettings::default();
    raw.upstream.base_url = Some("   ".to_string());
    let settings = Settings::from_raw(raw).expect("blank url means no upstream");
    assert!(settings.upstream.base_url.is_none());

    let mut raw = RawSettings::default();
    raw.upstream.base_url = Some("https://cms.example/wp-json/".to_string());
    let settings = Settings::from_raw(raw).expect("valid url");
    assert_eq!(
        settings.upstream.base_url.as_ref().map(Url::as_str),
        Some("https://cms.example/wp-json/")
    );
}

#[test]
#[serial]
fn config_file_layers_under_cli() {
    let file = write_config(
        r#"
[server]
admin_port = 4100

[upstream]
base_url = "https://cms.example/api/"

[cache]
sweep_interval_ms = 5000

[cache.ttl]
post_list_secs = 120
"#,
    );

    let args = CliArgs::parse_from([
        "newsroom",
        "--config-file",
        file.path().to_str().expect("utf-8 temp path"),
        "serve",
        "--server-admin-port",
        "4200",
    ]);
    let settings = load(&args).expect("load settings");

    assert_eq!(settings.server.admin_addr.port(), 4200);
    assert_eq!(settings.cache.sweep_interval_ms, 5000);
    assert_eq!(settings.cache.ttl.post_list_secs, 120);
    assert_eq!(settings.cache.ttl.post_secs, 900);
    assert!(settings.upstream.base_url.is_some());
}

#[test]
#[serial]
fn environment_overrides_file_and_cli_overrides_environment() {
    let file = write_config(
        r#"
[cache]
sweep_interval_ms = 5000

[rate_limit]
max_requests = 10
"#,
    );

    // SAFETY: serialized with every other test that reads the environment.
    unsafe {
        std::env::set_var("NEWSROOM__CACHE__SWEEP_INTERVAL_MS", "750");
        std::env::set_var("NEWSROOM__RATE_LIMIT__MAX_REQUESTS", "20");
    }

    let args = CliArgs::parse_from([
        "newsroom",
        "--config-file",
        file.path().to_str().expect("utf-8 temp path"),
        "serve",
        "--rate-limit-max-requests",
        "30",
    ]);
    let loaded = load(&args);

    unsafe {
        std::env::remove_var("NEWSROOM__CACHE__SWEEP_INTERVAL_MS");
        std::env::remove_var("NEWSROOM__RATE_LIMIT__MAX_REQUESTS");
    }

    let settings = loaded.expect("load settings");
    assert_eq!(settings.cache.sweep_interval_ms, 750);
    assert_eq!(settings.rate_limit.max_requests.get(), 30);
}

#[test]
fn default_to_serve_command() {
    let args = CliArgs::parse_from(["newsroom"]);
    let command = args
        .command
        .unwrap_or(Command::Serve(Box::<ServeArgs>::default()));
    assert!(matches!(command, Command::Serve(_)));
}

#[test]
fn parse_serve_overrides() {
    let args = CliArgs::parse_from([
        "newsroom",
        "serve",
        "--server-host",
        "0.0.0.0",
        "--upstream-base-url",
        "http://cms.internal",
        "--cache-background-sweep",
        "off",
    ]);

    match args.command.expect("serve command") {
        Command::Serve(serve) => {
            assert_eq!(serve.overrides.server_host.as_deref(), Some("0.0.0.0"));
            assert_eq!(
                serve.overrides.upstream_base_url.as_deref(),
                Some("http://cms.internal")
            );
            assert_eq!(serve.overrides.cache_background_sweep, Some(false));
        }
    }
}
