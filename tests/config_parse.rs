use edit_relay::config::Config;

#[test]
fn parse_example_config() {
    let raw = include_str!("../edit-relay.example.toml");
    let cfg: Config = toml::from_str(raw).expect("parse TOML");
    assert_eq!(cfg.chunking.threshold, 50_000);
    assert_eq!(cfg.run.max_concurrency, 5);
    assert_eq!(cfg.endpoint.max_retries, 3);
    assert_eq!(cfg.endpoint.retry_base_delay_seconds, 2);
    assert_eq!(cfg.endpoint.request_timeout_seconds, 120);
    assert_eq!(cfg.source.list_field, "data");
}

#[test]
fn defaults_match_example() {
    let cfg = Config::default();
    assert_eq!(cfg.chunking.threshold, 50_000);
    assert_eq!(cfg.run.max_concurrency, 5);
    assert_eq!(cfg.endpoint.url, "http://localhost:5000/process");
    assert_eq!(cfg.endpoint.max_retries, 3);
    assert!(!cfg.output.out_dir.is_empty());
}

#[test]
fn partial_config_fills_defaults() {
    let cfg: Config = toml::from_str(
        r#"
        [chunking]
        threshold = 10

        [endpoint]
        url = "http://127.0.0.1:9000/process"
        health_path = "/health"
        request_timeout_seconds = 5
        health_timeout_seconds = 1
        max_retries = 1
        retry_base_delay_seconds = 0
        retry_max_delay_seconds = 0
        "#,
    )
    .expect("parse TOML");

    assert_eq!(cfg.chunking.threshold, 10);
    assert_eq!(cfg.endpoint.max_retries, 1);
    // Untouched sections keep their defaults.
    assert_eq!(cfg.run.max_concurrency, 5);
    assert_eq!(cfg.source.list_field, "data");
}
