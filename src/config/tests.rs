use super::*;

#[test]
fn defaults_match_documented_values() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

    assert_eq!(settings.server.addr.to_string(), "127.0.0.1:3000");
    assert_eq!(settings.server.graceful_shutdown, Duration::from_secs(30));
    assert_eq!(settings.logging.level, LevelFilter::INFO);
    assert!(matches!(settings.logging.format, LogFormat::Compact));
    assert_eq!(settings.cache.directory, PathBuf::from("./cache"));
    assert_eq!(settings.cache.ttl, Duration::from_secs(24 * 60 * 60));
    assert!(settings.cache.sweep_interval.is_none());
    assert_eq!(settings.producer.mode, ProducerMode::Fallback);
    assert_eq!(
        settings.producer.base_url.as_str(),
        "https://wowsims.github.io/tbc/"
    );
    assert_eq!(settings.producer.timeout, Duration::from_millis(30_000));
    assert_eq!(settings.fetch.fanout_concurrency, 3);
    assert!(settings.fetch.single_flight);
    assert_eq!(settings.fetch.warm_delay, Duration::from_millis(500));
    assert!(settings.exporter.access_token.is_none());
    assert_eq!(settings.catalog, Catalog::reference());
}

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = RawSettings::default();
    raw.server.port = Some(4000);
    raw.logging.level = Some("info".to_string());
    raw.cache.ttl_hours = Some(1);

    let overrides = ServeOverrides {
        server_port: Some(4321),
        common: CommonOverrides {
            log_level: Some("debug".to_string()),
            cache_ttl_hours: Some(48),
            producer_mode: Some("upstream".to_string()),
            ..Default::default()
        },
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.server.addr.port(), 4321);
    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
    assert_eq!(settings.cache.ttl, Duration::from_secs(48 * 60 * 60));
    assert_eq!(settings.producer.mode, ProducerMode::Upstream);
}

#[test]
fn cli_json_logging_enforces_format() {
    let mut raw = RawSettings::default();
    let overrides = CommonOverrides {
        log_json: Some(true),
        ..Default::default()
    };

    raw.apply_common_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert!(matches!(settings.logging.format, LogFormat::Json));
}

#[test]
fn zero_ttl_is_rejected() {
    let mut raw = RawSettings::default();
    raw.cache.ttl_hours = Some(0);

    let err = Settings::from_raw(raw).expect_err("zero ttl must fail");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "cache.ttl_hours",
            ..
        }
    ));
}

#[test]
fn unknown_producer_mode_is_rejected() {
    let mut raw = RawSettings::default();
    raw.producer.mode = Some("scrape-harder".to_string());

    let err = Settings::from_raw(raw).expect_err("bad mode must fail");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "producer.mode",
            ..
        }
    ));
}

#[test]
fn base_urls_gain_trailing_slash() {
    let mut raw = RawSettings::default();
    raw.producer.base_url = Some("http://localhost:8080/tbc".to_string());

    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(
        settings.producer.base_url.join("mage/").expect("join").as_str(),
        "http://localhost:8080/tbc/mage/"
    );
}

#[test]
fn custom_catalog_and_phase_bound() {
    let mut raw = RawSettings::default();
    raw.catalog.categories = Some(BTreeMap::from([(
        "mage".to_string(),
        vec!["frost".to_string(), "fire".to_string()],
    )]));
    raw.catalog.phase_max = Some(3);

    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(settings.catalog.phases().to_vec(), vec![1, 2, 3]);
    assert!(settings.catalog.contains_pair("mage", "fire"));
    assert!(!settings.catalog.contains_pair("druid", "feral"));
}

#[test]
fn reference_catalog_follows_configured_phase_bound() {
    let mut raw = RawSettings::default();
    raw.catalog.phase_max = Some(8);

    let settings = Settings::from_raw(raw).expect("valid settings");
    assert!(settings.catalog.validate_key("mage", "frost", 8).is_ok());
    assert_eq!(settings.catalog.categories().count(), 9);
}

#[test]
fn invalid_catalog_identifier_is_rejected() {
    let mut raw = RawSettings::default();
    raw.catalog.categories = Some(BTreeMap::from([(
        "Mage".to_string(),
        vec!["frost".to_string()],
    )]));

    assert!(matches!(
        Settings::from_raw(raw),
        Err(LoadError::Invalid {
            key: "catalog.categories",
            ..
        })
    ));
}

#[test]
fn blank_access_token_disables_export() {
    let mut raw = RawSettings::default();
    raw.exporter.access_token = Some("   ".to_string());

    let settings = Settings::from_raw(raw).expect("valid settings");
    assert!(settings.exporter.access_token.is_none());
}

#[test]
fn default_to_serve_command() {
    let args = CliArgs::parse_from(["gearcache"]);
    let command = args
        .command
        .unwrap_or(Command::Serve(Box::<ServeArgs>::default()));
    assert!(matches!(command, Command::Serve(_)));
}

#[test]
fn parse_serve_overrides() {
    let args = CliArgs::parse_from([
        "gearcache",
        "serve",
        "--server-host",
        "0.0.0.0",
        "--server-port",
        "8080",
        "--cache-dir",
        "/tmp/gear",
    ]);

    match args.command.expect("serve command") {
        Command::Serve(serve) => {
            assert_eq!(serve.overrides.server_host.as_deref(), Some("0.0.0.0"));
            assert_eq!(serve.overrides.server_port, Some(8080));
            assert_eq!(
                serve.overrides.common.cache_dir.as_deref(),
                Some(std::path::Path::new("/tmp/gear"))
            );
        }
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn parse_fetch_arguments() {
    let args = CliArgs::parse_from(["gearcache", "fetch", "mage", "frost", "--phase", "3"]);

    match args.command.expect("fetch command") {
        Command::Fetch(fetch) => {
            assert_eq!(fetch.class, "mage");
            assert_eq!(fetch.spec, "frost");
            assert_eq!(fetch.phase, Some(3));
        }
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn parse_cache_subcommands() {
    let args = CliArgs::parse_from(["gearcache", "cache", "clear"]);
    match args.command.expect("cache command") {
        Command::Cache(cache) => assert_eq!(cache.command, CacheCommand::Clear),
        _ => panic!("wrong command parsed"),
    }

    let args = CliArgs::parse_from(["gearcache", "cache", "--cache-dir", "/tmp/x", "keys"]);
    match args.command.expect("cache command") {
        Command::Cache(cache) => {
            assert_eq!(cache.command, CacheCommand::Keys);
            assert!(cache.overrides.cache_dir.is_some());
        }
        _ => panic!("wrong command parsed"),
    }
}
