use std::{process, sync::Arc, time::Duration};

use gearcache::{
    application::{
        error::AppError,
        export::ExportService,
        fetch::{FetchOptions, FetchService},
    },
    cache::{CacheConfig, ReadThroughCache, spawn_sweeper},
    config,
    domain::GearRecord,
    infra::{
        error::InfraError,
        exporter::build_exporter,
        http::{self, AppState},
        producer::build_producer,
        telemetry,
    },
};
use serde::Serialize;
use tokio::sync::Notify;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    let app = build_application_context(&settings).await?;

    match command {
        config::Command::Serve(_) => run_serve(&settings, app).await,
        config::Command::Fetch(args) => run_fetch(app, args).await,
        config::Command::Warm(_) => run_warm(app).await,
        config::Command::Cache(args) => run_cache(app, args.command).await,
    }
}

struct ApplicationContext {
    cache: Arc<ReadThroughCache<GearRecord>>,
    fetch: Arc<FetchService>,
    export: Arc<ExportService>,
}

async fn build_application_context(
    settings: &config::Settings,
) -> Result<ApplicationContext, AppError> {
    let cache = Arc::new(ReadThroughCache::<GearRecord>::from_config(
        &CacheConfig::from(&settings.cache),
    ));
    let cache_ready = cache.init_or_degrade().await;

    let producer = build_producer(&settings.producer)?;
    let fetch = Arc::new(FetchService::new(
        Arc::new(settings.catalog.clone()),
        cache.clone(),
        producer,
        FetchOptions::from(&settings.fetch),
    ));
    let exporter = build_exporter(&settings.exporter)?;
    let export = Arc::new(ExportService::new(fetch.clone(), exporter));

    info!(
        target = "gearcache::startup",
        cache_dir = %settings.cache.directory.display(),
        cache_ready,
        ttl_secs = settings.cache.ttl.as_secs(),
        producer = fetch.producer_name(),
        exporter = export.is_configured(),
        "Services ready"
    );

    Ok(ApplicationContext {
        cache,
        fetch,
        export,
    })
}

async fn run_serve(settings: &config::Settings, app: ApplicationContext) -> Result<(), AppError> {
    let sweeper = settings
        .cache
        .sweep_interval
        .map(|interval| spawn_sweeper(app.cache.clone(), interval));

    let router = http::build_router(AppState::new(app.fetch, app.export));
    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(
        target = "gearcache::startup",
        addr = %settings.server.addr,
        "Listening"
    );

    let result = serve_until_shutdown(listener, router, settings.server.graceful_shutdown).await;

    if let Some(handle) = sweeper {
        handle.abort();
        let _ = handle.await;
    }

    result
}

async fn serve_until_shutdown(
    listener: tokio::net::TcpListener,
    router: axum::Router,
    grace: Duration,
) -> Result<(), AppError> {
    let stopping = Arc::new(Notify::new());
    let trigger = stopping.clone();
    let server = axum::serve(listener, router.into_make_service()).with_graceful_shutdown(
        async move {
            shutdown_signal().await;
            info!(target = "gearcache::shutdown", "Shutdown requested");
            trigger.notify_one();
        },
    );

    tokio::select! {
        result = server => {
            result.map_err(|err| AppError::unexpected(format!("server error: {err}")))
        }
        _ = async {
            stopping.notified().await;
            tokio::time::sleep(grace).await;
        } => {
            warn!(
                target = "gearcache::shutdown",
                grace_secs = grace.as_secs(),
                "In-flight requests did not drain in time"
            );
            Ok(())
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(target = "gearcache::shutdown", error = %err, "ctrl-c handler failed");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(target = "gearcache::shutdown", error = %err, "SIGTERM handler failed");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

async fn run_fetch(app: ApplicationContext, args: config::FetchArgs) -> Result<(), AppError> {
    match args.phase {
        Some(phase) => {
            let fetched = app.fetch.fetch_one(&args.class, &args.spec, phase).await?;
            info!(
                target = "gearcache::fetch",
                key = %fetched.key,
                cached = fetched.cached(),
                degraded = fetched.degraded(),
                records = fetched.records.len(),
                "Fetched phase"
            );
            print_json(&fetched.records)
        }
        None => {
            let batch = app.fetch.fetch_all_phases(&args.class, &args.spec).await?;
            let failed = batch.failed_phases();
            print_json(&batch.records())?;
            if failed.is_empty() {
                Ok(())
            } else {
                Err(AppError::unexpected(format!(
                    "phases {failed:?} could not be fetched"
                )))
            }
        }
    }
}

async fn run_warm(app: ApplicationContext) -> Result<(), AppError> {
    let report = app.fetch.warm_catalog().await;
    if report.failed > 0 {
        return Err(AppError::unexpected(format!(
            "{} of {} keys could not be warmed",
            report.failed, report.keys
        )));
    }
    Ok(())
}

async fn run_cache(app: ApplicationContext, command: config::CacheCommand) -> Result<(), AppError> {
    match command {
        config::CacheCommand::Keys => {
            for key in app.fetch.cache_keys().await {
                println!("{key}");
            }
        }
        config::CacheCommand::Clear => {
            let removed = app.fetch.invalidate_all().await?;
            info!(target = "gearcache::cache", removed, "Cache cleared");
        }
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<(), AppError> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|err| AppError::unexpected(format!("failed to render JSON: {err}")))?;
    println!("{rendered}");
    Ok(())
}
