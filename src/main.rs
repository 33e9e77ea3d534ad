use std::{future::IntoFuture, net::SocketAddr, process, sync::Arc, time::Duration};

use newsroom::{
    cache::{ContentCache, SweeperHandle, spawn_sweeper},
    config::{self, Command, Settings},
    infra::{
        cache_warmer::CacheWarmer,
        error::InfraError,
        http::{self, AdminState, RateLimiter},
        telemetry,
        upstream::HttpContentSource,
    },
};
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

fn report_application_error(error: &InfraError) {
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

async fn run() -> Result<(), InfraError> {
    let (cli_args, settings) = config::load_with_cli()?;

    let command = cli_args
        .command
        .unwrap_or(Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging)?;

    match command {
        Command::Serve(_) => run_serve(settings).await,
    }
}

async fn run_serve(settings: Settings) -> Result<(), InfraError> {
    let cache = Arc::new(ContentCache::new());
    let warmer = build_warmer(&settings, &cache)?;

    // Warm in the background so the listener comes up immediately.
    if settings.cache.warm_on_startup {
        match warmer.clone() {
            Some(warmer) => {
                tokio::spawn(async move {
                    warmer.warm().await;
                });
            }
            None => info!(
                target = "newsroom::startup",
                "no upstream configured; skipping cache warm"
            ),
        }
    }

    let sweeper: Option<SweeperHandle> = settings
        .cache
        .enable_background_sweep
        .then(|| spawn_sweeper(Arc::clone(&cache), settings.cache.sweep_interval()));

    let rate_limiter = RateLimiter::new(
        Duration::from_secs(settings.rate_limit.window_seconds.get().into()),
        settings.rate_limit.max_requests.get(),
    );
    let state = AdminState {
        cache: Arc::clone(&cache),
        warmer,
        rate_limiter,
    };

    let result = serve_admin(&settings, state).await;

    if let Some(sweeper) = sweeper {
        sweeper.stop().await;
    }
    info!(
        target = "newsroom::shutdown",
        entries = cache.len(),
        "newsroom stopped"
    );

    result
}

fn build_warmer(
    settings: &Settings,
    cache: &Arc<ContentCache>,
) -> Result<Option<Arc<CacheWarmer>>, InfraError> {
    let source = HttpContentSource::from_settings(&settings.upstream)?;
    Ok(source.map(|source| {
        Arc::new(CacheWarmer::new(
            Arc::clone(cache),
            Arc::new(source),
            settings.cache.ttl.clone(),
        ))
    }))
}

async fn serve_admin(settings: &Settings, state: AdminState) -> Result<(), InfraError> {
    let router = http::build_admin_router(state);
    let listener = tokio::net::TcpListener::bind(settings.server.admin_addr).await?;
    info!(
        target = "newsroom::startup",
        addr = %settings.server.admin_addr,
        "admin listener bound"
    );

    let drain = Arc::new(Notify::new());
    let server = axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown({
        let drain = Arc::clone(&drain);
        async move { drain.notified().await }
    });
    let mut server = tokio::spawn(server.into_future());

    let finished = tokio::select! {
        joined = &mut server => Some(joined),
        () = shutdown_signal() => None,
    };

    let joined = match finished {
        Some(joined) => joined,
        None => {
            info!(target = "newsroom::shutdown", "shutdown signal received; draining");
            drain.notify_one();
            match tokio::time::timeout(settings.server.graceful_shutdown, &mut server).await {
                Ok(joined) => joined,
                Err(_) => {
                    warn!(
                        target = "newsroom::shutdown",
                        timeout_secs = settings.server.graceful_shutdown.as_secs(),
                        "graceful shutdown timed out; aborting connections"
                    );
                    server.abort();
                    return Ok(());
                }
            }
        }
    };

    joined
        .map_err(|err| InfraError::server(format!("admin server task failed: {err}")))?
        .map_err(|err| InfraError::server(format!("admin server error: {err}")))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(
                target = "newsroom::shutdown",
                error = %err,
                "failed to listen for ctrl-c"
            );
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!(
                    target = "newsroom::shutdown",
                    error = %err,
                    "failed to listen for SIGTERM"
                );
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
