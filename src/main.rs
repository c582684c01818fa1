use std::{
    io::{self, Write},
    process,
    sync::Arc,
};

use mdmirror::{
    application::{
        MirrorConfig, MirrorServices,
        error::AppError,
    },
    cache::{CacheConfig, DocumentCache, MemoryCacheStore, MutationBus},
    config::{self, RenderDocument},
    domain::{entities::SiteOptions, types::Taxonomy},
    infra::{
        content::MemoryContentStore,
        convert::HtmlConverter,
        error::InfraError,
        http::{self, HttpState},
        telemetry,
    },
};
use tokio::sync::oneshot;
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
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Render(args) => run_render(settings, args.document).await,
    }
}

async fn build_services(settings: &config::Settings) -> Result<MirrorServices, AppError> {
    let bus = Arc::new(MutationBus::new());

    let store = match settings.content.seed_path.as_ref() {
        Some(path) => MemoryContentStore::load_seed(path, &settings.mirror, bus.clone()).await?,
        None => {
            warn!("No content seed configured, serving an empty site");
            MemoryContentStore::new(
                SiteOptions {
                    title: String::new(),
                    description: String::new(),
                    custom_summary: settings.mirror.custom_summary.clone(),
                    eligible_types: settings.mirror.eligible_types.clone(),
                },
                bus.clone(),
            )
        }
    };

    let cache_config = CacheConfig::from(&settings.cache);
    let cache = DocumentCache::new(Arc::new(MemoryCacheStore::new(&cache_config)), &cache_config);

    let services = MirrorServices::new(
        MirrorConfig::from(&settings.mirror),
        Arc::new(store),
        Arc::new(HtmlConverter::new()),
        cache,
    );
    services.subscribe_invalidation(&bus);

    Ok(services)
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let services = build_services(&settings).await?;
    let router = http::build_router(HttpState { services });

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(
        addr = %settings.server.addr,
        site_url = %settings.mirror.site_url,
        "Markdown mirror listening"
    );

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let mut server = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            })
            .await
    });

    tokio::select! {
        joined = &mut server => return server_result(joined),
        signal = tokio::signal::ctrl_c() => {
            signal.map_err(|err| AppError::from(InfraError::from(err)))?;
            info!(
                grace_seconds = settings.server.graceful_shutdown.as_secs(),
                "Shutdown signal received"
            );
            let _ = shutdown_tx.send(());
        }
    }

    match tokio::time::timeout(settings.server.graceful_shutdown, server).await {
        Ok(joined) => server_result(joined),
        Err(_) => {
            warn!("Graceful shutdown timed out, dropping open connections");
            Ok(())
        }
    }
}

fn server_result(
    joined: Result<Result<(), io::Error>, tokio::task::JoinError>,
) -> Result<(), AppError> {
    joined
        .map_err(|err| AppError::unexpected(format!("server task failed: {err}")))?
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))
}

async fn run_render(settings: config::Settings, document: RenderDocument) -> Result<(), AppError> {
    let services = build_services(&settings).await?;

    let output = match document {
        RenderDocument::Index => services.index.get_or_build().await,
        RenderDocument::Basic => services.context.get_or_build_basic().await,
        RenderDocument::Full => services.context.get_or_build_full().await,
        RenderDocument::Entity { slug } => services.markdown.get_or_build_eligible(&slug).await,
        RenderDocument::Taxonomy { taxonomy, term } => {
            let taxonomy = taxonomy.parse::<Taxonomy>()?;
            services.taxonomy.get_or_build(taxonomy, &term).await
        }
    }?;

    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{output}")
        .and_then(|()| stdout.flush())
        .map_err(|err| AppError::from(InfraError::from(err)))
}
