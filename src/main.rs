use std::process;
use std::sync::Arc;

use rigenera::{
    application::{
        coordinator::RequestCoordinator,
        error::AppError,
        observer::TelemetryObserver,
        regen::RegenerationService,
        renderer::Renderer,
    },
    cache::{
        config::EngineConfig,
        registry::PathRegistry,
        store::{ArtifactStore, MemoryStore},
    },
    config::{self, Command, RenderArgs, Settings},
    domain::key::RouteKey,
    infra::{
        error::InfraError,
        http::{self, HttpState},
        markdown::MarkdownRenderer,
        telemetry,
        warmer::CacheWarmer,
    },
};
use tokio::net::TcpListener;
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
    telemetry::init(&settings.logging)?;

    match cli_args.command.unwrap_or(Command::Serve) {
        Command::Serve => run_serve(settings).await,
        Command::Render(args) => run_render(settings, args).await,
    }
}

async fn run_serve(settings: Settings) -> Result<(), AppError> {
    let coordinator = build_engine(&settings)?;

    if settings.cache.warm_on_startup {
        let warmer = CacheWarmer::new(Arc::clone(&coordinator));
        match warmer.warm_known(&settings.cache.known_paths).await {
            Ok(warmed) => info!(warmed, "startup cache warm complete"),
            Err(err) => warn!(error = %err, "startup cache warm failed, serving cold"),
        }
    }

    let app = http::router(HttpState {
        coordinator: Arc::clone(&coordinator),
    });

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let listener = TcpListener::bind(&addr).await.map_err(InfraError::Io)?;
    info!(
        addr = %addr,
        known_paths = settings.cache.known_paths.len(),
        fallback = ?settings.cache.fallback,
        "rigenera listening"
    );

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(InfraError::Io)?;

    info!("rigenera stopped");
    Ok(())
}

async fn run_render(settings: Settings, args: RenderArgs) -> Result<(), AppError> {
    let renderer = build_renderer(&settings)?;
    let key = RouteKey::new(args.key);
    let page = renderer.render(&key).await?;
    let body = String::from_utf8_lossy(&page.body);
    println!("{body}");
    Ok(())
}

fn build_engine(settings: &Settings) -> Result<Arc<RequestCoordinator>, AppError> {
    let renderer = build_renderer(settings)?;
    let engine_config = EngineConfig::from(&settings.cache);

    let store: Arc<dyn ArtifactStore> = Arc::new(MemoryStore::new(&engine_config));
    let registry = Arc::new(PathRegistry::with_known(
        engine_config.fallback,
        settings.cache.known_paths.iter().cloned(),
    ));
    let regen = Arc::new(RegenerationService::new(
        &engine_config,
        renderer,
        Arc::clone(&store),
        Arc::new(TelemetryObserver),
    ));

    Ok(Arc::new(RequestCoordinator::new(store, registry, regen)))
}

fn build_renderer(settings: &Settings) -> Result<Arc<dyn Renderer>, AppError> {
    let dir = &settings.content.dir;
    if !dir.is_dir() {
        return Err(InfraError::configuration(format!(
            "content directory `{}` does not exist",
            dir.display()
        ))
        .into());
    }
    Ok(Arc::new(MarkdownRenderer::new(dir.clone())))
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for shutdown signal");
    }
}
