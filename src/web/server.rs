use axum::{routing::get, routing::post, Router};
use std::sync::Arc;
use tokio::sync::mpsc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::history::{FileHistorySource, HistorySource};
use crate::playback::{Engine, LiveUpdate, ModeController, UnitRegistry};

use super::api::live as live_handlers;
use super::api::playback as playback_handlers;
use super::api::units as unit_handlers;
use super::api_doc::ApiDoc;
use super::config::Config;

const LIVE_QUEUE: usize = 256;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
    pub registry: Arc<UnitRegistry>,
    pub live_tx: mpsc::Sender<LiveUpdate>,
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Map data
        .route("/api/units", get(unit_handlers::list_units))
        .route("/api/units/{id}", get(unit_handlers::get_unit))
        // Playback controls
        .route("/api/playback", get(playback_handlers::status))
        .route("/api/playback/play", post(playback_handlers::play))
        .route("/api/playback/pause", post(playback_handlers::pause))
        .route("/api/playback/seek", post(playback_handlers::seek))
        .route("/api/playback/step", post(playback_handlers::step))
        .route("/api/playback/speed", post(playback_handlers::set_speed))
        .route("/api/playback/speed/next", post(playback_handlers::next_speed))
        .route("/api/playback/window", post(playback_handlers::set_window))
        .route("/api/playback/mode", post(playback_handlers::set_mode))
        .route("/api/playback/toggle", post(playback_handlers::toggle))
        // Push feed
        .route("/api/live", post(live_handlers::push_update))
        // OpenAPI / Swagger
        .merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()))
        // Middleware
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run_server(config: Config) -> std::io::Result<()> {
    let bind_addr = config.web.bind.clone();
    let source = FileHistorySource::new(config.history.path.clone());
    log::info!("Reading history from {}", source.path().display());

    let registry = config.registry();
    let mut controller =
        ModeController::new(config.playback.settings(), registry.clone(), chrono::Utc::now())
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
    if config.history.seed_live {
        match source.latest().await {
            Ok(rows) => {
                let seeded = controller.seed_live(rows);
                log::info!("Seeded live table with {} last known positions", seeded);
            }
            Err(e) => log::warn!("Cannot seed live table: {}", e),
        }
    }
    let (live_tx, live_rx) = mpsc::channel(LIVE_QUEUE);
    let engine = Engine::start(
        controller,
        Arc::new(source),
        live_rx,
        config.playback.frame_interval,
    );

    let engine = Arc::new(engine);
    let app = router(AppState {
        engine: engine.clone(),
        registry: Arc::new(registry),
        live_tx,
    });

    log::info!("Starting server on {}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;
    engine.stop().await;
    served
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Cannot listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    log::info!("Shutting down");
}
