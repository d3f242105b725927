//! The browser surface: one server-rendered page per wizard step.

use std::num::NonZeroU16;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use tokio::sync::Mutex;
use tower_sessions::{Expiry, MemoryStore, Session, SessionManagerLayer};
use tracing::{error, info};

use crate::catalog::{self, Catalog};
use crate::constants::SESSION_IDLE_SECONDS;
use crate::error::StudioError;
use crate::gemini::GeminiClient;
use crate::generation::Orchestrator;
use crate::preview::PreviewRegistry;
use crate::wizard::Wizard;

mod actions;
mod csrf;
pub(crate) mod flash;
mod images;
mod prelude;
mod views;
mod wizards;

use wizards::WizardRegistry;

/// Room for the multipart framing and the other form fields around the photo.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

#[derive(Clone, Debug)]
pub(crate) struct AppState {
    catalog: &'static Catalog,
    previews: PreviewRegistry,
    wizards: WizardRegistry,
    orchestrator: Arc<Orchestrator<GeminiClient>>,
    max_upload_bytes: usize,
}

impl AppState {
    pub(crate) fn new(
        catalog: &'static Catalog,
        client: GeminiClient,
        max_upload_bytes: usize,
    ) -> Self {
        Self {
            catalog,
            previews: PreviewRegistry::new(),
            wizards: WizardRegistry::new(Duration::from_secs(SESSION_IDLE_SECONDS.unsigned_abs())),
            orchestrator: Arc::new(Orchestrator::new(client)),
            max_upload_bytes,
        }
    }

    /// The wizard belonging to this session.
    pub(crate) async fn wizard(&self, session: &Session) -> Result<Arc<Mutex<Wizard>>, StudioError> {
        self.wizards
            .for_session(session, self.catalog, &self.previews)
            .await
    }
}

pub(crate) fn create_router(state: AppState) -> Router {
    let session_layer = SessionManagerLayer::new(MemoryStore::default())
        .with_secure(false)
        .with_expiry(Expiry::OnInactivity(time::Duration::seconds(
            SESSION_IDLE_SECONDS,
        )));
    let body_limit = state.max_upload_bytes.saturating_add(MULTIPART_OVERHEAD);

    Router::new()
        .route("/", axum::routing::get(views::root_handler))
        .route("/static/styles.css", axum::routing::get(styles_handler))
        .route("/upload", axum::routing::post(actions::upload_handler))
        .route("/image/clear", axum::routing::post(actions::clear_image_handler))
        .route("/style", axum::routing::post(actions::style_handler))
        .route("/decorations", axum::routing::post(actions::decoration_handler))
        .route("/pose", axum::routing::post(actions::pose_handler))
        .route("/text", axum::routing::post(actions::text_handler))
        .route("/next", axum::routing::post(actions::next_handler))
        .route("/back", axum::routing::post(actions::back_handler))
        .route("/reset", axum::routing::post(actions::reset_handler))
        .route("/preview/{token}", axum::routing::get(images::preview_handler))
        .route("/result/image", axum::routing::get(images::result_handler))
        .route("/download", axum::routing::get(images::download_handler))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(session_layer)
        .with_state(state)
}

async fn styles_handler() -> impl IntoResponse {
    const STYLES: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/static/styles.css"));
    ([(CONTENT_TYPE, "text/css")], STYLES)
}

/// Starts the web wizard and serves until the listener fails.
pub async fn setup_server(
    listen_addr: &str,
    port: NonZeroU16,
    client: GeminiClient,
    max_upload_bytes: usize,
) -> Result<(), anyhow::Error> {
    let catalog = catalog::catalog()?;
    info!(
        "Loaded catalog: {} styles, {} decorations, {} poses, {} text styles; model {}",
        catalog.styles().len(),
        catalog.decorations().len(),
        catalog.poses().len(),
        catalog.text_styles().len(),
        client.model()
    );
    let app = create_router(AppState::new(catalog, client, max_upload_bytes));

    let addr = format!("{}:{}", listen_addr, port);
    info!("Starting server on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    if let Err(err) = axum::serve(listener, app).await {
        error!("Server error: {}", err);
    }
    Ok(())
}

#[cfg(test)]
mod tests;
