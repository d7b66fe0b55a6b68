//! Garage server: Axum routes over SQLite for cars, modifications, personal
//! tokens, a public track-day finder, and Inertia page props.

pub mod commands;
pub mod config;
pub mod error;
pub mod extract;
pub mod images;
pub mod inertia;
pub mod policy;
pub mod repository;
pub mod routes;
pub mod storage;

use axum::{
    Router,
    extract::{DefaultBodyLimit, FromRef},
    routing::{get, post},
};
use chrono::Datelike;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

pub use config::AppConfig;
use images::ImageStore;
use storage::Db;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Db,
    pub images: ImageStore,
    pub config: AppConfig,
}

impl AppState {
    /// Images live next to the database under `<data_dir>/car-images`.
    pub fn new(db: Db, config: AppConfig) -> Self {
        let images = ImageStore::new(config.data_dir.join("car-images"));
        Self { db, images, config }
    }
}

impl FromRef<AppState> for Db {
    fn from_ref(state: &AppState) -> Self {
        state.db.clone()
    }
}

impl FromRef<AppState> for ImageStore {
    fn from_ref(state: &AppState) -> Self {
        state.images.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

/// Current unix time in seconds.
pub fn now_unix() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp()).unwrap_or(0)
}

/// Today's UTC date as `YYYY-MM-DD`.
pub fn today() -> String {
    chrono::Utc::now().date_naive().format("%Y-%m-%d").to_string()
}

pub fn current_year() -> i64 {
    i64::from(chrono::Utc::now().year())
}

/// Request body cap for image uploads. Leaves room above the image limit so
/// oversize uploads reach field validation.
fn upload_body_limit(max_image_bytes: usize) -> usize {
    max_image_bytes.saturating_mul(2).saturating_add(64 * 1024)
}

/// Build the full application router.
pub fn build_app(state: AppState) -> Router {
    use routes::{auth, cars, dashboard, events, health, modifications, pages, tokens};

    let upload_limit = upload_body_limit(state.config.max_image_bytes);

    let api = Router::new()
        // Health
        .route("/health", get(health::health))
        // Auth
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/refresh", post(auth::refresh))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/me", get(auth::me))
        // Personal access tokens
        .route("/tokens", get(tokens::list_tokens).post(tokens::create_token))
        .route("/tokens/{id}", axum::routing::delete(tokens::delete_token))
        // Cars
        .route("/cars", get(cars::list_cars).post(cars::create_car))
        .route(
            "/cars/{car}",
            get(cars::get_car)
                .put(cars::update_car)
                .patch(cars::update_car)
                .delete(cars::delete_car),
        )
        .route(
            "/cars/{car}/image",
            get(cars::show_image)
                .post(cars::upload_image)
                .delete(cars::delete_image)
                .layer(DefaultBodyLimit::max(upload_limit)),
        )
        // Modifications
        .route(
            "/cars/{car}/modifications",
            get(modifications::list_modifications).post(modifications::create_modification),
        )
        .route(
            "/cars/{car}/modifications/{modification}",
            get(modifications::get_modification)
                .put(modifications::update_modification)
                .patch(modifications::update_modification)
                .delete(modifications::delete_modification),
        )
        // Dashboard
        .route("/dashboard", get(dashboard::dashboard))
        // Track days (public)
        .route("/events", get(events::list_events))
        .route("/events/{event}", get(events::get_event))
        .route("/tracks", get(events::list_tracks))
        .route("/organizers", get(events::list_organizers));

    let mut app = Router::new()
        .nest("/api", api)
        .route("/", get(pages::welcome))
        .route("/login", get(pages::login))
        .route("/register", get(pages::register))
        .route("/dashboard", get(pages::dashboard))
        .route("/cars", get(pages::cars_index))
        .route("/cars/create", get(pages::cars_create))
        .route("/cars/{car}", get(pages::cars_show))
        .route("/cars/{car}/edit", get(pages::cars_edit))
        .route("/events", get(pages::events_index))
        .route("/settings/tokens", get(pages::tokens_index));

    // Serve the front-end build if present
    let web_dir = state.config.web_dir.clone();
    if web_dir.exists() {
        tracing::info!("serving static files from {}", web_dir.display());
        let index_html = web_dir.join("index.html");
        app = app.fallback_service(ServeDir::new(&web_dir).fallback(ServeFile::new(index_html)));
    }

    app.layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_limit_saturates() {
        assert_eq!(upload_body_limit(1024), 2048 + 64 * 1024);
        assert_eq!(upload_body_limit(usize::MAX / 2 + 1), usize::MAX);
        assert_eq!(upload_body_limit(usize::MAX), usize::MAX);
    }
}
