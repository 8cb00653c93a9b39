pub mod config;
pub mod error;
pub mod form;
pub mod models;
pub mod routes;
pub mod storage;
pub mod util;

use std::{any::Any, path::PathBuf, sync::Arc};

use axum::{
    extract::{DefaultBodyLimit, Request},
    handler::HandlerWithoutStateExt,
    http::{header, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get},
    Router,
};
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{Any as AnyOrigin, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

use crate::{
    config::{Backend, Config, DEFAULT_MAX_UPLOAD_BYTES},
    error::ApiError,
    routes::{artists, images},
    storage::{
        memory::{MemoryMetadataStore, MemoryObjectStore},
        postgres::PgMetadataStore,
        s3::S3Store,
        MetadataStore, ObjectStore,
    },
    util::IdScheme,
};

/// Name reported when the metadata store is not configured.
pub const METADATA_BINDING: &str = "ARTIST_KV";
/// Name reported when the object store is not configured.
pub const OBJECT_BINDING: &str = "ARTIST_BUCKET";

const ALLOWED_METHODS: &str = "GET, POST, DELETE, OPTIONS";

#[derive(Clone)]
pub struct AppState {
    pub metadata: Option<Arc<dyn MetadataStore>>,
    pub objects: Option<Arc<dyn ObjectStore>>,
    pub id_scheme: IdScheme,
    pub static_dir: Option<PathBuf>,
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(
        metadata: Option<Arc<dyn MetadataStore>>,
        objects: Option<Arc<dyn ObjectStore>>,
    ) -> Self {
        Self {
            metadata,
            objects,
            id_scheme: IdScheme::Timestamp,
            static_dir: None,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }

    pub fn metadata(&self) -> Result<&Arc<dyn MetadataStore>, ApiError> {
        self.metadata
            .as_ref()
            .ok_or(ApiError::Configuration(METADATA_BINDING))
    }

    pub fn objects(&self) -> Result<&Arc<dyn ObjectStore>, ApiError> {
        self.objects
            .as_ref()
            .ok_or(ApiError::Configuration(OBJECT_BINDING))
    }
}

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let cfg = Config::from_env()?;
    let state = build_state(&cfg).await?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(cfg.bind_addr).await?;
    tracing::info!("listening on {}", cfg.bind_addr);
    axum::serve(listener, app).await?;
    Ok(())
}

pub async fn build_state(cfg: &Config) -> Result<AppState, Box<dyn std::error::Error>> {
    let metadata: Option<Arc<dyn MetadataStore>> = match cfg.metadata_backend {
        Backend::Postgres => {
            let url = cfg
                .database_url
                .as_deref()
                .ok_or(config::ConfigError::Missing("DATABASE_URL"))?;
            Some(Arc::new(PgMetadataStore::connect(cfg, url).await?))
        }
        Backend::Memory => Some(Arc::new(MemoryMetadataStore::new())),
        Backend::S3 | Backend::Disabled => None,
    };

    let objects: Option<Arc<dyn ObjectStore>> = match cfg.object_backend {
        Backend::S3 => {
            let store = S3Store::new(cfg).await?;
            if cfg.s3_create_bucket {
                store.ensure_bucket().await?;
            }
            Some(Arc::new(store))
        }
        Backend::Memory => Some(Arc::new(MemoryObjectStore::new())),
        Backend::Postgres | Backend::Disabled => None,
    };

    if metadata.is_none() {
        tracing::warn!("{METADATA_BINDING} is not bound; artist endpoints will fail");
    }
    if objects.is_none() {
        tracing::warn!("{OBJECT_BINDING} is not bound; image endpoints will fail");
    }

    Ok(AppState {
        metadata,
        objects,
        id_scheme: cfg.id_scheme,
        static_dir: cfg.static_dir.clone(),
        max_upload_bytes: cfg.max_upload_bytes,
    })
}

pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .route(
            "/artists",
            get(artists::list_artists)
                .post(artists::create_artist)
                .fallback(not_found),
        )
        .route(
            "/artists/:id",
            delete(artists::delete_artist).fallback(not_found),
        )
        .layer(DefaultBodyLimit::max(state.max_upload_bytes));

    let cors = CorsLayer::new()
        .allow_origin(AnyOrigin)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    let router = Router::new()
        .nest("/admin/api", api)
        .route(
            "/images/:artist_id/:image_name",
            get(images::get_image).fallback(not_found),
        )
        .route("/healthz", get(|| async { "ok" }));

    let router = match state.static_dir.clone() {
        Some(dir) => router.fallback_service(
            ServeDir::new(dir)
                .append_index_html_on_directories(true)
                .call_fallback_on_method_not_allowed(true)
                .not_found_service(not_found.into_service()),
        ),
        None => router.fallback(not_found),
    };

    router
        .with_state(state)
        .layer(middleware::from_fn(preflight))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "404, not found!")
}

/// Answers every `OPTIONS` request, whether or not it is a CORS preflight.
async fn preflight(req: Request, next: Next) -> Response {
    if req.method() != Method::OPTIONS {
        return next.run(req).await;
    }
    let mut resp = StatusCode::OK.into_response();
    let headers = resp.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOWED_METHODS),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type"),
    );
    resp
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let details = if let Some(msg) = err.downcast_ref::<String>() {
        msg.clone()
    } else if let Some(msg) = err.downcast_ref::<&str>() {
        msg.to_string()
    } else {
        "unknown panic".to_string()
    };
    tracing::error!("request handler panicked: {details}");
    error::internal_error(details)
}

fn init_tracing() {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
