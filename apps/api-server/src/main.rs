//! api-server — HTTP front end for the URL Shortener workspace.
//!
//! Routes:
//! - `GET  /api/hello`          smoke test, `{"greeting": "hello API"}`
//! - `POST /api/shorturl/new`   create or fetch the short code for `url`
//!   (JSON or HTML form body)
//! - `GET  /api/shorturl/:code` 302 redirect to `https://<original_url>`
//! - `GET  /` and `/public/*`   landing page and static assets
//!
//! API errors are answered with HTTP 200 and a `{"error": ...}` body.
//!
//! Run:
//! ```bash
//! # pretty logs (default); SQLite store under ./data
//! cargo run -p api-server
//!
//! # offline: no DNS, in-memory store
//! HOST_RESOLVER=static STATIC_HOSTS=localhost,example.com STORAGE_PROVIDER=memory \
//!   cargo run -p api-server
//! ```
//!
//! Configuration: See `config.rs` for all environment variables.
//!

mod config;

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{FromRequest, Path, Request, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use dns_resolver::{Bounded, DnsResolver};
use domain::adapters::memory_repo::InMemoryRepo;
use domain::adapters::static_resolver::StaticResolver;
use domain::service::ShortUrlService;
use domain::{
    CoreError, HostResolver, NormalizedUrl, ResolveError, ShortCode, ShortUrlRecord,
    ShortUrlRepository, StoreError,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

// Local repo abstraction supporting memory or sqlite (feature-gated).
enum AnyRepo {
    Memory(InMemoryRepo),
    #[cfg(feature = "sqlite")]
    Sqlite(sqlite_adapter::SqliteRepo),
    #[cfg(test)]
    Failing(StoreError),
}

impl ShortUrlRepository for AnyRepo {
    fn find_or_create(&self, url: &NormalizedUrl) -> Result<ShortUrlRecord, StoreError> {
        match self {
            AnyRepo::Memory(r) => r.find_or_create(url),
            #[cfg(feature = "sqlite")]
            AnyRepo::Sqlite(r) => r.find_or_create(url),
            #[cfg(test)]
            AnyRepo::Failing(e) => Err(e.clone()),
        }
    }

    fn find_by_code(&self, code: ShortCode) -> Result<Option<ShortUrlRecord>, StoreError> {
        match self {
            AnyRepo::Memory(r) => r.find_by_code(code),
            #[cfg(feature = "sqlite")]
            AnyRepo::Sqlite(r) => r.find_by_code(code),
            #[cfg(test)]
            AnyRepo::Failing(e) => Err(e.clone()),
        }
    }
}

// Resolver selected by HOST_RESOLVER.
enum AnyResolver {
    Dns(Bounded<DnsResolver>),
    Static(StaticResolver),
}

impl HostResolver for AnyResolver {
    async fn resolve(&self, host: &str) -> Result<Vec<IpAddr>, ResolveError> {
        match self {
            AnyResolver::Dns(r) => r.resolve(host).await,
            AnyResolver::Static(r) => r.resolve(host).await,
        }
    }
}

type Service = ShortUrlService<AnyRepo, AnyResolver>;

#[derive(Clone)]
struct AppState {
    service: Arc<Service>,
}

impl AppState {
    fn new(repo: AnyRepo, resolver: AnyResolver) -> Self {
        Self {
            service: Arc::new(ShortUrlService::new(repo, resolver)),
        }
    }
}

#[tokio::main]
async fn main() {
    // Load and validate config first (fail fast on misconfiguration)
    let cfg = match config::Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    init_tracing(&cfg);
    cfg.warn_if_insecure();

    let repo = match build_repo(&cfg) {
        Ok(r) => r,
        Err(e) => {
            error!(err = %e, database_url = %cfg.database_url, "failed to open store");
            std::process::exit(1);
        }
    };
    let state = AppState::new(repo, build_resolver(&cfg));
    let app = build_app(state, &cfg);

    let addr: SocketAddr = ([0, 0, 0, 0], cfg.port).into();
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            error!(%addr, err = %e, "bind failed");
            std::process::exit(1);
        }
    };
    info!(%addr, "api-server listening");
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!(err = %e, "server error");
        std::process::exit(1);
    }
    info!("api-server stopped");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(err = %e, "failed to listen for shutdown signal");
    }
}

fn init_tracing(cfg: &config::Config) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);
    match cfg.log_format {
        config::LogFormat::Json => {
            registry
                .with(
                    fmt::layer()
                        .json()
                        .with_target(true)
                        .with_timer(fmt::time::SystemTime)
                        .with_writer(std::io::stdout),
                )
                .init();
        }
        config::LogFormat::Pretty => {
            registry
                .with(
                    fmt::layer()
                        .pretty()
                        .with_target(true)
                        .with_writer(std::io::stdout),
                )
                .init();
        }
    }
}

// Construct a repository instance based on config and feature flags.
fn build_repo(cfg: &config::Config) -> Result<AnyRepo, StoreError> {
    match cfg.storage_provider {
        #[cfg(feature = "sqlite")]
        config::StorageProvider::Sqlite => {
            let repo = sqlite_adapter::SqliteRepo::from_url(&cfg.database_url)?;
            info!(database_url = %cfg.database_url, "using sqlite store");
            Ok(AnyRepo::Sqlite(repo))
        }
        #[cfg(not(feature = "sqlite"))]
        config::StorageProvider::Sqlite => {
            warn!("built without the `sqlite` feature; falling back to in-memory store");
            Ok(AnyRepo::Memory(InMemoryRepo::new()))
        }
        config::StorageProvider::Memory => Ok(AnyRepo::Memory(InMemoryRepo::new())),
    }
}

fn build_resolver(cfg: &config::Config) -> AnyResolver {
    match cfg.resolver_provider {
        config::ResolverProvider::Dns => {
            AnyResolver::Dns(DnsResolver::bounded(cfg.dns_timeout))
        }
        config::ResolverProvider::Static => {
            AnyResolver::Static(StaticResolver::new(&cfg.static_hosts))
        }
    }
}

/// API routes bound to their state.
fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/hello", get(hello))
        .route("/api/shorturl/new", post(create_short_url))
        .route("/api/shorturl/:code", get(resolve_short_url))
        .with_state(state)
}

/// Full application: API routes, static content, request ids, tracing, CORS.
fn build_app(state: AppState, cfg: &config::Config) -> Router {
    // Request ID header name
    let x_request_id = axum::http::HeaderName::from_static("x-request-id");

    let cors = if cfg.cors_allow_origin == HeaderValue::from_static("*") {
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
            .allow_origin(AllowOrigin::list([cfg.cors_allow_origin.clone()]))
            .allow_methods([
                axum::http::Method::GET,
                axum::http::Method::POST,
                axum::http::Method::OPTIONS,
            ])
            .allow_headers([header::CONTENT_TYPE])
    };

    router(state)
        .route_service("/", ServeFile::new(cfg.views_dir.join("index.html")))
        .nest_service("/public", ServeDir::new(&cfg.public_dir))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(TraceLayer::new_for_http().make_span_with(
                    |request: &axum::http::Request<_>| {
                        let request_id = request
                            .headers()
                            .get("x-request-id")
                            .and_then(|v| v.to_str().ok())
                            .unwrap_or("-");
                        tracing::info_span!(
                            "http_request",
                            method = %request.method(),
                            uri = %request.uri(),
                            request_id = %request_id,
                        )
                    },
                ))
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

async fn hello() -> Json<serde_json::Value> {
    Json(http_common::hello())
}

/// Read the `url` field from a JSON or form-encoded body. Anything that does
/// not yield a string is `None`.
async fn submitted_url(request: Request) -> Option<String> {
    let content_type = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    if http_common::is_form_content_type(content_type.as_deref()) {
        let Form(fields) = Form::<HashMap<String, String>>::from_request(request, &())
            .await
            .ok()?;
        fields.get("url").cloned()
    } else {
        let bytes = Bytes::from_request(request, &()).await.ok()?;
        let body: serde_json::Value = serde_json::from_slice(&bytes).ok()?;
        http_common::url_field(&body)
    }
}

async fn create_short_url(State(state): State<AppState>, request: Request) -> Response {
    let Some(raw) = submitted_url(request).await else {
        warn!("create rejected: missing or non-string url field");
        return Json(http_common::invalid_url()).into_response();
    };

    match state.service.shorten(&raw).await {
        Ok(record) => {
            info!(code = %record.short_code, original_url = %record.original_url, "create ok");
            Json(http_common::short_url_body(
                &record.original_url,
                record.short_code.get(),
            ))
            .into_response()
        }
        Err(CoreError::Store(e)) => {
            error!(url = %raw, err = %e, "create store error");
            Json(http_common::json_err(&e.code)).into_response()
        }
        Err(e) => {
            warn!(url = %raw, err = %e, "create rejected");
            Json(http_common::invalid_url()).into_response()
        }
    }
}

async fn resolve_short_url(State(state): State<AppState>, Path(code): Path<String>) -> Response {
    match state.service.resolve_str(&code) {
        Ok(record) => {
            let target = http_common::redirect_location(&record.redirect_target());
            match HeaderValue::from_str(&target) {
                Ok(location) => {
                    info!(%code, redirect_to = %target, "resolve ok");
                    (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
                }
                Err(_) => {
                    error!(%code, redirect_to = %target, "stored url is not a valid header");
                    Json(http_common::invalid_url()).into_response()
                }
            }
        }
        Err(CoreError::NotFound) | Err(CoreError::InvalidCode(_)) => {
            warn!(%code, "resolve miss");
            Json(http_common::invalid_url()).into_response()
        }
        Err(e) => {
            error!(%code, err = %e, "resolve error");
            Json(http_common::invalid_url()).into_response()
        }
    }
}
