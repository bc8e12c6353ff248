use crate::{
    api::handlers::{auth, health, root},
    email::CodeSender,
    otp::{spawn_code_sweeper, Clock, OtpConfig, OtpService, SystemClock},
    store::{MemoryStore, PgStore, Store},
};
use anyhow::{anyhow, Context, Result};
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderName, HeaderValue, Method, Request,
    },
    routing::{get, options},
    Extension, Router,
};
use secrecy::SecretString;
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{info, info_span, warn, Span};
use ulid::Ulid;
use url::Url;
use utoipa_axum::router::OpenApiRouter;

pub mod handlers;
// OpenAPI router wiring and route registration live in openapi.rs.
mod openapi;

pub use openapi::openapi;

/// Build the API router with all documented routes registered.
#[must_use]
pub fn router() -> OpenApiRouter {
    openapi::api_router()
}

/// Build the complete application: documented routes, `/`, preflight
/// `OPTIONS /health`, request-id/trace/CORS layers and shared state.
///
/// # Errors
/// Returns an error if the frontend base URL is not a valid origin.
pub fn app(auth_state: Arc<auth::AuthState>, store: Arc<dyn Store>) -> Result<Router> {
    let frontend_origin = frontend_origin(auth_state.config().frontend_base_url())?;
    let cors = CorsLayer::new()
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_origin(AllowOrigin::exact(frontend_origin));

    // The OpenAPI document is served by the `openapi` binary, not at runtime.
    let (router, _openapi) = router().split_for_parts();
    let app = router
        .route("/", get(root::root))
        .route("/health", options(health::health))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(cors)
                .layer(Extension(auth_state)),
        )
        .layer(Extension(store));

    Ok(app)
}

/// Pick the store: Postgres when a DSN is given (schema applied on startup),
/// otherwise the in-memory store.
///
/// # Errors
/// Returns an error if the database is unreachable or the schema fails to apply.
pub async fn connect_store(dsn: Option<&str>) -> Result<Arc<dyn Store>> {
    match dsn {
        Some(dsn) => {
            let store = PgStore::connect(dsn).await?;
            store.migrate().await.context("Failed to apply schema")?;
            info!("Using Postgres store");
            Ok(Arc::new(store))
        }
        None => {
            warn!("No DSN configured, using in-memory store; data is lost on restart");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(
    port: u16,
    dsn: Option<String>,
    auth_config: auth::AuthConfig,
    otp_config: OtpConfig,
    jwt_secret: SecretString,
    sender: Arc<dyn CodeSender>,
    sweep_interval: Duration,
) -> Result<()> {
    let store = connect_store(dsn.as_deref()).await?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    info!(
        environment = %otp_config.environment(),
        code_ttl_seconds = otp_config.code_ttl_seconds(),
        cooldown_seconds = otp_config.cooldown_seconds(),
        "OTP workflow configured"
    );

    let otp = OtpService::new(store.clone(), sender, clock.clone(), otp_config);
    let auth_state = Arc::new(auth::AuthState::new(auth_config, otp, &jwt_secret));

    // Expired codes are evicted in the background; the handle is aborted on shutdown.
    let sweeper = spawn_code_sweeper(store.clone(), clock, sweep_interval);

    let app = app(auth_state, store)?;

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    let served = axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await;

    sweeper.abort();
    info!("Gracefully shutdown");

    served.context("Server error")
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for ctrl-c: {err}");
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
                warn!("Failed to listen for SIGTERM: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}

fn frontend_origin(frontend_base_url: &str) -> Result<HeaderValue> {
    let parsed = Url::parse(frontend_base_url)
        .with_context(|| format!("Invalid frontend base URL: {frontend_base_url}"))?;
    let host = parsed.host_str().ok_or_else(|| {
        anyhow!("Frontend base URL must include a valid host: {frontend_base_url}")
    })?;
    let port = parsed
        .port()
        .map_or_else(String::new, |port| format!(":{port}"));
    let origin = format!("{}://{}{}", parsed.scheme(), host, port);
    HeaderValue::from_str(&origin).context("Failed to build frontend origin header")
}
