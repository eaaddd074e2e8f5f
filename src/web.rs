use std::{
    net::{IpAddr, SocketAddr},
    time::Duration,
};

use anyhow::{Context, Result};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method, StatusCode, header},
    routing::get,
};
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::api::{self, AppState};
use crate::config::ServerConfig;

/// CORS policy that only admits the configured front-end origins
pub fn cors_layer(origins: &[String]) -> Result<CorsLayer> {
    let origins = origins
        .iter()
        .map(|origin| {
            HeaderValue::from_str(origin)
                .with_context(|| format!("Invalid allowed origin: {origin}"))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]))
}

/// Full application router with middleware applied
pub fn app(state: AppState, config: &ServerConfig) -> Result<Router> {
    let middleware = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&config.allowed_origins)?)
        .layer(TimeoutLayer::with_status_code(
            StatusCode::GATEWAY_TIMEOUT,
            Duration::from_secs(config.request_timeout_seconds.into()),
        ));

    Ok(Router::new()
        .route("/", get(api::root))
        .nest("/api", api::router())
        .with_state(state)
        .layer(DefaultBodyLimit::max(config.max_body_bytes))
        .layer(middleware))
}

pub async fn run(config: &ServerConfig, state: AppState) -> Result<()> {
    let app = app(state, config)?;
    let host: IpAddr = config
        .host
        .parse()
        .with_context(|| format!("Invalid listen address {}", config.host))?;
    let addr = SocketAddr::new(host, config.port);

    match (&config.tls_cert_path, &config.tls_key_path) {
        #[cfg(feature = "tls")]
        (Some(cert), Some(key)) => tls::serve(addr, app, cert, key).await,
        #[cfg(not(feature = "tls"))]
        (Some(_), Some(_)) => {
            anyhow::bail!("TLS is configured but this binary was built without the `tls` feature")
        }
        _ => serve(addr, app).await,
    }
}

async fn serve(addr: SocketAddr, app: Router) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!("Web server running at http://{}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Web server failed")
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutdown signal received"),
        Err(e) => {
            tracing::error!("Unable to listen for shutdown signal: {e}");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(feature = "tls")]
mod tls {
    use std::{net::SocketAddr, path::Path, time::Duration};

    use anyhow::{Context, Result};
    use axum::Router;
    use axum_server::{Handle, tls_rustls::RustlsConfig};

    pub async fn serve(addr: SocketAddr, app: Router, cert: &Path, key: &Path) -> Result<()> {
        // Another crate may already have installed a provider
        let _ = rustls::crypto::ring::default_provider().install_default();

        let tls_config = RustlsConfig::from_pem_file(cert, key)
            .await
            .with_context(|| {
                format!(
                    "Failed to load TLS material from {} and {}",
                    cert.display(),
                    key.display()
                )
            })?;

        let handle = Handle::new();
        tokio::spawn({
            let handle = handle.clone();
            async move {
                super::shutdown_signal().await;
                handle.graceful_shutdown(Some(Duration::from_secs(10)));
            }
        });

        tracing::info!("Web server running at https://{}", addr);
        axum_server::bind_rustls(addr, tls_config)
            .handle(handle)
            .serve(app.into_make_service())
            .await
            .context("TLS web server failed")
    }
}
