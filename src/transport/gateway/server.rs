use super::handlers::{handle_health, handle_stream, handle_webhook};
use super::{AppState, MAX_BODY_SIZE, REQUEST_TIMEOUT_SECS};
use anyhow::{Context, Result};
use axum::{
    Router,
    http::StatusCode,
    routing::{get, post},
};
use std::net::SocketAddr;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;

/// Bind `host:port` and serve the gateway until the listener fails.
pub async fn run_gateway(host: &str, port: u16, state: AppState) -> Result<()> {
    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .context("parse gateway bind address")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("bind gateway socket")?;
    run_gateway_with_listener(host, listener, state).await
}

/// Run the HTTP gateway from a pre-bound listener.
pub async fn run_gateway_with_listener(
    host: &str,
    listener: tokio::net::TcpListener,
    state: AppState,
) -> Result<()> {
    let actual_port = listener
        .local_addr()
        .context("get gateway listener local address")?
        .port();
    let display_addr = format!("{host}:{actual_port}");

    print_gateway_banner(&display_addr, &state);
    tracing::info!(addr = %display_addr, "gateway listening");

    let cors_origins = state.config.gateway.cors_origins.clone();
    let app = build_app(state, &cors_origins);
    axum::serve(listener, app)
        .await
        .context("serve HTTP gateway")?;
    Ok(())
}

fn print_gateway_banner(display_addr: &str, state: &AppState) {
    println!("Gateway listening on {display_addr}");
    println!("  POST /service/webhook");
    println!("  GET  /service/stream/{{stream_id}}");
    println!("  GET  /health");
    println!("  Inference service: {}", state.config.inference.endpoint());
    println!("  Chat platform:     {}", state.config.dootask.base_url);
}

/// Router with all routes. Stream connections skip the request timeout.
pub fn build_app(state: AppState, cors_origins: &[String]) -> Router {
    let short_lived = Router::new()
        .route("/health", get(handle_health))
        .route("/service/webhook", post(handle_webhook))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(REQUEST_TIMEOUT_SECS),
        ));

    let mut app = Router::new()
        .route("/service/stream/{stream_id}", get(handle_stream))
        .merge(short_lived)
        .with_state(state)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_SIZE));

    if !cors_origins.is_empty() {
        let origins: Vec<_> = cors_origins.iter().filter_map(|o| o.parse().ok()).collect();
        app = app.layer(
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
                .allow_headers([
                    axum::http::header::CONTENT_TYPE,
                    axum::http::header::CACHE_CONTROL,
                ]),
        );
    }

    app
}
