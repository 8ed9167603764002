//! Demo server wired with the base logger.
//!
//! Every request gets a short nanoid in `x-request-id`; the access log line
//! is written to stdout for every response that is not a plain `200`, and
//! for all responses served to `localhost`.

use anyhow::Context;
use axum::{
    Router,
    http::{HeaderName, HeaderValue, Request},
    middleware,
    routing::{get, post},
};
use base_logger::{
    BaseLogger, LoggerConfig, StdoutSink, base_logger, cli::Cli, context::X_REQUEST_ID, handlers,
};
use nanoid::nanoid;
use std::{net::SocketAddr, sync::Arc};
use tower_http::request_id::{
    MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer,
};
use tracing::{Level, info};

/// Issues 10-character nanoid request ids.
#[derive(Debug, Clone, Copy, Default)]
struct NanoRequestId;

impl MakeRequestId for NanoRequestId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&nanoid!(10)).ok().map(RequestId::new)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    let args: Cli = argh::from_env();

    let environment = args
        .environment
        .or_else(|| std::env::var("APP_ENV").ok())
        .unwrap_or_default();
    let mut config = LoggerConfig::json(&environment).with_color(args.color);
    if let Some(format) = args.format {
        config = config.with_format(format);
    }
    if let Some(pattern) = args.time_format {
        config = config.with_custom_time_format(pattern);
    }

    let logger = Arc::new(BaseLogger::new(config, StdoutSink).context("invalid log format")?);
    let request_id = HeaderName::from_static(X_REQUEST_ID);

    // Layers run bottom-up: the id is set before the logger sees the request.
    let app = Router::new()
        .route("/", get(handlers::index))
        .route("/status/{code}", get(handlers::status))
        .route("/echo", post(handlers::echo))
        .route("/fail", get(handlers::fail))
        .fallback(handlers::not_found)
        .layer(middleware::from_fn_with_state(logger, base_logger))
        .layer(PropagateRequestIdLayer::new(request_id.clone()))
        .layer(SetRequestIdLayer::new(request_id, NanoRequestId));

    info!("Server running on: http://{}", args.bind);

    let listener = tokio::net::TcpListener::bind(args.bind)
        .await
        .with_context(|| format!("failed to bind {}", args.bind))?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("server error")?;

    Ok(())
}
