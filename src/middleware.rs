//! Request logging middleware.
//!
//! Each request moves through `bound -> handler running -> finalized`, then
//! is either emitted or suppressed. The [`RenderContext`] for a request is
//! created here, travels with that request's response body, and is consumed
//! by the finalize hook: nothing per-request is stored in [`BaseLogger`].

use axum::{
    body::{Body, Bytes},
    extract::{Request, State},
    http::{HeaderMap, StatusCode, header},
    middleware::Next,
    response::Response,
};
use futures_util::stream;
use http_body::{Body as HttpBody, Frame, SizeHint};
use std::{
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
    time::Instant,
};
use tracing::{debug, warn};

use crate::config::LoggerConfig;
use crate::context::RenderContext;
use crate::render::Renderer;
use crate::sink::LogSink;
use crate::template::{Template, TemplateError};

/// Compiled logger shared by every request.
///
/// Use it as middleware state:
///
/// ```ignore
/// let logger = Arc::new(BaseLogger::new(LoggerConfig::default(), StdoutSink)?);
/// let app = Router::new()
///     .route("/", get(handler))
///     .layer(middleware::from_fn_with_state(logger, base_logger));
/// ```
pub struct BaseLogger {
    renderer: Renderer,
    sink: Arc<dyn LogSink>,
    form_body_limit: usize,
}

impl BaseLogger {
    /// Compiles the configured format. A malformed format is returned as an
    /// error so the server can refuse to start.
    pub fn new(config: LoggerConfig, sink: impl LogSink + 'static) -> Result<Self, TemplateError> {
        let template = Template::compile(&config.format)?;
        Ok(Self {
            renderer: Renderer::new(template, config.custom_time_format, config.color),
            sink: Arc::new(sink),
            form_body_limit: config.form_body_limit,
        })
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    /// Renders a line; with no context every tag is empty.
    pub fn render(&self, ctx: Option<&RenderContext>) -> Vec<u8> {
        self.renderer.render(ctx)
    }

    /// Renders `ctx` and writes it to the sink. Sink failures are reported
    /// and dropped.
    pub fn emit(&self, ctx: &RenderContext) {
        let line = self.renderer.render(Some(ctx));
        if let Err(err) = self.sink.write_line(&line) {
            warn!(error = %err, "failed to write access log line");
        }
    }

    fn finalize(&self, ctx: &RenderContext) {
        if should_emit(ctx.status(), ctx.host()) {
            self.emit(ctx);
        } else {
            debug!(
                method = %ctx.method(),
                uri = ctx.request_uri(),
                "access log line suppressed"
            );
        }
    }
}

impl std::fmt::Debug for BaseLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BaseLogger")
            .field("renderer", &self.renderer)
            .field("form_body_limit", &self.form_body_limit)
            .finish_non_exhaustive()
    }
}

/// Whether a finished response gets a log line.
///
/// Everything but a plain `200` is logged; a `200` is still logged when the
/// host mentions `localhost`.
pub fn should_emit(status: StatusCode, host: &str) -> bool {
    status != StatusCode::OK || host.contains("localhost")
}

/// Middleware that writes an access log line once the response is finalized.
///
/// The handler's response is returned unchanged apart from its body being
/// wrapped to count the bytes sent and to detect the end of the response.
pub async fn base_logger(
    State(logger): State<Arc<BaseLogger>>,
    req: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let (parts, body) = req.into_parts();
    let mut ctx = RenderContext::new(&parts, start);

    let body = if logger.renderer.template().uses_form() {
        let (body, form) = read_form(&parts.headers, body, logger.form_body_limit).await;
        ctx = ctx.with_form(form);
        body
    } else {
        body
    };

    let response = next.run(Request::from_parts(parts, body)).await;

    let (parts, body) = response.into_parts();
    ctx.set_response(&parts);
    let body = FinalizeBody {
        inner: body,
        bytes_out: 0,
        pending: Some(Pending { logger, ctx }),
    };
    Response::from_parts(parts, Body::new(body))
}

/// Buffers an urlencoded body of known, bounded size and decodes its fields.
/// The handler receives the same bytes, or the same read error.
async fn read_form(headers: &HeaderMap, body: Body, limit: usize) -> (Body, Vec<(String, String)>) {
    let urlencoded = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| {
            value
                .split(';')
                .next()
                .is_some_and(|mime| mime.trim().eq_ignore_ascii_case("application/x-www-form-urlencoded"))
        });
    if !urlencoded {
        return (body, Vec::new());
    }

    let declared = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<usize>().ok());
    match declared {
        Some(len) if len <= limit => {}
        _ => {
            debug!(?declared, limit, "form body not buffered");
            return (body, Vec::new());
        }
    }

    match axum::body::to_bytes(body, limit).await {
        Ok(bytes) => {
            let form = url::form_urlencoded::parse(&bytes).into_owned().collect();
            (Body::from(bytes), form)
        }
        Err(err) => {
            warn!(error = %err, "failed to buffer form body");
            let replay = stream::once(async move { Err::<Bytes, _>(err) });
            (Body::from_stream(replay), Vec::new())
        }
    }
}

/// Context waiting for its response to finish.
struct Pending {
    logger: Arc<BaseLogger>,
    ctx: RenderContext,
}

/// Response body that counts data bytes and runs the finalize hook exactly
/// once: at end of stream, on a body error, or when dropped unfinished.
struct FinalizeBody {
    inner: Body,
    bytes_out: u64,
    pending: Option<Pending>,
}

impl FinalizeBody {
    fn finish(&mut self) {
        if let Some(Pending { logger, mut ctx }) = self.pending.take() {
            ctx.set_bytes_out(self.bytes_out);
            logger.finalize(&ctx);
        }
    }
}

impl HttpBody for FinalizeBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        let poll = Pin::new(&mut this.inner).poll_frame(cx);
        match &poll {
            Poll::Ready(Some(Ok(frame))) => {
                if let Some(data) = frame.data_ref() {
                    this.bytes_out += data.len() as u64;
                }
            }
            Poll::Ready(Some(Err(_))) | Poll::Ready(None) => this.finish(),
            Poll::Pending => {}
        }
        poll
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

impl Drop for FinalizeBody {
    fn drop(&mut self) {
        self.finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;
    use axum::http::Request as HttpRequest;

    fn logger(format: &str) -> (Arc<BaseLogger>, MemorySink) {
        let sink = MemorySink::new();
        let logger = BaseLogger::new(LoggerConfig::default().with_format(format), sink.clone()).unwrap();
        (Arc::new(logger), sink)
    }

    fn pending_body(logger: Arc<BaseLogger>, host: &str, status: StatusCode, body: &'static str) -> FinalizeBody {
        let (parts, _) = HttpRequest::get("/items")
            .header("host", host)
            .body(())
            .unwrap()
            .into_parts();
        let mut ctx = RenderContext::new(&parts, Instant::now());
        let (parts, _) = Response::builder().status(status).body(()).unwrap().into_parts();
        ctx.set_response(&parts);

        FinalizeBody {
            inner: Body::from(body),
            bytes_out: 0,
            pending: Some(Pending { logger, ctx }),
        }
    }

    #[test]
    fn test_should_emit() {
        assert!(should_emit(StatusCode::NOT_FOUND, "example.com"));
        assert!(should_emit(StatusCode::INTERNAL_SERVER_ERROR, "example.com"));
        assert!(should_emit(StatusCode::CREATED, "example.com"));
        assert!(should_emit(StatusCode::OK, "localhost:8080"));
        assert!(should_emit(StatusCode::OK, "api.localhost"));
        assert!(!should_emit(StatusCode::OK, "example.com"));
        assert!(!should_emit(StatusCode::OK, ""));
    }

    #[test]
    fn test_malformed_format_fails_fast() {
        let err = BaseLogger::new(LoggerConfig::default().with_format("${status"), MemorySink::new())
            .unwrap_err();
        assert_eq!(err, TemplateError::UnclosedTag { offset: 0 });
    }

    #[test]
    fn test_render_without_context() {
        let (logger, sink) = logger(r#"{"status":${status}}"#);
        assert_eq!(logger.render(None), br#"{"status":}"#);
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn test_finalize_on_end_of_stream_counts_bytes() {
        let (logger, sink) = logger("${status} ${bytes_out}\n");
        let body = pending_body(logger, "example.com", StatusCode::NOT_FOUND, "not here");

        let bytes = axum::body::to_bytes(Body::new(body), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"not here");
        assert_eq!(sink.lines(), vec!["404 8\n"]);
    }

    #[test]
    fn test_finalize_on_drop_runs_once() {
        let (logger, sink) = logger("${status} ${bytes_out}\n");
        let mut body = pending_body(logger, "localhost", StatusCode::OK, "ok");
        body.finish();
        drop(body);

        assert_eq!(sink.lines(), vec!["200 0\n"]);
    }

    #[test]
    fn test_suppressed_line() {
        let (logger, sink) = logger("${status}\n");
        drop(pending_body(logger, "example.com", StatusCode::OK, "ok"));
        assert!(sink.is_empty());
    }

    #[test]
    fn test_size_hint_is_preserved() {
        let (logger, _sink) = logger("${status}\n");
        let body = pending_body(logger, "example.com", StatusCode::OK, "hello");
        assert_eq!(body.size_hint().exact(), Some(5));
    }
}
