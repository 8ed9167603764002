//! Resolution of compiled templates into log lines.

use chrono::{DateTime, Local, SecondsFormat};
use std::time::{Duration, Instant};

use crate::colors::colored_status;
use crate::context::RenderContext;
use crate::tag::Tag;
use crate::template::{Segment, Template};

/// The moment a line is rendered.
///
/// Time tags print `wall`; latency is measured up to `mono`.
#[derive(Debug, Clone, Copy)]
pub struct RenderClock {
    pub wall: DateTime<Local>,
    pub mono: Instant,
}

impl RenderClock {
    pub fn now() -> Self {
        Self {
            wall: Local::now(),
            mono: Instant::now(),
        }
    }
}

/// A compiled template plus the presentation options used to fill it.
#[derive(Debug, Clone)]
pub struct Renderer {
    template: Template,
    custom_time_format: String,
    color: bool,
}

impl Renderer {
    pub fn new(template: Template, custom_time_format: impl Into<String>, color: bool) -> Self {
        Self {
            template,
            custom_time_format: custom_time_format.into(),
            color,
        }
    }

    pub fn template(&self) -> &Template {
        &self.template
    }

    /// Renders one line, sampling the clock now.
    pub fn render(&self, ctx: Option<&RenderContext>) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.template.source().len() + 128);
        self.render_into(&mut buf, ctx, RenderClock::now());
        buf
    }

    /// Appends one line to `buf`.
    ///
    /// Without a context every tag renders empty and only the literal parts
    /// of the template are written. Rendering the same context with the same
    /// clock always yields the same bytes.
    pub fn render_into(&self, buf: &mut Vec<u8>, ctx: Option<&RenderContext>, clock: RenderClock) {
        for segment in self.template.segments() {
            match (segment, ctx) {
                (Segment::Literal(text), _) => put(buf, text),
                (Segment::Tag(tag), Some(ctx)) => self.resolve(buf, tag, ctx, &clock),
                (Segment::Tag(_), None) => {}
            }
        }
    }

    fn resolve(&self, buf: &mut Vec<u8>, tag: &Tag, ctx: &RenderContext, clock: &RenderClock) {
        match tag {
            Tag::TimeUnix => put(buf, clock.wall.timestamp().to_string()),
            Tag::TimeUnixNano => {
                if let Some(nanos) = clock.wall.timestamp_nanos_opt() {
                    put(buf, nanos.to_string());
                }
            }
            Tag::TimeRfc3339 => put(buf, clock.wall.to_rfc3339_opts(SecondsFormat::Secs, true)),
            Tag::TimeRfc3339Nano => put(buf, clock.wall.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            Tag::TimeCustom => put(buf, format_custom(&clock.wall, &self.custom_time_format)),
            Tag::Id => put(buf, ctx.request_id().unwrap_or_default()),
            Tag::RemoteIp => put(buf, ctx.real_ip()),
            Tag::Host => put(buf, ctx.host()),
            Tag::Uri => put(buf, ctx.request_uri()),
            Tag::Method => put(buf, ctx.method().as_str()),
            Tag::Path => put(buf, ctx.path()),
            Tag::Protocol => put(buf, ctx.protocol()),
            Tag::Referer => put(buf, ctx.header("referer").unwrap_or_default()),
            Tag::UserAgent => put(buf, ctx.header("user-agent").unwrap_or_default()),
            Tag::Status => put(buf, colored_status(ctx.status().as_u16(), self.color)),
            Tag::Error => {
                if let Some(err) = ctx.error() {
                    put(buf, escape_json_fragment(err.message()));
                }
            }
            Tag::Latency => put(buf, latency(ctx, clock).as_nanos().to_string()),
            Tag::LatencyHuman => put(buf, format!("{:?}", latency(ctx, clock))),
            Tag::BytesIn => put(buf, ctx.bytes_in()),
            Tag::BytesOut => put(buf, ctx.bytes_out().to_string()),
            Tag::Header(name) => put(buf, ctx.header(name).unwrap_or_default()),
            Tag::Query(name) => put(buf, ctx.query_param(name).unwrap_or_default()),
            Tag::Form(name) => put(buf, ctx.form_value(name).unwrap_or_default()),
            Tag::Cookie(name) => put(buf, ctx.cookie(name).unwrap_or_default()),
            Tag::Unknown(_) => {}
        }
    }
}

fn put(buf: &mut Vec<u8>, text: impl AsRef<[u8]>) {
    buf.extend_from_slice(text.as_ref());
}

fn latency(ctx: &RenderContext, clock: &RenderClock) -> Duration {
    clock.mono.saturating_duration_since(ctx.start())
}

/// Formats `wall` with a strftime pattern. An invalid pattern renders empty
/// instead of panicking inside `Display`.
fn format_custom(wall: &DateTime<Local>, pattern: &str) -> String {
    use std::fmt::Write;

    let mut out = String::new();
    match write!(out, "{}", wall.format(pattern)) {
        Ok(()) => out,
        Err(_) => String::new(),
    }
}

/// JSON-escapes `text` without the surrounding quotes, so it can sit inside
/// the quotes of the template itself.
fn escape_json_fragment(text: &str) -> String {
    let quoted = serde_json::Value::from(text).to_string();
    quoted[1..quoted.len() - 1].to_string()
}
