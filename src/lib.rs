//! Base-logger library - access log lines for non-200 responses, rendered
//! from `${tag}` templates.

pub mod cli;
pub mod colors;
pub mod config;
pub mod context;
pub mod handlers;
pub mod middleware;
pub mod render;
pub mod sink;
pub mod tag;
pub mod template;

pub use config::LoggerConfig;
pub use context::{LoggedError, RenderContext};
pub use middleware::{BaseLogger, base_logger, should_emit};
pub use sink::{LogSink, MemorySink, StdoutSink, TracingSink};
pub use template::{Template, TemplateError};
