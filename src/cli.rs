//! Command-line interface configuration.

use argh::FromArgs;
use std::net::SocketAddr;

/// A demo server that writes access log lines for non-200 responses
#[derive(Debug, FromArgs)]
pub struct Cli {
    /// server bind address (default: '127.0.0.1:8000')
    #[argh(option, default = "SocketAddr::from(([127, 0, 0, 1], 8000))")]
    pub bind: SocketAddr,

    /// log format with ${tag} placeholders (default: one JSON object per line)
    #[argh(option)]
    pub format: Option<String>,

    /// strftime pattern for ${time_custom}
    #[argh(option, long = "time-format")]
    pub time_format: Option<String>,

    /// environment name embedded in the default format (default: $APP_ENV)
    #[argh(option)]
    pub environment: Option<String>,

    /// color the status code
    #[argh(switch)]
    pub color: bool,
}
