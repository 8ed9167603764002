//! Logger configuration.

/// Default pattern for `${time_custom}`.
pub const DEFAULT_CUSTOM_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Largest urlencoded body buffered to resolve `${form:...}` tags.
pub const DEFAULT_FORM_BODY_LIMIT: usize = 1024 * 1024;

/// Configuration for [`crate::middleware::BaseLogger`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggerConfig {
    /// Format string with `${tag}` placeholders.
    pub format: String,
    /// strftime pattern used by `${time_custom}`.
    pub custom_time_format: String,
    /// Wrap `${status}` in ANSI colors.
    pub color: bool,
    pub form_body_limit: usize,
}

impl LoggerConfig {
    /// The one-JSON-object-per-line format, tagged with `environment`.
    pub fn json(environment: &str) -> Self {
        Self {
            format: json_format(environment),
            ..Self::default()
        }
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = format.into();
        self
    }

    pub fn with_custom_time_format(mut self, pattern: impl Into<String>) -> Self {
        self.custom_time_format = pattern.into();
        self
    }

    pub fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    pub fn with_form_body_limit(mut self, limit: usize) -> Self {
        self.form_body_limit = limit;
        self
    }
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            format: json_format(""),
            custom_time_format: DEFAULT_CUSTOM_TIME_FORMAT.to_string(),
            color: false,
            form_body_limit: DEFAULT_FORM_BODY_LIMIT,
        }
    }
}

fn json_format(environment: &str) -> String {
    // The environment is a literal, so it must not open a tag of its own.
    let environment = serde_json::Value::from(environment.replace("${", "$ {")).to_string();
    format!(
        concat!(
            r#"{{"time":"${{time_rfc3339_nano}}","id":"${{id}}","remote_ip":"${{remote_ip}}","#,
            r#""host":"${{host}}","method":"${{method}}","uri":"${{uri}}","user_agent":"${{user_agent}}","#,
            r#""status":${{status}},"error":"${{error}}","latency":${{latency}},"latency_human":"${{latency_human}}""#,
            r#","environment":{},"bytes_in":${{bytes_in}},"bytes_out":${{bytes_out}}}}"#,
            "\n"
        ),
        environment
    )
}
