//! Template tags and the name tables used to resolve them.

/// A placeholder inside a log format string.
///
/// Tags are resolved from their textual name once, when the template is
/// compiled. Names that match nothing become [`Tag::Unknown`] and render as
/// an empty string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tag {
    TimeUnix,
    TimeUnixNano,
    TimeRfc3339,
    TimeRfc3339Nano,
    TimeCustom,
    Id,
    RemoteIp,
    Host,
    Uri,
    Method,
    Path,
    Protocol,
    Referer,
    UserAgent,
    Status,
    Error,
    Latency,
    LatencyHuman,
    BytesIn,
    BytesOut,
    /// `header:<name>`, a request header.
    Header(String),
    /// `query:<name>`, a query string parameter.
    Query(String),
    /// `form:<name>`, a form field from the body or the query string.
    Form(String),
    /// `cookie:<name>`, a request cookie.
    Cookie(String),
    Unknown(String),
}

const FIXED_TAGS: [(&str, Tag); 20] = [
    ("time_unix", Tag::TimeUnix),
    ("time_unix_nano", Tag::TimeUnixNano),
    ("time_rfc3339", Tag::TimeRfc3339),
    ("time_rfc3339_nano", Tag::TimeRfc3339Nano),
    ("time_custom", Tag::TimeCustom),
    ("id", Tag::Id),
    ("remote_ip", Tag::RemoteIp),
    ("host", Tag::Host),
    ("uri", Tag::Uri),
    ("method", Tag::Method),
    ("path", Tag::Path),
    ("protocol", Tag::Protocol),
    ("referer", Tag::Referer),
    ("user_agent", Tag::UserAgent),
    ("status", Tag::Status),
    ("error", Tag::Error),
    ("latency", Tag::Latency),
    ("latency_human", Tag::LatencyHuman),
    ("bytes_in", Tag::BytesIn),
    ("bytes_out", Tag::BytesOut),
];

const PREFIX_TAGS: [(&str, fn(String) -> Tag); 4] = [
    ("header:", Tag::Header),
    ("query:", Tag::Query),
    ("form:", Tag::Form),
    ("cookie:", Tag::Cookie),
];

impl Tag {
    /// Resolves a tag name as written between `${` and `}`.
    ///
    /// Fixed tag names match with either `_` or `-` as the word separator.
    /// The sub-key of a prefixed tag is kept verbatim.
    pub fn parse(name: &str) -> Tag {
        for (prefix, make) in PREFIX_TAGS {
            if let Some(key) = name.strip_prefix(prefix) {
                return make(key.to_string());
            }
        }

        let normalized = name.replace('-', "_");
        FIXED_TAGS
            .iter()
            .find(|(fixed, _)| *fixed == normalized)
            .map(|(_, tag)| tag.clone())
            .unwrap_or_else(|| Tag::Unknown(name.to_string()))
    }

    /// Whether rendering this tag needs the parsed request form.
    pub fn is_form(&self) -> bool {
        matches!(self, Tag::Form(_))
    }
}

impl std::str::FromStr for Tag {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Tag::parse(s))
    }
}
