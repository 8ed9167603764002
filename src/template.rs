//! Parsing of `${tag}` log format strings.

use std::fmt;
use std::str::FromStr;

use crate::tag::Tag;

const START_TAG: &str = "${";
const END_TAG: &str = "}";

/// Errors raised while compiling a format string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    #[error("unclosed tag starting at byte {offset}: cannot find `}}` after `${{`")]
    UnclosedTag { offset: usize },
}

/// One piece of a compiled template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Tag(Tag),
}

/// An immutable, compiled log format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
}

impl Template {
    /// Compiles `format`, failing only when a `${` is never closed.
    pub fn compile(format: &str) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut rest = format;
        let mut offset = 0;

        while let Some(start) = rest.find(START_TAG) {
            if start > 0 {
                segments.push(Segment::Literal(rest[..start].to_string()));
            }

            let after_start = &rest[start + START_TAG.len()..];
            let end = after_start.find(END_TAG).ok_or(TemplateError::UnclosedTag {
                offset: offset + start,
            })?;
            segments.push(Segment::Tag(Tag::parse(&after_start[..end])));

            let consumed = start + START_TAG.len() + end + END_TAG.len();
            rest = &rest[consumed..];
            offset += consumed;
        }

        if !rest.is_empty() {
            segments.push(Segment::Literal(rest.to_string()));
        }

        Ok(Self {
            source: format.to_string(),
            segments,
        })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Tags in the order they appear.
    pub fn tags(&self) -> impl Iterator<Item = &Tag> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Tag(tag) => Some(tag),
            Segment::Literal(_) => None,
        })
    }

    /// Whether any tag reads form fields, which may require buffering the body.
    pub fn uses_form(&self) -> bool {
        self.tags().any(Tag::is_form)
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

impl FromStr for Template {
    type Err = TemplateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Template::compile(s)
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_splits_literals_and_tags() {
        let template = Template::compile(r#"{"status":${status},"h":"${header:X-A}"}"#).unwrap();
        assert_eq!(
            template.segments(),
            &[
                Segment::Literal(r#"{"status":"#.to_string()),
                Segment::Tag(Tag::Status),
                Segment::Literal(r#","h":""#.to_string()),
                Segment::Tag(Tag::Header("X-A".to_string())),
                Segment::Literal(r#""}"#.to_string()),
            ]
        );
    }

    #[test]
    fn test_adjacent_tags_and_edges() {
        let template = Template::compile("${method}${path}").unwrap();
        assert_eq!(
            template.segments(),
            &[Segment::Tag(Tag::Method), Segment::Tag(Tag::Path)]
        );

        let template = Template::compile("no tags } here").unwrap();
        assert_eq!(
            template.segments(),
            &[Segment::Literal("no tags } here".to_string())]
        );

        assert!(Template::compile("").unwrap().segments().is_empty());
    }

    #[test]
    fn test_empty_tag_is_unknown() {
        let template = Template::compile("a${}b").unwrap();
        assert_eq!(template.tags().collect::<Vec<_>>(), vec![&Tag::Unknown(String::new())]);
    }

    #[test]
    fn test_unclosed_tag_reports_offset() {
        assert_eq!(
            Template::compile("ok ${status} then ${oops"),
            Err(TemplateError::UnclosedTag { offset: 18 })
        );
        assert_eq!(
            "${".parse::<Template>(),
            Err(TemplateError::UnclosedTag { offset: 0 })
        );
    }

    #[test]
    fn test_uses_form_and_display() {
        let source = "${form:name} ${query:q}";
        let template: Template = source.parse().unwrap();
        assert!(template.uses_form());
        assert_eq!(template.to_string(), source);
        assert!(!Template::compile("${query:q}").unwrap().uses_form());
    }
}
