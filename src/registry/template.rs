//! Declarative endpoint path templates.
//!
//! A template such as `/sobjects/Account/{id}` is parsed once at load time.
//! Each distinct placeholder binds to the next positional argument in order
//! of first appearance; a repeated name reuses its argument. Placeholders must
//! fill a whole path segment. Arguments are percent-encoded as path segments.

use std::fmt;
use std::str::FromStr;

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use thiserror::Error;

/// Characters escaped inside a single path segment.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("malformed placeholder in segment '{0}'")]
    MalformedPlaceholder(String),

    #[error("placeholder name in segment '{0}' must be alphanumeric")]
    InvalidPlaceholderName(String),

    #[error("expected {expected} path argument(s), got {got}")]
    ArityMismatch { expected: usize, got: usize },

    #[error("path argument {0} is empty")]
    EmptyArgument(usize),

    #[error("path argument {0} is a dot segment")]
    DotSegment(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(usize),
}

/// A parsed, data-only path template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTemplate {
    source: String,
    segments: Vec<Segment>,
    params: Vec<String>,
}

impl PathTemplate {
    pub fn parse(template: &str) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut params: Vec<String> = Vec::new();

        for raw in template.split('/').filter(|s| !s.is_empty()) {
            let opens = raw.matches('{').count();
            let closes = raw.matches('}').count();

            if opens == 0 && closes == 0 {
                segments.push(Segment::Literal(raw.to_string()));
                continue;
            }

            let name = raw
                .strip_prefix('{')
                .and_then(|s| s.strip_suffix('}'))
                .filter(|_| opens == 1 && closes == 1)
                .ok_or_else(|| TemplateError::MalformedPlaceholder(raw.to_string()))?;

            if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                return Err(TemplateError::InvalidPlaceholderName(raw.to_string()));
            }

            let index = match params.iter().position(|p| p == name) {
                Some(i) => i,
                None => {
                    params.push(name.to_string());
                    params.len() - 1
                }
            };
            segments.push(Segment::Param(index));
        }

        Ok(Self {
            source: template.to_string(),
            segments,
            params,
        })
    }

    /// Number of positional arguments the template consumes.
    pub fn arity(&self) -> usize {
        self.params.len()
    }

    /// Placeholder names in binding order.
    pub fn params(&self) -> &[String] {
        &self.params
    }

    /// Render a concrete, percent-encoded path for `args`.
    pub fn render(&self, args: &[String]) -> Result<String, TemplateError> {
        if args.len() != self.params.len() {
            return Err(TemplateError::ArityMismatch {
                expected: self.params.len(),
                got: args.len(),
            });
        }
        if let Some(i) = args.iter().position(|a| a.is_empty()) {
            return Err(TemplateError::EmptyArgument(i));
        }
        // URL normalization would collapse these into a parent path.
        if let Some(i) = args.iter().position(|a| a == "." || a == "..") {
            return Err(TemplateError::DotSegment(i));
        }

        if self.segments.is_empty() {
            return Ok("/".to_string());
        }

        let mut path = String::new();
        for segment in &self.segments {
            path.push('/');
            match segment {
                Segment::Literal(lit) => path.push_str(lit),
                Segment::Param(i) => path.extend(utf8_percent_encode(&args[*i], PATH_SEGMENT)),
            }
        }
        Ok(path)
    }
}

impl FromStr for PathTemplate {
    type Err = TemplateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for PathTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_render_single_param() {
        let t = PathTemplate::parse("/sobjects/Account/{id}").unwrap();
        assert_eq!(t.arity(), 1);
        assert_eq!(t.render(&args(&["001xx"])).unwrap(), "/sobjects/Account/001xx");
    }

    #[test]
    fn test_no_params() {
        let t = PathTemplate::parse("/sobjects/Account").unwrap();
        assert_eq!(t.arity(), 0);
        assert_eq!(t.render(&[]).unwrap(), "/sobjects/Account");
        assert_eq!(PathTemplate::parse("/").unwrap().render(&[]).unwrap(), "/");
    }

    #[test]
    fn test_positional_binding_and_reuse() {
        let t = PathTemplate::parse("/orgs/{org}/users/{user}/orgs/{org}").unwrap();
        assert_eq!(t.params(), &["org".to_string(), "user".to_string()]);
        assert_eq!(t.render(&args(&["a", "b"])).unwrap(), "/orgs/a/users/b/orgs/a");
    }

    #[test]
    fn test_arguments_are_encoded() {
        let t = PathTemplate::parse("/files/{name}").unwrap();
        assert_eq!(t.render(&args(&["a b/c?d"])).unwrap(), "/files/a%20b%2Fc%3Fd");
    }

    #[test]
    fn test_arity_mismatch() {
        let t = PathTemplate::parse("/a/{x}/b/{y}").unwrap();
        assert_eq!(
            t.render(&args(&["1"])),
            Err(TemplateError::ArityMismatch { expected: 2, got: 1 })
        );
        assert_eq!(t.render(&args(&["1", ""])), Err(TemplateError::EmptyArgument(1)));
    }

    #[test]
    fn test_dot_segments_rejected() {
        let t = PathTemplate::parse("/sobjects/Account/{id}").unwrap();
        assert_eq!(t.render(&args(&[".."])), Err(TemplateError::DotSegment(0)));
        assert_eq!(t.render(&args(&["."])), Err(TemplateError::DotSegment(0)));

        let t = PathTemplate::parse("/a/{x}/b/{y}").unwrap();
        assert_eq!(t.render(&args(&["ok", ".."])), Err(TemplateError::DotSegment(1)));
        assert_eq!(t.render(&args(&["...", ".hidden"])).unwrap(), "/a/.../b/.hidden");
    }

    #[test]
    fn test_malformed_templates() {
        assert!(matches!(
            PathTemplate::parse("/items/{id"),
            Err(TemplateError::MalformedPlaceholder(_))
        ));
        assert!(matches!(
            PathTemplate::parse("/items/{id}.json"),
            Err(TemplateError::MalformedPlaceholder(_))
        ));
        assert!(matches!(
            PathTemplate::parse("/items/{}"),
            Err(TemplateError::InvalidPlaceholderName(_))
        ));
        assert!(matches!(
            PathTemplate::parse("/items/{a-b}"),
            Err(TemplateError::InvalidPlaceholderName(_))
        ));
    }
}
