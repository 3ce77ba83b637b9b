//! Path normalization and route pattern parsing.

use std::collections::HashMap;
use std::mem;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::{Result, RouterError};

/// The canonical spelling of the root path.
pub const ROOT: &str = "/";

/// Returns the canonical form of a request path.
///
/// An empty path and a lone `/` collapse to [`ROOT`]. Exactly one trailing
/// slash is stripped from every other path. No percent-decoding happens here.
///
/// ```
/// use oxide_router::path::normalize;
///
/// assert_eq!(normalize(""), "/");
/// assert_eq!(normalize("/users/42/"), "/users/42");
/// assert_eq!(normalize("/users//"), "/users/");
/// ```
pub fn normalize(raw: &str) -> &str {
    if raw.is_empty() || raw == ROOT {
        return ROOT;
    }
    raw.strip_suffix('/').unwrap_or(raw)
}

/// Removes `.` and `..` segments and duplicate slashes.
///
/// The result is always rooted. A trailing slash survives, so `/a/b/` stays
/// `/a/b/` and `/a/b/..` becomes `/a/`.
///
/// ```
/// use oxide_router::path::clean;
///
/// assert_eq!(clean("//users/./42/../7"), "/users/7");
/// assert_eq!(clean("/../.."), "/");
/// ```
pub fn clean(raw: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for segment in raw.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }

    let mut out = String::with_capacity(raw.len() + 1);
    for part in &parts {
        out.push('/');
        out.push_str(part);
    }

    let trailing = raw.ends_with('/') || raw.ends_with("/.") || raw.ends_with("/..");
    if out.is_empty() || trailing {
        out.push('/');
    }
    out
}

/// Adds a trailing slash if there is none, removes it otherwise.
pub(crate) fn toggle_trailing_slash(path: &str) -> String {
    match path.strip_suffix('/') {
        Some(stripped) => stripped.to_string(),
        None => format!("{path}/"),
    }
}

fn param_name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_.\-]*$").expect("valid regex"))
}

/// A segment in a path pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    /// A literal string segment.
    Literal(String),
    /// A parameter segment (e.g., `{id}`).
    Param(String),
    /// A catch-all segment (`*path` or `{*path}`), matches the remainder.
    CatchAll(String),
}

/// A run of the pattern as the route tree consumes it.
///
/// Literal segments and the slashes between them are merged into one
/// `Static` piece, so `/users/{id}/posts` becomes
/// `Static("/users/")`, `Param("id")`, `Static("/posts")`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Piece {
    Static(String),
    Param(String),
    CatchAll(String),
}

/// A parsed and validated route pattern.
#[derive(Debug, Clone)]
pub struct PathPattern {
    /// The original pattern string.
    pattern: String,
    /// Parsed segments.
    segments: Vec<PathSegment>,
    /// Whether the pattern ends with `/`.
    trailing_slash: bool,
}

impl PathPattern {
    /// Parses a path pattern string.
    ///
    /// Pattern syntax:
    /// - `/users` - Literal path
    /// - `/users/{id}` - Path with parameter
    /// - `/files/*path` or `/files/{*path}` - Catch-all (matches the rest of the path)
    ///
    /// # Example
    ///
    /// ```
    /// use oxide_router::PathPattern;
    ///
    /// let pattern = PathPattern::parse("/posts/{id}/comments/{comment_id}").unwrap();
    /// assert_eq!(pattern.param_names(), vec!["id", "comment_id"]);
    /// ```
    pub fn parse(pattern: &str) -> Result<Self> {
        let Some(body) = pattern.strip_prefix('/') else {
            return Err(RouterError::invalid_pattern(pattern, "must start with '/'"));
        };

        let mut segments = Vec::new();
        let mut trailing_slash = false;

        if !body.is_empty() {
            let parts: Vec<&str> = body.split('/').collect();
            let last = parts.len() - 1;
            for (i, part) in parts.iter().enumerate() {
                if part.is_empty() {
                    if i == last {
                        trailing_slash = true;
                        continue;
                    }
                    return Err(RouterError::invalid_pattern(pattern, "empty segment"));
                }
                segments.push(Self::parse_segment(pattern, part)?);
            }
        }

        let mut seen: Vec<&str> = Vec::new();
        for (i, segment) in segments.iter().enumerate() {
            match segment {
                PathSegment::Literal(_) => {}
                PathSegment::Param(name) | PathSegment::CatchAll(name) => {
                    if seen.contains(&name.as_str()) {
                        return Err(RouterError::invalid_pattern(
                            pattern,
                            format!("parameter {name:?} appears twice"),
                        ));
                    }
                    seen.push(name);
                }
            }
            if matches!(segment, PathSegment::CatchAll(_))
                && (i + 1 < segments.len() || trailing_slash)
            {
                return Err(RouterError::CatchAllNotLast {
                    pattern: pattern.to_string(),
                });
            }
        }

        Ok(Self {
            pattern: pattern.to_string(),
            segments,
            trailing_slash,
        })
    }

    fn parse_segment(pattern: &str, part: &str) -> Result<PathSegment> {
        let (name, catch_all) =
            if let Some(inner) = part.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
                match inner.strip_prefix('*') {
                    Some(name) => (name, true),
                    None => (inner, false),
                }
            } else if let Some(name) = part.strip_prefix('*') {
                (name, true)
            } else if part.contains(['{', '}']) {
                return Err(RouterError::invalid_pattern(
                    pattern,
                    format!("parameter must fill the whole segment: {part:?}"),
                ));
            } else {
                return Ok(PathSegment::Literal(part.to_string()));
            };

        if !param_name_regex().is_match(name) {
            return Err(RouterError::invalid_pattern(
                pattern,
                format!("bad parameter name {name:?}"),
            ));
        }

        Ok(if catch_all {
            PathSegment::CatchAll(name.to_string())
        } else {
            PathSegment::Param(name.to_string())
        })
    }

    /// Returns the original pattern string.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Returns the parsed segments.
    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// Returns the parameter names in order.
    pub fn param_names(&self) -> Vec<&str> {
        self.segments
            .iter()
            .filter_map(|s| match s {
                PathSegment::Param(name) | PathSegment::CatchAll(name) => Some(name.as_str()),
                PathSegment::Literal(_) => None,
            })
            .collect()
    }

    /// Returns true if the pattern has no parameters.
    pub fn is_static(&self) -> bool {
        self.segments
            .iter()
            .all(|s| matches!(s, PathSegment::Literal(_)))
    }

    pub(crate) fn pieces(&self) -> Vec<Piece> {
        let mut pieces = Vec::new();
        let mut text = String::new();

        for segment in &self.segments {
            text.push('/');
            match segment {
                PathSegment::Literal(s) => text.push_str(s),
                PathSegment::Param(name) => {
                    pieces.push(Piece::Static(mem::take(&mut text)));
                    pieces.push(Piece::Param(name.clone()));
                }
                PathSegment::CatchAll(name) => {
                    pieces.push(Piece::Static(mem::take(&mut text)));
                    pieces.push(Piece::CatchAll(name.clone()));
                }
            }
        }

        if self.trailing_slash || self.segments.is_empty() {
            text.push('/');
        }
        if !text.is_empty() {
            pieces.push(Piece::Static(text));
        }
        pieces
    }

    /// Generates a path from parameters.
    ///
    /// Returns `None` when a parameter is missing, empty, or (for a
    /// non-catch-all parameter) contains a slash.
    ///
    /// # Example
    ///
    /// ```
    /// use std::collections::HashMap;
    /// use oxide_router::PathPattern;
    ///
    /// let pattern = PathPattern::parse("/posts/{id}").unwrap();
    /// let params: HashMap<String, String> =
    ///     [("id".to_string(), "123".to_string())]
    ///     .into_iter()
    ///     .collect();
    /// let path = pattern.reverse(&params).unwrap();
    /// assert_eq!(path, "/posts/123");
    /// ```
    pub fn reverse(&self, params: &HashMap<String, String>) -> Option<String> {
        let mut path = String::new();

        for segment in &self.segments {
            path.push('/');
            match segment {
                PathSegment::Literal(s) => path.push_str(s),
                PathSegment::Param(name) => {
                    let value = params.get(name).filter(|v| !v.is_empty())?;
                    if value.contains('/') {
                        return None;
                    }
                    path.push_str(value);
                }
                PathSegment::CatchAll(name) => {
                    let value = params.get(name).filter(|v| !v.is_empty())?;
                    path.push_str(value.trim_start_matches('/'));
                }
            }
        }

        if path.is_empty() || self.trailing_slash {
            path.push('/');
        }

        Some(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(""), "/");
        assert_eq!(normalize("/"), "/");
        assert_eq!(normalize("/users"), "/users");
        assert_eq!(normalize("/users/"), "/users");
        assert_eq!(normalize("/users//"), "/users/");
        assert_eq!(normalize("/a%20b/"), "/a%20b");
    }

    #[test]
    fn test_clean() {
        assert_eq!(clean(""), "/");
        assert_eq!(clean("/"), "/");
        assert_eq!(clean("abc"), "/abc");
        assert_eq!(clean("/abc/"), "/abc/");
        assert_eq!(clean("/a/b/c/./../../g"), "/a/g");
        assert_eq!(clean("/a//b///c"), "/a/b/c");
        assert_eq!(clean("/abc/."), "/abc/");
        assert_eq!(clean("/abc/def/.."), "/abc/");
        assert_eq!(clean("/../../x"), "/x");
    }

    #[test]
    fn test_toggle_trailing_slash() {
        assert_eq!(toggle_trailing_slash("/a"), "/a/");
        assert_eq!(toggle_trailing_slash("/a/"), "/a");
    }

    #[test]
    fn test_literal_pattern() {
        let pattern = PathPattern::parse("/users").unwrap();
        assert!(pattern.is_static());
        assert_eq!(
            pattern.segments(),
            &[PathSegment::Literal("users".to_string())]
        );
        assert_eq!(pattern.pieces(), vec![Piece::Static("/users".to_string())]);
    }

    #[test]
    fn test_root_pattern() {
        let pattern = PathPattern::parse("/").unwrap();
        assert!(pattern.segments().is_empty());
        assert_eq!(pattern.pieces(), vec![Piece::Static("/".to_string())]);
    }

    #[test]
    fn test_param_pieces() {
        let pattern = PathPattern::parse("/posts/{post_id}/comments/{comment_id}").unwrap();
        assert_eq!(pattern.param_names(), vec!["post_id", "comment_id"]);
        assert_eq!(
            pattern.pieces(),
            vec![
                Piece::Static("/posts/".to_string()),
                Piece::Param("post_id".to_string()),
                Piece::Static("/comments/".to_string()),
                Piece::Param("comment_id".to_string()),
            ]
        );
    }

    #[test]
    fn test_catch_all_syntaxes() {
        for raw in ["/files/*path", "/files/{*path}"] {
            let pattern = PathPattern::parse(raw).unwrap();
            assert_eq!(
                pattern.pieces(),
                vec![
                    Piece::Static("/files/".to_string()),
                    Piece::CatchAll("path".to_string()),
                ]
            );
        }
    }

    #[test]
    fn test_trailing_slash_pattern() {
        let pattern = PathPattern::parse("/docs/").unwrap();
        assert_eq!(pattern.pieces(), vec![Piece::Static("/docs/".to_string())]);
    }

    #[test]
    fn test_invalid_patterns() {
        assert!(matches!(
            PathPattern::parse("users"),
            Err(RouterError::InvalidPattern { .. })
        ));
        assert!(matches!(
            PathPattern::parse("/a//b"),
            Err(RouterError::InvalidPattern { .. })
        ));
        assert!(matches!(
            PathPattern::parse("/user-{id}"),
            Err(RouterError::InvalidPattern { .. })
        ));
        assert!(matches!(
            PathPattern::parse("/{}"),
            Err(RouterError::InvalidPattern { .. })
        ));
        assert!(matches!(
            PathPattern::parse("/{a}/{a}"),
            Err(RouterError::InvalidPattern { .. })
        ));
        assert!(matches!(
            PathPattern::parse("/files/*rest/more"),
            Err(RouterError::CatchAllNotLast { .. })
        ));
        assert!(matches!(
            PathPattern::parse("/files/*rest/"),
            Err(RouterError::CatchAllNotLast { .. })
        ));
    }

    #[test]
    fn test_reverse() {
        let pattern = PathPattern::parse("/posts/{id}").unwrap();
        let params: HashMap<String, String> = [("id".to_string(), "123".to_string())]
            .into_iter()
            .collect();
        assert_eq!(pattern.reverse(&params), Some("/posts/123".to_string()));
    }

    #[test]
    fn test_reverse_catch_all() {
        let pattern = PathPattern::parse("/static/*file").unwrap();
        let params: HashMap<String, String> = [("file".to_string(), "css/app.css".to_string())]
            .into_iter()
            .collect();
        assert_eq!(
            pattern.reverse(&params),
            Some("/static/css/app.css".to_string())
        );
    }

    #[test]
    fn test_reverse_missing_param() {
        let pattern = PathPattern::parse("/posts/{id}").unwrap();
        let params: HashMap<String, String> = HashMap::new();
        assert!(pattern.reverse(&params).is_none());

        let params: HashMap<String, String> = [("id".to_string(), "a/b".to_string())]
            .into_iter()
            .collect();
        assert!(pattern.reverse(&params).is_none());
    }
}
