//! Path pattern validation and matching.
//!
//! # Responsibilities
//! - Parse `/users/{id}` and `/files/{*rest}` patterns into segments
//! - Compile a route table snapshot into an immutable `matchit` router
//! - Match request paths and capture percent-decoded parameters in pattern order
//!
//! # Design Decisions
//! - Every engine validates its table through `PathMatcher::compile` before
//!   serving, so a table that one engine rejects is rejected by all of them
//! - Matching uses `matchit`, the router underneath axum; conflict detection,
//!   static-over-parameter priority and catch-all rules are therefore the same
//!   on every engine
//! - Parameters are decoded the way axum decodes them: percent-decoding, then
//!   UTF-8 validation; `+` stays a plus

use std::collections::HashMap;
use std::fmt;

use percent_encoding::percent_decode_str;

use crate::error::WebError;
use crate::routing::mapper::Mapper;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Static,
    Param(String),
    CatchAll(String),
}

/// A parsed path pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    raw: String,
    segments: Vec<Segment>,
}

impl PathPattern {
    pub fn parse(pattern: &str) -> Result<Self, WebError> {
        let invalid = |reason: &str| WebError::InvalidRoute {
            path: pattern.to_string(),
            reason: reason.to_string(),
        };

        let Some(rest) = pattern.strip_prefix('/') else {
            return Err(invalid("pattern must start with '/'"));
        };

        let parts: Vec<&str> = rest.split('/').collect();
        let mut segments = Vec::with_capacity(parts.len());
        let mut names: Vec<&str> = Vec::new();

        for (index, part) in parts.iter().enumerate() {
            let segment = match part.strip_prefix('{').and_then(|p| p.strip_suffix('}')) {
                Some(inner) => {
                    let (name, catch_all) = match inner.strip_prefix('*') {
                        Some(name) => (name, true),
                        None => (inner, false),
                    };
                    if name.is_empty() || name.contains(['{', '}', '*']) {
                        return Err(invalid("empty or malformed parameter name"));
                    }
                    if names.contains(&name) {
                        return Err(invalid("duplicate parameter name"));
                    }
                    names.push(name);
                    if catch_all {
                        if index != parts.len() - 1 {
                            return Err(invalid("catch-all must be the last segment"));
                        }
                        Segment::CatchAll(name.to_string())
                    } else {
                        Segment::Param(name.to_string())
                    }
                }
                None => {
                    if part.contains(['{', '}']) {
                        return Err(invalid("parameters must span a whole segment"));
                    }
                    Segment::Static
                }
            };
            segments.push(segment);
        }

        Ok(Self {
            raw: pattern.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Parameter names in pattern order.
    pub fn param_names(&self) -> Vec<&str> {
        self.segments
            .iter()
            .filter_map(|segment| match segment {
                Segment::Param(name) | Segment::CatchAll(name) => Some(name.as_str()),
                Segment::Static => None,
            })
            .collect()
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Parameters captured by a match, or the reason they could not be decoded.
pub type MatchedParams = Result<Vec<(String, String)>, WebError>;

/// Compiled, immutable route lookup.
pub struct PathMatcher {
    router: matchit::Router<Mapper>,
    len: usize,
}

impl PathMatcher {
    /// Compile a route table snapshot.
    ///
    /// Fails on the first invalid pattern or on two patterns matching the same
    /// paths (`/{a}` and `/{b}`). Patterns are inserted in sorted order so the
    /// reported error does not depend on hash order.
    pub fn compile(mappers: HashMap<String, Mapper>) -> Result<Self, WebError> {
        let mut mappers: Vec<Mapper> = mappers.into_values().collect();
        mappers.sort_by(|a, b| a.path.cmp(&b.path));

        let mut router = matchit::Router::new();
        let len = mappers.len();
        for mapper in mappers {
            PathPattern::parse(&mapper.path)?;
            let path = mapper.path.clone();
            router.insert(path.clone(), mapper).map_err(|e| WebError::InvalidRoute {
                path,
                reason: e.to_string(),
            })?;
        }

        Ok(Self { router, len })
    }

    /// Find the mapper for `path` and its decoded parameters.
    pub fn find(&self, path: &str) -> Option<(&Mapper, MatchedParams)> {
        let matched = self.router.at(path).ok()?;
        let params: MatchedParams = matched
            .params
            .iter()
            .map(|(name, value)| decode_param(value).map(|value| (name.to_string(), value)))
            .collect();
        Some((matched.value, params))
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl fmt::Debug for PathMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PathMatcher").field("len", &self.len).finish_non_exhaustive()
    }
}

/// Error reported when a captured parameter is not valid UTF-8 once decoded.
pub fn invalid_param_error() -> WebError {
    WebError::BadRequest("invalid UTF-8 in path parameter".to_string())
}

fn decode_param(raw: &str) -> Result<String, WebError> {
    percent_decode_str(raw)
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .map_err(|_| invalid_param_error())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::mapper::{RouteTable, WebMapperExt};

    fn params(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn compile(paths: &[&str]) -> Result<PathMatcher, WebError> {
        let mut table = RouteTable::new();
        for path in paths {
            table.get(path, |_ctx| Box::pin(async {}), vec![]);
        }
        PathMatcher::compile(table.mappers())
    }

    fn find(matcher: &PathMatcher, path: &str) -> Option<(String, Vec<(String, String)>)> {
        matcher
            .find(path)
            .map(|(mapper, found)| (mapper.path.clone(), found.unwrap()))
    }

    #[test]
    fn test_static_pattern() {
        let matcher = compile(&["/health", "/"]).unwrap();
        assert_eq!(find(&matcher, "/health"), Some(("/health".to_string(), vec![])));
        assert_eq!(find(&matcher, "/"), Some(("/".to_string(), vec![])));
        assert!(find(&matcher, "/health/").is_none());
        assert!(find(&matcher, "/healthz").is_none());
    }

    #[test]
    fn test_param_capture_in_order() {
        let pattern = PathPattern::parse("/users/{user}/posts/{post}").unwrap();
        assert_eq!(pattern.param_names(), vec!["user", "post"]);

        let matcher = compile(&["/users/{user}/posts/{post}"]).unwrap();
        let (_, found) = find(&matcher, "/users/42/posts/7").unwrap();
        assert_eq!(found, params(&[("user", "42"), ("post", "7")]));
        assert!(find(&matcher, "/users/42/posts").is_none());
    }

    #[test]
    fn test_catch_all() {
        let matcher = compile(&["/files/{*rest}"]).unwrap();
        let (_, found) = find(&matcher, "/files/a/b/c.txt").unwrap();
        assert_eq!(found, params(&[("rest", "a/b/c.txt")]));
        assert!(find(&matcher, "/files").is_none());
    }

    #[test]
    fn test_params_are_percent_decoded() {
        let matcher = compile(&["/users/{id}"]).unwrap();
        let (_, found) = find(&matcher, "/users/a%20b%2Fc").unwrap();
        assert_eq!(found, params(&[("id", "a b/c")]));

        let (_, found) = find(&matcher, "/users/a+b").unwrap();
        assert_eq!(found, params(&[("id", "a+b")]));
    }

    #[test]
    fn test_invalid_utf8_param_is_bad_request() {
        let matcher = compile(&["/users/{id}"]).unwrap();
        let (_, found) = matcher.find("/users/%FF").unwrap();
        assert!(matches!(found, Err(WebError::BadRequest(_))));
    }

    #[test]
    fn test_invalid_patterns() {
        for bad in ["", "health", "/{}", "/{*}", "/{*rest}/more", "/a{id}", "/{id}/{id}"] {
            assert!(
                matches!(PathPattern::parse(bad), Err(WebError::InvalidRoute { .. })),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_static_beats_param() {
        let matcher = compile(&["/users/{id}", "/users/me"]).unwrap();
        assert_eq!(matcher.len(), 2);

        assert_eq!(find(&matcher, "/users/me"), Some(("/users/me".to_string(), vec![])));
        assert_eq!(
            find(&matcher, "/users/9"),
            Some(("/users/{id}".to_string(), params(&[("id", "9")])))
        );
        assert!(find(&matcher, "/missing").is_none());
    }

    #[test]
    fn test_conflicting_params_rejected() {
        let err = compile(&["/{x}", "/{y}"]).unwrap_err();
        assert!(matches!(err, WebError::InvalidRoute { .. }), "{err}");
    }

    #[test]
    fn test_compile_rejects_bad_pattern() {
        assert!(compile(&["no-slash"]).is_err());
    }
}
