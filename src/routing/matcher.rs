//! Route key matching.
//!
//! # Key forms
//! - `/docs`: path prefix, matched against the request path only
//! - `example.com`: host, matched against the `Host` header without port
//! - `example.com/blog`: host plus path prefix
//! - `default`: never matched here, it is the registry's fallback
//!
//! # Design Decisions
//! - Host matching is case-insensitive (RFC 9110)
//! - Path matching is case-sensitive
//! - A prefix only matches on a segment boundary: `/blog` matches `/blog`
//!   and `/blog/x`, not `/blogger`
//! - No regex to guarantee O(n) matching

use crate::config::schema::DEFAULT_HOST;

/// The parts of a request that routing looks at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTarget {
    /// Lowercased host name without port.
    pub host: String,
    pub path: String,
}

impl RouteTarget {
    pub fn new(host_header: Option<&str>, path: &str) -> Self {
        Self {
            host: host_header.map(strip_port).unwrap_or_default().to_lowercase(),
            path: path.to_string(),
        }
    }
}

/// Trait for matching requests against a route key.
pub trait Matcher: Send + Sync + std::fmt::Debug {
    /// Length of the matched key, `None` if the target does not match.
    fn match_len(&self, target: &RouteTarget) -> Option<usize>;
}

/// Matches `host[/path]` keys.
#[derive(Debug, Clone)]
pub struct HostMatcher {
    key: String,
}

impl HostMatcher {
    /// The host part is normalized to lowercase.
    pub fn new(key: &str) -> Self {
        let key = match key.find('/') {
            Some(i) => format!("{}{}", key[..i].to_lowercase(), &key[i..]),
            None => key.to_lowercase(),
        };
        Self { key }
    }
}

impl Matcher for HostMatcher {
    fn match_len(&self, target: &RouteTarget) -> Option<usize> {
        if target.host.is_empty() {
            return None;
        }
        let candidate = format!("{}{}", target.host, target.path);
        is_boundary_prefix(&candidate, &self.key).then_some(self.key.len())
    }
}

/// Matches bare `/prefix` keys against the request path.
#[derive(Debug, Clone)]
pub struct PathPrefixMatcher {
    prefix: String,
}

impl PathPrefixMatcher {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }
}

impl Matcher for PathPrefixMatcher {
    fn match_len(&self, target: &RouteTarget) -> Option<usize> {
        is_boundary_prefix(&target.path, &self.prefix).then_some(self.prefix.len())
    }
}

/// Build the matcher for a route key. `None` for the default key.
pub fn compile(key: &str) -> Option<Box<dyn Matcher>> {
    if key == DEFAULT_HOST {
        None
    } else if key.starts_with('/') {
        Some(Box::new(PathPrefixMatcher::new(key)))
    } else {
        Some(Box::new(HostMatcher::new(key)))
    }
}

/// Whether `prefix` is a prefix of `candidate` ending on a `/` boundary.
pub fn is_boundary_prefix(candidate: &str, prefix: &str) -> bool {
    if prefix.is_empty() || !candidate.starts_with(prefix) {
        return false;
    }
    candidate.len() == prefix.len() || prefix.ends_with('/') || candidate.as_bytes()[prefix.len()] == b'/'
}

/// Host header value without its port.
pub fn strip_port(host: &str) -> &str {
    if host.starts_with('[') {
        return match host.find(']') {
            Some(end) => &host[..=end],
            None => host,
        };
    }
    host.split(':').next().unwrap_or(host)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(host: &str, path: &str) -> RouteTarget {
        RouteTarget::new(Some(host), path)
    }

    #[test]
    fn test_host_matcher() {
        let matcher = HostMatcher::new("Example.com");
        assert_eq!(matcher.match_len(&target("example.com:8080", "/")), Some(11));
        assert_eq!(matcher.match_len(&target("EXAMPLE.COM", "/a/b")), Some(11));
        assert_eq!(matcher.match_len(&target("other.com", "/")), None);
        assert_eq!(matcher.match_len(&target("example.community", "/")), None);
    }

    #[test]
    fn test_host_path_matcher() {
        let matcher = HostMatcher::new("example.com/blog");
        assert_eq!(matcher.match_len(&target("example.com", "/blog/post")), Some(16));
        assert_eq!(matcher.match_len(&target("example.com", "/blog")), Some(16));
        assert_eq!(matcher.match_len(&target("example.com", "/blogger")), None);
    }

    #[test]
    fn test_path_matcher() {
        let matcher = PathPrefixMatcher::new("/api");
        assert_eq!(matcher.match_len(&target("x", "/api/v1")), Some(4));
        assert_eq!(matcher.match_len(&target("x", "/images")), None);
        assert_eq!(matcher.match_len(&RouteTarget::new(None, "/api")), Some(4));

        let root = PathPrefixMatcher::new("/");
        assert_eq!(root.match_len(&target("x", "/anything")), Some(1));
    }

    #[test]
    fn test_compile_default() {
        assert!(compile(DEFAULT_HOST).is_none());
        assert!(compile("/docs").is_some());
    }

    #[test]
    fn test_strip_port() {
        assert_eq!(strip_port("example.com:80"), "example.com");
        assert_eq!(strip_port("example.com"), "example.com");
        assert_eq!(strip_port("[::1]:8080"), "[::1]");
    }
}
