//! URL canonicalization and same-origin filtering.
//!
//! Every URL that enters the visited set goes through [`canonicalize`], so two
//! links addressing the same resource (trailing slash, fragment, default port)
//! are only ever crawled once.

use url::Url;

const SKIPPED_PREFIXES: [&str; 4] = ["javascript:", "mailto:", "tel:", "data:"];

/// Canonical form: `scheme://host[:port]/path[?query]`.
///
/// Fragments are dropped and a trailing slash is stripped from any path other
/// than the root. Returns `None` for anything that is not http(s).
pub fn canonicalize(url: &Url) -> Option<String> {
    let scheme = url.scheme();
    if scheme != "http" && scheme != "https" {
        return None;
    }

    let host = url.host_str()?;
    let mut canonical = format!("{}://{}", scheme, host);
    if let Some(port) = url.port() {
        canonical.push_str(&format!(":{}", port));
    }

    let path = url.path().trim_end_matches('/');
    if path.is_empty() {
        canonical.push('/');
    } else {
        canonical.push_str(path);
    }

    if let Some(query) = url.query().filter(|q| !q.is_empty()) {
        canonical.push('?');
        canonical.push_str(query);
    }

    Some(canonical)
}

/// Parse and canonicalize an absolute URL.
pub fn normalize_url(raw: &str) -> Option<String> {
    let parsed = Url::parse(raw.trim()).ok()?;
    canonicalize(&parsed)
}

/// Resolve a (possibly relative) link found on `base` and keep it only if it
/// stays on `origin_host`.
pub fn resolve_link(base: &Url, href: &str, origin_host: &str) -> Option<String> {
    let href = href.trim();
    let lower = href.to_ascii_lowercase();
    if href.is_empty()
        || href.starts_with('#')
        || SKIPPED_PREFIXES.iter().any(|p| lower.starts_with(p))
    {
        return None;
    }

    let resolved = base.join(href).ok()?;
    if !host_matches(&resolved, origin_host) {
        return None;
    }

    canonicalize(&resolved)
}

pub fn is_same_origin(url: &str, origin_host: &str) -> bool {
    Url::parse(url)
        .map(|u| host_matches(&u, origin_host))
        .unwrap_or(false)
}

fn host_matches(url: &Url, origin_host: &str) -> bool {
    url.host_str()
        .is_some_and(|host| host.eq_ignore_ascii_case(origin_host))
}
