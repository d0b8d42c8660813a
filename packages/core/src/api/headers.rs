//! Conditional-request helpers shared by the JSON endpoints.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::Response;
use chrono::{DateTime, Utc};

/// Quoted ETag derived from the response bytes.
pub fn compute_etag(body: &[u8]) -> String {
    let mut hasher = DefaultHasher::new();
    body.hash(&mut hasher);
    format!("\"{:x}\"", hasher.finish())
}

pub fn cache_control(max_age: u32, swr: u32) -> String {
    format!("max-age={}, stale-while-revalidate={}", max_age, swr)
}

/// RFC 7231 HTTP-date.
pub fn http_date(timestamp: DateTime<Utc>) -> String {
    timestamp.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// `true` when `If-None-Match` lists `*` or `etag`.
pub fn if_none_match_matches(headers: &HeaderMap, etag: &str) -> bool {
    headers
        .get(header::IF_NONE_MATCH)
        .and_then(|value| value.to_str().ok())
        .map(|raw| raw.split(',').map(str::trim).any(|tag| tag == "*" || tag == etag))
        .unwrap_or(false)
}

/// Cache-aware JSON response for `body`, answering `304 Not Modified` when
/// the client already holds it.
pub fn conditional_json(
    request_headers: &HeaderMap,
    body: Vec<u8>,
    last_modified: DateTime<Utc>,
    max_age: u32,
    swr: u32,
) -> Response {
    let etag = compute_etag(&body);
    let not_modified = if_none_match_matches(request_headers, &etag);

    let mut response = if not_modified {
        Response::new(Body::empty())
    } else {
        Response::new(Body::from(body))
    };
    if not_modified {
        *response.status_mut() = StatusCode::NOT_MODIFIED;
    }

    let headers = response.headers_mut();
    if !not_modified {
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
    }
    for (name, value) in [
        (header::CACHE_CONTROL, cache_control(max_age, swr)),
        (header::ETAG, etag),
        (header::LAST_MODIFIED, http_date(last_modified)),
    ] {
        if let Ok(value) = HeaderValue::from_str(&value) {
            headers.insert(name, value);
        }
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn etag_is_quoted() {
        let etag = compute_etag(br#"{"ok":true}"#);
        assert!(etag.starts_with('"'));
        assert!(etag.ends_with('"'));
    }

    #[test]
    fn if_none_match_accepts_lists_and_wildcards() {
        let mut headers = HeaderMap::new();
        headers.insert(header::IF_NONE_MATCH, HeaderValue::from_static("\"x\", \"abc\""));
        assert!(if_none_match_matches(&headers, "\"abc\""));
        assert!(!if_none_match_matches(&headers, "\"def\""));

        headers.insert(header::IF_NONE_MATCH, HeaderValue::from_static("*"));
        assert!(if_none_match_matches(&headers, "\"def\""));
    }

    #[test]
    fn http_date_is_rfc7231() {
        let timestamp = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
        assert_eq!(http_date(timestamp), "Fri, 01 Mar 2024 12:30:00 GMT");
    }

    #[test]
    fn matching_etag_yields_304_without_body_type() {
        let body = b"{}".to_vec();
        let mut headers = HeaderMap::new();
        let etag = compute_etag(&body);
        headers.insert(header::IF_NONE_MATCH, HeaderValue::from_str(&etag).unwrap());

        let response = conditional_json(&headers, body, Utc::now(), 5, 10);

        assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
        assert!(response.headers().get(header::CONTENT_TYPE).is_none());
        assert_eq!(response.headers()[header::ETAG], etag.as_str());
    }
}
