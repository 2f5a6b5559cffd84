//! Request forwarding to backend services.
//!
//! # Contract
//!
//! The outbound request targets the route's backend base URL with the full
//! inbound path and query appended. Only scheme and host change; method,
//! path, query and end-to-end headers are preserved.
//!
//! - **Reads** (GET, HEAD, OPTIONS, DELETE): no body is forwarded.
//! - **Writes** (POST, PUT, PATCH): the whole inbound body is buffered first.
//!   The outbound request carries the captured bytes, an exact
//!   `Content-Length`, and `Content-Type: application/json` regardless of
//!   what the caller sent. Backends rely on that normalization.
//!
//! The backend's status, headers and body are relayed back as-is (body
//! streamed), minus hop-by-hop headers.
//!
//! # Failure Handling
//!
//! Every outbound call is bounded by the configured timeout and is never
//! retried. Dropping the inbound request future drops the outbound call.

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use axum::body::Body;
use axum::extract::{ConnectInfo, Request};
use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};
use axum::http::{Method, Uri};
use axum::response::Response;
use futures::TryStreamExt;
use reqwest::Url;
use reqwest::redirect::Policy;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::route_table::RouteEntry;

/// Content type forced onto every forwarded write.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Header carrying the chain of client addresses.
pub const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Connection-scoped headers that must not cross the proxy.
const HOP_BY_HOP_HEADERS: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Forwarding failures.
#[derive(Error, Debug)]
pub enum ForwardError {
    #[error("Failed to read request body: {0}")]
    BodyRead(String),

    #[error("Path contains dot segments: {0}")]
    DotSegment(String),

    #[error("Upstream {url} timed out")]
    Timeout { url: String },

    #[error("Upstream {url} request failed: {reason}")]
    Upstream { url: String, reason: String },

    #[error("Failed to build HTTP client: {0}")]
    Client(String),
}

/// How a request's body is treated on the way out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardMode {
    /// No body forwarded; response streamed back
    Read,
    /// Body buffered, re-framed and forced to JSON
    Write,
}

impl ForwardMode {
    /// Classify an inbound method.
    pub fn for_method(method: &Method) -> Self {
        if *method == Method::POST || *method == Method::PUT || *method == Method::PATCH {
            Self::Write
        } else {
            Self::Read
        }
    }
}

/// Sends inbound requests on to their backend and relays the response.
///
/// Cheap to clone: the underlying client shares one connection pool.
#[derive(Debug, Clone)]
pub struct Forwarder {
    client: reqwest::Client,
    max_body_size: usize,
}

impl Forwarder {
    /// Create a forwarder.
    ///
    /// # Arguments
    ///
    /// * `timeout` - bound on each outbound call, including the response body
    /// * `max_body_size` - largest write body that will be buffered
    ///
    /// # Errors
    ///
    /// Returns `ForwardError::Client` if the HTTP client cannot be built.
    pub fn new(timeout: Duration, max_body_size: usize) -> Result<Self, ForwardError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            // Redirects belong to the caller, not the gateway
            .redirect(Policy::none())
            .build()
            .map_err(|e| ForwardError::Client(e.to_string()))?;

        Ok(Self {
            client,
            max_body_size,
        })
    }

    /// Forward `request` to the backend of `route` and relay the response.
    ///
    /// # Errors
    ///
    /// - `DotSegment` if the path holds `.`/`..` segments (backend is not contacted)
    /// - `BodyRead` if a write body cannot be read (backend is not contacted)
    /// - `Timeout` if the backend does not answer within the timeout
    /// - `Upstream` for any other transport failure
    pub async fn forward(
        &self,
        request: Request,
        route: &RouteEntry,
    ) -> Result<Response, ForwardError> {
        let (parts, body) = request.into_parts();
        let target = target_url(route.backend(), &parts.uri)?;
        let mode = ForwardMode::for_method(&parts.method);

        let mut headers = outbound_headers(&parts.headers);
        if let Some(ConnectInfo(addr)) = parts.extensions.get::<ConnectInfo<SocketAddr>>() {
            append_forwarded_for(&mut headers, addr.ip());
        }

        let mut outbound = self.client.request(parts.method.clone(), target.clone());

        match mode {
            ForwardMode::Read => {
                headers.remove(header::CONTENT_LENGTH);
            }
            ForwardMode::Write => {
                let captured = axum::body::to_bytes(body, self.max_body_size)
                    .await
                    .map_err(|e| ForwardError::BodyRead(e.to_string()))?;

                headers.insert(header::CONTENT_LENGTH, HeaderValue::from(captured.len()));
                headers.insert(
                    header::CONTENT_TYPE,
                    HeaderValue::from_static(JSON_CONTENT_TYPE),
                );
                debug!(
                    content_length = captured.len(),
                    "Captured write body for forwarding"
                );
                outbound = outbound.body(captured);
            }
        }

        info!(
            route = route.prefix(),
            backend = %route.backend(),
            method = %parts.method,
            ?mode,
            "Forwarding request"
        );

        let upstream = outbound
            .headers(headers)
            .send()
            .await
            .map_err(|e| classify_send_error(e, &target))?;

        debug!(status = upstream.status().as_u16(), "Upstream responded");
        Ok(relay(upstream))
    }
}

/// Backend base URL joined with the inbound path and query.
///
/// Joining mirrors a single-host reverse proxy: exactly one slash between
/// the base path and the request path.
///
/// `Url` resolves dot segments (including `%2e` forms), which would move the
/// request outside its route prefix and the backend base path, so such paths
/// are refused instead of rewritten.
pub fn target_url(base: &Url, uri: &Uri) -> Result<Url, ForwardError> {
    let path = uri.path();
    if has_dot_segment(path) {
        return Err(ForwardError::DotSegment(path.to_string()));
    }

    let mut url = base.clone();
    let joined = format!("{}{}", base.path().trim_end_matches('/'), path);
    url.set_path(&joined);
    url.set_query(uri.query());
    Ok(url)
}

/// Whether any segment is `.` or `..`, raw or percent-encoded.
///
/// Backslash counts as a separator, as it does for http(s) URLs.
fn has_dot_segment(path: &str) -> bool {
    path.split(['/', '\\']).any(|segment| {
        let decoded = segment.to_ascii_lowercase().replace("%2e", ".");
        decoded == "." || decoded == ".."
    })
}

/// Copy of `inbound` without hop-by-hop headers or `Host`.
fn outbound_headers(inbound: &HeaderMap) -> HeaderMap {
    let mut headers = inbound.clone();
    strip_hop_by_hop(&mut headers);
    headers.remove(header::HOST);
    headers
}

/// Remove hop-by-hop headers, including any named in `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in listed.iter().chain(HOP_BY_HOP_HEADERS.iter()) {
        headers.remove(name);
    }
}

/// Append the client address to `X-Forwarded-For`.
pub fn append_forwarded_for(headers: &mut HeaderMap, client: IpAddr) {
    let chain = match headers.get(X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
        Some(existing) if !existing.trim().is_empty() => format!("{existing}, {client}"),
        _ => client.to_string(),
    };

    if let Ok(value) = HeaderValue::from_str(&chain) {
        headers.insert(X_FORWARDED_FOR, value);
    }
}

fn classify_send_error(err: reqwest::Error, target: &Url) -> ForwardError {
    let url = redacted(target);
    if err.is_timeout() {
        ForwardError::Timeout { url }
    } else {
        ForwardError::Upstream {
            url,
            reason: err.without_url().to_string(),
        }
    }
}

/// Target URL without its query, safe for logs and error messages.
fn redacted(target: &Url) -> String {
    let mut url = target.clone();
    url.set_query(None);
    url.to_string()
}

/// Turn the backend response into the caller's response, streaming the body.
fn relay(upstream: reqwest::Response) -> Response {
    let status = upstream.status();
    let mut headers = upstream.headers().clone();
    strip_hop_by_hop(&mut headers);

    let body = upstream
        .bytes_stream()
        .inspect_err(|e| warn!(error = %e, "Upstream body failed mid-stream"));

    let mut response = Response::new(Body::from_stream(body));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::net::Ipv4Addr;

    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_target_url_rewrites_only_scheme_and_host() {
        let uri: Uri = "/api/settings/profile?tab=security&x=1".parse().unwrap();
        let target = target_url(&url("http://settings:8081"), &uri).unwrap();
        assert_eq!(
            target.as_str(),
            "http://settings:8081/api/settings/profile?tab=security&x=1"
        );
    }

    #[test]
    fn test_target_url_joins_base_path_with_single_slash() {
        let uri: Uri = "/api/settings/profile".parse().unwrap();

        let target = target_url(&url("https://internal.example/v1/"), &uri).unwrap();
        assert_eq!(
            target.as_str(),
            "https://internal.example/v1/api/settings/profile"
        );

        let target = target_url(&url("https://internal.example/v1"), &uri).unwrap();
        assert_eq!(
            target.as_str(),
            "https://internal.example/v1/api/settings/profile"
        );
    }

    #[test]
    fn test_target_url_preserves_encoded_path() {
        let uri: Uri = "/api/settings/a%20b".parse().unwrap();
        let target = target_url(&url("http://settings:8081"), &uri).unwrap();
        assert_eq!(target.path(), "/api/settings/a%20b");
        assert!(target.query().is_none());
    }

    #[test]
    fn test_target_url_refuses_dot_segments() {
        let base = url("http://settings:8081/v1");

        for path in [
            "/api/settings/../../admin",
            "/api/settings/%2e%2e/%2e%2e/admin",
            "/api/settings/%2E%2e/admin",
            "/api/settings/.%2e/admin",
            "/api/settings/./profile",
            "/api/settings/..",
        ] {
            let uri: Uri = path.parse().unwrap();
            assert!(
                matches!(target_url(&base, &uri), Err(ForwardError::DotSegment(_))),
                "path: {path}"
            );
        }
    }

    #[test]
    fn test_target_url_allows_dots_inside_segments() {
        let base = url("http://settings:8081/v1");

        for path in ["/api/settings/file.json", "/api/settings/...", "/api/settings/.well-known"] {
            let uri: Uri = path.parse().unwrap();
            let target = target_url(&base, &uri).unwrap();
            assert_eq!(target.path(), format!("/v1{path}"));
        }
    }

    #[test]
    fn test_forward_mode_for_method() {
        assert_eq!(ForwardMode::for_method(&Method::GET), ForwardMode::Read);
        assert_eq!(ForwardMode::for_method(&Method::HEAD), ForwardMode::Read);
        assert_eq!(ForwardMode::for_method(&Method::DELETE), ForwardMode::Read);
        assert_eq!(ForwardMode::for_method(&Method::POST), ForwardMode::Write);
        assert_eq!(ForwardMode::for_method(&Method::PUT), ForwardMode::Write);
        assert_eq!(ForwardMode::for_method(&Method::PATCH), ForwardMode::Write);
    }

    #[test]
    fn test_outbound_headers_strip_hop_by_hop_and_host() {
        let mut inbound = HeaderMap::new();
        inbound.insert(header::HOST, HeaderValue::from_static("gateway:8080"));
        inbound.insert(
            header::CONNECTION,
            HeaderValue::from_static("keep-alive, x-trace-hop"),
        );
        inbound.insert("keep-alive", HeaderValue::from_static("timeout=5"));
        inbound.insert("x-trace-hop", HeaderValue::from_static("1"));
        inbound.insert(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        inbound.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        inbound.insert("x-custom", HeaderValue::from_static("kept"));

        let outbound = outbound_headers(&inbound);

        assert!(outbound.get(header::HOST).is_none());
        assert!(outbound.get(header::CONNECTION).is_none());
        assert!(outbound.get("keep-alive").is_none());
        assert!(outbound.get("x-trace-hop").is_none());
        assert!(outbound.get(header::TRANSFER_ENCODING).is_none());
        assert_eq!(outbound.get(header::AUTHORIZATION).unwrap(), "Bearer abc");
        assert_eq!(outbound.get("x-custom").unwrap(), "kept");
    }

    #[test]
    fn test_append_forwarded_for() {
        let client = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 7));

        let mut headers = HeaderMap::new();
        append_forwarded_for(&mut headers, client);
        assert_eq!(headers.get(X_FORWARDED_FOR).unwrap(), "10.0.0.7");

        let mut headers = HeaderMap::new();
        headers.insert(X_FORWARDED_FOR, HeaderValue::from_static("203.0.113.9"));
        append_forwarded_for(&mut headers, client);
        assert_eq!(
            headers.get(X_FORWARDED_FOR).unwrap(),
            "203.0.113.9, 10.0.0.7"
        );
    }

    #[test]
    fn test_redacted_drops_query() {
        let target = url("http://settings:8081/api/settings/x?token=secret");
        assert_eq!(redacted(&target), "http://settings:8081/api/settings/x");
    }

    #[test]
    fn test_new_builds_client() {
        assert!(Forwarder::new(Duration::from_secs(1), 1024).is_ok());
    }
}
