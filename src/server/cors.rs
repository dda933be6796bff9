//! Permissive cross-origin headers.
//!
//! Every response gets the same three headers. `OPTIONS` requests are
//! answered here with an empty 200 and never reach the router.

use axum::extract::Request;
use axum::http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

/// Allowed origins.
pub const ALLOW_ORIGIN: &str = "*";
/// Allowed methods.
pub const ALLOW_METHODS: &str = "GET, POST, OPTIONS";
/// Allowed request headers.
pub const ALLOW_HEADERS: &str = "Content-Type";

/// Middleware adding CORS headers and answering preflight requests.
pub async fn cors(req: Request, next: Next) -> Response {
    if req.method() == Method::OPTIONS {
        let mut response = StatusCode::OK.into_response();
        add_cors_headers(response.headers_mut());
        return response;
    }

    let mut response = next.run(req).await;
    add_cors_headers(response.headers_mut());
    response
}

fn add_cors_headers(headers: &mut HeaderMap) {
    headers.insert(
        ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static(ALLOW_ORIGIN),
    );
    headers.insert(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOW_METHODS),
    );
    headers.insert(
        ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(ALLOW_HEADERS),
    );
}
