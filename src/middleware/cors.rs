use axum::http::{header, Method};
use tower_http::cors::{Any, CorsLayer};

/// The exam frontend is served from a separate origin and polls with bearer tokens.
pub fn api_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .allow_origin(Any)
}
