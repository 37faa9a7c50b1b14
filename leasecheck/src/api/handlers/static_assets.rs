//! HTTP handler for the embedded browser client.

use axum::{
    body::Body,
    http::{HeaderValue, Response, StatusCode, Uri, header},
    response::IntoResponse,
};
use tracing::{debug, instrument};

use crate::static_assets;

fn cache_control_for(path: &str) -> &'static str {
    if path.starts_with("css/") || path.starts_with("js/") {
        "public, max-age=300"
    } else {
        "no-cache"
    }
}

/// Serve an embedded client file. `/` serves `index.html`; anything not embedded is a 404.
#[instrument]
pub async fn serve_embedded_asset(uri: Uri) -> impl IntoResponse {
    let mut path = uri.path().trim_start_matches('/');

    if path.is_empty() {
        path = "index.html";
    }

    let Some(content) = static_assets::Assets::get(path) else {
        debug!("No embedded asset for {}", uri.path());
        return StatusCode::NOT_FOUND.into_response();
    };

    let mime = mime_guess::from_path(path).first_or_octet_stream();
    let mut response = Response::new(Body::from(content.data.into_owned()));
    if let Ok(content_type) = HeaderValue::from_str(mime.as_ref()) {
        response.headers_mut().insert(header::CONTENT_TYPE, content_type);
    }
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static(cache_control_for(path)));
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum_test::TestServer;

    fn create_test_router() -> Router {
        Router::new().fallback(serve_embedded_asset)
    }

    fn header<'a>(response: &'a axum_test::TestResponse, name: &str) -> Option<&'a str> {
        response.headers().get(name).map(|v| v.to_str().unwrap())
    }

    #[tokio::test]
    async fn test_serve_root_returns_index_html() {
        let server = TestServer::new(create_test_router()).unwrap();

        let response = server.get("/").await;

        response.assert_status(StatusCode::OK);
        assert_eq!(header(&response, "content-type"), Some("text/html"));
        assert_eq!(header(&response, "cache-control"), Some("no-cache"));

        let text = response.text();
        assert!(text.contains("<!DOCTYPE html>"));
        assert!(text.contains("name=\"contract\""));
    }

    #[tokio::test]
    async fn test_serve_script_and_stylesheet() {
        let server = TestServer::new(create_test_router()).unwrap();

        let script = server.get("/js/main.js").await;
        script.assert_status(StatusCode::OK);
        assert!(header(&script, "content-type").unwrap().contains("javascript"));
        assert_eq!(header(&script, "cache-control"), Some("public, max-age=300"));
        assert!(script.text().contains("/api/analyze"));

        let stylesheet = server.get("/css/style.css").await;
        stylesheet.assert_status(StatusCode::OK);
        assert_eq!(header(&stylesheet, "content-type"), Some("text/css"));
    }

    #[tokio::test]
    async fn test_unknown_path_is_not_found() {
        let server = TestServer::new(create_test_router()).unwrap();

        server.get("/contracts/123").await.assert_status(StatusCode::NOT_FOUND);
        server.get("/js/missing.js").await.assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_traversal_does_not_escape_embedded_assets() {
        let server = TestServer::new(create_test_router()).unwrap();

        server.get("/../Cargo.toml").await.assert_status(StatusCode::NOT_FOUND);
    }
}
