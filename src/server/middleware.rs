use axum::{
    body::Body,
    http::Request,
    middleware::Next,
    response::Response,
};
use tracing::Span;

/// Record the GitHub delivery headers on the current request span so log
/// lines and Sentry events can be correlated with a specific delivery.
pub async fn enrich_current_span_middleware(req: Request<Body>, next: Next) -> Response {
    let current_span = Span::current();

    current_span.record("http.uri", req.uri().path());
    if let Some(delivery) = req
        .headers()
        .get("x-github-delivery")
        .and_then(|h| h.to_str().ok())
    {
        current_span.record("github.delivery", delivery);
    }
    if let Some(event) = req
        .headers()
        .get("x-github-event")
        .and_then(|h| h.to_str().ok())
    {
        current_span.record("github.event", event);
    }

    next.run(req).await
}
