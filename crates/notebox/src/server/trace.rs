use std::{net::SocketAddr, time::Duration};

use axum::{
    body::HttpBody,
    extract::ConnectInfo,
    http::{Request, Response, header},
};
use tower_http::trace::{MakeSpan, OnRequest, OnResponse};
use tracing::{Span, field};

/// Request logging for the [`TraceLayer`](tower_http::trace::TraceLayer).
///
/// Every request gets a span carrying a fresh request id, so the start and
/// completion events (and anything the handler logs) can be correlated.
#[derive(Debug, Clone, Copy, Default)]
pub struct Tracer;

/// 8 random bytes as 16 hex digits.
///
/// Each half of a v4 UUID has fixed version or variant bits, never both in
/// the same position, so folding the halves together leaves 64 random bits.
pub fn generate_request_id() -> String {
    let (high, low) = uuid::Uuid::new_v4().as_u64_pair();
    format!("{:016x}", high ^ low)
}

impl<B> MakeSpan<B> for Tracer {
    fn make_span(&mut self, request: &Request<B>) -> Span {
        let user_agent = request
            .headers()
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();

        let remote_addr = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.to_string())
            .unwrap_or_default();

        tracing::info_span!(
            "http.request",
            request_id = %generate_request_id(),
            method = %request.method(),
            path = %request.uri().path(),
            remote_addr = %remote_addr,
            user_agent = %user_agent,
            status_code = field::Empty,
        )
    }
}

impl<B> OnRequest<B> for Tracer {
    fn on_request(&mut self, _request: &Request<B>, _span: &Span) {
        tracing::info!("Request started");
    }
}

impl<B: HttpBody> OnResponse<B> for Tracer {
    fn on_response(self, response: &Response<B>, latency: Duration, span: &Span) {
        let status_code = response.status().as_u16();
        span.record("status_code", status_code);

        let response_size = response.body().size_hint().exact();
        let duration_ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);

        tracing::info!(
            status_code,
            response_size,
            duration_ms,
            duration = ?latency,
            "Request completed"
        );
    }
}
