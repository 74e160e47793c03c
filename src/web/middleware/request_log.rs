//! Per-request tracing spans with latency and status logging.

use axum::extract::Request;
use axum::response::Response;
use std::task::{Context, Poll};
use std::time::Instant;
use tower::{Layer, Service};
use tracing::Instrument;

#[derive(Clone)]
pub struct RequestLogLayer;

impl<S> Layer<S> for RequestLogLayer {
    type Service = RequestLogService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestLogService { inner }
    }
}

#[derive(Clone)]
pub struct RequestLogService<S> {
    inner: S,
}

impl<S, B> Service<Request> for RequestLogService<S>
where
    S: Service<Request, Response = Response<B>> + Send + 'static,
    S::Future: Send + 'static,
    S::Error: std::fmt::Debug,
    B: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let method = req.method().clone();
        let path = req.uri().path().to_string();
        let span = tracing::info_span!("request", method = %method, path = %path);
        let start = Instant::now();

        let future = self.inner.call(req);

        Box::pin(
            async move {
                let result = future.await;
                let duration_ms = start.elapsed().as_millis() as u64;

                match &result {
                    Ok(response) => {
                        let status = response.status().as_u16();
                        match status {
                            200..=399 => tracing::debug!(status, duration_ms, "response"),
                            400..=499 => tracing::info!(status, duration_ms, "response"),
                            _ => tracing::warn!(status, duration_ms, "response"),
                        }
                    }
                    Err(err) => {
                        tracing::error!(error = ?err, duration_ms, "request failed");
                    }
                }

                result
            }
            .instrument(span),
        )
    }
}
