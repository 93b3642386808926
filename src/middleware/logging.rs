use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error,
};
use futures_util::future::LocalBoxFuture;
use std::{
    future::{ready, Ready},
    time::Instant,
};
use tracing::{debug, error, info, warn};

/// Structured request log lines.
///
/// Health checks log at debug so they don't drown out signaling traffic. Requests that
/// touch one session (`/api/sessions/{pc_id}`, `/ws/media/{pc_id}`) carry its `pc_id`.
pub struct RequestLogging;

impl<S, B> Transform<S, ServiceRequest> for RequestLogging
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = RequestLoggingMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RequestLoggingMiddleware { service }))
    }
}

pub struct RequestLoggingMiddleware<S> {
    service: S,
}

fn is_health_check(path: &str) -> bool {
    path == "/health" || path.ends_with("/health")
}

impl<S, B> Service<ServiceRequest> for RequestLoggingMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let start_time = Instant::now();
        let method = req.method().to_string();
        let uri = req.uri().to_string();
        let health_check = is_health_check(req.path());
        let remote_addr = req.connection_info().realip_remote_addr().unwrap_or("unknown").to_string();

        if health_check {
            debug!(method = %method, uri = %uri, "Health check request");
        } else {
            info!(method = %method, uri = %uri, remote_addr = %remote_addr, "Request started");
        }

        let fut = self.service.call(req);

        Box::pin(async move {
            let result = fut.await;
            let duration_ms = start_time.elapsed().as_millis();
            let pc_id = match &result {
                Ok(response) => response.request().match_info().get("pc_id").unwrap_or("-").to_string(),
                Err(_) => "-".to_string(),
            };

            match &result {
                Ok(response) if response.status().is_server_error() => {
                    warn!(
                        method = %method,
                        uri = %uri,
                        pc_id = %pc_id,
                        status = response.status().as_u16(),
                        duration_ms = %duration_ms,
                        "Request completed with server error"
                    );
                }
                Ok(response) if !health_check => {
                    info!(
                        method = %method,
                        uri = %uri,
                        pc_id = %pc_id,
                        status = response.status().as_u16(),
                        duration_ms = %duration_ms,
                        "Request completed"
                    );
                }
                Ok(_) => {}
                Err(err) => {
                    error!(
                        method = %method,
                        uri = %uri,
                        pc_id = %pc_id,
                        duration_ms = %duration_ms,
                        error = %err,
                        "Request failed"
                    );
                }
            }

            result
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_paths_log_quietly() {
        assert!(is_health_check("/health"));
        assert!(is_health_check("/api/v1/health"));
        assert!(!is_health_check("/api/offer"));
    }
}
