//! Request logging middleware.
//!
//! Health probes are logged at debug level so they do not drown run traffic.

use std::future::{Ready, ready};
use std::time::Instant;

use actix_web::Error;
use actix_web::dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready};
use futures_util::future::LocalBoxFuture;
use tracing::{debug, error, info, warn};

/// Paths logged at debug level.
const QUIET_PATH_SUFFIXES: [&str; 2] = ["/health", "/ready"];

fn is_quiet(path: &str) -> bool {
    QUIET_PATH_SUFFIXES.iter().any(|suffix| path.ends_with(suffix))
}

/// Request logger middleware factory.
pub struct RequestLogger;

impl<S, B> Transform<S, ServiceRequest> for RequestLogger
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = RequestLoggerMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RequestLoggerMiddleware { service }))
    }
}

/// Request logger middleware service.
pub struct RequestLoggerMiddleware<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for RequestLoggerMiddleware<S>
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
        let start = Instant::now();
        let method = req.method().to_string();
        let path = req.path().to_string();
        let query = req.query_string().to_string();
        let remote_addr = req
            .connection_info()
            .realip_remote_addr()
            .unwrap_or("unknown")
            .to_string();
        let quiet = is_quiet(&path);

        if !quiet {
            debug!(
                target: "api",
                method = %method,
                path = %path,
                query = %query,
                remote_addr = %remote_addr,
                "Request started"
            );
        }

        let fut = self.service.call(req);

        Box::pin(async move {
            let res = fut.await?;
            let status = res.status().as_u16();
            let duration_ms = start.elapsed().as_millis() as u64;

            if quiet && res.status().is_success() {
                debug!(target: "api", path = %path, status, "Probe");
            } else if res.status().is_server_error() {
                error!(target: "api", method = %method, path = %path, status, duration_ms, "Server error");
            } else if res.status().is_client_error() {
                warn!(target: "api", method = %method, path = %path, status, duration_ms, "Client error");
            } else {
                info!(target: "api", method = %method, path = %path, status, duration_ms, "Request completed");
            }

            Ok(res)
        })
    }
}
