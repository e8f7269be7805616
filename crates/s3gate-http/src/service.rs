//! The hyper `Service` that fronts the gateway.
//!
//! [`S3HttpService`] handles, in order:
//!
//! 1. Correlation ids (`x-amz-request-id` and `x-amz-id-2`)
//! 2. Health check interception (`GET /_health`)
//! 3. The global fail-fast ceiling
//! 4. Routing via [`S3Router`]
//! 5. Dispatch to the [`S3Handler`], with panics contained as `InternalError`
//! 6. Error rendering (no body on HEAD)

use std::any::Any;
use std::convert::Infallible;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use futures::FutureExt;
use http::header::HeaderValue;
use hyper::body::Incoming;
use hyper::service::Service;
use s3gate_core::admission::AdmissionController;
use s3gate_model::error::{S3Error, S3ErrorCode};
use tracing::{debug, error, info, warn};

use crate::body::S3ResponseBody;
use crate::dispatch::{S3Handler, dispatch_operation};
use crate::request::{content_length, incoming_body};
use crate::response::error_to_response;
use crate::router::S3Router;

const HEALTH_PATH: &str = "/_health";

/// Service-level settings.
#[derive(Debug, Clone)]
pub struct S3HttpConfig {
    /// Name reported by the health check.
    pub service_name: String,
    /// Value of the `Server` header.
    pub server_header: &'static str,
    /// Global in-flight ceiling, applied before routing.
    pub admission: Option<Arc<AdmissionController>>,
}

impl Default for S3HttpConfig {
    fn default() -> Self {
        Self {
            service_name: "s3gate".to_owned(),
            server_header: "AmazonS3",
            admission: None,
        }
    }
}

/// The gateway's HTTP entry point.
///
/// Cloning is cheap; clones share the handler and the request id counter.
#[derive(Debug)]
pub struct S3HttpService<H: S3Handler> {
    handler: Arc<H>,
    router: S3Router,
    config: Arc<S3HttpConfig>,
    request_counter: Arc<AtomicU64>,
}

impl<H: S3Handler> Clone for S3HttpService<H> {
    fn clone(&self) -> Self {
        Self {
            handler: Arc::clone(&self.handler),
            router: self.router,
            config: Arc::clone(&self.config),
            request_counter: Arc::clone(&self.request_counter),
        }
    }
}

impl<H: S3Handler> S3HttpService<H> {
    /// Create a service around `handler`.
    #[must_use]
    pub fn new(handler: H, config: S3HttpConfig) -> Self {
        Self::from_shared(Arc::new(handler), config)
    }

    /// Create a service around an already shared handler.
    #[must_use]
    pub fn from_shared(handler: Arc<H>, config: S3HttpConfig) -> Self {
        Self {
            handler,
            router: S3Router::new(),
            config: Arc::new(config),
            request_counter: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Serve one request with any body type.
    pub async fn serve<B>(&self, req: http::Request<B>) -> http::Response<S3ResponseBody>
    where
        B: http_body::Body<Data = Bytes> + Send + 'static,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let request_id = format!(
            "{:016X}",
            self.request_counter.fetch_add(1, Ordering::Relaxed) + 1
        );
        let host_id = host_id(&request_id);
        let with_body = req.method() != http::Method::HEAD;

        let processing = process_request(
            req,
            self.handler.as_ref(),
            &self.router,
            &self.config,
            &request_id,
            &host_id,
        );
        let response = match AssertUnwindSafe(processing).catch_unwind().await {
            Ok(response) => response,
            Err(panic) => {
                error!(
                    request_id = %request_id,
                    panic = panic_message(panic.as_ref()),
                    "request handler panicked"
                );
                error_to_response(&S3Error::internal_error(), &request_id, &host_id, with_body)
            }
        };

        add_common_headers(response, &request_id, &host_id, self.config.server_header)
    }
}

impl<H: S3Handler> Service<http::Request<Incoming>> for S3HttpService<H> {
    type Response = http::Response<S3ResponseBody>;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn call(&self, req: http::Request<Incoming>) -> Self::Future {
        let service = self.clone();
        Box::pin(async move { Ok(service.serve(req).await) })
    }
}

/// The `x-amz-id-2` value: the request id repeated four times, base64 encoded.
fn host_id(request_id: &str) -> String {
    STANDARD.encode(request_id.repeat(4))
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

async fn process_request<H, B>(
    req: http::Request<B>,
    handler: &H,
    router: &S3Router,
    config: &S3HttpConfig,
    request_id: &str,
    host_id: &str,
) -> http::Response<S3ResponseBody>
where
    H: S3Handler + ?Sized,
    B: http_body::Body<Data = Bytes> + Send + 'static,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let method = req.method().clone();
    let uri = req.uri().clone();
    let with_body = method != http::Method::HEAD;
    debug!(%method, %uri, request_id, "processing request");

    if method == http::Method::GET && uri.path() == HEALTH_PATH {
        return health_check_response(&config.service_name);
    }

    let global = match config.admission.as_ref().map(|a| a.enter_global()).transpose() {
        Ok(guard) => guard,
        Err(err) => {
            return error_to_response(&S3Error::from(err), request_id, host_id, with_body);
        }
    };

    let ctx = match router.resolve(&req) {
        Ok(ctx) => ctx,
        Err(err) => {
            warn!(%method, %uri, error = %err, request_id, "failed to route request");
            return error_to_response(&err, request_id, host_id, with_body);
        }
    };

    info!(
        operation = ctx.operation.as_str(),
        bucket = ?ctx.bucket,
        key = ?ctx.key,
        request_id,
        "routed request"
    );

    let (parts, incoming) = req.into_parts();
    let length = content_length(&parts.headers).ok().flatten();
    let body = incoming_body(incoming, length);

    match dispatch_operation(handler, parts, body, ctx).await {
        Ok(response) => response.map(|body| body.hold(global)),
        Err(err) => {
            if err.code == S3ErrorCode::InternalError {
                error!(error = %err, request_id, "operation failed");
            } else {
                debug!(error = %err, request_id, "operation returned error");
            }
            error_to_response(&err, request_id, host_id, with_body)
        }
    }
}

fn health_check_response(service_name: &str) -> http::Response<S3ResponseBody> {
    let body = serde_json::json!({ "status": "running", "service": service_name });
    http::Response::builder()
        .status(http::StatusCode::OK)
        .header(http::header::CONTENT_TYPE, mime::APPLICATION_JSON.as_ref())
        .body(S3ResponseBody::from_string(body.to_string()))
        .expect("static health response should be valid")
}

fn add_common_headers(
    mut response: http::Response<S3ResponseBody>,
    request_id: &str,
    host_id: &str,
    server: &'static str,
) -> http::Response<S3ResponseBody> {
    let headers = response.headers_mut();
    if let Ok(hv) = HeaderValue::from_str(request_id) {
        headers.insert("x-amz-request-id", hv);
    }
    if let Ok(hv) = HeaderValue::from_str(host_id) {
        headers.insert("x-amz-id-2", hv);
    }
    headers.insert(http::header::SERVER, HeaderValue::from_static(server));
    response
}
