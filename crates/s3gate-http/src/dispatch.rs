//! Operation dispatch: the boundary between the HTTP layer and the engine.
//!
//! The service resolves a route, wraps the request body as an
//! [`ObjectBody`] stream and hands both to an [`S3Handler`] through
//! [`dispatch_operation`]. Bodies are never buffered here; handlers decide
//! whether to stream (uploads) or collect (XML documents).

use std::future::Future;
use std::pin::Pin;

use s3gate_core::body::ObjectBody;
use s3gate_model::S3Operation;
use s3gate_model::error::S3Error;

use crate::body::S3ResponseBody;
use crate::router::RoutingContext;

/// The future returned by [`S3Handler::handle_operation`].
pub type HandlerFuture =
    Pin<Box<dyn Future<Output = Result<http::Response<S3ResponseBody>, S3Error>> + Send>>;

/// Something that can execute routed operations.
///
/// Boxed futures keep the trait object safe so the service can hold any
/// handler behind an `Arc`.
pub trait S3Handler: Send + Sync + 'static {
    /// Execute `op` and produce a complete response.
    fn handle_operation(
        &self,
        op: S3Operation,
        parts: http::request::Parts,
        body: ObjectBody,
        ctx: RoutingContext,
    ) -> HandlerFuture;
}

/// Hand a routed request to `handler`.
pub async fn dispatch_operation<H: S3Handler + ?Sized>(
    handler: &H,
    parts: http::request::Parts,
    body: ObjectBody,
    ctx: RoutingContext,
) -> Result<http::Response<S3ResponseBody>, S3Error> {
    let op = ctx.operation;
    tracing::debug!(
        operation = op.as_str(),
        bucket = ?ctx.bucket,
        key = ?ctx.key,
        "dispatching operation"
    );
    handler.handle_operation(op, parts, body, ctx).await
}
