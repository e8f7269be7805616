//! HTTP layer for the s3gate gateway.
//!
//! This crate turns hyper requests into calls on [`s3gate_core::S3Gateway`]
//! and renders the results as protocol responses:
//!
//! - [`router`] maps method, path, query and headers to an [`S3Operation`]
//! - [`handler`] binds each operation to the engine
//! - [`response`] renders XML documents, object headers and error bodies
//! - [`service`] is the hyper `Service` with correlation ids, admission and
//!   panic containment
//!
//! [`S3Operation`]: s3gate_model::S3Operation

pub mod body;
pub mod dispatch;
pub mod handler;
pub mod multipart;
pub mod request;
pub mod response;
pub mod router;
pub mod service;

pub use body::S3ResponseBody;
pub use dispatch::S3Handler;
pub use handler::GatewayHandler;
pub use router::{RoutingContext, S3Router};
pub use service::{S3HttpConfig, S3HttpService};
