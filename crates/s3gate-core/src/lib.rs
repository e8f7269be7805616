//! Protocol engine for the s3gate gateway.
//!
//! This crate holds everything between the HTTP surface and the storage
//! backend: listing pagination with common-prefix collapsing, byte-range
//! resolution, the versioning and delete-marker model, the multipart upload
//! coordinator, and admission control. Storage itself sits behind the
//! [`Backend`] trait; [`MemoryBackend`] is the reference implementation.
//!
//! # Architecture
//!
//! ```text
//! s3gate-http (routing, XML, headers)
//!        |
//!        v
//! S3Gateway (handle_* per operation)
//!        |      \
//!        |       MultipartCoordinator, AdmissionController, StagingArea
//!        v
//!   Backend (MemoryBackend or a remote store)
//! ```

pub mod admission;
pub mod backend;
pub mod body;
pub mod checksums;
pub mod config;
pub mod error;
pub mod identity;
pub mod listing;
pub mod multipart;
pub mod ops;
pub mod prefix;
pub mod provider;
pub mod range;
pub mod retry;
pub mod staging;
pub mod utils;
pub mod validation;
pub mod versioning;

pub use backend::{Backend, MemoryBackend};
pub use config::GatewayConfig;
pub use error::{GatewayError, GatewayResult};
pub use provider::S3Gateway;
