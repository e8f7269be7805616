//! Protocol model for the s3gate gateway.
//!
//! Holds the pieces every other crate agrees on: the closed error taxonomy
//! ([`error`]), the operations the router resolves ([`operations`]), shared
//! value types ([`types`]), and the request/response documents exchanged as
//! XML ([`input`], [`output`]).

pub mod error;
pub mod input;
pub mod operations;
pub mod output;
pub mod types;

pub use error::{S3Error, S3ErrorCode};
pub use operations::{OperationClass, S3Operation};
