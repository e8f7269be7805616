//! Operation handlers.
//!
//! Each submodule adds `handle_*` methods to [`crate::provider::S3Gateway`]
//! for one family of operations. Handlers take already-parsed input, run
//! every validation that needs no storage round trip first, then call the
//! backend. They return engine types; rendering to HTTP and XML is left to
//! the HTTP layer.
//!
//! Admission is not applied here. The HTTP layer counts each request
//! against its class before calling a handler; the small-upload token pool
//! is the one exception and is taken inside [`object`].

pub mod bucket;
pub mod list;
pub mod multipart;
pub mod object;
