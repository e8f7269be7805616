//! Streaming object bodies.
//!
//! [`ObjectBody`] is the one byte-stream type that crosses the backend
//! boundary in both directions: request bodies flow into `put_object` and
//! stored content flows out of `get_object`.

use std::fmt;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::{Bytes, BytesMut};
use futures::stream::{self, BoxStream, Stream, StreamExt};

use crate::staging::StagedData;

/// A boxed stream of byte chunks with an optional known length.
pub struct ObjectBody {
    stream: BoxStream<'static, io::Result<Bytes>>,
    length: Option<u64>,
}

impl fmt::Debug for ObjectBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectBody")
            .field("length", &self.length)
            .finish_non_exhaustive()
    }
}

impl Default for ObjectBody {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<Bytes> for ObjectBody {
    fn from(bytes: Bytes) -> Self {
        Self::from_bytes(bytes)
    }
}

impl ObjectBody {
    /// A body with no content.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            stream: stream::empty().boxed(),
            length: Some(0),
        }
    }

    /// A body backed by an in-memory buffer.
    #[must_use]
    pub fn from_bytes(bytes: Bytes) -> Self {
        if bytes.is_empty() {
            return Self::empty();
        }
        let length = Some(bytes.len() as u64);
        Self {
            stream: stream::once(async move { Ok(bytes) }).boxed(),
            length,
        }
    }

    /// Wrap an arbitrary chunk stream.
    pub fn from_stream<S>(stream: S, length: Option<u64>) -> Self
    where
        S: Stream<Item = io::Result<Bytes>> + Send + 'static,
    {
        Self {
            stream: stream.boxed(),
            length,
        }
    }

    /// Concatenate staged payloads in order.
    #[must_use]
    pub fn from_staged(parts: Vec<StagedData>) -> Self {
        let length = parts.iter().map(StagedData::len).sum();
        Self {
            stream: stream::iter(parts).flat_map(StagedData::into_stream).boxed(),
            length: Some(length),
        }
    }

    /// The declared length, when known.
    #[must_use]
    pub fn length(&self) -> Option<u64> {
        self.length
    }

    /// Read the whole body into memory.
    ///
    /// # Errors
    ///
    /// Any error raised by the underlying stream.
    pub async fn collect(mut self) -> io::Result<Bytes> {
        let capacity = self
            .length
            .and_then(|len| usize::try_from(len).ok())
            .unwrap_or_default();
        let mut buf = BytesMut::with_capacity(capacity);
        while let Some(chunk) = self.stream.next().await {
            buf.extend_from_slice(&chunk?);
        }
        Ok(buf.freeze())
    }
}

impl Stream for ObjectBody {
    type Item = io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.stream.as_mut().poll_next(cx)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.stream.size_hint()
    }
}
