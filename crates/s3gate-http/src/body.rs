//! Response body type.

use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::Stream;
use http_body::{Body, Frame, SizeHint};
use http_body_util::Full;
use s3gate_core::admission::AdmissionGuard;
use s3gate_core::body::ObjectBody;

/// The body of every response the gateway sends.
#[derive(Debug)]
pub enum S3ResponseBody {
    /// A fully buffered body (XML documents, error documents).
    Buffered(Full<Bytes>),
    /// Object content streamed from the backend.
    Streaming {
        /// The object stream.
        body: ObjectBody,
        /// Admission slots held until the stream ends or is dropped.
        guards: Vec<AdmissionGuard>,
    },
    /// No body (HEAD, 204, and most write acknowledgements).
    Empty,
}

impl S3ResponseBody {
    /// A buffered body from raw bytes.
    #[must_use]
    pub fn from_bytes(data: impl Into<Bytes>) -> Self {
        Self::Buffered(Full::new(data.into()))
    }

    /// A buffered body from a string.
    #[must_use]
    pub fn from_string(data: impl Into<String>) -> Self {
        Self::Buffered(Full::new(Bytes::from(data.into())))
    }

    /// A body with no content.
    #[must_use]
    pub fn empty() -> Self {
        Self::Empty
    }

    /// Stream an object body.
    #[must_use]
    pub fn streaming(body: ObjectBody) -> Self {
        Self::Streaming {
            body,
            guards: Vec::new(),
        }
    }

    /// Keep `guards` occupied for as long as this body is being sent.
    ///
    /// Only streaming bodies outlive the handler; buffered and empty bodies
    /// release the guards right away.
    #[must_use]
    pub fn hold(mut self, guards: impl IntoIterator<Item = AdmissionGuard>) -> Self {
        if let Self::Streaming { guards: held, .. } = &mut self {
            held.extend(guards);
        }
        self
    }
}

impl Body for S3ResponseBody {
    type Data = Bytes;
    type Error = std::io::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        match self.get_mut() {
            Self::Buffered(full) => Pin::new(full)
                .poll_frame(cx)
                .map_err(|never| match never {}),
            Self::Streaming { body, guards } => {
                let polled = Pin::new(body).poll_next(cx);
                if matches!(polled, Poll::Ready(None | Some(Err(_)))) {
                    guards.clear();
                }
                polled.map(|chunk| chunk.map(|res| res.map(Frame::data)))
            }
            Self::Empty => Poll::Ready(None),
        }
    }

    fn is_end_stream(&self) -> bool {
        match self {
            Self::Buffered(full) => full.is_end_stream(),
            Self::Streaming { .. } => false,
            Self::Empty => true,
        }
    }

    fn size_hint(&self) -> SizeHint {
        match self {
            Self::Buffered(full) => full.size_hint(),
            Self::Streaming { body, .. } => body
                .length()
                .map_or_else(SizeHint::default, SizeHint::with_exact),
            Self::Empty => SizeHint::with_exact(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use http_body_util::BodyExt;
    use s3gate_core::GatewayConfig;
    use s3gate_core::admission::AdmissionController;
    use s3gate_model::OperationClass;

    use super::*;

    #[tokio::test]
    async fn test_should_collect_buffered_body() {
        let body = S3ResponseBody::from_string("<ok/>");
        assert_eq!(body.size_hint().exact(), Some(5));
        let bytes = body.collect().await.unwrap().to_bytes();
        assert_eq!(bytes.as_ref(), b"<ok/>");
    }

    #[tokio::test]
    async fn test_should_stream_object_chunks() {
        let chunks = futures::stream::iter(vec![
            Ok(Bytes::from_static(b"hello ")),
            Ok(Bytes::from_static(b"world")),
        ]);
        let body = S3ResponseBody::streaming(ObjectBody::from_stream(chunks, Some(11)));
        assert_eq!(body.size_hint().exact(), Some(11));
        let bytes = body.collect().await.unwrap().to_bytes();
        assert_eq!(bytes.as_ref(), b"hello world");
    }

    #[tokio::test]
    async fn test_should_hold_admission_until_stream_ends() {
        let config = GatewayConfig::default();
        let admission = AdmissionController::new(&config);
        let guard = admission.enter(OperationClass::Read).unwrap();

        let chunks = futures::stream::iter(vec![Ok(Bytes::from_static(b"data"))]);
        let mut body = S3ResponseBody::streaming(ObjectBody::from_stream(chunks, Some(4)))
            .hold(guard);
        assert_eq!(admission.in_flight(OperationClass::Read), 1);

        let frame = body.frame().await.unwrap().unwrap();
        assert_eq!(frame.into_data().unwrap().as_ref(), b"data");
        assert_eq!(admission.in_flight(OperationClass::Read), 1);

        assert!(body.frame().await.is_none());
        assert_eq!(admission.in_flight(OperationClass::Read), 0);
    }

    #[test]
    fn test_should_release_admission_for_buffered_body() {
        let admission = AdmissionController::new(&GatewayConfig::default());
        let body = S3ResponseBody::from_string("<ok/>").hold(admission.enter_global().ok());
        assert_eq!(admission.global_in_flight(), 0);
        drop(body);
    }

    #[test]
    fn test_should_report_empty_body_as_ended() {
        let body = S3ResponseBody::empty();
        assert!(body.is_end_stream());
        assert_eq!(body.size_hint().exact(), Some(0));
    }
}
