//! [`S3Handler`] implementation backed by [`S3Gateway`].
//!
//! Every operation first resolves the caller from `Authorization` and takes
//! a slot in its class's fail-fast counter, then decodes its query, headers
//! and body into an engine request. The slot moves into the response body,
//! so a streamed download stays counted until it has been sent.

use std::sync::Arc;

use s3gate_core::backend::Backend;
use s3gate_core::body::ObjectBody;
use s3gate_core::identity::CallerIdentity;
use s3gate_core::ops::list::{ListObjectsRequest, ListObjectsV2Request, ListVersionsRequest};
use s3gate_core::ops::multipart::{ListPartsRequest, ListUploadsRequest, UploadPartRequest};
use s3gate_core::ops::object::{
    CopyObjectRequest, GetObjectRequest, PostObjectRequest, PutObjectRequest, PutObjectResponse,
    request_metadata,
};
use s3gate_core::range::RangeRequest;
use s3gate_core::utils::CONTENT_TYPE_KEY;
use s3gate_core::validation::{MAX_LIST_LIMIT, parse_clamped_int, parse_part_number};
use s3gate_core::S3Gateway;
use s3gate_model::error::S3Error;
use s3gate_model::input::{CompleteMultipartUploadRequest, DeleteRequest};
use s3gate_model::operations::S3Operation;
use s3gate_model::types::VersioningConfiguration;

use crate::body::S3ResponseBody;
use crate::dispatch::{HandlerFuture, S3Handler};
use crate::multipart::{extract_boundary, parse_multipart};
use crate::request::{
    MAX_FORM_BODY, collect_body, content_length, header_metadata, header_str, read_xml,
};
use crate::response::{
    IntoS3Response, empty_response, head_response, no_content_response, xml_response,
};
use crate::router::RoutingContext;

type HandlerResult = Result<http::Response<S3ResponseBody>, S3Error>;

/// Binds routed operations to an [`S3Gateway`].
pub struct GatewayHandler<B: Backend> {
    gateway: Arc<S3Gateway<B>>,
}

impl<B: Backend> std::fmt::Debug for GatewayHandler<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayHandler")
            .field("gateway", &self.gateway)
            .finish()
    }
}

impl<B: Backend> Clone for GatewayHandler<B> {
    fn clone(&self) -> Self {
        Self {
            gateway: Arc::clone(&self.gateway),
        }
    }
}

impl<B: Backend> GatewayHandler<B> {
    /// Wrap a shared gateway.
    #[must_use]
    pub fn new(gateway: Arc<S3Gateway<B>>) -> Self {
        Self { gateway }
    }

    /// The wrapped gateway.
    #[must_use]
    pub fn gateway(&self) -> &Arc<S3Gateway<B>> {
        &self.gateway
    }
}

impl<B: Backend> S3Handler for GatewayHandler<B> {
    fn handle_operation(
        &self,
        op: S3Operation,
        parts: http::request::Parts,
        body: ObjectBody,
        ctx: RoutingContext,
    ) -> HandlerFuture {
        let gateway = Arc::clone(&self.gateway);
        Box::pin(async move { handle(&gateway, op, parts, body, ctx).await })
    }
}

fn query_owned(ctx: &RoutingContext, name: &str) -> Option<String> {
    ctx.query(name).map(str::to_owned)
}

fn max_items(ctx: &RoutingContext, name: &str, default: usize) -> Result<usize, S3Error> {
    Ok(parse_clamped_int(ctx.query(name), default, 0, MAX_LIST_LIMIT)?)
}

async fn handle<B: Backend>(
    gw: &S3Gateway<B>,
    op: S3Operation,
    parts: http::request::Parts,
    body: ObjectBody,
    ctx: RoutingContext,
) -> HandlerResult {
    let caller = CallerIdentity::from_authorization(header_str(&parts.headers, "authorization"))?;
    let admission = gw.admission().enter(op.class())?;

    let response = match op {
        S3Operation::ListBuckets => {
            xml_response("ListAllMyBucketsResult", &gw.handle_list_buckets(&caller).await?)
        }
        S3Operation::CreateBucket => {
            let location = gw
                .handle_create_bucket(&caller, ctx.require_bucket()?)
                .await?;
            empty_response(Some(&location))
        }
        S3Operation::DeleteBucket => {
            gw.handle_delete_bucket(&caller, ctx.require_bucket()?)
                .await?;
            no_content_response()
        }
        S3Operation::GetBucketLocation => {
            let location = gw
                .handle_get_bucket_location(&caller, ctx.require_bucket()?)
                .await?;
            xml_response("LocationConstraint", &location)
        }
        S3Operation::GetBucketVersioning => {
            let status = gw
                .handle_get_bucket_versioning(&caller, ctx.require_bucket()?)
                .await?;
            xml_response("VersioningConfiguration", &VersioningConfiguration { status })
        }
        S3Operation::PutBucketVersioning => {
            let config: VersioningConfiguration = read_xml(body).await?;
            gw.handle_put_bucket_versioning(&caller, ctx.require_bucket()?, config.status)
                .await?;
            empty_response(None)
        }
        S3Operation::ListObjects => {
            let request = ListObjectsRequest {
                prefix: query_owned(&ctx, "prefix"),
                delimiter: query_owned(&ctx, "delimiter"),
                marker: query_owned(&ctx, "marker"),
                max_keys: max_items(&ctx, "max-keys", MAX_LIST_LIMIT)?,
            };
            let result = gw
                .handle_list_objects(&caller, ctx.require_bucket()?, request)
                .await?;
            xml_response("ListBucketResult", &result)
        }
        S3Operation::ListObjectsV2 => {
            let request = ListObjectsV2Request {
                prefix: query_owned(&ctx, "prefix"),
                delimiter: query_owned(&ctx, "delimiter"),
                continuation_token: query_owned(&ctx, "continuation-token"),
                start_after: query_owned(&ctx, "start-after"),
                max_keys: max_items(&ctx, "max-keys", MAX_LIST_LIMIT)?,
                fetch_owner: ctx.query("fetch-owner") == Some("true"),
            };
            let result = gw
                .handle_list_objects_v2(&caller, ctx.require_bucket()?, request)
                .await?;
            xml_response("ListBucketResult", &result)
        }
        S3Operation::ListObjectVersions => {
            let request = ListVersionsRequest {
                prefix: query_owned(&ctx, "prefix"),
                delimiter: query_owned(&ctx, "delimiter"),
                key_marker: query_owned(&ctx, "key-marker"),
                version_id_marker: query_owned(&ctx, "version-id-marker"),
                max_keys: max_items(&ctx, "max-keys", MAX_LIST_LIMIT)?,
            };
            let result = gw
                .handle_list_object_versions(&caller, ctx.require_bucket()?, request)
                .await?;
            xml_response("ListVersionsResult", &result)
        }
        S3Operation::DeleteObjects => {
            let request: DeleteRequest = read_xml(body).await?;
            let result = gw
                .handle_delete_objects(&caller, ctx.require_bucket()?, request)
                .await?;
            xml_response("DeleteResult", &result)
        }
        S3Operation::PostObject => post_object(gw, &caller, &parts, body, &ctx).await,
        S3Operation::ListMultipartUploads => {
            let request = ListUploadsRequest {
                prefix: query_owned(&ctx, "prefix"),
                delimiter: query_owned(&ctx, "delimiter"),
                key_marker: query_owned(&ctx, "key-marker"),
                upload_id_marker: query_owned(&ctx, "upload-id-marker"),
                max_uploads: max_items(&ctx, "max-uploads", 0)?,
            };
            let result = gw
                .handle_list_multipart_uploads(&caller, ctx.require_bucket()?, request)
                .await?;
            xml_response("ListMultipartUploadsResult", &result)
        }
        S3Operation::GetObject => {
            let request = get_request(&parts, &ctx)?;
            gw.handle_get_object(&caller, request)
                .await?
                .into_s3_response()
        }
        S3Operation::HeadObject => {
            let head = gw
                .handle_head_object(&caller, get_request(&parts, &ctx)?)
                .await?;
            head_response(&head.info, head.range.as_ref())
        }
        S3Operation::PutObject => {
            let request = PutObjectRequest {
                bucket: ctx.require_bucket()?.to_owned(),
                key: ctx.require_key()?.to_owned(),
                metadata: header_metadata(&parts.headers),
                content_length: content_length(&parts.headers)?,
                content_md5: header_str(&parts.headers, "content-md5").map(str::to_owned),
                body,
            };
            gw.handle_put_object(&caller, request)
                .await?
                .into_s3_response()
        }
        S3Operation::CopyObject => {
            let request = CopyObjectRequest {
                bucket: ctx.require_bucket()?.to_owned(),
                key: ctx.require_key()?.to_owned(),
                metadata: header_metadata(&parts.headers),
                copy_source: header_str(&parts.headers, "x-amz-copy-source")
                    .unwrap_or_default()
                    .to_owned(),
            };
            gw.handle_copy_object(&caller, request)
                .await?
                .into_s3_response()
        }
        S3Operation::DeleteObject => gw
            .handle_delete_object(
                &caller,
                ctx.require_bucket()?,
                ctx.require_key()?,
                ctx.query("versionId"),
            )
            .await?
            .into_s3_response(),
        S3Operation::CreateMultipartUpload => {
            let result = gw
                .handle_create_multipart_upload(
                    &caller,
                    ctx.require_bucket()?,
                    ctx.require_key()?,
                    header_metadata(&parts.headers),
                )
                .await?;
            xml_response("InitiateMultipartUploadResult", &result)
        }
        S3Operation::UploadPart => {
            let request = UploadPartRequest {
                bucket: ctx.require_bucket()?.to_owned(),
                key: ctx.require_key()?.to_owned(),
                upload_id: ctx.query("uploadId").unwrap_or_default().to_owned(),
                part_number: parse_part_number(ctx.query("partNumber"))?,
                content_length: content_length(&parts.headers)?,
                content_md5: header_str(&parts.headers, "content-md5").map(str::to_owned),
                body,
            };
            let etag = gw.handle_upload_part(&caller, request).await?;
            PutObjectResponse {
                etag,
                version_id: None,
            }
            .into_s3_response()
        }
        S3Operation::CompleteMultipartUpload => {
            let request: CompleteMultipartUploadRequest = read_xml(body).await?;
            gw.handle_complete_multipart_upload(
                &caller,
                ctx.require_bucket()?,
                ctx.require_key()?,
                ctx.query("uploadId").unwrap_or_default(),
                request,
            )
            .await?
            .into_s3_response()
        }
        S3Operation::AbortMultipartUpload => {
            gw.handle_abort_multipart_upload(
                &caller,
                ctx.require_bucket()?,
                ctx.require_key()?,
                ctx.query("uploadId").unwrap_or_default(),
            )
            .await?;
            no_content_response()
        }
        S3Operation::ListParts => {
            let part_number_marker = ctx
                .query("part-number-marker")
                .filter(|v| !v.is_empty())
                .map(str::parse::<u32>)
                .transpose()
                .map_err(|_| S3Error::invalid_argument("part-number-marker must be an integer"))?
                .unwrap_or(0);
            let request = ListPartsRequest {
                bucket: ctx.require_bucket()?.to_owned(),
                key: ctx.require_key()?.to_owned(),
                upload_id: ctx.query("uploadId").unwrap_or_default().to_owned(),
                part_number_marker,
                max_parts: max_items(&ctx, "max-parts", MAX_LIST_LIMIT)?,
            };
            let result = gw.handle_list_parts(&caller, request).await?;
            xml_response("ListPartsResult", &result)
        }
    }?;
    Ok(response.map(|body| body.hold(admission)))
}

fn get_request(
    parts: &http::request::Parts,
    ctx: &RoutingContext,
) -> Result<GetObjectRequest, S3Error> {
    Ok(GetObjectRequest {
        bucket: ctx.require_bucket()?.to_owned(),
        key: ctx.require_key()?.to_owned(),
        version_id: query_owned(ctx, "versionId"),
        range: RangeRequest::parse_header(header_str(&parts.headers, "range"))?,
    })
}

async fn post_object<B: Backend>(
    gw: &S3Gateway<B>,
    caller: &CallerIdentity,
    parts: &http::request::Parts,
    body: ObjectBody,
    ctx: &RoutingContext,
) -> HandlerResult {
    let boundary = extract_boundary(header_str(&parts.headers, "content-type"))?;
    let bytes = collect_body(body, MAX_FORM_BODY).await?;
    let form = parse_multipart(&bytes, &boundary)?;

    let mut fields: Vec<(&str, &str)> = form
        .fields
        .iter()
        .map(|(name, value)| (name.as_str(), value.as_str()))
        .collect();
    if let Some(content_type) = form.file_content_type.as_deref() {
        fields.push((CONTENT_TYPE_KEY, content_type));
    }

    let request = PostObjectRequest {
        bucket: ctx.require_bucket()?.to_owned(),
        key: form.key.clone(),
        metadata: request_metadata(fields),
        content: form.file_data.clone(),
    };
    gw.handle_post_object(caller, request)
        .await?
        .into_s3_response()
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use http::{Method, Request, StatusCode};
    use http_body_util::BodyExt;
    use s3gate_core::{GatewayConfig, MemoryBackend};
    use s3gate_model::OperationClass;
    use s3gate_model::error::S3ErrorCode;

    use super::*;
    use crate::dispatch::dispatch_operation;
    use crate::router::S3Router;

    const AUTH: &str = "AWS4-HMAC-SHA256 Credential=YTAalice/20240101/us-east-1/s3/aws4_request";

    fn handler() -> GatewayHandler<MemoryBackend> {
        GatewayHandler::new(Arc::new(S3Gateway::new(
            MemoryBackend::new(),
            GatewayConfig::default(),
        )))
    }

    fn request(method: Method, uri: &str) -> http::request::Builder {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("authorization", AUTH)
    }

    fn with_body(method: Method, uri: &str, body: &'static [u8]) -> Request<Bytes> {
        request(method, uri)
            .header("content-length", body.len())
            .body(Bytes::from_static(body))
            .unwrap()
    }

    fn empty(method: Method, uri: &str) -> Request<Bytes> {
        request(method, uri).body(Bytes::new()).unwrap()
    }

    async fn send(handler: &GatewayHandler<MemoryBackend>, req: Request<Bytes>) -> HandlerResult {
        let ctx = S3Router::new().resolve(&req)?;
        let (parts, body) = req.into_parts();
        dispatch_operation(handler, parts, ObjectBody::from_bytes(body), ctx).await
    }

    async fn text(resp: http::Response<S3ResponseBody>) -> String {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn header<'a>(resp: &'a http::Response<S3ResponseBody>, name: &str) -> Option<&'a str> {
        resp.headers().get(name).and_then(|v| v.to_str().ok())
    }

    fn element<'a>(xml: &'a str, name: &str) -> Option<&'a str> {
        let open = format!("<{name}>");
        let close = format!("</{name}>");
        let start = xml.find(&open)? + open.len();
        let end = xml[start..].find(&close)? + start;
        Some(&xml[start..end])
    }

    async fn create_bucket(handler: &GatewayHandler<MemoryBackend>, bucket: &str) {
        let resp = send(handler, empty(Method::PUT, &format!("/{bucket}")))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_should_deny_requests_without_identity() {
        let h = handler();
        let req = Request::builder()
            .method(Method::GET)
            .uri("/")
            .body(Bytes::new())
            .unwrap();
        let err = send(&h, req).await.unwrap_err();
        assert_eq!(err.code, S3ErrorCode::AccessDenied);

        let req = Request::builder()
            .method(Method::GET)
            .uri("/")
            .header("authorization", "AWS4-HMAC-SHA256 Credential=nobody/x")
            .body(Bytes::new())
            .unwrap();
        let err = send(&h, req).await.unwrap_err();
        assert_eq!(err.code, S3ErrorCode::AccessDenied);
    }

    #[tokio::test]
    async fn test_should_create_list_and_delete_bucket() {
        let h = handler();
        let resp = send(&h, empty(Method::PUT, "/photos")).await.unwrap();
        assert_eq!(header(&resp, "Location"), Some("/photos"));

        let xml = text(send(&h, empty(Method::GET, "/")).await.unwrap()).await;
        assert!(xml.contains("<ListAllMyBucketsResult"));
        assert_eq!(element(&xml, "Name"), Some("photos"));
        assert_eq!(element(&xml, "ID"), Some("alice"));

        let xml = text(send(&h, empty(Method::GET, "/photos?location")).await.unwrap()).await;
        assert!(xml.contains("LocationConstraint"));

        let resp = send(&h, empty(Method::DELETE, "/photos")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
        let err = send(&h, empty(Method::GET, "/photos?location"))
            .await
            .unwrap_err();
        assert_eq!(err.code, S3ErrorCode::NoSuchBucket);
    }

    #[tokio::test]
    async fn test_should_put_and_get_object_with_range() {
        let h = handler();
        create_bucket(&h, "photos").await;

        let req = request(Method::PUT, "/photos/notes/a.txt")
            .header("content-length", 11)
            .header("content-type", "text/plain")
            .header("x-amz-meta-color", "blue")
            .body(Bytes::from_static(b"hello world"))
            .unwrap();
        let resp = send(&h, req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            header(&resp, "ETag"),
            Some("\"5eb63bbbe01eeed093cb22bb8f5acdc3\"")
        );

        let req = request(Method::GET, "/photos/notes/a.txt")
            .header("range", "bytes=6-")
            .body(Bytes::new())
            .unwrap();
        let resp = send(&h, req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(header(&resp, "Content-Range"), Some("bytes 6-10/11"));
        assert_eq!(header(&resp, "Content-Length"), Some("5"));
        assert_eq!(header(&resp, "x-amz-meta-color"), Some("blue"));
        assert_eq!(header(&resp, "Content-Type"), Some("text/plain"));
        assert_eq!(text(resp).await, "world");

        let resp = send(&h, empty(Method::HEAD, "/photos/notes/a.txt"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(header(&resp, "Content-Length"), Some("11"));
        assert_eq!(header(&resp, "Accept-Ranges"), Some("bytes"));

        let req = request(Method::HEAD, "/photos/notes/a.txt")
            .header("range", "bytes=-4")
            .body(Bytes::new())
            .unwrap();
        let resp = send(&h, req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(header(&resp, "Content-Range"), Some("bytes 7-10/11"));
        assert_eq!(header(&resp, "Content-Length"), Some("4"));
    }

    #[tokio::test]
    async fn test_should_hold_read_slot_while_body_streams() {
        let h = handler();
        create_bucket(&h, "photos").await;
        send(&h, with_body(Method::PUT, "/photos/big", b"0123456789"))
            .await
            .unwrap();

        let admission = h.gateway().admission();
        let resp = send(&h, empty(Method::GET, "/photos/big")).await.unwrap();
        assert_eq!(admission.in_flight(OperationClass::Read), 1);

        assert_eq!(text(resp).await, "0123456789");
        assert_eq!(admission.in_flight(OperationClass::Read), 0);

        let resp = send(&h, empty(Method::GET, "/photos/big")).await.unwrap();
        drop(resp);
        assert_eq!(admission.in_flight(OperationClass::Read), 0);
    }

    #[tokio::test]
    async fn test_should_reject_put_without_content_length() {
        let h = handler();
        create_bucket(&h, "photos").await;
        let req = request(Method::PUT, "/photos/a")
            .body(Bytes::from_static(b"data"))
            .unwrap();
        let err = send(&h, req).await.unwrap_err();
        assert_eq!(err.code, S3ErrorCode::MissingContentLength);
    }

    #[tokio::test]
    async fn test_should_reject_unsatisfiable_range() {
        let h = handler();
        create_bucket(&h, "photos").await;
        send(&h, with_body(Method::PUT, "/photos/a", b"abc"))
            .await
            .unwrap();
        let req = request(Method::GET, "/photos/a")
            .header("range", "bytes=10-20")
            .body(Bytes::new())
            .unwrap();
        let err = send(&h, req).await.unwrap_err();
        assert_eq!(err.code, S3ErrorCode::InvalidRange);
    }

    #[tokio::test]
    async fn test_should_write_delete_marker_when_versioned() {
        let h = handler();
        create_bucket(&h, "docs").await;
        let resp = send(
            &h,
            with_body(
                Method::PUT,
                "/docs?versioning",
                b"<VersioningConfiguration><Status>Enabled</Status></VersioningConfiguration>",
            ),
        )
        .await
        .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let xml = text(send(&h, empty(Method::GET, "/docs?versioning")).await.unwrap()).await;
        assert_eq!(element(&xml, "Status"), Some("Enabled"));

        let resp = send(&h, with_body(Method::PUT, "/docs/a", b"v1")).await.unwrap();
        let first_version = header(&resp, "x-amz-version-id").unwrap().to_owned();

        let resp = send(&h, empty(Method::DELETE, "/docs/a")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
        assert_eq!(header(&resp, "x-amz-delete-marker"), Some("true"));
        assert!(header(&resp, "x-amz-version-id").is_some());

        let err = send(&h, empty(Method::GET, "/docs/a")).await.unwrap_err();
        assert_eq!(err.code, S3ErrorCode::NoSuchKey);
        assert!(
            err.headers
                .iter()
                .any(|(n, v)| n == "x-amz-delete-marker" && v == "true")
        );

        let resp = send(
            &h,
            empty(Method::GET, &format!("/docs/a?versionId={first_version}")),
        )
        .await
        .unwrap();
        assert_eq!(text(resp).await, "v1");

        let xml = text(send(&h, empty(Method::GET, "/docs?versions")).await.unwrap()).await;
        assert!(xml.contains("<DeleteMarker>"));
        assert!(xml.contains("<Version>"));
    }

    #[tokio::test]
    async fn test_should_reject_malformed_versioning_body() {
        let h = handler();
        create_bucket(&h, "docs").await;
        let err = send(&h, with_body(Method::PUT, "/docs?versioning", b"<Versioning"))
            .await
            .unwrap_err();
        assert_eq!(err.code, S3ErrorCode::MalformedXML);
    }

    #[tokio::test]
    async fn test_should_list_objects_v2_with_delimiter() {
        let h = handler();
        create_bucket(&h, "photos").await;
        for key in ["a/1", "a/2", "b"] {
            send(&h, with_body(Method::PUT, &format!("/photos/{key}"), b"x"))
                .await
                .unwrap();
        }
        let xml = text(
            send(&h, empty(Method::GET, "/photos?list-type=2&delimiter=%2F"))
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(element(&xml, "KeyCount"), Some("2"));
        assert!(xml.contains("<Prefix>a/</Prefix>"));
        assert!(xml.contains("<Key>b</Key>"));
        assert!(!xml.contains("<Owner>"));

        let err = send(&h, empty(Method::GET, "/photos?max-keys=abc"))
            .await
            .unwrap_err();
        assert_eq!(err.code, S3ErrorCode::InvalidArgument);
    }

    #[tokio::test]
    async fn test_should_copy_object() {
        let h = handler();
        create_bucket(&h, "photos").await;
        send(&h, with_body(Method::PUT, "/photos/src", b"payload"))
            .await
            .unwrap();

        let req = request(Method::PUT, "/photos/dst")
            .header("x-amz-copy-source", "/photos/src")
            .body(Bytes::new())
            .unwrap();
        let xml = text(send(&h, req).await.unwrap()).await;
        assert!(xml.contains("<CopyObjectResult"));

        let resp = send(&h, empty(Method::GET, "/photos/dst")).await.unwrap();
        assert_eq!(text(resp).await, "payload");
    }

    #[tokio::test]
    async fn test_should_batch_delete_objects() {
        let h = handler();
        create_bucket(&h, "photos").await;
        send(&h, with_body(Method::PUT, "/photos/a", b"x"))
            .await
            .unwrap();

        let xml = text(
            send(
                &h,
                with_body(
                    Method::POST,
                    "/photos?delete",
                    b"<Delete><Object><Key>a</Key></Object><Object><Key>missing</Key></Object></Delete>",
                ),
            )
            .await
            .unwrap(),
        )
        .await;
        assert!(xml.contains("<DeleteResult"));
        assert!(xml.contains("<Key>a</Key>"));
        assert!(xml.contains("<Key>missing</Key>"));

        let err = send(&h, empty(Method::GET, "/photos/a")).await.unwrap_err();
        assert_eq!(err.code, S3ErrorCode::NoSuchKey);
    }

    #[tokio::test]
    async fn test_should_run_multipart_upload() {
        let h = handler();
        create_bucket(&h, "videos").await;

        let xml = text(
            send(&h, empty(Method::POST, "/videos/movie.bin?uploads"))
                .await
                .unwrap(),
        )
        .await;
        let upload_id = element(&xml, "UploadId").unwrap().to_owned();

        let mut etags = Vec::new();
        for (number, data) in [(1, &b"first-"[..]), (2, &b"second"[..])] {
            let req = request(
                Method::PUT,
                &format!("/videos/movie.bin?partNumber={number}&uploadId={upload_id}"),
            )
            .header("content-length", data.len())
            .body(Bytes::from_static(data))
            .unwrap();
            let resp = send(&h, req).await.unwrap();
            etags.push(header(&resp, "ETag").unwrap().to_owned());
        }

        let xml = text(
            send(
                &h,
                empty(Method::GET, &format!("/videos/movie.bin?uploadId={upload_id}")),
            )
            .await
            .unwrap(),
        )
        .await;
        assert_eq!(xml.matches("<Part>").count(), 2);

        let xml = text(send(&h, empty(Method::GET, "/videos?uploads")).await.unwrap()).await;
        assert_eq!(element(&xml, "UploadId"), Some(upload_id.as_str()));

        let complete = format!(
            "<CompleteMultipartUpload>\
             <Part><PartNumber>1</PartNumber><ETag>{}</ETag></Part>\
             <Part><PartNumber>2</PartNumber><ETag>{}</ETag></Part>\
             </CompleteMultipartUpload>",
            etags[0], etags[1]
        );
        let req = request(
            Method::POST,
            &format!("/videos/movie.bin?uploadId={upload_id}"),
        )
        .body(Bytes::from(complete))
        .unwrap();
        let xml = text(send(&h, req).await.unwrap()).await;
        assert!(xml.contains("<CompleteMultipartUploadResult"));
        assert!(xml.contains("-2"));

        let resp = send(&h, empty(Method::GET, "/videos/movie.bin"))
            .await
            .unwrap();
        assert_eq!(text(resp).await, "first-second");

        let err = send(
            &h,
            empty(Method::DELETE, &format!("/videos/movie.bin?uploadId={upload_id}")),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code, S3ErrorCode::NoSuchUpload);
    }

    #[tokio::test]
    async fn test_should_reject_bad_part_number() {
        let h = handler();
        create_bucket(&h, "videos").await;
        for number in ["0", "10001", "x"] {
            let req = with_body(
                Method::PUT,
                &format!("/videos/k?partNumber={number}&uploadId=1"),
                b"data",
            );
            let err = send(&h, req).await.unwrap_err();
            assert_eq!(err.code, S3ErrorCode::InvalidArgument, "{number}");
        }
    }

    #[tokio::test]
    async fn test_should_store_browser_form_upload() {
        let h = handler();
        create_bucket(&h, "forms").await;

        let body = "--XyZ\r\n\
             Content-Disposition: form-data; name=\"key\"\r\n\r\n\
             uploads/report.txt\r\n\
             --XyZ\r\n\
             Content-Disposition: form-data; name=\"x-amz-meta-origin\"\r\n\r\n\
             browser\r\n\
             --XyZ\r\n\
             Content-Disposition: form-data; name=\"file\"; filename=\"report.txt\"\r\n\
             Content-Type: text/plain\r\n\r\n\
             quarterly numbers\r\n\
             --XyZ--\r\n";
        let req = request(Method::POST, "/forms")
            .header("content-type", "multipart/form-data; boundary=XyZ")
            .body(Bytes::from(body))
            .unwrap();
        let resp = send(&h, req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(header(&resp, "ETag").is_some());

        let resp = send(&h, empty(Method::GET, "/forms/uploads/report.txt"))
            .await
            .unwrap();
        assert_eq!(header(&resp, "x-amz-meta-origin"), Some("browser"));
        assert_eq!(header(&resp, "Content-Type"), Some("text/plain"));
        assert_eq!(text(resp).await, "quarterly numbers");
    }

    #[tokio::test]
    async fn test_should_reject_form_without_file() {
        let h = handler();
        create_bucket(&h, "forms").await;
        let body = "--XyZ\r\n\
             Content-Disposition: form-data; name=\"key\"\r\n\r\n\
             k\r\n\
             --XyZ--\r\n";
        let req = request(Method::POST, "/forms")
            .header("content-type", "multipart/form-data; boundary=XyZ")
            .body(Bytes::from(body))
            .unwrap();
        let err = send(&h, req).await.unwrap_err();
        assert_eq!(err.code, S3ErrorCode::IncorrectNumberOfFilesInPostRequest);
    }
}
