//! Caller identity.
//!
//! The gateway does not verify signatures. It only extracts an opaque
//! identity token from the `Authorization` header and hands it to the
//! backend, which decides what the caller may see.

use std::fmt;
use std::future::Future;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use s3gate_model::types::Owner;
use tracing::info;

use crate::error::{GatewayError, GatewayResult};
use crate::retry::{RetryPolicy, retry};

/// Marker that precedes the identity token in the credential scope.
const IDENTITY_MARKER: &str = "YTA";

/// Tokens longer than this carry extra `:`-separated fields.
const MAX_IDENTITY_LEN: usize = 50;

/// Opaque identity of the caller, passed to every backend call.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallerIdentity(String);

impl CallerIdentity {
    /// Wrap an already extracted identity.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Extract the identity from an `Authorization` header value.
    ///
    /// The token is the text between the marker and the next `/`, without
    /// the marker itself. Over-long tokens are cut at the first `:`.
    ///
    /// ```
    /// use s3gate_core::identity::CallerIdentity;
    ///
    /// let header = "AWS4-HMAC-SHA256 Credential=YTAkey123/20240101/us-east-1/s3/aws4_request";
    /// let caller = CallerIdentity::from_authorization(Some(header)).unwrap();
    /// assert_eq!(caller.as_str(), "key123");
    /// ```
    ///
    /// # Errors
    ///
    /// [`GatewayError::AccessDenied`] when the header is missing, has no
    /// marker, or carries an empty token.
    pub fn from_authorization(header: Option<&str>) -> GatewayResult<Self> {
        let header = header
            .filter(|h| !h.is_empty())
            .ok_or(GatewayError::AccessDenied)?;
        let start = header
            .find(IDENTITY_MARKER)
            .ok_or(GatewayError::AccessDenied)?;

        let scoped = &header[start..];
        let end = scoped.find('/').unwrap_or(scoped.len());
        let mut token = &scoped[IDENTITY_MARKER.len()..end];

        if token.len() > MAX_IDENTITY_LEN {
            if let Some(colon) = token.find(':') {
                token = &token[..colon];
            }
        }
        if token.is_empty() {
            return Err(GatewayError::AccessDenied);
        }
        Ok(Self(token.to_owned()))
    }

    /// The identity string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The caller rendered as a resource owner.
    #[must_use]
    pub fn owner(&self) -> Owner {
        Owner::new(self.0.clone())
    }
}

impl fmt::Display for CallerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identities already registered with the storage service.
///
/// Registration talks to a remote service that fails transiently, so it is
/// wrapped in [`retry`].
#[derive(Debug)]
pub struct IdentityRegistry {
    registered: DashMap<String, DateTime<Utc>>,
    policy: RetryPolicy,
}

impl Default for IdentityRegistry {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

impl IdentityRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            registered: DashMap::new(),
            policy,
        }
    }

    /// Whether `caller` completed registration.
    #[must_use]
    pub fn is_registered(&self, caller: &CallerIdentity) -> bool {
        self.registered.contains_key(caller.as_str())
    }

    /// When `caller` was registered.
    #[must_use]
    pub fn registered_at(&self, caller: &CallerIdentity) -> Option<DateTime<Utc>> {
        self.registered.get(caller.as_str()).map(|entry| *entry)
    }

    /// Number of registered identities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.registered.len()
    }

    /// Whether nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.registered.is_empty()
    }

    /// Run `register` for `caller` with retries, then remember the caller.
    /// Already registered callers return immediately.
    ///
    /// # Errors
    ///
    /// The last error of `register` once retries are exhausted, or the
    /// first error that is neither retryable nor internal.
    pub async fn register_with_retry<F, Fut>(
        &self,
        caller: &CallerIdentity,
        register: F,
    ) -> GatewayResult<()>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = GatewayResult<()>>,
    {
        if self.is_registered(caller) {
            return Ok(());
        }
        retry(
            &self.policy,
            |err: &GatewayError| err.is_retryable() || matches!(err, GatewayError::Internal(_)),
            register,
        )
        .await?;
        self.registered.insert(caller.as_str().to_owned(), Utc::now());
        info!(caller = %caller, "identity registered");
        Ok(())
    }
}
