//! The gateway provider.
//!
//! [`S3Gateway`] owns every piece of process-wide engine state (the
//! multipart registry, admission counters, the identity registry) and the
//! storage backend. Individual operations are implemented in the
//! [`crate::ops`] submodules as `handle_*` methods.

use std::fmt;
use std::sync::Arc;

use crate::admission::AdmissionController;
use crate::backend::Backend;
use crate::config::GatewayConfig;
use crate::error::GatewayResult;
use crate::identity::{CallerIdentity, IdentityRegistry};
use crate::multipart::MultipartCoordinator;
use crate::retry::RetryPolicy;
use crate::staging::StagingArea;

/// The protocol engine, generic over its storage backend.
///
/// All shared state is `Arc`-wrapped so handler tasks can hold the gateway
/// behind one `Arc` and call into it concurrently.
///
/// # Examples
///
/// ```
/// use s3gate_core::{GatewayConfig, MemoryBackend, S3Gateway};
///
/// let gateway = S3Gateway::new(MemoryBackend::new(), GatewayConfig::default());
/// assert_eq!(gateway.multipart().upload_count(), 0);
/// ```
pub struct S3Gateway<B: Backend> {
    pub(crate) backend: Arc<B>,
    pub(crate) multipart: Arc<MultipartCoordinator>,
    pub(crate) admission: Arc<AdmissionController>,
    pub(crate) identities: Arc<IdentityRegistry>,
    pub(crate) staging: StagingArea,
    pub(crate) config: Arc<GatewayConfig>,
}

impl<B: Backend> fmt::Debug for S3Gateway<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3Gateway")
            .field("multipart", &self.multipart)
            .field("admission", &self.admission)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<B: Backend> S3Gateway<B> {
    /// Create a gateway over `backend`.
    ///
    /// Multipart parts and large uploads are staged under
    /// `config.cache_dir`.
    #[must_use]
    pub fn new(backend: B, config: GatewayConfig) -> Self {
        let staging = StagingArea::new(
            config.cache_dir.clone(),
            config.staging_memory_limit as u64,
        );
        Self {
            backend: Arc::new(backend),
            multipart: Arc::new(MultipartCoordinator::new(staging.clone())),
            admission: Arc::new(AdmissionController::new(&config)),
            identities: Arc::new(IdentityRegistry::new(RetryPolicy::default())),
            staging,
            config: Arc::new(config),
        }
    }

    /// The storage backend.
    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// The gateway configuration.
    #[must_use]
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Admission state shared by every request.
    #[must_use]
    pub fn admission(&self) -> &AdmissionController {
        &self.admission
    }

    /// A shared handle to the admission state, for the HTTP layer's global
    /// ceiling.
    #[must_use]
    pub fn shared_admission(&self) -> Arc<AdmissionController> {
        Arc::clone(&self.admission)
    }

    /// In-progress multipart uploads.
    #[must_use]
    pub fn multipart(&self) -> &MultipartCoordinator {
        &self.multipart
    }

    /// Callers registered with the backend.
    #[must_use]
    pub fn identities(&self) -> &IdentityRegistry {
        &self.identities
    }

    /// Register `caller` with the backend, retrying transient failures.
    ///
    /// Runs outside the request path, typically at startup.
    ///
    /// # Errors
    ///
    /// The backend's last error once retries are exhausted.
    pub async fn register_identity(&self, caller: &CallerIdentity) -> GatewayResult<()> {
        let backend = Arc::clone(&self.backend);
        self.identities
            .register_with_retry(caller, || {
                let backend = Arc::clone(&backend);
                let caller = caller.clone();
                async move { backend.register_identity(&caller).await }
            })
            .await
    }
}
