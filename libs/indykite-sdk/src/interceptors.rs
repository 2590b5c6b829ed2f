//! Client interceptor chain
//!
//! Every client carries exactly two interceptors, always in this order:
//!
//! 1. [`AuthVersionInterceptor`] stamps the SDK version header on outgoing
//!    metadata, even on transport paths that skip call credentials.
//! 2. [`StatusTranslationInterceptor`] turns a non-OK terminal status into a
//!    typed [`SdkError`].
//!
//! Neither looks at or changes message bodies.

use std::error::Error as _;
use std::fmt;
use std::sync::Arc;
use tonic::metadata::{AsciiMetadataValue, MetadataMap};
use tonic::{Request, Status};
use tracing::debug;

use crate::error::SdkError;
use crate::{SDK_VERSION, VERSION_HEADER};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterceptorKind {
    AuthVersion,
    StatusTranslation,
}

/// Hook observing an outgoing call and its terminal status
pub trait Interceptor: Send + Sync + fmt::Debug {
    fn kind(&self) -> InterceptorKind;

    /// Inspect or extend outgoing metadata
    fn on_request(&self, _metadata: &mut MetadataMap) -> Result<(), SdkError> {
        Ok(())
    }

    /// Replace a non-OK terminal status with an SDK error
    fn on_status(&self, _status: &Status) -> Option<SdkError> {
        None
    }
}

/// Ensures the SDK version header is present on every call
#[derive(Debug, Clone, Default)]
pub struct AuthVersionInterceptor;

impl AuthVersionInterceptor {
    fn stamp(metadata: &mut MetadataMap) {
        if !metadata.contains_key(VERSION_HEADER) {
            metadata.insert(VERSION_HEADER, AsciiMetadataValue::from_static(SDK_VERSION));
        }
    }
}

impl Interceptor for AuthVersionInterceptor {
    fn kind(&self) -> InterceptorKind {
        InterceptorKind::AuthVersion
    }

    fn on_request(&self, metadata: &mut MetadataMap) -> Result<(), SdkError> {
        Self::stamp(metadata);
        Ok(())
    }
}

// Usable directly with generated clients' `with_interceptor`.
impl tonic::service::Interceptor for AuthVersionInterceptor {
    fn call(&mut self, mut request: Request<()>) -> Result<Request<()>, Status> {
        Self::stamp(request.metadata_mut());
        Ok(request)
    }
}

/// Maps terminal transport statuses into the SDK error taxonomy
#[derive(Debug, Clone, Default)]
pub struct StatusTranslationInterceptor;

impl Interceptor for StatusTranslationInterceptor {
    fn kind(&self) -> InterceptorKind {
        InterceptorKind::StatusTranslation
    }

    fn on_status(&self, status: &Status) -> Option<SdkError> {
        if status.code() == tonic::Code::Ok {
            return None;
        }

        // Failures raised below the RPC layer (call credentials) travel as the
        // status source and keep their own kind.
        let mut source = status.source();
        while let Some(err) = source {
            if let Some(sdk) = err.downcast_ref::<SdkError>() {
                return Some(sdk.clone());
            }
            source = err.source();
        }

        debug!(code = ?status.code(), "Translating RPC status");
        Some(SdkError::rpc_status(status.code(), status.message()))
    }
}

/// Ordered interceptors shared by a client and its transport
#[derive(Clone)]
pub struct InterceptorChain {
    interceptors: Arc<[Arc<dyn Interceptor>]>,
}

impl fmt::Debug for InterceptorChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.interceptors.iter().map(|i| i.kind()))
            .finish()
    }
}

impl InterceptorChain {
    /// `[AuthVersionInterceptor, StatusTranslationInterceptor]`
    pub fn build() -> Self {
        Self {
            interceptors: Arc::new([
                Arc::new(AuthVersionInterceptor) as Arc<dyn Interceptor>,
                Arc::new(StatusTranslationInterceptor),
            ]),
        }
    }

    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Interceptor>> {
        self.interceptors.iter()
    }

    pub fn kinds(&self) -> Vec<InterceptorKind> {
        self.iter().map(|i| i.kind()).collect()
    }

    /// Run the request side of every interceptor, in order
    pub fn apply_request(&self, metadata: &mut MetadataMap) -> Result<(), SdkError> {
        for interceptor in self.iter() {
            interceptor.on_request(metadata)?;
        }
        Ok(())
    }

    /// Translate a failed call; the first interceptor to claim the status wins
    pub fn translate(&self, status: Status) -> SdkError {
        self.iter()
            .find_map(|i| i.on_status(&status))
            .unwrap_or_else(|| SdkError::rpc_status(status.code(), status.message()))
    }

    /// Pass successful results through, translate failures
    pub fn finish<T>(&self, result: Result<T, Status>) -> Result<T, SdkError> {
        result.map_err(|status| self.translate(status))
    }
}
