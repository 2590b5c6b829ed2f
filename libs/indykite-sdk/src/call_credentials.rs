//! Per-call authentication metadata
//!
//! The transport asks for metadata once per outgoing call. Each request gets
//! a fresh assertion from the signer, so expiring self-signed tokens never
//! outlive the client.

use std::fmt;
use std::sync::Arc;
use tonic::metadata::{AsciiMetadataValue, MetadataMap};
use tracing::{debug, warn};

use crate::error::{Result, SdkError};
use crate::signer::AssertionSigner;
use crate::{SDK_VERSION, VERSION_HEADER};

pub const AUTHORIZATION_HEADER: &str = "authorization";

/// What the transport knows about the call being authenticated
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    /// Target service URL, e.g. `https://jarvis.local:8043/indykite.identity.v1beta2.IdentityManagementAPI`
    pub service_url: String,
}

impl CallContext {
    pub fn new(service_url: impl Into<String>) -> Self {
        Self {
            service_url: service_url.into(),
        }
    }
}

/// Metadata generator invoked before every call
#[derive(Clone)]
pub struct CallCredentials {
    signer: Arc<dyn AssertionSigner>,
}

impl fmt::Debug for CallCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallCredentials").finish_non_exhaustive()
    }
}

impl CallCredentials {
    pub fn from_signer(signer: Arc<dyn AssertionSigner>) -> Self {
        Self { signer }
    }

    /// Build `authorization` and SDK version metadata for one call
    ///
    /// ## Errors
    ///
    /// The signer's error is returned as-is and no metadata is produced.
    /// A token that cannot be carried in a header yields `SdkError::CallCredential`.
    pub async fn generate_metadata(&self, ctx: &CallContext) -> Result<MetadataMap> {
        let assertion = self.signer.sign().map_err(|e| {
            warn!(service_url = %ctx.service_url, error = %e, "Call credential generation failed");
            e
        })?;

        let auth_header = AsciiMetadataValue::try_from(format!("Bearer {}", assertion.as_str()))
            .map_err(|_| {
                SdkError::CallCredential(
                    "token contains characters not allowed in metadata".to_string(),
                )
            })?;

        let mut metadata = MetadataMap::new();
        metadata.insert(AUTHORIZATION_HEADER, auth_header);
        metadata.insert(VERSION_HEADER, AsciiMetadataValue::from_static(SDK_VERSION));

        debug!(service_url = %ctx.service_url, "Call credentials generated");
        Ok(metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signer::{SignedAssertion, StaticToken};

    struct FailingSigner;

    impl AssertionSigner for FailingSigner {
        fn sign(&self) -> Result<SignedAssertion> {
            Err(SdkError::Signing("key rejected".to_string()))
        }
    }

    fn values(metadata: &MetadataMap, key: &str) -> Vec<String> {
        metadata
            .get_all(key)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_static_token_metadata() {
        let creds = CallCredentials::from_signer(Arc::new(StaticToken::new("TOKEN").unwrap()));
        let metadata = creds
            .generate_metadata(&CallContext::new(""))
            .await
            .unwrap();

        assert_eq!(values(&metadata, "authorization"), vec!["Bearer TOKEN"]);
        assert_eq!(values(&metadata, "iksdk-version"), vec![SDK_VERSION]);
    }

    #[tokio::test]
    async fn test_signer_error_is_returned_unchanged() {
        let creds = CallCredentials::from_signer(Arc::new(FailingSigner));
        let err = creds
            .generate_metadata(&CallContext::default())
            .await
            .unwrap_err();
        assert_eq!(err, SdkError::Signing("key rejected".to_string()));
    }

    #[tokio::test]
    async fn test_non_ascii_token() {
        let creds = CallCredentials::from_signer(Arc::new(StaticToken::new("tök\nen").unwrap()));
        let err = creds
            .generate_metadata(&CallContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SdkError::CallCredential(_)));
    }
}
