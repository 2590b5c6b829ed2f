//! Signed assertions
//!
//! Service callers hold a long-lived key and sign a short-lived JWT for every
//! call; identity callers already hold a bearer token and pass it through.

use chrono::Utc;
use jsonwebtoken::{encode, Header};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

use crate::credentials::ApplicationCredential;
use crate::error::{Result, SdkError};
use crate::jwk::SigningKey;

/// Bearer value attached as `authorization: Bearer <value>`
#[derive(Clone, PartialEq, Eq)]
pub struct SignedAssertion(String);

impl SignedAssertion {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Debug for SignedAssertion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SignedAssertion(..)")
    }
}

/// Produces a fresh assertion on every call
pub trait AssertionSigner: Send + Sync {
    fn sign(&self) -> Result<SignedAssertion>;
}

/// Claims of a self-signed application assertion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssertionClaims {
    /// Issuer (app agent id)
    pub iss: String,
    /// Subject (app agent id)
    pub sub: String,
    /// Audience (app space id)
    pub aud: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Unique token id
    pub jti: String,
}

/// Signs assertions with an application credential's private key
///
/// The JWK is converted to an encoding key once; the credential itself is not
/// retained.
pub struct CredentialSigner {
    app_agent_id: Uuid,
    app_space_id: Uuid,
    key: SigningKey,
    lifetime_secs: i64,
}

impl CredentialSigner {
    /// ## Errors
    ///
    /// Returns `SdkError::Signing` if the key is structurally invalid, its
    /// declared algorithm cannot be used with it, or `lifetime` does not fit a
    /// JWT timestamp.
    pub fn new(credential: ApplicationCredential, lifetime: Duration) -> Result<Self> {
        let key = credential.private_key_jwk.to_signing_key()?;
        let lifetime_secs = i64::try_from(lifetime.as_secs()).map_err(|_| {
            SdkError::Signing(format!("token lifetime {}s is out of range", lifetime.as_secs()))
        })?;

        Ok(Self {
            app_agent_id: credential.app_agent_id,
            app_space_id: credential.app_space_id,
            key,
            lifetime_secs,
        })
    }

    fn claims(&self) -> Result<AssertionClaims> {
        let now = Utc::now().timestamp();
        let exp = now.checked_add(self.lifetime_secs).ok_or_else(|| {
            SdkError::Signing(format!(
                "token lifetime {}s overflows the expiry timestamp",
                self.lifetime_secs
            ))
        })?;
        let agent = self.app_agent_id.to_string();

        Ok(AssertionClaims {
            iss: agent.clone(),
            sub: agent,
            aud: self.app_space_id.to_string(),
            iat: now,
            exp,
            jti: Uuid::new_v4().to_string(),
        })
    }
}

impl AssertionSigner for CredentialSigner {
    fn sign(&self) -> Result<SignedAssertion> {
        let mut header = Header::new(self.key.algorithm);
        header.kid = self.key.kid.clone();

        encode(&header, &self.claims()?, &self.key.key)
            .map(SignedAssertion)
            .map_err(|e| SdkError::Signing(format!("failed to sign JWT: {e}")))
    }
}

/// Caller-supplied bearer token, used verbatim
#[derive(Clone)]
pub struct StaticToken(SignedAssertion);

impl StaticToken {
    /// ## Errors
    ///
    /// Returns `SdkError::InvalidToken` for an empty or blank token.
    pub fn new(token: impl Into<String>) -> Result<Self> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(SdkError::InvalidToken("token is empty".to_string()));
        }
        Ok(Self(SignedAssertion(token)))
    }
}

impl AssertionSigner for StaticToken {
    fn sign(&self) -> Result<SignedAssertion> {
        Ok(self.0.clone())
    }
}
