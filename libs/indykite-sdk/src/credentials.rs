//! Application credential resolution
//!
//! Credentials are looked up in a fixed order:
//!
//! 1. the JSON string passed explicitly by the caller
//! 2. `INDYKITE_APPLICATION_CREDENTIALS` holding the JSON inline
//! 3. `INDYKITE_APPLICATION_CREDENTIALS_FILE` naming a JSON file
//!
//! Exactly one source is used. Finding none is an error, never a fallback.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::environment::Environment;
use crate::error::{Result, SdkError};
use crate::jwk::PrivateKeyJwk;

pub const CREDENTIALS_ENV: &str = "INDYKITE_APPLICATION_CREDENTIALS";
pub const CREDENTIALS_FILE_ENV: &str = "INDYKITE_APPLICATION_CREDENTIALS_FILE";

/// Long-lived application identity: ids, backend endpoint and signing key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationCredential {
    pub app_space_id: Uuid,
    pub app_agent_id: Uuid,
    /// Backend address as `host:port`
    pub endpoint: String,
    #[serde(rename = "privateKeyJWK")]
    pub private_key_jwk: PrivateKeyJwk,
}

impl ApplicationCredential {
    /// Parse and validate credential JSON
    pub fn from_json(raw: &str) -> Result<Self> {
        let credential: Self = serde_json::from_str(raw)
            .map_err(|e| SdkError::MalformedCredentials(e.to_string()))?;
        credential.validate()?;
        Ok(credential)
    }

    fn validate(&self) -> Result<()> {
        if self.app_space_id.is_nil() {
            return Err(SdkError::MalformedCredentials(
                "appSpaceId is empty".to_string(),
            ));
        }
        if self.app_agent_id.is_nil() {
            return Err(SdkError::MalformedCredentials(
                "appAgentId is empty".to_string(),
            ));
        }
        if self.endpoint.trim().is_empty() {
            return Err(SdkError::MalformedCredentials(
                "endpoint is empty".to_string(),
            ));
        }
        self.private_key_jwk
            .validate()
            .map_err(|e| SdkError::MalformedCredentials(format!("privateKeyJWK: {e}")))
    }
}

/// Which source a credential was read from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    Explicit,
    InlineEnv,
    File(PathBuf),
}

/// Locates and parses application credentials
#[derive(Clone)]
pub struct CredentialResolver {
    env: Arc<dyn Environment>,
}

impl CredentialResolver {
    pub fn new(env: Arc<dyn Environment>) -> Self {
        Self { env }
    }

    /// Resolve credentials, preferring `explicit` over the environment
    pub fn resolve(&self, explicit: Option<&str>) -> Result<ApplicationCredential> {
        let (source, raw) = self.locate(explicit)?;
        debug!(source = ?source, "Application credentials located");
        ApplicationCredential::from_json(&raw)
    }

    fn locate(&self, explicit: Option<&str>) -> Result<(CredentialSource, String)> {
        if let Some(raw) = explicit {
            return Ok((CredentialSource::Explicit, raw.to_string()));
        }

        if let Some(raw) = self.non_empty_var(CREDENTIALS_ENV) {
            return Ok((CredentialSource::InlineEnv, raw));
        }

        if let Some(path) = self.non_empty_var(CREDENTIALS_FILE_ENV) {
            let path = PathBuf::from(path);
            let bytes = self.env.read_file(&path).map_err(|e| {
                SdkError::MalformedCredentials(format!(
                    "failed to read {}: {e}",
                    path.display()
                ))
            })?;
            let raw = String::from_utf8(bytes).map_err(|_| {
                SdkError::MalformedCredentials(format!("{} is not valid UTF-8", path.display()))
            })?;
            return Ok((CredentialSource::File(path), raw));
        }

        Err(SdkError::MissingCredentials)
    }

    fn non_empty_var(&self, key: &str) -> Option<String> {
        self.env.var(key).filter(|v| !v.trim().is_empty())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::environment::StaticEnvironment;
    use crate::jwk::tests::sample_ec_jwk;

    pub(crate) fn sample_credential() -> ApplicationCredential {
        ApplicationCredential {
            app_space_id: "696e6479-6b69-4465-8000-010f00000000".parse().unwrap(),
            app_agent_id: "696e6479-6b69-4465-8000-050f00000000".parse().unwrap(),
            endpoint: "jarvis.local:8043".to_string(),
            private_key_jwk: sample_ec_jwk(),
        }
    }

    pub(crate) fn sample_credential_json() -> String {
        serde_json::to_string(&sample_credential()).unwrap()
    }

    fn resolver(env: StaticEnvironment) -> CredentialResolver {
        CredentialResolver::new(Arc::new(env))
    }

    #[test]
    fn test_json_schema_field_names() {
        let value: serde_json::Value = serde_json::from_str(&sample_credential_json()).unwrap();
        assert!(value.get("appSpaceId").is_some());
        assert!(value.get("appAgentId").is_some());
        assert_eq!(value["privateKeyJWK"]["use"], "sig");
    }

    #[test]
    fn test_resolve_explicit() {
        let cred = resolver(StaticEnvironment::new())
            .resolve(Some(&sample_credential_json()))
            .unwrap();
        assert_eq!(cred, sample_credential());
    }

    #[test]
    fn test_explicit_wins_over_env() {
        let mut other = sample_credential();
        other.endpoint = "other.local:443".to_string();
        let env = StaticEnvironment::new()
            .with_var(CREDENTIALS_ENV, serde_json::to_string(&other).unwrap());

        let cred = resolver(env)
            .resolve(Some(&sample_credential_json()))
            .unwrap();
        assert_eq!(cred.endpoint, "jarvis.local:8043");
    }

    #[test]
    fn test_inline_env_wins_over_file() {
        let env = StaticEnvironment::new()
            .with_var(CREDENTIALS_ENV, sample_credential_json())
            .with_var(CREDENTIALS_FILE_ENV, "/does/not/exist.json");

        let cred = resolver(env).resolve(None).unwrap();
        assert_eq!(cred, sample_credential());
    }

    #[test]
    fn test_resolve_file() {
        let env = StaticEnvironment::new()
            .with_var(CREDENTIALS_FILE_ENV, "/etc/indykite/creds.json")
            .with_file("/etc/indykite/creds.json", sample_credential_json());

        let r = resolver(env);
        let (source, _) = r.locate(None).unwrap();
        assert_eq!(
            source,
            CredentialSource::File(PathBuf::from("/etc/indykite/creds.json"))
        );
        assert_eq!(r.resolve(None).unwrap(), sample_credential());
    }

    #[test]
    fn test_missing_credentials() {
        let err = resolver(StaticEnvironment::new()).resolve(None).unwrap_err();
        assert_eq!(err, SdkError::MissingCredentials);
        assert_eq!(err.to_string(), "missing application credentials");
    }

    #[test]
    fn test_empty_env_counts_as_unset() {
        let env = StaticEnvironment::new().with_var(CREDENTIALS_ENV, "");
        let err = resolver(env).resolve(None).unwrap_err();
        assert_eq!(err, SdkError::MissingCredentials);
    }

    #[test]
    fn test_malformed_json() {
        let err = resolver(StaticEnvironment::new())
            .resolve(Some("{not json"))
            .unwrap_err();
        assert!(matches!(err, SdkError::MalformedCredentials(_)));
    }

    #[test]
    fn test_missing_field() {
        let mut value: serde_json::Value = serde_json::from_str(&sample_credential_json()).unwrap();
        value.as_object_mut().unwrap().remove("endpoint");

        let err = resolver(StaticEnvironment::new())
            .resolve(Some(&value.to_string()))
            .unwrap_err();
        assert!(matches!(err, SdkError::MalformedCredentials(msg) if msg.contains("endpoint")));
    }

    #[test]
    fn test_empty_endpoint() {
        let mut cred = sample_credential();
        cred.endpoint = "  ".to_string();

        let err = resolver(StaticEnvironment::new())
            .resolve(Some(&serde_json::to_string(&cred).unwrap()))
            .unwrap_err();
        assert_eq!(
            err,
            SdkError::MalformedCredentials("endpoint is empty".to_string())
        );
    }

    #[test]
    fn test_jwk_without_private_part() {
        let mut cred = sample_credential();
        cred.private_key_jwk.d = None;

        let err = resolver(StaticEnvironment::new())
            .resolve(Some(&serde_json::to_string(&cred).unwrap()))
            .unwrap_err();
        assert!(matches!(err, SdkError::MalformedCredentials(msg) if msg.contains("`d`")));
    }

    #[test]
    fn test_unreadable_file_is_malformed() {
        let env = StaticEnvironment::new().with_var(CREDENTIALS_FILE_ENV, "/missing.json");
        let err = resolver(env).resolve(None).unwrap_err();
        assert!(matches!(err, SdkError::MalformedCredentials(msg) if msg.contains("/missing.json")));
    }

    #[test]
    fn test_non_utf8_file() {
        let env = StaticEnvironment::new()
            .with_var(CREDENTIALS_FILE_ENV, "/creds.bin")
            .with_file("/creds.bin", vec![0xff, 0xfe, 0x00]);
        let err = resolver(env).resolve(None).unwrap_err();
        assert!(matches!(err, SdkError::MalformedCredentials(_)));
    }
}
