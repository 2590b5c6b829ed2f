//! Transport-level (TLS) channel credentials
//!
//! Every channel the SDK builds is TLS. The trust store is the platform's
//! native roots, optionally extended with a CA bundle from [`SdkConfig`].

use http::uri::Authority;
use std::fs;
use std::sync::Arc;
use tonic::transport::{Certificate, ClientTlsConfig};
use tracing::{debug, info};

use crate::config::SdkConfig;
use crate::error::{Result, SdkError};

/// TLS settings bound to one endpoint's server identity
#[derive(Debug, Clone)]
pub struct ChannelCredentials {
    authority: Authority,
    domain_name: String,
    tls: ClientTlsConfig,
}

impl ChannelCredentials {
    /// `host:port` the credentials were built for
    pub fn authority(&self) -> &Authority {
        &self.authority
    }

    /// Name the server certificate is verified against
    pub fn domain_name(&self) -> &str {
        &self.domain_name
    }

    /// `https://host:port`
    pub fn uri(&self) -> String {
        format!("https://{}", self.authority)
    }

    pub fn tls_config(&self) -> ClientTlsConfig {
        self.tls.clone()
    }
}

/// Strategy for building channel credentials
///
/// The instance factory calls this exactly once per client; any error it
/// returns is handed back to the caller unmodified.
pub trait ChannelCredentialsFactory: Send + Sync {
    fn new_channel_credentials(&self, endpoint: &str) -> Result<ChannelCredentials>;
}

/// Default TLS channel credentials
#[derive(Debug, Clone)]
pub struct TlsChannelCredentials {
    ca_cert_path: Option<String>,
    domain_override: Option<String>,
}

impl TlsChannelCredentials {
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            ca_cert_path: config.tls_ca_cert_path.clone(),
            domain_override: config.tls_domain_name.clone(),
        }
    }

    pub fn shared(config: &SdkConfig) -> Arc<dyn ChannelCredentialsFactory> {
        Arc::new(Self::new(config))
    }
}

impl ChannelCredentialsFactory for TlsChannelCredentials {
    fn new_channel_credentials(&self, endpoint: &str) -> Result<ChannelCredentials> {
        let authority = parse_endpoint(endpoint)?;

        let domain_name = self
            .domain_override
            .clone()
            .unwrap_or_else(|| authority.host().trim_matches(['[', ']']).to_string());

        let mut tls = ClientTlsConfig::new()
            .domain_name(domain_name.clone())
            .with_native_roots();

        if let Some(ca_path) = &self.ca_cert_path {
            let ca_pem = fs::read(ca_path).map_err(|e| {
                SdkError::TransportCredential(format!("failed to read CA bundle {ca_path}: {e}"))
            })?;
            tls = tls.ca_certificate(Certificate::from_pem(ca_pem));
            debug!(ca_cert_path = %ca_path, "Extra CA bundle added to trust store");
        }

        info!(
            endpoint = %authority,
            domain = %domain_name,
            "TLS channel credentials built"
        );

        Ok(ChannelCredentials {
            authority,
            domain_name,
            tls,
        })
    }
}

/// Port used when an endpoint names only a host
pub const DEFAULT_TLS_PORT: u16 = 443;

/// Parse `host[:port]`; schemes, paths and userinfo are rejected
fn parse_endpoint(endpoint: &str) -> Result<Authority> {
    let invalid = |reason: &str| {
        SdkError::TransportCredential(format!("invalid endpoint `{endpoint}`: {reason}"))
    };

    if endpoint.contains("://") || endpoint.contains('/') {
        return Err(invalid("expected host:port"));
    }

    let authority: Authority = endpoint.parse().map_err(|_| invalid("expected host:port"))?;

    if authority.host().is_empty() {
        return Err(invalid("missing host"));
    }
    if authority.as_str().contains('@') {
        return Err(invalid("userinfo is not allowed"));
    }
    if authority.port().is_some() {
        return Ok(authority);
    }

    format!("{}:{DEFAULT_TLS_PORT}", authority.as_str().trim_end_matches(':'))
        .parse()
        .map_err(|_| invalid("expected host:port"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn factory() -> TlsChannelCredentials {
        TlsChannelCredentials::new(&SdkConfig::default())
    }

    #[test]
    fn test_build_for_endpoint() {
        let creds = factory()
            .new_channel_credentials("jarvis.local:8043")
            .unwrap();
        assert_eq!(creds.domain_name(), "jarvis.local");
        assert_eq!(creds.authority().port_u16(), Some(8043));
        assert_eq!(creds.uri(), "https://jarvis.local:8043");
    }

    #[test]
    fn test_ipv6_endpoint() {
        let creds = factory().new_channel_credentials("[::1]:443").unwrap();
        assert_eq!(creds.domain_name(), "::1");
    }

    #[test]
    fn test_domain_override() {
        let config = SdkConfig {
            tls_domain_name: Some("jarvis.indykite.com".to_string()),
            ..SdkConfig::default()
        };
        let creds = TlsChannelCredentials::new(&config)
            .new_channel_credentials("10.0.0.7:443")
            .unwrap();
        assert_eq!(creds.domain_name(), "jarvis.indykite.com");
    }

    #[test]
    fn test_bare_host_defaults_to_tls_port() {
        let creds = factory().new_channel_credentials("ENDPOINT").unwrap();
        assert_eq!(creds.authority().as_str(), "ENDPOINT:443");
        assert_eq!(creds.domain_name(), "ENDPOINT");

        let creds = factory().new_channel_credentials("jarvis.indykite.com").unwrap();
        assert_eq!(creds.uri(), "https://jarvis.indykite.com:443");

        let creds = factory().new_channel_credentials("[::1]").unwrap();
        assert_eq!(creds.authority().port_u16(), Some(DEFAULT_TLS_PORT));
    }

    #[test]
    fn test_malformed_endpoints() {
        for endpoint in [
            "",
            "https://jarvis.local:8043",
            "jarvis.local:port",
            "jarvis.local:8043/path",
            "user@jarvis.local:8043",
        ] {
            let err = factory().new_channel_credentials(endpoint).unwrap_err();
            assert!(
                matches!(err, SdkError::TransportCredential(_)),
                "{endpoint} should be rejected"
            );
        }
    }

    #[test]
    fn test_extra_ca_bundle() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "-----BEGIN CERTIFICATE-----").unwrap();
        writeln!(file, "-----END CERTIFICATE-----").unwrap();

        let config = SdkConfig {
            tls_ca_cert_path: Some(file.path().to_string_lossy().into_owned()),
            ..SdkConfig::default()
        };
        assert!(TlsChannelCredentials::new(&config)
            .new_channel_credentials("jarvis.local:8043")
            .is_ok());
    }

    #[test]
    fn test_unreadable_ca_bundle() {
        let config = SdkConfig {
            tls_ca_cert_path: Some("/nonexistent/ca.pem".to_string()),
            ..SdkConfig::default()
        };
        let err = TlsChannelCredentials::new(&config)
            .new_channel_credentials("jarvis.local:8043")
            .unwrap_err();
        assert!(matches!(err, SdkError::TransportCredential(msg) if msg.contains("/nonexistent/ca.pem")));
    }
}
