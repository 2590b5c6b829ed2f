/// SDK Configuration
///
/// Transport and token settings shared by every client the factory creates.
/// Supports environment-based configuration for different deployments.
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::environment::{Environment, ProcessEnvironment};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SdkConfig {
    /// Lifetime of self-signed assertions in seconds
    pub token_lifetime_secs: u64,

    /// gRPC connection timeout in seconds
    pub connection_timeout_secs: u64,

    /// gRPC request timeout in seconds
    pub request_timeout_secs: u64,

    /// HTTP/2 keep-alive interval in seconds
    pub keepalive_interval_secs: u64,

    /// HTTP/2 keep-alive timeout in seconds
    pub keepalive_timeout_secs: u64,

    /// Path to an additional CA certificate bundle (PEM)
    pub tls_ca_cert_path: Option<String>,

    /// Optional TLS server name override (defaults to the endpoint host)
    pub tls_domain_name: Option<String>,
}

impl Default for SdkConfig {
    fn default() -> Self {
        Self {
            token_lifetime_secs: 600,
            connection_timeout_secs: 10,
            request_timeout_secs: 30,
            keepalive_interval_secs: 30,
            keepalive_timeout_secs: 10,
            tls_ca_cert_path: None,
            tls_domain_name: None,
        }
    }
}

impl SdkConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Self {
        Self::from_environment(&ProcessEnvironment)
    }

    /// Load configuration from `env`
    /// Falls back to defaults for anything unset or unparsable
    pub fn from_environment(env: &dyn Environment) -> Self {
        let defaults = Self::default();

        Self {
            token_lifetime_secs: parse_var(env, "INDYKITE_TOKEN_LIFETIME_SECS")
                .unwrap_or(defaults.token_lifetime_secs),
            connection_timeout_secs: parse_var(env, "INDYKITE_CONNECT_TIMEOUT_SECS")
                .unwrap_or(defaults.connection_timeout_secs),
            request_timeout_secs: parse_var(env, "INDYKITE_REQUEST_TIMEOUT_SECS")
                .unwrap_or(defaults.request_timeout_secs),
            keepalive_interval_secs: parse_var(env, "INDYKITE_KEEPALIVE_INTERVAL_SECS")
                .unwrap_or(defaults.keepalive_interval_secs),
            keepalive_timeout_secs: parse_var(env, "INDYKITE_KEEPALIVE_TIMEOUT_SECS")
                .unwrap_or(defaults.keepalive_timeout_secs),
            tls_ca_cert_path: env
                .var("INDYKITE_TLS_CA_CERT_PATH")
                .filter(|v| !v.is_empty()),
            tls_domain_name: env
                .var("INDYKITE_TLS_DOMAIN_NAME")
                .filter(|v| !v.is_empty()),
        }
    }

    /// Configuration for development/testing: short-lived tokens, tight timeouts
    pub fn development() -> Self {
        Self {
            token_lifetime_secs: 60,
            connection_timeout_secs: 2,
            request_timeout_secs: 5,
            ..Self::default()
        }
    }

    pub fn token_lifetime(&self) -> Duration {
        Duration::from_secs(self.token_lifetime_secs)
    }

    pub fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_secs(self.keepalive_interval_secs)
    }

    pub fn keepalive_timeout(&self) -> Duration {
        Duration::from_secs(self.keepalive_timeout_secs)
    }
}

fn parse_var<T: std::str::FromStr>(env: &dyn Environment, key: &str) -> Option<T> {
    env.var(key).and_then(|s| s.parse().ok())
}
