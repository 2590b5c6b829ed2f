//! IndyKite gRPC client SDK core
//!
//! Turns application credentials (or a caller-held bearer token) into a
//! ready-to-use gRPC client bound to a TLS channel and to per-call
//! authentication metadata.
//!
//! ## Core Components
//!
//! - **CredentialResolver**: finds credentials (argument > inline env > env file)
//! - **CredentialSigner / StaticToken**: produce the bearer assertion for each call
//! - **TlsChannelCredentials**: transport-level TLS credentials for an endpoint
//! - **CallCredentials**: per-call `authorization` and SDK version metadata
//! - **InterceptorChain**: version stamping plus status translation
//! - **SdkClientFactory**: wires all of the above around a generated stub
//!
//! ## Security Guarantees
//!
//! - Channels are always TLS
//! - Self-signed assertions are short-lived and regenerated per call
//! - Private keys and tokens never appear in logs or `Debug` output
//! - Every failure surfaces as a typed [`SdkError`], nothing is swallowed

mod call_credentials;
mod channel;
mod client;
pub mod config;
mod credentials;
pub mod environment;
mod error;
mod interceptors;
mod jwk;
mod signer;
mod transport;

pub use call_credentials::{CallContext, CallCredentials, AUTHORIZATION_HEADER};
pub use channel::{
    ChannelCredentials, ChannelCredentialsFactory, TlsChannelCredentials, DEFAULT_TLS_PORT,
};
pub use client::{SdkClient, SdkClientFactory, ServiceStub};
pub use config::SdkConfig;
pub use credentials::{
    ApplicationCredential, CredentialResolver, CredentialSource, CREDENTIALS_ENV,
    CREDENTIALS_FILE_ENV,
};
pub use environment::{Environment, ProcessEnvironment, StaticEnvironment};
pub use error::{Result, RpcErrorKind, SdkError};
pub use interceptors::{
    AuthVersionInterceptor, Interceptor, InterceptorChain, InterceptorKind,
    StatusTranslationInterceptor,
};
pub use jwk::{PrivateKeyJwk, SigningKey};
pub use signer::{AssertionClaims, AssertionSigner, CredentialSigner, SignedAssertion, StaticToken};
pub use transport::{AuthChannel, ClientOptions};

// Re-export tonic Status for convenience
pub use tonic::Status;

/// Version of this SDK, sent with every call
pub const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Metadata key carrying [`SDK_VERSION`]
pub const VERSION_HEADER: &str = "iksdk-version";
