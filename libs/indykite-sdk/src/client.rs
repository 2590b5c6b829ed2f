//! Client instance factory
//!
//! ## Service mode
//!
//! Application credentials are resolved, a signer is derived from the private
//! key, and every call carries a freshly signed assertion.
//!
//! ```rust,no_run
//! use indykite_sdk::{ChannelCredentials, ClientOptions, SdkClient, ServiceStub};
//!
//! #[derive(Clone)]
//! struct ConfigStub(indykite_sdk::AuthChannel<tonic::transport::Channel>);
//!
//! impl ServiceStub for ConfigStub {
//!     fn from_parts(
//!         _endpoint: &str,
//!         channel_credentials: ChannelCredentials,
//!         options: ClientOptions,
//!     ) -> indykite_sdk::Result<Self> {
//!         Ok(Self(options.connect_lazy(&channel_credentials)?))
//!     }
//! }
//!
//! # async fn example() -> indykite_sdk::Result<()> {
//! // Reads INDYKITE_APPLICATION_CREDENTIALS or INDYKITE_APPLICATION_CREDENTIALS_FILE
//! let sdk = SdkClient::<ConfigStub>::create_service_instance(None).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Identity mode
//!
//! The caller already holds a bearer token (e.g. an end-user session) and
//! supplies the endpoint explicitly; no credentials are resolved.

use std::future::Future;
use std::sync::Arc;
use tonic::{Response, Status};
use tracing::{debug, info};

use crate::call_credentials::CallCredentials;
use crate::channel::{ChannelCredentials, ChannelCredentialsFactory, TlsChannelCredentials};
use crate::config::SdkConfig;
use crate::credentials::CredentialResolver;
use crate::environment::{Environment, ProcessEnvironment};
use crate::error::Result;
use crate::interceptors::InterceptorChain;
use crate::signer::{AssertionSigner, CredentialSigner, StaticToken};
use crate::transport::ClientOptions;

/// A generated RPC stub, constructible from endpoint, channel credentials and options
pub trait ServiceStub: Sized {
    fn from_parts(
        endpoint: &str,
        channel_credentials: ChannelCredentials,
        options: ClientOptions,
    ) -> Result<Self>;
}

/// A ready-to-use client wrapping a service stub
#[derive(Debug, Clone)]
pub struct SdkClient<S> {
    client: S,
    interceptors: InterceptorChain,
}

impl<S: ServiceStub> SdkClient<S> {
    /// Service-mode instance using the process environment and default TLS
    pub async fn create_service_instance(explicit_credential: Option<&str>) -> Result<Self> {
        SdkClientFactory::from_env()
            .create_service_instance(explicit_credential)
            .await
    }

    /// Identity-mode instance using default TLS
    pub async fn create_identity_instance(token: &str, endpoint: &str) -> Result<Self> {
        SdkClientFactory::from_env()
            .create_identity_instance(token, endpoint)
            .await
    }
}

impl<S> SdkClient<S> {
    /// The wrapped stub
    pub fn client(&self) -> &S {
        &self.client
    }

    pub fn client_mut(&mut self) -> &mut S {
        &mut self.client
    }

    pub fn into_inner(self) -> S {
        self.client
    }

    pub fn interceptors(&self) -> &InterceptorChain {
        &self.interceptors
    }

    /// Run one RPC on a clone of the stub, translating a failed status
    ///
    /// ```rust,ignore
    /// let node = sdk.call(|mut c| async move { c.read_config_node(req).await }).await?;
    /// ```
    pub async fn call<F, Fut, T>(&self, rpc: F) -> Result<T>
    where
        S: Clone,
        F: FnOnce(S) -> Fut,
        Fut: Future<Output = std::result::Result<Response<T>, Status>>,
    {
        self.interceptors
            .finish(rpc(self.client.clone()).await)
            .map(Response::into_inner)
    }
}

/// Builds clients; holds the injected environment and channel-credential policy
#[derive(Clone)]
pub struct SdkClientFactory {
    env: Arc<dyn Environment>,
    channel_credentials: Arc<dyn ChannelCredentialsFactory>,
    config: SdkConfig,
}

impl SdkClientFactory {
    pub fn new(config: SdkConfig) -> Self {
        Self {
            env: Arc::new(ProcessEnvironment),
            channel_credentials: TlsChannelCredentials::shared(&config),
            config,
        }
    }

    /// Factory configured from `INDYKITE_*` environment variables
    pub fn from_env() -> Self {
        Self::new(SdkConfig::from_env())
    }

    pub fn with_environment(mut self, env: Arc<dyn Environment>) -> Self {
        self.env = env;
        self
    }

    pub fn with_channel_credentials(
        mut self,
        channel_credentials: Arc<dyn ChannelCredentialsFactory>,
    ) -> Self {
        self.channel_credentials = channel_credentials;
        self
    }

    pub fn config(&self) -> &SdkConfig {
        &self.config
    }

    /// Resolve application credentials and build a self-signing client
    ///
    /// ## Errors
    ///
    /// The first failure of the pipeline, unmodified: credential resolution,
    /// key conversion, channel credentials, or stub construction.
    pub async fn create_service_instance<S: ServiceStub>(
        &self,
        explicit_credential: Option<&str>,
    ) -> Result<SdkClient<S>> {
        let credential = CredentialResolver::new(self.env.clone()).resolve(explicit_credential)?;
        let endpoint = credential.endpoint.clone();

        info!(
            app_space_id = %credential.app_space_id,
            app_agent_id = %credential.app_agent_id,
            endpoint = %endpoint,
            "Creating service instance"
        );

        let signer = CredentialSigner::new(credential, self.config.token_lifetime())?;
        self.build(&endpoint, Arc::new(signer))
    }

    /// Build a client that presents a caller-supplied bearer token
    pub async fn create_identity_instance<S: ServiceStub>(
        &self,
        token: &str,
        endpoint: &str,
    ) -> Result<SdkClient<S>> {
        info!(endpoint = %endpoint, "Creating identity instance");

        let signer = StaticToken::new(token)?;
        self.build(endpoint, Arc::new(signer))
    }

    /// The single seam for transport-credential policy
    fn new_channel_credentials(&self, endpoint: &str) -> Result<ChannelCredentials> {
        self.channel_credentials.new_channel_credentials(endpoint)
    }

    fn build<S: ServiceStub>(
        &self,
        endpoint: &str,
        signer: Arc<dyn AssertionSigner>,
    ) -> Result<SdkClient<S>> {
        let call_credentials = CallCredentials::from_signer(signer);
        let channel_credentials = self.new_channel_credentials(endpoint)?;
        let interceptors = InterceptorChain::build();

        let options = ClientOptions {
            credentials: Some(call_credentials),
            interceptors: interceptors.clone(),
            config: self.config.clone(),
        };

        let client = S::from_parts(endpoint, channel_credentials, options)?;
        debug!(endpoint = %endpoint, interceptors = ?interceptors, "Client instance created");

        Ok(SdkClient {
            client,
            interceptors,
        })
    }
}

impl Default for SdkClientFactory {
    fn default() -> Self {
        Self::new(SdkConfig::default())
    }
}
