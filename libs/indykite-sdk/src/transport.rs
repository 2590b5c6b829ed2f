/// Authenticated gRPC transport
///
/// [`AuthChannel`] wraps any tower service speaking HTTP (normally a tonic
/// `Channel`) and, for every request:
/// - asks the call credentials for fresh metadata
/// - runs the request side of the interceptor chain
/// - forwards the request unchanged otherwise
use futures::future::BoxFuture;
use std::task::{Context, Poll};
use tonic::metadata::MetadataMap;
use tonic::transport::{Channel, Endpoint};
use tower::Service;
use tracing::debug;

use crate::call_credentials::{CallContext, CallCredentials};
use crate::channel::ChannelCredentials;
use crate::config::SdkConfig;
use crate::error::{Result, SdkError};
use crate::interceptors::InterceptorChain;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Everything a stub needs besides endpoint and channel credentials
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub credentials: Option<CallCredentials>,
    pub interceptors: InterceptorChain,
    pub config: SdkConfig,
}

impl ClientOptions {
    /// Build a lazily connecting TLS channel wrapped with these options
    ///
    /// Nothing is dialed until the first call. Must be called inside a tokio runtime.
    pub fn connect_lazy(
        &self,
        channel_credentials: &ChannelCredentials,
    ) -> Result<AuthChannel<Channel>> {
        let endpoint = self.endpoint(channel_credentials)?;
        debug!(uri = %channel_credentials.uri(), "Creating lazy gRPC channel");
        Ok(self.wrap_for(endpoint.connect_lazy(), channel_credentials))
    }

    /// tonic endpoint with timeouts, keep-alive and TLS applied
    pub fn endpoint(&self, channel_credentials: &ChannelCredentials) -> Result<Endpoint> {
        let uri = channel_credentials.uri();
        Endpoint::from_shared(uri.clone())
            .map_err(|e| SdkError::TransportCredential(format!("invalid endpoint {uri}: {e}")))?
            .connect_timeout(self.config.connection_timeout())
            .timeout(self.config.request_timeout())
            .http2_keep_alive_interval(self.config.keepalive_interval())
            .keep_alive_timeout(self.config.keepalive_timeout())
            .tcp_nodelay(true)
            .tls_config(channel_credentials.tls_config())
            .map_err(|e| SdkError::TransportCredential(format!("TLS setup failed: {e}")))
    }

    /// Wrap an existing transport service
    pub fn wrap<S>(&self, inner: S) -> AuthChannel<S> {
        AuthChannel {
            inner,
            credentials: self.credentials.clone(),
            interceptors: self.interceptors.clone(),
            origin: None,
        }
    }

    /// Wrap a transport service dialing `channel_credentials`' endpoint
    ///
    /// tonic clients send path-only URIs, so the endpoint supplies the scheme
    /// and authority of the service URL handed to the call credentials.
    pub fn wrap_for<S>(&self, inner: S, channel_credentials: &ChannelCredentials) -> AuthChannel<S> {
        AuthChannel {
            origin: Some(channel_credentials.uri()),
            ..self.wrap(inner)
        }
    }
}

/// Transport service attaching call credentials and interceptor metadata
#[derive(Debug, Clone)]
pub struct AuthChannel<S> {
    inner: S,
    credentials: Option<CallCredentials>,
    interceptors: InterceptorChain,
    origin: Option<String>,
}

impl<S> AuthChannel<S> {
    pub fn get_ref(&self) -> &S {
        &self.inner
    }
}

impl<S, B> Service<http::Request<B>> for AuthChannel<S>
where
    S: Service<http::Request<B>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Into<BoxError>,
    B: Send + 'static,
{
    type Response = S::Response;
    type Error = BoxError;
    type Future = BoxFuture<'static, std::result::Result<S::Response, BoxError>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<std::result::Result<(), BoxError>> {
        self.inner.poll_ready(cx).map_err(Into::into)
    }

    fn call(&mut self, mut request: http::Request<B>) -> Self::Future {
        // The ready service is the one that must be called.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let credentials = self.credentials.clone();
        let interceptors = self.interceptors.clone();
        let origin = self.origin.clone();

        Box::pin(async move {
            if let Some(credentials) = credentials {
                let ctx = CallContext::new(service_url(request.uri(), origin.as_deref()));
                let metadata = credentials
                    .generate_metadata(&ctx)
                    .await
                    .map_err(|e| call_failure(&e))?;
                request.headers_mut().extend(metadata.into_headers());
            }

            let mut metadata = MetadataMap::from_headers(std::mem::take(request.headers_mut()));
            interceptors
                .apply_request(&mut metadata)
                .map_err(|e| call_failure(&e))?;
            *request.headers_mut() = metadata.into_headers();

            inner.call(request).await.map_err(Into::into)
        })
    }
}

fn call_failure(err: &SdkError) -> BoxError {
    match err {
        SdkError::CallCredential(_) => Box::new(err.clone()),
        other => Box::new(SdkError::CallCredential(other.to_string())),
    }
}

/// Scheme, authority and service path, without the method name
///
/// Path-only URIs take scheme and authority from `origin`; with neither, only
/// the service path is returned.
fn service_url(uri: &http::Uri, origin: Option<&str>) -> String {
    let path = uri.path();
    let service = path.rsplit_once('/').map_or(path, |(service, _)| service);
    match (uri.scheme_str(), uri.authority(), origin) {
        (Some(scheme), Some(authority), _) => format!("{scheme}://{authority}{service}"),
        (_, _, Some(origin)) => format!("{}{service}", origin.trim_end_matches('/')),
        _ => service.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{ChannelCredentialsFactory, TlsChannelCredentials};
    use crate::signer::{AssertionSigner, SignedAssertion, StaticToken};
    use crate::{SDK_VERSION, VERSION_HEADER};
    use std::sync::{Arc, Mutex};
    use tower::{service_fn, ServiceExt};

    struct FailingSigner;

    impl AssertionSigner for FailingSigner {
        fn sign(&self) -> Result<SignedAssertion> {
            Err(SdkError::Signing("key rejected".to_string()))
        }
    }

    fn options(credentials: Option<CallCredentials>) -> ClientOptions {
        ClientOptions {
            credentials,
            interceptors: InterceptorChain::build(),
            config: SdkConfig::default(),
        }
    }

    fn request() -> http::Request<()> {
        http::Request::builder()
            .uri("https://jarvis.local:8043/indykite.config.v1beta1.ConfigManagementAPI/ReadConfigNode")
            .body(())
            .unwrap()
    }

    #[tokio::test]
    async fn test_headers_attached_to_request() {
        let seen = Arc::new(Mutex::new(http::HeaderMap::new()));
        let captured = seen.clone();
        let inner = service_fn(move |req: http::Request<()>| {
            let captured = captured.clone();
            async move {
                *captured.lock().unwrap() = req.headers().clone();
                Ok::<_, BoxError>(http::Response::new(()))
            }
        });

        let creds = CallCredentials::from_signer(Arc::new(StaticToken::new("TOKEN").unwrap()));
        let channel = options(Some(creds)).wrap(inner);
        channel.oneshot(request()).await.unwrap();

        let headers = seen.lock().unwrap();
        assert_eq!(headers.get("authorization").unwrap(), "Bearer TOKEN");
        assert_eq!(headers.get(VERSION_HEADER).unwrap(), SDK_VERSION);
        assert_eq!(headers.get_all(VERSION_HEADER).iter().count(), 1);
    }

    #[tokio::test]
    async fn test_version_header_without_call_credentials() {
        let inner = service_fn(|req: http::Request<()>| async move {
            assert!(req.headers().get("authorization").is_none());
            assert_eq!(req.headers().get(VERSION_HEADER).unwrap(), SDK_VERSION);
            Ok::<_, BoxError>(http::Response::new(()))
        });

        options(None).wrap(inner).oneshot(request()).await.unwrap();
    }

    #[tokio::test]
    async fn test_signer_failure_fails_only_the_call() {
        let inner = service_fn(|_req: http::Request<()>| async move {
            Err::<http::Response<()>, BoxError>("request must not reach the transport".into())
        });

        let creds = CallCredentials::from_signer(Arc::new(FailingSigner));
        let err = options(Some(creds))
            .wrap(inner)
            .oneshot(request())
            .await
            .unwrap_err();

        let sdk = err.downcast_ref::<SdkError>().unwrap();
        assert!(matches!(sdk, SdkError::CallCredential(msg) if msg.contains("key rejected")));
    }

    #[test]
    fn test_service_url() {
        let uri: http::Uri = "https://jarvis.local:8043/pkg.Service/Method".parse().unwrap();
        assert_eq!(service_url(&uri, None), "https://jarvis.local:8043/pkg.Service");
    }

    #[test]
    fn test_service_url_for_path_only_uri() {
        let uri: http::Uri = "/pkg.Service/Method".parse().unwrap();
        assert_eq!(service_url(&uri, None), "/pkg.Service");
        assert_eq!(
            service_url(&uri, Some("https://jarvis.local:8043")),
            "https://jarvis.local:8043/pkg.Service"
        );
    }

    #[tokio::test]
    async fn test_path_only_request_through_endpoint_channel() {
        let inner = service_fn(|req: http::Request<()>| async move {
            assert_eq!(req.headers().get("authorization").unwrap(), "Bearer TOKEN");
            Ok::<_, BoxError>(http::Response::new(()))
        });

        let channel_credentials = TlsChannelCredentials::new(&SdkConfig::default())
            .new_channel_credentials("jarvis.local:8043")
            .unwrap();
        let creds = CallCredentials::from_signer(Arc::new(StaticToken::new("TOKEN").unwrap()));
        let channel = options(Some(creds)).wrap_for(inner, &channel_credentials);
        assert_eq!(channel.origin.as_deref(), Some("https://jarvis.local:8043"));

        let request = http::Request::builder()
            .uri("/indykite.config.v1beta1.ConfigManagementAPI/ReadConfigNode")
            .body(())
            .unwrap();
        channel.oneshot(request).await.unwrap();
    }
}
