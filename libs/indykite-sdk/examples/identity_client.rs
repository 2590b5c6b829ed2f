//! Identity-mode client example
//!
//! Run with: cargo run --example identity_client -- <token> <host:port>
//!
//! Builds a client around a lazily connected TLS channel and prints the
//! metadata every call would carry. Nothing is dialed.

use indykite_sdk::{
    AuthChannel, CallContext, ChannelCredentials, ClientOptions, SdkClient, ServiceStub,
};
use tonic::transport::Channel;

/// Minimal stand-in for a generated tonic client
#[derive(Clone)]
struct IdentityManagementClient {
    #[allow(dead_code)]
    channel: AuthChannel<Channel>,
    options: ClientOptions,
}

impl ServiceStub for IdentityManagementClient {
    fn from_parts(
        _endpoint: &str,
        channel_credentials: ChannelCredentials,
        options: ClientOptions,
    ) -> indykite_sdk::Result<Self> {
        Ok(Self {
            channel: options.connect_lazy(&channel_credentials)?,
            options,
        })
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Setup logging
    tracing_subscriber::fmt::init();

    let mut args = std::env::args().skip(1);
    let token = args.next().unwrap_or_else(|| "TOKEN".to_string());
    let endpoint = args.next().unwrap_or_else(|| "jarvis.local:8043".to_string());

    println!("=== IndyKite identity client ===\n");

    let sdk = SdkClient::<IdentityManagementClient>::create_identity_instance(&token, &endpoint)
        .await?;
    println!("✓ Client created for {endpoint}");
    println!("  interceptors: {:?}", sdk.interceptors());

    if let Some(credentials) = &sdk.client().options.credentials {
        let metadata = credentials
            .generate_metadata(&CallContext::new(format!("https://{endpoint}")))
            .await?;
        for key in ["authorization", indykite_sdk::VERSION_HEADER] {
            if let Some(value) = metadata.get(key) {
                println!("  {key}: {}", value.to_str()?);
            }
        }
    }

    Ok(())
}
