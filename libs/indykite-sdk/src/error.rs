//! SDK error taxonomy
//!
//! Every failure in credential resolution, signing, channel construction and
//! call execution is reported as one `SdkError` variant so callers can match on
//! the kind instead of parsing messages.

use thiserror::Error;
use tonic::Code;

pub type Result<T> = std::result::Result<T, SdkError>;

/// Errors produced by the SDK core
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SdkError {
    /// No credential source was found (argument, inline env, or env file)
    #[error("missing application credentials")]
    MissingCredentials,

    /// A credential source was found but could not be parsed or is incomplete
    #[error("malformed application credentials: {0}")]
    MalformedCredentials(String),

    /// The private key is unusable or the signing primitive failed
    #[error("failed to sign assertion: {0}")]
    Signing(String),

    /// Empty static bearer token
    #[error("invalid token: {0}")]
    InvalidToken(String),

    /// Secure channel credentials could not be constructed
    #[error("transport credential error: {0}")]
    TransportCredential(String),

    /// Per-call metadata generation failed for an in-flight call
    #[error("call credential error: {0}")]
    CallCredential(String),

    /// Non-OK terminal status of an RPC
    #[error("rpc failed with {code:?}: {message}")]
    RpcStatus {
        kind: RpcErrorKind,
        code: Code,
        message: String,
    },
}

/// Coarse classification of non-OK RPC statuses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RpcErrorKind {
    /// The backend rejected the presented credentials
    Unauthenticated,
    PermissionDenied,
    InvalidArgument,
    NotFound,
    AlreadyExists,
    /// The backend could not be reached or is overloaded; may be retried by the caller
    Unavailable,
    DeadlineExceeded,
    Cancelled,
    /// Any other status code
    Internal,
}

impl RpcErrorKind {
    pub fn from_code(code: Code) -> Self {
        match code {
            Code::Unauthenticated => Self::Unauthenticated,
            Code::PermissionDenied => Self::PermissionDenied,
            Code::InvalidArgument | Code::OutOfRange | Code::FailedPrecondition => {
                Self::InvalidArgument
            }
            Code::NotFound => Self::NotFound,
            Code::AlreadyExists | Code::Aborted => Self::AlreadyExists,
            Code::Unavailable | Code::ResourceExhausted => Self::Unavailable,
            Code::DeadlineExceeded => Self::DeadlineExceeded,
            Code::Cancelled => Self::Cancelled,
            _ => Self::Internal,
        }
    }
}

impl SdkError {
    /// Build an `RpcStatus` error from a raw status code and message
    pub fn rpc_status(code: Code, message: impl Into<String>) -> Self {
        Self::RpcStatus {
            kind: RpcErrorKind::from_code(code),
            code,
            message: message.into(),
        }
    }

    /// True when the backend rejected the call's credentials
    pub fn is_unauthenticated(&self) -> bool {
        matches!(
            self,
            Self::RpcStatus {
                kind: RpcErrorKind::Unauthenticated,
                ..
            }
        )
    }
}
