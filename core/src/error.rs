//! Error types for client construction and instrumented dispatch.
//!
//! # Design
//! Construction failures (`BuildError`) are kept apart from per-call failures
//! (`DispatchError`) because they happen at different times: the former once
//! at startup, the latter on every call. A 503 gets a dedicated variant; every
//! other status, including other 4xx/5xx, is a successful dispatch and is left
//! for the caller to interpret.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors returned while building the underlying HTTP client.
#[derive(Debug, Error)]
pub enum BuildError {
    /// A client certificate or key file could not be read.
    #[error("failed to read {}: {source}", .path.display())]
    CertificateRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The certificate/key pair could not be parsed into a client identity.
    #[error("failed to load client certificate: {0}")]
    CertificateParse(#[source] reqwest::Error),

    /// The transport itself could not be constructed.
    #[error("failed to build http client: {0}")]
    Client(#[source] reqwest::Error),
}

/// A network-level failure on the way to, or while reading from, the server.
#[derive(Debug, Error)]
pub enum TransportError {
    /// DNS, connect, TLS, timeout or protocol failure reported by the transport.
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    /// The call context's cancellation token fired before the call finished.
    #[error("call context cancelled")]
    Cancelled,

    /// The call context's deadline passed before the call finished.
    #[error("call context deadline exceeded")]
    DeadlineExceeded,
}

impl TransportError {
    /// True when the failure came from a deadline rather than the network.
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout(),
            Self::DeadlineExceeded => true,
            Self::Cancelled => false,
        }
    }
}

/// Flat classification of a `DispatchError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Marshal,
    Transport,
    BodyRead,
    ServiceUnavailable,
    Decode,
}

/// Errors returned by `Dispatcher` calls.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The payload could not be serialized; nothing was sent.
    #[error("failed to marshal request body: {0}")]
    Marshal(#[source] serde_json::Error),

    /// The request never produced a response.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A response arrived but its body could not be read in full.
    #[error("failed to read response body: {0}")]
    BodyRead(#[source] TransportError),

    /// The server answered 503. Never retried.
    #[error("503 Service Unavailable")]
    ServiceUnavailable,

    /// The buffered body did not decode into the requested type.
    #[error("failed to decode response body: {0}")]
    Decode(#[source] serde_json::Error),
}

impl DispatchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Marshal(_) => ErrorKind::Marshal,
            Self::Transport(_) => ErrorKind::Transport,
            Self::BodyRead(_) => ErrorKind::BodyRead,
            Self::ServiceUnavailable => ErrorKind::ServiceUnavailable,
            Self::Decode(_) => ErrorKind::Decode,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_unavailable_display_matches_status_line() {
        assert_eq!(
            DispatchError::ServiceUnavailable.to_string(),
            "503 Service Unavailable"
        );
    }

    #[test]
    fn cancelled_transport_error_is_transport_kind() {
        let err = DispatchError::from(TransportError::Cancelled);
        assert_eq!(err.kind(), ErrorKind::Transport);
        assert_eq!(err.to_string(), "call context cancelled");
    }

    #[test]
    fn deadline_exceeded_counts_as_timeout() {
        assert!(TransportError::DeadlineExceeded.is_timeout());
        assert!(!TransportError::Cancelled.is_timeout());
        let err = DispatchError::BodyRead(TransportError::DeadlineExceeded);
        assert_eq!(err.kind(), ErrorKind::BodyRead);
    }

    #[test]
    fn certificate_read_names_the_path() {
        let err = BuildError::CertificateRead {
            path: PathBuf::from("/nope/client.pem"),
            source: io::Error::new(io::ErrorKind::NotFound, "missing"),
        };
        assert!(err.to_string().contains("/nope/client.pem"));
    }

    #[test]
    fn marshal_and_decode_kinds() {
        let json_err = serde_json::from_str::<u8>("x").unwrap_err();
        assert_eq!(DispatchError::Marshal(json_err).kind(), ErrorKind::Marshal);
        let json_err = serde_json::from_str::<u8>("x").unwrap_err();
        assert_eq!(DispatchError::Decode(json_err).kind(), ErrorKind::Decode);
    }
}
