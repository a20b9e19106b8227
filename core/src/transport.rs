//! Construction of the underlying `reqwest::Client`.
//!
//! Two shapes: a plain client whose server verification follows `insecure`,
//! and a client-certificate client with the protocol version pinned.

use std::fs;
use std::path::Path;
use std::time::Duration;

use reqwest::{Client, Identity};
use tracing::{debug, warn};

use crate::config::{HttpConfig, TlsVersion};
use crate::error::BuildError;

/// TLS settings for the client-certificate transport.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TlsOptions {
    pub skip_verify: bool,
    /// Used as both minimum and maximum version.
    pub version: TlsVersion,
}

impl TlsOptions {
    pub fn from_config(config: &HttpConfig) -> Self {
        TlsOptions {
            skip_verify: config.cert_skip_verify,
            version: config.tls_version,
        }
    }
}

/// Builds the client described by `config`. The client-certificate shape is
/// used when both `cert_file` and `key_file` are set.
pub fn build_client(config: &HttpConfig) -> Result<Client, BuildError> {
    let timeout = client_timeout(config.timeout);
    if let Some((cert_file, key_file)) = config.client_identity_paths() {
        return build_tls_client(cert_file, key_file, timeout, &TlsOptions::from_config(config));
    }

    debug!(insecure = config.insecure, ?timeout, "building http client");
    let mut builder = Client::builder().danger_accept_invalid_certs(config.insecure);
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    builder.build().map_err(BuildError::Client)
}

/// Builds a client that presents the certificate/key pair read from disk.
pub fn build_tls_client(
    cert_file: &Path,
    key_file: &Path,
    timeout: Option<Duration>,
    tls: &TlsOptions,
) -> Result<Client, BuildError> {
    let mut pem = read_pem(cert_file)?;
    pem.push(b'\n');
    pem.extend(read_pem(key_file)?);
    let identity = Identity::from_pem(&pem).map_err(BuildError::CertificateParse)?;

    if tls.skip_verify {
        warn!(cert = %cert_file.display(), "client-certificate transport skips server verification");
    }
    debug!(cert = %cert_file.display(), version = ?tls.version, ?timeout, "building tls client");

    let version = reqwest::tls::Version::from(tls.version);
    let mut builder = Client::builder()
        .use_rustls_tls()
        .identity(identity)
        .danger_accept_invalid_certs(tls.skip_verify)
        .min_tls_version(version)
        .max_tls_version(version);
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    builder.build().map_err(BuildError::Client)
}

/// A positive millisecond count becomes the client deadline; anything else
/// means none.
pub fn client_timeout(millis: i64) -> Option<Duration> {
    u64::try_from(millis)
        .ok()
        .filter(|millis| *millis > 0)
        .map(Duration::from_millis)
}

fn read_pem(path: &Path) -> Result<Vec<u8>, BuildError> {
    fs::read(path).map_err(|source| BuildError::CertificateRead {
        path: path.to_path_buf(),
        source,
    })
}
