//! Configuration for the dispatcher and its transport.
//!
//! # Design
//! `HttpConfig` is the raw, deserializable form, keyed the way embedding
//! services already write it (`cert_file`, `status`, `field_map`, ...).
//! `DispatchConfig` is the resolved snapshot a `Dispatcher` holds: default
//! field names filled in and the extra-field list split, once, at build time.

use std::path::{Path, PathBuf};

use figment::providers::{Env, Format, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

/// Protocol version pinned (as both minimum and maximum) on the
/// client-certificate transport.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TlsVersion {
    #[default]
    #[serde(rename = "1.2")]
    Tls12,
    #[serde(rename = "1.3")]
    Tls13,
}

impl From<TlsVersion> for reqwest::tls::Version {
    fn from(version: TlsVersion) -> Self {
        match version {
            TlsVersion::Tls12 => reqwest::tls::Version::TLS_1_2,
            TlsVersion::Tls13 => reqwest::tls::Version::TLS_1_3,
        }
    }
}

/// Raw configuration, applied once at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Skip server certificate verification on the plain transport.
    pub insecure: bool,
    /// Overall per-call deadline in milliseconds; `<= 0` disables it.
    pub timeout: i64,
    pub cert_file: Option<PathBuf>,
    pub key_file: Option<PathBuf>,
    /// Skip server certificate verification on the client-certificate transport.
    pub cert_skip_verify: bool,
    pub tls_version: TlsVersion,
    /// Emit log records for each call.
    pub log: bool,
    /// Put request and response in one record instead of two.
    pub single: bool,
    pub duration: String,
    pub size: String,
    pub status: String,
    pub request: String,
    pub response: String,
    pub error: String,
    /// Comma-separated context keys copied into every record.
    pub fields: String,
    /// Context key holding a map of extra fields merged into every record.
    pub field_map: String,
}

impl HttpConfig {
    /// Layers a TOML file and `env_prefix`-prefixed environment variables,
    /// the latter taking precedence. A missing file is not an error.
    pub fn load<P: AsRef<Path>>(path: P, env_prefix: &str) -> figment::error::Result<Self> {
        Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed(env_prefix))
            .extract()
    }

    /// The certificate/key pair, when both are set and non-empty.
    pub fn client_identity_paths(&self) -> Option<(&Path, &Path)> {
        match (&self.cert_file, &self.key_file) {
            (Some(cert), Some(key))
                if !cert.as_os_str().is_empty() && !key.as_os_str().is_empty() =>
            {
                Some((cert.as_path(), key.as_path()))
            }
            _ => None,
        }
    }
}

/// Log field names after defaults are applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldNames {
    pub duration: String,
    pub request: String,
    pub response: String,
    pub status: String,
    pub size: String,
    pub error: String,
}

impl Default for FieldNames {
    fn default() -> Self {
        FieldNames {
            duration: "duration".to_string(),
            request: "request".to_string(),
            response: "response".to_string(),
            status: "status".to_string(),
            size: "size".to_string(),
            error: "error".to_string(),
        }
    }
}

/// Context keys surfaced as extra log fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtraFieldSpec {
    /// Keys whose non-empty string values are copied, in order.
    pub names: Vec<String>,
    /// Key holding a map merged wholesale into the record.
    pub field_map: Option<String>,
}

impl ExtraFieldSpec {
    /// Splits a comma-separated list. Duplicates are kept; an empty string
    /// yields no names.
    pub fn parse(fields: &str, field_map: &str) -> Self {
        let names = if fields.is_empty() {
            Vec::new()
        } else {
            fields.split(',').map(str::to_string).collect()
        };
        ExtraFieldSpec {
            names,
            field_map: non_empty(field_map),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty() && self.field_map.is_none()
    }
}

/// Resolved, immutable snapshot held by a `Dispatcher`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchConfig {
    pub log: bool,
    pub single: bool,
    pub names: FieldNames,
    pub extra: ExtraFieldSpec,
}

impl DispatchConfig {
    pub fn resolve(raw: &HttpConfig) -> Self {
        let defaults = FieldNames::default();
        DispatchConfig {
            log: raw.log,
            single: raw.single,
            names: FieldNames {
                duration: or_default(&raw.duration, defaults.duration),
                request: or_default(&raw.request, defaults.request),
                response: or_default(&raw.response, defaults.response),
                status: or_default(&raw.status, defaults.status),
                size: or_default(&raw.size, defaults.size),
                error: or_default(&raw.error, defaults.error),
            },
            extra: ExtraFieldSpec::parse(&raw.fields, &raw.field_map),
        }
    }
}

fn or_default(value: &str, default: String) -> String {
    non_empty(value).unwrap_or(default)
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}
