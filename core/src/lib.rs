//! Instrumented outbound HTTP for embedding services.
//!
//! # Overview
//! A `Dispatcher` issues GET/POST/PUT/PATCH/DELETE calls through a
//! `reqwest::Client` (plain, or presenting a client certificate) and, when
//! configured to, emits structured log records for each call: method and URL,
//! request and response bodies, duration, status, size, errors, and fields
//! lifted from the caller's `CallContext`.
//!
//! # Design
//! - `HttpConfig` is read once; `DispatchConfig` is its resolved, immutable
//!   snapshot, owned by the dispatcher. There is no global client or config.
//! - Logging goes through the `LogSink` trait. `TracingSink` is the default;
//!   `RecordingSink` keeps records in memory.
//! - A 503 is the only status turned into an error. Every other status comes
//!   back as a `Decodable` for the caller to inspect and decode.
//! - No retries, no caching, no background work: each call runs in the
//!   caller's task and honours its context deadline and cancellation token.
//!
//! ```rust,no_run
//! use instrumented_http::{CallContext, Dispatcher, HttpConfig};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = HttpConfig::load("http.toml", "OUTBOUND_")?;
//! let dispatcher = Dispatcher::from_config(&config)?;
//! let ctx = CallContext::new().with_value("tenant", "acme");
//! let order: serde_json::Value = dispatcher
//!     .post_and_decode(&ctx, "https://orders.internal/v1/orders", r#"{"sku":"A-1"}"#)
//!     .await?;
//! # let _ = order;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod http;
pub mod log;
pub mod payload;
pub mod transport;

pub use config::{DispatchConfig, ExtraFieldSpec, FieldNames, HttpConfig, TlsVersion};
pub use context::{extract_fields, CallContext};
pub use dispatcher::{Decodable, Dispatcher, DispatcherBuilder, Values};
pub use error::{BuildError, DispatchError, ErrorKind, TransportError};
pub use http::{HttpMethod, Headers};
pub use log::{Fields, Level, LogRecord, LogSink, RecordingSink, TracingSink};
pub use payload::Payload;
pub use transport::{build_client, build_tls_client, TlsOptions};
