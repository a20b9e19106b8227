//! Instrumented dispatch: one call, its log records, and a decodable result.
//!
//! # Design
//! With logging off (or no sink, or the sink's info level disabled) a call is
//! a bare `execute` plus the 503 check, and the response body is handed to
//! the caller unread. With logging on, the body is buffered so it can be both
//! logged and decoded.
//!
//! Record layout per call:
//! - split mode (`single = false`): an info record with the request body
//!   before the call, then one record with duration, status, size, response
//!   and any error after it.
//! - single mode: only the post-call record, which also carries the request.
//!
//! Every record gets the context fields configured in `ExtraFieldSpec`.
//! Exactly 503 is a failure; any other status is returned to the caller.

use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::config::{DispatchConfig, HttpConfig};
use crate::context::{extract_fields, CallContext};
use crate::error::{BuildError, DispatchError, TransportError};
use crate::http::{self, bounded, Headers, HttpMethod};
use crate::log::{Fields, Level, LogRecord, LogSink, TracingSink};
use crate::payload::{self, Payload};
use crate::transport::build_client;

/// Issues calls with a fixed configuration, default client and log sink.
///
/// Cheap to clone; clones share the client's connection pool.
#[derive(Clone)]
pub struct Dispatcher {
    config: Arc<DispatchConfig>,
    client: Client,
    sink: Option<Arc<dyn LogSink>>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("config", &self.config)
            .field("sink", &self.sink.is_some())
            .finish()
    }
}

pub struct DispatcherBuilder {
    config: DispatchConfig,
    client: Option<Client>,
    sink: Option<Arc<dyn LogSink>>,
}

impl DispatcherBuilder {
    pub fn client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    pub fn sink(self, sink: impl LogSink + 'static) -> Self {
        self.shared_sink(Arc::new(sink))
    }

    pub fn shared_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Falls back to a default `reqwest::Client` when none was given.
    pub fn build(self) -> Result<Dispatcher, BuildError> {
        let client = match self.client {
            Some(client) => client,
            None => Client::builder().build().map_err(BuildError::Client)?,
        };
        Ok(Dispatcher {
            config: Arc::new(self.config),
            client,
            sink: self.sink,
        })
    }
}

impl Dispatcher {
    pub fn builder(config: DispatchConfig) -> DispatcherBuilder {
        DispatcherBuilder {
            config,
            client: None,
            sink: None,
        }
    }

    /// Resolves `raw`, builds its transport and logs through `tracing`.
    pub fn from_config(raw: &HttpConfig) -> Result<Self, BuildError> {
        Self::builder(DispatchConfig::resolve(raw))
            .client(build_client(raw)?)
            .sink(TracingSink)
            .build()
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// The client used when a call does not supply its own.
    pub fn client(&self) -> &Client {
        &self.client
    }

    pub async fn dispatch(
        &self,
        ctx: &CallContext,
        method: HttpMethod,
        url: &str,
        payload: Option<&Payload>,
        headers: Option<&Headers>,
    ) -> Result<Decodable, DispatchError> {
        self.dispatch_with_client(&self.client, ctx, method, url, payload, headers)
            .await
    }

    pub async fn dispatch_with_client(
        &self,
        client: &Client,
        ctx: &CallContext,
        method: HttpMethod,
        url: &str,
        payload: Option<&Payload>,
        headers: Option<&Headers>,
    ) -> Result<Decodable, DispatchError> {
        let body = payload::marshal(payload)?;
        match self.active_sink() {
            Some(sink) => {
                let call = LoggedCall {
                    config: &self.config,
                    sink,
                    message: format!("{method} {url}"),
                    extra: extract_fields(ctx, &self.config.extra),
                };
                call.run(client, ctx, method, url, body, headers).await
            }
            None => {
                let response = http::execute(client, method, url, body, headers, ctx).await?;
                if response.status() == StatusCode::SERVICE_UNAVAILABLE {
                    return Err(DispatchError::ServiceUnavailable);
                }
                Ok(Decodable::streaming(response, ctx))
            }
        }
    }

    fn active_sink(&self) -> Option<&dyn LogSink> {
        if !self.config.log {
            return None;
        }
        self.sink
            .as_deref()
            .filter(|sink| sink.enabled(Level::Info))
    }
}

/// Per-call logging state. Lives for one dispatch only.
struct LoggedCall<'a> {
    config: &'a DispatchConfig,
    sink: &'a dyn LogSink,
    message: String,
    extra: Fields,
}

impl LoggedCall<'_> {
    async fn run(
        self,
        client: &Client,
        ctx: &CallContext,
        method: HttpMethod,
        url: &str,
        body: Option<Bytes>,
        headers: Option<&Headers>,
    ) -> Result<Decodable, DispatchError> {
        let names = &self.config.names;
        let request = body
            .as_ref()
            .map(|body| String::from_utf8_lossy(body).into_owned());

        if !self.config.single {
            if let Some(request) = &request {
                let mut fields = Fields::new();
                insert_non_empty(&mut fields, &names.request, request);
                self.emit(Level::Info, fields);
            }
        }

        let start = Instant::now();
        let result = http::execute(client, method, url, body, headers, ctx).await;
        let elapsed = start.elapsed();

        let mut fields = Fields::new();
        fields.insert(
            names.duration.clone(),
            Value::from(u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)),
        );
        if self.config.single {
            if let Some(request) = &request {
                insert_non_empty(&mut fields, &names.request, request);
            }
        }

        let response = match result {
            Ok(response) => response,
            Err(err) => {
                fields.insert(names.error.clone(), Value::from(err.to_string()));
                self.emit(Level::Error, fields);
                return Err(DispatchError::Transport(err));
            }
        };

        let status = response.status();
        fields.insert(names.status.clone(), Value::from(status.as_u16()));
        fields.insert(
            names.size.clone(),
            response
                .content_length()
                .map_or(Value::from(-1), Value::from),
        );

        let bytes = match read_body(response, ctx.deadline(), ctx.cancellation()).await {
            Ok(bytes) => bytes,
            Err(err) => {
                fields.insert(names.error.clone(), Value::from(err.to_string()));
                self.emit(Level::Error, fields);
                return Err(DispatchError::BodyRead(err));
            }
        };
        insert_non_empty(&mut fields, &names.response, &String::from_utf8_lossy(&bytes));

        if status == StatusCode::SERVICE_UNAVAILABLE {
            let err = DispatchError::ServiceUnavailable;
            fields.insert(names.error.clone(), Value::from(err.to_string()));
            self.emit(Level::Error, fields);
            return Err(err);
        }

        self.emit(Level::Info, fields);
        Ok(Decodable::buffered(status, bytes))
    }

    fn emit(&self, level: Level, mut fields: Fields) {
        fields.extend(self.extra.clone());
        self.sink.emit(&LogRecord {
            level,
            message: self.message.clone(),
            fields,
        });
    }
}

fn insert_non_empty(fields: &mut Fields, name: &str, value: &str) {
    if !value.is_empty() {
        fields.insert(name.to_string(), Value::from(value));
    }
}

async fn read_body(
    response: Response,
    deadline: Option<tokio::time::Instant>,
    cancel: Option<&CancellationToken>,
) -> Result<Bytes, TransportError> {
    bounded(deadline, cancel, async {
        response.bytes().await.map_err(TransportError::from)
    })
    .await
}

/// A successful dispatch, ready to be decoded by the caller.
///
/// Holds the buffered body when the call was logged, otherwise the live
/// response whose body is read on first use. Decoding reads the first JSON
/// value and ignores anything after it.
#[derive(Debug)]
pub struct Decodable {
    status: StatusCode,
    body: Body,
}

#[derive(Debug)]
enum Body {
    Buffered(Bytes),
    Streaming {
        response: Response,
        deadline: Option<tokio::time::Instant>,
        cancel: Option<CancellationToken>,
    },
}

impl Decodable {
    pub(crate) fn buffered(status: StatusCode, bytes: Bytes) -> Self {
        Decodable {
            status,
            body: Body::Buffered(bytes),
        }
    }

    /// Keeps the call's deadline and cancellation for the deferred body read.
    pub(crate) fn streaming(response: Response, ctx: &CallContext) -> Self {
        Decodable {
            status: response.status(),
            body: Body::Streaming {
                response,
                deadline: ctx.deadline(),
                cancel: ctx.cancellation().cloned(),
            },
        }
    }

    /// Status of the response. Only 503 is turned into an error by the
    /// dispatcher; everything else has to be checked here.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// The body, if it has already been read into memory.
    pub fn buffered_body(&self) -> Option<&Bytes> {
        match &self.body {
            Body::Buffered(bytes) => Some(bytes),
            Body::Streaming { .. } => None,
        }
    }

    pub async fn bytes(self) -> Result<Bytes, DispatchError> {
        match self.body {
            Body::Buffered(bytes) => Ok(bytes),
            Body::Streaming {
                response,
                deadline,
                cancel,
            } => read_body(response, deadline, cancel.as_ref())
                .await
                .map_err(DispatchError::BodyRead),
        }
    }

    pub async fn text(self) -> Result<String, DispatchError> {
        let bytes = self.bytes().await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    pub async fn decode<T: DeserializeOwned>(self) -> Result<T, DispatchError> {
        let bytes = self.bytes().await?;
        let mut de = serde_json::Deserializer::from_slice(&bytes);
        <T as serde::Deserialize>::deserialize(&mut de).map_err(DispatchError::Decode)
    }

    /// Every JSON value in the body, decoded lazily one after another.
    pub async fn values<T: DeserializeOwned>(self) -> Result<Values<T>, DispatchError> {
        Ok(Values::new(self.bytes().await?))
    }
}

/// Lazy iterator over consecutive JSON values in a buffered body.
///
/// Stops after the first decode error.
pub struct Values<T> {
    bytes: Bytes,
    offset: usize,
    failed: bool,
    _marker: std::marker::PhantomData<fn() -> T>,
}

impl<T> Values<T> {
    fn new(bytes: Bytes) -> Self {
        Values {
            bytes,
            offset: 0,
            failed: false,
            _marker: std::marker::PhantomData,
        }
    }
}

impl<T: DeserializeOwned> Iterator for Values<T> {
    type Item = Result<T, DispatchError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let mut stream =
            serde_json::Deserializer::from_slice(&self.bytes[self.offset..]).into_iter::<T>();
        let item = stream.next()?;
        self.offset += stream.byte_offset();
        if item.is_err() {
            self.failed = true;
        }
        Some(item.map_err(DispatchError::Decode))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::RecordingSink;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct N {
        n: u32,
    }

    fn config(log: bool, single: bool) -> DispatchConfig {
        DispatchConfig {
            log,
            single,
            ..DispatchConfig::default()
        }
    }

    #[test]
    fn sink_is_inactive_without_log_flag() {
        let dispatcher = Dispatcher::builder(config(false, false))
            .sink(RecordingSink::new())
            .build()
            .unwrap();
        assert!(dispatcher.active_sink().is_none());
    }

    #[test]
    fn sink_is_inactive_when_info_disabled() {
        let dispatcher = Dispatcher::builder(config(true, false))
            .sink(RecordingSink::disabled())
            .build()
            .unwrap();
        assert!(dispatcher.active_sink().is_none());
    }

    #[test]
    fn sink_is_active_with_flag_and_enabled_sink() {
        let dispatcher = Dispatcher::builder(config(true, true))
            .sink(RecordingSink::new())
            .build()
            .unwrap();
        assert!(dispatcher.active_sink().is_some());
        let no_sink = Dispatcher::builder(config(true, true)).build().unwrap();
        assert!(no_sink.active_sink().is_none());
    }

    #[tokio::test]
    async fn decode_reads_first_value_only() {
        let decodable =
            Decodable::buffered(StatusCode::OK, Bytes::from_static(br#"{"n":1} {"n":2}"#));
        let first: N = decodable.decode().await.unwrap();
        assert_eq!(first, N { n: 1 });
    }

    #[tokio::test]
    async fn decode_of_empty_body_is_a_decode_error() {
        let decodable = Decodable::buffered(StatusCode::NO_CONTENT, Bytes::new());
        let err = decodable.decode::<N>().await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Decode);
    }

    #[tokio::test]
    async fn values_walk_every_document_and_stop_on_error() {
        let decodable = Decodable::buffered(
            StatusCode::OK,
            Bytes::from_static(br#"{"n":1}{"n":2} oops {"n":3}"#),
        );
        let values: Vec<_> = decodable.values::<N>().await.unwrap().collect();
        assert_eq!(values.len(), 3);
        assert_eq!(values[0].as_ref().unwrap(), &N { n: 1 });
        assert_eq!(values[1].as_ref().unwrap(), &N { n: 2 });
        assert!(values[2].is_err());
    }

    #[tokio::test]
    async fn buffered_body_is_exposed_with_status() {
        let decodable =
            Decodable::buffered(StatusCode::NOT_FOUND, Bytes::from_static(b"missing"));
        assert_eq!(decodable.status(), StatusCode::NOT_FOUND);
        assert_eq!(decodable.buffered_body().unwrap().as_ref(), b"missing");
        assert_eq!(decodable.text().await.unwrap(), "missing");
    }
}
