//! Request execution: one outbound call bound to a `CallContext`.
//!
//! # Design
//! `execute` is the only place the crate touches the network. It does no
//! logging and no status interpretation; it returns the raw response or the
//! transport failure. The context deadline and cancellation token are raced
//! against the send; the client's own timeout stays in force alongside them.

use std::fmt;
use std::future::Future;

use bytes::Bytes;
use reqwest::header::{HeaderValue, CONTENT_TYPE};
use reqwest::{Client, Response};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::context::CallContext;
use crate::error::TransportError;

/// HTTP method for a dispatched call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
        }
    }
}

/// Header name/value pairs added to a request, in order.
pub type Headers = [(String, String)];

/// Sends one request.
///
/// Caller headers are appended first; `Content-Type: application/json` is
/// then set unconditionally, replacing any caller value. The body is sent
/// as-is.
pub async fn execute(
    client: &Client,
    method: HttpMethod,
    url: &str,
    body: Option<Bytes>,
    headers: Option<&Headers>,
    ctx: &CallContext,
) -> Result<Response, TransportError> {
    let mut builder = client.request(method.into(), url);
    if let Some(headers) = headers {
        for (name, value) in headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
    }
    if let Some(body) = body {
        builder = builder.body(body);
    }

    let mut request = builder.build()?;
    request
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    bounded(ctx.deadline(), ctx.cancellation(), async {
        client.execute(request).await.map_err(TransportError::from)
    })
    .await
}

/// Runs `fut` unless `deadline` passes or `cancel` fires first.
pub(crate) async fn bounded<T, F>(
    deadline: Option<Instant>,
    cancel: Option<&CancellationToken>,
    fut: F,
) -> Result<T, TransportError>
where
    F: Future<Output = Result<T, TransportError>>,
{
    let fut = async move {
        match deadline {
            Some(deadline) => match tokio::time::timeout_at(deadline, fut).await {
                Ok(result) => result,
                Err(_) => Err(TransportError::DeadlineExceeded),
            },
            None => fut.await,
        }
    };
    match cancel {
        Some(token) => tokio::select! {
            biased;
            _ = token.cancelled() => Err(TransportError::Cancelled),
            result = fut => result,
        },
        None => fut.await,
    }
}

pub async fn do_get(
    ctx: &CallContext,
    client: &Client,
    url: &str,
    headers: Option<&Headers>,
) -> Result<Response, TransportError> {
    execute(client, HttpMethod::Get, url, None, headers, ctx).await
}

pub async fn do_delete(
    ctx: &CallContext,
    client: &Client,
    url: &str,
    headers: Option<&Headers>,
) -> Result<Response, TransportError> {
    execute(client, HttpMethod::Delete, url, None, headers, ctx).await
}

pub async fn do_post(
    ctx: &CallContext,
    client: &Client,
    url: &str,
    body: Bytes,
    headers: Option<&Headers>,
) -> Result<Response, TransportError> {
    execute(client, HttpMethod::Post, url, Some(body), headers, ctx).await
}

pub async fn do_put(
    ctx: &CallContext,
    client: &Client,
    url: &str,
    body: Bytes,
    headers: Option<&Headers>,
) -> Result<Response, TransportError> {
    execute(client, HttpMethod::Put, url, Some(body), headers, ctx).await
}

pub async fn do_patch(
    ctx: &CallContext,
    client: &Client,
    url: &str,
    body: Bytes,
    headers: Option<&Headers>,
) -> Result<Response, TransportError> {
    execute(client, HttpMethod::Patch, url, Some(body), headers, ctx).await
}
