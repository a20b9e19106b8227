use std::{collections::BTreeMap, io, time::Duration};

use axum::{
    body::{Body, Bytes},
    extract::Path,
    http::{HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;

/// What `/inspect` saw of the incoming request.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Inspection {
    pub method: String,
    pub headers: BTreeMap<String, Vec<String>>,
    pub body: String,
}

/// Body returned by `/status/{code}`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusBody {
    pub status: u16,
}

pub fn app() -> Router {
    Router::new()
        .route("/echo", any(echo))
        .route("/inspect", any(inspect))
        .route("/status/{code}", any(status))
        .route("/empty/{code}", any(empty))
        .route("/slow/{millis}", any(slow))
        .route("/broken", any(broken))
        .route("/trickle/{millis}", any(trickle))
        .route("/stream", any(stream))
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn echo(body: Bytes) -> Bytes {
    body
}

async fn inspect(method: Method, headers: HeaderMap, body: Bytes) -> Json<Inspection> {
    let mut seen: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in &headers {
        seen.entry(name.as_str().to_string())
            .or_default()
            .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
    }
    Json(Inspection {
        method: method.as_str().to_string(),
        headers: seen,
        body: String::from_utf8_lossy(&body).into_owned(),
    })
}

async fn status(Path(code): Path<u16>) -> Result<(StatusCode, Json<StatusBody>), StatusCode> {
    let status = StatusCode::from_u16(code).map_err(|_| StatusCode::BAD_REQUEST)?;
    Ok((status, Json(StatusBody { status: code })))
}

async fn empty(Path(code): Path<u16>) -> StatusCode {
    StatusCode::from_u16(code).unwrap_or(StatusCode::BAD_REQUEST)
}

async fn slow(Path(millis): Path<u64>) -> Json<serde_json::Value> {
    tokio::time::sleep(Duration::from_millis(millis)).await;
    Json(serde_json::json!({ "slept": millis }))
}

/// Sends one chunk, waits long enough for the headers and that chunk to be
/// flushed, then aborts the body so the client sees a read failure.
async fn broken() -> Response {
    let chunks = futures::stream::unfold(0u8, |step| async move {
        match step {
            0 => Some((Ok::<_, io::Error>(Bytes::from_static(b"{\"partial\":")), 1)),
            1 => {
                tokio::time::sleep(Duration::from_millis(50)).await;
                let err = io::Error::new(io::ErrorKind::ConnectionReset, "body aborted");
                Some((Err(err), 2))
            }
            _ => None,
        }
    });
    Body::from_stream(chunks).into_response()
}

/// Sends the headers and half a document at once, the rest after `millis`.
async fn trickle(Path(millis): Path<u64>) -> Response {
    let chunks = futures::stream::unfold(0u8, move |step| async move {
        match step {
            0 => Some((Ok::<_, io::Error>(Bytes::from_static(b"{\"slept\":")), 1)),
            1 => {
                tokio::time::sleep(Duration::from_millis(millis)).await;
                Some((Ok(Bytes::from(format!("{millis}}}"))), 2))
            }
            _ => None,
        }
    });
    Body::from_stream(chunks).into_response()
}

/// Two JSON documents back to back.
async fn stream() -> &'static str {
    r#"{"n":1} {"n":2}"#
}
