use axum::body::Bytes;
use axum::http::{self, Request, StatusCode};
use http_body_util::BodyExt;
use mock_server::{app, Inspection, StatusBody};
use tower::ServiceExt;

async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

fn json_request(method: &str, uri: &str, body: &str) -> Request<String> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(body.to_string())
        .unwrap()
}

fn empty_request(method: &str, uri: &str) -> Request<String> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(String::new())
        .unwrap()
}

// --- echo ---

#[tokio::test]
async fn echo_returns_body_verbatim() {
    let resp = app()
        .oneshot(json_request("POST", "/echo", "0123456789"))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_bytes(resp).await.as_ref(), b"0123456789");
}

#[tokio::test]
async fn echo_accepts_any_method() {
    for method in ["GET", "PUT", "PATCH", "DELETE"] {
        let resp = app().oneshot(empty_request(method, "/echo")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK, "{method}");
        assert!(body_bytes(resp).await.is_empty(), "{method}");
    }
}

// --- inspect ---

#[tokio::test]
async fn inspect_reports_method_headers_and_body() {
    let request = Request::builder()
        .method("PATCH")
        .uri("/inspect")
        .header("x-tenant", "acme")
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(r#"{"a":1}"#.to_string())
        .unwrap();
    let resp = app().oneshot(request).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let seen: Inspection = body_json(resp).await;
    assert_eq!(seen.method, "PATCH");
    assert_eq!(seen.headers["x-tenant"], vec!["acme".to_string()]);
    assert_eq!(seen.headers["content-type"], vec!["application/json".to_string()]);
    assert_eq!(seen.body, r#"{"a":1}"#);
}

// --- status ---

#[tokio::test]
async fn status_returns_requested_code_with_body() {
    let resp = app().oneshot(empty_request("GET", "/status/503")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: StatusBody = body_json(resp).await;
    assert_eq!(body, StatusBody { status: 503 });
}

#[tokio::test]
async fn status_rejects_out_of_range_code() {
    let resp = app().oneshot(empty_request("GET", "/status/1000")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn empty_returns_code_without_body() {
    let resp = app().oneshot(empty_request("DELETE", "/empty/503")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert!(body_bytes(resp).await.is_empty());
}

// --- slow ---

#[tokio::test]
async fn slow_waits_then_answers() {
    let resp = app().oneshot(empty_request("GET", "/slow/10")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let body: serde_json::Value = body_json(resp).await;
    assert_eq!(body["slept"], 10);
}

// --- broken ---

#[tokio::test]
async fn broken_body_fails_mid_stream() {
    let resp = app().oneshot(empty_request("GET", "/broken")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.into_body().collect().await.is_err());
}

// --- trickle ---

#[tokio::test]
async fn trickle_completes_the_document_late() {
    let resp = app().oneshot(empty_request("GET", "/trickle/10")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let body: serde_json::Value = body_json(resp).await;
    assert_eq!(body["slept"], 10);
}

// --- stream ---

#[tokio::test]
async fn stream_returns_two_documents() {
    let resp = app().oneshot(empty_request("GET", "/stream")).await.unwrap();

    let bytes = body_bytes(resp).await;
    let values: Vec<serde_json::Value> = serde_json::Deserializer::from_slice(&bytes)
        .into_iter()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(values.len(), 2);
    assert_eq!(values[1]["n"], 2);
}
