//! HTTP transport against local sockets

use std::time::Duration;

use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_test::{assert_err, assert_ok};

use screenwright::core::{ModelConfig, RetryConfig, ScreenwrightError, WireStyle};
use screenwright::llm::{HttpTransport, ModelTransport, RetryPolicy};

/// Serve exactly one request with `status` and `body`, returning the raw request
async fn serve_once(status: &'static str, body: String) -> (String, tokio::task::JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}/v1/chat/completions", listener.local_addr().unwrap());

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let n = socket.read(&mut buf).await.unwrap();
            request.extend_from_slice(&buf[..n]);
            let text = String::from_utf8_lossy(&request).to_string();
            if let Some(end) = text.find("\r\n\r\n") {
                let length = text[..end]
                    .lines()
                    .find_map(|l| l.to_ascii_lowercase().strip_prefix("content-length:").map(|v| v.trim().parse::<usize>().unwrap()))
                    .unwrap_or(0);
                if request.len() >= end + 4 + length {
                    break;
                }
            }
            if n == 0 {
                break;
            }
        }

        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        String::from_utf8_lossy(&request).to_string()
    });

    (url, handle)
}

fn fast_retry(attempts: u32) -> RetryPolicy {
    RetryPolicy::new(attempts, Duration::ZERO)
}

#[tokio::test]
async fn test_closed_port_exhausts_retries() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}/v1/chat/completions", listener.local_addr().unwrap());
    drop(listener);

    let transport = HttpTransport::from_config(&ModelConfig::openai(url, "m"), &RetryConfig::default())
        .unwrap()
        .with_retry(fast_retry(3));

    let err = assert_err!(
        transport
            .send(&[json!({"role": "user", "content": []})], Duration::from_secs(2))
            .await
    );

    match err {
        ScreenwrightError::Transport(msg) => assert!(msg.contains("after 3 attempts")),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_openai_round_trip() {
    let body = json!({
        "choices": [{ "message": { "role": "assistant", "content": "```DONE```" } }]
    })
    .to_string();
    let (url, server) = serve_once("200 OK", body).await;

    let mut model = ModelConfig::openai(url, "actor-model");
    model.api_key = Some("secret".into());
    let transport = HttpTransport::from_config(&model, &RetryConfig::default()).unwrap();

    let response = assert_ok!(
        transport
            .send(&[json!({"role": "user", "content": [{"type": "text", "text": "hi"}]})], Duration::from_secs(5))
            .await
    );
    let message = transport.access(&response).unwrap();
    assert_eq!(message.text(), Some("```DONE```"));

    let request = server.await.unwrap();
    assert!(request.to_ascii_lowercase().contains("authorization: bearer secret"));
    assert!(request.contains("\"model\":\"actor-model\""));
}

#[tokio::test]
async fn test_error_status_is_returned_not_retried() {
    let (url, server) = serve_once("503 Service Unavailable", "{\"error\":\"busy\"}".into()).await;
    let transport = HttpTransport::from_config(&ModelConfig::openai(url, "m"), &RetryConfig::default())
        .unwrap()
        .with_retry(fast_retry(5));

    let response = transport
        .send(&[json!({"role": "user", "content": []})], Duration::from_secs(5))
        .await
        .unwrap();

    assert_eq!(response.status, 503);
    assert!(transport.access(&response).is_none());
    server.await.unwrap();
}

#[tokio::test]
async fn test_anthropic_headers_and_accessor() {
    let body = json!({ "role": "assistant", "content": [{ "type": "text", "text": "(500, 500)" }] }).to_string();
    let (url, server) = serve_once("200 OK", body).await;

    let mut model = ModelConfig::openai(url, "claude-like");
    model.style = WireStyle::Anthropic;
    model.api_key = Some("k".into());
    model.version = Some("2023-06-01".into());
    let transport = HttpTransport::from_config(&model, &RetryConfig::default()).unwrap();

    let response = transport
        .send(&[json!({"role": "user", "content": []})], Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(transport.access(&response).and_then(|m| m.text().map(String::from)).as_deref(), Some("(500, 500)"));

    let request = server.await.unwrap().to_ascii_lowercase();
    assert!(request.contains("x-api-key: k"));
    assert!(request.contains("anthropic-version: 2023-06-01"));
}

#[tokio::test]
async fn test_anthropic_without_key_is_config_error() {
    let mut model = ModelConfig::openai("http://127.0.0.1:9/v1/messages", "m");
    model.style = WireStyle::Anthropic;
    model.api_key = None;
    let transport = HttpTransport::from_config(&model, &RetryConfig::default()).unwrap();

    let err = assert_err!(transport.send(&[], Duration::from_secs(1)).await);
    assert!(matches!(err, ScreenwrightError::Config(_)));
}
