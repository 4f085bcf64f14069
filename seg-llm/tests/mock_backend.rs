//! Round trips against a one-shot local HTTP server standing in for each
//! backend.

use serde_json::{Value, json};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use seg_core::{ChatMessage, TextGenerator};
use seg_llm::{GenerationParams, LlmClient, LlmProvider};

/// What the server saw.
struct Captured {
    request_line: String,
    headers: String,
    body: Value,
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Serve exactly one request with `status` and `body`, returning what was
/// received.
async fn serve_once(status: &'static str, body: Value) -> (String, JoinHandle<Captured>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.expect("accept");
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        let header_end = loop {
            let n = socket.read(&mut chunk).await.expect("read");
            assert!(n > 0, "client closed early");
            buf.extend_from_slice(&chunk[..n]);
            if let Some(pos) = find(&buf, b"\r\n\r\n") {
                break pos + 4;
            }
        };
        let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
        let length: usize = head
            .lines()
            .find_map(|l| {
                let (name, value) = l.split_once(':')?;
                name.eq_ignore_ascii_case("content-length")
                    .then(|| value.trim().parse().ok())
                    .flatten()
            })
            .unwrap_or(0);
        while buf.len() < header_end + length {
            let n = socket.read(&mut chunk).await.expect("read body");
            assert!(n > 0, "client closed mid-body");
            buf.extend_from_slice(&chunk[..n]);
        }

        let payload = body.to_string();
        let response = format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{payload}",
            payload.len()
        );
        socket.write_all(response.as_bytes()).await.expect("write");
        socket.shutdown().await.ok();

        let mut lines = head.lines();
        let request_line = lines.next().unwrap_or_default().to_string();
        Captured {
            request_line,
            headers: lines.collect::<Vec<_>>().join("\n").to_lowercase(),
            body: serde_json::from_slice(&buf[header_end..header_end + length]).unwrap_or(Value::Null),
        }
    });
    (format!("http://{addr}"), handle)
}

fn params() -> GenerationParams {
    GenerationParams {
        model: "test-model".into(),
        temperature: 0.7,
        max_tokens: 100,
        timeout_ms: 5000,
        max_retries: 0,
    }
}

#[tokio::test]
async fn ollama_round_trip() {
    let (base_url, server) = serve_once("200 OK", json!({"response": "I remember the pines.", "eval_count": 5})).await;
    let client = LlmClient::new(LlmProvider::Ollama { base_url }, params());

    let reply = client
        .generate_response(&[ChatMessage::user("what do you smell?")], Some("You are River Sage"))
        .await;
    assert_eq!(reply.error, None);
    assert_eq!(reply.content, "I remember the pines.");

    let seen = server.await.expect("server");
    assert!(seen.request_line.starts_with("POST /api/generate "));
    assert_eq!(seen.body["model"], json!("test-model"));
    assert_eq!(seen.body["stream"], json!(false));
    assert_eq!(
        seen.body["prompt"],
        json!("System: You are River Sage\n\nHuman: what do you smell?")
    );
}

#[tokio::test]
async fn openai_round_trip_sends_bearer() {
    let (base_url, server) = serve_once(
        "200 OK",
        json!({"choices": [{"message": {"role": "assistant", "content": "Quietly."}}]}),
    )
    .await;
    let client = LlmClient::new(
        LlmProvider::OpenAi {
            base_url,
            api_key: Some("sk-test".into()),
        },
        params(),
    );

    let reply = client.generate_response(&[ChatMessage::user("hi")], Some("sys")).await;
    assert_eq!(reply.content, "Quietly.");

    let seen = server.await.expect("server");
    assert!(seen.request_line.starts_with("POST /chat/completions "));
    assert!(seen.headers.contains("authorization: bearer sk-test"));
    assert_eq!(seen.body["messages"][0]["role"], json!("system"));
    assert_eq!(seen.body["messages"][1]["content"], json!("hi"));
    assert_eq!(seen.body["max_tokens"], json!(100));
}

#[tokio::test]
async fn gemini_round_trip_uses_query_key() {
    let (base_url, server) = serve_once(
        "200 OK",
        json!({"candidates": [{"content": {"parts": [{"text": "Salt and stone."}]}}]}),
    )
    .await;
    let client = LlmClient::new(
        LlmProvider::Gemini {
            base_url,
            api_key: Some("g-key".into()),
        },
        params(),
    );

    let reply = client.generate_response(&[ChatMessage::user("hi")], None).await;
    assert_eq!(reply.content, "Salt and stone.");

    let seen = server.await.expect("server");
    assert!(
        seen.request_line
            .starts_with("POST /models/test-model:generateContent?key=g-key ")
    );
    assert_eq!(seen.body["contents"][0]["parts"][0]["text"], json!("Human: hi"));
}

#[tokio::test]
async fn http_errors_become_reply_errors() {
    let (base_url, server) = serve_once("500 Internal Server Error", json!({"error": "boom"})).await;
    let client = LlmClient::new(LlmProvider::LmStudio { base_url }, params());

    let reply = client.generate_response(&[ChatMessage::user("hi")], None).await;
    assert!(reply.content.is_empty());
    let error = reply.error.expect("error");
    assert!(error.contains("HTTP 500"), "{error}");
    server.await.expect("server");
}

#[tokio::test]
async fn missing_content_is_empty_not_error() {
    let (base_url, server) = serve_once("200 OK", json!({"done": true})).await;
    let client = LlmClient::new(LlmProvider::Ollama { base_url }, params());

    let reply = client.generate_response(&[ChatMessage::user("hi")], None).await;
    assert_eq!(reply.error, None);
    assert!(reply.usable_text().is_none());
    server.await.expect("server");
}

#[tokio::test]
async fn connection_test_uses_probe() {
    let (base_url, server) = serve_once("200 OK", json!({"response": "yes"})).await;
    let client = LlmClient::new(LlmProvider::Ollama { base_url }, params());
    assert!(client.test_connection().await);
    let seen = server.await.expect("server");
    assert_eq!(seen.body["prompt"], json!("Human: Hello, are you working?"));
}
