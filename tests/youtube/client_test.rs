//! `YouTubeClient` against a one-shot local HTTP server.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

use livechat::feed::{ChatGateway, GatewayError};
use livechat::youtube::client::insert_message_body;
use livechat::youtube::YouTubeClient;

/// Serve a single response and hand back the raw request head.
async fn serve_once(status_line: &str, body: &str) -> (String, oneshot::Receiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("listener should bind");
    let addr = listener.local_addr().expect("listener should expose local addr");

    let (request_tx, request_rx) = oneshot::channel();
    let status_line_owned = status_line.to_owned();
    let body_owned = body.to_owned();
    tokio::spawn(async move {
        if let Ok((mut socket, _)) = listener.accept().await {
            let mut read_buf = [0_u8; 4096];
            let read = socket.read(&mut read_buf).await.unwrap_or(0);
            let _ = request_tx.send(String::from_utf8_lossy(&read_buf[..read]).into_owned());

            let response = format!(
                "HTTP/1.1 {status_line_owned}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body_owned}",
                body_owned.len()
            );
            let _ = socket.write_all(response.as_bytes()).await;
        }
    });

    (format!("http://{addr}/v3/"), request_rx)
}

fn request_line(request: &str) -> &str {
    request.lines().next().unwrap_or_default()
}

#[tokio::test]
async fn fetch_batch_parses_messages_and_paging_hints() {
    let body = r#"{
        "nextPageToken": "tok-2",
        "pollingIntervalMillis": 3000,
        "items": [
            {
                "id": "m1",
                "snippet": {
                    "type": "textMessageEvent",
                    "liveChatId": "chat-1",
                    "displayMessage": "hello",
                    "textMessageDetails": { "messageText": "hello" }
                },
                "authorDetails": { "displayName": "viewer" }
            }
        ]
    }"#;
    let (url, request_rx) = serve_once("200 OK", body).await;
    let client = YouTubeClient::new(url, "access-123".to_owned());

    let batch = client
        .fetch_batch("chat-1", "tok-1")
        .await
        .expect("fetch should succeed");

    assert_eq!(batch.next_page_token, "tok-2");
    assert_eq!(batch.polling_interval, Some(std::time::Duration::from_millis(3000)));
    assert_eq!(batch.messages.len(), 1);
    assert_eq!(batch.messages[0].text(), Some("hello"));
    assert_eq!(batch.messages[0].author_name(), Some("viewer"));

    let request = request_rx.await.expect("request should be captured");
    let line = request_line(&request);
    assert!(line.starts_with("GET /v3/liveChat/messages?"), "{line}");
    assert!(line.contains("liveChatId=chat-1"));
    assert!(line.contains("pageToken=tok-1"));
    assert!(line.contains("part=snippet%2CauthorDetails"));
    assert!(request.to_ascii_lowercase().contains("authorization: bearer access-123"));
}

#[tokio::test]
async fn fetch_batch_omits_empty_page_token() {
    let (url, request_rx) = serve_once("200 OK", r#"{"items": []}"#).await;
    let client = YouTubeClient::new(url, "access-123".to_owned());

    let batch = client
        .fetch_batch("chat-1", "")
        .await
        .expect("fetch should succeed");
    assert!(batch.messages.is_empty());
    assert_eq!(batch.next_page_token, "");
    assert_eq!(batch.polling_interval, None);

    let request = request_rx.await.expect("request should be captured");
    assert!(!request_line(&request).contains("pageToken"));
}

#[tokio::test]
async fn list_broadcasts_requests_all_broadcasts() {
    let body = r#"{"items": [{"id": "v1", "snippet": {"title": "stream", "liveChatId": "chat-9"}}]}"#;
    let (url, request_rx) = serve_once("200 OK", body).await;
    let client = YouTubeClient::new(url, "access-123".to_owned());

    let broadcasts = client.list_broadcasts().await.expect("list should succeed");
    assert_eq!(broadcasts.len(), 1);
    assert_eq!(broadcasts[0].live_chat_id(), Some("chat-9"));

    let request = request_rx.await.expect("request should be captured");
    let line = request_line(&request);
    assert!(line.starts_with("GET /v3/liveBroadcasts?"), "{line}");
    assert!(line.contains("broadcastStatus=all"));
    assert!(line.contains("broadcastType=all"));
}

#[tokio::test]
async fn post_message_returns_created_record() {
    let body = r#"{"id": "created-7", "snippet": {"type": "textMessageEvent", "liveChatId": "chat-1", "textMessageDetails": {"messageText": "hi"}}}"#;
    let (url, request_rx) = serve_once("200 OK", body).await;
    let client = YouTubeClient::new(url, "access-123".to_owned());

    let created = client
        .post_message("chat-1", "hi")
        .await
        .expect("post should succeed");
    assert_eq!(created.id, "created-7");
    assert_eq!(created.text(), Some("hi"));

    let request = request_rx.await.expect("request should be captured");
    assert!(request_line(&request).starts_with("POST /v3/liveChat/messages?part=snippet"));
}

#[test]
fn insert_body_carries_feed_and_text() {
    let body = insert_message_body("chat-1", "hello there");
    assert_eq!(body["snippet"]["liveChatId"], "chat-1");
    assert_eq!(body["snippet"]["type"], "textMessageEvent");
    assert_eq!(body["snippet"]["textMessageDetails"]["messageText"], "hello there");
}

#[tokio::test]
async fn non_success_status_is_not_transient() {
    let (url, _request_rx) = serve_once("403 Forbidden", r#"{"error": "liveChatEnded"}"#).await;
    let client = YouTubeClient::new(url, "access-123".to_owned());

    let err = client
        .fetch_batch("chat-1", "tok")
        .await
        .expect_err("403 should fail");
    match &err {
        GatewayError::HttpStatus { status, body } => {
            assert_eq!(*status, 403);
            assert!(body.contains("liveChatEnded"));
        }
        other => panic!("expected http status error, got: {other}"),
    }
    assert!(!err.is_transient());
}

#[tokio::test]
async fn malformed_body_is_a_parse_error() {
    let (url, _request_rx) = serve_once("200 OK", "not json").await;
    let client = YouTubeClient::new(url, "access-123".to_owned());

    let err = client
        .fetch_batch("chat-1", "")
        .await
        .expect_err("garbage should fail");
    assert!(matches!(err, GatewayError::Parse(_)));
    assert!(!err.is_transient());
}

#[tokio::test]
async fn slow_server_maps_to_timeout() {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("listener should bind");
    let addr = listener.local_addr().expect("listener should expose local addr");
    tokio::spawn(async move {
        if let Ok((socket, _)) = listener.accept().await {
            tokio::time::sleep(std::time::Duration::from_secs(5)).await;
            drop(socket);
        }
    });

    let client = YouTubeClient::with_timeouts(
        format!("http://{addr}"),
        "access-123".to_owned(),
        std::time::Duration::from_secs(1),
        std::time::Duration::from_millis(100),
    );
    let err = client
        .fetch_batch("chat-1", "")
        .await
        .expect_err("request should time out");
    assert!(matches!(err, GatewayError::Timeout));
    assert!(err.is_transient());
}

#[test]
fn debug_output_hides_access_token() {
    let client = YouTubeClient::new("http://localhost".to_owned(), "secret-token".to_owned());
    let rendered = format!("{client:?}");
    assert!(!rendered.contains("secret-token"));
    assert!(rendered.contains("[REDACTED]"));
}
