use chrono::NaiveDate;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use chartdiff::chart_source::{ChartSource, HttpChartSource};
use chartdiff::config::{ChartConfig, MetadataConfig};
use chartdiff::error::PipelineError;
use chartdiff::http::{build_client, send_with_retry};
use chartdiff::metadata::{MetadataService, SpotifyClient};

// ============ Stub server ============

/// Local HTTP server that answers with a fixed script of responses, one per
/// request. The last response repeats once the script runs out.
struct StubServer {
    addr: SocketAddr,
    hits: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<String>>>,
}

impl StubServer {
    async fn start(script: Vec<(u16, String)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let requests = Arc::new(Mutex::new(Vec::new()));

        let (task_hits, task_requests) = (hits.clone(), requests.clone());
        tokio::spawn(async move {
            loop {
                let (mut stream, _) = match listener.accept().await {
                    Ok(conn) => conn,
                    Err(_) => break,
                };
                let head = match read_request(&mut stream).await {
                    Some(head) => head,
                    None => continue,
                };
                task_requests.lock().unwrap().push(head);
                let idx = task_hits.fetch_add(1, Ordering::SeqCst);
                let (status, body) = &script[idx.min(script.len() - 1)];
                let response = format!(
                    "HTTP/1.1 {} Stub\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            }
        });

        Self {
            addr,
            hits,
            requests,
        }
    }

    fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    fn request(&self, idx: usize) -> String {
        self.requests.lock().unwrap()[idx].clone()
    }
}

/// Read one request (head and body). Returns the head, lower-cased.
async fn read_request(stream: &mut TcpStream) -> Option<String> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&buf[..end]).to_lowercase();
            let content_length = head
                .lines()
                .filter_map(|line| line.split_once(':'))
                .find(|(name, _)| name.trim() == "content-length")
                .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                .unwrap_or(0);
            while buf.len() < end + 4 + content_length {
                let n = stream.read(&mut chunk).await.ok()?;
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
            }
            return Some(head);
        }
    }
}

fn ok(body: serde_json::Value) -> (u16, String) {
    (200, body.to_string())
}

fn status(code: u16) -> (u16, String) {
    (code, json!({"error": code}).to_string())
}

// ============ Retry policy ============

#[tokio::test]
async fn test_retry_recovers_after_server_error() {
    let server = StubServer::start(vec![status(503), ok(json!({"fine": true}))]).await;
    let client = build_client(5).unwrap();
    let url = server.url();

    let response = send_with_retry("test", 2, || client.get(&url)).await.unwrap();

    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(server.hits(), 2);
}

#[tokio::test]
async fn test_exhausted_retries_give_one_service_error() {
    let server = StubServer::start(vec![status(503)]).await;
    let client = build_client(5).unwrap();
    let url = server.url();

    let err = send_with_retry("test", 1, || client.get(&url)).await.unwrap_err();

    match err {
        PipelineError::ExternalService { service, message } => {
            assert_eq!(service, "test");
            assert!(message.contains("503"), "{}", message);
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(server.hits(), 2);
}

#[tokio::test]
async fn test_client_error_not_retried() {
    let server = StubServer::start(vec![status(400), ok(json!({}))]).await;
    let client = build_client(5).unwrap();
    let url = server.url();

    let err = send_with_retry("test", 3, || client.get(&url)).await.unwrap_err();

    assert!(matches!(err, PipelineError::ExternalService { .. }));
    assert_eq!(server.hits(), 1);
}

#[tokio::test]
async fn test_silent_server_times_out() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    let accepted = Arc::new(AtomicUsize::new(0));
    let counter = accepted.clone();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            held.push(stream);
        }
    });
    let client = build_client(1).unwrap();

    let err = send_with_retry("test", 1, || client.get(&url)).await.unwrap_err();

    assert!(matches!(err, PipelineError::ExternalService { .. }));
    assert_eq!(accepted.load(Ordering::SeqCst), 2);
}

// ============ Chart feed ============

fn chart_config(base_url: String, top_n: usize) -> ChartConfig {
    ChartConfig {
        base_url,
        top_n,
        timeout_secs: 5,
        max_retries: 0,
    }
}

#[tokio::test]
async fn test_chart_feed_requests_saturday_and_ranks() {
    let server = StubServer::start(vec![ok(json!({
        "date": "2021-06-05",
        "data": [
            {"song": "Good 4 U", "artist": "Olivia Rodrigo", "this_week": 2},
            {"song": "Butter", "artist": "BTS", "this_week": 1},
            {"song": "Kiss Me More", "artist": "Doja Cat", "this_week": 3}
        ]
    }))])
    .await;
    let source = HttpChartSource::new(&chart_config(server.url(), 2)).unwrap();

    let snap = source
        .fetch_for_date(NaiveDate::from_ymd_opt(2021, 6, 1).unwrap())
        .await
        .unwrap();

    assert!(server.request(0).starts_with("get /date/2021-06-05.json "));
    assert_eq!(snap.entries.len(), 2);
    assert_eq!(snap.entries[0].title, "Butter");
}

#[tokio::test]
async fn test_missing_chart_is_service_error() {
    let server = StubServer::start(vec![status(404)]).await;
    let source = HttpChartSource::new(&chart_config(server.url(), 10)).unwrap();

    let err = source
        .fetch_for_date(NaiveDate::from_ymd_opt(1960, 1, 4).unwrap())
        .await
        .unwrap_err();

    assert!(err.to_string().contains("no chart published"), "{}", err);
    assert_eq!(server.hits(), 1);
}

// ============ Spotify ============

fn spotify(server: &StubServer) -> SpotifyClient {
    let config = MetadataConfig {
        provider: "spotify".to_string(),
        api_url: format!("{}/v1", server.url()),
        token_url: format!("{}/api/token", server.url()),
        timeout_secs: 5,
        max_retries: 0,
    };
    SpotifyClient::new(&config, "id".to_string(), "secret".to_string()).unwrap()
}

fn token() -> (u16, String) {
    ok(json!({"access_token": "tok123", "token_type": "Bearer", "expires_in": 3600}))
}

#[tokio::test]
async fn test_token_fetched_once_and_sent_as_bearer() {
    let hit = json!({"tracks": {"items": [{"id": "b", "name": "Butter"}]}});
    let server = StubServer::start(vec![token(), ok(hit.clone()), ok(hit)]).await;
    let client = spotify(&server);

    client.search("butter bts").await.unwrap();
    client.search("butter bts").await.unwrap();

    assert_eq!(server.hits(), 3);
    let token_request = server.request(0);
    assert!(token_request.starts_with("post /api/token "));
    // base64("id:secret")
    assert!(token_request.contains("authorization: basic awq6c2vjcmv0"));
    let search = server.request(1);
    assert!(search.starts_with("get /v1/search?"));
    assert!(search.contains("type=track"));
    assert!(search.contains("authorization: bearer tok123"));
    assert!(server.request(2).starts_with("get /v1/search?"));
}

#[tokio::test]
async fn test_search_not_found_is_service_error() {
    let server = StubServer::start(vec![token(), status(404)]).await;
    let client = spotify(&server);

    let err = client.search("butter bts").await.unwrap_err();

    assert!(matches!(err, PipelineError::ExternalService { .. }));
}

#[tokio::test]
async fn test_features_chunked_per_hundred_ids() {
    let first = json!({ "audio_features": vec![serde_json::Value::Null; 100] });
    let second = json!({ "audio_features": vec![serde_json::Value::Null; 50] });
    let server = StubServer::start(vec![token(), ok(first), ok(second)]).await;
    let client = spotify(&server);
    let ids: Vec<String> = (0..150).map(|i| format!("id{}", i)).collect();

    let records = client.features_for(&ids).await.unwrap();

    assert_eq!(records.len(), 150);
    assert_eq!(server.hits(), 3);
    assert!(server.request(1).starts_with("get /v1/audio-features?ids=id0%2cid1%2c"));
    assert!(server.request(2).contains("ids=id100%2c"));
}

#[tokio::test]
async fn test_misaligned_features_response_rejected() {
    let server = StubServer::start(vec![
        token(),
        ok(json!({"audio_features": [{"energy": 0.5}]})),
    ])
    .await;
    let client = spotify(&server);

    let err = client
        .features_for(&["a".to_string(), "b".to_string()])
        .await
        .unwrap_err();

    assert!(err.to_string().contains("expected 2 feature records"), "{}", err);
}
