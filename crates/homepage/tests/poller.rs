use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{unbounded, TryRecvError};
use homepage::poller::{spawn_poll_all, Feed, FeedPayload, PollError, PollOutcome, StatusClient};
use homepage_status::{ResponseError, SyncTier};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::runtime::Handle;

const BITCOIN_BODY: &str = r#"{"version":"26.0","blocks":800000,"headers":800000,"sync_percent":100,
"disk_size_gb":600,"mempool_mb":120,"connections":{"total":10,"inbound":4,"outbound":6},"uptime":"3d"}"#;

fn build_response(status: &str, body: &str) -> Vec<u8> {
    let mut response = String::new();
    response.push_str("HTTP/1.1 ");
    response.push_str(status);
    response.push_str("\r\nContent-Type: application/json\r\nConnection: close\r\nContent-Length: ");
    response.push_str(&body.len().to_string());
    response.push_str("\r\n\r\n");
    let mut bytes = response.into_bytes();
    bytes.extend_from_slice(body.as_bytes());
    bytes
}

/// Serves canned answers keyed by request path until the test ends.
async fn serve(routes: Vec<(&'static str, &'static str, &'static str)>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let routes = Arc::new(routes);
    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                return;
            };
            let routes = Arc::clone(&routes);
            tokio::spawn(async move {
                let mut buffer = vec![0u8; 4096];
                let Ok(read) = stream.read(&mut buffer).await else {
                    return;
                };
                let request = String::from_utf8_lossy(&buffer[..read]);
                let path = request.split_whitespace().nth(1).unwrap_or("/");
                let response = routes
                    .iter()
                    .find(|(route, _, _)| *route == path)
                    .map(|(_, status, body)| build_response(status, body))
                    .unwrap_or_else(|| build_response("404 Not Found", "not found"));
                let _ = stream.write_all(&response).await;
                let _ = stream.shutdown().await;
            });
        }
    });
    addr
}

fn client(addr: SocketAddr) -> StatusClient {
    StatusClient::new(&format!("http://{addr}"), Duration::from_secs(2)).expect("client")
}

#[tokio::test]
async fn bitcoin_feed_decodes_status() {
    let addr = serve(vec![("/api/bitcoin", "200 OK", BITCOIN_BODY)]).await;
    let outcome = client(addr).poll(Feed::Bitcoin).await;
    let Ok(FeedPayload::Bitcoin(status)) = &outcome.result else {
        panic!("unexpected outcome {outcome:?}");
    };
    assert_eq!(status.sync_text(), "800000 / 800000 (100%)");
    assert_eq!(status.tier(), SyncTier::Green);
}

#[tokio::test]
async fn error_body_is_read_regardless_of_status_code() {
    let addr = serve(vec![
        ("/api/bitcoin", "500 Internal Server Error", r#"{"error":"rpc unreachable"}"#),
        ("/api/fulcrum", "200 OK", r#"{"bitcoin_up":true,"source":"disabled","version":"1.9.8"}"#),
    ])
    .await;
    let client = client(addr);

    let bitcoin = client.poll(Feed::Bitcoin).await;
    assert_eq!(
        bitcoin.result,
        Err(PollError::Backend("rpc unreachable".to_string()))
    );

    let fulcrum = client.poll(Feed::Fulcrum).await;
    let Ok(FeedPayload::Fulcrum(status)) = &fulcrum.result else {
        panic!("unexpected outcome {fulcrum:?}");
    };
    assert!(status.is_disabled());
    assert!(fulcrum.seq > bitcoin.seq);
}

#[tokio::test]
async fn html_error_page_is_a_decode_error() {
    let addr = serve(vec![("/api/fulcrum", "502 Bad Gateway", "<html>bad gateway</html>")]).await;
    let outcome = client(addr).poll(Feed::Fulcrum).await;
    assert!(
        matches!(outcome.result, Err(PollError::Decode(ResponseError::Json(_)))),
        "{outcome:?}"
    );
}

#[tokio::test]
async fn unreachable_backend_is_a_request_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);
    let outcome = client(addr).poll(Feed::Bitcoin).await;
    assert!(matches!(outcome.result, Err(PollError::Request(_))), "{outcome:?}");
}

#[tokio::test]
async fn spawned_polls_reach_the_channel() {
    let addr = serve(vec![
        ("/api/bitcoin", "200 OK", BITCOIN_BODY),
        ("/api/fulcrum", "200 OK", r#"{"bitcoin_up":false,"source":"live","height":1}"#),
    ])
    .await;
    let client = Arc::new(client(addr));
    let (tx, rx) = unbounded::<PollOutcome>();
    spawn_poll_all(&Handle::current(), &client, &tx);

    let mut outcomes = Vec::new();
    for _ in 0..200 {
        match rx.try_recv() {
            Ok(outcome) => outcomes.push(outcome),
            Err(TryRecvError::Empty) => tokio::time::sleep(Duration::from_millis(10)).await,
            Err(TryRecvError::Disconnected) => break,
        }
        if outcomes.len() == 2 {
            break;
        }
    }
    assert_eq!(outcomes.len(), 2);
    let mut feeds: Vec<Feed> = outcomes.iter().map(|outcome| outcome.feed).collect();
    feeds.sort_by_key(|feed| feed.label());
    assert_eq!(feeds, vec![Feed::Bitcoin, Feed::Fulcrum]);
    assert!(outcomes.iter().all(|outcome| outcome.result.is_ok()));
}
