// Chunked HTTP adapter against a hand-written HTTP/1.1 responder.

use std::sync::mpsc::{self, Receiver};
use std::time::{Duration, Instant};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use round_chart::app::{AppEvent, FeedEvent};
use round_chart::feed::{self, ConnectionState, FeedKind, Sample};
use round_chart::settings::FeedSettings;

async fn read_request_head(sock: &mut TcpStream) {
    let mut head = Vec::new();
    let mut buf = [0u8; 512];
    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = sock.read(&mut buf).await.unwrap();
        assert!(n > 0, "client closed before sending a request");
        head.extend_from_slice(&buf[..n]);
    }
    let line = String::from_utf8_lossy(&head);
    assert!(line.starts_with("GET /feed/TEST?from="), "{line}");
}

async fn write_chunk(sock: &mut TcpStream, part: &str) {
    let chunk = format!("{:x}\r\n{part}\r\n", part.len());
    sock.write_all(chunk.as_bytes()).await.unwrap();
    sock.flush().await.unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn frames_split_across_chunks_are_reassembled() {
    feed::install_rustls_provider();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let server = tokio::spawn(async move {
        let (mut sock, _) = listener.accept().await.unwrap();
        drop(listener);
        read_request_head(&mut sock).await;
        sock.write_all(
            b"HTTP/1.1 200 OK\r\ncontent-type: text/plain\r\ntransfer-encoding: chunked\r\n\r\n",
        )
        .await
        .unwrap();
        for part in [
            "[1000,150",
            "00000000]\n[1001,",
            "15500000000]\n{bad}\n[1002,15600000000]",
        ] {
            write_chunk(&mut sock, part).await;
        }
        sock.write_all(b"0\r\n\r\n").await.unwrap();
        sock.shutdown().await.ok();
    });

    let settings = FeedSettings {
        kind: FeedKind::Http,
        url: format!("http://127.0.0.1:{port}"),
        feed_id: "TEST".into(),
        settle_ms: 0,
        reconnect_min_ms: 10,
        reconnect_max_ms: 20,
        max_reconnect_attempts: 1,
        ..FeedSettings::default()
    };
    let (tx, rx) = mpsc::channel();
    let handle = feed::connect(&settings, tx, &tokio::runtime::Handle::current());

    let events = drain_until_disconnected(&rx, Duration::from_secs(10)).await;
    let samples: Vec<Sample> = events
        .iter()
        .filter_map(|ev| match ev {
            FeedEvent::Sample(s) => Some(*s),
            _ => None,
        })
        .collect();
    assert_eq!(
        samples,
        vec![
            Sample { timestamp: 1_000_000, price: 150.0 },
            Sample { timestamp: 1_001_000, price: 155.0 },
            Sample { timestamp: 1_002_000, price: 156.0 },
        ]
    );
    assert_eq!(
        events.get(1),
        Some(&FeedEvent::Connection(ConnectionState::Open))
    );
    assert_eq!(handle.state(), ConnectionState::Disconnected);
    server.await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn error_status_never_opens() {
    feed::install_rustls_provider();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        let (mut sock, _) = listener.accept().await.unwrap();
        drop(listener);
        read_request_head(&mut sock).await;
        sock.write_all(b"HTTP/1.1 503 Service Unavailable\r\ncontent-length: 0\r\n\r\n")
            .await
            .unwrap();
        sock.shutdown().await.ok();
    });

    let settings = FeedSettings {
        kind: FeedKind::Http,
        url: format!("http://127.0.0.1:{port}"),
        feed_id: "TEST".into(),
        reconnect_min_ms: 10,
        reconnect_max_ms: 20,
        max_reconnect_attempts: 1,
        ..FeedSettings::default()
    };
    let (tx, rx) = mpsc::channel();
    let _handle = feed::connect(&settings, tx, &tokio::runtime::Handle::current());

    let events = drain_until_disconnected(&rx, Duration::from_secs(10)).await;
    assert!(!events.contains(&FeedEvent::Connection(ConnectionState::Open)));
    assert_eq!(
        events.last(),
        Some(&FeedEvent::Connection(ConnectionState::Disconnected))
    );
}

async fn drain_until_disconnected(rx: &Receiver<AppEvent>, timeout: Duration) -> Vec<FeedEvent> {
    let deadline = Instant::now() + timeout;
    let mut out = Vec::new();
    while Instant::now() < deadline {
        while let Ok(AppEvent::Feed(ev)) = rx.try_recv() {
            let done = ev == FeedEvent::Connection(ConnectionState::Disconnected);
            out.push(ev);
            if done {
                return out;
            }
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    out
}
