// Websocket adapter against a local tokio-tungstenite server.

use std::sync::mpsc::{self, Receiver};
use std::time::{Duration, Instant};

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

use round_chart::app::{AppEvent, FeedEvent};
use round_chart::feed::{self, ConnectionState, FeedKind, Sample};
use round_chart::settings::FeedSettings;

fn local_settings(port: u16) -> FeedSettings {
    FeedSettings {
        kind: FeedKind::Ws,
        url: format!("ws://127.0.0.1:{port}"),
        feed_id: "TEST".into(),
        settle_ms: 0,
        reconnect_min_ms: 10,
        reconnect_max_ms: 20,
        max_reconnect_attempts: 2,
        ..FeedSettings::default()
    }
}

async fn collect_until<F: Fn(&FeedEvent) -> bool>(
    rx: &Receiver<AppEvent>,
    stop: F,
    timeout: Duration,
) -> Vec<FeedEvent> {
    let deadline = Instant::now() + timeout;
    let mut out = Vec::new();
    while Instant::now() < deadline {
        while let Ok(AppEvent::Feed(ev)) = rx.try_recv() {
            let done = stop(&ev);
            out.push(ev);
            if done {
                return out;
            }
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    out
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn samples_then_terminal_disconnect() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        // refuse every reconnect from here on
        drop(listener);
        let mut ws = accept_async(stream).await.unwrap();
        ws.send(Message::Text("[1000,15000000000]".into())).await.unwrap();
        ws.send(Message::Text("[1001,15500000000]\n{bad}\n".into()))
            .await
            .unwrap();
        ws.close(None).await.ok();
        while ws.next().await.is_some() {}
    });

    let (tx, rx) = mpsc::channel();
    let handle = feed::connect(&local_settings(port), tx, &tokio::runtime::Handle::current());

    let events = collect_until(
        &rx,
        |ev| matches!(ev, FeedEvent::Connection(ConnectionState::Disconnected)),
        Duration::from_secs(10),
    )
    .await;

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
        ]
    );

    let states: Vec<ConnectionState> = events
        .iter()
        .filter_map(|ev| match ev {
            FeedEvent::Connection(s) => Some(*s),
            _ => None,
        })
        .collect();
    assert_eq!(states.first(), Some(&ConnectionState::Connecting));
    assert_eq!(states.get(1), Some(&ConnectionState::Open));
    assert_eq!(states.last(), Some(&ConnectionState::Disconnected));
    // the open session, then one connect per backoff delay
    let connects = states
        .iter()
        .filter(|s| **s == ConnectionState::Connecting)
        .count();
    assert_eq!(connects, 3);

    assert_eq!(handle.state(), ConnectionState::Disconnected);
    assert!(!handle.is_connected());
    server.await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn disconnect_publishes_closed() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        // hold the connection open until the client goes away
        while let Some(Ok(_)) = ws.next().await {}
    });

    let (tx, rx) = mpsc::channel();
    let handle = feed::connect(&local_settings(port), tx, &tokio::runtime::Handle::current());

    let events = collect_until(
        &rx,
        |ev| matches!(ev, FeedEvent::Connection(ConnectionState::Open)),
        Duration::from_secs(10),
    )
    .await;
    assert!(matches!(
        events.last(),
        Some(FeedEvent::Connection(ConnectionState::Open))
    ));
    assert!(handle.is_connected());

    handle.disconnect();
    assert_eq!(handle.state(), ConnectionState::Closed);
    assert!(!handle.is_connected());

    let tail = collect_until(
        &rx,
        |ev| matches!(ev, FeedEvent::Connection(ConnectionState::Closed)),
        Duration::from_secs(2),
    )
    .await;
    assert!(matches!(
        tail.last(),
        Some(FeedEvent::Connection(ConnectionState::Closed))
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn frames_during_settle_window_are_discarded() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        ws.send(Message::Text("[1000,15000000000]".into())).await.unwrap();
        tokio::time::sleep(Duration::from_millis(800)).await;
        ws.send(Message::Text("[1001,15500000000]".into())).await.unwrap();
        while let Some(Ok(_)) = ws.next().await {}
    });

    let settings = FeedSettings {
        settle_ms: 300,
        ..local_settings(port)
    };
    let (tx, rx) = mpsc::channel();
    let handle = feed::connect(&settings, tx, &tokio::runtime::Handle::current());

    let events = collect_until(
        &rx,
        |ev| matches!(ev, FeedEvent::Sample(_)),
        Duration::from_secs(10),
    )
    .await;
    let samples: Vec<Sample> = events
        .iter()
        .filter_map(|ev| match ev {
            FeedEvent::Sample(s) => Some(*s),
            _ => None,
        })
        .collect();
    assert_eq!(samples, vec![Sample { timestamp: 1_001_000, price: 155.0 }]);
    handle.disconnect();
}
