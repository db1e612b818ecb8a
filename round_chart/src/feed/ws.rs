use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use super::frame::split_message;
use super::Publisher;
use crate::error::FeedError;

/// One websocket session: connect, pump frames until close or error.
pub(crate) async fn run(url: &str, publisher: &mut Publisher) -> Result<(), FeedError> {
    let (mut ws, _) = connect_async(url).await?;
    publisher.open();

    while let Some(msg) = ws.next().await {
        match msg? {
            Message::Text(txt) => {
                for frame in split_message(&txt) {
                    if !publisher.frame(frame) {
                        return Ok(());
                    }
                }
            }
            Message::Binary(bytes) => {
                let txt = String::from_utf8_lossy(&bytes);
                for frame in split_message(&txt) {
                    if !publisher.frame(frame) {
                        return Ok(());
                    }
                }
            }
            Message::Ping(payload) => {
                ws.send(Message::Pong(payload)).await.ok();
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    Ok(())
}

/// Rustls 0.23 needs a process-wide crypto provider before the first TLS
/// handshake. Opt into ring; if one is already installed, keep it.
pub fn install_rustls_provider() {
    let _ = rustls::crypto::ring::default_provider().install_default();
}
