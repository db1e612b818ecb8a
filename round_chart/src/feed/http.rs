use futures_util::StreamExt;

use super::frame::FrameDecoder;
use super::Publisher;
use crate::error::FeedError;

/// One chunked-HTTP session: the body is a newline-delimited stream of frames
/// split at arbitrary chunk boundaries.
pub(crate) async fn run(url: &str, publisher: &mut Publisher) -> Result<(), FeedError> {
    let resp = reqwest::get(url).await?;
    let status = resp.status();
    if !status.is_success() {
        return Err(FeedError::Http(status.as_u16()));
    }
    publisher.open();

    let mut body = resp.bytes_stream();
    let mut decoder = FrameDecoder::new();
    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        for frame in decoder.push(&chunk) {
            if !publisher.frame(&frame) {
                return Ok(());
            }
        }
    }
    if let Some(tail) = decoder.finish() {
        publisher.frame(&tail);
    }

    Ok(())
}
