use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::Publisher;
use crate::error::FeedError;
use crate::settings::FeedSettings;

const START_PRICE: f64 = 150.0;
const MAX_STEP: f64 = 0.02;

/// Offline feed: a random walk emitted as raw scaled wire pairs, so the whole
/// parse/scale/settle path runs exactly as it does for a real transport.
pub(crate) async fn run(settings: &FeedSettings, publisher: &mut Publisher) -> Result<(), FeedError> {
    let mut rng = StdRng::from_entropy();
    let mut px = START_PRICE;
    let interval = Duration::from_millis(settings.dummy_interval_ms.max(10));

    publisher.open();
    loop {
        tokio::time::sleep(interval).await;

        px = (px + rng.gen_range(-MAX_STEP..=MAX_STEP)).max(0.01);
        let ts = crate::now_ms() / 1000;
        let scaled = (px * settings.price_scale).round();

        if !publisher.frame(&format!("[{ts},{scaled}]")) {
            return Ok(());
        }
    }
}
