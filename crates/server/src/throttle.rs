//! Outbound bandwidth limiting.
//!
//! A token bucket on the tokio clock. The bucket starts full and holds at
//! most one second of allowance, so bursts are bounded by `rate` bytes and
//! the long-run average never exceeds `rate` bytes per second.

use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::time::Duration;
use tokio::time::Instant;

/// Token bucket state.
#[derive(Debug)]
pub struct Throttle {
    rate: u64,
    allowance: f64,
    last: Instant,
}

impl Throttle {
    /// Create a bucket for `rate` bytes per second. 0 means unlimited.
    pub fn new(rate: u64) -> Self {
        Self {
            rate,
            allowance: rate as f64,
            last: Instant::now(),
        }
    }

    pub fn is_unlimited(&self) -> bool {
        self.rate == 0
    }

    /// Account for a chunk of `len` bytes and return how long to hold it.
    pub fn reserve(&mut self, len: usize) -> Duration {
        if self.is_unlimited() {
            return Duration::ZERO;
        }

        let rate = self.rate as f64;
        let now = Instant::now();
        // `last` may sit in the future while a previous chunk is held
        let elapsed = now.saturating_duration_since(self.last).as_secs_f64();
        self.allowance = (self.allowance + elapsed * rate).min(rate);
        self.last = self.last.max(now);

        let len = len as f64;
        if len <= self.allowance {
            self.allowance -= len;
            return Duration::ZERO;
        }

        let wait_ms = ((len - self.allowance) * 1000.0 / rate).ceil() as u64;
        let wait = Duration::from_millis(wait_ms);
        self.allowance = 0.0;
        // Tokens accrued during the wait pay for this chunk
        self.last += wait;
        wait
    }
}

/// Pace a byte stream to at most `rate` bytes per second.
///
/// Each chunk is held until the bucket allows it. Errors pass through
/// unthrottled.
pub fn throttle<S>(stream: S, rate: u64) -> impl Stream<Item = std::io::Result<Bytes>> + Send
where
    S: Stream<Item = std::io::Result<Bytes>> + Send,
{
    async_stream::stream! {
        let mut bucket = Throttle::new(rate);
        let mut stream = std::pin::pin!(stream);

        while let Some(item) = stream.next().await {
            if let Ok(chunk) = &item {
                let wait = bucket.reserve(chunk.len());
                if !wait.is_zero() {
                    tokio::time::sleep(wait).await;
                }
            }
            yield item;
        }
    }
}
