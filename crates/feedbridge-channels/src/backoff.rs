use tokio::time::{sleep, Duration};
use tracing::{info, warn};

use crate::{channel::FeedChannel, error::ChannelError};

/// Minimum delay between connect attempts (seconds).
const BACKOFF_BASE_SECS: u64 = 5;
/// Maximum delay between connect attempts (seconds).
const BACKOFF_MAX_SECS: u64 = 300; // 5 minutes
/// Maximum number of connect attempts before giving up.
pub const MAX_ATTEMPTS: u32 = 10;
/// Jitter fraction applied to each delay (+10 %).
const JITTER_FRACTION: f64 = 0.10;

/// Connect `channel`, retrying with exponential backoff and jitter.
///
/// Schedule: 5 s → 10 s → 20 s → … → 300 s (cap), up to [`MAX_ATTEMPTS`] tries.
/// The last error is returned when every attempt fails. Only the startup
/// connect is retried; a feed that closes later ends the session.
pub async fn connect_with_backoff(channel: &dyn FeedChannel) -> Result<(), ChannelError> {
    connect_with_schedule(channel, MAX_ATTEMPTS, BACKOFF_BASE_SECS).await
}

async fn connect_with_schedule(
    channel: &dyn FeedChannel,
    max_attempts: u32,
    base_secs: u64,
) -> Result<(), ChannelError> {
    let name = channel.name();
    let mut delay_secs = base_secs;
    let mut attempt = 1;

    loop {
        match channel.connect().await {
            Ok(()) => {
                info!(channel = %name, attempt, "feed connected");
                return Ok(());
            }
            Err(e) if attempt >= max_attempts => return Err(e),
            Err(e) => {
                let total = delay_secs + jitter_secs(delay_secs);
                warn!(
                    channel = %name,
                    attempt,
                    max = max_attempts,
                    error = %e,
                    retry_after_secs = total,
                    "feed connect failed, retrying with backoff"
                );
                sleep(Duration::from_secs(total)).await;
                delay_secs = (delay_secs * 2).min(BACKOFF_MAX_SECS);
                attempt += 1;
            }
        }
    }
}

/// Return a jitter offset (0 … `JITTER_FRACTION * base_secs`) as integer seconds.
///
/// Derived from the sub-second part of the wall clock; good enough to keep
/// several bridges from retrying in lockstep.
fn jitter_secs(base_secs: u64) -> u64 {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);

    let max_jitter = ((base_secs as f64) * JITTER_FRACTION) as u64;
    if max_jitter == 0 {
        return 0;
    }
    (nanos as u64) % max_jitter
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChannelStatus;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails the first `fail_times` connects, then succeeds.
    struct Flaky {
        fail_times: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl FeedChannel for Flaky {
        fn name(&self) -> &str {
            "flaky"
        }
        async fn connect(&self) -> Result<(), ChannelError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_times {
                Err(ChannelError::ConnectionFailed(format!("attempt {n}")))
            } else {
                Ok(())
            }
        }
        async fn disconnect(&self) -> Result<(), ChannelError> {
            Ok(())
        }
        async fn recv(&self) -> Result<Option<Vec<u8>>, ChannelError> {
            Ok(None)
        }
        async fn send_line(&self, _line: &str) -> Result<(), ChannelError> {
            Ok(())
        }
        fn status(&self) -> ChannelStatus {
            ChannelStatus::Disconnected
        }
    }

    #[tokio::test(start_paused = true)]
    async fn retries_until_success() {
        let ch = Flaky {
            fail_times: 2,
            calls: AtomicU32::new(0),
        };
        connect_with_schedule(&ch, 5, 1).await.unwrap();
        assert_eq!(ch.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_attempts() {
        let ch = Flaky {
            fail_times: u32::MAX,
            calls: AtomicU32::new(0),
        };
        let err = connect_with_schedule(&ch, 3, 1).await.unwrap_err();
        assert!(matches!(err, ChannelError::ConnectionFailed(_)));
        assert_eq!(ch.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn jitter_is_bounded() {
        for base in [0, 5, 10, 300] {
            assert!(jitter_secs(base) <= base / 10);
        }
    }
}
