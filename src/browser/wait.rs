//! Bounded readiness waits
//!
//! Instead of sleeping a fixed time after navigation or scrolling, poll a
//! readiness predicate until it holds, the deadline passes, or the wait is
//! cancelled.

use super::session::BrowsingSession;
use crate::error::{BrowserError, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct ReadinessWait {
    /// Give up after this long
    pub timeout: Duration,
    /// Delay between checks
    pub poll_interval: Duration,
}

impl Default for ReadinessWait {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            poll_interval: Duration::from_millis(100),
        }
    }
}

/// Poll `check` until it reports `true`.
///
/// Errors from `check` are treated as "not ready yet".
pub async fn wait_until<F, Fut>(
    wait: &ReadinessWait,
    cancel: &CancellationToken,
    mut check: F,
) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    let deadline = Instant::now() + wait.timeout;
    loop {
        if cancel.is_cancelled() {
            return Err(BrowserError::Cancelled);
        }

        match check().await {
            Ok(true) => return Ok(()),
            Ok(false) => {}
            Err(e) => log::debug!("readiness check failed: {}", e),
        }

        let now = Instant::now();
        if now >= deadline {
            return Err(BrowserError::Timeout(wait.timeout));
        }

        tokio::select! {
            _ = cancel.cancelled() => return Err(BrowserError::Cancelled),
            _ = tokio::time::sleep(wait.poll_interval.min(deadline - now)) => {}
        }
    }
}

/// Wait until the session reports the document as loaded.
pub async fn wait_for_load<S: BrowsingSession + ?Sized>(
    session: &S,
    wait: &ReadinessWait,
    cancel: &CancellationToken,
) -> Result<()> {
    wait_until(wait, cancel, || session.is_ready()).await
}

/// Wait until the document is loaded and the viewport has reached `target`
/// (or the bottom of the page, when `target` lies past it).
pub async fn wait_for_scroll<S: BrowsingSession + ?Sized>(
    session: &S,
    target: f64,
    max_offset: f64,
    wait: &ReadinessWait,
    cancel: &CancellationToken,
) -> Result<()> {
    let expected = target.min(max_offset.max(0.0));
    wait_until(wait, cancel, move || async move {
        Ok(session.is_ready().await? && session.scroll_offset().await? >= expected - 1.0)
    })
    .await
}
