//! Same-domain breadth-first crawl
//!
//! Each dequeued page is captured with [`capture_page`]; its links are only
//! followed when the capture succeeded. A URL enters `visited` at the moment
//! it is queued, so no page is ever attempted twice.

use crate::browser::session::BrowsingSession;
use crate::browser::wait::ReadinessWait;
use crate::capture::{capture_page, CaptureOptions, CoordinateSpace};
use crate::error::{BrowserError, Result};
use std::collections::{HashSet, VecDeque};
use std::path::Path;
use tokio_util::sync::CancellationToken;
use url::Url;

#[derive(Debug, Clone)]
pub struct CrawlOptions {
    /// Stop after this many successfully captured pages
    pub max_pages: usize,
    /// Scroll steps per page
    pub max_scrolls: usize,
    /// Origin of the captured element boxes
    pub coordinates: CoordinateSpace,
    pub wait: ReadinessWait,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            max_pages: 10,
            max_scrolls: 3,
            coordinates: CoordinateSpace::Document,
            wait: ReadinessWait::default(),
        }
    }
}

impl CrawlOptions {
    fn capture_options(&self) -> CaptureOptions {
        CaptureOptions {
            max_scrolls: self.max_scrolls,
            coordinates: self.coordinates,
            wait: self.wait.clone(),
            ..Default::default()
        }
    }
}

/// Bookkeeping for one crawl.
#[derive(Debug, Clone)]
pub struct CrawlState {
    /// Host (plus port, when it is not the scheme default) every followed
    /// link must share with the seed
    pub domain: String,
    pub visited: HashSet<String>,
    pub queue: VecDeque<String>,
    pub pages_captured: usize,
}

impl CrawlState {
    /// Start from `seed`: the only queued URL, and the only visited one.
    pub fn new(seed: &str) -> Result<Self> {
        let seed = Url::parse(seed)?;
        let domain = network_location(&seed)
            .ok_or_else(|| BrowserError::Other(format!("seed URL has no host: {}", seed)))?;
        let seed = canonicalize(seed);

        let mut state = Self {
            domain,
            visited: HashSet::new(),
            queue: VecDeque::new(),
            pages_captured: 0,
        };
        state.visited.insert(seed.clone());
        state.queue.push_back(seed);
        Ok(state)
    }

    /// Queue `link` (resolved against `base`) if it is on our domain and new.
    /// Returns whether it was queued.
    pub fn enqueue(&mut self, base: &Url, link: &str) -> bool {
        let Ok(url) = base.join(link) else {
            return false;
        };
        if !matches!(url.scheme(), "http" | "https")
            || network_location(&url).as_deref() != Some(self.domain.as_str())
        {
            return false;
        }

        let url = canonicalize(url);
        if !self.visited.insert(url.clone()) {
            return false;
        }
        self.queue.push_back(url);
        true
    }
}

/// `host[:port]`; default ports are omitted, so `http` and `https` links to
/// the same host match while `localhost:8000` and `localhost:9000` do not.
fn network_location(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    Some(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}

/// Strip the fragment. Query strings and trailing slashes are left as they are.
pub fn canonicalize_url(url: &str) -> Result<String> {
    Ok(canonicalize(Url::parse(url)?))
}

fn canonicalize(mut url: Url) -> String {
    url.set_fragment(None);
    url.into()
}

/// Crawl from `seed_url`, writing capture pairs into `output_dir`.
/// Returns the number of pages captured.
pub async fn crawl<S: BrowsingSession + ?Sized>(
    session: &S,
    seed_url: &str,
    output_dir: &Path,
    options: &CrawlOptions,
    cancel: &CancellationToken,
) -> Result<usize> {
    let mut state = CrawlState::new(seed_url)?;
    let capture = options.capture_options();

    log::info!("Starting crawl of {} ({})", seed_url, state.domain);

    while state.pages_captured < options.max_pages {
        if cancel.is_cancelled() {
            log::info!("Crawl cancelled");
            break;
        }
        let Some(url) = state.queue.pop_front() else {
            break;
        };

        match crawl_step(session, &mut state, &url, output_dir, &capture, options.max_pages, cancel).await {
            Ok(()) => {}
            Err(BrowserError::Cancelled) => {
                log::info!("Crawl cancelled");
                break;
            }
            Err(e) => log::warn!("Failed to capture {}: {}", url, e),
        }
    }

    log::info!(
        "Crawl finished: {} pages captured, {} URLs seen",
        state.pages_captured,
        state.visited.len()
    );
    Ok(state.pages_captured)
}

/// Capture one dequeued page and queue its links.
async fn crawl_step<S: BrowsingSession + ?Sized>(
    session: &S,
    state: &mut CrawlState,
    url: &str,
    output_dir: &Path,
    capture: &CaptureOptions,
    max_pages: usize,
    cancel: &CancellationToken,
) -> Result<()> {
    log::info!("({}/{}) Crawling: {}", state.pages_captured + 1, max_pages, url);

    let records = capture_page(session, url, output_dir, capture, cancel).await?;
    state.pages_captured += 1;
    log::debug!("{}: {} captures", url, records.len());

    let base = Url::parse(url)?;
    let links = match session.link_targets().await {
        Ok(links) => links,
        Err(e) => {
            log::warn!("Link discovery failed on {}: {}", url, e);
            return Ok(());
        }
    };
    let queued = links
        .iter()
        .filter(|link| state.enqueue(&base, link))
        .count();
    log::debug!("{}: {} links, {} new", url, links.len(), queued);

    Ok(())
}
