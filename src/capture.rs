//! Page capture
//!
//! Scroll-paginated capture of one page: at every scroll step we save a
//! viewport screenshot plus a JSON tree of the rendered DOM, as a file pair
//! sharing the base name `web_{unix_seconds}_{step}`.
//!
//! The tree uses the Rico convention (`componentLabel`, `bounds`, `children`)
//! so the hierarchy normalizer reads it like any other tree dump.

use crate::browser::session::{BrowsingSession, ElementInfo};
use crate::browser::wait::{self, ReadinessWait};
use crate::error::{BrowserError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

/// Which origin the captured `bounds` are relative to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CoordinateSpace {
    /// Relative to the document, as WebDriver reports element rectangles
    #[default]
    Document,
    /// Relative to the viewport at capture time, matching the screenshot
    Viewport,
}

#[derive(Debug, Clone)]
pub struct CaptureOptions {
    /// Maximum number of scroll steps after the first capture
    pub max_scrolls: usize,

    /// DOM nodes deeper than this are not captured
    pub max_depth: usize,

    pub coordinates: CoordinateSpace,

    /// Readiness wait after navigation and after each scroll
    pub wait: ReadinessWait,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            max_scrolls: 3,
            max_depth: crate::hierarchy::DEFAULT_MAX_DEPTH,
            coordinates: CoordinateSpace::Document,
            wait: ReadinessWait::default(),
        }
    }
}

/// One captured DOM element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawNode {
    #[serde(rename = "componentLabel")]
    pub label: String,

    /// `[x1, y1, x2, y2]`
    pub bounds: [i64; 4],

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub text: String,

    #[serde(default)]
    pub children: Vec<RawNode>,
}

impl RawNode {
    fn from_info(info: ElementInfo, offset_y: f64) -> Self {
        let r = info.rect;
        let y = r.y - offset_y;
        Self {
            label: info.tag,
            bounds: [
                r.x as i64,
                y as i64,
                (r.x + r.width) as i64,
                (y + r.height) as i64,
            ],
            text: info.text,
            children: Vec::new(),
        }
    }

    /// Number of nodes in this subtree, including itself.
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(RawNode::count).sum::<usize>()
    }
}

/// What one scroll step produced, before it is written out.
#[derive(Debug, Clone)]
pub struct PageSnapshot {
    /// PNG bytes of the viewport
    pub screenshot: Vec<u8>,
    /// `None` when the root element itself was not rendered
    pub tree: Option<RawNode>,
}

/// Where one persisted snapshot ended up.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureRecord {
    pub url: String,
    pub step: usize,
    pub scroll_offset: f64,
    pub screenshot_path: PathBuf,
    pub tree_path: PathBuf,
    pub node_count: usize,
    /// SHA-256 of the screenshot, for deduplication
    pub screenshot_hash: String,
}

/// Walk the rendered DOM from the root element.
///
/// An element that has no area or is not displayed is dropped together with
/// its whole subtree. Elements whose geometry cannot be read are dropped the
/// same way.
pub async fn capture_dom_tree<S: BrowsingSession + ?Sized>(
    session: &S,
    max_depth: usize,
    offset_y: f64,
) -> Result<Option<RawNode>> {
    let Some(root) = session.root_element().await? else {
        return Ok(None);
    };

    // pre-order arena; parents always precede their children
    let mut nodes: Vec<RawNode> = Vec::new();
    let mut parents: Vec<Option<usize>> = Vec::new();
    let mut stack = vec![(root, 0usize, None)];
    let mut depth_warned = false;

    while let Some((element, depth, parent)) = stack.pop() {
        if depth > max_depth {
            if !depth_warned {
                log::warn!("DOM deeper than {} levels, ignoring the rest", max_depth);
                depth_warned = true;
            }
            continue;
        }

        let info = match session.describe(&element).await {
            Ok(info) => info,
            Err(e) => {
                log::debug!("skipping element: {}", e);
                continue;
            }
        };
        if info.rect.width <= 0.0 || info.rect.height <= 0.0 || !info.displayed {
            continue;
        }

        let index = nodes.len();
        nodes.push(RawNode::from_info(info, offset_y));
        parents.push(parent);

        match session.children(&element).await {
            Ok(children) => {
                for child in children.into_iter().rev() {
                    stack.push((child, depth + 1, Some(index)));
                }
            }
            Err(e) => log::debug!("cannot list children: {}", e),
        }
    }

    // fold the arena back into a tree, deepest indices first
    while nodes.len() > 1 {
        let index = nodes.len() - 1;
        let Some(mut node) = nodes.pop() else { break };
        node.children.reverse();
        if let Some(parent) = parents[index] {
            nodes[parent].children.push(node);
        }
    }

    Ok(nodes.pop().map(|mut root| {
        root.children.reverse();
        root
    }))
}

/// Screenshot plus DOM tree at the current scroll position.
pub async fn take_snapshot<S: BrowsingSession + ?Sized>(
    session: &S,
    options: &CaptureOptions,
    scroll_offset: f64,
) -> Result<PageSnapshot> {
    let screenshot = session.screenshot().await?;
    let offset_y = match options.coordinates {
        CoordinateSpace::Document => 0.0,
        CoordinateSpace::Viewport => scroll_offset,
    };
    let tree = capture_dom_tree(session, options.max_depth, offset_y).await?;
    Ok(PageSnapshot { screenshot, tree })
}

/// Base name shared by the two files of one capture.
pub fn capture_base_name(timestamp: i64, step: usize) -> String {
    format!("web_{}_{}", timestamp, step)
}

/// Write a snapshot as `{base}.png` + `{base}.json`. Existing files are overwritten.
pub async fn persist_snapshot(
    snapshot: &PageSnapshot,
    output_dir: &Path,
    base_name: &str,
) -> Result<(PathBuf, PathBuf)> {
    let screenshot_path = output_dir.join(format!("{}.png", base_name));
    tokio::fs::write(&screenshot_path, &snapshot.screenshot).await?;

    let tree_path = output_dir.join(format!("{}.json", base_name));
    let json = serde_json::to_vec_pretty(&snapshot.tree)?;
    tokio::fs::write(&tree_path, json).await?;

    Ok((screenshot_path, tree_path))
}

/// Navigate to `url` and capture it top to bottom, one viewport per step.
pub async fn capture_page<S: BrowsingSession + ?Sized>(
    session: &S,
    url: &str,
    output_dir: &Path,
    options: &CaptureOptions,
    cancel: &CancellationToken,
) -> Result<Vec<CaptureRecord>> {
    tokio::fs::create_dir_all(output_dir).await?;

    session.navigate(url).await?;
    wait::wait_for_load(session, &options.wait, cancel).await?;

    let metrics = session.scroll_metrics().await?;
    let (total_height, viewport_height) = (metrics.scroll_height, metrics.viewport_height);
    log::debug!(
        "{}: scroll height {}, viewport {}",
        url,
        total_height,
        viewport_height
    );

    let mut records = Vec::new();
    let mut offset = 0.0;
    let mut step = 0;

    loop {
        let snapshot = take_snapshot(session, options, offset).await?;
        let base_name = capture_base_name(chrono::Utc::now().timestamp(), step);
        let (screenshot_path, tree_path) =
            persist_snapshot(&snapshot, output_dir, &base_name).await?;
        log::info!("  Saved capture {}: {}", step, base_name);

        records.push(CaptureRecord {
            url: url.to_string(),
            step,
            scroll_offset: offset,
            screenshot_path,
            tree_path,
            node_count: snapshot.tree.as_ref().map_or(0, RawNode::count),
            screenshot_hash: compute_hash(&snapshot.screenshot),
        });

        if offset + viewport_height >= total_height || viewport_height <= 0.0 {
            break;
        }

        offset += viewport_height;
        session.scroll_to(offset).await?;
        match wait::wait_for_scroll(
            session,
            offset,
            total_height - viewport_height,
            &options.wait,
            cancel,
        )
        .await
        {
            Ok(()) => {}
            Err(BrowserError::Timeout(t)) => {
                log::warn!("{}: page not settled {:?} after scrolling, capturing anyway", url, t)
            }
            Err(e) => return Err(e),
        }

        step += 1;
        if step >= options.max_scrolls {
            break;
        }
    }

    Ok(records)
}

/// Compute SHA-256 hash of some bytes
fn compute_hash(content: &[u8]) -> String {
    use sha2::{Digest, Sha256};

    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("{:x}", hasher.finalize())
}
