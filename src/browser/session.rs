//! The capability set the capture pipeline needs from a browser.
//!
//! [`ChromeDriver`](super::ChromeDriver) implements it over CDP; tests drive
//! the crawler and capturer with scripted sessions instead.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Element rectangle in CSS pixels, relative to the document origin.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// What the capturer reads from one element.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ElementInfo {
    /// Lowercase tag name
    pub tag: String,
    pub rect: Rect,
    /// Whether the element is rendered (display, visibility, opacity)
    pub displayed: bool,
    /// Trimmed text of the element's own text nodes
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrollMetrics {
    /// Total scrollable height of the document
    pub scroll_height: f64,
    /// Height of the visible viewport
    pub viewport_height: f64,
}

#[async_trait]
pub trait BrowsingSession: Send + Sync {
    /// Handle to a live DOM element
    type Element: Send + Sync;

    /// Start loading `url`. Does not wait for the page to finish rendering.
    async fn navigate(&self, url: &str) -> Result<()>;

    /// Readiness check: true once the current document has finished loading.
    async fn is_ready(&self) -> Result<bool>;

    async fn scroll_metrics(&self) -> Result<ScrollMetrics>;

    /// Current vertical scroll offset.
    async fn scroll_offset(&self) -> Result<f64>;

    async fn scroll_to(&self, offset: f64) -> Result<()>;

    /// PNG screenshot of the current viewport.
    async fn screenshot(&self) -> Result<Vec<u8>>;

    /// First of `body`, `frameset`, `html` present in the document.
    async fn root_element(&self) -> Result<Option<Self::Element>>;

    async fn describe(&self, element: &Self::Element) -> Result<ElementInfo>;

    /// Direct children in document order.
    async fn children(&self, element: &Self::Element) -> Result<Vec<Self::Element>>;

    /// Resolved `href` of every anchor on the page.
    async fn link_targets(&self) -> Result<Vec<String>>;
}
