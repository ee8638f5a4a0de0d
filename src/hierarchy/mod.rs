//! Hierarchy normalization
//!
//! Turns the three hierarchy dump formats we collect into one flat, ordered
//! list of [`CanonicalNode`]s:
//!
//! - native UI-automation XML (`class`, `bounds="[x1,y1][x2,y2]"`, visibility attributes)
//! - Rico-style JSON (`componentLabel`, `bounds`, `children`)
//! - web DOM JSON written by the page capturer (same tree convention, HTML tag labels)
//!
//! Each format decides visibility differently, so every format gets its own
//! extraction rule. The only thing they share is the output shape.
//!
//! Malformed documents never raise: they produce an empty list and bump
//! [`Normalized::error_count`] so a corpus pass can keep going.

mod native;
mod tree;

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default guard on how deep a tree walk may descend.
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// Labels that mark an element as interactive in tree (JSON) sources.
pub const INTERACTIVE_TAGS: [&str; 5] = ["a", "button", "input", "select", "textarea"];

/// Pixel rectangle `(x1, y1, x2, y2)` with `x1 <= x2` and `y1 <= y2`.
///
/// Serialized as a four-element array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "[i64; 4]", into = "[i64; 4]")]
pub struct BoundingBox {
    pub x1: i64,
    pub y1: i64,
    pub x2: i64,
    pub y2: i64,
}

impl BoundingBox {
    /// Returns `None` when the corners are inverted.
    pub fn new(x1: i64, y1: i64, x2: i64, y2: i64) -> Option<Self> {
        if x1 <= x2 && y1 <= y2 {
            Some(Self { x1, y1, x2, y2 })
        } else {
            None
        }
    }

    pub fn width(&self) -> i64 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> i64 {
        self.y2 - self.y1
    }

    /// Rescale from an annotation canvas to a target raster.
    ///
    /// Each axis is scaled independently and truncated to whole pixels.
    pub fn rescale(&self, canvas: (u32, u32), target: (u32, u32)) -> Self {
        let (cw, ch) = (f64::from(canvas.0.max(1)), f64::from(canvas.1.max(1)));
        let (tw, th) = (f64::from(target.0), f64::from(target.1));
        let sx = |v: i64| (v as f64 * tw / cw) as i64;
        let sy = |v: i64| (v as f64 * th / ch) as i64;
        Self {
            x1: sx(self.x1),
            y1: sy(self.y1),
            x2: sx(self.x2),
            y2: sy(self.y2),
        }
    }

    /// Clamp every coordinate into `[0, width] x [0, height]`.
    ///
    /// Returns `None` if nothing with positive area is left.
    pub fn clip(&self, width: u32, height: u32) -> Option<Self> {
        let (w, h) = (i64::from(width), i64::from(height));
        let clipped = Self {
            x1: self.x1.clamp(0, w),
            y1: self.y1.clamp(0, h),
            x2: self.x2.clamp(0, w),
            y2: self.y2.clamp(0, h),
        };
        if clipped.x2 <= clipped.x1 || clipped.y2 <= clipped.y1 {
            None
        } else {
            Some(clipped)
        }
    }
}

impl TryFrom<[i64; 4]> for BoundingBox {
    type Error = String;

    fn try_from(v: [i64; 4]) -> Result<Self, Self::Error> {
        Self::new(v[0], v[1], v[2], v[3]).ok_or_else(|| format!("inverted box {:?}", v))
    }
}

impl From<BoundingBox> for [i64; 4] {
    fn from(b: BoundingBox) -> Self {
        [b.x1, b.y1, b.x2, b.y2]
    }
}

/// The normalized element record shared by every source format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalNode {
    /// Tag or class name
    pub label: String,

    #[serde(rename = "box")]
    pub bbox: BoundingBox,

    pub visible: bool,

    #[serde(default)]
    pub text: String,

    pub interactable: bool,

    /// Indices of the nearest retained descendants in the flat list, in source order
    #[serde(skip)]
    pub children: Vec<usize>,
}

/// Which hierarchy convention a document follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    NativeXml,
    RicoJson,
    WebDom,
}

impl SourceKind {
    /// Guess from the file extension: `.xml` is native, `.json` is web DOM.
    ///
    /// Rico files are also `.json`; callers working on the Rico dataset say so explicitly.
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
            "xml" => Some(Self::NativeXml),
            "json" => Some(Self::WebDom),
            _ => None,
        }
    }
}

/// A raw hierarchy document tagged with its source convention.
#[derive(Debug, Clone, Copy)]
pub enum SourceDocument<'a> {
    NativeXml(&'a str),
    RicoJson(&'a str),
    WebDom(&'a str),
}

impl<'a> SourceDocument<'a> {
    pub fn new(kind: SourceKind, raw: &'a str) -> Self {
        match kind {
            SourceKind::NativeXml => Self::NativeXml(raw),
            SourceKind::RicoJson => Self::RicoJson(raw),
            SourceKind::WebDom => Self::WebDom(raw),
        }
    }

    pub fn kind(&self) -> SourceKind {
        match self {
            Self::NativeXml(_) => SourceKind::NativeXml,
            Self::RicoJson(_) => SourceKind::RicoJson,
            Self::WebDom(_) => SourceKind::WebDom,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NormalizeOptions {
    /// Keep only nodes that pass the format's visibility rule (native XML only)
    pub only_visible: bool,

    /// Skip the device visibility attribute and rely on class-name heuristics (native XML only)
    pub naive: bool,

    /// Nodes deeper than this are ignored
    pub max_depth: usize,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            only_visible: true,
            naive: false,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// Result of normalizing one document.
#[derive(Debug, Clone, Default)]
pub struct Normalized {
    pub nodes: Vec<CanonicalNode>,
    pub error_count: usize,
}

impl Normalized {
    fn failed() -> Self {
        Self {
            nodes: Vec::new(),
            error_count: 1,
        }
    }
}

/// Normalize one hierarchy document into canonical nodes.
pub fn normalize(source: SourceDocument<'_>, options: &NormalizeOptions) -> Normalized {
    match read_nodes(source, options) {
        Ok(nodes) => Normalized {
            nodes,
            error_count: 0,
        },
        Err(e) => {
            log::warn!("invalid {:?} document: {}", source.kind(), e);
            Normalized::failed()
        }
    }
}

/// Read and normalize a file. Unreadable files count as parse errors.
pub fn normalize_file(path: &Path, kind: SourceKind, options: &NormalizeOptions) -> Normalized {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) => {
            log::warn!("cannot read {}: {}", path.display(), e);
            return Normalized::failed();
        }
    };

    match read_nodes(SourceDocument::new(kind, &raw), options) {
        Ok(nodes) => {
            log::debug!("extracted {} nodes from {}", nodes.len(), path.display());
            Normalized {
                nodes,
                error_count: 0,
            }
        }
        Err(e) => {
            log::warn!("invalid {:?} document {}: {}", kind, path.display(), e);
            Normalized::failed()
        }
    }
}

fn read_nodes(
    source: SourceDocument<'_>,
    options: &NormalizeOptions,
) -> Result<Vec<CanonicalNode>, String> {
    match source {
        SourceDocument::NativeXml(raw) => native::read_nodes(raw, options),
        SourceDocument::RicoJson(raw) | SourceDocument::WebDom(raw) => {
            tree::read_nodes(raw, options.max_depth)
        }
    }
}

/// Persist a canonical node list as a JSON array of `{label, box, visible, text, interactable}`.
pub fn write_node_list(path: &Path, nodes: &[CanonicalNode]) -> Result<(), crate::ExtractError> {
    let json = serde_json::to_string_pretty(nodes)?;
    std::fs::write(path, json).map_err(|e| crate::ExtractError::io(path, e))
}

/// Load a list written by [`write_node_list`]. Child links are not persisted.
pub fn read_node_list(path: &Path) -> Result<Vec<CanonicalNode>, crate::ExtractError> {
    let raw = std::fs::read_to_string(path).map_err(|e| crate::ExtractError::io(path, e))?;
    Ok(serde_json::from_str(&raw)?)
}

/// Links a newly retained node to its nearest retained ancestor.
pub(crate) fn attach(nodes: &mut Vec<CanonicalNode>, parent: Option<usize>, node: CanonicalNode) -> usize {
    let index = nodes.len();
    nodes.push(node);
    if let Some(parent) = parent {
        nodes[parent].children.push(index);
    }
    index
}
