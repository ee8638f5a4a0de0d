//! View image extraction
//!
//! Crops one image per canonical node out of a screen raster and writes them
//! to `{output_dir}/{screen_id}/{index}_{label}.jpg`.
//!
//! Boxes that fall outside the raster after clipping are skipped quietly: that
//! is what happens when a hierarchy was dumped against a different raster than
//! the screenshot we have (landscape vs portrait, viewport vs full page).

use crate::error::ExtractError;
use crate::hierarchy::CanonicalNode;
use image::{DynamicImage, GenericImageView, ImageFormat};
use std::path::Path;

/// Names Windows refuses to use as file names.
pub const RESERVED_NAMES: [&str; 6] = ["aux", "com1", "com2", "prn", "con", "nul"];

/// What to do when a screen's output directory already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExistingPolicy {
    /// Leave it alone and report how many images it holds
    #[default]
    Skip,
    /// Delete it and extract from scratch
    Regenerate,
}

/// How labels become file name components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LabelStyle {
    /// Class or component names, kept as-is apart from reserved names
    #[default]
    Tag,
    /// Web labels: every non-alphanumeric character becomes `_`
    Web,
}

#[derive(Debug, Clone, Default)]
pub struct ExtractOptions {
    pub existing: ExistingPolicy,
    pub label_style: LabelStyle,
    /// Size of the canvas the boxes were annotated on, if it differs from the raster
    pub canvas: Option<(u32, u32)>,
}

/// One cropped view.
#[derive(Debug, Clone)]
pub struct ViewImage {
    /// Position of the node in the canonical list
    pub source_index: usize,
    pub label: String,
    pub raster: DynamicImage,
}

impl ViewImage {
    pub fn file_name(&self) -> String {
        format!("{}_{}.jpg", self.source_index, self.label)
    }
}

/// Turn a label into a file name component. Path separators never survive;
/// labels starting with a reserved device name get a leading `_`.
pub fn sanitize_label(label: &str, style: LabelStyle) -> String {
    let label: String = match style {
        LabelStyle::Tag => label
            .chars()
            .map(|c| if c == '/' || c == '\\' { '_' } else { c })
            .collect(),
        LabelStyle::Web => label
            .chars()
            .map(|c| if c.is_alphanumeric() { c } else { '_' })
            .collect(),
    };
    let lower = label.to_ascii_lowercase();
    if RESERVED_NAMES.iter().any(|name| lower.starts_with(name)) {
        format!("_{}", label)
    } else {
        label
    }
}

/// Crop every node that still covers some of the raster, in list order.
pub fn crop_views<'a>(
    nodes: &'a [CanonicalNode],
    raster: &'a DynamicImage,
    options: &'a ExtractOptions,
) -> impl Iterator<Item = ViewImage> + 'a {
    let (width, height) = raster.dimensions();
    nodes.iter().enumerate().filter_map(move |(index, node)| {
        let bbox = match options.canvas {
            Some(canvas) => node.bbox.rescale(canvas, (width, height)),
            None => node.bbox,
        };
        let clipped = bbox.clip(width, height)?;
        Some(ViewImage {
            source_index: index,
            label: sanitize_label(&node.label, options.label_style),
            raster: raster.crop_imm(
                clipped.x1 as u32,
                clipped.y1 as u32,
                clipped.width() as u32,
                clipped.height() as u32,
            ),
        })
    })
}

/// Count the `.jpg` files in a directory.
pub fn count_images(dir: &Path) -> Result<usize, ExtractError> {
    let entries = std::fs::read_dir(dir).map_err(|e| ExtractError::io(dir, e))?;
    Ok(entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "jpg"))
        .count())
}

/// Write the view images of one screen. Returns how many images the screen
/// directory holds afterwards.
pub fn extract_views(
    nodes: &[CanonicalNode],
    raster: &DynamicImage,
    output_dir: &Path,
    screen_id: &str,
    options: &ExtractOptions,
) -> Result<usize, ExtractError> {
    let screen_dir = output_dir.join(screen_id);
    if screen_dir.exists() {
        match options.existing {
            ExistingPolicy::Skip => {
                log::debug!("{} already extracted, skipping", screen_dir.display());
                return count_images(&screen_dir);
            }
            ExistingPolicy::Regenerate => {
                std::fs::remove_dir_all(&screen_dir)
                    .map_err(|e| ExtractError::io(&screen_dir, e))?;
            }
        }
    }
    std::fs::create_dir_all(&screen_dir).map_err(|e| ExtractError::io(&screen_dir, e))?;

    let mut written = 0;
    for view in crop_views(nodes, raster, options) {
        let path = screen_dir.join(view.file_name());
        // JPEG has no alpha channel
        let rgb = DynamicImage::ImageRgb8(view.raster.to_rgb8());
        match rgb.save_with_format(&path, ImageFormat::Jpeg) {
            Ok(()) => written += 1,
            Err(e) => log::warn!("failed to write view image {}: {}", path.display(), e),
        }
    }

    log::debug!("{} views written to {}", written, screen_dir.display());
    Ok(written)
}
