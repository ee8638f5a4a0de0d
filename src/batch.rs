//! Offline extraction over existing corpora
//!
//! Each pass pairs hierarchy documents with their screenshots, normalizes the
//! documents and writes view images. Files are processed in parallel; the only
//! shared state is the progress counter and the summary they fold into.

use crate::error::ExtractError;
use crate::extract::{count_images, extract_views, ExistingPolicy, ExtractOptions, LabelStyle};
use crate::hierarchy::{normalize_file, NormalizeOptions, SourceKind};
use image::{DynamicImage, GenericImageView};
use rayon::prelude::*;
use serde::Serialize;
use std::ops::Add;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use walkdir::WalkDir;

/// Aggregate result of a batch pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    /// Documents found
    pub documents: usize,
    /// View images present in the output after the pass
    pub views: usize,
    /// Documents without a paired raster
    pub skipped: usize,
    /// Documents that could not be parsed, or whose raster could not be read
    pub errors: usize,
}

impl Add for BatchSummary {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            documents: self.documents + other.documents,
            views: self.views + other.views,
            skipped: self.skipped + other.skipped,
            errors: self.errors + other.errors,
        }
    }
}

impl BatchSummary {
    fn views(views: usize) -> Self {
        Self {
            documents: 1,
            views,
            ..Default::default()
        }
    }

    fn skipped() -> Self {
        Self {
            documents: 1,
            skipped: 1,
            ..Default::default()
        }
    }

    fn failed() -> Self {
        Self {
            documents: 1,
            errors: 1,
            ..Default::default()
        }
    }
}

/// One hierarchy document and where its views go.
#[derive(Debug, Clone)]
struct Job {
    document: PathBuf,
    kind: SourceKind,
    raster: Option<PathBuf>,
    /// Annotation canvas, when the boxes need rescaling to the raster
    canvas_image: Option<PathBuf>,
    output_dir: PathBuf,
    screen_id: String,
}

/// Native UI-automation dumps: every `*.xml` under `folder`, paired with the
/// `.jpg` or `.png` of the same stem next to it. Views go to `{parent}/{stem}/`.
pub fn extract_native_corpus(
    folder: &Path,
    normalize: &NormalizeOptions,
    extract: &ExtractOptions,
) -> BatchSummary {
    let jobs: Vec<Job> = WalkDir::new(folder)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file() && has_extension(entry.path(), "xml"))
        .filter_map(|entry| {
            let document = entry.into_path();
            let output_dir = document.parent()?.to_path_buf();
            let screen_id = file_stem(&document)?;
            let raster = ["jpg", "png"]
                .iter()
                .map(|ext| document.with_extension(ext))
                .find(|path| path.is_file());
            Some(Job {
                kind: SourceKind::NativeXml,
                raster,
                canvas_image: None,
                output_dir,
                screen_id,
                document,
            })
        })
        .collect();

    run(jobs, normalize, extract)
}

/// Crawler output: every `*.json` directly in `folder`, paired with the
/// `.png` of the same stem. Views go to `{folder}/{stem}/`.
pub fn extract_web_captures(folder: &Path, extract: &ExtractOptions) -> Result<BatchSummary, ExtractError> {
    let mut jobs = Vec::new();
    for entry in std::fs::read_dir(folder).map_err(|e| ExtractError::io(folder, e))? {
        let document = entry.map_err(|e| ExtractError::io(folder, e))?.path();
        if !document.is_file() || !has_extension(&document, "json") {
            continue;
        }
        let Some(screen_id) = file_stem(&document) else {
            continue;
        };
        let raster = Some(document.with_extension("png")).filter(|path| path.is_file());
        jobs.push(Job {
            kind: SourceKind::WebDom,
            raster,
            canvas_image: None,
            output_dir: folder.to_path_buf(),
            screen_id,
            document,
        });
    }
    jobs.sort_by(|a, b| a.document.cmp(&b.document));

    let extract = ExtractOptions {
        label_style: LabelStyle::Web,
        ..extract.clone()
    };
    Ok(run(jobs, &NormalizeOptions::default(), &extract))
}

/// Rico dataset: `semantic_annotations/{id}.json` annotated on the canvas of
/// `semantic_annotations/{id}.png`, screenshot in `combined/{id}.jpg`.
/// Views go to `views/{id}/`, rescaled from the canvas to the screenshot.
pub fn extract_rico(root: &Path, extract: &ExtractOptions) -> Result<BatchSummary, ExtractError> {
    let annotations = root.join("semantic_annotations");
    let combined = root.join("combined");
    let views = root.join("views");

    let mut jobs = Vec::new();
    for entry in std::fs::read_dir(&annotations).map_err(|e| ExtractError::io(&annotations, e))? {
        let document = entry.map_err(|e| ExtractError::io(&annotations, e))?.path();
        if !has_extension(&document, "json") {
            continue;
        }
        let Some(id) = file_stem(&document) else {
            continue;
        };
        let raster = Some(combined.join(format!("{}.jpg", id))).filter(|path| path.is_file());
        jobs.push(Job {
            kind: SourceKind::RicoJson,
            raster,
            canvas_image: Some(document.with_extension("png")),
            output_dir: views.clone(),
            screen_id: id,
            document,
        });
    }
    jobs.sort_by(|a, b| a.document.cmp(&b.document));

    Ok(run(jobs, &NormalizeOptions::default(), extract))
}

fn run(jobs: Vec<Job>, normalize: &NormalizeOptions, extract: &ExtractOptions) -> BatchSummary {
    let total = jobs.len();
    log::info!("Found {} documents", total);
    let done = AtomicUsize::new(0);

    let summary = jobs
        .par_iter()
        .map(|job| {
            let outcome = process(job, normalize, extract);
            let k = done.fetch_add(1, Ordering::Relaxed) + 1;
            log::info!("({}/{}) {}", k, total, job.document.display());
            outcome
        })
        .reduce(BatchSummary::default, |a, b| a + b);

    log::info!(
        "Done! {} views in total ({} skipped, {} errors)",
        summary.views,
        summary.skipped,
        summary.errors
    );
    summary
}

fn process(job: &Job, normalize: &NormalizeOptions, extract: &ExtractOptions) -> BatchSummary {
    let Some(raster_path) = &job.raster else {
        log::warn!("Image not found for {}", job.document.display());
        return BatchSummary::skipped();
    };

    let screen_dir = job.output_dir.join(&job.screen_id);
    if extract.existing == ExistingPolicy::Skip && screen_dir.is_dir() {
        return match count_images(&screen_dir) {
            Ok(views) => BatchSummary::views(views),
            Err(e) => {
                log::warn!("{}: {}", job.document.display(), e);
                BatchSummary::failed()
            }
        };
    }

    let normalized = normalize_file(&job.document, job.kind, normalize);
    if normalized.error_count > 0 {
        return BatchSummary::failed();
    }

    let result = load_raster(raster_path).and_then(|raster| {
        let mut options = extract.clone();
        if let Some(canvas_image) = &job.canvas_image {
            options.canvas = Some(canvas_size(canvas_image, &raster)?);
        }
        extract_views(&normalized.nodes, &raster, &job.output_dir, &job.screen_id, &options)
    });

    match result {
        Ok(views) => BatchSummary::views(views),
        Err(e) => {
            log::warn!("{}: {}", job.document.display(), e);
            BatchSummary::failed()
        }
    }
}

fn load_raster(path: &Path) -> Result<DynamicImage, ExtractError> {
    image::open(path).map_err(|e| ExtractError::image(path, e))
}

/// Size of the annotation canvas. Falls back to the raster's own size when
/// the canvas image is missing, which disables rescaling.
fn canvas_size(path: &Path, raster: &DynamicImage) -> Result<(u32, u32), ExtractError> {
    if !path.is_file() {
        log::debug!("no canvas image {}, using raster size", path.display());
        return Ok(raster.dimensions());
    }
    image::image_dimensions(path).map_err(|e| ExtractError::image(path, e))
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(ext))
}

fn file_stem(path: &Path) -> Option<String> {
    path.file_stem()?.to_str().map(str::to_string)
}
