//! Normalize + extract on small hand-made screens

use image::{DynamicImage, GenericImageView, Rgb, RgbImage};
use std::path::Path;
use uihash_capture::extract::count_images;
use uihash_capture::hierarchy::{normalize, NormalizeOptions, SourceDocument};
use uihash_capture::{extract_views, ExistingPolicy, ExtractOptions, LabelStyle};

const RICO_BUTTON: &str = r#"{"componentLabel":"button","bounds":[0,0,10,20],"children":[]}"#;

fn raster(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x * 20) as u8, (y * 10) as u8, 90])
    }))
}

fn listing(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[test]
fn test_rico_button_covers_whole_raster() -> anyhow::Result<()> {
    let out = tempfile::tempdir()?;
    let normalized = normalize(SourceDocument::RicoJson(RICO_BUTTON), &NormalizeOptions::default());
    assert_eq!(normalized.nodes.len(), 1);

    let written = extract_views(&normalized.nodes, &raster(10, 20), out.path(), "screen", &ExtractOptions::default())?;

    assert_eq!(written, 1);
    let screen_dir = out.path().join("screen");
    assert_eq!(listing(&screen_dir), vec!["0_button.jpg"]);
    let view = image::open(screen_dir.join("0_button.jpg"))?;
    assert_eq!(view.dimensions(), (10, 20));
    Ok(())
}

#[test]
fn test_skip_existing_writes_nothing() -> anyhow::Result<()> {
    let out = tempfile::tempdir()?;
    let normalized = normalize(SourceDocument::RicoJson(RICO_BUTTON), &NormalizeOptions::default());
    let first = extract_views(&normalized.nodes, &raster(10, 20), out.path(), "screen", &ExtractOptions::default())?;

    let screen_dir = out.path().join("screen");
    let before = std::fs::metadata(screen_dir.join("0_button.jpg"))?.modified()?;

    let more = normalize(
        SourceDocument::RicoJson(
            r#"[{"componentLabel":"button","bounds":[0,0,10,20]},{"componentLabel":"icon","bounds":[0,0,5,5]}]"#,
        ),
        &NormalizeOptions::default(),
    );
    let second = extract_views(&more.nodes, &raster(10, 20), out.path(), "screen", &ExtractOptions::default())?;

    assert_eq!(first, 1);
    assert_eq!(second, 1);
    assert_eq!(listing(&screen_dir), vec!["0_button.jpg"]);
    assert_eq!(std::fs::metadata(screen_dir.join("0_button.jpg"))?.modified()?, before);
    Ok(())
}

#[test]
fn test_regenerate_replaces_directory() -> anyhow::Result<()> {
    let out = tempfile::tempdir()?;
    let screen_dir = out.path().join("screen");
    std::fs::create_dir_all(&screen_dir)?;
    std::fs::write(screen_dir.join("7_stale.jpg"), b"old")?;
    assert_eq!(count_images(&screen_dir)?, 1);

    let normalized = normalize(
        SourceDocument::WebDom(
            r#"{"componentLabel":"body","bounds":[0,0,40,40],"children":[
                {"componentLabel":"nav-bar","bounds":[0,0,40,10]},
                {"componentLabel":"con","bounds":[0,10,20,20]}
            ]}"#,
        ),
        &NormalizeOptions::default(),
    );
    let options = ExtractOptions {
        existing: ExistingPolicy::Regenerate,
        label_style: LabelStyle::Web,
        ..Default::default()
    };
    let written = extract_views(&normalized.nodes, &raster(40, 40), out.path(), "screen", &options)?;

    assert_eq!(written, 3);
    assert_eq!(
        listing(&screen_dir),
        vec!["0_body.jpg", "1_nav_bar.jpg", "2__con.jpg"]
    );
    Ok(())
}

#[test]
fn test_mismatched_raster_skips_outside_views() -> anyhow::Result<()> {
    let out = tempfile::tempdir()?;
    let normalized = normalize(
        SourceDocument::RicoJson(
            r#"{"componentLabel":"root","bounds":[0,0,1440,2560],"children":[
                {"componentLabel":"top","bounds":[0,0,100,100]},
                {"componentLabel":"bottom","bounds":[0,2000,100,2100]}
            ]}"#,
        ),
        &NormalizeOptions::default(),
    );

    let written = extract_views(&normalized.nodes, &raster(200, 300), out.path(), "landscape", &ExtractOptions::default())?;

    assert_eq!(written, 2);
    assert_eq!(listing(&out.path().join("landscape")), vec!["0_root.jpg", "1_top.jpg"]);
    Ok(())
}

#[test]
fn test_rescaled_annotation_canvas() -> anyhow::Result<()> {
    let out = tempfile::tempdir()?;
    let normalized = normalize(
        SourceDocument::RicoJson(r#"{"componentLabel":"Icon","bounds":[100,200,300,400]}"#),
        &NormalizeOptions::default(),
    );
    let options = ExtractOptions {
        canvas: Some((1000, 2000)),
        ..Default::default()
    };

    extract_views(&normalized.nodes, &raster(500, 1000), out.path(), "scaled", &options)?;

    let view = image::open(out.path().join("scaled").join("0_Icon.jpg"))?;
    assert_eq!(view.dimensions(), (100, 100));
    Ok(())
}
