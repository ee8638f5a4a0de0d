//! Offline batch passes over small on-disk corpora

use image::{Rgb, RgbImage};
use std::path::Path;
use uihash_capture::extract::count_images;
use uihash_capture::{
    extract_native_corpus, extract_rico, extract_web_captures, BatchSummary, ExistingPolicy,
    ExtractOptions, NormalizeOptions,
};

fn save_image(path: &Path, width: u32, height: u32) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    RgbImage::from_pixel(width, height, Rgb([30, 60, 90]))
        .save(path)
        .unwrap();
}

const WEB_TREE: &str = r#"{
    "componentLabel": "body",
    "bounds": [0, 0, 100, 80],
    "children": [
        {"componentLabel": "a", "bounds": [10, 10, 50, 30], "text": "Home", "children": []},
        {"componentLabel": "img", "bounds": [0, 500, 100, 600], "children": []}
    ]
}"#;

#[test]
fn test_web_captures_pass() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    std::fs::write(dir.path().join("web_1700000000_0.json"), WEB_TREE)?;
    save_image(&dir.path().join("web_1700000000_0.png"), 100, 80);
    // orphan from an interrupted capture
    std::fs::write(dir.path().join("web_1700000000_1.json"), WEB_TREE)?;
    std::fs::write(dir.path().join("web_1700000001_0.json"), "{ not json")?;
    save_image(&dir.path().join("web_1700000001_0.png"), 100, 80);

    let summary = extract_web_captures(dir.path(), &ExtractOptions::default())?;

    assert_eq!(
        summary,
        BatchSummary {
            documents: 3,
            views: 2,
            skipped: 1,
            errors: 1,
        }
    );
    assert_eq!(count_images(&dir.path().join("web_1700000000_0"))?, 2);
    assert!(!dir.path().join("web_1700000000_1").exists());
    assert!(!dir.path().join("web_1700000001_0").exists());
    Ok(())
}

#[test]
fn test_web_pass_rerun_skips_existing() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    std::fs::write(dir.path().join("web_1_0.json"), WEB_TREE)?;
    save_image(&dir.path().join("web_1_0.png"), 100, 80);

    let first = extract_web_captures(dir.path(), &ExtractOptions::default())?;
    let second = extract_web_captures(dir.path(), &ExtractOptions::default())?;
    let regenerated = extract_web_captures(
        dir.path(),
        &ExtractOptions {
            existing: ExistingPolicy::Regenerate,
            ..Default::default()
        },
    )?;

    assert_eq!(first.views, 2);
    assert_eq!(second.views, 2);
    assert_eq!(regenerated.views, 2);
    Ok(())
}

#[test]
fn test_rerun_skips_before_parsing() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    std::fs::write(dir.path().join("web_2_0.json"), WEB_TREE)?;
    save_image(&dir.path().join("web_2_0.png"), 100, 80);
    extract_web_captures(dir.path(), &ExtractOptions::default())?;

    // the document went bad after its views were extracted
    std::fs::write(dir.path().join("web_2_0.json"), "{ truncated")?;
    let rerun = extract_web_captures(dir.path(), &ExtractOptions::default())?;

    assert_eq!(
        rerun,
        BatchSummary {
            documents: 1,
            views: 2,
            skipped: 0,
            errors: 0,
        }
    );

    let regenerated = extract_web_captures(
        dir.path(),
        &ExtractOptions {
            existing: ExistingPolicy::Regenerate,
            ..Default::default()
        },
    )?;
    assert_eq!(regenerated.errors, 1);
    Ok(())
}

const NATIVE_DUMP: &str = r#"<?xml version='1.0' encoding='UTF-8' standalone='yes' ?>
<hierarchy rotation="0">
  <node class="android.widget.FrameLayout" bounds="[0,0][60,120]" visible-to-user="true">
    <node class="android.widget.Button" text="Go" bounds="[10,10][50,40]" visible-to-user="true" clickable="true" />
    <node class="android.widget.TextView" text="" bounds="[10,50][50,60]" visible-to-user="true" />
    <node class="android.widget.ImageView" bounds="[10,70][50,110]" visible-to-user="false" />
  </node>
</hierarchy>"#;

#[test]
fn test_native_corpus_pass() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let app = dir.path().join("com.example.app");
    std::fs::create_dir_all(&app)?;
    std::fs::write(app.join("main.xml"), NATIVE_DUMP)?;
    save_image(&app.join("main.jpg"), 60, 120);
    std::fs::write(app.join("settings.xml"), NATIVE_DUMP)?;
    save_image(&app.join("settings.png"), 60, 120);
    std::fs::write(app.join("orphan.xml"), NATIVE_DUMP)?;

    let summary = extract_native_corpus(dir.path(), &NormalizeOptions::default(), &ExtractOptions::default());

    assert_eq!(summary.documents, 3);
    assert_eq!(summary.views, 2);
    assert_eq!(summary.skipped, 1);
    assert_eq!(count_images(&app.join("main"))?, 1);
    assert!(app.join("settings").join("0_android.widget.Button.jpg").is_file());

    let naive = NormalizeOptions {
        naive: true,
        ..Default::default()
    };
    let regenerate = ExtractOptions {
        existing: ExistingPolicy::Regenerate,
        ..Default::default()
    };
    let summary = extract_native_corpus(dir.path(), &naive, &regenerate);
    assert_eq!(summary.views, 4);
    Ok(())
}

#[test]
fn test_rico_pass_rescales_to_screenshot() -> anyhow::Result<()> {
    let root = tempfile::tempdir()?;
    let annotations = root.path().join("semantic_annotations");
    std::fs::create_dir_all(&annotations)?;
    std::fs::write(
        annotations.join("42.json"),
        r#"{"componentLabel":"Toolbar","bounds":[0,0,200,100],"children":[
            {"componentLabel":"Icon","bounds":[100,200,300,400]}
        ]}"#,
    )?;
    save_image(&annotations.join("42.png"), 1000, 2000);
    save_image(&root.path().join("combined").join("42.jpg"), 500, 1000);
    std::fs::write(annotations.join("43.json"), "{}")?;
    save_image(&annotations.join("43.png"), 1000, 2000);

    let summary = extract_rico(root.path(), &ExtractOptions::default())?;

    assert_eq!(summary.documents, 2);
    assert_eq!(summary.views, 2);
    assert_eq!(summary.skipped, 1);

    let icon = image::open(root.path().join("views").join("42").join("1_Icon.jpg"))?;
    assert_eq!((icon.width(), icon.height()), (100, 100));
    let toolbar = image::open(root.path().join("views").join("42").join("0_Toolbar.jpg"))?;
    assert_eq!((toolbar.width(), toolbar.height()), (100, 50));
    Ok(())
}

#[test]
fn test_rico_labels_with_slashes() -> anyhow::Result<()> {
    let root = tempfile::tempdir()?;
    let annotations = root.path().join("semantic_annotations");
    std::fs::create_dir_all(&annotations)?;
    std::fs::write(
        annotations.join("7.json"),
        r#"{"componentLabel":"On/Off Switch","bounds":[0,0,10,20]}"#,
    )?;
    save_image(&annotations.join("7.png"), 10, 20);
    save_image(&root.path().join("combined").join("7.jpg"), 10, 20);

    let summary = extract_rico(root.path(), &ExtractOptions::default())?;

    assert_eq!(summary.views, 1);
    assert!(root.path().join("views").join("7").join("0_On_Off Switch.jpg").is_file());
    Ok(())
}

#[test]
fn test_missing_rico_layout_is_an_error() {
    let root = tempfile::tempdir().unwrap();
    assert!(extract_rico(root.path(), &ExtractOptions::default()).is_err());
}
