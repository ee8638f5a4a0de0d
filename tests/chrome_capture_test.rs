//! End-to-end capture with a real Chrome against the local test server
//!
//! These need a Chrome/Chromium install, so they only run on request:
//! `cargo test -- --ignored`


use std::time::Duration;
use test_server::TestServer;
use tokio_util::sync::CancellationToken;
use uihash_capture::capture::capture_page;
use uihash_capture::hierarchy::{normalize, NormalizeOptions, SourceDocument};
use uihash_capture::{crawl, CaptureOptions, ChromeDriver, ConnectionMode, CrawlOptions, ReadinessWait};

/// Helper to create a headless driver for testing
async fn create_headless_driver() -> anyhow::Result<ChromeDriver> {
    ChromeDriver::new(ConnectionMode::Sandboxed {
        chrome_path: None,
        no_sandbox: true,
        headless: true,
    })
    .await
    .map_err(|e| anyhow::anyhow!("Failed to launch Chrome: {}", e))
}

fn wait() -> ReadinessWait {
    ReadinessWait {
        timeout: Duration::from_secs(10),
        poll_interval: Duration::from_millis(100),
    }
}

#[tokio::test]
#[ignore = "needs a local Chrome"]
async fn test_capture_scrolls_tall_page() -> anyhow::Result<()> {
    let server = TestServer::start().await;
    server.wait_ready().await?;
    let driver = create_headless_driver().await?;
    let out = tempfile::tempdir()?;

    let options = CaptureOptions {
        max_scrolls: 5,
        wait: wait(),
        ..Default::default()
    };
    let records = capture_page(&driver, &server.url(), out.path(), &options, &CancellationToken::new()).await?;

    assert!(records.len() >= 2, "3000px page should need more than one viewport");
    for record in &records {
        let png = std::fs::read(&record.screenshot_path)?;
        assert_eq!(&png[..4], b"\x89PNG");
    }

    let raw = std::fs::read_to_string(&records[0].tree_path)?;
    let normalized = normalize(SourceDocument::WebDom(&raw), &NormalizeOptions::default());
    assert_eq!(normalized.error_count, 0);
    assert_eq!(normalized.nodes[0].label, "body");
    let buttons: Vec<_> = normalized
        .nodes
        .iter()
        .filter(|n| n.label == "button")
        .map(|n| n.text.as_str())
        .collect();
    assert_eq!(buttons, vec!["Visible"]);

    driver.close().await?;
    Ok(())
}

#[tokio::test]
#[ignore = "needs a local Chrome"]
async fn test_crawl_local_site() -> anyhow::Result<()> {
    let server = TestServer::start().await;
    server.wait_ready().await?;
    let driver = create_headless_driver().await?;
    let out = tempfile::tempdir()?;

    let options = CrawlOptions {
        max_pages: 10,
        max_scrolls: 1,
        wait: wait(),
        ..Default::default()
    };
    let pages = crawl(&driver, &server.url(), out.path(), &options, &CancellationToken::new()).await?;

    // home, page2, page3; the fragment link and the off-site link are not followed
    assert_eq!(pages, 3);

    driver.close().await?;
    Ok(())
}
