use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use uihash_capture::{
    batch, crawl, hierarchy, BatchSummary, ChromeDriver, ConnectionMode, CoordinateSpace,
    CrawlOptions, ExistingPolicy, ExtractOptions, NormalizeOptions, SourceKind,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl a site and save screenshot + DOM tree pairs
    Crawl {
        /// Seed URL; only links on its host are followed
        url: String,

        /// Output directory for the capture pairs
        #[arg(short, long, default_value = "web_data")]
        output: PathBuf,

        /// Maximum number of pages to capture
        #[arg(long, default_value_t = 10)]
        pages: usize,

        /// Maximum scroll steps per page
        #[arg(long, default_value_t = 3)]
        scrolls: usize,

        /// Record element boxes relative to the visible viewport instead of the document
        #[arg(long)]
        viewport_coords: bool,

        /// Run Chrome without a window
        #[arg(long)]
        headless: bool,

        /// Disable the Chrome sandbox (needed in most containers)
        #[arg(long)]
        no_sandbox: bool,

        /// Chrome binary to launch instead of the system one
        #[arg(long)]
        chrome_path: Option<String>,

        /// Connect to a Chrome already listening on this debug port
        #[arg(long, conflicts_with_all = ["headless", "no_sandbox", "chrome_path"])]
        debug_port: Option<u16>,
    },

    /// Extract view images from native UI-automation XML dumps
    Extract {
        /// Folder searched recursively for `.xml` + screenshot pairs
        dir: PathBuf,

        /// Dumps come from plain adb, which has no visible-to-user attribute
        #[arg(long)]
        naive: bool,

        /// Delete and redo screens that were already extracted
        #[arg(long)]
        regenerate: bool,

        /// Keep every node with a box, not just the visible leaves
        #[arg(long)]
        all_nodes: bool,
    },

    /// Extract view images from crawler output
    ExtractWeb {
        dir: PathBuf,

        #[arg(long)]
        regenerate: bool,
    },

    /// Extract view images from the Rico dataset
    ExtractRico {
        /// Folder holding `semantic_annotations/` and `combined/`
        root: PathBuf,

        #[arg(long)]
        regenerate: bool,
    },

    /// Print or save the canonical node list of one hierarchy file
    Normalize {
        file: PathBuf,

        #[arg(long)]
        naive: bool,

        #[arg(long)]
        all_nodes: bool,

        /// Write the list here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    match args.command {
        Command::Crawl {
            url,
            output,
            pages,
            scrolls,
            viewport_coords,
            headless,
            no_sandbox,
            chrome_path,
            debug_port,
        } => {
            let mode = match debug_port {
                Some(port) => ConnectionMode::DebugPort(port),
                None => ConnectionMode::Sandboxed {
                    chrome_path,
                    no_sandbox,
                    headless,
                },
            };
            let options = CrawlOptions {
                max_pages: pages,
                max_scrolls: scrolls,
                coordinates: if viewport_coords {
                    CoordinateSpace::Viewport
                } else {
                    CoordinateSpace::Document
                },
                ..Default::default()
            };
            run_crawl(mode, &url, output, options).await
        }
        Command::Extract {
            dir,
            naive,
            regenerate,
            all_nodes,
        } => {
            let normalize = NormalizeOptions {
                only_visible: !all_nodes,
                naive,
                ..Default::default()
            };
            let summary = tokio::task::spawn_blocking(move || {
                batch::extract_native_corpus(&dir, &normalize, &extract_options(regenerate))
            })
            .await?;
            report(summary);
            Ok(())
        }
        Command::ExtractWeb { dir, regenerate } => {
            let summary = tokio::task::spawn_blocking(move || {
                batch::extract_web_captures(&dir, &extract_options(regenerate))
            })
            .await??;
            report(summary);
            Ok(())
        }
        Command::ExtractRico { root, regenerate } => {
            let summary = tokio::task::spawn_blocking(move || {
                batch::extract_rico(&root, &extract_options(regenerate))
            })
            .await??;
            report(summary);
            Ok(())
        }
        Command::Normalize {
            file,
            naive,
            all_nodes,
            output,
        } => {
            let kind = SourceKind::from_path(&file)
                .with_context(|| format!("unknown hierarchy format: {}", file.display()))?;
            let options = NormalizeOptions {
                only_visible: !all_nodes,
                naive,
                ..Default::default()
            };
            let normalized = hierarchy::normalize_file(&file, kind, &options);
            if normalized.error_count > 0 {
                anyhow::bail!("failed to parse {}", file.display());
            }
            match output {
                Some(path) => {
                    hierarchy::write_node_list(&path, &normalized.nodes)?;
                    log::info!("{} nodes written to {}", normalized.nodes.len(), path.display());
                }
                None => println!("{}", serde_json::to_string_pretty(&normalized.nodes)?),
            }
            Ok(())
        }
    }
}

async fn run_crawl(
    mode: ConnectionMode,
    url: &str,
    output: PathBuf,
    options: CrawlOptions,
) -> anyhow::Result<()> {
    let driver = ChromeDriver::new(mode)
        .await
        .context("Failed to start Chrome session")?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("Interrupted, stopping after the current step");
            on_signal.cancel();
        }
    });

    let result = crawl::crawl(&driver, url, &output, &options, &cancel).await;

    if let Err(e) = driver.close().await {
        log::warn!("Failed to close Chrome: {}", e);
    }

    let pages = result?;
    println!("Captured {} pages into {}", pages, output.display());
    Ok(())
}

fn extract_options(regenerate: bool) -> ExtractOptions {
    ExtractOptions {
        existing: if regenerate {
            ExistingPolicy::Regenerate
        } else {
            ExistingPolicy::Skip
        },
        ..Default::default()
    }
}

fn report(summary: BatchSummary) {
    println!(
        "done! {} views in total from {} documents ({} skipped, {} errors)",
        summary.views, summary.documents, summary.skipped, summary.errors
    );
}
