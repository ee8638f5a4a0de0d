pub mod batch;
pub mod browser;
pub mod capture;
pub mod crawl;
pub mod error;
pub mod extract;
pub mod hierarchy;

//  Re-export commonly used items
pub use batch::{extract_native_corpus, extract_rico, extract_web_captures, BatchSummary};
pub use browser::{BrowsingSession, ChromeDriver, ConnectionMode, ReadinessWait};
pub use capture::{capture_page, CaptureOptions, CaptureRecord, CoordinateSpace, PageSnapshot, RawNode};
pub use crawl::{canonicalize_url, crawl, CrawlOptions, CrawlState};
pub use error::{BrowserError, ExtractError};
pub use extract::{extract_views, ExistingPolicy, ExtractOptions, LabelStyle, ViewImage};
pub use hierarchy::{
    normalize, normalize_file, BoundingBox, CanonicalNode, NormalizeOptions, Normalized,
    SourceDocument, SourceKind,
};
