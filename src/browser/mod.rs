pub mod chrome;
pub mod session;
pub mod wait;

pub use chrome::{ChromeDriver, ConnectionMode};
pub use session::{BrowsingSession, ElementInfo, Rect, ScrollMetrics};
pub use wait::ReadinessWait;
