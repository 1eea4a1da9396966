pub mod analysis;
pub mod chat;
pub mod result;
pub mod source;

pub use analysis::{QueryAnalysis, SearchHit};
pub use chat::ChatEntry;
pub use result::{ContentStats, MetricsTimer, ScrapeMethod, ScrapeMetrics, ScrapeResult, UNTITLED};
pub use source::SourceDocument;
