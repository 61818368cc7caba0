pub mod crawler;
pub mod html;
pub mod strategy;

pub use crawler::{CrawlResult, Crawler, WebCrawler};
pub use strategy::{ExtractionConfig, ExtractionOutput, ExtractionStrategy};
