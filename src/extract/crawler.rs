use async_trait::async_trait;
use futures::future::join_all;
use std::sync::Arc;

use crate::driver::dispatcher::MemoryAdaptiveDispatcher;
use crate::driver::traits::PageRenderer;
use crate::error::GenError;
use crate::extract::strategy::ExtractionStrategy;
use crate::llm::client::LlmClient;
use crate::parser::types::{DispatchStats, ExtractedElement, UsageStats};

/// Outcome of crawling and extracting one URL
#[derive(Debug, Clone, Default)]
pub struct CrawlResult {
    pub url: String,
    pub success: bool,
    pub error_message: Option<String>,
    pub extracted: Vec<ExtractedElement>,
    pub usage: Option<UsageStats>,
    pub dispatch: Option<DispatchStats>,
}

impl CrawlResult {
    pub fn failure(url: &str, error: &GenError) -> Self {
        Self {
            url: url.to_string(),
            success: false,
            error_message: Some(error.to_string()),
            ..Default::default()
        }
    }
}

/// Render URLs and run an extraction strategy over each
///
/// Failures are reported per URL in the returned results, in input order.
#[async_trait]
pub trait Crawler: Send + Sync {
    /// Called once before the modules of an attempt are crawled
    fn begin_attempt(&self) {}

    async fn crawl_many(&self, urls: &[String], strategy: &ExtractionStrategy) -> Vec<CrawlResult>;
}

/// [`Crawler`] over a browser renderer, gated by the memory-adaptive dispatcher
pub struct WebCrawler {
    renderer: Arc<dyn PageRenderer>,
    llm: Arc<dyn LlmClient>,
    dispatcher: Arc<MemoryAdaptiveDispatcher>,
}

impl WebCrawler {
    pub fn new(
        renderer: Arc<dyn PageRenderer>,
        llm: Arc<dyn LlmClient>,
        dispatcher: Arc<MemoryAdaptiveDispatcher>,
    ) -> Self {
        Self {
            renderer,
            llm,
            dispatcher,
        }
    }

    async fn crawl_one(&self, url: &str, strategy: &ExtractionStrategy) -> CrawlResult {
        let job = || async {
            let page = self.renderer.render(url).await?;
            if let Some(ref title) = page.title {
                log::debug!("Extracting from \"{}\" ({})", title, url);
            }
            strategy.run(self.llm.as_ref(), url, &page.html).await
        };

        match self.dispatcher.dispatch(url, job).await {
            Ok((Ok(output), stats)) => CrawlResult {
                url: url.to_string(),
                success: true,
                error_message: None,
                extracted: output.elements,
                usage: Some(output.total_usage),
                dispatch: Some(stats),
            },
            Ok((Err(e), stats)) => CrawlResult {
                dispatch: Some(stats),
                ..CrawlResult::failure(url, &e)
            },
            Err(e) => CrawlResult::failure(url, &e),
        }
    }
}

#[async_trait]
impl Crawler for WebCrawler {
    fn begin_attempt(&self) {
        self.dispatcher.reset_peak();
    }

    async fn crawl_many(&self, urls: &[String], strategy: &ExtractionStrategy) -> Vec<CrawlResult> {
        log::debug!(
            "Crawling {} url(s) with {} (model {})",
            urls.len(),
            self.renderer.name(),
            self.llm.model()
        );
        join_all(urls.iter().map(|url| self.crawl_one(url, strategy))).await
    }
}
