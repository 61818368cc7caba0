//! Page renderer using Playwright
//!
//! One browser and one page are launched per run. Renders are serialized on
//! the page lock; the dispatcher decides how many crawls wait for it.

use async_trait::async_trait;
use colored::Colorize;
use playwright::api::{Browser, BrowserContext, Page, Viewport};
use playwright::Playwright;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::driver::traits::{PageRenderer, RenderedPage};
use crate::error::{GenError, GenResult};

/// Web Driver configuration
#[derive(Debug, Clone, PartialEq)]
pub struct WebDriverConfig {
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,
    /// Navigation timeout per page
    pub page_timeout_ms: u64,
    /// Browser binary to launch instead of the discovered one
    pub executable_path: Option<PathBuf>,
}

impl Default for WebDriverConfig {
    fn default() -> Self {
        Self {
            headless: true,
            viewport_width: 1280,
            viewport_height: 720,
            page_timeout_ms: 60_000,
            executable_path: None,
        }
    }
}

/// Headless browser rendering pages for extraction
pub struct WebDriver {
    #[allow(dead_code)]
    playwright: Arc<Playwright>,
    #[allow(dead_code)]
    browser: Arc<Browser>,
    #[allow(dead_code)]
    context: Arc<BrowserContext>,
    page: Arc<Mutex<Page>>,
    config: WebDriverConfig,
}

impl WebDriver {
    /// Launch Chromium with a single page
    pub async fn new(config: WebDriverConfig) -> GenResult<Self> {
        let playwright = Playwright::initialize()
            .await
            .map_err(|e| GenError::Browser(format!("Failed to initialize Playwright: {e}")))?;

        let browser = launch_chromium_browser(&playwright.chromium(), &config).await?;

        let context = browser
            .context_builder()
            .build()
            .await
            .map_err(browser_error)?;
        let page = context.new_page().await.map_err(browser_error)?;

        page.set_viewport_size(Viewport {
            width: config.viewport_width as i32,
            height: config.viewport_height as i32,
        })
        .await
        .map_err(browser_error)?;

        log::info!(
            "Launched chromium (headless: {}, viewport {}x{})",
            config.headless,
            config.viewport_width,
            config.viewport_height
        );

        Ok(Self {
            playwright: Arc::new(playwright),
            browser: Arc::new(browser),
            context: Arc::new(context),
            page: Arc::new(Mutex::new(page)),
            config,
        })
    }
}

#[async_trait]
impl PageRenderer for WebDriver {
    fn name(&self) -> &str {
        "chromium"
    }

    async fn render(&self, url: &str) -> GenResult<RenderedPage> {
        let page = self.page.lock().await;
        let timeout = Duration::from_millis(self.config.page_timeout_ms);

        match tokio::time::timeout(timeout, page.goto_builder(url).goto()).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => return Err(GenError::crawl(url, format!("navigation failed: {e}"))),
            Err(_) => {
                return Err(GenError::crawl(
                    url,
                    format!("navigation timed out after {:?}", timeout),
                ))
            }
        }

        let html = page
            .content()
            .await
            .map_err(|e| GenError::crawl(url, format!("failed to read page content: {e}")))?;
        let title = page.title().await.ok().filter(|t| !t.trim().is_empty());

        log::debug!("Rendered {} ({} bytes)", url, html.len());

        Ok(RenderedPage {
            url: url.to_string(),
            html,
            title,
        })
    }
}

/// Download the Playwright driver and its browsers
pub async fn install_browsers() -> GenResult<()> {
    println!("{} Installing Playwright browsers...", "📦".blue());
    let playwright = Playwright::initialize()
        .await
        .map_err(|e| GenError::Browser(format!("Failed to initialize Playwright: {e}")))?;
    playwright
        .prepare()
        .map_err(|e| GenError::Browser(format!("Failed to install browsers: {e}")))?;
    println!("{} Playwright browsers installed", "✅".green());
    Ok(())
}

fn browser_error(e: impl std::fmt::Display) -> GenError {
    GenError::Browser(e.to_string())
}

async fn launch_chromium_browser(
    chromium: &playwright::api::BrowserType,
    config: &WebDriverConfig,
) -> GenResult<Browser> {
    let mut launcher = chromium.launcher();
    launcher = launcher.headless(config.headless);

    let executable = config.executable_path.clone().or_else(find_system_browser);
    if let Some(ref path) = executable {
        log::info!("Using browser: {}", path.display());
        launcher = launcher.executable(path);
    } else {
        log::info!("No browser executable found, using Playwright's bundled Chromium");
    }

    let args: Vec<String> = [
        "--no-sandbox",
        "--disable-setuid-sandbox",
        "--disable-dev-shm-usage",
        "--disable-gpu",
        "--ignore-certificate-errors",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    launcher = launcher.args(&args);

    launcher.launch().await.map_err(|e| {
        GenError::Browser(format!(
            "Failed to launch chromium: {e}. Run `lumi-gen system install` first"
        ))
    })
}

fn find_system_browser() -> Option<PathBuf> {
    let common_paths = [
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/usr/bin/google-chrome",
        "/usr/bin/google-chrome-stable",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
        "/Applications/Microsoft Edge.app/Contents/MacOS/Microsoft Edge",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
    ];

    common_paths
        .iter()
        .map(std::path::Path::new)
        .find(|p| p.exists())
        .map(|p| p.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = WebDriverConfig::default();
        assert!(config.headless);
        assert_eq!(config.viewport_width, 1280);
        assert_eq!(config.viewport_height, 720);
        assert_eq!(config.page_timeout_ms, 60_000);
        assert_eq!(config.executable_path, None);
    }
}
