use async_trait::async_trait;

use crate::error::GenResult;

/// A page after navigation and rendering
#[derive(Debug, Clone)]
pub struct RenderedPage {
    /// URL that was requested
    pub url: String,
    /// Serialized DOM after scripts ran
    pub html: String,
    pub title: Option<String>,
}

/// Fetch and render a URL in a browser
///
/// Implementations may serialize requests internally; callers only see
/// one logical render per call.
#[async_trait]
pub trait PageRenderer: Send + Sync {
    /// Renderer name for logs (e.g. "chromium")
    fn name(&self) -> &str;

    async fn render(&self, url: &str) -> GenResult<RenderedPage>;
}
