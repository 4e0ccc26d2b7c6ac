//! Shared crawl-wide state handed to the manager and every worker.

use std::sync::Arc;

use crate::config::SiteConfig;
use crate::fetch::HttpFetcher;
use crate::validate::ContentValidator;

/// Configuration plus the process-wide HTTP machinery (client, cookie jar,
/// TLS policy) and the injected content validator.
pub struct CrawlContext {
    pub config: Arc<SiteConfig>,
    pub fetcher: HttpFetcher,
}

impl CrawlContext {
    pub fn new(
        config: SiteConfig,
        validator: Arc<dyn ContentValidator>,
    ) -> anyhow::Result<Self> {
        let config = Arc::new(config);
        let fetcher = HttpFetcher::new(config.clone(), validator)?;
        Ok(Self { config, fetcher })
    }
}
