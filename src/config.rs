//! Crawl configuration derived from the root URL.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use url::Url;

/// Worker pool size for the main crawl phase.
pub const THREAD_COUNT: usize = 64;

/// Worker pool size kept alive for the one-shot failed-link retry phase.
pub const RETRY_THREAD_COUNT: usize = 3;

/// Attempts per request before a URL is recorded as failed.
pub const MAX_TRIES: u32 = 6;

/// Request timeout for page and stylesheet fetches.
const FETCH_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Request timeout for large media downloads.
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(60 * 60);

/// How long a worker polls the frontier before reporting itself idle.
const LINK_POLL_TIMEOUT: Duration = Duration::from_secs(10);

/// Immutable per-crawl settings, shared read-only by the manager and workers.
#[derive(Debug, Clone)]
pub struct SiteConfig {
    /// Normalized root URL. Doubles as the admission filter: a discovered
    /// link is only enqueued when this is a substring of it.
    pub root_url: String,
    /// Host (with any explicit port) a link must match to stay in scope.
    pub site_host: String,
    /// Scheme prepended to scheme-relative `//host/...` links.
    pub scheme: String,
    /// Root of the on-disk mirror tree.
    pub home_dir: PathBuf,
    pub thread_count: usize,
    pub retry_thread_count: usize,
    pub max_retries: u32,
    pub fetch_timeout: Duration,
    pub download_timeout: Duration,
    pub link_poll_timeout: Duration,
}

impl SiteConfig {
    /// Build the configuration for one crawl of `url`. The mirror tree is
    /// named `<host>-site/` under the current working directory.
    pub fn for_url(url: &str) -> anyhow::Result<Self> {
        let root_url = url.replace('\\', "/");
        let parsed =
            Url::parse(&root_url).with_context(|| format!("invalid root url: {root_url}"))?;
        let host = parsed
            .host_str()
            .with_context(|| format!("root url has no host: {root_url}"))?;
        let site_host = match parsed.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };
        let home_dir = PathBuf::from(format!("{site_host}-site"));

        Ok(Self {
            root_url,
            site_host,
            scheme: parsed.scheme().to_string(),
            home_dir,
            thread_count: THREAD_COUNT,
            retry_thread_count: RETRY_THREAD_COUNT,
            max_retries: MAX_TRIES,
            fetch_timeout: FETCH_TIMEOUT,
            download_timeout: DOWNLOAD_TIMEOUT,
            link_poll_timeout: LINK_POLL_TIMEOUT,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_derives_host_scheme_and_home_dir() {
        let config = SiteConfig::for_url("https://www.example.com/start/").unwrap();
        assert_eq!(config.site_host, "www.example.com");
        assert_eq!(config.scheme, "https");
        assert_eq!(config.home_dir, PathBuf::from("www.example.com-site"));
    }

    #[test]
    fn config_keeps_explicit_port_in_host() {
        let config = SiteConfig::for_url("http://127.0.0.1:8443/").unwrap();
        assert_eq!(config.site_host, "127.0.0.1:8443");
        assert_eq!(config.home_dir, PathBuf::from("127.0.0.1:8443-site"));
    }

    #[test]
    fn config_rejects_hostless_urls() {
        assert!(SiteConfig::for_url("not a url").is_err());
        assert!(SiteConfig::for_url("file:///tmp/x").is_err());
    }
}
