//! HTTP fetching: the shared client, bounded retry, charset detection, and
//! streaming downloads.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use reqwest::Client;
use tokio::io::AsyncWriteExt;
use tracing::{error, info, warn};

use crate::classify;
use crate::config::SiteConfig;
use crate::storage;
use crate::validate::ContentValidator;

/// Per-attempt failure. Every variant is retryable.
#[derive(Debug, thiserror::Error)]
pub enum TransientError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("writing body: {0}")]
    Io(#[from] std::io::Error),
}

/// Terminal outcome of a fetch once the retry loop has run.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: TransientError },
    #[error("no supported encoding decodes the body")]
    Decode,
}

/// Charset a text document decoded under. Also selects the encoding the
/// rewritten document is written back out with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Utf8,
    Gb2312,
    Gbk,
}

impl TextEncoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            TextEncoding::Utf8 => "utf-8",
            TextEncoding::Gb2312 => "gb2312",
            TextEncoding::Gbk => "gbk",
        }
    }

    /// Encode rewritten text back into the bytes the site originally served.
    pub fn encode(&self, text: &str) -> Vec<u8> {
        match self {
            TextEncoding::Utf8 => text.as_bytes().to_vec(),
            TextEncoding::Gb2312 => encoding_rs::GBK.encode(text).0.into_owned(),
            TextEncoding::Gbk => encoding_rs::GB18030.encode(text).0.into_owned(),
        }
    }
}

/// A decoded text document plus the charset that matched.
#[derive(Debug)]
pub struct TextDocument {
    pub text: String,
    pub encoding: TextEncoding,
}

/// Charset ladder: strict UTF-8 first, then GBK (the encoding the gb2312
/// label resolves to), then the GB18030 superset. The first clean decode
/// wins.
pub fn decode_text(bytes: &[u8]) -> Option<TextDocument> {
    if let Ok(text) = std::str::from_utf8(bytes) {
        return Some(TextDocument {
            text: text.to_string(),
            encoding: TextEncoding::Utf8,
        });
    }
    let (text, _, malformed) = encoding_rs::GBK.decode(bytes);
    if !malformed {
        return Some(TextDocument {
            text: text.into_owned(),
            encoding: TextEncoding::Gb2312,
        });
    }
    let (text, _, malformed) = encoding_rs::GB18030.decode(bytes);
    if !malformed {
        return Some(TextDocument {
            text: text.into_owned(),
            encoding: TextEncoding::Gbk,
        });
    }
    None
}

/// Whether a download wrote a new file or kept one already on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Downloaded {
    Fetched,
    AlreadyPresent,
}

/// One shared client per crawl: cookie jar kept in memory, certificate
/// verification off so sites with broken TLS still mirror.
pub struct HttpFetcher {
    client: Client,
    config: Arc<SiteConfig>,
    validator: Arc<dyn ContentValidator>,
}

impl HttpFetcher {
    pub fn new(
        config: Arc<SiteConfig>,
        validator: Arc<dyn ContentValidator>,
    ) -> anyhow::Result<Self> {
        let client = Client::builder()
            .cookie_store(true)
            .danger_accept_invalid_certs(true)
            .gzip(true)
            .brotli(true)
            .build()?;
        Ok(Self {
            client,
            config,
            validator,
        })
    }

    /// Fetch a page or stylesheet into memory and decode it.
    pub async fn fetch_text(&self, link: &str) -> Result<TextDocument, FetchError> {
        let bytes = self.get_with_retry(link, self.config.fetch_timeout).await?;
        match decode_text(&bytes) {
            Some(document) => Ok(document),
            None => {
                warn!("[UnicodeDecodeError]\t{link}");
                Err(FetchError::Decode)
            }
        }
    }

    async fn get_with_retry(&self, link: &str, timeout: Duration) -> Result<Vec<u8>, FetchError> {
        let mut attempts = 0;
        loop {
            match self.try_get(link, timeout).await {
                Ok(bytes) => return Ok(bytes),
                Err(last) => {
                    attempts += 1;
                    warn!("[{last}]\t{link} retry{attempts}");
                    if attempts >= self.config.max_retries {
                        error!("[failed get]\t{link}");
                        return Err(FetchError::Exhausted { attempts, last });
                    }
                }
            }
        }
    }

    async fn try_get(&self, link: &str, timeout: Duration) -> Result<Vec<u8>, TransientError> {
        let response = self
            .client
            .get(link)
            .timeout(timeout)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.bytes().await?.to_vec())
    }

    /// Stream a binary resource to its mapped path.
    ///
    /// An existing artifact is kept as-is unless it is a `.pdf` the
    /// validator rejects. Media suffixes get the long download timeout.
    pub async fn download(&self, link: &str) -> Result<Downloaded, FetchError> {
        let timeout = if classify::is_media(link) {
            self.config.download_timeout
        } else {
            self.config.fetch_timeout
        };
        let path = storage::make_filepath(&self.config.home_dir, link);

        if path.exists() {
            let is_pdf = path.extension().and_then(|ext| ext.to_str()) == Some("pdf");
            if !is_pdf || self.validator.is_valid(&path) {
                info!("exists \t{link}");
                return Ok(Downloaded::AlreadyPresent);
            }
        }

        let mut attempts = 0;
        loop {
            match self.try_download(link, &path, timeout).await {
                Ok(()) => {
                    info!("downloaded\t{link}");
                    return Ok(Downloaded::Fetched);
                }
                Err(last) => {
                    // A failed attempt must not leave a partial body that the
                    // existence check would later take for a finished artifact.
                    let _ = tokio::fs::remove_file(&path).await;
                    attempts += 1;
                    warn!("[{last}]\t{link} retry{attempts}");
                    if attempts >= self.config.max_retries {
                        error!("[failed download]\t{link}");
                        return Err(FetchError::Exhausted { attempts, last });
                    }
                }
            }
        }
    }

    async fn try_download(
        &self,
        link: &str,
        path: &Path,
        timeout: Duration,
    ) -> Result<(), TransientError> {
        let response = self
            .client
            .get(link)
            .timeout(timeout)
            .send()
            .await?
            .error_for_status()?;
        let mut file = tokio::fs::File::create(path).await?;
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            file.write_all(&chunk?).await?;
        }
        file.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utf8_wins_the_ladder() {
        let document = decode_text("héllo".as_bytes()).unwrap();
        assert_eq!(document.encoding, TextEncoding::Utf8);
        assert_eq!(document.text, "héllo");
    }

    #[test]
    fn gbk_bytes_decode_under_the_gb2312_label() {
        // "你好" in GBK; not valid UTF-8.
        let bytes = [0xC4, 0xE3, 0xBA, 0xC3];
        let document = decode_text(&bytes).unwrap();
        assert_eq!(document.encoding, TextEncoding::Gb2312);
        assert_eq!(document.text, "你好");
    }

    #[test]
    fn decoded_text_reencodes_to_the_original_bytes() {
        let bytes = [0xC4, 0xE3, 0xBA, 0xC3];
        let document = decode_text(&bytes).unwrap();
        assert_eq!(document.encoding.encode(&document.text), bytes.to_vec());
    }

    #[test]
    fn undecodable_bytes_are_rejected() {
        // 0x80 is not a valid lead byte in any rung of the ladder.
        assert!(decode_text(&[0x80]).is_none());
    }

    #[test]
    fn encoding_labels() {
        assert_eq!(TextEncoding::Utf8.as_str(), "utf-8");
        assert_eq!(TextEncoding::Gb2312.as_str(), "gb2312");
        assert_eq!(TextEncoding::Gbk.as_str(), "gbk");
    }
}
