//! Pluggable validation of artifacts already on disk.

use std::path::Path;

/// Decides whether an existing artifact is usable as-is.
///
/// Wired into the download path for `.pdf` targets: a `false` verdict makes
/// the fetcher re-download over the existing file.
pub trait ContentValidator: Send + Sync {
    fn is_valid(&self, path: &Path) -> bool;
}

/// Default validator: every existing file counts.
pub struct AcceptAll;

impl ContentValidator for AcceptAll {
    fn is_valid(&self, _path: &Path) -> bool {
        true
    }
}
