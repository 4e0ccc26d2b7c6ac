//! Local artifact storage: parent-directory creation and save-once writes.

use std::path::{Path, PathBuf};

use tracing::{error, info};

use crate::fetch::TextEncoding;
use crate::paths;

/// Map a URL to its mirror path and make sure the parent directory exists.
///
/// Concurrent workers race on directory creation; `create_dir_all` absorbs
/// "already exists". A file squatting on a directory name is logged and the
/// caller's write fails in turn.
pub fn make_filepath(home_dir: &Path, link: &str) -> PathBuf {
    let path = paths::local_path(home_dir, link);
    if let Some(parent) = path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            error!("[{e}]\t{link}\t{}", path.display());
        }
    }
    path
}

/// Write a rewritten document to its mapped path, re-encoded with the
/// charset it was served in. An existing artifact is never overwritten.
pub fn save_text_file(
    home_dir: &Path,
    link: &str,
    text: &str,
    encoding: TextEncoding,
) -> std::io::Result<()> {
    let path = make_filepath(home_dir, link);
    if path.exists() {
        info!("exists \t{link}");
        return Ok(());
    }
    std::fs::write(&path, encoding.encode(text))?;
    info!("saved\t{}", path.display());
    Ok(())
}
