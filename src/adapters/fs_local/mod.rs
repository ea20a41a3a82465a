// Local filesystem adapter - Existence checks and media directory listing

use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{ClipChopError, ClipChopResult};
use crate::ports::FsPort;

/// Filesystem adapter backed by `std::fs` and `walkdir`
#[derive(Debug, Default, Clone)]
pub struct LocalFsAdapter;

impl LocalFsAdapter {
    pub fn new() -> Self {
        Self
    }
}

/// Case-insensitive extension match
pub fn has_media_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| extensions.iter().any(|allowed| allowed.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

impl FsPort for LocalFsAdapter {
    fn file_exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn list_media(&self, dir: &Path, extensions: &[String]) -> ClipChopResult<Vec<PathBuf>> {
        if !dir.is_dir() {
            return Err(ClipChopError::IoError(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("not a directory: {}", dir.display()),
            )));
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(dir).min_depth(1).max_depth(1).follow_links(true) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry in {}: {}", dir.display(), e);
                    continue;
                }
            };
            if entry.file_type().is_file() && has_media_extension(entry.path(), extensions) {
                files.push(entry.into_path());
            }
        }
        files.sort();

        debug!("Found {} media files in {}", files.len(), dir.display());
        Ok(files)
    }
}
