// Trim session - Caller-owned loaded media and in/out selection

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::domain::errors::DomainError;
use crate::domain::model::{FragmentSelection, TimeSpec, TrimRequest};

#[derive(Debug, Clone)]
struct LoadedMedia {
    path: PathBuf,
    selection: FragmentSelection,
    duration_known: bool,
}

/// Loaded media file and its current fragment selection.
///
/// Loading another file replaces the previous one and resets the selection
/// to the whole file.
#[derive(Debug, Clone, Default)]
pub struct TrimSession {
    media: Option<LoadedMedia>,
}

impl TrimSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a media file; `duration` is `None` when the container does not report one
    pub fn load(&mut self, path: impl Into<PathBuf>, duration: Option<TimeSpec>) {
        let path = path.into();
        debug!("Session loaded {} (duration {:?})", path.display(), duration);
        self.media = Some(LoadedMedia {
            path,
            selection: FragmentSelection::new(duration.unwrap_or(TimeSpec::MAX)),
            duration_known: duration.is_some(),
        });
    }

    pub fn unload(&mut self) {
        self.media = None;
    }

    pub fn is_loaded(&self) -> bool {
        self.media.is_some()
    }

    pub fn path(&self) -> Option<&Path> {
        self.media.as_ref().map(|m| m.path.as_path())
    }

    pub fn selection(&self) -> Option<&FragmentSelection> {
        self.media.as_ref().map(|m| &m.selection)
    }

    fn loaded_mut(&mut self) -> Result<&mut LoadedMedia, DomainError> {
        self.media
            .as_mut()
            .ok_or_else(|| DomainError::InvalidRequest("no media file loaded".to_string()))
    }

    /// Set the in point; at or past the end of the file is rejected
    pub fn set_start(&mut self, start: TimeSpec) -> Result<(), DomainError> {
        let media = self.loaded_mut()?;
        if media.duration_known && start >= media.selection.duration() {
            return Err(DomainError::InvalidRequest(format!(
                "start ({}) is not before the end of the file ({})",
                start,
                media.selection.duration()
            )));
        }
        media.selection.set_start(start)
    }

    /// Set the out point; past the end of the file is clamped
    pub fn set_stop(&mut self, stop: TimeSpec) -> Result<(), DomainError> {
        let media = self.loaded_mut()?;
        if media.duration_known && stop > media.selection.duration() {
            warn!(
                "Stop {} is past the end of {}; clamping to {}",
                stop,
                media.path.display(),
                media.selection.duration()
            );
        }
        media.selection.set_stop(stop)
    }

    /// Build the request for the current selection
    pub fn trim_request(&self) -> Result<TrimRequest, DomainError> {
        let media = self
            .media
            .as_ref()
            .ok_or_else(|| DomainError::InvalidRequest("no media file loaded".to_string()))?;
        if !media.duration_known && media.selection.stop() == TimeSpec::MAX {
            return Err(DomainError::BadArgs(
                "a stop time is required when the file does not report its duration".to_string(),
            ));
        }
        TrimRequest::new(
            media.path.clone(),
            media.selection.start(),
            media.selection.stop(),
        )
    }
}
