//! Append-only file store for raw payloads.

use std::path::{Path, PathBuf};

use crate::errors::{Error, PromotionError, Result};
use crate::identity::UnitIdentity;

use super::payload_model::RawPayload;

/// Persists raw payloads as one JSON document per fetch attempt.
///
/// Paths derive deterministically from the unit identity plus the
/// per-request file id, and files are never rewritten in place: writing to
/// an existing path is an error. Unique generated file ids mean concurrent
/// writers never collide.
pub struct PayloadStore {
    root: PathBuf,
}

impl PayloadStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory of an identity, relative to the store root.
    fn relative_dir(identity: &UnitIdentity) -> PathBuf {
        let mut dir = PathBuf::new();
        dir.push(&identity.domain);
        dir.push(&identity.source);
        dir.push(&identity.dataset);
        if !identity.key.is_empty() {
            dir.push(&identity.key);
        }
        dir
    }

    /// Writes a payload and returns its path relative to the store root.
    pub fn write(&self, identity: &UnitIdentity, payload: &RawPayload) -> Result<String> {
        let relative = Self::relative_dir(identity).join(format!("{}.json", payload.file_id));
        let absolute = self.root.join(&relative);

        if absolute.exists() {
            return Err(Error::Payload(format!(
                "payload file already exists: {}",
                absolute.display()
            )));
        }
        if let Some(parent) = absolute.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::Payload(format!("{}: {e}", parent.display())))?;
        }

        let body = serde_json::to_vec_pretty(payload)
            .map_err(|e| Error::Payload(format!("serialize {}: {e}", payload.file_id)))?;
        std::fs::write(&absolute, body)
            .map_err(|e| Error::Payload(format!("{}: {e}", absolute.display())))?;

        Ok(relative.to_string_lossy().replace('\\', "/"))
    }

    /// Loads a payload by its stored relative path.
    ///
    /// Returns [`PromotionError`] variants so the promotion engine can
    /// record a precise per-entry failure.
    pub fn load(&self, relative_path: &str) -> std::result::Result<RawPayload, PromotionError> {
        let absolute = self.root.join(Path::new(relative_path));
        let raw = std::fs::read_to_string(&absolute).map_err(|_| PromotionError::PayloadMissing {
            path: relative_path.to_string(),
        })?;
        serde_json::from_str(&raw).map_err(|e| PromotionError::PayloadShape {
            path: relative_path.to_string(),
            message: e.to_string(),
        })
    }
}
