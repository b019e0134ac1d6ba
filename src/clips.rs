//! Named snapshots stored as `<dir>/<name>.clip`.

use crate::codec;
use crate::error::ClipError;
use crate::snapshot::Snapshot;
use crate::storage;
use log::info;
use std::io;
use std::path::{Path, PathBuf};

pub const CLIP_EXTENSION: &str = "clip";

#[derive(Clone, Debug)]
pub struct ClipStore {
    dir: PathBuf,
    name_max_len: usize,
}

impl ClipStore {
    pub fn new(dir: impl Into<PathBuf>, name_max_len: usize) -> Self {
        Self {
            dir: dir.into(),
            name_max_len,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Names are non-empty ASCII letters, digits, `_` and `-`.
    pub fn validate_name(&self, name: &str) -> Result<(), ClipError> {
        let valid = !name.is_empty()
            && name.len() <= self.name_max_len
            && name
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-');
        if valid {
            Ok(())
        } else {
            Err(ClipError::InvalidClipName(name.to_string()))
        }
    }

    pub fn path_for(&self, name: &str) -> Result<PathBuf, ClipError> {
        self.validate_name(name)?;
        Ok(self.dir.join(format!("{name}.{CLIP_EXTENSION}")))
    }

    pub fn save(&self, name: &str, snapshot: &Snapshot) -> Result<(), ClipError> {
        let path = self.path_for(name)?;
        let bytes = codec::encode(snapshot)?;
        storage::write_atomic(&path, &bytes)?;
        info!(
            "saved clip {name:?}: {}x{} with {} attachments ({} bytes)",
            snapshot.width(),
            snapshot.height(),
            snapshot.attachments().len(),
            bytes.len()
        );
        Ok(())
    }

    pub fn load(&self, name: &str) -> Result<Snapshot, ClipError> {
        let path = self.path_for(name)?;
        let bytes = storage::read_optional(&path)?
            .ok_or_else(|| ClipError::ClipNotFound(name.to_string()))?;
        Ok(codec::decode(&bytes)?)
    }

    pub fn delete(&self, name: &str) -> Result<(), ClipError> {
        let path = self.path_for(name)?;
        if storage::remove_if_exists(&path)? {
            info!("deleted clip {name:?}");
            Ok(())
        } else {
            Err(ClipError::ClipNotFound(name.to_string()))
        }
    }

    /// Stored clip names, sorted. A missing directory lists as empty.
    pub fn list(&self) -> Result<Vec<String>, ClipError> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(error) => return Err(error.into()),
        };
        let mut names = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(CLIP_EXTENSION) {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            if self.validate_name(name).is_ok() {
                names.push(name.to_string());
            }
        }
        names.sort_unstable();
        Ok(names)
    }
}
