use crate::error::ClipError;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClipConfig {
    /// Holds `clips/` and `undo/`.
    pub data_dir: PathBuf,
    pub undo_depth: usize,
    pub task_ttl_secs: u64,
    /// Captures covering more cells are refused.
    pub max_clip_cells: u64,
    pub clip_name_max_len: usize,
}

impl Default for ClipConfig {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl ClipConfig {
    pub fn with_defaults() -> Self {
        Self {
            data_dir: PathBuf::from("clipdata"),
            undo_depth: 10,
            task_ttl_secs: 600,
            max_clip_cells: 4_000_000,
            clip_name_max_len: 64,
        }
    }

    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::with_defaults()
        }
    }

    /// Reads a JSON config; absent fields keep their defaults.
    pub fn load(path: &Path) -> Result<Self, ClipError> {
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text).map_err(|error| {
            ClipError::Io(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("{}: {error}", path.display()),
            ))
        })
    }

    pub fn task_ttl(&self) -> Duration {
        Duration::from_secs(self.task_ttl_secs)
    }

    pub fn clips_dir(&self) -> PathBuf {
        self.data_dir.join("clips")
    }

    pub fn undo_dir(&self) -> PathBuf {
        self.data_dir.join("undo")
    }
}
