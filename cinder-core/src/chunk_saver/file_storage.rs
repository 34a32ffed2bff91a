//! Disk chunk storage.
//!
//! Every chunk is one zstd-compressed file at `<root>/<dimension>/c.<x>.<z>.bin.zst`. Writes
//! go to a temporary file that is renamed over the old record, so a crash mid-write leaves
//! the previous record intact.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use cinder_utils::ChunkPos;

use crate::error::StorageError;

use super::ChunkProvider;

const COMPRESSION_LEVEL: i32 = 3;

/// Disk-based chunk storage.
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    /// Opens storage rooted at `root`, creating the directory if needed.
    pub fn open(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// The root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn chunk_path(&self, dimension: &str, pos: ChunkPos) -> PathBuf {
        self.root
            .join(dimension)
            .join(format!("c.{}.{}.bin.zst", pos.x(), pos.z()))
    }
}

impl ChunkProvider for FileStorage {
    fn load(&self, dimension: &str, pos: ChunkPos) -> Result<Option<Vec<u8>>, StorageError> {
        let compressed = match fs::read(self.chunk_path(dimension, pos)) {
            Ok(compressed) => compressed,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let data = zstd::decode_all(compressed.as_slice())
            .map_err(|err| StorageError::Malformed(format!("bad compression: {err}")))?;
        Ok(Some(data))
    }

    fn save(&self, dimension: &str, pos: ChunkPos, data: &[u8]) -> Result<(), StorageError> {
        let path = self.chunk_path(dimension, pos);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let compressed = zstd::encode_all(data, COMPRESSION_LEVEL)?;
        let tmp = path.with_extension("zst.tmp");
        fs::write(&tmp, compressed)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}
