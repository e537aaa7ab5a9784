//! File-backed checkpoint storage
//!
//! The checkpoint is written to a sibling temporary file, flushed, and then
//! renamed over the target, so a crash never leaves a truncated checkpoint
//! behind.

use crate::checkpoint::Checkpoint;
use crate::error::{CheckpointError, Result};
use crate::serializer::{AnySerializer, CheckpointFormat, SerializerProtocol};
use crate::traits::CheckpointSaver;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Stores the latest checkpoint in a single file
#[derive(Debug, Clone)]
pub struct FileCheckpointSaver<S: SerializerProtocol = AnySerializer> {
    path: PathBuf,
    serializer: S,
}

impl FileCheckpointSaver<AnySerializer> {
    /// Create a saver writing `format`-encoded checkpoints to `path`
    pub fn new(path: impl Into<PathBuf>, format: CheckpointFormat) -> Self {
        Self {
            path: path.into(),
            serializer: AnySerializer::from(format),
        }
    }
}

impl<S: SerializerProtocol> FileCheckpointSaver<S> {
    /// Create a saver with an explicit serializer
    pub fn with_serializer(path: impl Into<PathBuf>, serializer: S) -> Self {
        Self {
            path: path.into(),
            serializer,
        }
    }

    /// Path of the checkpoint file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    /// Read and validate the checkpoint, failing if the file is absent
    pub async fn load(&self) -> Result<Checkpoint> {
        self.get()
            .await?
            .ok_or_else(|| CheckpointError::NotFound(self.path.display().to_string()))
    }
}

#[async_trait]
impl<S: SerializerProtocol> CheckpointSaver for FileCheckpointSaver<S> {
    async fn put(&self, checkpoint: &Checkpoint) -> Result<()> {
        let bytes = self.serializer.dumps(checkpoint)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        let tmp = self.temp_path();
        let mut file = fs::File::create(&tmp).await?;
        file.write_all(&bytes).await?;
        file.sync_all().await?;
        drop(file);
        fs::rename(&tmp, &self.path).await?;

        debug!(
            path = %self.path.display(),
            format = self.serializer.name(),
            level = checkpoint.level,
            root_id = ?checkpoint.root_id,
            next_cursor = ?checkpoint.next_cursor,
            "Checkpoint written"
        );
        Ok(())
    }

    async fn get(&self) -> Result<Option<Checkpoint>> {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let checkpoint: Checkpoint = self.serializer.loads(&bytes)?;
        checkpoint.validate()?;
        Ok(Some(checkpoint))
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}
