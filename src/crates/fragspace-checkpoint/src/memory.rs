//! In-memory checkpoint storage for tests and dry runs

use crate::checkpoint::Checkpoint;
use crate::error::Result;
use crate::traits::CheckpointSaver;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Keeps the latest checkpoint in memory and remembers how many were written
#[derive(Debug, Clone, Default)]
pub struct InMemoryCheckpointSaver {
    latest: Arc<RwLock<Option<Checkpoint>>>,
    history: Arc<RwLock<Vec<Checkpoint>>>,
}

impl InMemoryCheckpointSaver {
    /// Create an empty saver
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a saver that already holds `checkpoint`
    pub fn with_checkpoint(checkpoint: Checkpoint) -> Self {
        Self {
            latest: Arc::new(RwLock::new(Some(checkpoint.clone()))),
            history: Arc::new(RwLock::new(vec![checkpoint])),
        }
    }

    /// Every checkpoint written so far, oldest first
    pub async fn history(&self) -> Vec<Checkpoint> {
        self.history.read().await.clone()
    }

    /// Number of checkpoints written so far
    pub async fn checkpoint_count(&self) -> usize {
        self.history.read().await.len()
    }

    /// Clear all checkpoints (useful for testing)
    pub async fn clear(&self) {
        *self.latest.write().await = None;
        self.history.write().await.clear();
    }
}

#[async_trait]
impl CheckpointSaver for InMemoryCheckpointSaver {
    async fn put(&self, checkpoint: &Checkpoint) -> Result<()> {
        *self.latest.write().await = Some(checkpoint.clone());
        self.history.write().await.push(checkpoint.clone());
        Ok(())
    }

    async fn get(&self) -> Result<Option<Checkpoint>> {
        Ok(self.latest.read().await.clone())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::CounterSnapshot;

    #[tokio::test]
    async fn test_put_replaces_latest() {
        let saver = InMemoryCheckpointSaver::new();
        assert!(saver.get().await.unwrap().is_none());

        let first = Checkpoint::new(0, 1, 3, vec![0, 1], CounterSnapshot::default());
        let second = Checkpoint::new(0, 1, 4, vec![1, 0], CounterSnapshot::default());
        saver.put(&first).await.unwrap();
        saver.put(&second).await.unwrap();

        assert_eq!(saver.get().await.unwrap(), Some(second));
        assert_eq!(saver.checkpoint_count().await, 2);
    }

    #[tokio::test]
    async fn test_clear() {
        let saver = InMemoryCheckpointSaver::with_checkpoint(Checkpoint::fresh());
        assert_eq!(saver.checkpoint_count().await, 1);

        saver.clear().await;
        assert!(saver.get().await.unwrap().is_none());
        assert!(saver.history().await.is_empty());
    }
}
