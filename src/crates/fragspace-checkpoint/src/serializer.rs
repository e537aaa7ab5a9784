//! Serialization protocol for checkpoint files

use crate::error::Result;
use serde::{Deserialize, Serialize};

/// Protocol for turning checkpoint data into bytes and back
///
/// Implementations provide the on-disk encoding used by
/// [`FileCheckpointSaver`](crate::FileCheckpointSaver).
pub trait SerializerProtocol: Send + Sync {
    /// Short name of the encoding, used in log lines
    fn name(&self) -> &'static str;

    /// Serialize a value to bytes
    fn dumps<T: Serialize>(&self, value: &T) -> Result<Vec<u8>>;

    /// Deserialize a value from bytes
    fn loads<T: for<'de> Deserialize<'de>>(&self, data: &[u8]) -> Result<T>;
}

/// JSON serializer (default, human-inspectable)
#[derive(Debug, Clone, Default)]
pub struct JsonSerializer;

impl JsonSerializer {
    pub fn new() -> Self {
        Self
    }
}

impl SerializerProtocol for JsonSerializer {
    fn name(&self) -> &'static str {
        "json"
    }

    fn dumps<T: Serialize>(&self, value: &T) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(value)?)
    }

    fn loads<T: for<'de> Deserialize<'de>>(&self, data: &[u8]) -> Result<T> {
        Ok(serde_json::from_slice(data)?)
    }
}

/// Binary serializer using bincode
#[derive(Debug, Clone, Default)]
pub struct BincodeSerializer;

impl BincodeSerializer {
    pub fn new() -> Self {
        Self
    }
}

impl SerializerProtocol for BincodeSerializer {
    fn name(&self) -> &'static str {
        "bincode"
    }

    fn dumps<T: Serialize>(&self, value: &T) -> Result<Vec<u8>> {
        Ok(bincode::serialize(value)?)
    }

    fn loads<T: for<'de> Deserialize<'de>>(&self, data: &[u8]) -> Result<T> {
        Ok(bincode::deserialize(data)?)
    }
}

/// Encoding selected by configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckpointFormat {
    #[default]
    Json,
    Bincode,
}

/// Either serializer, picked at runtime from a [`CheckpointFormat`]
#[derive(Debug, Clone)]
pub enum AnySerializer {
    Json(JsonSerializer),
    Bincode(BincodeSerializer),
}

impl From<CheckpointFormat> for AnySerializer {
    fn from(format: CheckpointFormat) -> Self {
        match format {
            CheckpointFormat::Json => Self::Json(JsonSerializer::new()),
            CheckpointFormat::Bincode => Self::Bincode(BincodeSerializer::new()),
        }
    }
}

impl SerializerProtocol for AnySerializer {
    fn name(&self) -> &'static str {
        match self {
            Self::Json(s) => s.name(),
            Self::Bincode(s) => s.name(),
        }
    }

    fn dumps<T: Serialize>(&self, value: &T) -> Result<Vec<u8>> {
        match self {
            Self::Json(s) => s.dumps(value),
            Self::Bincode(s) => s.dumps(value),
        }
    }

    fn loads<T: for<'de> Deserialize<'de>>(&self, data: &[u8]) -> Result<T> {
        match self {
            Self::Json(s) => s.loads(data),
            Self::Bincode(s) => s.loads(data),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::{Checkpoint, CounterSnapshot};

    fn sample() -> Checkpoint {
        let mut chk = Checkpoint::fresh();
        chk.level = 1;
        chk.root_id = Some(4);
        chk.last_safe_graph_id = Some(17);
        chk.next_cursor = vec![1, 0, 2];
        chk.counters = CounterSnapshot {
            graph: 17,
            vertex: 42,
            candidate: 3,
        };
        chk
    }

    #[test]
    fn test_json_serializer_keeps_checkpoint() {
        let serializer = JsonSerializer::new();
        let bytes = serializer.dumps(&sample()).unwrap();
        let text = String::from_utf8(bytes.clone()).unwrap();
        assert!(text.contains("\"next_cursor\""));

        let restored: Checkpoint = serializer.loads(&bytes).unwrap();
        assert_eq!(restored, sample());
    }

    #[test]
    fn test_bincode_serializer_keeps_checkpoint() {
        let serializer = BincodeSerializer::new();
        let restored: Checkpoint = serializer.loads(&serializer.dumps(&sample()).unwrap()).unwrap();
        assert_eq!(restored, sample());
    }

    #[test]
    fn test_any_serializer_follows_format() {
        assert_eq!(AnySerializer::from(CheckpointFormat::Json).name(), "json");
        assert_eq!(AnySerializer::from(CheckpointFormat::Bincode).name(), "bincode");
    }

    #[test]
    fn test_garbage_is_rejected() {
        let serializer = JsonSerializer::new();
        let result: Result<Checkpoint> = serializer.loads(b"not a checkpoint");
        assert!(result.is_err());
    }
}
