//! Postcard-based store snapshots with versioned envelopes.
//!
//! A durable [`MemoryStore`](crate::store::MemoryStore) writes its whole
//! table set on every commit using this format:
//!
//! ```text
//! ┌─────────────────┬─────────────────┬──────────────────────────┐
//! │  MAGIC (4 bytes)│VERSION (4 bytes)│POSTCARD PAYLOAD (N bytes)│
//! └─────────────────┴─────────────────┴──────────────────────────┘
//!   "RKIT"              u32 (varint)       postcard::to_allocvec(T)
//! ```
//!
//! Decoding checks magic and version before touching the payload, so a
//! foreign file or an older schema is reported instead of misread.
//!
//! ```rust
//! use repair_kit::serialization::{decode_snapshot, encode_snapshot};
//!
//! # fn main() -> repair_kit::Result<()> {
//! let bytes = encode_snapshot(&vec![1u64, 2, 3])?;
//! let back: Vec<u64> = decode_snapshot(&bytes)?;
//! assert_eq!(back, vec![1, 2, 3]);
//! # Ok(())
//! # }
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Magic header for repair-kit snapshots: b"RKIT"
pub const SNAPSHOT_MAGIC: [u8; 4] = *b"RKIT";

/// Current snapshot schema version.
///
/// Increment when a persisted record changes shape (fields added, removed,
/// reordered or retyped).
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// Versioned envelope around a snapshot payload.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SnapshotEnvelope<T> {
    /// Magic header: must be b"RKIT"
    pub magic: [u8; 4],
    /// Schema version: must match CURRENT_SCHEMA_VERSION
    pub version: u32,
    pub payload: T,
}

impl<T> SnapshotEnvelope<T> {
    pub fn new(payload: T) -> Self {
        Self {
            magic: SNAPSHOT_MAGIC,
            version: CURRENT_SCHEMA_VERSION,
            payload,
        }
    }
}

/// Envelope header alone, decoded before the payload.
#[derive(Deserialize)]
struct EnvelopeHeader {
    magic: [u8; 4],
    version: u32,
}

/// Serialize `value` into a versioned snapshot.
///
/// # Errors
///
/// Returns `Error::SerializationError` if Postcard fails to encode the value.
pub fn encode_snapshot<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    postcard::to_allocvec(&SnapshotEnvelope::new(value)).map_err(|e| {
        error!("Snapshot serialization failed: {}", e);
        Error::SerializationError(e.to_string())
    })
}

/// Deserialize a versioned snapshot.
///
/// # Errors
///
/// - `Error::InvalidSnapshot`: missing or wrong magic header
/// - `Error::VersionMismatch`: written by another schema version
/// - `Error::DeserializationError`: corrupted payload
pub fn decode_snapshot<T>(bytes: &[u8]) -> Result<T>
where
    T: for<'de> Deserialize<'de>,
{
    let (header, _) = postcard::take_from_bytes::<EnvelopeHeader>(bytes)
        .map_err(|e| Error::InvalidSnapshot(format!("unreadable header: {}", e)))?;

    if header.magic != SNAPSHOT_MAGIC {
        warn!(
            "Invalid snapshot magic: expected {:?}, got {:?}",
            SNAPSHOT_MAGIC, header.magic
        );
        return Err(Error::InvalidSnapshot(format!(
            "expected magic {:?}, found {:?}",
            SNAPSHOT_MAGIC, header.magic
        )));
    }

    if header.version != CURRENT_SCHEMA_VERSION {
        warn!(
            "Snapshot schema version mismatch: expected {}, got {}",
            CURRENT_SCHEMA_VERSION, header.version
        );
        return Err(Error::VersionMismatch {
            expected: CURRENT_SCHEMA_VERSION,
            found: header.version,
        });
    }

    let envelope: SnapshotEnvelope<T> = postcard::from_bytes(bytes)?;
    Ok(envelope.payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize, Deserialize, Debug, PartialEq)]
    struct Sample {
        id: u64,
        label: String,
    }

    #[test]
    fn test_snapshot_starts_with_magic() {
        let bytes = encode_snapshot(&Sample {
            id: 1,
            label: "a".to_string(),
        })
        .unwrap();
        assert_eq!(&bytes[..4], b"RKIT");
    }

    #[test]
    fn test_decode_rejects_foreign_bytes() {
        let result = decode_snapshot::<Sample>(b"CKIT\x01\x00\x00");
        assert!(matches!(result, Err(Error::InvalidSnapshot(_))));

        let result = decode_snapshot::<Sample>(b"RK");
        assert!(matches!(result, Err(Error::InvalidSnapshot(_))));
    }

    #[test]
    fn test_decode_rejects_other_version() {
        let envelope = SnapshotEnvelope {
            magic: SNAPSHOT_MAGIC,
            version: CURRENT_SCHEMA_VERSION + 1,
            payload: 7u64,
        };
        let bytes = postcard::to_allocvec(&envelope).unwrap();

        match decode_snapshot::<u64>(&bytes) {
            Err(Error::VersionMismatch { expected, found }) => {
                assert_eq!(expected, CURRENT_SCHEMA_VERSION);
                assert_eq!(found, CURRENT_SCHEMA_VERSION + 1);
            }
            other => panic!("expected version mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_reports_truncated_payload() {
        let mut bytes = encode_snapshot(&Sample {
            id: 1,
            label: "a long enough label".to_string(),
        })
        .unwrap();
        bytes.truncate(bytes.len() - 4);

        let result = decode_snapshot::<Sample>(&bytes);
        assert!(matches!(result, Err(Error::DeserializationError(_))));
    }
}
