//! Compound: a single ingested document (container of molecules).

use super::ids::CompoundId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 256-bit content hash, rendered as lowercase hex in its `Display`/serde form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Hash sanitized content with SHA-256 (ingest-time content identity).
    pub fn of(content: &str) -> Self {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(content.as_bytes());
        let digest = hasher.finalize();
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&digest);
        Self(bytes)
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

/// A single ingested document. The mirror store owns its bytes; this row is
/// the disposable index-side record of its identity and ingest state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Compound {
    pub id: CompoundId,
    pub source_path: String,
    pub content_hash: ContentHash,
    pub last_ingest_ts: DateTime<Utc>,
    pub total_molecules: usize,
}

impl Compound {
    pub fn new(id: CompoundId, source_path: impl Into<String>, content_hash: ContentHash) -> Self {
        Self {
            id,
            source_path: source_path.into(),
            content_hash,
            last_ingest_ts: Utc::now(),
            total_molecules: 0,
        }
    }

    /// Whether re-ingesting `hash` against this compound would be a no-op
    /// (spec §3 invariant: content_hash uniquely identifies the compound's bytes).
    pub fn is_unchanged(&self, hash: &ContentHash) -> bool {
        &self.content_hash == hash
    }
}
