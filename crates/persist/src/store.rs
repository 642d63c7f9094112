//! File-backed save slots.
//!
//! ```text
//! <root>/index.json        slot records, schema and archive versions
//! <root>/slots/<slot>.zst  newest archive for each slot, zstd compressed
//! ```
//!
//! Slot files are written to a temporary name and renamed into place, and the
//! index is rewritten the same way afterwards, so a crash mid-save leaves the
//! previous save readable.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::archive::ARCHIVE_FORMAT_VERSION;

const INDEX_SCHEMA: u32 = 2;
const INDEX_FILE: &str = "index.json";
const SLOT_DIR: &str = "slots";
const ZSTD_LEVEL: i32 = 3;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store io: {0}")]
    Io(#[from] std::io::Error),
    #[error("store index: {0}")]
    Index(#[from] serde_json::Error),
    #[error("slot '{slot}' is corrupt: digest {actual}, index says {expected}")]
    IntegrityMismatch {
        slot: String,
        expected: String,
        actual: String,
    },
    #[error("store was written with schema v{file_version}, this build reads v{expected_version}")]
    SchemaMismatch {
        file_version: u32,
        expected_version: u32,
    },
    #[error("no save in slot '{0}'")]
    NoSuchSlot(String),
    #[error("'{0}' is not a usable slot name")]
    BadSlotName(String),
}

/// What the index knows about one slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotRecord {
    pub tick: u64,
    /// Uncompressed archive length.
    pub bytes: u64,
    /// sha256 of the compressed file.
    pub digest: String,
    pub save_id: Uuid,
    /// Store-wide write counter at the time of this save.
    pub generation: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreIndex {
    pub schema: u32,
    pub archive_format: u32,
    pub store_id: Uuid,
    pub generation: u64,
    pub slots: BTreeMap<String, SlotRecord>,
}

impl StoreIndex {
    fn fresh() -> Self {
        Self {
            schema: INDEX_SCHEMA,
            archive_format: ARCHIVE_FORMAT_VERSION,
            store_id: Uuid::new_v4(),
            generation: 0,
            slots: BTreeMap::new(),
        }
    }

    fn check_versions(&self) -> Result<(), StoreError> {
        if self.schema != INDEX_SCHEMA {
            return Err(StoreError::SchemaMismatch {
                file_version: self.schema,
                expected_version: INDEX_SCHEMA,
            });
        }
        // Older formats are turned away by the archive reader itself.
        if self.archive_format > ARCHIVE_FORMAT_VERSION {
            return Err(StoreError::SchemaMismatch {
                file_version: self.archive_format,
                expected_version: ARCHIVE_FORMAT_VERSION,
            });
        }
        Ok(())
    }
}

/// A directory of named save slots. Only moves archive bytes; encoding a world
/// is the caller's job.
pub struct SaveStore {
    root: PathBuf,
    index: StoreIndex,
}

impl SaveStore {
    /// Opens the store at `path`, creating it if the directory has no index.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let root = path.as_ref().to_path_buf();
        fs::create_dir_all(root.join(SLOT_DIR))?;

        let index_path = root.join(INDEX_FILE);
        let index = if index_path.exists() {
            let index: StoreIndex = serde_json::from_slice(&fs::read(&index_path)?)?;
            index.check_versions()?;
            index
        } else {
            let index = StoreIndex::fresh();
            write_atomic(&index_path, &serde_json::to_vec_pretty(&index)?)?;
            index
        };

        tracing::debug!(root = %root.display(), slots = index.slots.len(), "opened save store");
        Ok(Self { root, index })
    }

    /// Writes `archive` into `slot`, replacing whatever the slot held.
    pub fn write_slot(&mut self, slot: &str, tick: u64, archive: &[u8]) -> Result<(), StoreError> {
        let file = self.slot_path(slot)?;
        let compressed = zstd::encode_all(archive, ZSTD_LEVEL)?;
        write_atomic(&file, &compressed)?;

        self.index.generation += 1;
        let record = SlotRecord {
            tick,
            bytes: archive.len() as u64,
            digest: digest_hex(&compressed),
            save_id: Uuid::new_v4(),
            generation: self.index.generation,
        };
        self.index.slots.insert(slot.to_string(), record);
        write_atomic(&self.root.join(INDEX_FILE), &serde_json::to_vec_pretty(&self.index)?)?;

        tracing::info!(slot, tick, bytes = archive.len(), compressed = compressed.len(), "saved");
        Ok(())
    }

    /// Reads back the archive in `slot`, checking it against the index.
    pub fn read_slot(&self, slot: &str) -> Result<Vec<u8>, StoreError> {
        let record = self
            .index
            .slots
            .get(slot)
            .ok_or_else(|| StoreError::NoSuchSlot(slot.to_string()))?;
        let compressed = fs::read(self.slot_path(slot)?)?;
        check_digest(slot, record, &compressed)?;
        Ok(zstd::decode_all(compressed.as_slice())?)
    }

    /// Drops `slot` from the index and deletes its file.
    pub fn delete_slot(&mut self, slot: &str) -> Result<(), StoreError> {
        if self.index.slots.remove(slot).is_none() {
            return Err(StoreError::NoSuchSlot(slot.to_string()));
        }
        write_atomic(&self.root.join(INDEX_FILE), &serde_json::to_vec_pretty(&self.index)?)?;
        match fs::remove_file(self.slot_path(slot)?) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }

    /// Slots, most recently written first.
    pub fn slots(&self) -> Vec<(&str, &SlotRecord)> {
        let mut slots: Vec<_> = self.index.slots.iter().map(|(k, v)| (k.as_str(), v)).collect();
        slots.sort_by(|a, b| b.1.generation.cmp(&a.1.generation));
        slots
    }

    /// Checks every slot file against its recorded digest.
    pub fn verify_integrity(&self) -> Result<(), StoreError> {
        for (slot, record) in &self.index.slots {
            let compressed = fs::read(self.slot_path(slot)?)?;
            check_digest(slot, record, &compressed)?;
        }
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn index(&self) -> &StoreIndex {
        &self.index
    }

    fn slot_path(&self, slot: &str) -> Result<PathBuf, StoreError> {
        let usable = !slot.is_empty()
            && slot
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !usable {
            return Err(StoreError::BadSlotName(slot.to_string()));
        }
        Ok(self.root.join(SLOT_DIR).join(format!("{slot}.zst")))
    }
}

fn check_digest(slot: &str, record: &SlotRecord, compressed: &[u8]) -> Result<(), StoreError> {
    let actual = digest_hex(compressed);
    if actual == record.digest {
        return Ok(());
    }
    tracing::warn!(slot, "save slot failed integrity check");
    Err(StoreError::IntegrityMismatch {
        slot: slot.to_string(),
        expected: record.digest.clone(),
        actual,
    })
}

fn write_atomic(path: &Path, data: &[u8]) -> Result<(), StoreError> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, data)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

fn digest_hex(data: &[u8]) -> String {
    Sha256::digest(data)
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}
