//! Persistence: symmetric save/restore codec and file-backed save slots.
//!
//! # Invariants
//! - Save and restore visit fields in identical order.
//! - A misread field is a typed error; the stream never silently misaligns.
//! - Slot files are checked against their recorded digest before use.

pub mod archive;
pub mod store;

pub use archive::{
    ARCHIVE_FORMAT_VERSION, ArchiveError, ArchiveHeader, MIN_ARCHIVE_FORMAT_VERSION,
    RestoreReader, SaveWriter,
};
pub use store::{SaveStore, SlotRecord, StoreError, StoreIndex};
