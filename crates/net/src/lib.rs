//! Network delta sync: fixed-width snapshots and per-observer baselines.
//!
//! # Invariants
//! - Fields are written and read in declaration order.
//! - A snapshot that fails to decode never touches the applied copy.
//! - An object is sent to an observer iff its values differ from what that
//!   observer acknowledged.

pub mod bits;
pub mod field;
pub mod replication;
pub mod snapshot;

pub use bits::{BitReader, BitWriter};
pub use field::{FieldDef, FieldKind, FieldSet, FieldValue, field};
pub use replication::{
    FieldSetRegistry, ObjectState, ObserverId, Packet, ReceivedPacket, ReplicationClient,
    ReplicationServer, Update, extend_seq, seq_newer,
};
pub use snapshot::{quantize_values, read_snapshot, snapshot_bits, write_snapshot};

/// Errors from encoding or decoding replicated state.
#[derive(Debug, thiserror::Error)]
pub enum NetError {
    #[error("needed {needed} bit(s), {remaining} left")]
    UnexpectedEnd { needed: usize, remaining: usize },
    #[error("field kind {0:?} has unusable parameters")]
    BadFieldKind(FieldKind),
    #[error("value {value:?} does not fit field kind {kind:?}")]
    KindMismatch { kind: FieldKind, value: FieldValue },
    #[error("field set {set}: expected {expected} value(s), got {found}")]
    ValueCount {
        set: u16,
        expected: usize,
        found: usize,
    },
    #[error("unknown field set {0}")]
    UnknownFieldSet(u16),
    #[error("unknown observer {0}")]
    UnknownObserver(u32),
    #[error("object id {0} does not fit the wire format")]
    ObjectIdTooLarge(u64),
    #[error("field set {0} payload exceeds the entry size limit")]
    PayloadTooLarge(u16),
    #[error("{0} entries exceed the packet limit")]
    TooManyEntries(usize),
    #[error("{0} undecoded bit(s) after snapshot")]
    TrailingBits(usize),
    #[error("malformed packet header")]
    BadHeader,
}
