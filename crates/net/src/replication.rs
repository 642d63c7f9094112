//! Authority-to-observer replication over an unreliable transport.
//!
//! Packet layout:
//! ```text
//! seq:16 count:16 { object:32 set:16 payload_bits:16 payload }*
//! ```
//! The authority keeps, per observer, the last field values that observer
//! acknowledged plus what is in flight under each sequence number. An object
//! goes into a packet when its current values differ from the acked copy, so
//! a lost packet is repaired by the next one without any resend logic.

use std::collections::BTreeMap;

use simkit_common::ObjectId;

use crate::NetError;
use crate::bits::{BitReader, BitWriter};
use crate::field::{FieldSet, FieldValue};
use crate::snapshot::{quantize_values, read_snapshot, write_snapshot};

/// In-flight packets kept per observer before the oldest is forgotten.
const MAX_IN_FLIGHT: usize = 64;

/// `a` is newer than `b` under 16-bit wraparound.
pub fn seq_newer(a: u16, b: u16) -> bool {
    a != b && a.wrapping_sub(b) < 0x8000
}

/// Widens a wire sequence to a monotonic counter, taking whichever value
/// nearest `latest` shares its low 16 bits.
pub fn extend_seq(latest: u64, wire: u16) -> u64 {
    let delta = i64::from(wire.wrapping_sub(latest as u16) as i16);
    latest.saturating_add_signed(delta)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(pub u32);

/// Field sets known to both sides, by wire id.
#[derive(Debug, Default)]
pub struct FieldSetRegistry {
    sets: BTreeMap<u16, &'static FieldSet>,
}

impl FieldSetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, set: &'static FieldSet) {
        if let Some(prev) = self.sets.insert(set.id, set) {
            if prev.name != set.name {
                tracing::warn!(id = set.id, old = prev.name, new = set.name, "field set id reused");
            }
        }
    }

    pub fn get(&self, id: u16) -> Option<&'static FieldSet> {
        self.sets.get(&id).copied()
    }
}

/// One object's replicated state for a frame.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectState {
    pub object: ObjectId,
    pub set: &'static FieldSet,
    pub values: Vec<FieldValue>,
}

/// An encoded packet ready for the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub seq: u16,
    pub entries: usize,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
struct Acked {
    set_id: u16,
    /// Full packet counter, never wraps.
    seq: u64,
    values: Vec<FieldValue>,
}

#[derive(Debug)]
struct InFlight {
    seq: u64,
    entries: Vec<(ObjectId, u16, Vec<FieldValue>)>,
}

#[derive(Debug, Default)]
struct ObserverState {
    next_seq: u64,
    acked: BTreeMap<ObjectId, Acked>,
    // Keyed by wire seq; MAX_IN_FLIGHT keeps those unique.
    in_flight: BTreeMap<u16, InFlight>,
    order: Vec<u16>,
}

/// Authority side.
#[derive(Debug, Default)]
pub struct ReplicationServer {
    observers: BTreeMap<ObserverId, ObserverState>,
}

impl ReplicationServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// A new observer has no baseline and receives everything.
    pub fn add_observer(&mut self, observer: ObserverId) {
        self.observers.entry(observer).or_default();
    }

    pub fn remove_observer(&mut self, observer: ObserverId) {
        self.observers.remove(&observer);
    }

    pub fn observers(&self) -> impl Iterator<Item = ObserverId> + '_ {
        self.observers.keys().copied()
    }

    /// Builds the next packet for `observer` from one frame of state. Returns
    /// `None` when the observer is already up to date.
    pub fn build_packet(
        &mut self,
        observer: ObserverId,
        frame: &[ObjectState],
    ) -> Result<Option<Packet>, NetError> {
        let state = self
            .observers
            .get_mut(&observer)
            .ok_or(NetError::UnknownObserver(observer.0))?;

        // Objects that left the frame lose their baseline.
        state
            .acked
            .retain(|id, _| frame.iter().any(|o| o.object == *id));

        let mut body = BitWriter::new();
        let mut sent = Vec::new();
        for obj in frame {
            let quantized = quantize_values(obj.set, &obj.values)?;
            let up_to_date = state
                .acked
                .get(&obj.object)
                .is_some_and(|a| a.set_id == obj.set.id && a.values == quantized);
            if up_to_date {
                continue;
            }
            let raw_id = u32::try_from(obj.object.raw()).map_err(|_| NetError::ObjectIdTooLarge(obj.object.raw()))?;
            let mut payload = BitWriter::new();
            write_snapshot(obj.set, &quantized, &mut payload)?;
            let payload_bits =
                u16::try_from(payload.bit_len()).map_err(|_| NetError::PayloadTooLarge(obj.set.id))?;
            body.write_bits(u64::from(raw_id), 32);
            body.write_bits(u64::from(obj.set.id), 16);
            body.write_bits(u64::from(payload_bits), 16);
            body.append(&payload);
            sent.push((obj.object, obj.set.id, quantized));
        }

        if sent.is_empty() {
            return Ok(None);
        }
        let count = u16::try_from(sent.len()).map_err(|_| NetError::TooManyEntries(sent.len()))?;

        let full_seq = state.next_seq;
        state.next_seq += 1;
        let seq = full_seq as u16;

        let mut w = BitWriter::new();
        w.write_bits(u64::from(seq), 16);
        w.write_bits(u64::from(count), 16);
        w.append(&body);

        let entries = sent.len();
        state.in_flight.insert(
            seq,
            InFlight {
                seq: full_seq,
                entries: sent,
            },
        );
        state.order.push(seq);
        while state.order.len() > MAX_IN_FLIGHT {
            let oldest = state.order.remove(0);
            state.in_flight.remove(&oldest);
        }

        tracing::trace!(observer = observer.0, seq, entries, "built replication packet");
        Ok(Some(Packet {
            seq,
            entries,
            bytes: w.into_bytes(),
        }))
    }

    /// Observer acknowledged `seq`. Acks for unknown or expired sequences are
    /// ignored; an older ack never overwrites a newer baseline.
    pub fn ack(&mut self, observer: ObserverId, seq: u16) {
        let Some(state) = self.observers.get_mut(&observer) else {
            return;
        };
        let Some(flight) = state.in_flight.remove(&seq) else {
            return;
        };
        state.order.retain(|s| *s != seq);
        for (object, set_id, values) in flight.entries {
            let newer = state.acked.get(&object).is_none_or(|a| flight.seq > a.seq);
            if newer {
                state.acked.insert(
                    object,
                    Acked {
                        set_id,
                        seq: flight.seq,
                        values,
                    },
                );
            }
        }
    }

    /// Number of objects the observer has a baseline for.
    pub fn acked_count(&self, observer: ObserverId) -> usize {
        self.observers
            .get(&observer)
            .map(|s| s.acked.len())
            .unwrap_or(0)
    }
}

/// One decoded entry of a packet.
#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    pub object: ObjectId,
    pub set_id: u16,
    pub values: Vec<FieldValue>,
    pub changed: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReceivedPacket {
    pub seq: u16,
    pub updates: Vec<Update>,
    /// Entries dropped for being malformed or stale.
    pub skipped: usize,
}

#[derive(Debug, Clone)]
struct Applied {
    set_id: u16,
    seq: u64,
    values: Vec<FieldValue>,
}

/// Observer side. Wire sequences are widened against the newest packet seen,
/// so an object idle for any number of packets still orders correctly.
#[derive(Debug)]
pub struct ReplicationClient {
    registry: FieldSetRegistry,
    applied: BTreeMap<ObjectId, Applied>,
    latest: Option<u64>,
}

impl ReplicationClient {
    pub fn new(registry: FieldSetRegistry) -> Self {
        Self {
            registry,
            applied: BTreeMap::new(),
            latest: None,
        }
    }

    pub fn applied(&self, object: ObjectId) -> Option<&[FieldValue]> {
        self.applied.get(&object).map(|a| a.values.as_slice())
    }

    pub fn forget(&mut self, object: ObjectId) {
        self.applied.remove(&object);
    }

    /// Decodes a packet. A malformed header rejects the whole packet; a
    /// malformed entry is skipped and that object keeps its last good state.
    pub fn read_packet(&mut self, bytes: &[u8]) -> Result<ReceivedPacket, NetError> {
        let mut r = BitReader::new(bytes);
        let seq = r.read_bits(16).map_err(|_| NetError::BadHeader)? as u16;
        let count = r.read_bits(16).map_err(|_| NetError::BadHeader)? as usize;
        let full_seq = self.latest.map_or(u64::from(seq), |latest| extend_seq(latest, seq));
        self.latest = Some(self.latest.map_or(full_seq, |latest| latest.max(full_seq)));

        let mut updates = Vec::new();
        let mut skipped = 0;
        for _ in 0..count {
            let framing = (|| -> Result<(u64, u16, usize), NetError> {
                let object = r.read_bits(32)?;
                let set_id = r.read_bits(16)? as u16;
                let bits = r.read_bits(16)? as usize;
                Ok((object, set_id, bits))
            })();
            let Ok((raw, set_id, bits)) = framing else {
                tracing::warn!(seq, "truncated entry header, dropping rest of packet");
                skipped += 1;
                break;
            };
            let Ok(payload) = r.read_chunk(bits) else {
                tracing::warn!(seq, object = raw, "truncated entry payload, dropping rest of packet");
                skipped += 1;
                break;
            };
            let object = ObjectId(raw);
            match self.apply_entry(full_seq, object, set_id, &payload) {
                Ok(Some(update)) => updates.push(update),
                Ok(None) => skipped += 1,
                Err(e) => {
                    tracing::warn!(seq, %object, set_id, error = %e, "rejected snapshot entry");
                    skipped += 1;
                }
            }
        }
        Ok(ReceivedPacket {
            seq,
            updates,
            skipped,
        })
    }

    fn apply_entry(
        &mut self,
        seq: u64,
        object: ObjectId,
        set_id: u16,
        payload: &BitWriter,
    ) -> Result<Option<Update>, NetError> {
        let set = self
            .registry
            .get(set_id)
            .ok_or(NetError::UnknownFieldSet(set_id))?;
        if let Some(prev) = self.applied.get(&object) {
            if prev.set_id == set_id && seq <= prev.seq {
                // Reordered older packet.
                return Ok(None);
            }
        }
        let mut values = match self.applied.get(&object) {
            Some(prev) if prev.set_id == set_id => prev.values.clone(),
            _ => Vec::new(),
        };
        let mut r = BitReader::with_bit_len(payload.as_bytes(), payload.bit_len());
        let changed = read_snapshot(set, &mut r, &mut values)?;
        if r.remaining() != 0 {
            return Err(NetError::TrailingBits(r.remaining()));
        }
        self.applied.insert(
            object,
            Applied {
                set_id,
                seq,
                values: values.clone(),
            },
        );
        Ok(Some(Update {
            object,
            set_id,
            values,
            changed,
        }))
    }
}
