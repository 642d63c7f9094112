//! Typed, delayed, cancellable callbacks.

use glam::Vec3;
use std::collections::BTreeMap;
use std::fmt;

use simkit_common::ObjectId;
use simkit_persist::{ArchiveError, RestoreReader, SaveWriter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgKind {
    Int,
    Float,
    Bool,
    Vector,
    String,
    Object,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EventArg {
    Int(i32),
    Float(f32),
    Bool(bool),
    Vector(Vec3),
    String(String),
    /// Weak reference; `None` is the null object.
    Object(Option<ObjectId>),
}

impl EventArg {
    pub fn kind(&self) -> ArgKind {
        match self {
            EventArg::Int(_) => ArgKind::Int,
            EventArg::Float(_) => ArgKind::Float,
            EventArg::Bool(_) => ArgKind::Bool,
            EventArg::Vector(_) => ArgKind::Vector,
            EventArg::String(_) => ArgKind::String,
            EventArg::Object(_) => ArgKind::Object,
        }
    }

    pub fn as_object(&self) -> Option<ObjectId> {
        match self {
            EventArg::Object(id) => *id,
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            EventArg::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f32> {
        match self {
            EventArg::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_vector(&self) -> Option<Vec3> {
        match self {
            EventArg::Vector(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            EventArg::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn save(&self, w: &mut SaveWriter) {
        match self {
            EventArg::Int(v) => {
                w.write_int(0);
                w.write_int(i64::from(*v));
            }
            EventArg::Float(v) => {
                w.write_int(1);
                w.write_float(*v);
            }
            EventArg::Bool(v) => {
                w.write_int(2);
                w.write_bool(*v);
            }
            EventArg::Vector(v) => {
                w.write_int(3);
                w.write_vec3(*v);
            }
            EventArg::String(v) => {
                w.write_int(4);
                w.write_string(v);
            }
            EventArg::Object(v) => {
                w.write_int(5);
                w.write_object(*v);
            }
        }
    }

    pub fn restore(r: &mut RestoreReader) -> Result<Self, ArchiveError> {
        let index = r.position();
        Ok(match r.read_int()? {
            0 => EventArg::Int(r.read_i32()?),
            1 => EventArg::Float(r.read_float()?),
            2 => EventArg::Bool(r.read_bool()?),
            3 => EventArg::Vector(r.read_vec3()?),
            4 => EventArg::String(r.read_string()?),
            5 => EventArg::Object(r.read_object()?),
            _ => return Err(ArchiveError::OutOfRange { index }),
        })
    }
}

/// A declared event type. Definitions are statics; identity is the name.
#[derive(Debug, PartialEq, Eq)]
pub struct EventDef {
    pub name: &'static str,
    pub signature: &'static [ArgKind],
}

impl EventDef {
    pub const fn new(name: &'static str, signature: &'static [ArgKind]) -> Self {
        Self { name, signature }
    }

    pub fn check(&'static self, args: &[EventArg]) -> Result<(), EventError> {
        let matches = args.len() == self.signature.len()
            && args.iter().zip(self.signature).all(|(a, k)| a.kind() == *k);
        if matches {
            Ok(())
        } else {
            Err(EventError::SignatureMismatch {
                event: self.name,
                expected: self.signature.to_vec(),
                found: args.iter().map(EventArg::kind).collect(),
            })
        }
    }

    pub fn is(&self, other: &EventDef) -> bool {
        self.name == other.name
    }
}

impl fmt::Display for EventDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EventError {
    #[error("event '{event}' expects {expected:?}, got {found:?}")]
    SignatureMismatch {
        event: &'static str,
        expected: Vec<ArgKind>,
        found: Vec<ArgKind>,
    },
    #[error("unknown event '{0}'")]
    UnknownEvent(String),
}

pub static EV_ACTIVATE: EventDef = EventDef::new("activate", &[ArgKind::Object]);
pub static EV_REMOVE: EventDef = EventDef::new("<remove>", &[]);
pub static EV_POSTSPAWN: EventDef = EventDef::new("<postspawn>", &[]);
pub static EV_FIND_TARGETS: EventDef = EventDef::new("<findtargets>", &[]);
/// Attacker and the damage of the killing blow.
pub static EV_KILLED: EventDef = EventDef::new("<killed>", &[ArgKind::Object, ArgKind::Int]);

pub static KERNEL_EVENTS: &[&EventDef] = &[&EV_ACTIVATE, &EV_REMOVE, &EV_POSTSPAWN, &EV_FIND_TARGETS, &EV_KILLED];

/// Name lookup for every event a world can hold, so pending events can be
/// persisted by name.
#[derive(Debug, Default, Clone)]
pub struct EventRegistry {
    defs: BTreeMap<&'static str, &'static EventDef>,
}

impl EventRegistry {
    pub fn with_kernel_events() -> Self {
        let mut r = Self::default();
        for def in KERNEL_EVENTS {
            r.register(def);
        }
        r
    }

    pub fn register(&mut self, def: &'static EventDef) {
        if let Some(prev) = self.defs.insert(def.name, def) {
            if prev.signature != def.signature {
                tracing::warn!(event = def.name, "event re-registered with a different signature");
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&'static EventDef> {
        self.defs.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct PendingEvent {
    pub owner: ObjectId,
    pub def: &'static EventDef,
    pub args: Vec<EventArg>,
}

/// Pending events ordered by fire time, FIFO within a time.
#[derive(Debug, Default)]
pub struct EventQueue {
    entries: BTreeMap<(u64, u64), PendingEvent>,
    next_seq: u64,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sequence number the next insert will get.
    pub fn next_seq(&self) -> u64 {
        self.next_seq
    }

    pub fn push(&mut self, fire_time: u64, event: PendingEvent) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.insert((fire_time, seq), event);
    }

    /// Pops the earliest event due at or before `now` that was queued before
    /// sequence `cutoff`.
    pub fn pop_due(&mut self, now: u64, cutoff: u64) -> Option<(u64, PendingEvent)> {
        let (&(time, seq), _) = self.entries.first_key_value()?;
        if time > now || seq >= cutoff {
            return None;
        }
        self.entries.remove(&(time, seq)).map(|e| (time, e))
    }

    pub fn cancel(&mut self, owner: ObjectId, def: &EventDef) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, e| !(e.owner == owner && e.def.is(def)));
        before - self.entries.len()
    }

    pub fn purge_owner(&mut self, owner: ObjectId) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, e| e.owner != owner);
        before - self.entries.len()
    }

    pub fn has_pending(&self, owner: ObjectId, def: &EventDef) -> bool {
        self.entries
            .values()
            .any(|e| e.owner == owner && e.def.is(def))
    }

    /// Pending events in delivery order with their fire times.
    pub fn iter(&self) -> impl Iterator<Item = (u64, &PendingEvent)> {
        self.entries.iter().map(|(&(time, _), e)| (time, e))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
