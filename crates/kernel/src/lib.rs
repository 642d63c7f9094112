//! Simulation kernel: object registry, activation scheduling, deferred events,
//! world save/restore and replication glue.
//!
//! # Invariants
//! - The scheduler never runs a subsystem whose activation flag is clear;
//!   an object with an empty mask costs nothing per tick.
//! - Active objects run once per tick in creation order.
//! - Events fire by scheduled time, then enqueue order. Cancelled events and
//!   events whose owner is gone never fire.
//! - Object ids are never reused, so a stale reference resolves to absent.
//! - Save and restore visit fields in the same order.

pub mod behavior;
pub mod ctx;
pub mod event;
pub mod object;
pub mod registry;
pub mod replicate;
pub mod savegame;
pub mod schedule;
pub mod world;

pub use behavior::{Behavior, BehaviorError, SpawnError};
pub use ctx::{Ctx, ObjectQuery, ObjectView};
pub use event::{
    ArgKind, EV_ACTIVATE, EV_FIND_TARGETS, EV_KILLED, EV_POSTSPAWN, EV_REMOVE, EventArg, EventDef,
    EventError, EventQueue, EventRegistry, PendingEvent,
};
pub use object::{Capabilities, ObjectBase};
pub use registry::{ClassInfo, ClassRegistry, Factory};
pub use savegame::RestoreError;
pub use schedule::ActivationMask;
pub use world::{Role, World};
