use std::fmt;

use simkit_common::{ConfigError, ObjectId};
use simkit_net::{FieldSet, FieldValue};
use simkit_persist::{ArchiveError, RestoreReader, SaveWriter};

use crate::ctx::{Ctx, ObjectView};
use crate::event::{EventArg, EventDef, EventError};
use crate::object::{Capabilities, ObjectBase};

/// Fatal configuration problems. The object is not created.
#[derive(Debug, thiserror::Error)]
pub enum SpawnError {
    #[error("unknown class '{0}'")]
    UnknownClass(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("{class} '{object}': {key} names '{name}', which does not exist")]
    MissingObject {
        class: String,
        object: String,
        key: &'static str,
        name: String,
    },
    #[error("{class} '{object}': {reason}")]
    Invalid {
        class: String,
        object: String,
        reason: String,
    },
    #[error(transparent)]
    Event(#[from] EventError),
}

/// Failures inside a running handler. Logged at the scheduler boundary.
#[derive(Debug, thiserror::Error)]
pub enum BehaviorError {
    #[error(transparent)]
    Event(#[from] EventError),
    #[error("object {0} has no physics body")]
    NoBody(ObjectId),
    #[error("{0}")]
    Failed(String),
}

/// The class-specific half of a simulation object.
///
/// Every hook receives a [`Ctx`] scoped to the owning object. Hooks that a
/// class does not need keep their no-op default; the scheduler only calls the
/// per-tick hooks whose activation flag is set.
pub trait Behavior: fmt::Debug {
    /// Reads configuration and sets up initial state. Runs once, after the
    /// kernel has created the base object and its physics body.
    fn spawn(&mut self, ctx: &mut Ctx<'_>) -> Result<(), SpawnError>;

    /// Runs once every object of the level exists. Errors here are fatal for
    /// the object.
    fn post_spawn(&mut self, _ctx: &mut Ctx<'_>) -> Result<(), SpawnError> {
        Ok(())
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::NONE
    }

    /// Physics subsystem. The default integrates the object's own body and
    /// refreshes visuals when it moved.
    fn run_physics(&mut self, ctx: &mut Ctx<'_>) -> Result<(), BehaviorError> {
        ctx.run_physics();
        Ok(())
    }

    fn think(&mut self, _ctx: &mut Ctx<'_>) -> Result<(), BehaviorError> {
        Ok(())
    }

    fn update_particles(&mut self, _ctx: &mut Ctx<'_>) -> Result<(), BehaviorError> {
        Ok(())
    }

    fn activate(&mut self, _ctx: &mut Ctx<'_>, _activator: Option<ObjectId>) -> Result<(), BehaviorError> {
        Ok(())
    }

    fn killed(
        &mut self,
        _ctx: &mut Ctx<'_>,
        _attacker: Option<ObjectId>,
        _damage: i32,
    ) -> Result<(), BehaviorError> {
        Ok(())
    }

    /// Called after the kernel resolved `target*` keys into the base.
    fn find_targets(&mut self, _ctx: &mut Ctx<'_>) -> Result<(), BehaviorError> {
        Ok(())
    }

    /// Class events. Returns `false` when the event is not handled.
    fn handle_event(
        &mut self,
        _ctx: &mut Ctx<'_>,
        _event: &'static EventDef,
        _args: &[EventArg],
    ) -> Result<bool, BehaviorError> {
        Ok(false)
    }

    /// Writes class state. References are written as raw ids.
    fn save(&self, _w: &mut SaveWriter) {}

    /// Reads what [`Behavior::save`] wrote, in the same order. `base` is
    /// already restored and supplies defaults for fields missing from older
    /// archives.
    fn restore(&mut self, _base: &ObjectBase, _r: &mut RestoreReader) -> Result<(), ArchiveError> {
        Ok(())
    }

    /// Second restore phase: drop references to objects that did not come
    /// back.
    fn relink(&mut self, _live: &dyn Fn(ObjectId) -> bool) {}

    fn post_restore(&mut self, _ctx: &mut Ctx<'_>) -> Result<(), BehaviorError> {
        Ok(())
    }

    fn field_set(&self) -> Option<&'static FieldSet> {
        None
    }

    /// Current replicated values in field-set order.
    fn write_fields(&self, _view: &ObjectView<'_>, _out: &mut Vec<FieldValue>) {}

    /// Applies a decoded snapshot on an observer world.
    fn apply_fields(
        &mut self,
        _ctx: &mut Ctx<'_>,
        _values: &[FieldValue],
        _changed: bool,
    ) -> Result<(), BehaviorError> {
        Ok(())
    }
}

impl SpawnError {
    pub fn invalid(base: &ObjectBase, reason: impl Into<String>) -> Self {
        SpawnError::Invalid {
            class: base.class.clone(),
            object: base.name.clone(),
            reason: reason.into(),
        }
    }

    pub fn missing_object(base: &ObjectBase, key: &'static str, name: &str) -> Self {
        SpawnError::MissingObject {
            class: base.class.clone(),
            object: base.name.clone(),
            key,
            name: name.to_string(),
        }
    }
}
