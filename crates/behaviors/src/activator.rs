//! `func_activator`: activates the owners of trigger volumes it touches.

use simkit_common::ObjectId;
use simkit_kernel::{ActivationMask, Behavior, BehaviorError, ClassInfo, Ctx, ObjectBase, SpawnError};
use simkit_persist::{ArchiveError, RestoreReader, SaveWriter};
use simkit_physics::{Aabb, CONTENTS_TRIGGER};

/// Half-size of the touch box around the origin.
const TOUCH_EXTENT: f32 = 4.0;

pub fn class() -> ClassInfo {
    ClassInfo {
        name: "func_activator",
        factory: || Box::new(Activator::default()),
        events: &[],
        field_set: None,
    }
}

#[derive(Debug, Default)]
pub struct Activator {
    stay_on: bool,
}

impl Activator {
    /// Returns whether any trigger was touched.
    fn touch_triggers(ctx: &mut Ctx<'_>) -> bool {
        let volume = Aabb::cube(TOUCH_EXTENT).translate(ctx.origin());
        let me = ctx.body();
        let physics = ctx.physics_ref();
        let owners: Vec<ObjectId> = physics
            .bodies_touching(&volume, CONTENTS_TRIGGER)
            .into_iter()
            .filter(|b| Some(*b) != me)
            .filter_map(|b| physics.owner(b))
            .collect();
        let activator = Some(ctx.id());
        for owner in &owners {
            if let Err(e) = ctx.activate(*owner, activator) {
                tracing::error!(object = %ctx.id(), %owner, error = %e, "trigger activation failed");
            }
        }
        !owners.is_empty()
    }
}

impl Behavior for Activator {
    fn spawn(&mut self, ctx: &mut Ctx<'_>) -> Result<(), SpawnError> {
        self.stay_on = ctx.args().get_bool("stay_on", false);
        ctx.set_contents(0);
        if !ctx.args().get_bool("start_off", false) {
            ctx.become_active(ActivationMask::THINK);
        }
        Ok(())
    }

    fn think(&mut self, ctx: &mut Ctx<'_>) -> Result<(), BehaviorError> {
        if Self::touch_triggers(ctx) && !self.stay_on {
            ctx.become_inactive(ActivationMask::THINK);
        }
        Ok(())
    }

    fn activate(&mut self, ctx: &mut Ctx<'_>, _activator: Option<ObjectId>) -> Result<(), BehaviorError> {
        if ctx.is_active(ActivationMask::THINK) {
            ctx.become_inactive(ActivationMask::THINK);
        } else {
            ctx.become_active(ActivationMask::THINK);
        }
        Ok(())
    }

    fn save(&self, w: &mut SaveWriter) {
        w.write_bool(self.stay_on);
    }

    fn restore(&mut self, _base: &ObjectBase, r: &mut RestoreReader) -> Result<(), ArchiveError> {
        self.stay_on = r.read_bool()?;
        Ok(())
    }
}
