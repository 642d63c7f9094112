//! `func_shaking`: rattles in place on a never-ending angular curve.

use glam::Vec3;
use simkit_common::{ObjectId, angles_to_axis, axis_to_angles};
use simkit_kernel::{ActivationMask, Behavior, BehaviorError, ClassInfo, Ctx, ObjectBase, SpawnError};
use simkit_persist::{ArchiveError, RestoreReader, SaveWriter};
use simkit_physics::{Curve, Extrapolate, MASK_SOLID};

pub fn class() -> ClassInfo {
    ClassInfo {
        name: "func_shaking",
        factory: || Box::new(Shaking::default()),
        events: &[],
        field_set: None,
    }
}

#[derive(Debug, Default)]
pub struct Shaking {
    active: bool,
    angles: Extrapolate,
}

impl Shaking {
    fn begin(&mut self, ctx: &mut Ctx<'_>) {
        self.active = true;
        let phase = ctx.random().random_int(1000) as f32;
        let shake = ctx.args().get_angles("shake", Vec3::splat(0.5));
        let period_ms = ctx.args().get_float("period", 0.05) * 1000.0;
        let start = axis_to_angles(ctx.axis());
        self.angles = Extrapolate::new(Curve::DecelSine, true, phase, period_ms * 0.25, start, Vec3::ZERO, shake);
        ctx.become_active(ActivationMask::PHYSICS);
    }

    fn stop(&mut self, ctx: &mut Ctx<'_>) {
        self.active = false;
        self.angles = Extrapolate::hold(axis_to_angles(ctx.axis()));
        ctx.become_inactive(ActivationMask::PHYSICS);
    }
}

impl Behavior for Shaking {
    fn spawn(&mut self, ctx: &mut Ctx<'_>) -> Result<(), SpawnError> {
        if let Some(body) = ctx.body() {
            ctx.physics().set_clip_mask(body, MASK_SOLID);
        }
        self.active = false;
        self.angles = Extrapolate::hold(axis_to_angles(ctx.axis()));
        if !ctx.args().get_bool("start_off", false) {
            self.begin(ctx);
        }
        Ok(())
    }

    fn run_physics(&mut self, ctx: &mut Ctx<'_>) -> Result<(), BehaviorError> {
        let angles = self.angles.value_at(ctx.time_ms() as f32);
        ctx.set_axis(angles_to_axis(angles));
        ctx.update_visuals();
        Ok(())
    }

    fn activate(&mut self, ctx: &mut Ctx<'_>, _activator: Option<ObjectId>) -> Result<(), BehaviorError> {
        if self.active {
            self.stop(ctx);
        } else {
            self.begin(ctx);
        }
        Ok(())
    }

    fn save(&self, w: &mut SaveWriter) {
        w.write_bool(self.active);
        self.angles.save(w);
    }

    fn restore(&mut self, _base: &ObjectBase, r: &mut RestoreReader) -> Result<(), ArchiveError> {
        self.active = r.read_bool()?;
        self.angles = Extrapolate::restore(r)?;
        Ok(())
    }
}
