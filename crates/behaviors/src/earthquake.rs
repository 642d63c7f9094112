//! `func_earthquake`: periodic or triggered quakes that shove loose bodies.

use simkit_common::{ObjectId, sec_to_ms};
use simkit_kernel::{
    ActivationMask, Behavior, BehaviorError, Capabilities, ClassInfo, Ctx, EV_ACTIVATE, EV_REMOVE, EventArg,
    ObjectBase, SpawnError,
};
use simkit_persist::{ArchiveError, RestoreReader, SaveWriter};
use simkit_physics::{Aabb, ApplyMode, ForceField};

/// Reach of the shove around the quake origin.
pub const QUAKE_PUSH_RADIUS: f32 = 256.0;
/// Shove strength at full amplitude.
pub const QUAKE_PUSH: f32 = 1500.0;

pub fn class() -> ClassInfo {
    ClassInfo {
        name: "func_earthquake",
        factory: || Box::new(Earthquake::default()),
        events: &[],
        field_set: None,
    }
}

#[derive(Debug, Default)]
pub struct Earthquake {
    next_trigger_ms: u64,
    shake_stop_ms: u64,
    /// Seconds between quakes.
    wait: f32,
    /// Jitter on `wait`, in seconds either way.
    random: f32,
    triggered: bool,
    player_oriented: bool,
    disabled: bool,
    /// Seconds each quake shakes for.
    shake_time: f32,
}

impl Earthquake {
    fn jittered_wait(&self, ctx: &mut Ctx<'_>) -> f32 {
        self.wait + self.random * ctx.random().crandom_float()
    }

    fn reschedule(&self, ctx: &mut Ctx<'_>) -> Result<(), BehaviorError> {
        let delay = self.jittered_wait(ctx);
        let me = ctx.id();
        ctx.post_sec(&EV_ACTIVATE, delay, vec![EventArg::Object(Some(me))])?;
        Ok(())
    }

    fn push(ctx: &mut Ctx<'_>) {
        let amplitude = ctx.args().get_float("amplitude", 1.0);
        let mut field = ForceField::default();
        field.explosion(QUAKE_PUSH * amplitude);
        field.apply = ApplyMode::Impulse;
        let volume = Aabb::cube(QUAKE_PUSH_RADIUS).translate(ctx.origin());
        let me = ctx.body();
        let (physics, random, _) = ctx.physics_split();
        field.evaluate(physics, &volume, me, random, &|_| true);
    }
}

impl Behavior for Earthquake {
    fn spawn(&mut self, ctx: &mut Ctx<'_>) -> Result<(), SpawnError> {
        let args = ctx.args();
        self.next_trigger_ms = 0;
        self.shake_stop_ms = 0;
        self.wait = args.get_float("wait", 15.0);
        self.random = args.get_float("random", 5.0);
        self.triggered = args.get_bool("triggered", false);
        self.player_oriented = args.get_bool("playerOriented", false);
        self.disabled = false;
        self.shake_time = args.get_float("shakeTime", 0.0);
        if !self.triggered {
            let me = ctx.id();
            ctx.post_sec(&EV_ACTIVATE, self.wait, vec![EventArg::Object(Some(me))])?;
        }
        ctx.become_inactive(ActivationMask::THINK);
        Ok(())
    }

    fn activate(&mut self, ctx: &mut Ctx<'_>, activator: Option<ObjectId>) -> Result<(), BehaviorError> {
        let now = ctx.time_ms();
        let from_self = activator == Some(ctx.id());
        if self.next_trigger_ms > now {
            return Ok(());
        }
        if self.disabled && from_self {
            return Ok(());
        }
        if ctx.objects_with(Capabilities::PLAYER).is_empty() {
            tracing::debug!(object = %ctx.id(), "no player; quake skipped");
            return Ok(());
        }

        self.next_trigger_ms = 0;
        if !self.triggered && !from_self {
            // Outside activation switches a random quake off or back on.
            self.disabled = !self.disabled;
            if self.disabled {
                return Ok(());
            }
        }

        ctx.activate_targets(activator);

        if self.shake_time > 0.0 {
            self.shake_stop_ms = now + sec_to_ms(self.shake_time);
            ctx.become_active(ActivationMask::THINK);
        }

        if self.wait > 0.0 {
            if !self.triggered {
                self.reschedule(ctx)?;
            } else {
                let delay = self.jittered_wait(ctx);
                self.next_trigger_ms = now + sec_to_ms(delay);
            }
        } else if self.shake_time == 0.0 {
            ctx.post(&EV_REMOVE, 0, vec![])?;
        }
        tracing::debug!(object = %ctx.id(), stop = self.shake_stop_ms, "quake");
        Ok(())
    }

    fn think(&mut self, ctx: &mut Ctx<'_>) -> Result<(), BehaviorError> {
        if ctx.time_ms() > self.shake_stop_ms {
            ctx.become_inactive(ActivationMask::THINK);
            if self.wait <= 0.0 {
                ctx.post(&EV_REMOVE, 0, vec![])?;
            }
            return Ok(());
        }
        Self::push(ctx);
        Ok(())
    }

    fn save(&self, w: &mut SaveWriter) {
        w.write_u64(self.next_trigger_ms);
        w.write_u64(self.shake_stop_ms);
        w.write_float(self.wait);
        w.write_float(self.random);
        w.write_bool(self.triggered);
        w.write_bool(self.player_oriented);
        w.write_bool(self.disabled);
        w.write_float(self.shake_time);
    }

    fn restore(&mut self, base: &ObjectBase, r: &mut RestoreReader) -> Result<(), ArchiveError> {
        let args = &base.args;
        self.next_trigger_ms = r.read_u64()?;
        self.shake_stop_ms = r.read_u64()?;
        self.wait = r.read_float()?;
        self.random = r.read_float()?;
        self.triggered = r.read_bool()?;
        // Fields below came later; shorter records fall back to spawn args.
        self.player_oriented = r.read_bool_or(args.get_bool("playerOriented", false))?;
        self.disabled = r.read_bool_or(false)?;
        self.shake_time = r.read_float_or(args.get_float("shakeTime", 0.0))?;
        Ok(())
    }

    fn post_restore(&mut self, ctx: &mut Ctx<'_>) -> Result<(), BehaviorError> {
        if self.shake_stop_ms > ctx.time_ms() {
            ctx.become_active(ActivationMask::THINK);
        }
        Ok(())
    }
}
