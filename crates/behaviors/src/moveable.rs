//! `func_moveable`: a loose physics prop that can be thrown.

use simkit_common::{ObjectId, sec_to_ms};
use simkit_kernel::{
    ActivationMask, ArgKind, Behavior, BehaviorError, Capabilities, ClassInfo, Ctx, EventArg, EventDef,
    ObjectBase, SpawnError,
};
use simkit_persist::{ArchiveError, RestoreReader, SaveWriter};
use simkit_physics::MASK_SHOT;

/// Lets the prop hurt the first thing it hits within the given seconds.
pub static EV_ENABLE_DAMAGE: EventDef = EventDef::new("enableDamage", &[ArgKind::Bool, ArgKind::Float]);

static EVENTS: &[&EventDef] = &[&EV_ENABLE_DAMAGE];

pub fn class() -> ClassInfo {
    ClassInfo {
        name: "func_moveable",
        factory: || Box::new(Moveable::default()),
        events: EVENTS,
        field_set: None,
    }
}

#[derive(Debug, Default)]
pub struct Moveable {
    can_damage: bool,
    damage_end_ms: u64,
}

impl Moveable {
    /// Damages whatever the prop currently overlaps, then disarms.
    fn strike(&mut self, ctx: &mut Ctx<'_>) {
        let Some(bounds) = ctx.abs_bounds() else {
            return;
        };
        let me = ctx.body();
        let physics = ctx.physics_ref();
        let hit: Vec<ObjectId> = physics
            .bodies_touching(&bounds, MASK_SHOT)
            .into_iter()
            .filter(|b| Some(*b) != me)
            .filter_map(|b| physics.owner(b))
            .collect();
        if hit.is_empty() {
            return;
        }
        let damage = ctx.args().get_int("damage", 10);
        for id in hit {
            ctx.damage(id, damage);
        }
        self.can_damage = false;
    }
}

impl Behavior for Moveable {
    fn spawn(&mut self, ctx: &mut Ctx<'_>) -> Result<(), SpawnError> {
        if ctx.args().get_float("mass", 0.0) <= 0.0 {
            tracing::warn!(object = %ctx.id(), "moveable without mass will not move");
        }
        ctx.become_active(ActivationMask::PHYSICS);
        Ok(())
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::MOVEABLE
    }

    fn run_physics(&mut self, ctx: &mut Ctx<'_>) -> Result<(), BehaviorError> {
        ctx.run_physics();
        if self.can_damage {
            if ctx.time_ms() >= self.damage_end_ms {
                self.can_damage = false;
            } else {
                self.strike(ctx);
            }
        }
        Ok(())
    }

    fn handle_event(
        &mut self,
        ctx: &mut Ctx<'_>,
        event: &'static EventDef,
        args: &[EventArg],
    ) -> Result<bool, BehaviorError> {
        if !event.is(&EV_ENABLE_DAMAGE) {
            return Ok(false);
        }
        self.can_damage = args.first().and_then(EventArg::as_bool).unwrap_or(false);
        let duration = args.get(1).and_then(EventArg::as_float).unwrap_or(0.0);
        self.damage_end_ms = ctx.time_ms() + sec_to_ms(duration);
        Ok(true)
    }

    fn save(&self, w: &mut SaveWriter) {
        w.write_bool(self.can_damage);
        w.write_u64(self.damage_end_ms);
    }

    fn restore(&mut self, _base: &ObjectBase, r: &mut RestoreReader) -> Result<(), ArchiveError> {
        self.can_damage = r.read_bool()?;
        self.damage_end_ms = r.read_u64()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{spawn_all, world};

    #[test]
    fn armed_prop_damages_what_it_touches_once() {
        let mut w = world();
        let ids = spawn_all(
            &mut w,
            &[
                ("func_moveable", &[("origin", "0 0 0"), ("damage", "3")]),
                ("info_actor", &[("origin", "4 0 0"), ("health", "10")]),
            ],
        );
        let args = vec![EventArg::Bool(true), EventArg::Float(1.0)];
        w.post_event(ids[0], &EV_ENABLE_DAMAGE, 0, args).unwrap();
        w.run_frames(3);
        assert_eq!(w.object(ids[1]).unwrap().health, 7);
    }

    #[test]
    fn damage_window_expires() {
        let mut w = world();
        let ids = spawn_all(&mut w, &[("func_moveable", &[("origin", "0 0 0")])]);
        let args = vec![EventArg::Bool(true), EventArg::Float(0.02)];
        w.post_event(ids[0], &EV_ENABLE_DAMAGE, 0, args).unwrap();
        w.run_frames(3);
        assert!(crate::testing::dump(&w, ids[0]).contains("can_damage: false"));
    }
}
