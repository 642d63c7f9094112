//! `func_forcefield`: a volume that pushes bodies while switched on.

use simkit_common::ObjectId;
use simkit_kernel::{
    ActivationMask, Behavior, BehaviorError, Capabilities, ClassInfo, Ctx, EventArg, EventDef, ObjectBase,
    SpawnError,
};
use simkit_persist::{ArchiveError, RestoreReader, SaveWriter};
use simkit_physics::{ApplyMode, BodyId, ForceField as Field};

/// Flips the field on or off.
pub static EV_TOGGLE: EventDef = EventDef::new("Toggle", &[]);

static EVENTS: &[&EventDef] = &[&EV_TOGGLE];

pub fn class() -> ClassInfo {
    ClassInfo {
        name: "func_forcefield",
        factory: || Box::new(ForceField::default()),
        events: EVENTS,
        field_set: None,
    }
}

#[derive(Debug, Default)]
pub struct ForceField {
    field: Field,
}

impl ForceField {
    fn toggle(ctx: &mut Ctx<'_>) {
        if ctx.is_active(ActivationMask::THINK) {
            ctx.become_inactive(ActivationMask::THINK);
        } else {
            ctx.become_active(ActivationMask::THINK);
        }
    }
}

impl Behavior for ForceField {
    fn spawn(&mut self, ctx: &mut Ctx<'_>) -> Result<(), SpawnError> {
        let args = ctx.args();
        let mut field = Field::default();
        if let Some(force) = args.find_vector("uniform") {
            field.uniform(force);
        } else if let Some(magnitude) = args.find_float("explosion") {
            field.explosion(magnitude);
        } else if let Some(magnitude) = args.find_float("implosion") {
            field.implosion(magnitude);
        }
        field.random_torque = args.get_float("randomTorque", 0.0);
        field.apply = if args.get_bool("applyForce", false) {
            ApplyMode::Force
        } else if args.get_bool("applyImpulse", false) {
            ApplyMode::Impulse
        } else {
            ApplyMode::Velocity
        };
        field.player_only = args.get_bool("playerOnly", false);
        field.monster_only = args.get_bool("monsterOnly", false);
        let start_on = args.get_bool("start_on", false);
        self.field = field;

        // The body stays for its bounds but no longer collides.
        ctx.set_contents(0);
        if start_on {
            ctx.become_active(ActivationMask::THINK);
        }
        Ok(())
    }

    /// Aims a uniform field at the first target.
    fn find_targets(&mut self, ctx: &mut Ctx<'_>) -> Result<(), BehaviorError> {
        let Some(target) = ctx.base().targets.first().copied() else {
            return Ok(());
        };
        if let Some(at) = ctx.origin_of(target) {
            self.field.uniform(at - ctx.origin());
        }
        Ok(())
    }

    fn think(&mut self, ctx: &mut Ctx<'_>) -> Result<(), BehaviorError> {
        let Some(volume) = ctx.abs_bounds() else {
            return Ok(());
        };
        let me = ctx.body();
        let field = self.field;
        let (physics, random, query) = ctx.physics_split();
        let accept = |body: BodyId| {
            let caps = query.body_capabilities(body);
            if field.player_only {
                caps.contains(Capabilities::PLAYER)
            } else if field.monster_only {
                caps.contains(Capabilities::ACTOR) && !caps.contains(Capabilities::PLAYER)
            } else {
                true
            }
        };
        let pushed = field.evaluate(physics, &volume, me, random, &accept);
        tracing::trace!(object = %ctx.id(), pushed, "force field");
        Ok(())
    }

    fn activate(&mut self, ctx: &mut Ctx<'_>, _activator: Option<ObjectId>) -> Result<(), BehaviorError> {
        Self::toggle(ctx);
        if let Some(wait) = ctx.args().find_float("wait") {
            ctx.post_sec(&EV_TOGGLE, wait, vec![])?;
        }
        Ok(())
    }

    fn handle_event(
        &mut self,
        ctx: &mut Ctx<'_>,
        event: &'static EventDef,
        _args: &[EventArg],
    ) -> Result<bool, BehaviorError> {
        if event.is(&EV_TOGGLE) {
            Self::toggle(ctx);
            return Ok(true);
        }
        Ok(false)
    }

    fn save(&self, w: &mut SaveWriter) {
        self.field.save(w);
    }

    fn restore(&mut self, _base: &ObjectBase, r: &mut RestoreReader) -> Result<(), ArchiveError> {
        self.field = Field::restore(r)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{spawn_all, world};
    use glam::Vec3;
    use simkit_kernel::World;

    fn velocity(w: &World, id: ObjectId) -> Vec3 {
        let body = w.object(id).unwrap().body.unwrap();
        w.physics().linear_velocity(body).unwrap()
    }

    fn field_with(extra: &[(&'static str, &'static str)]) -> (World, Vec<ObjectId>) {
        let mut w = world();
        let mut field = vec![("mins", "-64 -64 -64"), ("maxs", "64 64 64")];
        field.extend_from_slice(extra);
        let ids = spawn_all(
            &mut w,
            &[
                ("func_forcefield", field.as_slice()),
                ("func_moveable", &[("origin", "20 0 0"), ("mass", "1")]),
                ("func_moveable", &[("origin", "40 0 0"), ("mass", "1")]),
                ("func_moveable", &[("origin", "200 0 0"), ("mass", "1")]),
            ],
        );
        (w, ids)
    }

    #[test]
    fn explosion_pushes_outward_with_falloff() {
        let (w, ids) = field_with(&[("explosion", "500"), ("start_on", "1")]);
        let near = velocity(&w, ids[1]);
        let far = velocity(&w, ids[2]);
        assert!(near.x > far.x && far.x > 0.0, "near {near} far {far}");
        assert!(near.x <= 500.0);
        assert_eq!(velocity(&w, ids[3]).x, 0.0);
    }

    #[test]
    fn field_is_off_until_activated() {
        let (mut w, ids) = field_with(&[("explosion", "500")]);
        assert_eq!(velocity(&w, ids[1]).x, 0.0);
        w.activate(ids[0], None).unwrap();
        w.run_frame();
        assert!(velocity(&w, ids[1]).x > 0.0);
    }

    #[test]
    fn wait_toggles_back_off() {
        let (mut w, ids) = field_with(&[("explosion", "500"), ("wait", "0.05")]);
        w.activate(ids[0], None).unwrap();
        assert!(w.mask_of(ids[0]).contains(ActivationMask::THINK));
        assert!(w.has_pending(ids[0], &EV_TOGGLE));
        w.run_frames(6);
        assert!(!w.mask_of(ids[0]).contains(ActivationMask::THINK));
    }

    #[test]
    fn uniform_field_aims_at_its_target() {
        let mut w = world();
        let ids = spawn_all(
            &mut w,
            &[
                ("func_forcefield", &[("uniform", "0 0 0"), ("target", "aim"), ("start_on", "1"), ("size", "128")]),
                ("func_static", &[("name", "aim"), ("origin", "0 300 0")]),
                ("func_moveable", &[("origin", "10 0 0"), ("mass", "1")]),
            ],
        );
        let v = velocity(&w, ids[2]);
        assert!(v.y > 0.0 && v.x == 0.0, "{v}");
    }

    #[test]
    fn player_only_ignores_props() {
        let (w, ids) = field_with(&[("explosion", "500"), ("start_on", "1"), ("playerOnly", "1")]);
        assert_eq!(velocity(&w, ids[1]).x, 0.0);
    }
}
