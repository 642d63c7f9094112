//! `func_explosion`: hidden until activated, then flashes and removes itself.

use glam::Vec4;
use simkit_common::ObjectId;
use simkit_common::render_state::{SHADERPARM_DIVERSITY, SHADERPARM_TIMEOFFSET};
use simkit_kernel::{Behavior, BehaviorError, ClassInfo, Ctx, EV_REMOVE, SpawnError};

/// How long the explosion stays visible.
pub const EXPLOSION_LIFETIME_MS: u64 = 2000;

pub fn class() -> ClassInfo {
    ClassInfo {
        name: "func_explosion",
        factory: || Box::new(Explosion),
        events: &[],
        field_set: None,
    }
}

#[derive(Debug, Default)]
pub struct Explosion;

impl Explosion {
    /// Full damage to every damageable object within `radius`.
    fn radius_damage(ctx: &mut Ctx<'_>, damage: i32, radius: f32) {
        let center = ctx.origin();
        let victims: Vec<ObjectId> = ctx
            .world()
            .objects()
            .filter(|b| b.id != ctx.id() && b.take_damage)
            .map(|b| b.id)
            .collect();
        for id in victims {
            let in_range = ctx
                .origin_of(id)
                .is_some_and(|o| o.distance(center) <= radius);
            if in_range {
                ctx.damage(id, damage);
            }
        }
    }
}

impl Behavior for Explosion {
    fn spawn(&mut self, ctx: &mut Ctx<'_>) -> Result<(), SpawnError> {
        ctx.hide();
        Ok(())
    }

    fn activate(&mut self, ctx: &mut Ctx<'_>, activator: Option<ObjectId>) -> Result<(), BehaviorError> {
        let damage = ctx.args().get_int("damage", 0);
        let radius = ctx.args().get_float("radius", 0.0);
        if damage > 0 && radius > 0.0 {
            Self::radius_damage(ctx, damage, radius);
        }

        let time_sec = ctx.time_sec();
        let render = &mut ctx.base_mut().render;
        render.set_color(Vec4::ONE);
        render.set_parm(SHADERPARM_TIMEOFFSET, -time_sec);
        render.set_parm(SHADERPARM_DIVERSITY, 0.0);
        ctx.show();

        ctx.post(&EV_REMOVE, EXPLOSION_LIFETIME_MS, vec![])?;
        ctx.activate_targets(activator);
        Ok(())
    }
}
