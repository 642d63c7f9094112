//! `info_actor` and `info_player`: things other classes aim at.

use glam::Vec3;
use simkit_common::ObjectId;
use simkit_kernel::{
    ActivationMask, Behavior, BehaviorError, Capabilities, ClassInfo, Ctx, ObjectBase, SpawnError,
};
use simkit_persist::{ArchiveError, RestoreReader, SaveWriter};

pub const DEFAULT_EYE_OFFSET: Vec3 = Vec3::new(0.0, 0.0, 64.0);

pub fn actor_class() -> ClassInfo {
    ClassInfo {
        name: "info_actor",
        factory: || Box::new(Actor::default()),
        events: &[],
        field_set: None,
    }
}

pub fn player_class() -> ClassInfo {
    ClassInfo {
        name: "info_player",
        factory: || Box::new(Actor { player: true, dead: false }),
        events: &[],
        field_set: None,
    }
}

#[derive(Debug, Default)]
pub struct Actor {
    player: bool,
    dead: bool,
}

impl Behavior for Actor {
    fn spawn(&mut self, ctx: &mut Ctx<'_>) -> Result<(), SpawnError> {
        let health = ctx.args().get_int("health", 100);
        let eye = ctx.args().get_vector("eye_offset", DEFAULT_EYE_OFFSET);
        let base = ctx.base_mut();
        base.health = health;
        base.take_damage = true;
        base.eye_offset = eye;
        if ctx.args().get_float("mass", 0.0) > 0.0 {
            ctx.become_active(ActivationMask::PHYSICS);
        }
        Ok(())
    }

    fn capabilities(&self) -> Capabilities {
        if self.player {
            Capabilities::ACTOR | Capabilities::PLAYER
        } else {
            Capabilities::ACTOR
        }
    }

    fn killed(&mut self, ctx: &mut Ctx<'_>, attacker: Option<ObjectId>, _damage: i32) -> Result<(), BehaviorError> {
        if self.dead {
            return Ok(());
        }
        self.dead = true;
        ctx.base_mut().take_damage = false;
        tracing::info!(object = %ctx.id(), attacker = ?attacker, "actor killed");
        Ok(())
    }

    fn save(&self, w: &mut SaveWriter) {
        w.write_bool(self.dead);
    }

    fn restore(&mut self, _base: &ObjectBase, r: &mut RestoreReader) -> Result<(), ArchiveError> {
        self.dead = r.read_bool()?;
        Ok(())
    }
}
