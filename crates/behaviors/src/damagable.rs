//! `func_damagable`: breaks when killed or activated.

use simkit_common::render_state::{SHADERPARM_MODE, SHADERPARM_TIMEOFFSET};
use simkit_common::{ObjectId, sec_to_ms};
use simkit_kernel::{
    ArgKind, Behavior, BehaviorError, Capabilities, ClassInfo, Ctx, EventArg, EventDef, ObjectBase, SpawnError,
};
use simkit_persist::{ArchiveError, RestoreReader, SaveWriter};
use simkit_physics::CONTENTS_SOLID;

/// Puts a hidden broken object back together.
pub static EV_RESTORE_DAMAGABLE: EventDef = EventDef::new("<RestoreDamagable>", &[]);
/// Breaks the object now, as if activated by the argument.
pub static EV_BREAK: EventDef = EventDef::new("break", &[ArgKind::Object]);

static EVENTS: &[&EventDef] = &[&EV_RESTORE_DAMAGABLE, &EV_BREAK];

pub fn class() -> ClassInfo {
    ClassInfo {
        name: "func_damagable",
        factory: || Box::new(Damagable::default()),
        events: EVENTS,
        field_set: None,
    }
}

#[derive(Debug, Default)]
pub struct Damagable {
    /// Breaks left before the object stops taking damage.
    count: i32,
    next_trigger_ms: u64,
}

impl Damagable {
    fn become_broken(&mut self, ctx: &mut Ctx<'_>, activator: Option<ObjectId>) -> Result<(), BehaviorError> {
        let now = ctx.time_ms();
        if now < self.next_trigger_ms {
            return Ok(());
        }
        let wait = ctx.args().get_float("wait", 0.1);
        self.next_trigger_ms = now + sec_to_ms(wait);

        if self.count > 0 {
            self.count -= 1;
            if self.count == 0 {
                ctx.base_mut().take_damage = false;
            } else {
                let health = ctx.args().get_int("health", 5);
                ctx.base_mut().health = health;
            }
        }

        let args = ctx.args();
        let broken = args.get_string("broken", "").to_string();
        let num_states = args.get_int("numstates", 1);
        let cycle = args.get_bool("cycle", false);
        let force_state = args.get_int("forcestate", 0);
        let non_solid = args.get_bool("nonSolidWhenBroken", false);
        let hide = args.get_bool("hideWhenBroken", false);

        let mode = if cycle {
            let next = ctx.base().render.parm(SHADERPARM_MODE) as i32 + 1;
            if next > num_states { 0 } else { next }
        } else if force_state != 0 {
            force_state
        } else {
            ctx.random().random_int(num_states) + 1
        };

        let time_sec = ctx.time_sec();
        let render = &mut ctx.base_mut().render;
        if !broken.is_empty() {
            render.model = broken;
        }
        render.set_parm(SHADERPARM_TIMEOFFSET, -time_sec);
        render.set_parm(SHADERPARM_MODE, mode as f32);
        ctx.update_visuals();

        ctx.activate_targets(activator);

        if non_solid {
            ctx.set_contents(0);
        }
        if hide {
            ctx.hide();
            ctx.post(&EV_RESTORE_DAMAGABLE, self.next_trigger_ms - now, vec![])?;
        }
        tracing::debug!(object = %ctx.id(), mode, count = self.count, "broken");
        Ok(())
    }

    fn restore_damagable(&mut self, ctx: &mut Ctx<'_>) {
        let health = ctx.args().get_int("health", 5);
        ctx.base_mut().health = health;
        ctx.set_contents(CONTENTS_SOLID);
        ctx.show();
    }
}

impl Behavior for Damagable {
    fn spawn(&mut self, ctx: &mut Ctx<'_>) -> Result<(), SpawnError> {
        let health = ctx.args().get_int("health", 5);
        self.count = ctx.args().get_int("count", 1);
        self.next_trigger_ms = 0;
        let base = ctx.base_mut();
        base.health = health;
        base.take_damage = true;
        ctx.set_contents(CONTENTS_SOLID);
        Ok(())
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::DAMAGABLE
    }

    fn activate(&mut self, ctx: &mut Ctx<'_>, activator: Option<ObjectId>) -> Result<(), BehaviorError> {
        self.become_broken(ctx, activator)
    }

    fn killed(&mut self, ctx: &mut Ctx<'_>, attacker: Option<ObjectId>, damage: i32) -> Result<(), BehaviorError> {
        if ctx.time_ms() < self.next_trigger_ms {
            // Still recovering from the last break: undo the blow.
            ctx.base_mut().health += damage;
            return Ok(());
        }
        self.become_broken(ctx, attacker)
    }

    fn handle_event(
        &mut self,
        ctx: &mut Ctx<'_>,
        event: &'static EventDef,
        args: &[EventArg],
    ) -> Result<bool, BehaviorError> {
        if event.is(&EV_RESTORE_DAMAGABLE) {
            self.restore_damagable(ctx);
            return Ok(true);
        }
        if event.is(&EV_BREAK) {
            self.become_broken(ctx, args.first().and_then(EventArg::as_object))?;
            return Ok(true);
        }
        Ok(false)
    }

    fn save(&self, w: &mut SaveWriter) {
        w.write_int(i64::from(self.count));
        w.write_u64(self.next_trigger_ms);
    }

    fn restore(&mut self, base: &ObjectBase, r: &mut RestoreReader) -> Result<(), ArchiveError> {
        self.count = r.read_i32_or(base.args.get_int("count", 1))?;
        self.next_trigger_ms = r.read_u64_or(0)?;
        Ok(())
    }
}
