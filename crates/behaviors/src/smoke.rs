//! `func_smoke`: a smoke effect driven by the particle subsystem.

use simkit_common::{ObjectId, sec_to_ms};
use simkit_kernel::{ActivationMask, Behavior, BehaviorError, ClassInfo, Ctx, ObjectBase, SpawnError};
use simkit_persist::{ArchiveError, RestoreReader, SaveWriter};

pub fn class() -> ClassInfo {
    ClassInfo {
        name: "func_smoke",
        factory: || Box::new(Smoke::default()),
        events: &[],
        field_set: None,
    }
}

#[derive(Debug, Default)]
pub struct Smoke {
    /// Effect name; no effect means nothing is ever emitted.
    smoke: Option<String>,
    /// When the current puff started; `None` while switched off.
    smoke_time_ms: Option<u64>,
    restart: bool,
    /// Particles emitted since the effect last started.
    emitted: u32,
    last_diversity: f32,
}

impl Smoke {
    fn start(&mut self, ctx: &mut Ctx<'_>) {
        self.smoke_time_ms = Some(ctx.time_ms());
        self.emitted = 0;
        ctx.become_active(ActivationMask::PARTICLES);
    }

    /// One emission step. Returns `false` once the effect has run its
    /// course.
    fn emit(&mut self, ctx: &mut Ctx<'_>, started_ms: u64) -> bool {
        let duration = sec_to_ms(ctx.args().get_float("smoke_duration", 1.0));
        if ctx.time_ms().saturating_sub(started_ms) >= duration {
            return false;
        }
        self.last_diversity = ctx.random().crandom_float();
        self.emitted += 1;
        true
    }
}

impl Behavior for Smoke {
    fn spawn(&mut self, ctx: &mut Ctx<'_>) -> Result<(), SpawnError> {
        let name = ctx.args().get_string("smoke", "");
        self.smoke = (!name.is_empty()).then(|| name.to_string());
        if ctx.args().get_bool("start_off", false) {
            self.smoke_time_ms = None;
            self.restart = false;
            ctx.base_mut().hidden = true;
        } else if self.smoke.is_some() {
            self.start(ctx);
            self.restart = true;
        }
        ctx.set_contents(0);
        Ok(())
    }

    fn update_particles(&mut self, ctx: &mut Ctx<'_>) -> Result<(), BehaviorError> {
        let Some(started) = self.smoke_time_ms else {
            return Ok(());
        };
        if self.smoke.is_none() || ctx.is_hidden() {
            return Ok(());
        }
        if !self.emit(ctx, started) {
            ctx.become_inactive(ActivationMask::PARTICLES);
        }
        Ok(())
    }

    fn activate(&mut self, ctx: &mut Ctx<'_>, _activator: Option<ObjectId>) -> Result<(), BehaviorError> {
        if ctx.args().get_bool("cycletrigger", false) || ctx.is_hidden() {
            ctx.base_mut().hidden = false;
            self.start(ctx);
        } else {
            ctx.base_mut().hidden = true;
            self.smoke_time_ms = None;
            ctx.become_inactive(ActivationMask::PARTICLES);
        }
        Ok(())
    }

    fn save(&self, w: &mut SaveWriter) {
        w.write_int(self.smoke_time_ms.map_or(-1, |t| t as i64));
        w.write_string(self.smoke.as_deref().unwrap_or(""));
        w.write_bool(self.restart);
        w.write_int(i64::from(self.emitted));
    }

    fn restore(&mut self, _base: &ObjectBase, r: &mut RestoreReader) -> Result<(), ArchiveError> {
        let time = r.read_int()?;
        self.smoke_time_ms = u64::try_from(time).ok();
        let name = r.read_string()?;
        self.smoke = (!name.is_empty()).then_some(name);
        self.restart = r.read_bool()?;
        self.emitted = r.read_u32()?;
        Ok(())
    }
}
