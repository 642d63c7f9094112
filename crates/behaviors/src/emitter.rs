//! `func_emitter`: a particle emitter switched on and off by activation.

use simkit_common::render_state::{SHADERPARM_PARTICLE_STOPTIME, SHADERPARM_TIMEOFFSET};
use simkit_common::{ObjectId, ms_to_sec};
use simkit_kernel::{Behavior, BehaviorError, ClassInfo, Ctx, ObjectBase, ObjectView, SpawnError};
use simkit_net::{FieldKind, FieldSet, FieldValue, field};
use simkit_persist::{ArchiveError, RestoreReader, SaveWriter};

pub static EMITTER_FIELDS: FieldSet = FieldSet {
    id: 2,
    name: "func_emitter",
    fields: &[
        field("hidden", FieldKind::Bool),
        field("stop_time", FieldKind::Float),
        field("time_offset", FieldKind::Float),
    ],
};

pub fn class() -> ClassInfo {
    ClassInfo {
        name: "func_emitter",
        factory: || Box::new(Emitter::default()),
        events: &[],
        field_set: Some(&EMITTER_FIELDS),
    }
}

/// `hidden` here means "not emitting"; the model itself stays drawn so
/// live particles can finish.
#[derive(Debug, Default)]
pub struct Emitter {
    hidden: bool,
}

impl Behavior for Emitter {
    fn spawn(&mut self, ctx: &mut Ctx<'_>) -> Result<(), SpawnError> {
        if ctx.args().get_bool("start_off", false) {
            self.hidden = true;
            ctx.base_mut().render.set_parm(SHADERPARM_PARTICLE_STOPTIME, ms_to_sec(1));
            ctx.update_visuals();
        } else {
            self.hidden = false;
        }
        Ok(())
    }

    fn activate(&mut self, ctx: &mut Ctx<'_>, _activator: Option<ObjectId>) -> Result<(), BehaviorError> {
        let now = ctx.time_sec();
        let restart = self.hidden || ctx.args().get_bool("cycleTrigger", false);
        let render = &mut ctx.base_mut().render;
        if restart {
            render.set_parm(SHADERPARM_PARTICLE_STOPTIME, 0.0);
            render.set_parm(SHADERPARM_TIMEOFFSET, -now);
            self.hidden = false;
        } else {
            render.set_parm(SHADERPARM_PARTICLE_STOPTIME, now);
            self.hidden = true;
        }
        ctx.update_visuals();
        Ok(())
    }

    fn save(&self, w: &mut SaveWriter) {
        w.write_bool(self.hidden);
    }

    fn restore(&mut self, _base: &ObjectBase, r: &mut RestoreReader) -> Result<(), ArchiveError> {
        self.hidden = r.read_bool()?;
        Ok(())
    }

    fn field_set(&self) -> Option<&'static FieldSet> {
        Some(&EMITTER_FIELDS)
    }

    fn write_fields(&self, view: &ObjectView<'_>, out: &mut Vec<FieldValue>) {
        let render = &view.base.render;
        out.extend([
            FieldValue::Bool(self.hidden),
            FieldValue::Float(render.parm(SHADERPARM_PARTICLE_STOPTIME)),
            FieldValue::Float(render.parm(SHADERPARM_TIMEOFFSET)),
        ]);
    }

    fn apply_fields(&mut self, ctx: &mut Ctx<'_>, values: &[FieldValue], changed: bool) -> Result<(), BehaviorError> {
        let [FieldValue::Bool(hidden), FieldValue::Float(stop), FieldValue::Float(offset)] = *values else {
            return Err(BehaviorError::Failed("malformed func_emitter snapshot".into()));
        };
        self.hidden = hidden;
        let render = &mut ctx.base_mut().render;
        render.set_parm(SHADERPARM_PARTICLE_STOPTIME, stop);
        render.set_parm(SHADERPARM_TIMEOFFSET, offset);
        if changed {
            ctx.update_visuals();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{dump, spawn, world};

    #[test]
    fn start_off_then_toggle() {
        let mut w = world();
        let id = spawn(&mut w, "func_emitter", &[("start_off", "1")]);
        assert_eq!(w.object(id).unwrap().render.parm(SHADERPARM_PARTICLE_STOPTIME), 0.001);

        w.activate(id, None).unwrap();
        let render = &w.object(id).unwrap().render;
        assert_eq!(render.parm(SHADERPARM_PARTICLE_STOPTIME), 0.0);
        assert_eq!(render.parm(SHADERPARM_TIMEOFFSET), -0.01);
        assert!(dump(&w, id).contains("hidden: false"));

        w.run_frame();
        w.activate(id, None).unwrap();
        assert_eq!(w.object(id).unwrap().render.parm(SHADERPARM_PARTICLE_STOPTIME), 0.02);
        assert!(dump(&w, id).contains("hidden: true"));
    }

    #[test]
    fn cycle_trigger_always_restarts() {
        let mut w = world();
        let id = spawn(&mut w, "func_emitter", &[("cycleTrigger", "1")]);
        w.activate(id, None).unwrap();
        w.activate(id, None).unwrap();
        assert!(dump(&w, id).contains("hidden: false"));
    }

    #[test]
    fn snapshot_refreshes_visuals_only_when_changed() {
        let mut w = world();
        let id = spawn(&mut w, "func_emitter", &[]);
        w.take_visual_updates();
        let update = |changed| simkit_net::Update {
            object: id,
            set_id: EMITTER_FIELDS.id,
            values: vec![FieldValue::Bool(true), FieldValue::Float(1.5), FieldValue::Float(-1.0)],
            changed,
        };
        w.apply_updates(&[update(false)]);
        w.run_frame();
        assert!(w.take_visual_updates().is_empty());
        w.apply_updates(&[update(true)]);
        w.run_frame();
        assert_eq!(w.take_visual_updates(), vec![id]);
        assert_eq!(w.object(id).unwrap().render.parm(SHADERPARM_PARTICLE_STOPTIME), 1.5);
    }
}
