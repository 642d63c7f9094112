//! `func_beam`: a beam drawn from this object to another beam.
//!
//! The master beam finds its target on post-spawn and tells it who its
//! master is. From then on the target reports its origin back whenever it
//! moves, and the master redraws its end point. Either side can disappear;
//! the links are weak ids.

use glam::Vec3;
use simkit_common::ObjectId;
use simkit_common::render_state::{
    SHADERPARM_BEAM_END_X, SHADERPARM_BEAM_END_Y, SHADERPARM_BEAM_END_Z, SHADERPARM_BEAM_WIDTH,
};
use simkit_kernel::{
    ActivationMask, ArgKind, Behavior, BehaviorError, Capabilities, ClassInfo, Ctx, EventArg, EventDef,
    ObjectBase, ObjectView, SpawnError,
};
use simkit_net::{FieldKind, FieldSet, FieldValue, field};
use simkit_persist::{ArchiveError, RestoreReader, SaveWriter};

pub const BEAM_MODEL: &str = "_BEAM";

/// Sent by a master to its target beam.
pub static EV_SET_MASTER: EventDef = EventDef::new("<setmaster>", &[ArgKind::Object]);
/// Sent by a target to its master with the target's new origin.
pub static EV_BEAM_END: EventDef = EventDef::new("<beamend>", &[ArgKind::Vector]);

static EVENTS: &[&EventDef] = &[&EV_SET_MASTER, &EV_BEAM_END];

pub static BEAM_FIELDS: FieldSet = FieldSet {
    id: 3,
    name: "func_beam",
    fields: &[
        field("origin_x", FieldKind::Float),
        field("origin_y", FieldKind::Float),
        field("origin_z", FieldKind::Float),
        field("color", FieldKind::Color),
        field("end_x", FieldKind::Float),
        field("end_y", FieldKind::Float),
        field("end_z", FieldKind::Float),
    ],
};

pub fn class() -> ClassInfo {
    ClassInfo {
        name: "func_beam",
        factory: || Box::new(Beam::default()),
        events: EVENTS,
        field_set: Some(&BEAM_FIELDS),
    }
}

#[derive(Debug, Default)]
pub struct Beam {
    target: Option<ObjectId>,
    master: Option<ObjectId>,
    /// Origin last reported to the master.
    reported: Option<Vec3>,
}

impl Beam {
    fn beam_end(ctx: &Ctx<'_>) -> Vec3 {
        let parms = &ctx.base().render;
        Vec3::new(
            parms.parm(SHADERPARM_BEAM_END_X),
            parms.parm(SHADERPARM_BEAM_END_Y),
            parms.parm(SHADERPARM_BEAM_END_Z),
        )
    }

    fn set_beam_end(ctx: &mut Ctx<'_>, end: Vec3) {
        if Self::beam_end(ctx) == end {
            return;
        }
        let render = &mut ctx.base_mut().render;
        render.set_parm(SHADERPARM_BEAM_END_X, end.x);
        render.set_parm(SHADERPARM_BEAM_END_Y, end.y);
        render.set_parm(SHADERPARM_BEAM_END_Z, end.z);
        ctx.update_visuals();
    }

    fn show(&self, ctx: &mut Ctx<'_>) {
        ctx.show();
        if let Some(end) = self.target.and_then(|t| ctx.origin_of(t)) {
            Self::set_beam_end(ctx, end);
        }
    }
}

impl Behavior for Beam {
    fn spawn(&mut self, ctx: &mut Ctx<'_>) -> Result<(), SpawnError> {
        if let Some(width) = ctx.args().find_float("width") {
            ctx.base_mut().render.set_parm(SHADERPARM_BEAM_WIDTH, width);
        }
        ctx.base_mut().render.model = BEAM_MODEL.to_string();
        ctx.hide();
        Ok(())
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::BEAM
    }

    /// Picks the first target that is itself a beam.
    fn post_spawn(&mut self, ctx: &mut Ctx<'_>) -> Result<(), SpawnError> {
        let targets = ctx.base().targets.clone();
        if targets.is_empty() {
            tracing::warn!(object = %ctx.id(), "beam has no target; staying hidden");
            return Ok(());
        }
        let Some(target) = targets
            .into_iter()
            .find(|t| ctx.has_capability(*t, Capabilities::BEAM))
        else {
            return Err(SpawnError::invalid(ctx.base(), "no target is a beam"));
        };
        self.target = Some(target);
        ctx.post_to(target, &EV_SET_MASTER, 0, vec![EventArg::Object(Some(ctx.id()))])?;
        ctx.become_active(ActivationMask::THINK);
        if !ctx.args().get_bool("start_off", false) {
            self.show(ctx);
        }
        Ok(())
    }

    fn think(&mut self, ctx: &mut Ctx<'_>) -> Result<(), BehaviorError> {
        let target_alive = self.target.is_some_and(|t| ctx.object(t).is_some());
        if !ctx.is_hidden() && !target_alive {
            ctx.hide();
        }
        if let Some(master) = self.master {
            if ctx.object(master).is_none() {
                self.master = None;
            } else {
                let origin = ctx.origin();
                if self.reported != Some(origin) {
                    ctx.post_to(master, &EV_BEAM_END, 0, vec![EventArg::Vector(origin)])?;
                    self.reported = Some(origin);
                }
            }
        }
        if self.master.is_none() && !target_alive {
            ctx.become_inactive(ActivationMask::THINK);
        }
        Ok(())
    }

    fn activate(&mut self, ctx: &mut Ctx<'_>, _activator: Option<ObjectId>) -> Result<(), BehaviorError> {
        if ctx.is_hidden() {
            self.show(ctx);
        } else {
            ctx.hide();
        }
        Ok(())
    }

    fn handle_event(
        &mut self,
        ctx: &mut Ctx<'_>,
        event: &'static EventDef,
        args: &[EventArg],
    ) -> Result<bool, BehaviorError> {
        if event.is(&EV_SET_MASTER) {
            self.master = args.first().and_then(EventArg::as_object);
            self.reported = None;
            ctx.become_active(ActivationMask::THINK);
            return Ok(true);
        }
        if event.is(&EV_BEAM_END) {
            if let Some(end) = args.first().and_then(EventArg::as_vector) {
                Self::set_beam_end(ctx, end);
            }
            return Ok(true);
        }
        Ok(false)
    }

    fn save(&self, w: &mut SaveWriter) {
        w.write_object(self.target);
        w.write_object(self.master);
    }

    fn restore(&mut self, _base: &ObjectBase, r: &mut RestoreReader) -> Result<(), ArchiveError> {
        self.target = r.read_object()?;
        self.master = r.read_object()?;
        self.reported = None;
        Ok(())
    }

    fn relink(&mut self, live: &dyn Fn(ObjectId) -> bool) {
        self.target = self.target.filter(|t| live(*t));
        self.master = self.master.filter(|m| live(*m));
    }

    fn field_set(&self) -> Option<&'static FieldSet> {
        Some(&BEAM_FIELDS)
    }

    fn write_fields(&self, view: &ObjectView<'_>, out: &mut Vec<FieldValue>) {
        let origin = view.origin();
        let render = &view.base.render;
        out.extend([
            FieldValue::Float(origin.x),
            FieldValue::Float(origin.y),
            FieldValue::Float(origin.z),
            FieldValue::Color(render.color()),
            FieldValue::Float(render.parm(SHADERPARM_BEAM_END_X)),
            FieldValue::Float(render.parm(SHADERPARM_BEAM_END_Y)),
            FieldValue::Float(render.parm(SHADERPARM_BEAM_END_Z)),
        ]);
    }

    fn apply_fields(&mut self, ctx: &mut Ctx<'_>, values: &[FieldValue], changed: bool) -> Result<(), BehaviorError> {
        let [
            FieldValue::Float(x),
            FieldValue::Float(y),
            FieldValue::Float(z),
            FieldValue::Color(color),
            FieldValue::Float(end_x),
            FieldValue::Float(end_y),
            FieldValue::Float(end_z),
        ] = *values
        else {
            return Err(BehaviorError::Failed("malformed func_beam snapshot".into()));
        };
        ctx.set_origin(Vec3::new(x, y, z));
        let render = &mut ctx.base_mut().render;
        render.set_color(color);
        render.set_parm(SHADERPARM_BEAM_END_X, end_x);
        render.set_parm(SHADERPARM_BEAM_END_Y, end_y);
        render.set_parm(SHADERPARM_BEAM_END_Z, end_z);
        if changed {
            ctx.update_visuals();
        }
        Ok(())
    }
}
