//! `func_static`: a placed model that toggles on activation and can fade
//! its colour over time.

use glam::{Vec3, Vec4};
use simkit_common::render_state::{SHADERPARM_MODE, SHADERPARM_TIMEOFFSET};
use simkit_common::{ObjectId, ms_to_sec, sec_to_ms};
use simkit_kernel::{
    ActivationMask, ArgKind, Behavior, BehaviorError, ClassInfo, Ctx, EventArg, EventDef, ObjectBase, ObjectView,
    SpawnError,
};
use simkit_net::{FieldKind, FieldSet, FieldValue, field};
use simkit_persist::{ArchiveError, RestoreReader, SaveWriter};
use simkit_physics::CONTENTS_SOLID;

/// Shader parm set to 1 while the static is toggled on.
const SHADERPARM_ACTIVE: usize = 5;

/// Fades the colour to the given RGB over the given seconds.
pub static EV_FADE: EventDef = EventDef::new("fadeTo", &[ArgKind::Vector, ArgKind::Float]);

static EVENTS: &[&EventDef] = &[&EV_FADE];

pub static STATIC_FIELDS: FieldSet = FieldSet {
    id: 1,
    name: "func_static",
    fields: &[
        field("origin_x", FieldKind::Float),
        field("origin_y", FieldKind::Float),
        field("origin_z", FieldKind::Float),
        field("color", FieldKind::Color),
        field("hidden", FieldKind::Bool),
    ],
};

pub fn class() -> ClassInfo {
    ClassInfo {
        name: "func_static",
        factory: || Box::new(StaticMesh::default()),
        events: EVENTS,
        field_set: Some(&STATIC_FIELDS),
    }
}

#[derive(Debug)]
pub struct StaticMesh {
    spawn_time_ms: u64,
    active: bool,
    fade_from: Vec4,
    fade_to: Vec4,
    fade_start_ms: u64,
    /// Zero when no fade is running.
    fade_end_ms: u64,
}

impl Default for StaticMesh {
    fn default() -> Self {
        Self {
            spawn_time_ms: 0,
            active: false,
            fade_from: Vec4::ONE,
            fade_to: Vec4::ONE,
            fade_start_ms: 0,
            fade_end_ms: 0,
        }
    }
}

impl StaticMesh {
    pub fn fade(&mut self, ctx: &mut Ctx<'_>, to: Vec4, seconds: f32) {
        self.fade_from = ctx.base().render.color();
        self.fade_to = to;
        self.fade_start_ms = ctx.time_ms();
        self.fade_end_ms = self.fade_start_ms + sec_to_ms(seconds);
        ctx.become_active(ActivationMask::THINK);
    }

    fn hide(ctx: &mut Ctx<'_>) {
        ctx.hide();
        ctx.set_contents(0);
    }

    fn show(ctx: &mut Ctx<'_>) {
        ctx.show();
        if ctx.args().get_bool("solid", true) {
            ctx.set_contents(CONTENTS_SOLID);
        }
    }

    fn set_color(ctx: &mut Ctx<'_>, color: Vec4) {
        ctx.base_mut().render.set_color(color);
        ctx.update_visuals();
    }
}

impl Behavior for StaticMesh {
    fn spawn(&mut self, ctx: &mut Ctx<'_>) -> Result<(), SpawnError> {
        let solid = ctx.args().get_bool("solid", true);
        let hidden = ctx.args().get_bool("hide", false);
        ctx.set_contents(if solid && !hidden { CONTENTS_SOLID } else { 0 });
        if hidden {
            ctx.hide();
        }

        self.spawn_time_ms = ctx.time_ms();
        self.active = false;
        if ctx.base().render.model.contains(".prt") {
            // Parametric particles should not pulse in step.
            let offset = ctx.random().random_int(32767) as f32;
            ctx.base_mut().render.set_parm(SHADERPARM_TIMEOFFSET, offset);
        }
        Ok(())
    }

    fn think(&mut self, ctx: &mut Ctx<'_>) -> Result<(), BehaviorError> {
        if self.fade_end_ms == 0 {
            ctx.become_inactive(ActivationMask::THINK);
            return Ok(());
        }
        let now = ctx.time_ms();
        let color = if now < self.fade_end_ms {
            let span = (self.fade_end_ms - self.fade_start_ms) as f32;
            let t = now.saturating_sub(self.fade_start_ms) as f32 / span;
            self.fade_from.lerp(self.fade_to, t)
        } else {
            self.fade_end_ms = 0;
            ctx.become_inactive(ActivationMask::THINK);
            self.fade_to
        };
        Self::set_color(ctx, color);
        Ok(())
    }

    fn activate(&mut self, ctx: &mut Ctx<'_>, _activator: Option<ObjectId>) -> Result<(), BehaviorError> {
        self.spawn_time_ms = ctx.time_ms();
        self.active = !self.active;

        if ctx.is_hidden() {
            Self::show(ctx);
        } else {
            Self::hide(ctx);
        }

        if !ctx.args().get_bool("noparmchange", false) {
            let active = self.active;
            let offset = -ms_to_sec(self.spawn_time_ms as i64);
            let render = &mut ctx.base_mut().render;
            render.set_parm(SHADERPARM_TIMEOFFSET, offset);
            render.set_parm(SHADERPARM_ACTIVE, if active { 1.0 } else { 0.0 });
            let mode = if render.parm(SHADERPARM_MODE) != 0.0 { 0.0 } else { 1.0 };
            render.set_parm(SHADERPARM_MODE, mode);
        }
        ctx.update_visuals();
        Ok(())
    }

    fn handle_event(
        &mut self,
        ctx: &mut Ctx<'_>,
        event: &'static EventDef,
        args: &[EventArg],
    ) -> Result<bool, BehaviorError> {
        if !event.is(&EV_FADE) {
            return Ok(false);
        }
        let rgb = args.first().and_then(EventArg::as_vector).unwrap_or(Vec3::ONE);
        let seconds = args.get(1).and_then(EventArg::as_float).unwrap_or(0.0);
        let alpha = ctx.base().render.color().w;
        self.fade(ctx, rgb.extend(alpha), seconds);
        Ok(true)
    }

    fn save(&self, w: &mut SaveWriter) {
        w.write_u64(self.spawn_time_ms);
        w.write_bool(self.active);
        w.write_vec4(self.fade_from);
        w.write_vec4(self.fade_to);
        w.write_u64(self.fade_start_ms);
        w.write_u64(self.fade_end_ms);
    }

    fn restore(&mut self, base: &ObjectBase, r: &mut RestoreReader) -> Result<(), ArchiveError> {
        self.spawn_time_ms = r.read_u64()?;
        self.active = r.read_bool()?;
        // Records without fade state restore as "not fading".
        let color = base.render.color();
        self.fade_from = r.read_vec4_or(color)?;
        self.fade_to = r.read_vec4_or(color)?;
        self.fade_start_ms = r.read_u64_or(0)?;
        self.fade_end_ms = r.read_u64_or(0)?;
        Ok(())
    }

    fn field_set(&self) -> Option<&'static FieldSet> {
        Some(&STATIC_FIELDS)
    }

    fn write_fields(&self, view: &ObjectView<'_>, out: &mut Vec<FieldValue>) {
        let origin = view.origin();
        out.extend([
            FieldValue::Float(origin.x),
            FieldValue::Float(origin.y),
            FieldValue::Float(origin.z),
            FieldValue::Color(view.base.render.color()),
            FieldValue::Bool(view.base.hidden),
        ]);
    }

    fn apply_fields(&mut self, ctx: &mut Ctx<'_>, values: &[FieldValue], changed: bool) -> Result<(), BehaviorError> {
        let [
            FieldValue::Float(x),
            FieldValue::Float(y),
            FieldValue::Float(z),
            FieldValue::Color(color),
            FieldValue::Bool(hidden),
        ] = *values
        else {
            return Err(BehaviorError::Failed("malformed func_static snapshot".into()));
        };
        ctx.set_origin(Vec3::new(x, y, z));
        ctx.base_mut().render.set_color(color);
        if hidden != ctx.is_hidden() {
            if hidden {
                Self::hide(ctx);
            } else {
                Self::show(ctx);
            }
        }
        if changed {
            ctx.update_visuals();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{spawn, world};
    use simkit_kernel::World;

    #[test]
    fn activation_toggles_visibility_and_mode() {
        let mut w = world();
        let id = spawn(&mut w, "func_static", &[]);
        let body = w.object(id).unwrap().body.unwrap();
        assert_eq!(w.physics().contents(body), CONTENTS_SOLID);

        w.activate(id, None).unwrap();
        let base = w.object(id).unwrap();
        assert!(base.hidden);
        assert_eq!(base.render.parm(SHADERPARM_MODE), 1.0);
        assert_eq!(base.render.parm(SHADERPARM_ACTIVE), 1.0);
        assert_eq!(w.physics().contents(body), 0);

        w.activate(id, None).unwrap();
        let base = w.object(id).unwrap();
        assert!(!base.hidden);
        assert_eq!(base.render.parm(SHADERPARM_MODE), 0.0);
        assert_eq!(w.physics().contents(body), CONTENTS_SOLID);
    }

    #[test]
    fn noparmchange_leaves_shader_parms() {
        let mut w = world();
        let id = spawn(&mut w, "func_static", &[("noparmchange", "1")]);
        w.activate(id, None).unwrap();
        assert_eq!(w.object(id).unwrap().render.parm(SHADERPARM_MODE), 0.0);
    }

    #[test]
    fn fade_reaches_target_and_stops_thinking() {
        let mut w = world();
        let id = spawn(&mut w, "func_static", &[]);
        let args = vec![EventArg::Vector(Vec3::ZERO), EventArg::Float(0.1)];
        w.post_event(id, &EV_FADE, 0, args).unwrap();
        w.run_frames(5);
        let mid = w.object(id).unwrap().render.color();
        assert!(mid.x > 0.0 && mid.x < 1.0, "{mid}");
        w.run_frames(10);
        assert_eq!(w.object(id).unwrap().render.color(), Vec4::new(0.0, 0.0, 0.0, 1.0));
        assert!(!w.mask_of(id).contains(ActivationMask::THINK));
    }

    #[test]
    fn snapshot_round_trip_drives_observer() {
        let mut authority = world();
        let id = spawn(&mut authority, "func_static", &[("origin", "1 2 3")]);
        authority.activate(id, None).unwrap();

        let mut observer = World::new(*authority.config(), crate::class_registry());
        observer.set_role(simkit_kernel::Role::Observer);
        let observed = spawn(&mut observer, "func_static", &[]);
        assert_eq!(observed, id);
        observer.take_visual_updates();

        let frame = authority.replication_frame();
        let update = simkit_net::Update {
            object: id,
            set_id: STATIC_FIELDS.id,
            values: frame[0].values.clone(),
            changed: true,
        };
        assert_eq!(observer.apply_updates(&[update]), 1);
        let base = observer.object(id).unwrap();
        assert!(base.hidden);
        assert_eq!(observer.physics().origin(base.body.unwrap()), Some(Vec3::new(1.0, 2.0, 3.0)));
    }
}
