//! `func_splat`: an emitter that, a moment after each activation, leaves
//! decals under itself and overlays on its targets.

use simkit_common::ObjectId;
use simkit_kernel::{
    Behavior, BehaviorError, ClassInfo, Ctx, EventArg, EventDef, ObjectBase, ObjectView, SpawnError,
};
use simkit_net::{FieldSet, FieldValue};
use simkit_persist::{ArchiveError, RestoreReader, SaveWriter};

use crate::emitter::{EMITTER_FIELDS, Emitter};

pub static EV_SPLAT: EventDef = EventDef::new("<Splat>", &[]);

static EVENTS: &[&EventDef] = &[&EV_SPLAT];

pub fn class() -> ClassInfo {
    ClassInfo {
        name: "func_splat",
        factory: || Box::new(Splat::default()),
        events: EVENTS,
        field_set: Some(&EMITTER_FIELDS),
    }
}

/// A material projected by the last splat.
#[derive(Debug, Clone, PartialEq)]
pub struct Decal {
    pub material: String,
    pub size: f32,
    pub distance: f32,
    pub angle: f32,
}

/// An overlay projected onto a target by the last splat.
#[derive(Debug, Clone, PartialEq)]
pub struct Overlay {
    pub target: ObjectId,
    pub material: String,
    pub size: f32,
}

#[derive(Debug, Default)]
pub struct Splat {
    emitter: Emitter,
    splats: u32,
    decals: Vec<Decal>,
    overlays: Vec<Overlay>,
}

impl Splat {
    fn splat(&mut self, ctx: &mut Ctx<'_>) {
        let args = ctx.args().clone();
        self.splats += 1;

        self.decals.clear();
        for _ in 0..args.get_int("splatCount", 1) {
            let Some(material) = args.random_prefix("mtr_splat", ctx.random()) else {
                continue;
            };
            self.decals.push(Decal {
                material: material.to_string(),
                size: args.get_float("splatSize", 128.0),
                distance: args.get_float("splatDistance", 128.0),
                angle: args.get_float("splatAngle", 0.0),
            });
        }

        self.overlays.clear();
        let size = args.get_float("overlaySize", 16.0);
        let targets = ctx.base().targets.clone();
        for _ in 0..args.get_int("overlayCount", 0) {
            let Some(material) = args.random_prefix("mtr_overlay", ctx.random()) else {
                continue;
            };
            for &target in targets.iter().filter(|t| ctx.object(**t).is_some()) {
                self.overlays.push(Overlay {
                    target,
                    material: material.to_string(),
                    size,
                });
            }
        }
        tracing::debug!(
            object = %ctx.id(),
            decals = self.decals.len(),
            overlays = self.overlays.len(),
            "splat"
        );
        ctx.update_visuals();
    }
}

impl Behavior for Splat {
    fn spawn(&mut self, ctx: &mut Ctx<'_>) -> Result<(), SpawnError> {
        self.emitter.spawn(ctx)
    }

    fn activate(&mut self, ctx: &mut Ctx<'_>, activator: Option<ObjectId>) -> Result<(), BehaviorError> {
        self.emitter.activate(ctx, activator)?;
        let delay = ctx.args().get_float("splatDelay", 0.25);
        ctx.post_sec(&EV_SPLAT, delay, vec![])?;
        Ok(())
    }

    fn handle_event(
        &mut self,
        ctx: &mut Ctx<'_>,
        event: &'static EventDef,
        _args: &[EventArg],
    ) -> Result<bool, BehaviorError> {
        if !event.is(&EV_SPLAT) {
            return Ok(false);
        }
        self.splat(ctx);
        Ok(true)
    }

    fn save(&self, w: &mut SaveWriter) {
        self.emitter.save(w);
        w.write_u64(u64::from(self.splats));
        w.write_len(self.decals.len());
        for decal in &self.decals {
            w.write_string(&decal.material);
            w.write_float(decal.size);
            w.write_float(decal.distance);
            w.write_float(decal.angle);
        }
        w.write_len(self.overlays.len());
        for overlay in &self.overlays {
            w.write_object(Some(overlay.target));
            w.write_string(&overlay.material);
            w.write_float(overlay.size);
        }
    }

    fn restore(&mut self, base: &ObjectBase, r: &mut RestoreReader) -> Result<(), ArchiveError> {
        self.emitter.restore(base, r)?;
        self.splats = r.read_u32()?;
        let count = r.read_len()?;
        let mut decals = Vec::with_capacity(count);
        for _ in 0..count {
            decals.push(Decal {
                material: r.read_string()?,
                size: r.read_float()?,
                distance: r.read_float()?,
                angle: r.read_float()?,
            });
        }
        self.decals = decals;
        let count = r.read_len()?;
        let mut overlays = Vec::with_capacity(count);
        for _ in 0..count {
            let index = r.position();
            let target = r.read_object()?.ok_or(ArchiveError::OutOfRange { index })?;
            overlays.push(Overlay {
                target,
                material: r.read_string()?,
                size: r.read_float()?,
            });
        }
        self.overlays = overlays;
        Ok(())
    }

    fn relink(&mut self, live: &dyn Fn(ObjectId) -> bool) {
        self.overlays.retain(|o| live(o.target));
    }

    fn field_set(&self) -> Option<&'static FieldSet> {
        self.emitter.field_set()
    }

    fn write_fields(&self, view: &ObjectView<'_>, out: &mut Vec<FieldValue>) {
        self.emitter.write_fields(view, out);
    }

    fn apply_fields(&mut self, ctx: &mut Ctx<'_>, values: &[FieldValue], changed: bool) -> Result<(), BehaviorError> {
        self.emitter.apply_fields(ctx, values, changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{dump, spawn_all, world};
    use simkit_common::render_state::SHADERPARM_PARTICLE_STOPTIME;
    use simkit_kernel::World;

    fn scene() -> (World, Vec<ObjectId>) {
        let mut w = world();
        let ids = spawn_all(
            &mut w,
            &[
                (
                    "func_splat",
                    &[
                        ("start_off", "1"),
                        ("mtr_splat1", "blood_a"),
                        ("mtr_splat2", "blood_b"),
                        ("splatCount", "3"),
                        ("splatSize", "64"),
                        ("mtr_overlay", "stain"),
                        ("overlayCount", "1"),
                        ("target", "wall"),
                        ("target1", "door"),
                    ],
                ),
                ("func_static", &[("name", "wall")]),
                ("func_static", &[("name", "door")]),
            ],
        );
        (w, ids)
    }

    #[test]
    fn activation_starts_the_emitter_and_splats_later() {
        let (mut w, ids) = scene();
        let splat = ids[0];
        w.activate(splat, None).unwrap();
        assert_eq!(w.object(splat).unwrap().render.parm(SHADERPARM_PARTICLE_STOPTIME), 0.0);
        assert!(dump(&w, splat).contains("hidden: false"));
        assert!(dump(&w, splat).contains("splats: 0"));

        w.run_frames(24);
        assert!(dump(&w, splat).contains("splats: 0"));
        w.run_frames(2);
        let state = dump(&w, splat);
        assert!(state.contains("splats: 1"), "{state}");
        assert_eq!(state.matches("Decal {").count(), 3, "{state}");
        assert!(state.contains("size: 64.0"));
        assert_eq!(state.matches("material: \"stain\"").count(), 2, "{state}");
        assert!(state.contains(&format!("target: {:?}", ids[1])));
        assert!(state.contains(&format!("target: {:?}", ids[2])));
    }

    #[test]
    fn no_materials_means_no_decals() {
        let mut w = world();
        let ids = spawn_all(&mut w, &[("func_splat", &[("splatDelay", "0")])]);
        w.activate(ids[0], None).unwrap();
        w.run_frames(2);
        let state = dump(&w, ids[0]);
        assert!(state.contains("splats: 1"));
        assert!(state.contains("decals: []"));
        assert!(state.contains("overlays: []"));
    }

    #[test]
    fn splat_state_and_pending_splat_survive_restore() {
        let (mut w, ids) = scene();
        let splat = ids[0];
        w.activate(splat, None).unwrap();
        w.run_frames(30);
        w.activate(splat, None).unwrap();
        w.run_frames(5);
        assert!(w.has_pending(splat, &EV_SPLAT));

        let mut restored = World::restore(&w.save().unwrap(), crate::class_registry()).unwrap();
        assert_eq!(dump(&restored, splat), dump(&w, splat));
        assert!(restored.has_pending(splat, &EV_SPLAT));

        w.run_frames(30);
        restored.run_frames(30);
        assert_eq!(dump(&restored, splat), dump(&w, splat));
        assert!(dump(&restored, splat).contains("splats: 2"));
    }

    #[test]
    fn removed_target_drops_its_overlay_on_restore() {
        let (mut w, ids) = scene();
        w.activate(ids[0], None).unwrap();
        w.run_frames(30);
        w.remove(ids[2]);
        let restored = World::restore(&w.save().unwrap(), crate::class_registry()).unwrap();
        let state = dump(&restored, ids[0]);
        assert_eq!(state.matches("material: \"stain\"").count(), 1, "{state}");
    }
}
