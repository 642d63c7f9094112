//! `func_spring`: a spring between two objects, or an object and the world.

use glam::Vec3;
use simkit_common::ObjectId;
use simkit_kernel::{Behavior, BehaviorError, ClassInfo, Ctx, ObjectBase, SpawnError};
use simkit_persist::{ArchiveError, RestoreReader, SaveWriter};
use simkit_physics::{Spring, SpringEnd};

pub fn class() -> ClassInfo {
    ClassInfo {
        name: "func_spring",
        factory: || Box::new(SpringLink::default()),
        events: &[],
        field_set: None,
    }
}

#[derive(Debug)]
pub struct SpringLink {
    /// `None` is the fixed world.
    ent1: Option<ObjectId>,
    ent2: Option<ObjectId>,
    id1: i32,
    id2: i32,
    p1: Vec3,
    p2: Vec3,
    spring: Spring,
}

impl Default for SpringLink {
    fn default() -> Self {
        Self {
            ent1: None,
            ent2: None,
            id1: 0,
            id2: 0,
            p1: Vec3::ZERO,
            p2: Vec3::ZERO,
            spring: Spring::new(100.0, 0.0, 10.0, 0.0),
        }
    }
}

impl SpringLink {
    fn link(ctx: &Ctx<'_>, key: &'static str) -> Result<Option<ObjectId>, SpawnError> {
        let name = ctx.args().get_string(key, "");
        if name.is_empty() {
            return Ok(None);
        }
        ctx.find(name)
            .map(Some)
            .ok_or_else(|| SpawnError::missing_object(ctx.base(), key, name))
    }

    /// `None` when a linked object has gone away.
    fn end(ctx: &Ctx<'_>, ent: Option<ObjectId>, point: Vec3) -> Option<SpringEnd> {
        match ent {
            None => Some(SpringEnd::world(point)),
            Some(id) => {
                let body = ctx.object(id)?.body;
                Some(SpringEnd {
                    body,
                    local_point: point,
                })
            }
        }
    }
}

impl Behavior for SpringLink {
    fn spawn(&mut self, ctx: &mut Ctx<'_>) -> Result<(), SpawnError> {
        let args = ctx.args();
        self.id1 = args.get_int("id1", 0);
        self.id2 = args.get_int("id2", 0);
        self.p1 = args.get_vector("point1", Vec3::ZERO);
        self.p2 = args.get_vector("point2", Vec3::ZERO);
        let k = args.get_float("constant", 100.0);
        let damping = args.get_float("damping", 10.0);
        let rest_length = args.get_float("restlength", 0.0);
        self.spring = Spring::new(k, 0.0, damping, rest_length);
        Ok(())
    }

    fn post_spawn(&mut self, ctx: &mut Ctx<'_>) -> Result<(), SpawnError> {
        self.ent1 = Self::link(ctx, "ent1")?;
        self.ent2 = Self::link(ctx, "ent2")?;
        if self.ent1.is_none() && self.ent2.is_none() {
            tracing::warn!(object = %ctx.id(), "spring has no linked objects");
        }
        ctx.become_active(simkit_kernel::ActivationMask::THINK);
        Ok(())
    }

    fn think(&mut self, ctx: &mut Ctx<'_>) -> Result<(), BehaviorError> {
        let ends = Self::end(ctx, self.ent1, self.p1).zip(Self::end(ctx, self.ent2, self.p2));
        let Some((end1, end2)) = ends else {
            tracing::warn!(object = %ctx.id(), "spring partner is gone; spring stops");
            ctx.become_inactive(simkit_kernel::ActivationMask::THINK);
            return Ok(());
        };
        self.spring.evaluate(ctx.physics(), end1, end2);
        Ok(())
    }

    fn save(&self, w: &mut SaveWriter) {
        w.write_object(self.ent1);
        w.write_object(self.ent2);
        w.write_int(i64::from(self.id1));
        w.write_int(i64::from(self.id2));
        w.write_vec3(self.p1);
        w.write_vec3(self.p2);
        self.spring.save(w);
    }

    fn restore(&mut self, _base: &ObjectBase, r: &mut RestoreReader) -> Result<(), ArchiveError> {
        self.ent1 = r.read_object()?;
        self.ent2 = r.read_object()?;
        self.id1 = r.read_i32()?;
        self.id2 = r.read_i32()?;
        self.p1 = r.read_vec3()?;
        self.p2 = r.read_vec3()?;
        self.spring = Spring::restore(r)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{dump, spawn_all, world};
    use simkit_common::SpawnArgs;

    #[test]
    fn stretched_spring_pulls_its_ends_together() {
        let mut w = world();
        let ids = spawn_all(
            &mut w,
            &[
                ("func_moveable", &[("name", "a"), ("origin", "0 0 0"), ("mass", "1")]),
                ("func_moveable", &[("name", "b"), ("origin", "100 0 0"), ("mass", "1")]),
                ("func_spring", &[("ent1", "a"), ("ent2", "b"), ("constant", "1"), ("restlength", "10")]),
            ],
        );
        let start = w.physics().origin(w.object(ids[0]).unwrap().body.unwrap()).unwrap();
        w.run_frames(3);
        let body_a = w.object(ids[0]).unwrap().body.unwrap();
        let body_b = w.object(ids[1]).unwrap().body.unwrap();
        let a = w.physics().origin(body_a).unwrap();
        let b = w.physics().origin(body_b).unwrap();
        assert!(a.x > start.x, "a moved toward b: {a}");
        assert!(b.x < 100.0, "b moved toward a: {b}");
    }

    #[test]
    fn missing_partner_is_fatal() {
        let mut w = world();
        let id = w
            .spawn("func_spring", SpawnArgs::from_pairs([("ent1", "nobody")]))
            .unwrap();
        w.run_frame();
        assert!(w.object(id).is_none());
    }

    #[test]
    fn empty_name_anchors_to_world() {
        let mut w = world();
        let ids = spawn_all(
            &mut w,
            &[
                ("func_moveable", &[("name", "a"), ("origin", "0 0 50"), ("mass", "1")]),
                ("func_spring", &[("ent1", "a")]),
            ],
        );
        assert!(w.mask_of(ids[1]).contains(simkit_kernel::ActivationMask::THINK));
        assert!(dump(&w, ids[1]).contains("ent2: None"));
    }
}
