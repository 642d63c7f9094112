use glam::Vec3;
use simkit_common::SimRandom;
use simkit_persist::{ArchiveError, RestoreReader, SaveWriter};

use crate::bounds::Aabb;
use crate::world::{BodyId, PhysicsWorld};

/// Contents mask a force field acts on.
pub const FORCE_FIELD_MASK: u32 = crate::world::CONTENTS_BODY
    | crate::world::CONTENTS_CORPSE
    | crate::world::CONTENTS_MOVEABLE
    | crate::world::CONTENTS_SOLID;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldShape {
    Uniform,
    Explosion,
    Implosion,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyMode {
    Velocity,
    Force,
    Impulse,
}

/// A volume that pushes every body it touches.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForceField {
    pub shape: FieldShape,
    pub apply: ApplyMode,
    /// Unit direction for uniform fields.
    pub dir: Vec3,
    pub magnitude: f32,
    pub random_torque: f32,
    pub player_only: bool,
    pub monster_only: bool,
}

impl Default for ForceField {
    fn default() -> Self {
        Self {
            shape: FieldShape::Uniform,
            apply: ApplyMode::Velocity,
            dir: Vec3::ZERO,
            magnitude: 0.0,
            random_torque: 0.0,
            player_only: false,
            monster_only: false,
        }
    }
}

impl ForceField {
    pub fn uniform(&mut self, force: Vec3) {
        self.shape = FieldShape::Uniform;
        self.magnitude = force.length();
        self.dir = force.normalize_or_zero();
    }

    pub fn explosion(&mut self, magnitude: f32) {
        self.shape = FieldShape::Explosion;
        self.magnitude = magnitude;
    }

    pub fn implosion(&mut self, magnitude: f32) {
        self.shape = FieldShape::Implosion;
        self.magnitude = magnitude;
    }

    /// Push for a body at `at` inside `volume`. Radial shapes fall off
    /// linearly from full strength at the center to zero at the corners.
    pub fn push_at(&self, volume: &Aabb, at: Vec3) -> Vec3 {
        if !volume.contains_point(at) {
            return Vec3::ZERO;
        }
        match self.shape {
            FieldShape::Uniform => self.dir * self.magnitude,
            FieldShape::Explosion | FieldShape::Implosion => {
                let center = volume.center();
                let out = at - center;
                let distance = out.length();
                let radius = volume.radius();
                if distance <= f32::EPSILON || radius <= f32::EPSILON {
                    return Vec3::ZERO;
                }
                let falloff = (1.0 - distance / radius).max(0.0);
                let dir = if self.shape == FieldShape::Explosion {
                    out / distance
                } else {
                    -out / distance
                };
                dir * self.magnitude * falloff
            }
        }
    }

    /// Applies the field to every accepted body touching `volume`. A body
    /// whose origin lies outside the volume is pushed as if it sat at the
    /// nearest point inside. Returns how many bodies were pushed.
    pub fn evaluate(
        &self,
        physics: &mut dyn PhysicsWorld,
        volume: &Aabb,
        ignore: Option<BodyId>,
        random: &mut SimRandom,
        accept: &dyn Fn(BodyId) -> bool,
    ) -> usize {
        let mut pushed = 0;
        for body in physics.bodies_touching(volume, FORCE_FIELD_MASK) {
            if Some(body) == ignore || !accept(body) {
                continue;
            }
            let Some(origin) = physics.origin(body) else {
                continue;
            };
            let push = self.push_at(volume, origin.clamp(volume.min, volume.max));
            if push == Vec3::ZERO {
                continue;
            }
            match self.apply {
                ApplyMode::Velocity => physics.set_linear_velocity(body, push),
                ApplyMode::Force => physics.add_force(body, origin, push),
                ApplyMode::Impulse => physics.apply_impulse(body, origin, push),
            }
            if self.random_torque != 0.0 {
                let axis = Vec3::new(random.crandom_float(), random.crandom_float(), random.crandom_float())
                    .normalize_or_zero();
                if axis != Vec3::ZERO {
                    // Equal and opposite forces at opposite arms: pure torque.
                    let arm = axis.any_orthonormal_vector();
                    let f = axis.cross(arm) * (self.random_torque * 0.5);
                    physics.add_force(body, origin + arm, f);
                    physics.add_force(body, origin - arm, -f);
                }
            }
            pushed += 1;
        }
        pushed
    }

    pub fn save(&self, w: &mut SaveWriter) {
        w.write_int(match self.shape {
            FieldShape::Uniform => 0,
            FieldShape::Explosion => 1,
            FieldShape::Implosion => 2,
        });
        w.write_int(match self.apply {
            ApplyMode::Velocity => 0,
            ApplyMode::Force => 1,
            ApplyMode::Impulse => 2,
        });
        w.write_vec3(self.dir);
        w.write_float(self.magnitude);
        w.write_float(self.random_torque);
        w.write_bool(self.player_only);
        w.write_bool(self.monster_only);
    }

    pub fn restore(r: &mut RestoreReader) -> Result<Self, ArchiveError> {
        let shape = match r.read_int()? {
            1 => FieldShape::Explosion,
            2 => FieldShape::Implosion,
            _ => FieldShape::Uniform,
        };
        let apply = match r.read_int()? {
            1 => ApplyMode::Force,
            2 => ApplyMode::Impulse,
            _ => ApplyMode::Velocity,
        };
        Ok(Self {
            shape,
            apply,
            dir: r.read_vec3()?,
            magnitude: r.read_float()?,
            random_torque: r.read_float()?,
            player_only: r.read_bool()?,
            monster_only: r.read_bool()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simple::SimplePhysics;
    use crate::world::{BodyDesc, CONTENTS_MOVEABLE};

    fn body_at(p: &mut SimplePhysics, at: Vec3) -> BodyId {
        p.create_body(BodyDesc {
            origin: at,
            bounds: Aabb::cube(1.0),
            mass: 1.0,
            contents: CONTENTS_MOVEABLE,
            ..BodyDesc::default()
        })
    }

    #[test]
    fn explosion_pushes_outward_and_falls_off() {
        let mut field = ForceField::default();
        field.explosion(500.0);
        let volume = Aabb::cube(100.0);
        let near = field.push_at(&volume, Vec3::new(10.0, 0.0, 0.0));
        let far = field.push_at(&volume, Vec3::new(80.0, 0.0, 0.0));
        assert!(near.x > 0.0 && far.x > 0.0);
        assert!(near.length() > far.length());
        assert_eq!(field.push_at(&volume, Vec3::new(150.0, 0.0, 0.0)), Vec3::ZERO);
        assert_eq!(field.push_at(&volume, Vec3::ZERO), Vec3::ZERO);
    }

    #[test]
    fn implosion_pulls_inward() {
        let mut field = ForceField::default();
        field.implosion(50.0);
        let push = field.push_at(&Aabb::cube(10.0), Vec3::new(0.0, 5.0, 0.0));
        assert!(push.y < 0.0);
    }

    #[test]
    fn evaluate_respects_volume_and_filter() {
        let mut p = SimplePhysics::new();
        let inside = body_at(&mut p, Vec3::new(20.0, 0.0, 0.0));
        let outside = body_at(&mut p, Vec3::new(500.0, 0.0, 0.0));
        let rejected = body_at(&mut p, Vec3::new(0.0, 20.0, 0.0));
        let mut field = ForceField::default();
        field.uniform(Vec3::new(0.0, 0.0, 30.0));
        let mut random = SimRandom::new(1);
        let n = field.evaluate(&mut p, &Aabb::cube(100.0), None, &mut random, &|b| b != rejected);
        assert_eq!(n, 1);
        assert_eq!(p.linear_velocity(inside), Some(Vec3::new(0.0, 0.0, 30.0)));
        assert_eq!(p.linear_velocity(outside), Some(Vec3::ZERO));
        assert_eq!(p.linear_velocity(rejected), Some(Vec3::ZERO));
    }

    #[test]
    fn overlapping_body_with_origin_outside_is_pushed() {
        let mut p = SimplePhysics::new();
        let edge = p.create_body(BodyDesc {
            origin: Vec3::new(105.0, 0.0, 0.0),
            bounds: Aabb::cube(10.0),
            mass: 1.0,
            contents: CONTENTS_MOVEABLE,
            ..BodyDesc::default()
        });
        let volume = Aabb::cube(100.0);
        let mut random = SimRandom::new(1);

        let mut field = ForceField::default();
        field.uniform(Vec3::new(0.0, 0.0, 30.0));
        assert_eq!(field.evaluate(&mut p, &volume, None, &mut random, &|_| true), 1);
        assert_eq!(p.linear_velocity(edge), Some(Vec3::new(0.0, 0.0, 30.0)));

        field.explosion(500.0);
        assert_eq!(field.evaluate(&mut p, &volume, None, &mut random, &|_| true), 1);
        assert!(p.linear_velocity(edge).unwrap().x > 0.0);
    }

    #[test]
    fn random_torque_is_pure_rotation() {
        let mut p = SimplePhysics::new();
        let body = body_at(&mut p, Vec3::new(5.0, 0.0, 0.0));
        let mut field = ForceField::default();
        field.explosion(10.0);
        field.apply = ApplyMode::Impulse;
        field.random_torque = 8.0;
        let mut random = SimRandom::new(9);
        field.evaluate(&mut p, &Aabb::cube(50.0), None, &mut random, &|_| true);
        assert!(p.pending_force(body).length() < 1e-4);
        assert!((p.pending_torque(body).length() - 8.0).abs() < 1e-3);
    }
}
