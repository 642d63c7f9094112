//! In-memory reference solver: explicit Euler, no contacts.

use glam::{Mat3, Quat, Vec3};
use std::collections::BTreeMap;

use simkit_common::ObjectId;

use crate::bounds::Aabb;
use crate::world::{BodyDesc, BodyId, BodyState, PhysicsWorld, Trace};

pub const DEFAULT_GRAVITY: Vec3 = Vec3::new(0.0, 0.0, -1066.0);

#[derive(Debug, Clone)]
struct Body {
    owner: Option<ObjectId>,
    state: BodyState,
    force: Vec3,
    torque: Vec3,
}

/// A solver good enough for tests and headless runs.
#[derive(Debug, Clone)]
pub struct SimplePhysics {
    bodies: BTreeMap<BodyId, Body>,
    next_id: u32,
    gravity: Vec3,
}

impl Default for SimplePhysics {
    fn default() -> Self {
        Self::new()
    }
}

impl SimplePhysics {
    pub fn new() -> Self {
        Self::with_gravity(DEFAULT_GRAVITY)
    }

    pub fn with_gravity(gravity: Vec3) -> Self {
        Self {
            bodies: BTreeMap::new(),
            next_id: 1,
            gravity,
        }
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// Force accumulated since the last step, for inspection.
    pub fn pending_force(&self, body: BodyId) -> Vec3 {
        self.bodies.get(&body).map(|b| b.force).unwrap_or(Vec3::ZERO)
    }

    pub fn pending_torque(&self, body: BodyId) -> Vec3 {
        self.bodies.get(&body).map(|b| b.torque).unwrap_or(Vec3::ZERO)
    }

    fn abs(body: &Body) -> Aabb {
        body.state.bounds.translate(body.state.origin)
    }
}

impl PhysicsWorld for SimplePhysics {
    fn create_body(&mut self, desc: BodyDesc) -> BodyId {
        let id = BodyId(self.next_id);
        self.next_id += 1;
        self.bodies.insert(
            id,
            Body {
                owner: desc.owner,
                state: BodyState {
                    origin: desc.origin,
                    rotation: Quat::from_mat3(&desc.axis),
                    linear_velocity: Vec3::ZERO,
                    angular_velocity: Vec3::ZERO,
                    bounds: desc.bounds,
                    mass: desc.mass.max(0.0),
                    contents: desc.contents,
                    clip_mask: desc.clip_mask,
                    gravity: desc.gravity,
                },
                force: Vec3::ZERO,
                torque: Vec3::ZERO,
            },
        );
        id
    }

    fn remove_body(&mut self, body: BodyId) {
        self.bodies.remove(&body);
    }

    fn has_body(&self, body: BodyId) -> bool {
        self.bodies.contains_key(&body)
    }

    fn owner(&self, body: BodyId) -> Option<ObjectId> {
        self.bodies.get(&body).and_then(|b| b.owner)
    }

    fn origin(&self, body: BodyId) -> Option<Vec3> {
        self.bodies.get(&body).map(|b| b.state.origin)
    }

    fn set_origin(&mut self, body: BodyId, origin: Vec3) {
        if let Some(b) = self.bodies.get_mut(&body) {
            b.state.origin = origin;
        }
    }

    fn axis(&self, body: BodyId) -> Option<Mat3> {
        self.bodies.get(&body).map(|b| Mat3::from_quat(b.state.rotation))
    }

    fn set_axis(&mut self, body: BodyId, axis: Mat3) {
        if let Some(b) = self.bodies.get_mut(&body) {
            b.state.rotation = Quat::from_mat3(&axis).normalize();
        }
    }

    fn linear_velocity(&self, body: BodyId) -> Option<Vec3> {
        self.bodies.get(&body).map(|b| b.state.linear_velocity)
    }

    fn set_linear_velocity(&mut self, body: BodyId, velocity: Vec3) {
        if let Some(b) = self.bodies.get_mut(&body) {
            b.state.linear_velocity = velocity;
        }
    }

    fn angular_velocity(&self, body: BodyId) -> Option<Vec3> {
        self.bodies.get(&body).map(|b| b.state.angular_velocity)
    }

    fn set_angular_velocity(&mut self, body: BodyId, velocity: Vec3) {
        if let Some(b) = self.bodies.get_mut(&body) {
            b.state.angular_velocity = velocity;
        }
    }

    fn mass(&self, body: BodyId) -> f32 {
        self.bodies.get(&body).map(|b| b.state.mass).unwrap_or(0.0)
    }

    fn gravity(&self) -> Vec3 {
        self.gravity
    }

    fn uses_gravity(&self, body: BodyId) -> bool {
        self.bodies.get(&body).is_some_and(|b| b.state.gravity)
    }

    fn set_uses_gravity(&mut self, body: BodyId, enabled: bool) {
        if let Some(b) = self.bodies.get_mut(&body) {
            b.state.gravity = enabled;
        }
    }

    fn contents(&self, body: BodyId) -> u32 {
        self.bodies.get(&body).map(|b| b.state.contents).unwrap_or(0)
    }

    fn set_contents(&mut self, body: BodyId, contents: u32) {
        if let Some(b) = self.bodies.get_mut(&body) {
            b.state.contents = contents;
        }
    }

    fn clip_mask(&self, body: BodyId) -> u32 {
        self.bodies.get(&body).map(|b| b.state.clip_mask).unwrap_or(0)
    }

    fn set_clip_mask(&mut self, body: BodyId, mask: u32) {
        if let Some(b) = self.bodies.get_mut(&body) {
            b.state.clip_mask = mask;
        }
    }

    fn abs_bounds(&self, body: BodyId) -> Option<Aabb> {
        self.bodies.get(&body).map(Self::abs)
    }

    fn add_force(&mut self, body: BodyId, point: Vec3, force: Vec3) {
        if let Some(b) = self.bodies.get_mut(&body) {
            if b.state.mass <= 0.0 {
                return;
            }
            b.force += force;
            b.torque += (point - b.state.origin).cross(force);
        }
    }

    fn apply_impulse(&mut self, body: BodyId, point: Vec3, impulse: Vec3) {
        if let Some(b) = self.bodies.get_mut(&body) {
            if b.state.mass <= 0.0 {
                return;
            }
            let inv_mass = 1.0 / b.state.mass;
            b.state.linear_velocity += impulse * inv_mass;
            b.state.angular_velocity += (point - b.state.origin).cross(impulse) * inv_mass;
        }
    }

    fn bodies_touching(&self, bounds: &Aabb, mask: u32) -> Vec<BodyId> {
        self.bodies
            .iter()
            .filter(|(_, b)| b.state.contents & mask != 0 && Self::abs(b).intersects(bounds))
            .map(|(id, _)| *id)
            .collect()
    }

    fn trace_point(&self, start: Vec3, end: Vec3, mask: u32, ignore: Option<BodyId>) -> Trace {
        let mut best = Trace {
            fraction: 1.0,
            end,
            body: None,
        };
        for (id, b) in &self.bodies {
            if Some(*id) == ignore || b.state.contents & mask == 0 {
                continue;
            }
            if let Some(f) = Self::abs(b).ray_fraction(start, end) {
                if f < best.fraction || (best.body.is_none() && f <= best.fraction) {
                    best = Trace {
                        fraction: f,
                        end: start + (end - start) * f,
                        body: Some(*id),
                    };
                }
            }
        }
        best
    }

    fn run_body(&mut self, body: BodyId, dt: f32) -> bool {
        let gravity = self.gravity;
        let Some(b) = self.bodies.get_mut(&body) else {
            return false;
        };
        let force = std::mem::take(&mut b.force);
        let torque = std::mem::take(&mut b.torque);
        if b.state.mass <= 0.0 {
            return false;
        }
        let inv_mass = 1.0 / b.state.mass;
        let mut accel = force * inv_mass;
        if b.state.gravity {
            accel += gravity;
        }
        b.state.linear_velocity += accel * dt;
        b.state.angular_velocity += torque * inv_mass * dt;

        let moved = b.state.linear_velocity != Vec3::ZERO || b.state.angular_velocity != Vec3::ZERO;
        b.state.origin += b.state.linear_velocity * dt;
        let spin = b.state.angular_velocity * dt;
        if spin != Vec3::ZERO {
            let turn = Quat::from_scaled_axis(spin);
            b.state.rotation = (turn * b.state.rotation).normalize();
        }
        moved
    }

    fn body_state(&self, body: BodyId) -> Option<BodyState> {
        self.bodies.get(&body).map(|b| b.state.clone())
    }

    fn set_body_state(&mut self, body: BodyId, state: &BodyState) {
        if let Some(b) = self.bodies.get_mut(&body) {
            b.state = state.clone();
            b.force = Vec3::ZERO;
            b.torque = Vec3::ZERO;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::{CONTENTS_SOLID, MASK_ALL};

    fn dynamic(origin: Vec3) -> BodyDesc {
        BodyDesc {
            origin,
            mass: 2.0,
            ..BodyDesc::default()
        }
    }

    #[test]
    fn resting_body_does_not_drift() {
        let mut p = SimplePhysics::new();
        let id = p.create_body(dynamic(Vec3::new(1.0, 2.0, 3.0)));
        for _ in 0..10 {
            assert!(!p.run_body(id, 0.016));
        }
        assert_eq!(p.origin(id), Some(Vec3::new(1.0, 2.0, 3.0)));
    }

    #[test]
    fn force_accelerates_for_one_step() {
        let mut p = SimplePhysics::with_gravity(Vec3::ZERO);
        let id = p.create_body(dynamic(Vec3::ZERO));
        p.add_force(id, Vec3::ZERO, Vec3::new(20.0, 0.0, 0.0));
        assert!(p.run_body(id, 0.5));
        assert_eq!(p.linear_velocity(id), Some(Vec3::new(5.0, 0.0, 0.0)));
        // Accumulator is cleared; velocity carries on.
        p.run_body(id, 0.5);
        assert_eq!(p.linear_velocity(id), Some(Vec3::new(5.0, 0.0, 0.0)));
    }

    #[test]
    fn static_bodies_ignore_forces() {
        let mut p = SimplePhysics::new();
        let id = p.create_body(BodyDesc::default());
        p.add_force(id, Vec3::ZERO, Vec3::X * 100.0);
        p.apply_impulse(id, Vec3::ZERO, Vec3::X * 100.0);
        assert!(!p.run_body(id, 1.0));
        assert_eq!(p.linear_velocity(id), Some(Vec3::ZERO));
    }

    #[test]
    fn trace_hits_nearest() {
        let mut p = SimplePhysics::new();
        let far = p.create_body(BodyDesc {
            origin: Vec3::new(100.0, 0.0, 0.0),
            ..BodyDesc::default()
        });
        let near = p.create_body(BodyDesc {
            origin: Vec3::new(50.0, 0.0, 0.0),
            ..BodyDesc::default()
        });
        let t = p.trace_point(Vec3::ZERO, Vec3::new(200.0, 0.0, 0.0), CONTENTS_SOLID, None);
        assert_eq!(t.body, Some(near));
        let t = p.trace_point(Vec3::ZERO, Vec3::new(200.0, 0.0, 0.0), CONTENTS_SOLID, Some(near));
        assert_eq!(t.body, Some(far));
        assert!(p.trace_point(Vec3::ZERO, Vec3::Y * 200.0, MASK_ALL, None).clear());
    }

    #[test]
    fn state_roundtrip_through_setter() {
        let mut p = SimplePhysics::new();
        let id = p.create_body(dynamic(Vec3::ZERO));
        p.set_linear_velocity(id, Vec3::Z);
        let state = p.body_state(id).unwrap();
        let other = p.create_body(BodyDesc::default());
        p.set_body_state(other, &state);
        assert_eq!(p.body_state(other).unwrap(), state);
    }
}
