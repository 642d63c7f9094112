//! The physics collaborator contract.

use glam::{Mat3, Quat, Vec3};
use simkit_common::ObjectId;
use simkit_persist::{ArchiveError, RestoreReader, SaveWriter};

use crate::bounds::Aabb;

pub const CONTENTS_SOLID: u32 = 1 << 0;
pub const CONTENTS_TRIGGER: u32 = 1 << 1;
pub const CONTENTS_BODY: u32 = 1 << 2;
pub const CONTENTS_CORPSE: u32 = 1 << 3;
pub const CONTENTS_MOVEABLE: u32 = 1 << 4;

pub const MASK_SOLID: u32 = CONTENTS_SOLID;
pub const MASK_SHOT: u32 = CONTENTS_SOLID | CONTENTS_BODY | CONTENTS_MOVEABLE;
pub const MASK_ALL: u32 = u32::MAX;

/// Handle to a body owned by the collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BodyId(pub u32);

/// What a new body looks like.
#[derive(Debug, Clone, PartialEq)]
pub struct BodyDesc {
    pub owner: Option<ObjectId>,
    pub origin: Vec3,
    pub axis: Mat3,
    /// Local bounds, relative to the origin.
    pub bounds: Aabb,
    /// Zero mass is immovable.
    pub mass: f32,
    pub contents: u32,
    pub clip_mask: u32,
    pub gravity: bool,
}

impl Default for BodyDesc {
    fn default() -> Self {
        Self {
            owner: None,
            origin: Vec3::ZERO,
            axis: Mat3::IDENTITY,
            bounds: Aabb::cube(8.0),
            mass: 0.0,
            contents: CONTENTS_SOLID,
            clip_mask: MASK_SOLID,
            gravity: false,
        }
    }
}

/// Everything needed to put a body back exactly as it was.
#[derive(Debug, Clone, PartialEq)]
pub struct BodyState {
    pub origin: Vec3,
    pub rotation: Quat,
    pub linear_velocity: Vec3,
    pub angular_velocity: Vec3,
    pub bounds: Aabb,
    pub mass: f32,
    pub contents: u32,
    pub clip_mask: u32,
    pub gravity: bool,
}

impl BodyState {
    pub fn save(&self, w: &mut SaveWriter) {
        w.write_vec3(self.origin);
        w.write_float(self.rotation.x);
        w.write_float(self.rotation.y);
        w.write_float(self.rotation.z);
        w.write_float(self.rotation.w);
        w.write_vec3(self.linear_velocity);
        w.write_vec3(self.angular_velocity);
        w.write_vec3(self.bounds.min);
        w.write_vec3(self.bounds.max);
        w.write_float(self.mass);
        w.write_u64(u64::from(self.contents));
        w.write_u64(u64::from(self.clip_mask));
        w.write_bool(self.gravity);
    }

    pub fn restore(r: &mut RestoreReader) -> Result<Self, ArchiveError> {
        let origin = r.read_vec3()?;
        let rotation = Quat::from_xyzw(r.read_float()?, r.read_float()?, r.read_float()?, r.read_float()?);
        Ok(Self {
            origin,
            rotation,
            linear_velocity: r.read_vec3()?,
            angular_velocity: r.read_vec3()?,
            bounds: Aabb::new(r.read_vec3()?, r.read_vec3()?),
            mass: r.read_float()?,
            contents: r.read_u32()?,
            clip_mask: r.read_u32()?,
            gravity: r.read_bool()?,
        })
    }
}

/// Result of a point trace.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Trace {
    /// 1.0 when nothing was hit.
    pub fraction: f32,
    pub end: Vec3,
    pub body: Option<BodyId>,
}

impl Trace {
    pub fn clear(&self) -> bool {
        self.fraction >= 1.0
    }
}

/// Narrow view of the rigid-body solver. Integration and contact response
/// live on the other side of this trait; behaviors only query state and
/// push forces through it.
pub trait PhysicsWorld {
    fn create_body(&mut self, desc: BodyDesc) -> BodyId;
    fn remove_body(&mut self, body: BodyId);
    fn has_body(&self, body: BodyId) -> bool;
    fn owner(&self, body: BodyId) -> Option<ObjectId>;

    fn origin(&self, body: BodyId) -> Option<Vec3>;
    fn set_origin(&mut self, body: BodyId, origin: Vec3);
    fn axis(&self, body: BodyId) -> Option<Mat3>;
    fn set_axis(&mut self, body: BodyId, axis: Mat3);
    fn linear_velocity(&self, body: BodyId) -> Option<Vec3>;
    fn set_linear_velocity(&mut self, body: BodyId, velocity: Vec3);
    fn angular_velocity(&self, body: BodyId) -> Option<Vec3>;
    fn set_angular_velocity(&mut self, body: BodyId, velocity: Vec3);
    fn mass(&self, body: BodyId) -> f32;
    fn gravity(&self) -> Vec3;
    fn uses_gravity(&self, body: BodyId) -> bool;
    fn set_uses_gravity(&mut self, body: BodyId, enabled: bool);

    fn contents(&self, body: BodyId) -> u32;
    fn set_contents(&mut self, body: BodyId, contents: u32);
    fn clip_mask(&self, body: BodyId) -> u32;
    fn set_clip_mask(&mut self, body: BodyId, mask: u32);
    /// World-space bounds.
    fn abs_bounds(&self, body: BodyId) -> Option<Aabb>;

    /// Accumulates a force applied at a world-space point until the next
    /// integration step.
    fn add_force(&mut self, body: BodyId, point: Vec3, force: Vec3);
    fn apply_impulse(&mut self, body: BodyId, point: Vec3, impulse: Vec3);

    /// Bodies whose bounds touch `bounds` and whose contents match `mask`.
    fn bodies_touching(&self, bounds: &Aabb, mask: u32) -> Vec<BodyId>;
    fn trace_point(&self, start: Vec3, end: Vec3, mask: u32, ignore: Option<BodyId>) -> Trace;

    /// Integrates one body for `dt` seconds. Returns whether it moved.
    fn run_body(&mut self, body: BodyId, dt: f32) -> bool;

    fn body_state(&self, body: BodyId) -> Option<BodyState>;
    fn set_body_state(&mut self, body: BodyId, state: &BodyState);
}
