use glam::{Mat3, Quat, Vec3};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifier for a simulation object.
///
/// Ids are handed out as a monotonically increasing serial, so ordering by id
/// is creation order. An id is never reused within a world, which is what lets
/// a stale reference resolve to "absent" instead of to a newer object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(pub u64);

impl ObjectId {
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Spatial transform: position, rotation, scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn from_origin_axis(origin: Vec3, axis: Mat3) -> Self {
        Self {
            position: origin,
            rotation: Quat::from_mat3(&axis),
            scale: Vec3::ONE,
        }
    }

    pub fn axis(&self) -> Mat3 {
        Mat3::from_quat(self.rotation)
    }
}

/// Euler angles in degrees (pitch, yaw, roll) to a rotation matrix.
pub fn angles_to_axis(angles: Vec3) -> Mat3 {
    let pitch = angles.x.to_radians();
    let yaw = angles.y.to_radians();
    let roll = angles.z.to_radians();
    Mat3::from_rotation_z(yaw) * Mat3::from_rotation_y(pitch) * Mat3::from_rotation_x(roll)
}

/// Inverse of [`angles_to_axis`].
pub fn axis_to_angles(axis: Mat3) -> Vec3 {
    let (yaw, pitch, roll) = Quat::from_mat3(&axis).to_euler(glam::EulerRot::ZYX);
    Vec3::new(pitch.to_degrees(), yaw.to_degrees(), roll.to_degrees())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_ids_order_by_serial() {
        let a = ObjectId(1);
        let b = ObjectId(2);
        assert!(a < b);
        assert_eq!(a.to_string(), "#1");
    }

    #[test]
    fn transform_default_is_identity() {
        let t = Transform::default();
        assert_eq!(t.position, Vec3::ZERO);
        assert_eq!(t.rotation, Quat::IDENTITY);
        assert_eq!(t.scale, Vec3::ONE);
    }

    #[test]
    fn angles_axis_roundtrip() {
        let angles = Vec3::new(10.0, 45.0, -20.0);
        let back = axis_to_angles(angles_to_axis(angles));
        assert!((back - angles).abs().max_element() < 1e-2, "{back:?}");
    }
}
