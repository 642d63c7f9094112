use glam::Vec3;
use simkit_persist::{ArchiveError, RestoreReader, SaveWriter};

use crate::world::{BodyId, PhysicsWorld};

/// Spring constants plus the extension seen at the last evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Spring {
    pub k_stretch: f32,
    pub k_compress: f32,
    pub damping: f32,
    pub rest_length: f32,
    extension: f32,
}

/// One end of a spring: a body (or the fixed world) and a local attachment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpringEnd {
    pub body: Option<BodyId>,
    pub local_point: Vec3,
}

impl SpringEnd {
    pub fn world(point: Vec3) -> Self {
        Self {
            body: None,
            local_point: point,
        }
    }

    /// World position and velocity of the attachment point.
    fn kinematics(&self, physics: &dyn PhysicsWorld) -> (Vec3, Vec3) {
        let Some(body) = self.body else {
            return (self.local_point, Vec3::ZERO);
        };
        let origin = physics.origin(body).unwrap_or(Vec3::ZERO);
        let axis = physics.axis(body).unwrap_or(glam::Mat3::IDENTITY);
        let arm = axis * self.local_point;
        let linear = physics.linear_velocity(body).unwrap_or(Vec3::ZERO);
        let angular = physics.angular_velocity(body).unwrap_or(Vec3::ZERO);
        (origin + arm, linear + angular.cross(arm))
    }
}

impl Spring {
    pub fn new(k_stretch: f32, k_compress: f32, damping: f32, rest_length: f32) -> Self {
        Self {
            k_stretch,
            k_compress,
            damping,
            rest_length,
            extension: 0.0,
        }
    }

    /// Signed length beyond rest at the last evaluation.
    pub fn extension(&self) -> f32 {
        self.extension
    }

    /// Force on the first end; the second end receives the negation.
    pub fn force(&mut self, p1: Vec3, v1: Vec3, p2: Vec3, v2: Vec3) -> Vec3 {
        let delta = p2 - p1;
        let length = delta.length();
        self.extension = length - self.rest_length;
        if length <= f32::EPSILON {
            return Vec3::ZERO;
        }
        let dir = delta / length;
        let damping_force = self.damping * (v2 - v1).dot(dir);
        if length > self.rest_length {
            if self.k_stretch > 0.0 {
                let stretch = length - self.rest_length;
                return (stretch * stretch * self.k_stretch + damping_force) * dir;
            }
        } else if self.k_compress > 0.0 {
            let compress = self.rest_length - length;
            return -(compress * compress * self.k_compress - damping_force) * dir;
        }
        Vec3::ZERO
    }

    /// Evaluates and pushes the force into both bodies.
    pub fn evaluate(&mut self, physics: &mut dyn PhysicsWorld, end1: SpringEnd, end2: SpringEnd) -> Vec3 {
        let (p1, v1) = end1.kinematics(physics);
        let (p2, v2) = end2.kinematics(physics);
        let force = self.force(p1, v1, p2, v2);
        if force != Vec3::ZERO {
            if let Some(b) = end1.body {
                physics.add_force(b, p1, force);
            }
            if let Some(b) = end2.body {
                physics.add_force(b, p2, -force);
            }
        }
        force
    }

    pub fn save(&self, w: &mut SaveWriter) {
        w.write_float(self.k_stretch);
        w.write_float(self.k_compress);
        w.write_float(self.damping);
        w.write_float(self.rest_length);
        w.write_float(self.extension);
    }

    pub fn restore(r: &mut RestoreReader) -> Result<Self, ArchiveError> {
        Ok(Self {
            k_stretch: r.read_float()?,
            k_compress: r.read_float()?,
            damping: r.read_float()?,
            rest_length: r.read_float()?,
            extension: r.read_float()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stretched_spring_pulls_together() {
        let mut s = Spring::new(100.0, 0.0, 0.0, 1.0);
        let f = s.force(Vec3::ZERO, Vec3::ZERO, Vec3::new(3.0, 0.0, 0.0), Vec3::ZERO);
        assert_eq!(f, Vec3::new(400.0, 0.0, 0.0));
        assert_eq!(s.extension(), 2.0);
    }

    #[test]
    fn compression_without_constant_is_free() {
        let mut s = Spring::new(100.0, 0.0, 10.0, 5.0);
        let f = s.force(Vec3::ZERO, Vec3::ZERO, Vec3::X, Vec3::ZERO);
        assert_eq!(f, Vec3::ZERO);
        let mut s = Spring::new(100.0, 2.0, 0.0, 5.0);
        let f = s.force(Vec3::ZERO, Vec3::ZERO, Vec3::X, Vec3::ZERO);
        assert_eq!(f, Vec3::new(-32.0, 0.0, 0.0));
    }

    #[test]
    fn damping_resists_separation_speed() {
        let mut s = Spring::new(1.0, 0.0, 10.0, 0.0);
        let still = s.force(Vec3::ZERO, Vec3::ZERO, Vec3::X * 2.0, Vec3::ZERO);
        let parting = s.force(Vec3::ZERO, Vec3::ZERO, Vec3::X * 2.0, Vec3::X);
        assert!(parting.x > still.x);
    }
}
