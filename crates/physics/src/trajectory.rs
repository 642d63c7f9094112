//! Intercept prediction for thrown objects.

use glam::Vec3;

use crate::world::{BodyId, PhysicsWorld};

const TRACE_SEGMENTS: usize = 16;

/// A launch direction and whether the predicted path reaches the target
/// without hitting anything else.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aim {
    pub dir: Vec3,
    pub clear: bool,
}

/// Launch pitch (radians) and flight time for each ballistic solution,
/// lowest pitch first.
pub fn ballistics(start: Vec3, target: Vec3, speed: f32, gravity: f32) -> Vec<(f32, f32)> {
    let delta = target - start;
    let x = Vec3::new(delta.x, delta.y, 0.0).length();
    let y = delta.z;
    let g = gravity.abs();
    if speed <= 0.0 || g <= f32::EPSILON || x <= f32::EPSILON {
        return Vec::new();
    }
    let v2 = speed * speed;
    let disc = v2 * v2 - g * (g * x * x + 2.0 * y * v2);
    if disc < 0.0 {
        return Vec::new();
    }
    let root = disc.sqrt();
    let mut out = Vec::with_capacity(2);
    for num in [v2 - root, v2 + root] {
        let pitch = (num / (g * x)).atan();
        let time = x / (speed * pitch.cos());
        if time.is_finite() && time > 0.0 {
            out.push((pitch, time));
        }
    }
    out.sort_by(|a, b| a.0.total_cmp(&b.0));
    out.dedup_by(|a, b| (a.0 - b.0).abs() < 1e-6);
    out
}

/// Traces the parabola in segments. `target_body` counts as a clear hit.
#[allow(clippy::too_many_arguments)]
fn test_arc(
    physics: &dyn PhysicsWorld,
    start: Vec3,
    velocity: Vec3,
    gravity: Vec3,
    time: f32,
    mask: u32,
    ignore: Option<BodyId>,
    target_body: Option<BodyId>,
) -> bool {
    let mut prev = start;
    for i in 1..=TRACE_SEGMENTS {
        let t = time * i as f32 / TRACE_SEGMENTS as f32;
        let p = start + velocity * t + gravity * (0.5 * t * t);
        let trace = physics.trace_point(prev, p, mask, ignore);
        if !trace.clear() {
            return trace.body.is_some() && trace.body == target_body;
        }
        prev = p;
    }
    true
}

/// Finds a launch direction from `start` that reaches `target` at `speed`
/// under `gravity`. A straight line is used when gravity is zero; otherwise
/// the low arc is tried before the high one.
#[allow(clippy::too_many_arguments)]
pub fn predict_trajectory(
    physics: &dyn PhysicsWorld,
    start: Vec3,
    target: Vec3,
    speed: f32,
    gravity: Vec3,
    mask: u32,
    ignore: Option<BodyId>,
    target_body: Option<BodyId>,
) -> Aim {
    let direct = (target - start).normalize_or_zero();
    if speed <= 0.0 || gravity == Vec3::ZERO {
        let trace = physics.trace_point(start, target, mask, ignore);
        let clear = trace.clear() || (trace.body.is_some() && trace.body == target_body);
        return Aim { dir: direct, clear };
    }

    let solutions = ballistics(start, target, speed, gravity.z);
    if solutions.is_empty() {
        tracing::trace!(?start, ?target, speed, "target out of ballistic range");
        return Aim {
            dir: direct,
            clear: false,
        };
    }

    let flat = Vec3::new(target.x - start.x, target.y - start.y, 0.0).normalize_or_zero();
    let mut dir = direct;
    for (pitch, time) in solutions {
        dir = flat * pitch.cos() + Vec3::Z * pitch.sin();
        if test_arc(physics, start, dir * speed, gravity, time, mask, ignore, target_body) {
            return Aim { dir, clear: true };
        }
    }
    Aim { dir, clear: false }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bounds::Aabb;
    use crate::simple::SimplePhysics;
    use crate::world::{BodyDesc, CONTENTS_SOLID, MASK_SOLID};

    #[test]
    fn zero_gravity_aims_straight() {
        let p = SimplePhysics::with_gravity(Vec3::ZERO);
        let aim = predict_trajectory(&p, Vec3::ZERO, Vec3::new(10.0, 0.0, 0.0), 100.0, Vec3::ZERO, MASK_SOLID, None, None);
        assert_eq!(aim.dir, Vec3::X);
        assert!(aim.clear);
    }

    #[test]
    fn ballistic_arc_lands_on_target() {
        let g = -1000.0;
        let start = Vec3::ZERO;
        let target = Vec3::new(300.0, 0.0, 0.0);
        let speed = 800.0;
        let sols = ballistics(start, target, speed, g);
        assert_eq!(sols.len(), 2);
        assert!(sols[0].0 < sols[1].0);
        for (pitch, time) in sols {
            let v = Vec3::new(pitch.cos(), 0.0, pitch.sin()) * speed;
            let land = start + v * time + Vec3::new(0.0, 0.0, g) * (0.5 * time * time);
            assert!((land - target).length() < 0.5, "{land:?}");
        }
    }

    #[test]
    fn out_of_range_has_no_solution() {
        assert!(ballistics(Vec3::ZERO, Vec3::new(1e6, 0.0, 0.0), 10.0, -1000.0).is_empty());
    }

    #[test]
    fn blocked_low_arc_falls_back_to_high_arc() {
        let mut p = SimplePhysics::new();
        // A wall across the low arc but below the high one.
        p.create_body(BodyDesc {
            origin: Vec3::new(150.0, 0.0, 20.0),
            bounds: Aabb::new(Vec3::new(-5.0, -50.0, -20.0), Vec3::new(5.0, 50.0, 40.0)),
            contents: CONTENTS_SOLID,
            ..BodyDesc::default()
        });
        let gravity = Vec3::new(0.0, 0.0, -1000.0);
        let target = Vec3::new(300.0, 0.0, 0.0);
        let sols = ballistics(Vec3::ZERO, target, 800.0, gravity.z);
        let aim = predict_trajectory(&p, Vec3::ZERO, target, 800.0, gravity, MASK_SOLID, None, None);
        assert!(aim.clear);
        let high_pitch = sols[1].0;
        assert!((aim.dir.z - high_pitch.sin()).abs() < 1e-4);
    }

    #[test]
    fn fully_blocked_reports_not_clear() {
        let mut p = SimplePhysics::new();
        p.create_body(BodyDesc {
            origin: Vec3::new(150.0, 0.0, 0.0),
            bounds: Aabb::new(Vec3::new(-5.0, -50.0, -100.0), Vec3::new(5.0, 50.0, 5000.0)),
            ..BodyDesc::default()
        });
        let aim = predict_trajectory(
            &p,
            Vec3::ZERO,
            Vec3::new(300.0, 0.0, 0.0),
            800.0,
            Vec3::new(0.0, 0.0, -1000.0),
            MASK_SOLID,
            None,
            None,
        );
        assert!(!aim.clear);
    }
}
