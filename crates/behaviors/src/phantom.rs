//! `func_phantom_objects`: shakes its targets, then hurls them one by one
//! at an actor.

use glam::Vec3;
use simkit_common::{INITIAL_RELEASE_BUILD, ObjectId, sec_to_ms};
use simkit_kernel::{
    ActivationMask, Behavior, BehaviorError, Capabilities, ClassInfo, Ctx, EventArg, ObjectBase, SpawnError,
};
use simkit_persist::{ArchiveError, RestoreReader, SaveWriter};
use simkit_physics::{MASK_SOLID, predict_trajectory};

use crate::moveable::EV_ENABLE_DAMAGE;

/// How long a thrown prop stays dangerous, in seconds.
const THROW_DAMAGE_TIME: f32 = 2.5;

pub fn class() -> ClassInfo {
    ClassInfo {
        name: "func_phantom_objects",
        factory: || Box::new(Phantom::default()),
        events: &[],
        field_set: None,
    }
}

#[derive(Debug, Default)]
pub struct Phantom {
    /// Zero means throw each target once.
    end_time_ms: u64,
    throw_time: f32,
    shake_time: f32,
    shake_ang: Vec3,
    speed: f32,
    min_wait_ms: u64,
    max_wait_ms: u64,
    target: Option<ObjectId>,
    throws: Vec<Throw>,
}

/// One prop's schedule, keyed by the prop so target removal cannot shift it.
#[derive(Debug, Clone, PartialEq)]
struct Throw {
    object: ObjectId,
    /// `None` once thrown.
    at: Option<u64>,
    /// Last place this prop saw the actor's eye.
    last_seen: Vec3,
}

impl Phantom {
    fn pick_target(ctx: &Ctx<'_>, activator: Option<ObjectId>) -> Option<ObjectId> {
        activator
            .filter(|a| ctx.has_capability(*a, Capabilities::ACTOR))
            .or_else(|| ctx.objects_with(Capabilities::PLAYER).first().copied())
    }

    fn throw_wait(&self, ctx: &mut Ctx<'_>) -> u64 {
        let spread = self.max_wait_ms.saturating_sub(self.min_wait_ms);
        let spread = i32::try_from(spread).unwrap_or(i32::MAX);
        self.min_wait_ms + ctx.random().random_int(spread).max(0) as u64
    }
}

impl Behavior for Phantom {
    fn spawn(&mut self, ctx: &mut Ctx<'_>) -> Result<(), SpawnError> {
        let args = ctx.args();
        self.throw_time = args.get_float("time", 5.0);
        self.speed = args.get_float("speed", 1200.0);
        self.shake_time = args.get_float("shake_time", 1.0);
        self.throw_time = (self.throw_time - self.shake_time).max(0.0);
        self.min_wait_ms = sec_to_ms(args.get_float("min_wait", 1.0));
        self.max_wait_ms = sec_to_ms(args.get_float("max_wait", 3.0));
        self.shake_ang = args.get_vector("shake_ang", Vec3::splat(65.0));
        ctx.hide();
        ctx.set_contents(0);
        Ok(())
    }

    fn activate(&mut self, ctx: &mut Ctx<'_>, activator: Option<ObjectId>) -> Result<(), BehaviorError> {
        if ctx.is_active(ActivationMask::THINK) {
            ctx.become_inactive(ActivationMask::THINK);
            return Ok(());
        }
        let targets: Vec<ObjectId> = ctx
            .base()
            .targets
            .iter()
            .copied()
            .filter(|t| ctx.object(*t).is_some())
            .collect();
        if targets.is_empty() {
            return Ok(());
        }
        let Some(target) = Self::pick_target(ctx, activator) else {
            tracing::warn!(object = %ctx.id(), "no actor to throw at");
            return Ok(());
        };
        ctx.base_mut().targets = targets;
        self.target = Some(target);

        let now = ctx.time_ms();
        let end = ctx.args().get_float("end_time", 0.0);
        self.end_time_ms = if end > 0.0 { now + sec_to_ms(end) } else { 0 };

        let count = ctx.base().targets.len();
        let to_pos = ctx.eye_of(target).unwrap_or(Vec3::ZERO);

        // Stagger the throws, earlier gaps longer, then fit them into
        // `throw_time` after the shake.
        let mut offsets = Vec::with_capacity(count);
        let mut time = 0.0_f32;
        for i in 0..count {
            offsets.push(time);
            let frac = 1.0 - i as f32 / count as f32;
            time += (ctx.random().random_float() + 1.0) * 0.5 * frac + 0.1;
        }
        let scale = self.throw_time / time;
        let shake_ms = sec_to_ms(self.shake_time);
        self.throws = ctx
            .base()
            .targets
            .iter()
            .zip(offsets)
            .map(|(&object, t)| Throw {
                object,
                at: Some(now + shake_ms + sec_to_ms(t * scale)),
                last_seen: to_pos,
            })
            .collect();

        tracing::debug!(object = %ctx.id(), %target, count, "phantom objects armed");
        ctx.become_active(ActivationMask::THINK);
        Ok(())
    }

    fn think(&mut self, ctx: &mut Ctx<'_>) -> Result<(), BehaviorError> {
        let Some(target) = self.target.filter(|t| ctx.object(*t).is_some()) else {
            ctx.become_inactive(ActivationMask::THINK);
            return Ok(());
        };
        let now = ctx.time_ms();
        let target_dead = ctx.object(target).is_some_and(|b| b.health <= 0);
        if target_dead || (self.end_time_ms != 0 && now > self.end_time_ms) {
            // The current frame still runs.
            ctx.become_inactive(ActivationMask::THINK);
        }
        let to_pos = ctx.eye_of(target).unwrap_or(Vec3::ZERO);
        let target_body = ctx.object(target).and_then(|b| b.body);

        let mut remaining = 0;
        for i in 0..self.throws.len() {
            let Throw { object: ent, at, .. } = self.throws[i];
            let Some(base) = ctx.object(ent) else {
                continue;
            };
            if base.hidden {
                continue;
            }
            let (Some(body), Some(throw_at)) = (base.body, at) else {
                continue;
            };
            remaining += 1;

            let time = (throw_at as f32 - now as f32) / 1000.0;
            if time > self.shake_time {
                continue;
            }

            let physics = ctx.physics_ref();
            let Some(origin) = physics.origin(body) else {
                continue;
            };
            let trace = physics.trace_point(origin, to_pos, MASK_SOLID, Some(body));
            if trace.clear() || (trace.body.is_some() && trace.body == target_body) {
                self.throws[i].last_seen = to_pos;
            }

            if time < 0.0 {
                let gravity = if physics.uses_gravity(body) {
                    physics.gravity()
                } else {
                    Vec3::ZERO
                };
                let aim = predict_trajectory(
                    physics,
                    origin,
                    self.throws[i].last_seen,
                    self.speed,
                    gravity,
                    physics.clip_mask(body),
                    Some(body),
                    target_body,
                );
                ctx.physics().set_linear_velocity(body, aim.dir * self.speed);
                self.throws[i].at = if self.end_time_ms == 0 {
                    None
                } else {
                    Some(now + self.throw_wait(ctx))
                };
                if ctx.has_capability(ent, Capabilities::MOVEABLE) {
                    ctx.post_to(
                        ent,
                        &EV_ENABLE_DAMAGE,
                        0,
                        vec![EventArg::Bool(true), EventArg::Float(THROW_DAMAGE_TIME)],
                    )?;
                }
                tracing::debug!(object = %ctx.id(), thrown = %ent, clear = aim.clear, "threw");
            } else {
                let random = ctx.random();
                let jitter = Vec3::new(random.crandom_float(), random.crandom_float(), random.crandom_float());
                let ang = jitter * self.shake_ang * (1.0 - time / self.shake_time);
                ctx.physics().set_angular_velocity(body, ang);
            }
        }

        if remaining == 0 {
            ctx.become_inactive(ActivationMask::THINK);
        }
        Ok(())
    }

    fn save(&self, w: &mut SaveWriter) {
        w.write_u64(self.end_time_ms);
        w.write_float(self.throw_time);
        w.write_float(self.shake_time);
        w.write_vec3(self.shake_ang);
        w.write_float(self.speed);
        w.write_u64(self.min_wait_ms);
        w.write_u64(self.max_wait_ms);
        w.write_object(self.target);
        w.write_len(self.throws.len());
        for throw in &self.throws {
            w.write_object(Some(throw.object));
            w.write_u64(throw.at.unwrap_or(0));
        }
        if w.build() != INITIAL_RELEASE_BUILD {
            for throw in &self.throws {
                w.write_vec3(throw.last_seen);
            }
        }
    }

    fn restore(&mut self, _base: &ObjectBase, r: &mut RestoreReader) -> Result<(), ArchiveError> {
        self.end_time_ms = r.read_u64()?;
        self.throw_time = r.read_float()?;
        self.shake_time = r.read_float()?;
        self.shake_ang = r.read_vec3()?;
        self.speed = r.read_float()?;
        self.min_wait_ms = r.read_u64()?;
        self.max_wait_ms = r.read_u64()?;
        self.target = r.read_object()?;
        let count = r.read_len()?;
        let mut throws = Vec::with_capacity(count);
        for _ in 0..count {
            let index = r.position();
            let object = r.read_object()?.ok_or(ArchiveError::OutOfRange { index })?;
            let at = r.read_u64()?;
            throws.push(Throw {
                object,
                at: (at != 0).then_some(at),
                last_seen: Vec3::ZERO,
            });
        }
        if r.build() != INITIAL_RELEASE_BUILD {
            for throw in &mut throws {
                throw.last_seen = r.read_vec3()?;
            }
        }
        self.throws = throws;
        Ok(())
    }

    fn relink(&mut self, live: &dyn Fn(ObjectId) -> bool) {
        self.target = self.target.filter(|t| live(*t));
        self.throws.retain(|t| live(t.object));
    }
}
