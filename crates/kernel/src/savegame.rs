//! World save and two-phase restore.
//!
//! Save order: clock, random stream, id counter, objects, pending events.
//! Restore first allocates every object and reads its fields with references
//! kept as raw ids, then links: references to ids that did not come back
//! resolve to absent and post-restore hooks run.

use std::collections::BTreeSet;
use std::sync::Arc;

use simkit_common::{Clock, ObjectId, SimRandom, SpawnArgs, WorldConfig};
use simkit_persist::{ArchiveError, RestoreReader, SaveWriter};
use simkit_physics::{BodyDesc, BodyState, PhysicsWorld, SimplePhysics};

use crate::event::{EventArg, EventError, PendingEvent};
use crate::object::{Capabilities, ObjectBase};
use crate::registry::ClassRegistry;
use crate::schedule::ActivationMask;
use crate::world::{ObjectSlot, World};

#[derive(Debug, thiserror::Error)]
pub enum RestoreError {
    #[error(transparent)]
    Archive(#[from] ArchiveError),
    #[error("archive names unknown class '{0}'")]
    UnknownClass(String),
    #[error("archive names unknown event '{0}'")]
    UnknownEvent(String),
    #[error(transparent)]
    Event(#[from] EventError),
    #[error("object {0} appears twice in the archive")]
    DuplicateObject(ObjectId),
}

impl World {
    /// Serializes the whole world. Called by the host between frames.
    pub fn save(&self) -> Result<Vec<u8>, ArchiveError> {
        let mut w = SaveWriter::new(self.config.build);
        w.write_u64(self.clock.tick());
        w.write_int(i64::from(self.clock.msec_per_tick()));
        w.write_u64(self.random.seed());
        w.write_u128(self.random.word_pos());
        w.write_u64(self.next_id);

        w.write_len(self.objects.len());
        for slot in self.objects.values() {
            save_object(slot, self.physics.as_ref(), &mut w);
        }

        let now = self.clock.time_ms();
        w.write_len(self.events.len());
        for (time, event) in self.events.iter() {
            w.write_u64(event.owner.raw());
            w.write_string(event.def.name);
            w.write_u64(time.saturating_sub(now));
            w.write_len(event.args.len());
            for arg in &event.args {
                arg.save(&mut w);
            }
        }
        tracing::debug!(
            tick = self.clock.tick(),
            objects = self.objects.len(),
            events = self.events.len(),
            "world saved"
        );
        w.into_bytes()
    }

    /// Rebuilds a world from [`World::save`] output on the reference solver.
    pub fn restore(data: &[u8], classes: Arc<ClassRegistry>) -> Result<World, RestoreError> {
        Self::restore_with_physics(data, classes, Box::new(SimplePhysics::new()))
    }

    /// Rebuilds a world into a fresh solver. Any error leaves nothing half
    /// restored: the caller keeps its current world.
    pub fn restore_with_physics(
        data: &[u8],
        classes: Arc<ClassRegistry>,
        physics: Box<dyn PhysicsWorld>,
    ) -> Result<World, RestoreError> {
        let mut r = RestoreReader::from_bytes(data)?;
        let tick = r.read_u64()?;
        let msec_per_tick = r.read_u32()?;
        let seed = r.read_u64()?;
        let word_pos = r.read_u128()?;
        let config = WorldConfig {
            msec_per_tick,
            seed,
            build: r.build(),
        };
        let mut world = World::with_physics(config, classes, physics);
        world.clock = Clock::from_parts(tick, msec_per_tick);
        world.random = SimRandom::from_parts(seed, word_pos);
        world.next_id = r.read_u64()?;

        // Phase one: allocate every object.
        let count = r.read_len()?;
        for _ in 0..count {
            let slot = restore_object(&mut r, &mut world)?;
            let id = slot.base.id;
            if world.objects.contains_key(&id) {
                return Err(RestoreError::DuplicateObject(id));
            }
            if !slot.base.mask.is_empty() {
                world.active.insert(id);
            }
            world.names.insert(slot.base.name.clone(), id);
            world.objects.insert(id, slot);
        }

        // Phase two: link.
        let live: BTreeSet<ObjectId> = world.objects.keys().copied().collect();
        let is_live = |id: ObjectId| live.contains(&id);
        for slot in world.objects.values_mut() {
            slot.base.targets.retain(|t| live.contains(t));
            if let Some(behavior) = slot.behavior.as_mut() {
                behavior.relink(&is_live);
            }
        }

        let now = world.clock.time_ms();
        let pending = r.read_len()?;
        for _ in 0..pending {
            let owner = ObjectId(r.read_u64()?);
            let name = r.read_string()?;
            let delay = r.read_u64()?;
            let def = world
                .classes
                .events()
                .get(&name)
                .ok_or_else(|| RestoreError::UnknownEvent(name.clone()))?;
            let argc = r.read_len()?;
            let mut args = Vec::with_capacity(argc);
            for _ in 0..argc {
                args.push(EventArg::restore(&mut r)?);
            }
            def.check(&args)?;
            if !live.contains(&owner) {
                tracing::warn!(%owner, event = def.name, "dropping event for missing owner");
                continue;
            }
            world.events.push(now + delay, PendingEvent { owner, def, args });
        }
        if r.remaining() > 0 {
            return Err(ArchiveError::TrailingFields {
                remaining: r.remaining(),
            }
            .into());
        }

        for id in live.iter().copied() {
            if let Some(Err(e)) = world.with_behavior(id, |b, ctx| b.post_restore(ctx)) {
                tracing::error!(%id, error = %e, "post-restore failed");
                world.become_inactive(id, ActivationMask::THINK);
            }
        }
        tracing::info!(tick, objects = world.objects.len(), events = world.events.len(), "world restored");
        Ok(world)
    }
}

fn save_object(slot: &ObjectSlot, physics: &dyn PhysicsWorld, w: &mut SaveWriter) {
    let base = &slot.base;
    w.begin_record();
    w.write_u64(base.id.raw());
    w.write_string(&base.class);
    w.write_string(&base.name);
    w.write_len(base.args.len());
    for (k, v) in base.args.iter() {
        w.write_string(k);
        w.write_string(v);
    }
    w.write_int(i64::from(base.mask.bits()));
    w.write_len(base.targets.len());
    for target in &base.targets {
        w.write_object(Some(*target));
    }
    w.write_bool(base.hidden);
    w.write_int(i64::from(base.health));
    w.write_bool(base.take_damage);
    w.write_string(&base.render.model);
    w.write_floats(&base.render.shader_parms);
    w.write_int(i64::from(base.capabilities.bits()));
    w.write_vec3(base.eye_offset);
    match base.body.and_then(|b| physics.body_state(b)) {
        Some(state) => {
            w.write_bool(true);
            state.save(w);
        }
        None => w.write_bool(false),
    }
    w.begin_record();
    if let Some(behavior) = &slot.behavior {
        behavior.save(w);
    }
    w.end_record();
    w.end_record();
}

fn restore_object(r: &mut RestoreReader, world: &mut World) -> Result<ObjectSlot, RestoreError> {
    r.begin_record()?;
    let id = ObjectId(r.read_u64()?);
    let class = r.read_string()?;
    let name = r.read_string()?;
    let argc = r.read_len()?;
    let mut args = SpawnArgs::new();
    for _ in 0..argc {
        let key = r.read_string()?;
        let value = r.read_string()?;
        args.set(key, value);
    }
    let factory = world
        .classes
        .get(&class)
        .map(|info| info.factory)
        .ok_or_else(|| RestoreError::UnknownClass(class.clone()))?;

    let mut base = ObjectBase::new(id, &class, name, args);
    base.mask = ActivationMask::from_bits_truncate(r.read_int()? as u8);
    let targets = r.read_len()?;
    for _ in 0..targets {
        if let Some(t) = r.read_object()? {
            base.targets.push(t);
        }
    }
    base.hidden = r.read_bool()?;
    base.health = r.read_i32()?;
    base.take_damage = r.read_bool()?;
    base.render.model = r.read_string()?;
    r.read_floats_into(&mut base.render.shader_parms)?;
    base.capabilities = Capabilities::from_bits(r.read_u32()?);
    base.eye_offset = r.read_vec3()?;
    if r.read_bool()? {
        let state = BodyState::restore(r)?;
        let body = world.physics.create_body(BodyDesc {
            owner: Some(id),
            ..BodyDesc::default()
        });
        world.physics.set_body_state(body, &state);
        base.body = Some(body);
    }

    let mut behavior = factory();
    r.begin_record()?;
    behavior.restore(&base, r)?;
    r.end_record()?;
    r.end_record()?;
    Ok(ObjectSlot {
        base,
        behavior: Some(behavior),
        remove_pending: false,
    })
}
