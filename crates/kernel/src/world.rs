use glam::Vec3;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use simkit_common::{
    Clock, LevelDef, ObjectId, SimRandom, SpawnArgs, WorldConfig, angles_to_axis, sec_to_ms,
};
use simkit_physics::{Aabb, BodyDesc, CONTENTS_SOLID, CONTENTS_TRIGGER, MASK_SOLID, PhysicsWorld, SimplePhysics};

use crate::behavior::{Behavior, BehaviorError, SpawnError};
use crate::ctx::Ctx;
use crate::event::{
    EV_ACTIVATE, EV_FIND_TARGETS, EV_KILLED, EV_POSTSPAWN, EV_REMOVE, EventArg, EventDef,
    EventError, EventQueue, PendingEvent,
};
use crate::object::ObjectBase;
use crate::registry::ClassRegistry;
use crate::schedule::ActivationMask;

/// Which side of the network a world is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Authority,
    Observer,
}

pub(crate) struct ObjectSlot {
    pub(crate) base: ObjectBase,
    /// Taken out while one of the object's hooks is running.
    pub(crate) behavior: Option<Box<dyn Behavior>>,
    pub(crate) remove_pending: bool,
}

/// The simulation: every live object, the activation set, pending events,
/// the clock and the random stream.
///
/// Objects live in a `BTreeMap` keyed by a monotonically increasing id, so
/// iteration order is creation order on every platform. Given the same
/// configuration, level and seed, two worlds step to identical states.
pub struct World {
    pub(crate) config: WorldConfig,
    pub(crate) clock: Clock,
    pub(crate) random: SimRandom,
    pub(crate) objects: BTreeMap<ObjectId, ObjectSlot>,
    pub(crate) active: BTreeSet<ObjectId>,
    pub(crate) names: BTreeMap<String, ObjectId>,
    pub(crate) next_id: u64,
    pub(crate) events: EventQueue,
    pub(crate) physics: Box<dyn PhysicsWorld>,
    pub(crate) classes: Arc<ClassRegistry>,
    pub(crate) visual_updates: Vec<ObjectId>,
    pub(crate) role: Role,
    pub(crate) spawn_failures: Vec<(ObjectId, SpawnError)>,
}

impl fmt::Debug for World {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("World")
            .field("tick", &self.clock.tick())
            .field("objects", &self.objects.len())
            .field("active", &self.active.len())
            .field("pending_events", &self.events.len())
            .field("role", &self.role)
            .finish()
    }
}

impl World {
    /// An empty authority world on the reference physics solver.
    pub fn new(config: WorldConfig, classes: Arc<ClassRegistry>) -> Self {
        Self::with_physics(config, classes, Box::new(SimplePhysics::new()))
    }

    pub fn with_physics(config: WorldConfig, classes: Arc<ClassRegistry>, physics: Box<dyn PhysicsWorld>) -> Self {
        Self {
            clock: Clock::new(config.msec_per_tick),
            random: SimRandom::new(config.seed),
            config,
            objects: BTreeMap::new(),
            active: BTreeSet::new(),
            names: BTreeMap::new(),
            next_id: 1,
            events: EventQueue::new(),
            physics,
            classes,
            visual_updates: Vec::new(),
            role: Role::Authority,
            spawn_failures: Vec::new(),
        }
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    pub fn classes(&self) -> &Arc<ClassRegistry> {
        &self.classes
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn set_role(&mut self, role: Role) {
        self.role = role;
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    /// Current simulation tick.
    pub fn tick(&self) -> u64 {
        self.clock.tick()
    }

    pub fn time_ms(&self) -> u64 {
        self.clock.time_ms()
    }

    pub fn random(&self) -> &SimRandom {
        &self.random
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    pub fn object(&self, id: ObjectId) -> Option<&ObjectBase> {
        self.objects.get(&id).map(|s| &s.base)
    }

    /// Every object's base, in creation order.
    pub fn objects(&self) -> impl Iterator<Item = &ObjectBase> {
        self.objects.values().map(|s| &s.base)
    }

    /// `None` while one of the object's own hooks is running.
    pub fn behavior(&self, id: ObjectId) -> Option<&dyn Behavior> {
        self.objects.get(&id)?.behavior.as_deref()
    }

    pub fn find_by_name(&self, name: &str) -> Option<ObjectId> {
        self.names.get(name).copied()
    }

    pub fn physics(&self) -> &dyn PhysicsWorld {
        self.physics.as_ref()
    }

    pub fn physics_mut(&mut self) -> &mut dyn PhysicsWorld {
        self.physics.as_mut()
    }

    /// Ids with a non-empty activation mask, in creation order.
    pub fn active_ids(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.active.iter().copied()
    }

    pub fn mask_of(&self, id: ObjectId) -> ActivationMask {
        self.object(id).map(ObjectBase::mask).unwrap_or_default()
    }

    /// Objects whose visuals were refreshed since the last drain.
    pub fn take_visual_updates(&mut self) -> Vec<ObjectId> {
        std::mem::take(&mut self.visual_updates)
    }

    pub fn pending_events(&self) -> impl Iterator<Item = (u64, &PendingEvent)> {
        self.events.iter()
    }

    pub fn pending_event_count(&self) -> usize {
        self.events.len()
    }

    pub fn has_pending(&self, owner: ObjectId, def: &EventDef) -> bool {
        self.events.has_pending(owner, def)
    }

    // ---------------------------------------------------------------
    // Construction and removal
    // ---------------------------------------------------------------

    /// Creates an object of `class` from configuration.
    ///
    /// The kernel builds the base and its physics body, then runs the class
    /// spawn hook. A failed spawn leaves no object, body or pending event.
    pub fn spawn(&mut self, class: &str, args: SpawnArgs) -> Result<ObjectId, SpawnError> {
        let factory = self
            .classes
            .get(class)
            .map(|info| info.factory)
            .ok_or_else(|| SpawnError::UnknownClass(class.to_string()))?;

        let id = ObjectId(self.next_id);
        self.next_id += 1;
        let mut name = args
            .get("name")
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("{class}_{}", id.raw()));
        if self.names.contains_key(&name) {
            let renamed = format!("{name}_{}", id.raw());
            tracing::warn!(%id, %name, %renamed, "duplicate object name");
            name = renamed;
        }

        let mut base = ObjectBase::new(id, class, name.clone(), args);
        base.body = Some(self.physics.create_body(body_desc(id, &base.args)));
        self.objects.insert(
            id,
            ObjectSlot {
                base,
                behavior: None,
                remove_pending: false,
            },
        );
        self.names.insert(name, id);

        let now = self.clock.time_ms();
        for def in [&EV_FIND_TARGETS, &EV_POSTSPAWN] {
            self.events.push(
                now,
                PendingEvent {
                    owner: id,
                    def,
                    args: Vec::new(),
                },
            );
        }

        let mut behavior = factory();
        let result = behavior.spawn(&mut Ctx::new(self, id));
        if let Err(e) = result {
            tracing::warn!(%id, class, error = %e, "spawn failed");
            self.discard(id);
            return Err(e);
        }

        let caps = behavior.capabilities();
        let remove = match self.objects.get_mut(&id) {
            Some(slot) => {
                slot.base.capabilities = caps;
                slot.behavior = Some(behavior);
                slot.remove_pending
            }
            None => false,
        };
        tracing::debug!(%id, class, "spawned");
        if remove {
            self.remove(id);
        }
        Ok(id)
    }

    /// Spawns every entity of a level, then runs target resolution and
    /// post-spawn linking before the first tick.
    pub fn load_level(&mut self, level: &LevelDef) -> Result<Vec<ObjectId>, SpawnError> {
        let mut ids = Vec::with_capacity(level.entities.len());
        for def in &level.entities {
            let args = def.spawn_args()?;
            ids.push(self.spawn(&def.class, args)?);
        }
        self.spawn_failures.clear();
        self.service_events();
        if let Some((_, e)) = self.spawn_failures.drain(..).next() {
            return Err(e);
        }
        tracing::info!(objects = ids.len(), "level loaded");
        Ok(ids)
    }

    /// Removes every object and pending event, then resets the clock and the
    /// random stream to the configured seed. Ids keep counting up.
    pub fn unload_level(&mut self) {
        let ids: Vec<ObjectId> = self.objects.keys().copied().collect();
        for id in ids {
            self.discard(id);
        }
        self.events = EventQueue::new();
        self.visual_updates.clear();
        self.spawn_failures.clear();
        self.clock = Clock::new(self.config.msec_per_tick);
        self.random = SimRandom::new(self.config.seed);
        tracing::info!(next_id = self.next_id, "level unloaded");
    }

    /// Removes an object, its body and its pending events, and drops it from
    /// every target list. While the object's own hook is running, removal is
    /// deferred until the hook returns.
    pub fn remove(&mut self, id: ObjectId) -> bool {
        let Some(slot) = self.objects.get_mut(&id) else {
            return false;
        };
        if slot.behavior.is_none() {
            slot.remove_pending = true;
            return true;
        }
        self.discard(id);
        true
    }

    pub(crate) fn discard(&mut self, id: ObjectId) {
        let Some(slot) = self.objects.remove(&id) else {
            return;
        };
        self.active.remove(&id);
        let purged = self.events.purge_owner(id);
        if self.names.get(&slot.base.name) == Some(&id) {
            self.names.remove(&slot.base.name);
        }
        if let Some(body) = slot.base.body {
            self.physics.remove_body(body);
        }
        for other in self.objects.values_mut() {
            other.base.targets.retain(|t| *t != id);
        }
        self.visual_updates.retain(|v| *v != id);
        tracing::debug!(%id, class = %slot.base.class, purged, "removed");
    }

    // ---------------------------------------------------------------
    // Scheduling
    // ---------------------------------------------------------------

    pub fn become_active(&mut self, id: ObjectId, flags: ActivationMask) {
        if let Some(slot) = self.objects.get_mut(&id) {
            slot.base.mask.insert(flags);
            if !slot.base.mask.is_empty() {
                self.active.insert(id);
            }
        }
    }

    pub fn become_inactive(&mut self, id: ObjectId, flags: ActivationMask) {
        if let Some(slot) = self.objects.get_mut(&id) {
            slot.base.mask.remove(flags);
            if slot.base.mask.is_empty() {
                self.active.remove(&id);
            }
        }
    }

    /// Advances the clock one tick, services due events, then runs every
    /// active object once in creation order.
    pub fn run_frame(&mut self) {
        self.clock.advance();
        let tick = self.clock.tick();
        let _span = tracing::info_span!("frame", tick).entered();
        self.service_events();
        let turn: Vec<ObjectId> = self.active.iter().copied().collect();
        for id in turn {
            self.run_object(id);
        }
    }

    pub fn run_frames(&mut self, frames: u64) {
        for _ in 0..frames {
            self.run_frame();
        }
    }

    fn run_object(&mut self, id: ObjectId) {
        let Some(mask) = self.objects.get(&id).map(|s| s.base.mask) else {
            return;
        };
        for flag in ActivationMask::ORDER {
            if !mask.contains(flag) || !self.objects.contains_key(&id) {
                continue;
            }
            if flag == ActivationMask::VISUALS {
                if !self.visual_updates.contains(&id) {
                    self.visual_updates.push(id);
                }
                self.become_inactive(id, ActivationMask::VISUALS);
                continue;
            }
            let result = self.with_behavior(id, |behavior, ctx| {
                if flag == ActivationMask::PHYSICS {
                    behavior.run_physics(ctx)
                } else if flag == ActivationMask::THINK {
                    behavior.think(ctx)
                } else {
                    behavior.update_particles(ctx)
                }
            });
            if let Some(Err(e)) = result {
                tracing::error!(%id, subsystem = flag.name(), error = %e, "handler failed");
                self.become_inactive(id, flag);
            }
        }
    }

    /// Runs `f` with the object's behavior taken out of its slot. Returns
    /// `None` when the object is gone or already running.
    pub(crate) fn with_behavior<R>(
        &mut self,
        id: ObjectId,
        f: impl FnOnce(&mut dyn Behavior, &mut Ctx<'_>) -> R,
    ) -> Option<R> {
        let mut behavior = self.objects.get_mut(&id)?.behavior.take()?;
        let result = f(behavior.as_mut(), &mut Ctx::new(self, id));
        let remove = match self.objects.get_mut(&id) {
            Some(slot) => {
                slot.behavior = Some(behavior);
                slot.remove_pending
            }
            None => false,
        };
        if remove {
            self.discard(id);
        }
        Some(result)
    }

    fn is_executing(&self, id: ObjectId) -> bool {
        self.objects.get(&id).is_some_and(|s| s.behavior.is_none())
    }

    // ---------------------------------------------------------------
    // Events
    // ---------------------------------------------------------------

    /// Posts `def` to `owner` after `delay_ms`.
    ///
    /// Arguments are checked against the signature now. A zero delay is
    /// delivered before returning unless the owner is already running, in
    /// which case it waits for the next service pass. Posts to an owner that
    /// does not exist are dropped.
    pub fn post_event(
        &mut self,
        owner: ObjectId,
        def: &'static EventDef,
        delay_ms: u64,
        args: Vec<EventArg>,
    ) -> Result<(), EventError> {
        if let Err(e) = def.check(&args) {
            tracing::error!(%owner, event = def.name, error = %e, "rejected event");
            return Err(e);
        }
        if self.classes.events().get(def.name).is_none() {
            tracing::error!(%owner, event = def.name, "event is not registered");
            return Err(EventError::UnknownEvent(def.name.to_string()));
        }
        if !self.objects.contains_key(&owner) {
            tracing::debug!(%owner, event = def.name, "post to absent owner dropped");
            return Ok(());
        }
        let event = PendingEvent { owner, def, args };
        if delay_ms == 0 && !self.is_executing(owner) {
            self.deliver(event);
        } else {
            self.events.push(self.clock.time_ms() + delay_ms, event);
        }
        Ok(())
    }

    pub fn post_event_sec(
        &mut self,
        owner: ObjectId,
        def: &'static EventDef,
        seconds: f32,
        args: Vec<EventArg>,
    ) -> Result<(), EventError> {
        self.post_event(owner, def, sec_to_ms(seconds), args)
    }

    pub fn cancel_events(&mut self, owner: ObjectId, def: &EventDef) -> usize {
        self.events.cancel(owner, def)
    }

    /// Sends `activate(activator)` to `target`.
    pub fn activate(&mut self, target: ObjectId, activator: Option<ObjectId>) -> Result<(), EventError> {
        self.post_event(target, &EV_ACTIVATE, 0, vec![EventArg::Object(activator)])
    }

    /// Subtracts health from a damageable object; a kill is delivered as
    /// `<killed>`. Returns whether damage was taken.
    pub fn damage(&mut self, target: ObjectId, attacker: Option<ObjectId>, amount: i32) -> bool {
        let Some(slot) = self.objects.get_mut(&target) else {
            return false;
        };
        if !slot.base.take_damage {
            return false;
        }
        slot.base.health -= amount;
        if slot.base.health <= 0 {
            let args = vec![EventArg::Object(attacker), EventArg::Int(amount)];
            if let Err(e) = self.post_event(target, &EV_KILLED, 0, args) {
                tracing::error!(%target, error = %e, "kill delivery failed");
            }
        }
        true
    }

    /// Fires every event due at the current time that was queued before
    /// this pass began.
    fn service_events(&mut self) {
        let now = self.clock.time_ms();
        let cutoff = self.events.next_seq();
        while let Some((_, event)) = self.events.pop_due(now, cutoff) {
            self.deliver(event);
        }
    }

    fn deliver(&mut self, event: PendingEvent) {
        let PendingEvent { owner, def, args } = event;
        if !self.objects.contains_key(&owner) {
            return;
        }
        if self.is_executing(owner) {
            self.events.push(self.clock.time_ms(), PendingEvent { owner, def, args });
            return;
        }
        tracing::debug!(%owner, event = def.name, "dispatch");

        if def.is(&EV_REMOVE) {
            self.remove(owner);
            return;
        }
        if def.is(&EV_POSTSPAWN) {
            if let Some(Err(e)) = self.with_behavior(owner, |b, ctx| b.post_spawn(ctx)) {
                tracing::error!(%owner, error = %e, "post-spawn failed; removing object");
                self.remove(owner);
                self.spawn_failures.push((owner, e));
            }
            return;
        }
        if def.is(&EV_FIND_TARGETS) {
            self.resolve_targets(owner);
        }

        let activator = args.first().and_then(EventArg::as_object);
        let damage = args.get(1).and_then(EventArg::as_int).unwrap_or(0);
        let result = self.with_behavior(owner, |b, ctx| -> Result<(), BehaviorError> {
            if def.is(&EV_ACTIVATE) {
                b.activate(ctx, activator)
            } else if def.is(&EV_KILLED) {
                b.killed(ctx, activator, damage)
            } else if def.is(&EV_FIND_TARGETS) {
                b.find_targets(ctx)
            } else {
                if !b.handle_event(ctx, def, &args)? {
                    tracing::debug!(owner = %ctx.id(), event = def.name, "unhandled event");
                }
                Ok(())
            }
        });
        if let Some(Err(e)) = result {
            tracing::error!(%owner, event = def.name, error = %e, "event handler failed");
            self.become_inactive(owner, ActivationMask::THINK);
        }
    }

    fn resolve_targets(&mut self, owner: ObjectId) {
        let Some(base) = self.object(owner) else {
            return;
        };
        let mut targets = Vec::new();
        for name in base.target_names() {
            match self.names.get(&name) {
                Some(id) if !targets.contains(id) => targets.push(*id),
                Some(_) => {}
                None => tracing::warn!(%owner, target = %name, "target not found"),
            }
        }
        if let Some(slot) = self.objects.get_mut(&owner) {
            slot.base.targets = targets;
        }
    }

    /// Deterministic FNV-1a hash of the simulation state, in canonical
    /// (BTreeMap) order.
    pub fn state_hash(&self) -> u64 {
        let mut h: u64 = 0xcbf2_9ce4_8422_2325;
        let mix = |h: &mut u64, bytes: &[u8]| {
            for &b in bytes {
                *h ^= b as u64;
                *h = h.wrapping_mul(0x0100_0000_01b3);
            }
        };
        mix(&mut h, &self.clock.tick().to_le_bytes());
        mix(&mut h, &self.random.word_pos().to_le_bytes());
        mix(&mut h, &self.next_id.to_le_bytes());
        for slot in self.objects.values() {
            let base = &slot.base;
            mix(&mut h, &base.id.raw().to_le_bytes());
            mix(&mut h, base.class.as_bytes());
            mix(&mut h, &[base.mask.bits(), u8::from(base.hidden), u8::from(base.take_damage)]);
            mix(&mut h, &base.health.to_le_bytes());
            for parm in base.render.shader_parms {
                mix(&mut h, &parm.to_le_bytes());
            }
            for target in &base.targets {
                mix(&mut h, &target.raw().to_le_bytes());
            }
            if let Some(state) = base.body.and_then(|b| self.physics.body_state(b)) {
                for v in state.origin.to_array() {
                    mix(&mut h, &v.to_le_bytes());
                }
                for v in state.rotation.to_array() {
                    mix(&mut h, &v.to_le_bytes());
                }
            }
        }
        for (time, event) in self.events.iter() {
            mix(&mut h, &time.to_le_bytes());
            mix(&mut h, &event.owner.raw().to_le_bytes());
            mix(&mut h, event.def.name.as_bytes());
        }
        h
    }
}

/// Physics body for a freshly spawned object, from its configuration.
fn body_desc(id: ObjectId, args: &SpawnArgs) -> BodyDesc {
    let mut axis = angles_to_axis(args.get_angles("angles", Vec3::ZERO));
    if !args.has("angles") {
        if let Some(yaw) = args.find_float("angle") {
            axis = angles_to_axis(Vec3::new(0.0, yaw, 0.0));
        }
    }
    let bounds = match (args.find_vector("mins"), args.find_vector("maxs")) {
        (Some(min), Some(max)) => Aabb::new(min, max),
        _ => match args.find_float("size") {
            Some(size) => Aabb::cube(size * 0.5),
            None => Aabb::cube(8.0),
        },
    };
    let mass = args.get_float("mass", 0.0);
    let contents = if args.get_bool("trigger", false) {
        CONTENTS_TRIGGER
    } else if args.get_bool("solid", true) {
        CONTENTS_SOLID
    } else {
        0
    };
    BodyDesc {
        owner: Some(id),
        origin: args.get_vector("origin", Vec3::ZERO),
        axis,
        bounds,
        mass,
        contents,
        clip_mask: MASK_SOLID,
        gravity: mass > 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::ArgKind;
    use crate::registry::ClassInfo;
    use simkit_persist::{ArchiveError, RestoreReader, SaveWriter};

    static EV_PING: EventDef = EventDef::new("ping", &[ArgKind::Int]);
    static EV_ECHO: EventDef = EventDef::new("echo", &[]);
    static RECORDER_EVENTS: &[&EventDef] = &[&EV_PING, &EV_ECHO];

    /// Records what happens to it, and can be told to misbehave.
    #[derive(Debug, Default)]
    struct Recorder {
        log: Vec<String>,
        thinks: u32,
        fail_think: bool,
        echo_depth: u32,
    }

    impl Behavior for Recorder {
        fn spawn(&mut self, ctx: &mut Ctx<'_>) -> Result<(), SpawnError> {
            if ctx.args().get_bool("fail", false) {
                return Err(SpawnError::invalid(ctx.base(), "asked to fail"));
            }
            self.fail_think = ctx.args().get_bool("fail_think", false);
            if ctx.args().get_bool("think", false) {
                ctx.become_active(ActivationMask::THINK);
            }
            Ok(())
        }

        fn think(&mut self, ctx: &mut Ctx<'_>) -> Result<(), BehaviorError> {
            self.thinks += 1;
            if self.fail_think {
                return Err(BehaviorError::Failed("boom".into()));
            }
            if ctx.args().get_bool("wake_targets", false) {
                for t in ctx.base().targets.clone() {
                    ctx.post_to(t, &EV_ECHO, 0, vec![])?;
                }
            }
            if ctx.args().get_bool("suicide", false) {
                ctx.remove_self();
                ctx.update_visuals();
            }
            Ok(())
        }

        fn activate(&mut self, ctx: &mut Ctx<'_>, activator: Option<ObjectId>) -> Result<(), BehaviorError> {
            self.log.push(format!("activate {activator:?}"));
            if ctx.args().get_bool("relay", false) {
                ctx.activate_targets(Some(ctx.id()));
            }
            Ok(())
        }

        fn handle_event(
            &mut self,
            ctx: &mut Ctx<'_>,
            event: &'static EventDef,
            args: &[EventArg],
        ) -> Result<bool, BehaviorError> {
            if event.is(&EV_PING) {
                self.log.push(format!("ping {:?} at {}", args[0], ctx.time_ms()));
                if args[0].as_int().is_some_and(|v| v < 0) {
                    return Err(BehaviorError::Failed("negative ping".into()));
                }
                return Ok(true);
            }
            if event.is(&EV_ECHO) {
                self.echo_depth += 1;
                self.log.push("echo".into());
                // Re-posting to ourselves while running must not recurse.
                ctx.post(&EV_ECHO, 0, vec![])?;
                ctx.become_active(ActivationMask::THINK);
                return Ok(true);
            }
            Ok(false)
        }

        fn save(&self, w: &mut SaveWriter) {
            w.write_u64(u64::from(self.thinks));
        }

        fn restore(&mut self, _base: &ObjectBase, r: &mut RestoreReader) -> Result<(), ArchiveError> {
            self.thinks = r.read_u32()?;
            Ok(())
        }
    }

    fn recorder_factory() -> Box<dyn Behavior> {
        Box::new(Recorder::default())
    }

    fn classes() -> Arc<ClassRegistry> {
        let mut r = ClassRegistry::new();
        r.register(ClassInfo {
            name: "recorder",
            factory: recorder_factory,
            events: RECORDER_EVENTS,
            field_set: None,
        });
        Arc::new(r)
    }

    fn world() -> World {
        World::new(WorldConfig::default(), classes())
    }

    fn recorder(world: &World, id: ObjectId) -> String {
        format!("{:?}", world.behavior(id).expect("recorder"))
    }

    #[test]
    fn world_starts_empty() {
        let w = world();
        assert_eq!(w.tick(), 0);
        assert_eq!(w.object_count(), 0);
        assert_eq!(w.pending_event_count(), 0);
    }

    #[test]
    fn ids_are_serial_and_never_reused() {
        let mut w = world();
        let a = w.spawn("recorder", SpawnArgs::new()).unwrap();
        let b = w.spawn("recorder", SpawnArgs::new()).unwrap();
        assert!(b > a);
        w.remove(a);
        let c = w.spawn("recorder", SpawnArgs::new()).unwrap();
        assert!(c > b);
    }

    #[test]
    fn unknown_class_is_a_spawn_error() {
        let mut w = world();
        assert!(matches!(w.spawn("nope", SpawnArgs::new()), Err(SpawnError::UnknownClass(_))));
    }

    #[test]
    fn failed_spawn_leaves_nothing_behind() {
        let mut w = world();
        let err = w.spawn("recorder", SpawnArgs::from_pairs([("fail", "1")]));
        assert!(err.is_err());
        assert_eq!(w.object_count(), 0);
        assert_eq!(w.pending_event_count(), 0);
        assert!(w.physics().bodies_touching(&Aabb::cube(1e6), simkit_physics::MASK_ALL).is_empty());
    }

    #[test]
    fn thinking_object_runs_once_per_tick() {
        let mut w = world();
        let id = w.spawn("recorder", SpawnArgs::from_pairs([("think", "1")])).unwrap();
        w.run_frames(3);
        assert!(recorder(&w, id).contains("thinks: 3"));
    }

    #[test]
    fn handler_error_deactivates_the_subsystem() {
        let mut w = world();
        let id = w
            .spawn("recorder", SpawnArgs::from_pairs([("think", "1"), ("fail_think", "1")]))
            .unwrap();
        w.run_frames(3);
        assert!(recorder(&w, id).contains("thinks: 1"));
        assert!(w.mask_of(id).is_empty());
        assert_eq!(w.active_ids().count(), 0);
    }

    #[test]
    fn failing_event_handler_stops_think_but_not_the_frame() {
        let mut w = world();
        let a = w.spawn("recorder", SpawnArgs::from_pairs([("think", "1")])).unwrap();
        let b = w.spawn("recorder", SpawnArgs::from_pairs([("think", "1")])).unwrap();
        w.post_event(a, &EV_PING, 0, vec![EventArg::Int(-1)]).unwrap();
        w.post_event(b, &EV_PING, 0, vec![EventArg::Int(5)]).unwrap();
        w.post_event(a, &EV_PING, 50, vec![EventArg::Int(3)]).unwrap();

        w.run_frame();
        assert!(!w.mask_of(a).contains(ActivationMask::THINK));
        assert!(w.mask_of(b).contains(ActivationMask::THINK));
        assert!(recorder(&w, b).contains("ping Int(5)"));
        assert!(recorder(&w, b).contains("thinks: 1"));

        w.run_frames(5);
        assert_eq!(w.active_ids().collect::<Vec<_>>(), vec![b]);
        assert!(recorder(&w, b).contains("thinks: 6"));
        // Still alive and still receiving events.
        assert!(recorder(&w, a).contains("ping Int(3)"));
    }

    #[test]
    fn timed_event_fires_at_its_tick() {
        let mut w = World::new(WorldConfig { msec_per_tick: 10, ..WorldConfig::default() }, classes());
        let id = w.spawn("recorder", SpawnArgs::new()).unwrap();
        w.post_event(id, &EV_PING, 30, vec![EventArg::Int(7)]).unwrap();
        w.run_frames(2);
        assert!(!recorder(&w, id).contains("ping"));
        w.run_frame();
        assert!(recorder(&w, id).contains("ping Int(7) at 30"));
    }

    #[test]
    fn seconds_delay_converts_to_ms() {
        let mut w = World::new(WorldConfig { msec_per_tick: 10, ..WorldConfig::default() }, classes());
        let id = w.spawn("recorder", SpawnArgs::new()).unwrap();
        w.run_frame();
        w.post_event_sec(id, &EV_PING, 0.05, vec![EventArg::Int(2)]).unwrap();
        let (due, _) = w.pending_events().next().unwrap();
        assert_eq!(due, w.time_ms() + 50);
    }

    #[test]
    fn signature_mismatch_is_rejected_at_post() {
        let mut w = world();
        let id = w.spawn("recorder", SpawnArgs::new()).unwrap();
        let err = w.post_event(id, &EV_PING, 10, vec![EventArg::Float(1.0)]);
        assert!(matches!(err, Err(EventError::SignatureMismatch { .. })));
        assert!(!w.has_pending(id, &EV_PING));
    }

    #[test]
    fn unregistered_event_is_rejected() {
        static EV_STRAY: EventDef = EventDef::new("stray", &[]);
        let mut w = world();
        let id = w.spawn("recorder", SpawnArgs::new()).unwrap();
        assert!(matches!(w.post_event(id, &EV_STRAY, 0, vec![]), Err(EventError::UnknownEvent(_))));
    }

    #[test]
    fn zero_delay_is_synchronous() {
        let mut w = world();
        let id = w.spawn("recorder", SpawnArgs::new()).unwrap();
        w.activate(id, None).unwrap();
        assert!(recorder(&w, id).contains("activate None"));
    }

    #[test]
    fn self_repost_with_zero_delay_is_bounded() {
        let mut w = world();
        let id = w.spawn("recorder", SpawnArgs::new()).unwrap();
        w.post_event(id, &EV_ECHO, 0, vec![]).unwrap();
        // One synchronous delivery; the re-post waits for the next pass.
        assert!(recorder(&w, id).contains("echo_depth: 1"));
        assert!(w.has_pending(id, &EV_ECHO));
        w.run_frame();
        assert!(recorder(&w, id).contains("echo_depth: 2"));
    }

    #[test]
    fn relay_cycle_terminates() {
        let mut w = world();
        let a = w
            .spawn("recorder", SpawnArgs::from_pairs([("name", "a"), ("target", "b"), ("relay", "1")]))
            .unwrap();
        let b = w
            .spawn("recorder", SpawnArgs::from_pairs([("name", "b"), ("target", "a"), ("relay", "1")]))
            .unwrap();
        w.run_frame();
        assert_eq!(w.object(a).unwrap().targets, vec![b]);
        w.activate(a, None).unwrap();
        // a -> b synchronously, b -> a queued because a is running.
        assert!(recorder(&w, b).contains(&format!("activate Some({a:?})")));
        assert!(w.has_pending(a, &EV_ACTIVATE));
    }

    #[test]
    fn events_die_with_their_owner() {
        let mut w = world();
        let id = w.spawn("recorder", SpawnArgs::new()).unwrap();
        w.post_event(id, &EV_PING, 50, vec![EventArg::Int(1)]).unwrap();
        assert!(w.remove(id));
        assert_eq!(w.pending_event_count(), 0);
        assert!(w.post_event(id, &EV_PING, 0, vec![EventArg::Int(1)]).is_ok());
    }

    #[test]
    fn self_removal_is_deferred_until_the_hook_returns() {
        let mut w = world();
        let id = w
            .spawn("recorder", SpawnArgs::from_pairs([("think", "1"), ("suicide", "1")]))
            .unwrap();
        w.run_frame();
        assert!(w.object(id).is_none());
        assert!(w.take_visual_updates().is_empty());
    }

    #[test]
    fn removal_drops_target_references() {
        let mut w = world();
        let a = w.spawn("recorder", SpawnArgs::from_pairs([("target", "b")])).unwrap();
        let b = w.spawn("recorder", SpawnArgs::from_pairs([("name", "b")])).unwrap();
        w.run_frame();
        assert_eq!(w.object(a).unwrap().targets, vec![b]);
        w.remove(b);
        assert!(w.object(a).unwrap().targets.is_empty());
        assert!(w.find_by_name("b").is_none());
    }

    #[test]
    fn object_woken_mid_tick_waits_for_next_tick() {
        let mut w = world();
        let a = w
            .spawn("recorder", SpawnArgs::from_pairs([("think", "1"), ("wake_targets", "1"), ("target", "b")]))
            .unwrap();
        let b = w.spawn("recorder", SpawnArgs::from_pairs([("name", "b")])).unwrap();
        w.run_frame();
        assert!(recorder(&w, a).contains("thinks: 1"));
        assert!(recorder(&w, b).contains("thinks: 0"));
        w.run_frame();
        assert!(recorder(&w, b).contains("thinks: 1"));
    }

    #[test]
    fn visual_updates_are_queued_once_and_drained() {
        let mut w = world();
        let id = w.spawn("recorder", SpawnArgs::new()).unwrap();
        w.become_active(id, ActivationMask::VISUALS);
        w.run_frame();
        assert_eq!(w.take_visual_updates(), vec![id]);
        assert!(w.mask_of(id).is_empty());
        w.run_frame();
        assert!(w.take_visual_updates().is_empty());
    }

    #[test]
    fn physics_only_object_does_not_drift() {
        let mut w = world();
        let id = w
            .spawn("recorder", SpawnArgs::from_pairs([("origin", "10 20 30")]))
            .unwrap();
        w.become_active(id, ActivationMask::PHYSICS);
        let body = w.object(id).unwrap().body.unwrap();
        w.run_frames(10);
        assert_eq!(w.mask_of(id), ActivationMask::PHYSICS);
        assert_eq!(w.physics().origin(body), Some(Vec3::new(10.0, 20.0, 30.0)));
    }

    #[test]
    fn damage_kills_only_damageable_objects() {
        let mut w = world();
        let id = w.spawn("recorder", SpawnArgs::from_pairs([("health", "5")])).unwrap();
        assert!(!w.damage(id, None, 10));
        assert_eq!(w.object(id).unwrap().health, 5);
    }

    #[test]
    fn state_hash_is_deterministic() {
        let run = || {
            let mut w = world();
            w.spawn("recorder", SpawnArgs::from_pairs([("think", "1")])).unwrap();
            w.spawn("recorder", SpawnArgs::from_pairs([("origin", "1 2 3")])).unwrap();
            w.run_frames(5);
            w.state_hash()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn level_load_resolves_targets_before_first_tick() {
        let level = LevelDef::from_yaml_str(
            "entities:\n  - class: recorder\n    args: { name: a, target: b }\n  - class: recorder\n    args: { name: b }\n",
        )
        .unwrap();
        let mut w = world();
        let ids = w.load_level(&level).unwrap();
        assert_eq!(w.tick(), 0);
        assert_eq!(w.object(ids[0]).unwrap().targets, vec![ids[1]]);
        assert_eq!(w.pending_event_count(), 0);
    }

    #[test]
    fn unload_resets_context_but_not_ids() {
        let mut w = world();
        let first = w.spawn("recorder", SpawnArgs::from_pairs([("think", "1")])).unwrap();
        w.run_frames(3);
        w.post_event(first, &EV_PING, 100, vec![EventArg::Int(1)]).unwrap();
        w.unload_level();
        assert_eq!((w.tick(), w.object_count(), w.pending_event_count()), (0, 0, 0));
        assert_eq!(w.active_ids().count(), 0);
        let next = w.spawn("recorder", SpawnArgs::new()).unwrap();
        assert!(next > first);
    }
}
