//! The per-call view a behavior gets of its world.

use glam::{Mat3, Vec3};
use std::collections::BTreeMap;

use simkit_common::{ObjectId, SimRandom, SpawnArgs, angles_to_axis, ms_to_sec, sec_to_ms};
use simkit_physics::{Aabb, BodyId, PhysicsWorld};

use crate::event::{EV_ACTIVATE, EventArg, EventDef, EventError};
use crate::object::{Capabilities, ObjectBase};
use crate::schedule::ActivationMask;
use crate::world::{ObjectSlot, Role, World};

/// Read-only lookups over other objects, usable while physics is borrowed.
pub struct ObjectQuery<'a> {
    objects: &'a BTreeMap<ObjectId, ObjectSlot>,
}

impl<'a> ObjectQuery<'a> {
    pub(crate) fn new(objects: &'a BTreeMap<ObjectId, ObjectSlot>) -> Self {
        Self { objects }
    }

    pub fn base(&self, id: ObjectId) -> Option<&'a ObjectBase> {
        self.objects.get(&id).map(|s| &s.base)
    }

    /// Capability set of whichever object owns `body`.
    pub fn body_capabilities(&self, body: BodyId) -> Capabilities {
        self.objects
            .values()
            .find(|s| s.base.body == Some(body))
            .map(|s| s.base.capabilities)
            .unwrap_or(Capabilities::NONE)
    }

    pub fn body_owner(&self, body: BodyId) -> Option<ObjectId> {
        self.objects
            .values()
            .find(|s| s.base.body == Some(body))
            .map(|s| s.base.id)
    }
}

/// What replication gets to read about one object.
pub struct ObjectView<'a> {
    pub base: &'a ObjectBase,
    pub physics: &'a dyn PhysicsWorld,
    pub time_ms: u64,
}

impl ObjectView<'_> {
    pub fn origin(&self) -> Vec3 {
        self.base
            .body
            .and_then(|b| self.physics.origin(b))
            .unwrap_or_else(|| self.base.args.get_vector("origin", Vec3::ZERO))
    }

    pub fn axis(&self) -> Mat3 {
        self.base
            .body
            .and_then(|b| self.physics.axis(b))
            .unwrap_or(Mat3::IDENTITY)
    }
}

/// Handed to every behavior hook; `this` is the object being run.
pub struct Ctx<'w> {
    world: &'w mut World,
    this: ObjectId,
}

impl<'w> Ctx<'w> {
    pub(crate) fn new(world: &'w mut World, this: ObjectId) -> Self {
        Self { world, this }
    }

    pub fn id(&self) -> ObjectId {
        self.this
    }

    // An executing object's slot stays in the map until its handler returns,
    // so indexing by `this` cannot miss.
    pub fn base(&self) -> &ObjectBase {
        &self.world.objects[&self.this].base
    }

    pub fn base_mut(&mut self) -> &mut ObjectBase {
        match self.world.objects.get_mut(&self.this) {
            Some(slot) => &mut slot.base,
            None => unreachable!("executing object {} left the world", self.this),
        }
    }

    pub fn args(&self) -> &SpawnArgs {
        &self.base().args
    }

    pub fn name(&self) -> &str {
        &self.base().name
    }

    pub fn world(&self) -> &World {
        &*self.world
    }

    pub fn time_ms(&self) -> u64 {
        self.world.clock.time_ms()
    }

    pub fn time_sec(&self) -> f32 {
        ms_to_sec(self.time_ms() as i64)
    }

    pub fn tick(&self) -> u64 {
        self.world.clock.tick()
    }

    pub fn frame_seconds(&self) -> f32 {
        self.world.clock.frame_seconds()
    }

    pub fn random(&mut self) -> &mut SimRandom {
        &mut self.world.random
    }

    pub fn is_authority(&self) -> bool {
        self.world.role == Role::Authority
    }

    // --- scheduling

    pub fn become_active(&mut self, flags: ActivationMask) {
        self.world.become_active(self.this, flags);
    }

    pub fn become_inactive(&mut self, flags: ActivationMask) {
        self.world.become_inactive(self.this, flags);
    }

    pub fn is_active(&self, flags: ActivationMask) -> bool {
        self.base().is_active(flags)
    }

    // --- events

    pub fn post(&mut self, def: &'static EventDef, delay_ms: u64, args: Vec<EventArg>) -> Result<(), EventError> {
        self.world.post_event(self.this, def, delay_ms, args)
    }

    pub fn post_sec(&mut self, def: &'static EventDef, seconds: f32, args: Vec<EventArg>) -> Result<(), EventError> {
        self.post(def, sec_to_ms(seconds), args)
    }

    pub fn post_to(
        &mut self,
        owner: ObjectId,
        def: &'static EventDef,
        delay_ms: u64,
        args: Vec<EventArg>,
    ) -> Result<(), EventError> {
        self.world.post_event(owner, def, delay_ms, args)
    }

    pub fn cancel(&mut self, def: &EventDef) -> usize {
        self.world.cancel_events(self.this, def)
    }

    pub fn has_pending(&self, def: &EventDef) -> bool {
        self.world.has_pending(self.this, def)
    }

    pub fn activate(&mut self, target: ObjectId, activator: Option<ObjectId>) -> Result<(), EventError> {
        self.world.activate(target, activator)
    }

    /// Sends `activate(activator)` to every live target.
    pub fn activate_targets(&mut self, activator: Option<ObjectId>) {
        let targets = self.base().targets.clone();
        for target in targets {
            if !self.world.objects.contains_key(&target) {
                continue;
            }
            if let Err(e) = self.world.post_event(target, &EV_ACTIVATE, 0, vec![EventArg::Object(activator)]) {
                tracing::error!(object = %self.this, %target, error = %e, "activate failed");
            }
        }
    }

    /// Removal of the running object happens once its handler returns.
    pub fn remove_self(&mut self) {
        self.world.remove(self.this);
    }

    pub fn remove(&mut self, id: ObjectId) -> bool {
        self.world.remove(id)
    }

    // --- other objects

    pub fn object(&self, id: ObjectId) -> Option<&ObjectBase> {
        self.world.object(id)
    }

    pub fn find(&self, name: &str) -> Option<ObjectId> {
        self.world.find_by_name(name)
    }

    pub fn has_capability(&self, id: ObjectId, cap: Capabilities) -> bool {
        self.world
            .object(id)
            .is_some_and(|b| b.has_capability(cap))
    }

    pub fn objects_with(&self, cap: Capabilities) -> Vec<ObjectId> {
        self.world
            .objects
            .values()
            .filter(|s| s.base.has_capability(cap))
            .map(|s| s.base.id)
            .collect()
    }

    pub fn origin_of(&self, id: ObjectId) -> Option<Vec3> {
        let base = self.world.object(id)?;
        Some(
            base.body
                .and_then(|b| self.world.physics.origin(b))
                .unwrap_or_else(|| base.args.get_vector("origin", Vec3::ZERO)),
        )
    }

    /// Eye position for actors, origin for everything else.
    pub fn eye_of(&self, id: ObjectId) -> Option<Vec3> {
        let eye = self.world.object(id)?.eye_offset;
        self.origin_of(id).map(|o| o + eye)
    }

    pub fn damage(&mut self, target: ObjectId, amount: i32) -> bool {
        self.world.damage(target, Some(self.this), amount)
    }

    // --- physics

    pub fn body(&self) -> Option<BodyId> {
        self.base().body
    }

    pub fn physics(&mut self) -> &mut dyn PhysicsWorld {
        self.world.physics.as_mut()
    }

    pub fn physics_ref(&self) -> &dyn PhysicsWorld {
        self.world.physics.as_ref()
    }

    /// Physics, the random stream and object lookups at once.
    pub fn physics_split(&mut self) -> (&mut dyn PhysicsWorld, &mut SimRandom, ObjectQuery<'_>) {
        let World {
            physics,
            random,
            objects,
            ..
        } = &mut *self.world;
        (physics.as_mut(), random, ObjectQuery::new(objects))
    }

    pub fn origin(&self) -> Vec3 {
        self.origin_of(self.this).unwrap_or(Vec3::ZERO)
    }

    pub fn set_origin(&mut self, origin: Vec3) {
        if let Some(body) = self.body() {
            self.world.physics.set_origin(body, origin);
        }
    }

    pub fn axis(&self) -> Mat3 {
        self.body()
            .and_then(|b| self.world.physics.axis(b))
            .unwrap_or_else(|| angles_to_axis(self.args().get_angles("angles", Vec3::ZERO)))
    }

    pub fn set_axis(&mut self, axis: Mat3) {
        if let Some(body) = self.body() {
            self.world.physics.set_axis(body, axis);
        }
    }

    pub fn contents(&self) -> u32 {
        self.body().map(|b| self.world.physics.contents(b)).unwrap_or(0)
    }

    pub fn set_contents(&mut self, contents: u32) {
        if let Some(body) = self.body() {
            self.world.physics.set_contents(body, contents);
        }
    }

    /// World bounds of the object's body.
    pub fn abs_bounds(&self) -> Option<Aabb> {
        self.body().and_then(|b| self.world.physics.abs_bounds(b))
    }

    /// Integrates the object's body one frame. Returns whether it moved.
    pub fn run_physics(&mut self) -> bool {
        let Some(body) = self.body() else {
            return false;
        };
        let dt = self.frame_seconds();
        let moved = self.world.physics.run_body(body, dt);
        if moved {
            self.update_visuals();
        }
        moved
    }

    // --- visuals

    pub fn update_visuals(&mut self) {
        self.become_active(ActivationMask::VISUALS);
    }

    pub fn show(&mut self) {
        self.base_mut().hidden = false;
        self.update_visuals();
    }

    pub fn hide(&mut self) {
        self.base_mut().hidden = true;
        self.update_visuals();
    }

    pub fn is_hidden(&self) -> bool {
        self.base().hidden
    }
}
