use std::fmt;

use glam::Vec3;
use simkit_common::ObjectId;
use simkit_kernel::{ActivationMask, World};

/// World inspector for developer tooling.
///
/// Read-only queries against the world for debugging and the CLI.
pub struct WorldInspector;

impl WorldInspector {
    pub fn summary(world: &World) -> WorldSummary {
        WorldSummary {
            tick: world.tick(),
            time_ms: world.time_ms(),
            seed: world.random().seed(),
            object_count: world.object_count(),
            active_count: world.active_ids().count(),
            pending_events: world.pending_event_count(),
            state_hash: world.state_hash(),
        }
    }

    pub fn inspect_object(world: &World, id: ObjectId) -> Option<ObjectInfo> {
        let base = world.object(id)?;
        let origin = base.body.and_then(|b| world.physics().origin(b));
        Some(ObjectInfo {
            id,
            class: base.class.clone(),
            name: base.name.clone(),
            mask: base.mask(),
            hidden: base.hidden,
            health: base.health,
            origin,
            targets: base.targets.clone(),
            pending: Self::pending_for(world, Some(id)),
        })
    }

    /// All object ids in creation order.
    pub fn list_objects(world: &World) -> Vec<ObjectId> {
        world.objects().map(|b| b.id).collect()
    }

    /// Pending events, soonest first, optionally for one owner.
    pub fn pending_for(world: &World, owner: Option<ObjectId>) -> Vec<PendingInfo> {
        let now = world.time_ms();
        world
            .pending_events()
            .filter(|(_, e)| owner.is_none_or(|o| e.owner == o))
            .map(|(time, e)| PendingInfo {
                owner: e.owner,
                event: e.def.name,
                in_ms: time.saturating_sub(now),
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorldSummary {
    pub tick: u64,
    pub time_ms: u64,
    pub seed: u64,
    pub object_count: usize,
    pub active_count: usize,
    pub pending_events: usize,
    pub state_hash: u64,
}

impl fmt::Display for WorldSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "World: tick={} time={}ms seed={} objects={} active={} pending_events={} hash={:016x}",
            self.tick,
            self.time_ms,
            self.seed,
            self.object_count,
            self.active_count,
            self.pending_events,
            self.state_hash
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingInfo {
    pub owner: ObjectId,
    pub event: &'static str,
    pub in_ms: u64,
}

impl fmt::Display for PendingInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} in {}ms", self.owner, self.event, self.in_ms)
    }
}

/// Detailed info about a single object.
#[derive(Debug, Clone)]
pub struct ObjectInfo {
    pub id: ObjectId,
    pub class: String,
    pub name: String,
    pub mask: ActivationMask,
    pub hidden: bool,
    pub health: i32,
    pub origin: Option<Vec3>,
    pub targets: Vec<ObjectId>,
    pub pending: Vec<PendingInfo>,
}

impl fmt::Display for ObjectInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} '{}' mask={}", self.id, self.class, self.name, self.mask)?;
        if let Some(p) = self.origin {
            write!(f, " pos=({:.2}, {:.2}, {:.2})", p.x, p.y, p.z)?;
        }
        if self.hidden {
            f.write_str(" hidden")?;
        }
        write!(f, " health={}", self.health)?;
        if !self.targets.is_empty() {
            let names: Vec<String> = self.targets.iter().map(ToString::to_string).collect();
            write!(f, " targets=[{}]", names.join(", "))?;
        }
        for p in &self.pending {
            write!(f, "\n    {} in {}ms", p.event, p.in_ms)?;
        }
        Ok(())
    }
}
