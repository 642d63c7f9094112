use simkit_common::{ObjectId, SpawnArgs, WorldConfig};
use simkit_kernel::World;

/// A world with every class and a 10 ms tick.
pub fn world() -> World {
    let config = WorldConfig {
        msec_per_tick: 10,
        ..WorldConfig::default()
    };
    World::new(config, crate::class_registry())
}

/// Spawns and services the post-spawn events, as a level load would.
pub fn spawn(world: &mut World, class: &str, pairs: &[(&str, &str)]) -> ObjectId {
    let id = world
        .spawn(class, SpawnArgs::from_pairs(pairs.iter().copied()))
        .unwrap_or_else(|e| panic!("spawn {class}: {e}"));
    world.run_frame();
    id
}

/// Spawns a group that links to itself, then runs one frame so targets and
/// post-spawn links resolve together.
pub fn spawn_all(world: &mut World, entities: &[(&str, &[(&str, &str)])]) -> Vec<ObjectId> {
    let ids = entities
        .iter()
        .map(|(class, pairs)| {
            world
                .spawn(class, SpawnArgs::from_pairs(pairs.iter().copied()))
                .unwrap_or_else(|e| panic!("spawn {class}: {e}"))
        })
        .collect();
    world.run_frame();
    ids
}

pub fn dump(world: &World, id: ObjectId) -> String {
    format!("{:?}", world.behavior(id).expect("behavior"))
}
