//! Level object classes built on the kernel's [`Behavior`] trait.
//!
//! # Invariants
//! - A class touches another object only through events, activation and
//!   read-only queries; the physics collaborator is the one shared surface.
//! - Every class saves and restores its fields in the same order.
//! - Replicated classes write exactly the fields of their field set.
//!
//! [`Behavior`]: simkit_kernel::Behavior

use std::sync::Arc;

use simkit_kernel::ClassRegistry;

pub mod activator;
pub mod actors;
pub mod beam;
pub mod damagable;
pub mod earthquake;
pub mod emitter;
pub mod explosion;
pub mod force_field;
pub mod moveable;
pub mod phantom;
pub mod radio_chatter;
pub mod shaking;
pub mod smoke;
pub mod splat;
pub mod spring;
pub mod static_mesh;

#[cfg(test)]
pub(crate) mod testing;

/// Registers every class in this crate.
pub fn register_all(registry: &mut ClassRegistry) {
    registry.register(activator::class());
    registry.register(actors::actor_class());
    registry.register(actors::player_class());
    registry.register(beam::class());
    registry.register(damagable::class());
    registry.register(earthquake::class());
    registry.register(emitter::class());
    registry.register(explosion::class());
    registry.register(force_field::class());
    registry.register(moveable::class());
    registry.register(phantom::class());
    registry.register(radio_chatter::class());
    registry.register(shaking::class());
    registry.register(smoke::class());
    registry.register(splat::class());
    registry.register(spring::class());
    registry.register(static_mesh::class());
}

/// A shared registry holding every class.
pub fn class_registry() -> Arc<ClassRegistry> {
    let mut registry = ClassRegistry::new();
    register_all(&mut registry);
    Arc::new(registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_class_is_registered() {
        let registry = class_registry();
        for name in [
            "func_activator",
            "func_beam",
            "func_damagable",
            "func_earthquake",
            "func_emitter",
            "func_explosion",
            "func_forcefield",
            "func_moveable",
            "func_phantom_objects",
            "func_radio_chatter",
            "func_shaking",
            "func_smoke",
            "func_splat",
            "func_spring",
            "func_static",
            "info_actor",
            "info_player",
        ] {
            assert!(registry.get(name).is_some(), "{name} missing");
        }
        assert_eq!(registry.len(), 17);
    }

    #[test]
    fn field_set_ids_are_unique() {
        let sets = class_registry().field_sets();
        for set in [&static_mesh::STATIC_FIELDS, &emitter::EMITTER_FIELDS, &beam::BEAM_FIELDS] {
            assert_eq!(sets.get(set.id).map(|s| s.name), Some(set.name));
        }
    }
}
