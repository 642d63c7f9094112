//! Kinematic helpers layered over an external rigid-body solver.
//!
//! # Invariants
//! - Behaviors see the solver only through [`PhysicsWorld`].
//! - Helpers compute forces, impulses and aim directions; integration stays
//!   with the solver.
//! - Every stochastic choice draws from the caller's [`simkit_common::SimRandom`].

pub mod bounds;
pub mod extrapolate;
pub mod force_field;
pub mod simple;
pub mod spring;
pub mod trajectory;
pub mod world;

pub use bounds::Aabb;
pub use extrapolate::{Curve, Extrapolate};
pub use force_field::{ApplyMode, FieldShape, ForceField};
pub use simple::SimplePhysics;
pub use spring::{Spring, SpringEnd};
pub use trajectory::{Aim, ballistics, predict_trajectory};
pub use world::{
    BodyDesc, BodyId, BodyState, CONTENTS_BODY, CONTENTS_CORPSE, CONTENTS_MOVEABLE,
    CONTENTS_SOLID, CONTENTS_TRIGGER, MASK_ALL, MASK_SHOT, MASK_SOLID, PhysicsWorld, Trace,
};
