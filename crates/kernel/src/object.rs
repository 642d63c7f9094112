use glam::Vec3;
use std::ops::BitOr;

use simkit_common::{ObjectId, RenderState, SpawnArgs};
use simkit_physics::BodyId;

use crate::schedule::ActivationMask;

/// Capabilities an object answers yes to. Other objects query these instead
/// of knowing concrete classes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Capabilities(u32);

impl Capabilities {
    pub const NONE: Self = Self(0);
    pub const PLAYER: Self = Self(1 << 0);
    pub const ACTOR: Self = Self(1 << 1);
    pub const MOVEABLE: Self = Self(1 << 2);
    pub const BEAM: Self = Self(1 << 3);
    pub const DAMAGABLE: Self = Self(1 << 4);

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn from_bits(bits: u32) -> Self {
        Self(bits & 0b1_1111)
    }

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for Capabilities {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Kernel-owned state shared by every object regardless of class.
#[derive(Debug, Clone)]
pub struct ObjectBase {
    pub id: ObjectId,
    pub class: String,
    pub name: String,
    pub args: SpawnArgs,
    pub(crate) mask: ActivationMask,
    /// Weak; ids that no longer resolve are skipped on use.
    pub targets: Vec<ObjectId>,
    pub hidden: bool,
    pub health: i32,
    pub take_damage: bool,
    pub render: RenderState,
    pub body: Option<BodyId>,
    pub capabilities: Capabilities,
    pub eye_offset: Vec3,
}

impl ObjectBase {
    pub fn new(id: ObjectId, class: &str, name: String, args: SpawnArgs) -> Self {
        let mut render = RenderState::default();
        render.model = args.get_string("model", "").to_string();
        render.set_color(
            args.get_vector("_color", Vec3::ONE)
                .extend(args.get_float("shaderParm3", 1.0)),
        );
        Self {
            id,
            class: class.to_string(),
            health: args.get_int("health", 0),
            name,
            mask: ActivationMask::EMPTY,
            targets: Vec::new(),
            hidden: false,
            take_damage: false,
            render,
            body: None,
            capabilities: Capabilities::NONE,
            eye_offset: Vec3::ZERO,
            args,
        }
    }

    pub fn mask(&self) -> ActivationMask {
        self.mask
    }

    pub fn is_active(&self, flags: ActivationMask) -> bool {
        self.mask.intersects(flags)
    }

    pub fn has_capability(&self, cap: Capabilities) -> bool {
        self.capabilities.contains(cap)
    }

    /// Names from every `target*` key, in key order.
    pub fn target_names(&self) -> Vec<String> {
        self.args
            .matching_prefix("target")
            .filter(|(_, v)| !v.is_empty())
            .map(|(_, v)| v.to_string())
            .collect()
    }
}
