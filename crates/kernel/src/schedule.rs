use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitAnd, BitOr, Not};

/// Per-object set of subsystems that need work every tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActivationMask(u8);

impl ActivationMask {
    pub const EMPTY: Self = Self(0);
    pub const PHYSICS: Self = Self(1 << 0);
    pub const THINK: Self = Self(1 << 1);
    pub const PARTICLES: Self = Self(1 << 2);
    pub const VISUALS: Self = Self(1 << 3);
    pub const ALL: Self = Self(0b1111);

    /// Dispatch order within one object's turn.
    pub const ORDER: [Self; 4] = [Self::PHYSICS, Self::THINK, Self::PARTICLES, Self::VISUALS];

    pub fn bits(self) -> u8 {
        self.0
    }

    /// Unknown bits are dropped.
    pub fn from_bits_truncate(bits: u8) -> Self {
        Self(bits & Self::ALL.0)
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::PHYSICS => "physics",
            Self::THINK => "think",
            Self::PARTICLES => "particles",
            Self::VISUALS => "visuals",
            _ => "mixed",
        }
    }
}

impl BitOr for ActivationMask {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitAnd for ActivationMask {
    type Output = Self;
    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl Not for ActivationMask {
    type Output = Self;
    fn not(self) -> Self {
        Self(!self.0 & Self::ALL.0)
    }
}

impl fmt::Display for ActivationMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("-");
        }
        let names: Vec<&str> = Self::ORDER
            .iter()
            .filter(|flag| self.contains(**flag))
            .map(|flag| flag.name())
            .collect();
        f.write_str(&names.join("|"))
    }
}
