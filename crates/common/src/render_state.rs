use glam::Vec4;
use serde::{Deserialize, Serialize};

pub const SHADERPARM_RED: usize = 0;
pub const SHADERPARM_GREEN: usize = 1;
pub const SHADERPARM_BLUE: usize = 2;
pub const SHADERPARM_ALPHA: usize = 3;
pub const SHADERPARM_TIMEOFFSET: usize = 4;
pub const SHADERPARM_DIVERSITY: usize = 5;
pub const SHADERPARM_MODE: usize = 7;
pub const SHADERPARM_PARTICLE_STOPTIME: usize = 8;
pub const SHADERPARM_BEAM_END_X: usize = 8;
pub const SHADERPARM_BEAM_END_Y: usize = 9;
pub const SHADERPARM_BEAM_END_Z: usize = 10;
pub const SHADERPARM_BEAM_WIDTH: usize = 11;

pub const MAX_SHADER_PARMS: usize = 12;

/// Opaque drawable state handed to the visual collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderState {
    pub model: String,
    pub shader_parms: [f32; MAX_SHADER_PARMS],
}

impl Default for RenderState {
    fn default() -> Self {
        let mut shader_parms = [0.0; MAX_SHADER_PARMS];
        shader_parms[SHADERPARM_RED] = 1.0;
        shader_parms[SHADERPARM_GREEN] = 1.0;
        shader_parms[SHADERPARM_BLUE] = 1.0;
        shader_parms[SHADERPARM_ALPHA] = 1.0;
        Self {
            model: String::new(),
            shader_parms,
        }
    }
}

impl RenderState {
    pub fn color(&self) -> Vec4 {
        Vec4::new(
            self.shader_parms[SHADERPARM_RED],
            self.shader_parms[SHADERPARM_GREEN],
            self.shader_parms[SHADERPARM_BLUE],
            self.shader_parms[SHADERPARM_ALPHA],
        )
    }

    pub fn set_color(&mut self, color: Vec4) {
        self.shader_parms[SHADERPARM_RED] = color.x;
        self.shader_parms[SHADERPARM_GREEN] = color.y;
        self.shader_parms[SHADERPARM_BLUE] = color.z;
        self.shader_parms[SHADERPARM_ALPHA] = color.w;
    }

    /// Out-of-range indices are ignored.
    pub fn set_parm(&mut self, index: usize, value: f32) {
        if let Some(slot) = self.shader_parms.get_mut(index) {
            *slot = value;
        }
    }

    pub fn parm(&self, index: usize) -> f32 {
        self.shader_parms.get(index).copied().unwrap_or(0.0)
    }
}
