//! Time-parameterised value curves for kinematic movers.

use glam::Vec3;
use simkit_persist::{ArchiveError, RestoreReader, SaveWriter};
use std::f32::consts::{FRAC_1_SQRT_2, FRAC_PI_2};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Curve {
    None,
    Linear,
    AccelLinear,
    DecelLinear,
    AccelSine,
    DecelSine,
}

impl Curve {
    fn code(self) -> i64 {
        match self {
            Curve::None => 0,
            Curve::Linear => 1,
            Curve::AccelLinear => 2,
            Curve::DecelLinear => 3,
            Curve::AccelSine => 4,
            Curve::DecelSine => 5,
        }
    }

    fn from_code(code: i64) -> Self {
        match code {
            1 => Curve::Linear,
            2 => Curve::AccelLinear,
            3 => Curve::DecelLinear,
            4 => Curve::AccelSine,
            5 => Curve::DecelSine,
            _ => Curve::None,
        }
    }
}

/// A curve starting at `start_time` (ms) lasting `duration` (ms). Without
/// `no_stop` the value freezes once the duration has elapsed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extrapolate {
    pub curve: Curve,
    pub no_stop: bool,
    pub start_time: f32,
    pub duration: f32,
    pub start_value: Vec3,
    pub base_speed: Vec3,
    pub speed: Vec3,
}

impl Default for Extrapolate {
    fn default() -> Self {
        Self {
            curve: Curve::None,
            no_stop: false,
            start_time: 0.0,
            duration: 0.0,
            start_value: Vec3::ZERO,
            base_speed: Vec3::ZERO,
            speed: Vec3::ZERO,
        }
    }
}

impl Extrapolate {
    pub fn new(
        curve: Curve,
        no_stop: bool,
        start_time: f32,
        duration: f32,
        start_value: Vec3,
        base_speed: Vec3,
        speed: Vec3,
    ) -> Self {
        Self {
            curve,
            no_stop,
            start_time,
            duration,
            start_value,
            base_speed,
            speed,
        }
    }

    /// A curve that holds `value` forever.
    pub fn hold(value: Vec3) -> Self {
        Self {
            start_value: value,
            ..Self::default()
        }
    }

    pub fn value_at(&self, time: f32) -> Vec3 {
        if time < self.start_time {
            return self.start_value;
        }
        let mut time = time;
        if !self.no_stop && time > self.start_time + self.duration {
            time = self.start_time + self.duration;
        }
        let elapsed = time - self.start_time;
        let seconds = self.duration * 0.001;
        match self.curve {
            Curve::None => self.start_value + self.base_speed * (elapsed * 0.001),
            Curve::Linear => self.start_value + (self.base_speed + self.speed) * (elapsed * 0.001),
            _ if self.duration <= 0.0 => self.start_value,
            Curve::AccelLinear => {
                let t = elapsed / self.duration;
                let s = 0.5 * t * t * seconds;
                self.start_value + self.base_speed * t + self.speed * s
            }
            Curve::DecelLinear => {
                let t = elapsed / self.duration;
                let s = (t - 0.5 * t * t) * seconds;
                self.start_value + self.base_speed * t + self.speed * s
            }
            Curve::AccelSine => {
                let t = elapsed / self.duration;
                let s = (1.0 - (t * FRAC_PI_2).cos()) * seconds * FRAC_1_SQRT_2;
                self.start_value + self.base_speed * t + self.speed * s
            }
            Curve::DecelSine => {
                let t = elapsed / self.duration;
                let s = (t * FRAC_PI_2).sin() * seconds * FRAC_1_SQRT_2;
                self.start_value + self.base_speed * t + self.speed * s
            }
        }
    }

    pub fn is_done(&self, time: f32) -> bool {
        !self.no_stop && self.curve != Curve::None && time >= self.start_time + self.duration
    }

    pub fn save(&self, w: &mut SaveWriter) {
        w.write_int(self.curve.code());
        w.write_bool(self.no_stop);
        w.write_float(self.start_time);
        w.write_float(self.duration);
        w.write_vec3(self.start_value);
        w.write_vec3(self.base_speed);
        w.write_vec3(self.speed);
    }

    pub fn restore(r: &mut RestoreReader) -> Result<Self, ArchiveError> {
        Ok(Self {
            curve: Curve::from_code(r.read_int()?),
            no_stop: r.read_bool()?,
            start_time: r.read_float()?,
            duration: r.read_float()?,
            start_value: r.read_vec3()?,
            base_speed: r.read_vec3()?,
            speed: r.read_vec3()?,
        })
    }
}
