//! Field precisions and their fixed-width encodings.

use glam::Vec4;

use crate::NetError;
use crate::bits::{BitReader, BitWriter};

/// Wire precision of one replicated field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldKind {
    Bool,
    /// Unsigned integer, clamped into `bits`.
    UInt { bits: u8 },
    /// Two's complement integer, clamped into `bits`.
    Int { bits: u8 },
    Float,
    /// Sign, biased exponent and truncated mantissa.
    ReducedFloat { exponent_bits: u8, mantissa_bits: u8 },
    /// Uniformly quantized over `[min, max]`.
    Quantized { min: f32, max: f32, bits: u8 },
    /// RGBA, eight bits per channel.
    Color,
}

/// A decoded or to-be-encoded field value. NaN floats compare equal to each
/// other, so an unchanged NaN is never resent.
#[derive(Debug, Clone, Copy)]
pub enum FieldValue {
    Bool(bool),
    Int(i64),
    Float(f32),
    Color(Vec4),
}

impl PartialEq for FieldValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (FieldValue::Bool(a), FieldValue::Bool(b)) => a == b,
            (FieldValue::Int(a), FieldValue::Int(b)) => a == b,
            (FieldValue::Float(a), FieldValue::Float(b)) => a == b || (a.is_nan() && b.is_nan()),
            (FieldValue::Color(a), FieldValue::Color(b)) => a == b,
            _ => false,
        }
    }
}

impl FieldValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            FieldValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f32> {
        match self {
            FieldValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_color(&self) -> Option<Vec4> {
        match self {
            FieldValue::Color(c) => Some(*c),
            _ => None,
        }
    }
}

/// A named field in a set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldDef {
    pub name: &'static str,
    pub kind: FieldKind,
}

pub const fn field(name: &'static str, kind: FieldKind) -> FieldDef {
    FieldDef { name, kind }
}

/// An ordered field declaration. The order is part of the wire format.
#[derive(Debug, PartialEq)]
pub struct FieldSet {
    pub id: u16,
    pub name: &'static str,
    pub fields: &'static [FieldDef],
}

impl FieldSet {
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Position of a field by name.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }
}

impl FieldKind {
    pub fn bit_width(&self) -> usize {
        match *self {
            FieldKind::Bool => 1,
            FieldKind::UInt { bits } | FieldKind::Int { bits } => usize::from(bits),
            FieldKind::Float => 32,
            FieldKind::ReducedFloat {
                exponent_bits,
                mantissa_bits,
            } => 1 + usize::from(exponent_bits) + usize::from(mantissa_bits),
            FieldKind::Quantized { bits, .. } => usize::from(bits),
            FieldKind::Color => 32,
        }
    }

    fn check(&self) -> Result<(), NetError> {
        let ok = match *self {
            FieldKind::UInt { bits } | FieldKind::Int { bits } => (1..=63).contains(&bits),
            FieldKind::ReducedFloat {
                exponent_bits,
                mantissa_bits,
            } => (2..=8).contains(&exponent_bits) && mantissa_bits <= 23,
            FieldKind::Quantized { min, max, bits } => {
                (1..=32).contains(&bits) && min.is_finite() && max.is_finite() && max > min
            }
            FieldKind::Bool | FieldKind::Float | FieldKind::Color => true,
        };
        if ok { Ok(()) } else { Err(NetError::BadFieldKind(*self)) }
    }

    /// The value a reader would decode after this value is written.
    pub fn quantize(&self, value: FieldValue) -> Result<FieldValue, NetError> {
        let mut w = BitWriter::new();
        self.encode(value, &mut w)?;
        let mut r = BitReader::with_bit_len(w.as_bytes(), w.bit_len());
        self.decode(&mut r)
    }

    pub fn encode(&self, value: FieldValue, w: &mut BitWriter) -> Result<(), NetError> {
        self.check()?;
        match (*self, value) {
            (FieldKind::Bool, FieldValue::Bool(b)) => w.write_bit(b),
            (FieldKind::UInt { bits }, FieldValue::Int(v)) => {
                let max = ((1u64 << bits) - 1) as i64;
                w.write_bits(v.clamp(0, max) as u64, bits);
            }
            (FieldKind::Int { bits }, FieldValue::Int(v)) => {
                let max = (1i64 << (bits - 1)) - 1;
                let min = -(1i64 << (bits - 1));
                w.write_bits(v.clamp(min, max) as u64, bits);
            }
            (FieldKind::Float, FieldValue::Float(f)) => {
                let f = if f.is_nan() { f32::NAN } else { f };
                w.write_bits(u64::from(f.to_bits()), 32);
            }
            (
                FieldKind::ReducedFloat {
                    exponent_bits,
                    mantissa_bits,
                },
                FieldValue::Float(f),
            ) => {
                let packed = float_to_bits(f, exponent_bits, mantissa_bits);
                w.write_bits(packed, 1 + exponent_bits + mantissa_bits);
            }
            (FieldKind::Quantized { min, max, bits }, FieldValue::Float(f)) => {
                let steps = ((1u64 << bits) - 1) as f64;
                let t = if f.is_nan() {
                    0.0
                } else {
                    ((f64::from(f) - f64::from(min)) / (f64::from(max) - f64::from(min))).clamp(0.0, 1.0)
                };
                w.write_bits((t * steps).round() as u64, bits);
            }
            (FieldKind::Color, FieldValue::Color(c)) => {
                for channel in c.to_array() {
                    let byte = (channel.clamp(0.0, 1.0) * 255.0).round() as u64;
                    w.write_bits(byte, 8);
                }
            }
            (kind, value) => return Err(NetError::KindMismatch { kind, value }),
        }
        Ok(())
    }

    pub fn decode(&self, r: &mut BitReader<'_>) -> Result<FieldValue, NetError> {
        self.check()?;
        Ok(match *self {
            FieldKind::Bool => FieldValue::Bool(r.read_bit()?),
            FieldKind::UInt { bits } => FieldValue::Int(r.read_bits(bits)? as i64),
            FieldKind::Int { bits } => {
                let raw = r.read_bits(bits)?;
                let shift = 64 - u32::from(bits);
                FieldValue::Int(((raw << shift) as i64) >> shift)
            }
            FieldKind::Float => FieldValue::Float(f32::from_bits(r.read_bits(32)? as u32)),
            FieldKind::ReducedFloat {
                exponent_bits,
                mantissa_bits,
            } => {
                let packed = r.read_bits(1 + exponent_bits + mantissa_bits)?;
                FieldValue::Float(bits_to_float(packed, exponent_bits, mantissa_bits))
            }
            FieldKind::Quantized { min, max, bits } => {
                let steps = ((1u64 << bits) - 1) as f64;
                let q = r.read_bits(bits)? as f64;
                let v = f64::from(min) + (q / steps) * (f64::from(max) - f64::from(min));
                FieldValue::Float(v as f32)
            }
            FieldKind::Color => {
                let mut c = [0.0f32; 4];
                for channel in &mut c {
                    *channel = r.read_bits(8)? as f32 / 255.0;
                }
                FieldValue::Color(Vec4::from_array(c))
            }
        })
    }
}

/// Packs a float as `sign | exponent | mantissa` with the given widths.
/// Values below the smallest exponent flush to zero; values above the
/// largest saturate.
pub fn float_to_bits(f: f32, exponent_bits: u8, mantissa_bits: u8) -> u64 {
    let max_exp = (1i32 << (exponent_bits - 1)) - 1;
    let sign_shift = exponent_bits + mantissa_bits;
    if f == 0.0 || f.is_nan() {
        return 0;
    }
    let bits = f.to_bits();
    let sign = u64::from(bits >> 31);
    let mut exponent = ((bits >> 23) & 0xff) as i32 - 127;
    let mut mantissa = u64::from(bits & 0x7f_ffff) >> (23 - mantissa_bits);
    if exponent <= -max_exp {
        return 0;
    }
    if exponent > max_exp || f.is_infinite() {
        exponent = max_exp;
        mantissa = (1u64 << mantissa_bits) - 1;
    }
    let biased = (exponent + max_exp) as u64;
    (sign << sign_shift) | (biased << mantissa_bits) | mantissa
}

pub fn bits_to_float(packed: u64, exponent_bits: u8, mantissa_bits: u8) -> f32 {
    let max_exp = (1i32 << (exponent_bits - 1)) - 1;
    let sign = (packed >> (exponent_bits + mantissa_bits)) & 1;
    let biased = ((packed >> mantissa_bits) & ((1u64 << exponent_bits) - 1)) as i32;
    let mantissa = packed & ((1u64 << mantissa_bits) - 1);
    if biased == 0 {
        return 0.0;
    }
    let exponent = biased - max_exp;
    let bits = ((sign as u32) << 31)
        | (((exponent + 127) as u32) << 23)
        | ((mantissa as u32) << (23 - mantissa_bits));
    f32::from_bits(bits)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(kind: FieldKind, value: FieldValue) -> FieldValue {
        kind.quantize(value).unwrap()
    }

    #[test]
    fn integers_clamp_to_width() {
        assert_eq!(roundtrip(FieldKind::UInt { bits: 4 }, FieldValue::Int(20)), FieldValue::Int(15));
        assert_eq!(roundtrip(FieldKind::UInt { bits: 4 }, FieldValue::Int(-3)), FieldValue::Int(0));
        assert_eq!(roundtrip(FieldKind::Int { bits: 4 }, FieldValue::Int(-5)), FieldValue::Int(-5));
        assert_eq!(roundtrip(FieldKind::Int { bits: 4 }, FieldValue::Int(-100)), FieldValue::Int(-8));
    }

    #[test]
    fn reduced_float_keeps_leading_precision() {
        let kind = FieldKind::ReducedFloat {
            exponent_bits: 5,
            mantissa_bits: 10,
        };
        assert_eq!(kind.bit_width(), 16);
        let FieldValue::Float(v) = roundtrip(kind, FieldValue::Float(-3.1416)) else {
            panic!("expected float");
        };
        assert!((v + 3.1416).abs() < 0.01, "{v}");
        assert_eq!(roundtrip(kind, FieldValue::Float(0.0)), FieldValue::Float(0.0));
        // Far below the smallest exponent flushes to zero.
        assert_eq!(roundtrip(kind, FieldValue::Float(1e-9)), FieldValue::Float(0.0));
        // Far above saturates rather than wrapping.
        let FieldValue::Float(big) = roundtrip(kind, FieldValue::Float(1e9)) else {
            panic!("expected float");
        };
        assert!(big > 60000.0);
    }

    #[test]
    fn quantized_range() {
        let kind = FieldKind::Quantized {
            min: -1.0,
            max: 1.0,
            bits: 8,
        };
        let FieldValue::Float(v) = roundtrip(kind, FieldValue::Float(0.5)) else {
            panic!("expected float");
        };
        assert!((v - 0.5).abs() < 1.0 / 127.0);
        assert_eq!(roundtrip(kind, FieldValue::Float(5.0)), FieldValue::Float(1.0));
    }

    #[test]
    fn color_is_eight_bits_per_channel() {
        let FieldValue::Color(c) =
            roundtrip(FieldKind::Color, FieldValue::Color(Vec4::new(1.0, 0.5, 0.0, 2.0)))
        else {
            panic!("expected color");
        };
        assert_eq!(c.x, 1.0);
        assert!((c.y - 128.0 / 255.0).abs() < 1e-6);
        assert_eq!(c.z, 0.0);
        assert_eq!(c.w, 1.0);
    }

    #[test]
    fn nan_has_one_wire_form() {
        let payload_nan = f32::from_bits(0x7fc0_1234);
        let negative_nan = f32::from_bits(0xffc0_0000);
        let a = roundtrip(FieldKind::Float, FieldValue::Float(payload_nan));
        let b = roundtrip(FieldKind::Float, FieldValue::Float(negative_nan));
        assert_eq!(a.as_float().map(f32::to_bits), Some(f32::NAN.to_bits()));
        assert_eq!(a, b);
        assert_ne!(a, FieldValue::Float(0.0));
        // Every other kind maps NaN to a number.
        let q = FieldKind::Quantized { min: -1.0, max: 1.0, bits: 8 };
        assert_eq!(roundtrip(q, FieldValue::Float(f32::NAN)), FieldValue::Float(-1.0));
    }

    #[test]
    fn wrong_value_type_is_rejected() {
        let mut w = BitWriter::new();
        assert!(matches!(
            FieldKind::Bool.encode(FieldValue::Float(1.0), &mut w),
            Err(NetError::KindMismatch { .. })
        ));
        assert!(matches!(
            FieldKind::UInt { bits: 0 }.encode(FieldValue::Int(0), &mut w),
            Err(NetError::BadFieldKind(_))
        ));
    }
}
