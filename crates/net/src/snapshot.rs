//! Whole-field-set snapshots.
//!
//! The writer always serializes every field of the set in declaration order.
//! The "delta" lives above the wire: a reader compares what it decoded with
//! what it applied last time and reports whether anything changed.

use crate::NetError;
use crate::bits::{BitReader, BitWriter};
use crate::field::{FieldSet, FieldValue};

pub fn write_snapshot(set: &FieldSet, values: &[FieldValue], w: &mut BitWriter) -> Result<(), NetError> {
    if values.len() != set.len() {
        return Err(NetError::ValueCount {
            set: set.id,
            expected: set.len(),
            found: values.len(),
        });
    }
    for (def, value) in set.fields.iter().zip(values) {
        def.kind.encode(*value, w)?;
    }
    Ok(())
}

/// Decodes a full set into a scratch copy. On any error `applied` is left
/// untouched; otherwise it is replaced and the result says whether any field
/// differed from its previous contents.
pub fn read_snapshot(
    set: &FieldSet,
    r: &mut BitReader<'_>,
    applied: &mut Vec<FieldValue>,
) -> Result<bool, NetError> {
    let mut scratch = Vec::with_capacity(set.len());
    for def in set.fields {
        scratch.push(def.kind.decode(r)?);
    }
    let changed = *applied != scratch;
    *applied = scratch;
    Ok(changed)
}

/// Values as a reader would see them, for comparing against acked copies.
pub fn quantize_values(set: &FieldSet, values: &[FieldValue]) -> Result<Vec<FieldValue>, NetError> {
    if values.len() != set.len() {
        return Err(NetError::ValueCount {
            set: set.id,
            expected: set.len(),
            found: values.len(),
        });
    }
    set.fields
        .iter()
        .zip(values)
        .map(|(def, v)| def.kind.quantize(*v))
        .collect()
}

/// Bits a full snapshot of `set` occupies.
pub fn snapshot_bits(set: &FieldSet) -> usize {
    set.fields.iter().map(|f| f.kind.bit_width()).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{FieldKind, field};
    use proptest::prelude::*;

    static TEST_SET: FieldSet = FieldSet {
        id: 1,
        name: "test",
        fields: &[
            field("hidden", FieldKind::Bool),
            field("mode", FieldKind::UInt { bits: 3 }),
            field("x", FieldKind::Float),
            field(
                "alpha",
                FieldKind::Quantized {
                    min: 0.0,
                    max: 1.0,
                    bits: 8,
                },
            ),
        ],
    };

    fn values(hidden: bool, mode: i64, x: f32, alpha: f32) -> Vec<FieldValue> {
        vec![
            FieldValue::Bool(hidden),
            FieldValue::Int(mode),
            FieldValue::Float(x),
            FieldValue::Float(alpha),
        ]
    }

    fn encode(v: &[FieldValue]) -> BitWriter {
        let mut w = BitWriter::new();
        write_snapshot(&TEST_SET, v, &mut w).unwrap();
        w
    }

    #[test]
    fn first_read_is_a_change_second_is_not() {
        let w = encode(&values(true, 2, 1.5, 1.0));
        assert_eq!(w.bit_len(), snapshot_bits(&TEST_SET));
        let mut applied = Vec::new();
        let mut r = BitReader::with_bit_len(w.as_bytes(), w.bit_len());
        assert!(read_snapshot(&TEST_SET, &mut r, &mut applied).unwrap());
        let mut r = BitReader::with_bit_len(w.as_bytes(), w.bit_len());
        assert!(!read_snapshot(&TEST_SET, &mut r, &mut applied).unwrap());
    }

    #[test]
    fn truncated_snapshot_leaves_applied_untouched() {
        let w = encode(&values(false, 1, 2.0, 0.0));
        let mut applied = values(true, 7, 9.0, 1.0);
        let before = applied.clone();
        let mut r = BitReader::with_bit_len(w.as_bytes(), w.bit_len() - 3);
        assert!(read_snapshot(&TEST_SET, &mut r, &mut applied).is_err());
        assert_eq!(applied, before);
    }

    #[test]
    fn wrong_value_count_is_rejected() {
        let mut w = BitWriter::new();
        assert!(matches!(
            write_snapshot(&TEST_SET, &[FieldValue::Bool(true)], &mut w),
            Err(NetError::ValueCount { expected: 4, found: 1, .. })
        ));
    }

    proptest! {
        /// `changed` is false exactly when every decoded field equals the
        /// previously applied one.
        #[test]
        fn prop_changed_iff_any_field_differs(
            a in (any::<bool>(), 0i64..8, -1000.0f32..1000.0, 0u8..=255),
            b in (any::<bool>(), 0i64..8, -1000.0f32..1000.0, 0u8..=255),
        ) {
            let va = values(a.0, a.1, a.2, f32::from(a.3) / 255.0);
            let vb = values(b.0, b.1, b.2, f32::from(b.3) / 255.0);
            let mut applied = Vec::new();

            let wa = encode(&va);
            let mut r = BitReader::with_bit_len(wa.as_bytes(), wa.bit_len());
            read_snapshot(&TEST_SET, &mut r, &mut applied).unwrap();
            let first = applied.clone();

            let wb = encode(&vb);
            let mut r = BitReader::with_bit_len(wb.as_bytes(), wb.bit_len());
            let changed = read_snapshot(&TEST_SET, &mut r, &mut applied).unwrap();
            prop_assert_eq!(changed, first != applied);
            prop_assert_eq!(
                changed,
                quantize_values(&TEST_SET, &va).unwrap() != quantize_values(&TEST_SET, &vb).unwrap()
            );
        }
    }
}
