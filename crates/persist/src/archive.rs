//! Symmetric field codec for save games.
//!
//! An archive is a CBOR array `[magic, format_version, build, body]` where
//! `body` is itself an array of values. Every field keeps its CBOR type, so a
//! reader that asks for a float where an int was written gets a typed error
//! instead of reinterpreting bytes.
//!
//! Nested records (`begin_record` / `end_record`) bound each object's state.
//! Inside a record, an older archive may simply have fewer fields; the
//! `read_*_or` accessors return the caller's default once the record is
//! exhausted. Leaving a record with unread fields is a format error.

use ciborium::value::{Integer, Value};
use glam::{Vec3, Vec4};
use simkit_common::ObjectId;

pub const ARCHIVE_MAGIC: &str = "SKSV";
pub const ARCHIVE_FORMAT_VERSION: u32 = 2;
/// Oldest format version this reader can still interpret. Layout changes
/// inside object records are keyed on the build number instead.
pub const MIN_ARCHIVE_FORMAT_VERSION: u32 = 2;

/// Errors from the save-game codec.
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("CBOR serialization error: {0}")]
    CborEncode(String),
    #[error("CBOR deserialization error: {0}")]
    CborDecode(String),
    #[error("not a save archive")]
    BadMagic,
    #[error("unsupported archive format v{found} (supported v{min}..=v{max})")]
    UnsupportedVersion { found: u32, min: u32, max: u32 },
    #[error("field {index}: expected {expected}, found {found}")]
    TypeMismatch {
        index: usize,
        expected: &'static str,
        found: &'static str,
    },
    #[error("read past the end of a record at field {index}")]
    UnexpectedEnd { index: usize },
    #[error("{remaining} unread field(s) left in record")]
    TrailingFields { remaining: usize },
    #[error("array length mismatch: expected {expected}, found {found}")]
    LengthMismatch { expected: usize, found: usize },
    #[error("field {index}: value out of range")]
    OutOfRange { index: usize },
    #[error("end_record without matching begin_record")]
    UnbalancedRecord,
}

/// Header fields read back from an archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveHeader {
    pub format_version: u32,
    pub build: u32,
}

/// Writes fields in order. The matching [`RestoreReader`] must visit them in
/// the same order.
#[derive(Debug)]
pub struct SaveWriter {
    build: u32,
    stack: Vec<Vec<Value>>,
}

impl SaveWriter {
    pub fn new(build: u32) -> Self {
        Self {
            build,
            stack: vec![Vec::new()],
        }
    }

    pub fn build(&self) -> u32 {
        self.build
    }

    fn push(&mut self, value: Value) {
        if let Some(top) = self.stack.last_mut() {
            top.push(value);
        }
    }

    pub fn write_bool(&mut self, v: bool) {
        self.push(Value::Bool(v));
    }

    pub fn write_int(&mut self, v: i64) {
        self.push(Value::Integer(Integer::from(v)));
    }

    pub fn write_u64(&mut self, v: u64) {
        self.push(Value::Integer(Integer::from(v)));
    }

    /// Stored as two halves, high first.
    pub fn write_u128(&mut self, v: u128) {
        self.write_u64((v >> 64) as u64);
        self.write_u64(v as u64);
    }

    pub fn write_float(&mut self, v: f32) {
        self.push(Value::Float(f64::from(v)));
    }

    pub fn write_string(&mut self, v: &str) {
        self.push(Value::Text(v.to_string()));
    }

    pub fn write_vec3(&mut self, v: Vec3) {
        for c in v.to_array() {
            self.write_float(c);
        }
    }

    pub fn write_vec4(&mut self, v: Vec4) {
        for c in v.to_array() {
            self.write_float(c);
        }
    }

    /// A weak reference: the raw id, or null when absent.
    pub fn write_object(&mut self, v: Option<ObjectId>) {
        match v {
            Some(id) => self.write_u64(id.raw()),
            None => self.push(Value::Null),
        }
    }

    pub fn write_len(&mut self, len: usize) {
        self.write_u64(len as u64);
    }

    pub fn write_floats(&mut self, values: &[f32]) {
        self.write_len(values.len());
        for &v in values {
            self.write_float(v);
        }
    }

    pub fn begin_record(&mut self) {
        self.stack.push(Vec::new());
    }

    pub fn end_record(&mut self) {
        if self.stack.len() > 1 {
            if let Some(fields) = self.stack.pop() {
                self.push(Value::Array(fields));
            }
        }
    }

    /// Closes any open records and encodes the archive.
    pub fn into_bytes(mut self) -> Result<Vec<u8>, ArchiveError> {
        while self.stack.len() > 1 {
            self.end_record();
        }
        let body = self.stack.pop().unwrap_or_default();
        let archive = Value::Array(vec![
            Value::Text(ARCHIVE_MAGIC.to_string()),
            Value::Integer(Integer::from(ARCHIVE_FORMAT_VERSION)),
            Value::Integer(Integer::from(self.build)),
            Value::Array(body),
        ]);
        let mut buf = Vec::new();
        ciborium::into_writer(&archive, &mut buf)
            .map_err(|e| ArchiveError::CborEncode(e.to_string()))?;
        Ok(buf)
    }
}

#[derive(Debug)]
struct Frame {
    fields: Vec<Value>,
    pos: usize,
}

/// Reads fields back in the order a [`SaveWriter`] wrote them.
#[derive(Debug)]
pub struct RestoreReader {
    header: ArchiveHeader,
    stack: Vec<Frame>,
}

impl RestoreReader {
    pub fn from_bytes(data: &[u8]) -> Result<Self, ArchiveError> {
        let value: Value =
            ciborium::from_reader(data).map_err(|e| ArchiveError::CborDecode(e.to_string()))?;
        let Value::Array(parts) = value else {
            return Err(ArchiveError::BadMagic);
        };
        let mut parts = parts.into_iter();
        match parts.next() {
            Some(Value::Text(magic)) if magic == ARCHIVE_MAGIC => {}
            _ => return Err(ArchiveError::BadMagic),
        }
        let format_version = header_u32(parts.next())?;
        if !(MIN_ARCHIVE_FORMAT_VERSION..=ARCHIVE_FORMAT_VERSION).contains(&format_version) {
            return Err(ArchiveError::UnsupportedVersion {
                found: format_version,
                min: MIN_ARCHIVE_FORMAT_VERSION,
                max: ARCHIVE_FORMAT_VERSION,
            });
        }
        let build = header_u32(parts.next())?;
        let Some(Value::Array(body)) = parts.next() else {
            return Err(ArchiveError::BadMagic);
        };
        Ok(Self {
            header: ArchiveHeader {
                format_version,
                build,
            },
            stack: vec![Frame {
                fields: body,
                pos: 0,
            }],
        })
    }

    pub fn header(&self) -> ArchiveHeader {
        self.header
    }

    pub fn build(&self) -> u32 {
        self.header.build
    }

    /// Fields left in the current record.
    pub fn remaining(&self) -> usize {
        self.stack
            .last()
            .map(|f| f.fields.len().saturating_sub(f.pos))
            .unwrap_or(0)
    }

    /// Index of the next field in the current record.
    pub fn position(&self) -> usize {
        self.index()
    }

    fn index(&self) -> usize {
        self.stack.last().map(|f| f.pos).unwrap_or(0)
    }

    fn next(&mut self) -> Result<Value, ArchiveError> {
        let index = self.index();
        let frame = self
            .stack
            .last_mut()
            .ok_or(ArchiveError::UnexpectedEnd { index })?;
        let slot = frame
            .fields
            .get_mut(frame.pos)
            .ok_or(ArchiveError::UnexpectedEnd { index })?;
        frame.pos += 1;
        Ok(std::mem::replace(slot, Value::Null))
    }

    pub fn read_bool(&mut self) -> Result<bool, ArchiveError> {
        let index = self.index();
        match self.next()? {
            Value::Bool(b) => Ok(b),
            other => Err(mismatch(index, "bool", &other)),
        }
    }

    pub fn read_int(&mut self) -> Result<i64, ArchiveError> {
        let index = self.index();
        match self.next()? {
            Value::Integer(i) => i64::try_from(i128::from(i)).map_err(|_| ArchiveError::OutOfRange { index }),
            other => Err(mismatch(index, "int", &other)),
        }
    }

    pub fn read_u64(&mut self) -> Result<u64, ArchiveError> {
        let index = self.index();
        match self.next()? {
            Value::Integer(i) => u64::try_from(i128::from(i)).map_err(|_| ArchiveError::OutOfRange { index }),
            other => Err(mismatch(index, "uint", &other)),
        }
    }

    pub fn read_u32(&mut self) -> Result<u32, ArchiveError> {
        let index = self.index();
        let v = self.read_u64()?;
        u32::try_from(v).map_err(|_| ArchiveError::OutOfRange { index })
    }

    pub fn read_i32(&mut self) -> Result<i32, ArchiveError> {
        let index = self.index();
        let v = self.read_int()?;
        i32::try_from(v).map_err(|_| ArchiveError::OutOfRange { index })
    }

    pub fn read_u128(&mut self) -> Result<u128, ArchiveError> {
        let hi = self.read_u64()?;
        let lo = self.read_u64()?;
        Ok((u128::from(hi) << 64) | u128::from(lo))
    }

    pub fn read_float(&mut self) -> Result<f32, ArchiveError> {
        let index = self.index();
        match self.next()? {
            Value::Float(f) => Ok(f as f32),
            other => Err(mismatch(index, "float", &other)),
        }
    }

    pub fn read_string(&mut self) -> Result<String, ArchiveError> {
        let index = self.index();
        match self.next()? {
            Value::Text(s) => Ok(s),
            other => Err(mismatch(index, "string", &other)),
        }
    }

    pub fn read_vec3(&mut self) -> Result<Vec3, ArchiveError> {
        Ok(Vec3::new(self.read_float()?, self.read_float()?, self.read_float()?))
    }

    pub fn read_vec4(&mut self) -> Result<Vec4, ArchiveError> {
        Ok(Vec4::new(
            self.read_float()?,
            self.read_float()?,
            self.read_float()?,
            self.read_float()?,
        ))
    }

    pub fn read_object(&mut self) -> Result<Option<ObjectId>, ArchiveError> {
        let index = self.index();
        match self.next()? {
            Value::Null => Ok(None),
            Value::Integer(i) => u64::try_from(i128::from(i))
                .map(|raw| Some(ObjectId(raw)))
                .map_err(|_| ArchiveError::OutOfRange { index }),
            other => Err(mismatch(index, "object", &other)),
        }
    }

    pub fn read_len(&mut self) -> Result<usize, ArchiveError> {
        let index = self.index();
        let v = self.read_u64()?;
        usize::try_from(v).map_err(|_| ArchiveError::OutOfRange { index })
    }

    /// A length that must match the structure being restored into.
    pub fn read_len_exact(&mut self, expected: usize) -> Result<usize, ArchiveError> {
        let found = self.read_len()?;
        if found != expected {
            return Err(ArchiveError::LengthMismatch { expected, found });
        }
        Ok(found)
    }

    pub fn read_floats(&mut self) -> Result<Vec<f32>, ArchiveError> {
        let len = self.read_len()?;
        let mut out = Vec::with_capacity(len.min(self.remaining()));
        for _ in 0..len {
            out.push(self.read_float()?);
        }
        Ok(out)
    }

    /// Reads into a fixed-size array; the saved length must match.
    pub fn read_floats_into(&mut self, out: &mut [f32]) -> Result<(), ArchiveError> {
        self.read_len_exact(out.len())?;
        for slot in out.iter_mut() {
            *slot = self.read_float()?;
        }
        Ok(())
    }

    pub fn read_bool_or(&mut self, default: bool) -> Result<bool, ArchiveError> {
        if self.remaining() == 0 { Ok(default) } else { self.read_bool() }
    }

    pub fn read_int_or(&mut self, default: i64) -> Result<i64, ArchiveError> {
        if self.remaining() == 0 { Ok(default) } else { self.read_int() }
    }

    pub fn read_i32_or(&mut self, default: i32) -> Result<i32, ArchiveError> {
        if self.remaining() == 0 { Ok(default) } else { self.read_i32() }
    }

    pub fn read_u64_or(&mut self, default: u64) -> Result<u64, ArchiveError> {
        if self.remaining() == 0 { Ok(default) } else { self.read_u64() }
    }

    pub fn read_float_or(&mut self, default: f32) -> Result<f32, ArchiveError> {
        if self.remaining() == 0 { Ok(default) } else { self.read_float() }
    }

    pub fn read_vec3_or(&mut self, default: Vec3) -> Result<Vec3, ArchiveError> {
        if self.remaining() == 0 { Ok(default) } else { self.read_vec3() }
    }

    pub fn read_vec4_or(&mut self, default: Vec4) -> Result<Vec4, ArchiveError> {
        if self.remaining() == 0 { Ok(default) } else { self.read_vec4() }
    }

    pub fn read_string_or(&mut self, default: &str) -> Result<String, ArchiveError> {
        if self.remaining() == 0 {
            Ok(default.to_string())
        } else {
            self.read_string()
        }
    }

    pub fn read_object_or(&mut self, default: Option<ObjectId>) -> Result<Option<ObjectId>, ArchiveError> {
        if self.remaining() == 0 { Ok(default) } else { self.read_object() }
    }

    pub fn begin_record(&mut self) -> Result<(), ArchiveError> {
        let index = self.index();
        match self.next()? {
            Value::Array(fields) => {
                self.stack.push(Frame { fields, pos: 0 });
                Ok(())
            }
            other => Err(mismatch(index, "record", &other)),
        }
    }

    pub fn end_record(&mut self) -> Result<(), ArchiveError> {
        if self.stack.len() <= 1 {
            return Err(ArchiveError::UnbalancedRecord);
        }
        let remaining = self.remaining();
        if remaining > 0 {
            return Err(ArchiveError::TrailingFields { remaining });
        }
        self.stack.pop();
        Ok(())
    }
}

fn header_u32(value: Option<Value>) -> Result<u32, ArchiveError> {
    match value {
        Some(Value::Integer(i)) => {
            u32::try_from(i128::from(i)).map_err(|_| ArchiveError::OutOfRange { index: 0 })
        }
        _ => Err(ArchiveError::BadMagic),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Integer(_) => "int",
        Value::Bytes(_) => "bytes",
        Value::Float(_) => "float",
        Value::Text(_) => "string",
        Value::Bool(_) => "bool",
        Value::Null => "null",
        Value::Tag(..) => "tag",
        Value::Array(_) => "record",
        Value::Map(_) => "map",
        _ => "unknown",
    }
}

fn mismatch(index: usize, expected: &'static str, found: &Value) -> ArchiveError {
    ArchiveError::TypeMismatch {
        index,
        expected,
        found: kind(found),
    }
}
