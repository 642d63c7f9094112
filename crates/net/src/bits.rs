use crate::NetError;

/// Growable bit writer. Bits are packed LSB first within each byte.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BitWriter {
    bytes: Vec<u8>,
    bit_len: usize,
}

impl BitWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bit_len(&self) -> usize {
        self.bit_len
    }

    pub fn write_bit(&mut self, bit: bool) {
        let byte = self.bit_len / 8;
        if byte == self.bytes.len() {
            self.bytes.push(0);
        }
        if bit {
            self.bytes[byte] |= 1 << (self.bit_len % 8);
        }
        self.bit_len += 1;
    }

    /// Writes the low `bits` bits of `value`.
    pub fn write_bits(&mut self, value: u64, bits: u8) {
        let mut v = value;
        for _ in 0..bits {
            self.write_bit(v & 1 != 0);
            v >>= 1;
        }
    }

    /// Appends every bit of another writer.
    pub fn append(&mut self, other: &BitWriter) {
        let mut reader = BitReader::with_bit_len(&other.bytes, other.bit_len);
        while let Ok(bit) = reader.read_bit() {
            self.write_bit(bit);
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Reader over a bit-packed buffer.
#[derive(Debug, Clone)]
pub struct BitReader<'a> {
    data: &'a [u8],
    bit_len: usize,
    pos: usize,
}

impl<'a> BitReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self::with_bit_len(data, data.len() * 8)
    }

    pub fn with_bit_len(data: &'a [u8], bit_len: usize) -> Self {
        Self {
            data,
            bit_len: bit_len.min(data.len() * 8),
            pos: 0,
        }
    }

    pub fn remaining(&self) -> usize {
        self.bit_len - self.pos
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn read_bit(&mut self) -> Result<bool, NetError> {
        if self.pos >= self.bit_len {
            return Err(NetError::UnexpectedEnd {
                needed: 1,
                remaining: 0,
            });
        }
        let bit = self.data[self.pos / 8] & (1 << (self.pos % 8)) != 0;
        self.pos += 1;
        Ok(bit)
    }

    pub fn read_bits(&mut self, bits: u8) -> Result<u64, NetError> {
        if usize::from(bits) > self.remaining() {
            return Err(NetError::UnexpectedEnd {
                needed: usize::from(bits),
                remaining: self.remaining(),
            });
        }
        let mut value = 0u64;
        for i in 0..bits {
            if self.read_bit()? {
                value |= 1 << i;
            }
        }
        Ok(value)
    }

    /// Splits off the next `bits` bits into their own buffer.
    pub fn read_chunk(&mut self, bits: usize) -> Result<BitWriter, NetError> {
        if bits > self.remaining() {
            return Err(NetError::UnexpectedEnd {
                needed: bits,
                remaining: self.remaining(),
            });
        }
        let mut out = BitWriter::new();
        for _ in 0..bits {
            out.write_bit(self.read_bit()?);
        }
        Ok(out)
    }
}
