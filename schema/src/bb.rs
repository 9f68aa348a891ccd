use std::fmt;
use std::str;

/// Widest varint the codec accepts. Ten bytes carry a full 64-bit value.
pub const MAX_VARINT_BYTES: usize = 10;

/// The 3-bit tag stored in the low bits of every field key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireType {
    Varint          = 0,
    Fixed64         = 1,
    LengthDelimited = 2,
}

impl WireType {
    pub fn from_bits(bits: u8) -> Option<WireType> {
        match bits {
            0 => Some(WireType::Varint),
            1 => Some(WireType::Fixed64),
            2 => Some(WireType::LengthDelimited),
            _ => None,
        }
    }
}

impl fmt::Display for WireType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            WireType::Varint => write!(f, "varint"),
            WireType::Fixed64 => write!(f, "fixed64"),
            WireType::LengthDelimited => write!(f, "length-delimited"),
        }
    }
}

/// Low-level read failures. The codec lifts these into `WireError::Malformed`
/// together with the type being decoded and the byte offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferError {
    Truncated { needed: usize, remaining: usize },
    VarintTooLong { max_bytes: usize },
    VarintOverflow,
    InvalidKey(u64),
    InvalidUtf8,
}

impl fmt::Display for BufferError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            BufferError::Truncated { needed, remaining } => {
                write!(f, "needed {} bytes but only {} remain", needed, remaining)
            }
            BufferError::VarintTooLong { max_bytes } => {
                write!(f, "varint continues past {} bytes", max_bytes)
            }
            BufferError::VarintOverflow => write!(f, "varint overflows 64 bits"),
            BufferError::InvalidKey(key) => write!(f, "invalid field key {:#x}", key),
            BufferError::InvalidUtf8 => write!(f, "text payload is not valid UTF-8"),
        }
    }
}

/// A byte buffer meant for reading.
///
/// Example usage:
///
/// ```
/// use vehicle_wire_schema::{ByteBuffer, WireType};
/// let mut bb = ByteBuffer::new(&[0x0a, 3, b'a', b'b', b'c']);
/// assert_eq!(bb.read_key(), Ok((1, WireType::LengthDelimited)));
/// assert_eq!(bb.read_string(), Ok("abc"));
/// assert!(bb.is_empty());
/// ```
///
pub struct ByteBuffer<'a> {
    data:             &'a [u8],
    index:            usize,
    base:             usize,
    max_varint_bytes: usize,
}

impl<'a> ByteBuffer<'a> {
    /// Create a new ByteBuffer that wraps the provided byte slice. The lifetime
    /// of the returned ByteBuffer must not outlive the lifetime of the byte
    /// slice.
    pub fn new(data: &'a [u8]) -> ByteBuffer<'a> {
        ByteBuffer {
            data,
            index: 0,
            base: 0,
            max_varint_bytes: MAX_VARINT_BYTES,
        }
    }

    /// Lowers the varint width limit. Values above `MAX_VARINT_BYTES` are
    /// clamped since no 64-bit value needs more.
    pub fn with_max_varint_bytes(mut self, max_bytes: usize) -> ByteBuffer<'a> {
        self.max_varint_bytes = max_bytes.clamp(1, MAX_VARINT_BYTES);
        self
    }

    /// Retrieves the underlying byte slice.
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Retrieves the current index into the underlying byte slice.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Absolute position of the cursor within the outermost buffer. Nested
    /// buffers returned by `read_length_delimited` keep counting from their
    /// parent so error offsets always refer to the original input.
    pub fn offset(&self) -> usize {
        self.base + self.index
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.index
    }

    pub fn is_empty(&self) -> bool {
        self.index >= self.data.len()
    }

    /// Try to read a byte starting at the current index.
    pub fn read_byte(&mut self) -> Result<u8, BufferError> {
        if self.index >= self.data.len() {
            Err(BufferError::Truncated { needed: 1, remaining: 0 })
        } else {
            let value = self.data[self.index];
            self.index += 1;
            Ok(value)
        }
    }

    /// Try to read `len` raw bytes starting at the current index.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], BufferError> {
        let remaining = self.remaining();
        if len > remaining {
            Err(BufferError::Truncated { needed: len, remaining })
        } else {
            let value = &self.data[self.index..self.index + len];
            self.index += len;
            Ok(value)
        }
    }

    /// Try to read a variable-length unsigned 64-bit integer starting at the
    /// current index.
    pub fn read_var_uint64(&mut self) -> Result<u64, BufferError> {
        let mut result: u64 = 0;
        let mut shift: u32 = 0;

        for i in 0..self.max_varint_bytes {
            let byte = self.read_byte()?;
            // The tenth byte only has room for bit 63
            if i == MAX_VARINT_BYTES - 1 && byte > 1 {
                return Err(BufferError::VarintOverflow);
            }
            result |= ((byte & 127) as u64) << shift;
            if (byte & 128) == 0 {
                return Ok(result);
            }
            shift += 7;
        }

        Err(BufferError::VarintTooLong { max_bytes: self.max_varint_bytes })
    }

    /// Try to read a zigzag-encoded signed 64-bit integer starting at the
    /// current index.
    pub fn read_var_int64(&mut self) -> Result<i64, BufferError> {
        let value = self.read_var_uint64()?;
        Ok(((value >> 1) as i64) ^ -((value & 1) as i64))
    }

    /// Varint booleans: zero is false, anything else is true.
    pub fn read_bool(&mut self) -> Result<bool, BufferError> {
        Ok(self.read_var_uint64()? != 0)
    }

    /// Try to read eight little-endian bytes.
    pub fn read_fixed64(&mut self) -> Result<u64, BufferError> {
        let bytes = self.read_bytes(8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(bytes);
        Ok(u64::from_le_bytes(raw))
    }

    /// Try to read a 64-bit float stored as its IEEE-754 bit pattern.
    pub fn read_double(&mut self) -> Result<f64, BufferError> {
        Ok(f64::from_bits(self.read_fixed64()?))
    }

    /// Try to read a field key, splitting it into the field id and wire type.
    pub fn read_key(&mut self) -> Result<(u32, WireType), BufferError> {
        let key = self.read_var_uint64()?;
        let wire_type = WireType::from_bits((key & 7) as u8).ok_or(BufferError::InvalidKey(key))?;
        let id = key >> 3;
        if id == 0 || id > u32::MAX as u64 {
            return Err(BufferError::InvalidKey(key));
        }
        Ok((id as u32, wire_type))
    }

    /// Try to read a length prefix and return its payload as a nested buffer.
    pub fn read_length_delimited(&mut self) -> Result<ByteBuffer<'a>, BufferError> {
        let len = self.read_var_uint64()?;
        let remaining = self.remaining();
        let len = usize::try_from(len).unwrap_or(usize::MAX);
        if len > remaining {
            return Err(BufferError::Truncated { needed: len, remaining });
        }
        let base = self.offset();
        let data = self.read_bytes(len)?;
        Ok(ByteBuffer {
            data,
            index: 0,
            base,
            max_varint_bytes: self.max_varint_bytes,
        })
    }

    /// Try to read a length-delimited UTF-8 string. The result aliases the
    /// underlying memory.
    pub fn read_string(&mut self) -> Result<&'a str, BufferError> {
        let payload = self.read_length_delimited()?;
        str::from_utf8(payload.data).map_err(|_| BufferError::InvalidUtf8)
    }

    /// Advances past one payload of the given wire type without decoding it.
    pub fn skip(&mut self, wire_type: WireType) -> Result<(), BufferError> {
        match wire_type {
            WireType::Varint => self.read_var_uint64().map(|_| ()),
            WireType::Fixed64 => self.read_bytes(8).map(|_| ()),
            WireType::LengthDelimited => self.read_length_delimited().map(|_| ()),
        }
    }
}

#[test]
fn read_byte() {
    let read = |bytes| ByteBuffer::new(bytes).read_byte();
    assert_eq!(read(&[]), Err(BufferError::Truncated { needed: 1, remaining: 0 }));
    assert_eq!(read(&[0]), Ok(0));
    assert_eq!(read(&[255]), Ok(255));
}

#[test]
fn read_bytes() {
    let mut bb = ByteBuffer::new(&[1, 2, 3, 4, 5]);
    assert_eq!(bb.read_bytes(3), Ok(vec![1, 2, 3].as_slice()));
    assert_eq!(bb.read_bytes(2), Ok(vec![4, 5].as_slice()));
    assert_eq!(bb.read_bytes(1), Err(BufferError::Truncated { needed: 1, remaining: 0 }));
}

#[test]
fn read_var_uint64() {
    let read = |bytes| ByteBuffer::new(bytes).read_var_uint64();
    assert_eq!(read(&[0]), Ok(0));
    assert_eq!(read(&[1]), Ok(1));
    assert_eq!(read(&[127]), Ok(127));
    assert_eq!(read(&[128, 1]), Ok(128));
    assert_eq!(read(&[172, 2]), Ok(300));
    assert_eq!(read(&[128]), Err(BufferError::Truncated { needed: 1, remaining: 0 }));
    assert_eq!(
        read(&[0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x01]),
        Ok(u64::MAX)
    );
    assert_eq!(
        read(&[0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0x02]),
        Err(BufferError::VarintOverflow)
    );
    assert_eq!(
        read(&[0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0x00]),
        Err(BufferError::VarintOverflow)
    );
}

#[test]
fn read_var_uint64_respects_width_limit() {
    let mut bb = ByteBuffer::new(&[128, 128, 1]).with_max_varint_bytes(2);
    assert_eq!(bb.read_var_uint64(), Err(BufferError::VarintTooLong { max_bytes: 2 }));

    let mut bb = ByteBuffer::new(&[128, 1]).with_max_varint_bytes(2);
    assert_eq!(bb.read_var_uint64(), Ok(128));
}

#[test]
fn read_var_int64() {
    let read = |bytes| ByteBuffer::new(bytes).read_var_int64();
    assert_eq!(read(&[0]), Ok(0));
    assert_eq!(read(&[1]), Ok(-1));
    assert_eq!(read(&[2]), Ok(1));
    assert_eq!(read(&[3]), Ok(-2));
    assert_eq!(read(&[127]), Ok(-64));
    assert_eq!(read(&[128, 1]), Ok(64));
    assert_eq!(
        read(&[0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x01]),
        Ok(i64::MIN)
    );
    assert_eq!(
        read(&[0xFE, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x01]),
        Ok(i64::MAX)
    );
}

#[test]
fn read_double() {
    let read = |bytes| ByteBuffer::new(bytes).read_double();
    assert_eq!(read(&[0, 0, 0, 0, 0, 0, 0xF0, 0x3F]), Ok(1.0));
    assert_eq!(read(&[0, 0, 0, 0, 0, 0, 0x2F, 0x40]), Ok(15.5));
    assert_eq!(read(&[0, 0, 0, 0, 0, 0, 0xF0]), Err(BufferError::Truncated { needed: 8, remaining: 7 }));
}

#[test]
fn read_key() {
    let read = |bytes| ByteBuffer::new(bytes).read_key();
    assert_eq!(read(&[0x08]), Ok((1, WireType::Varint)));
    assert_eq!(read(&[0x11]), Ok((2, WireType::Fixed64)));
    assert_eq!(read(&[0x0A]), Ok((1, WireType::LengthDelimited)));
    assert_eq!(read(&[128, 1]), Ok((16, WireType::Varint)));
    assert_eq!(read(&[0x02]), Err(BufferError::InvalidKey(2)));
    assert_eq!(read(&[0x0B]), Err(BufferError::InvalidKey(11)));
}

#[test]
fn read_length_delimited_rejects_overlong_lengths() {
    let mut data = vec![50];
    data.extend_from_slice(&[0; 10]);
    let mut bb = ByteBuffer::new(&data);
    assert_eq!(
        bb.read_length_delimited().err(),
        Some(BufferError::Truncated { needed: 50, remaining: 10 })
    );
}

#[test]
fn nested_buffers_report_absolute_offsets() {
    let mut bb = ByteBuffer::new(&[0xAA, 3, 7, 8, 9, 0xBB]);
    assert_eq!(bb.read_byte(), Ok(0xAA));
    let mut nested = bb.read_length_delimited().unwrap();
    assert_eq!(nested.offset(), 2);
    assert_eq!(nested.read_byte(), Ok(7));
    assert_eq!(nested.offset(), 3);
    assert_eq!(nested.remaining(), 2);
    assert_eq!(bb.read_byte(), Ok(0xBB));
    assert!(bb.is_empty());
}

#[test]
fn read_string() {
    assert_eq!(ByteBuffer::new(&[0]).read_string(), Ok(""));
    assert_eq!(ByteBuffer::new(&[3, 97, 98, 99]).read_string(), Ok("abc"));
    assert_eq!(ByteBuffer::new(&[4, 240, 159, 141, 149]).read_string(), Ok("🍕"));
    assert_eq!(ByteBuffer::new(&[2, 0xC3, 0x28]).read_string(), Err(BufferError::InvalidUtf8));
    assert_eq!(
        ByteBuffer::new(&[5, 97]).read_string(),
        Err(BufferError::Truncated { needed: 5, remaining: 1 })
    );
}

#[test]
fn skip() {
    let mut bb = ByteBuffer::new(&[172, 2, 1, 2, 3, 4, 5, 6, 7, 8, 2, 0, 0, 42]);
    assert_eq!(bb.skip(WireType::Varint), Ok(()));
    assert_eq!(bb.skip(WireType::Fixed64), Ok(()));
    assert_eq!(bb.skip(WireType::LengthDelimited), Ok(()));
    assert_eq!(bb.read_byte(), Ok(42));
}

/// A byte buffer meant for writing.
///
/// Example usage:
///
/// ```
/// use vehicle_wire_schema::{ByteBufferMut, WireType};
/// let mut bb = vehicle_wire_schema::ByteBufferMut::new();
/// bb.write_key(1, WireType::LengthDelimited);
/// bb.write_string("abc");
/// assert_eq!(bb.data(), [0x0a, 3, b'a', b'b', b'c']);
/// ```
///
#[derive(Default)]
pub struct ByteBufferMut {
    data: Vec<u8>,
}

impl ByteBufferMut {
    /// Creates an empty ByteBufferMut ready for writing.
    pub fn new() -> ByteBufferMut {
        ByteBufferMut { data: vec![] }
    }

    /// Consumes this buffer and returns the underlying backing store. Use this
    /// to get the data out when you're done writing to the buffer.
    pub fn data(self) -> Vec<u8> {
        self.data
    }

    /// Returns the number of bytes written so far.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Write a byte to the end of the buffer.
    pub fn write_byte(&mut self, value: u8) {
        self.data.push(value);
    }

    /// Write a raw byte slice to the end of the buffer.
    pub fn write_bytes(&mut self, value: &[u8]) {
        self.data.extend_from_slice(value);
    }

    /// Write a variable-length unsigned 64-bit integer to the end of the buffer.
    pub fn write_var_uint64(&mut self, mut value: u64) {
        loop {
            let byte = value as u8 & 127;
            value >>= 7;

            if value == 0 {
                self.write_byte(byte);
                return;
            }

            self.write_byte(byte | 128);
        }
    }

    /// Write a zigzag-encoded signed 64-bit integer to the end of the buffer.
    pub fn write_var_int64(&mut self, value: i64) {
        self.write_var_uint64(((value << 1) ^ (value >> 63)) as u64);
    }

    pub fn write_bool(&mut self, value: bool) {
        self.write_byte(if value { 1 } else { 0 });
    }

    /// Write eight little-endian bytes.
    pub fn write_fixed64(&mut self, value: u64) {
        self.data.extend_from_slice(&value.to_le_bytes());
    }

    /// Write a 64-bit float as its IEEE-754 bit pattern.
    pub fn write_double(&mut self, value: f64) {
        self.write_fixed64(value.to_bits());
    }

    pub fn write_key(&mut self, id: u32, wire_type: WireType) {
        self.write_var_uint64(((id as u64) << 3) | wire_type as u64);
    }

    /// Write a length prefix followed by `payload`.
    pub fn write_length_delimited(&mut self, payload: &[u8]) {
        self.write_var_uint64(payload.len() as u64);
        self.write_bytes(payload);
    }

    /// Write a length-delimited UTF-8 string to the end of the buffer.
    pub fn write_string(&mut self, value: &str) {
        self.write_length_delimited(value.as_bytes());
    }
}

#[cfg(test)]
fn write_once(cb: fn(&mut ByteBufferMut)) -> Vec<u8> {
    let mut bb = ByteBufferMut::new();
    cb(&mut bb);
    bb.data()
}

#[test]
fn write_var_uint64() {
    assert_eq!(write_once(|bb| bb.write_var_uint64(0)), [0]);
    assert_eq!(write_once(|bb| bb.write_var_uint64(127)), [127]);
    assert_eq!(write_once(|bb| bb.write_var_uint64(128)), [128, 1]);
    assert_eq!(write_once(|bb| bb.write_var_uint64(300)), [172, 2]);
    assert_eq!(
        write_once(|bb| bb.write_var_uint64(u64::MAX)),
        [0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x01]
    );
}

#[test]
fn write_var_int64() {
    assert_eq!(write_once(|bb| bb.write_var_int64(0)), [0]);
    assert_eq!(write_once(|bb| bb.write_var_int64(-1)), [1]);
    assert_eq!(write_once(|bb| bb.write_var_int64(1)), [2]);
    assert_eq!(write_once(|bb| bb.write_var_int64(-64)), [127]);
    assert_eq!(write_once(|bb| bb.write_var_int64(64)), [128, 1]);
    assert_eq!(
        write_once(|bb| bb.write_var_int64(i64::MIN)),
        [0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x01]
    );
}

#[test]
fn write_double() {
    assert_eq!(write_once(|bb| bb.write_double(1.0)), [0, 0, 0, 0, 0, 0, 0xF0, 0x3F]);
    assert_eq!(write_once(|bb| bb.write_double(15.5)), [0, 0, 0, 0, 0, 0, 0x2F, 0x40]);
}

#[test]
fn write_framing() {
    assert_eq!(write_once(|bb| bb.write_key(1, WireType::Varint)), [0x08]);
    assert_eq!(write_once(|bb| bb.write_key(2, WireType::Fixed64)), [0x11]);
    assert_eq!(write_once(|bb| bb.write_key(16, WireType::Varint)), [128, 1]);
    assert_eq!(write_once(|bb| bb.write_string("")), [0]);
    assert_eq!(write_once(|bb| bb.write_string("🍕")), [4, 240, 159, 141, 149]);
}

#[test]
fn write_sequence() {
    let mut bb = ByteBufferMut::new();
    bb.write_key(3, WireType::Fixed64);
    bb.write_double(15.5);
    bb.write_key(1, WireType::LengthDelimited);
    bb.write_string("ab");
    bb.write_key(6, WireType::Varint);
    bb.write_bool(true);
    let data = bb.data();
    assert_eq!(
        data,
        [0x19, 0, 0, 0, 0, 0, 0, 0x2F, 0x40, 0x0A, 2, 97, 98, 0x30, 1]
    );

    let mut bb = ByteBuffer::new(&data);
    assert_eq!(bb.read_key(), Ok((3, WireType::Fixed64)));
    assert_eq!(bb.read_double(), Ok(15.5));
    assert_eq!(bb.read_key(), Ok((1, WireType::LengthDelimited)));
    assert_eq!(bb.read_string(), Ok("ab"));
    assert_eq!(bb.read_key(), Ok((6, WireType::Varint)));
    assert_eq!(bb.read_bool(), Ok(true));
    assert!(bb.is_empty());
}
