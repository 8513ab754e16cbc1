use crate::error::{Error, Result};
use super::types::{GridCoord, Located, Vec3};

/// Bounded little-endian reader over a payload slice.
///
/// Positions are absolute offsets into the full payload. The reader never
/// reads at or past `limit`, so a section or entry boundary can be
/// enforced by constructing it with a smaller limit.
pub struct BinaryReader<'a> {
    data: &'a [u8],
    pos: usize,
    limit: usize,
}

impl<'a> BinaryReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0, limit: data.len() }
    }

    /// Reader over `data[start..limit]` that reports absolute offsets.
    pub fn bounded(data: &'a [u8], start: usize, limit: usize) -> Self {
        let limit = limit.min(data.len());
        Self { data, pos: start.min(limit), limit }
    }

    pub fn remaining(&self) -> usize {
        self.limit.saturating_sub(self.pos)
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn set_position(&mut self, pos: usize) {
        self.pos = pos.min(self.limit);
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(Error::BufferOverflow {
                offset: self.pos,
                need: n,
                have: self.remaining(),
            });
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_bytes(1)?[0])
    }

    pub fn read_u16_le(&mut self) -> Result<u16> {
        let bytes = self.read_bytes(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    pub fn read_u32_le(&mut self) -> Result<u32> {
        let bytes = self.read_bytes(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn read_f32_le(&mut self) -> Result<f32> {
        Ok(f32::from_bits(self.read_u32_le()?))
    }

    /// Read a u16 length-prefixed string, replacing invalid UTF-8.
    pub fn read_lp_string(&mut self) -> Result<String> {
        let len = self.read_u16_le()? as usize;
        let bytes = self.read_bytes(len)?;
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }

    pub fn read_vec3(&mut self) -> Result<Vec3> {
        Ok(Vec3 {
            x: self.read_f32_le()?,
            y: self.read_f32_le()?,
            z: self.read_f32_le()?,
        })
    }

    pub fn read_grid_coord(&mut self) -> Result<GridCoord> {
        Ok(GridCoord {
            x: self.read_u32_le()?,
            y: self.read_u32_le()?,
            z: self.read_u32_le()?,
        })
    }

    /// Run `read` and tag its result with the offset it started at.
    pub fn located<T>(&mut self, read: impl FnOnce(&mut Self) -> Result<T>) -> Result<Located<T>> {
        let offset = self.pos;
        read(self).map(|value| Located::new(offset, value))
    }

    /// Read everything up to the limit.
    pub fn read_remaining(&mut self) -> &'a [u8] {
        let slice = &self.data[self.pos..self.limit];
        self.pos = self.limit;
        slice
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_primitives() {
        let data = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07];
        let mut reader = BinaryReader::new(&data);

        assert_eq!(reader.read_u8().unwrap(), 0x01);
        assert_eq!(reader.read_u16_le().unwrap(), 0x0302);
        assert_eq!(reader.read_u32_le().unwrap(), 0x07060504);
        assert!(reader.is_empty());
    }

    #[test]
    fn test_read_lp_string() {
        let data = [0x05, 0x00, b'h', b'e', b'l', b'l', b'o'];
        let mut reader = BinaryReader::new(&data);
        assert_eq!(reader.read_lp_string().unwrap(), "hello");
    }

    #[test]
    fn test_read_lp_string_replaces_invalid_utf8() {
        let data = [0x03, 0x00, b'a', 0xFF, b'b'];
        let mut reader = BinaryReader::new(&data);
        assert_eq!(reader.read_lp_string().unwrap(), "a\u{FFFD}b");
    }

    #[test]
    fn test_bounded_reader_stops_at_limit() {
        let data = [0u8, 1, 2, 3, 4, 5, 6, 7];
        let mut reader = BinaryReader::bounded(&data, 2, 5);
        assert_eq!(reader.position(), 2);
        assert_eq!(reader.read_u16_le().unwrap(), 0x0302);
        match reader.read_u16_le() {
            Err(Error::BufferOverflow { offset, need, have }) => {
                assert_eq!((offset, need, have), (4, 2, 1));
            }
            other => panic!("expected overflow, got {other:?}"),
        }
        assert_eq!(reader.read_remaining(), &[4]);
    }

    #[test]
    fn test_located_records_start_offset() {
        let data = [0xAA, 0x2A, 0x00, 0x00, 0x00];
        let mut reader = BinaryReader::new(&data);
        reader.read_u8().unwrap();
        let v = reader.located(|r| r.read_u32_le()).unwrap();
        assert_eq!(v.offset, 1);
        assert_eq!(v.value, 42);
    }
}
