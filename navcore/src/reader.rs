//! Bounds-checked little-endian reader over FourCC-tagged chunk containers (§4.2).

crate::eyre_imports!();
use crate::error::{NavCoreResult, NavError};
use byteorder::{ByteOrder, LittleEndian};
use glam::Vec3;
use std::fmt;

/// A 4-byte chunk tag, e.g. `b"MCNK"`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct FourCC(pub [u8; 4]);

impl FourCC {
    pub const fn new(tag: &[u8; 4]) -> Self {
        FourCC(*tag)
    }
}

impl fmt::Debug for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match std::str::from_utf8(&self.0) {
            Ok(s) => write!(f, "FourCC({s:?})"),
            Err(_) => write!(f, "FourCC({:?})", self.0),
        }
    }
}

/// A bounds-checked cursor over a byte slice.
///
/// Every read that would run past the end of `data` returns
/// [`NavError::Truncated`] rather than panicking, per §4.2's guarantee.
#[derive(Clone, Copy)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        ByteReader { data, pos: 0 }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    pub fn seek(&mut self, pos: usize) -> NavCoreResult<()> {
        if pos > self.data.len() {
            return Err(NavError::Truncated(format!(
                "seek to {pos} beyond buffer of length {}",
                self.data.len()
            )));
        }
        self.pos = pos;
        Ok(())
    }

    fn take(&mut self, n: usize) -> NavCoreResult<&'a [u8]> {
        if self.remaining() < n {
            return Err(NavError::Truncated(format!(
                "need {n} bytes, only {} remain",
                self.remaining()
            )));
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn read_bytes(&mut self, n: usize) -> NavCoreResult<&'a [u8]> {
        self.take(n)
    }

    pub fn read_u8(&mut self) -> NavCoreResult<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_i8(&mut self) -> NavCoreResult<i8> {
        Ok(self.take(1)?[0] as i8)
    }

    pub fn read_u16(&mut self) -> NavCoreResult<u16> {
        Ok(LittleEndian::read_u16(self.take(2)?))
    }

    pub fn read_i16(&mut self) -> NavCoreResult<i16> {
        Ok(LittleEndian::read_i16(self.take(2)?))
    }

    pub fn read_u32(&mut self) -> NavCoreResult<u32> {
        Ok(LittleEndian::read_u32(self.take(4)?))
    }

    pub fn read_i32(&mut self) -> NavCoreResult<i32> {
        Ok(LittleEndian::read_i32(self.take(4)?))
    }

    pub fn read_u64(&mut self) -> NavCoreResult<u64> {
        Ok(LittleEndian::read_u64(self.take(8)?))
    }

    pub fn read_f32(&mut self) -> NavCoreResult<f32> {
        Ok(LittleEndian::read_f32(self.take(4)?))
    }

    pub fn read_vec3(&mut self) -> NavCoreResult<Vec3> {
        let x = self.read_f32()?;
        let y = self.read_f32()?;
        let z = self.read_f32()?;
        Ok(Vec3::new(x, y, z))
    }

    pub fn read_fourcc(&mut self) -> NavCoreResult<FourCC> {
        let bytes = self.take(4)?;
        Ok(FourCC([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Reads a NUL-terminated, then NUL-padded run of strings out of a blob
    /// such as `MWMO`/`MMDX`/`MDNM` (a flat buffer of back-to-back C strings).
    pub fn read_cstring_list(&mut self) -> NavCoreResult<Vec<String>> {
        let remaining = self.remaining();
        let bytes = self.take(remaining)?;
        Ok(bytes
            .split(|&b| b == 0)
            .filter(|s| !s.is_empty())
            .map(|s| String::from_utf8_lossy(s).into_owned())
            .collect())
    }

    /// Returns a sub-reader spanning exactly the next `len` bytes, advancing
    /// past them in `self`.
    pub fn sub_reader(&mut self, len: usize) -> NavCoreResult<ByteReader<'a>> {
        Ok(ByteReader::new(self.take(len)?))
    }

    /// Iterates FourCC-tagged chunks (4-byte tag, 4-byte LE size, payload)
    /// until the buffer is exhausted. Chunks may appear in any order; callers
    /// that don't recognize a tag simply skip the entry in the returned map.
    pub fn chunks(&mut self) -> ChunkIter<'a> {
        ChunkIter { reader: *self }
    }
}

pub struct ChunkIter<'a> {
    reader: ByteReader<'a>,
}

impl<'a> Iterator for ChunkIter<'a> {
    type Item = NavCoreResult<(FourCC, ByteReader<'a>)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.reader.remaining() == 0 {
            return None;
        }
        if self.reader.remaining() < 8 {
            return Some(Err(NavError::Truncated(
                "chunk header truncated (need 8 bytes for tag+size)".into(),
            )));
        }
        let tag = match self.reader.read_fourcc() {
            Ok(t) => t,
            Err(e) => return Some(Err(e)),
        };
        let size = match self.reader.read_u32() {
            Ok(s) => s as usize,
            Err(e) => return Some(Err(e)),
        };
        let payload = match self.reader.sub_reader(size) {
            Ok(r) => r,
            Err(e) => return Some(Err(e)),
        };
        Some(Ok((tag, payload)))
    }
}
