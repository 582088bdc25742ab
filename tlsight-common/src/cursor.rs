/// Failure while reading a fixed-size field out of an untrusted byte view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("read of {needed} bytes at offset {offset} exceeds view of {len} bytes")]
    OutOfBounds {
        offset: usize,
        needed: usize,
        len: usize,
    },
}

/// Bounds-checked sequential reader over a borrowed byte view.
///
/// All multi-byte reads are big endian (network order). A failed read leaves
/// the position untouched.
#[derive(Debug, Clone)]
pub struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len().saturating_sub(self.pos)
    }

    /// Moves to an absolute offset. Seeking to the end of the view is allowed.
    pub fn seek(&mut self, pos: usize) -> Result<(), ParseError> {
        if pos > self.bytes.len() {
            return Err(self.out_of_bounds(pos, 0));
        }
        self.pos = pos;
        Ok(())
    }

    pub fn skip(&mut self, n: usize) -> Result<(), ParseError> {
        self.take(n).map(|_| ())
    }

    pub fn read_u8(&mut self) -> Result<u8, ParseError> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, ParseError> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    pub fn read_u32(&mut self) -> Result<u32, ParseError> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Copies up to `N` bytes starting at the current position without
    /// advancing. The copy stops at the end of the view; the rest of the
    /// window stays zeroed.
    pub fn window<const N: usize>(&self) -> [u8; N] {
        let mut out = [0u8; N];
        let start = self.pos.min(self.bytes.len());
        let end = start.saturating_add(N).min(self.bytes.len());
        out[..end - start].copy_from_slice(&self.bytes[start..end]);
        out
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], ParseError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.bytes.len())
            .ok_or_else(|| self.out_of_bounds(self.pos, n))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn out_of_bounds(&self, offset: usize, needed: usize) -> ParseError {
        ParseError::OutOfBounds {
            offset,
            needed,
            len: self.bytes.len(),
        }
    }
}
