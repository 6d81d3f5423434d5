//! Low-level little-endian reader over PRD/PRS buffers.
//!
//! Every structure in the resource format is read through [`PrsReader`], so
//! all out-of-bounds reads surface as the same [`ReaderError`].

use std::io::{Cursor, Read};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReaderError {
    #[error("unexpected end of data at offset {position}: needed {needed} bytes, {available} available")]
    UnexpectedEof {
        position: u64,
        needed: usize,
        available: usize,
    },
}

pub struct PrsReader<'a> {
    cursor: Cursor<&'a [u8]>,
}

impl<'a> PrsReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            cursor: Cursor::new(data),
        }
    }

    pub fn position(&self) -> u64 {
        self.cursor.position()
    }

    /// Moves to an absolute position. Seeking past the end is allowed; the
    /// next read then fails.
    pub fn seek(&mut self, pos: u64) {
        self.cursor.set_position(pos);
    }

    pub fn len(&self) -> usize {
        self.cursor.get_ref().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cursor.get_ref().is_empty()
    }

    pub fn remaining(&self) -> usize {
        let len = self.len() as u64;
        len.saturating_sub(self.position()) as usize
    }

    /// The unread tail of the buffer.
    pub fn remaining_slice(&self) -> &'a [u8] {
        let data: &'a [u8] = self.cursor.get_ref();
        let start = (self.position() as usize).min(data.len());
        &data[start..]
    }

    fn eof(&self, needed: usize) -> ReaderError {
        ReaderError::UnexpectedEof {
            position: self.position(),
            needed,
            available: self.remaining(),
        }
    }

    fn fill(&mut self, buf: &mut [u8]) -> Result<(), ReaderError> {
        if self.remaining() < buf.len() {
            return Err(self.eof(buf.len()));
        }
        self.cursor
            .read_exact(buf)
            .map_err(|_| ReaderError::UnexpectedEof {
                position: self.cursor.position(),
                needed: buf.len(),
                available: 0,
            })
    }

    pub fn read_u8(&mut self) -> Result<u8, ReaderError> {
        let mut buf = [0u8; 1];
        self.fill(&mut buf)?;
        Ok(buf[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, ReaderError> {
        let mut buf = [0u8; 2];
        self.fill(&mut buf)?;
        Ok(u16::from_le_bytes(buf))
    }

    pub fn read_i16(&mut self) -> Result<i16, ReaderError> {
        let mut buf = [0u8; 2];
        self.fill(&mut buf)?;
        Ok(i16::from_le_bytes(buf))
    }

    pub fn read_u32(&mut self) -> Result<u32, ReaderError> {
        let mut buf = [0u8; 4];
        self.fill(&mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    pub fn read_i32(&mut self) -> Result<i32, ReaderError> {
        let mut buf = [0u8; 4];
        self.fill(&mut buf)?;
        Ok(i32::from_le_bytes(buf))
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>, ReaderError> {
        Ok(self.read_slice(len)?.to_vec())
    }

    /// Borrows the next `len` bytes without copying.
    pub fn read_slice(&mut self, len: usize) -> Result<&'a [u8], ReaderError> {
        if self.remaining() < len {
            return Err(self.eof(len));
        }
        let data: &'a [u8] = self.cursor.get_ref();
        let start = self.position() as usize;
        self.cursor.set_position((start + len) as u64);
        Ok(&data[start..start + len])
    }

    /// Reads at most `len` bytes, returning fewer when the buffer runs out.
    pub fn read_up_to(&mut self, len: usize) -> &'a [u8] {
        let len = len.min(self.remaining());
        // Cannot fail: the length was clamped to what is left.
        self.read_slice(len).unwrap_or_default()
    }

    pub fn skip(&mut self, len: usize) -> Result<(), ReaderError> {
        self.read_slice(len).map(|_| ())
    }

    /// A reader over `len` bytes starting at the absolute `offset`, leaving
    /// this reader untouched.
    pub fn sub_reader(&self, offset: u64, len: usize) -> Result<PrsReader<'a>, ReaderError> {
        let data: &'a [u8] = self.cursor.get_ref();
        let start = offset as usize;
        match start.checked_add(len) {
            Some(end) if offset <= data.len() as u64 && end <= data.len() => {
                Ok(PrsReader::new(&data[start..end]))
            }
            _ => Err(ReaderError::UnexpectedEof {
                position: offset,
                needed: len,
                available: data.len().saturating_sub(start),
            }),
        }
    }

    /// Read a fixed-width code-point-per-byte string.
    ///
    /// Names in PRD files are byte arrays padded with zeros. Every nonzero
    /// byte is taken as a Unicode scalar value of its own (not Latin-1, not
    /// UTF-8) and zero bytes are dropped wherever they occur.
    pub fn read_codepoint_string(&mut self, len: usize) -> Result<String, ReaderError> {
        let bytes = self.read_slice(len)?;
        Ok(bytes
            .iter()
            .filter(|&&b| b != 0)
            .map(|&b| char::from_u32(u32::from(b)).unwrap_or(char::REPLACEMENT_CHARACTER))
            .collect())
    }
}
