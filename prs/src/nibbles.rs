/// 4-bit reader, high nibble of each byte first.
pub struct Nibbles<'a> {
    pub bytes: &'a [u8],
    pub idx: usize,
    pub low: bool,
}

impl<'a> Nibbles<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            idx: 0,
            low: false,
        }
    }

    pub fn pop_nibble(&mut self) -> Option<u8> {
        let b = self.bytes.get(self.idx)?;
        let ret = if self.low { b & 0x0F } else { b >> 4 };

        if self.low {
            self.idx += 1;
        }
        self.low = !self.low;

        Some(ret)
    }

    /// Nibbles not yet consumed.
    pub fn remaining(&self) -> usize {
        let whole = self.bytes.len().saturating_sub(self.idx) * 2;
        if self.low { whole - 1 } else { whole }
    }
}

impl Iterator for Nibbles<'_> {
    type Item = u8;

    fn next(&mut self) -> Option<u8> {
        self.pop_nibble()
    }
}
