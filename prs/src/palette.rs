//! 256-entry RGBA palettes: the synthetic default and CLU blocks.
//!
//! CLU blocks have been seen with more than one header and entry encoding, so
//! the loader is driven by a [`CluLayout`] instead of guessing.

use std::ops::Index;

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::reader::PrsReader;

pub const PALETTE_SIZE: usize = 256;

/// `"CLU\0"` read as a little-endian `u32`.
pub const CLU_SIGNATURE: u32 = 0x0055_4C43;

/// Index reserved for transparent pixels.
pub const TRANSPARENT_INDEX: u8 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PaletteEntry {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl PaletteEntry {
    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn transparent() -> Self {
        Self {
            r: 0,
            g: 0,
            b: 0,
            a: 0,
        }
    }

    pub fn rgba(&self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

/// How the palette block starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CluHeader {
    /// A `u32` magic, followed by a `u32` size when the magic is `"CLU\0"`.
    Signature,
    /// A fixed number of header bytes to skip.
    Fixed(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CluEntry {
    /// `u32` little-endian `0x00RRGGBB`.
    Packed32,
    /// Three bytes, red first.
    Rgb24,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorScale {
    Raw,
    /// 6-bit VGA DAC components.
    SixBit,
}

impl ColorScale {
    fn apply(self, v: u8) -> u8 {
        match self {
            Self::Raw => v,
            Self::SixBit => {
                let v = v & 0x3F;
                (v << 2) | (v >> 4)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CluLayout {
    pub header: CluHeader,
    pub entry: CluEntry,
    pub scale: ColorScale,
}

impl CluLayout {
    pub const PACKED32: Self = Self {
        header: CluHeader::Signature,
        entry: CluEntry::Packed32,
        scale: ColorScale::Raw,
    };

    pub const RGB24: Self = Self {
        header: CluHeader::Fixed(4),
        entry: CluEntry::Rgb24,
        scale: ColorScale::Raw,
    };

    pub const VGA: Self = Self {
        header: CluHeader::Fixed(8),
        entry: CluEntry::Rgb24,
        scale: ColorScale::SixBit,
    };
}

impl Default for CluLayout {
    fn default() -> Self {
        Self::PACKED32
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    entries: [PaletteEntry; PALETTE_SIZE],
}

impl Palette {
    /// Deterministic 3-3-2 palette used until a CLU block is seen.
    ///
    /// Index 0 is transparent, 1 opaque black and 255 opaque white; font and
    /// UI sprites rely on those three.
    pub fn default_palette() -> Self {
        let mut entries = [PaletteEntry::default(); PALETTE_SIZE];
        for (i, entry) in entries.iter_mut().enumerate() {
            let r = ((i >> 5) & 7) * 255 / 7;
            let g = ((i >> 2) & 7) * 255 / 7;
            let b = (i & 3) * 255 / 3;
            *entry = PaletteEntry::opaque(r as u8, g as u8, b as u8);
        }
        entries[0] = PaletteEntry::transparent();
        entries[1] = PaletteEntry::opaque(0, 0, 0);
        Self { entries }
    }

    /// Builds a palette from explicit entries. Index 0 is forced transparent.
    pub fn from_entries(mut entries: [PaletteEntry; PALETTE_SIZE]) -> Self {
        entries[usize::from(TRANSPARENT_INDEX)].a = 0;
        Self { entries }
    }

    /// Parse a CLU block, falling back to the default palette on any error.
    pub fn load(data: &[u8], layout: CluLayout) -> Self {
        match Self::try_load(data, layout) {
            Ok(palette) => palette,
            Err(e) => {
                warn!("failed to load palette ({layout:?}): {e}; using default palette");
                Self::default_palette()
            }
        }
    }

    pub fn try_load(data: &[u8], layout: CluLayout) -> Result<Self> {
        let mut reader = PrsReader::new(data);

        match layout.header {
            CluHeader::Signature => {
                let magic = reader.read_u32()?;
                debug!("CLU magic: 0x{magic:08X}");
                if magic == CLU_SIGNATURE {
                    let _size = reader.read_u32()?;
                }
            }
            CluHeader::Fixed(len) => reader.skip(len)?,
        }

        let entry_width = match layout.entry {
            CluEntry::Packed32 => 4,
            CluEntry::Rgb24 => 3,
        };
        if reader.remaining() < entry_width * PALETTE_SIZE {
            return Err(Error::invalid_format(format!(
                "palette block has {} bytes left, {} needed",
                reader.remaining(),
                entry_width * PALETTE_SIZE
            )));
        }

        let mut entries = [PaletteEntry::default(); PALETTE_SIZE];
        for entry in entries.iter_mut() {
            let (r, g, b) = match layout.entry {
                CluEntry::Packed32 => {
                    let v = reader.read_u32()?;
                    ((v >> 16) as u8, (v >> 8) as u8, v as u8)
                }
                CluEntry::Rgb24 => (reader.read_u8()?, reader.read_u8()?, reader.read_u8()?),
            };
            let s = layout.scale;
            *entry = PaletteEntry::opaque(s.apply(r), s.apply(g), s.apply(b));
        }

        Ok(Self::from_entries(entries))
    }

    pub fn entries(&self) -> &[PaletteEntry; PALETTE_SIZE] {
        &self.entries
    }

    /// Nearest opaque entry (indices 1..=255) by L1 distance over RGB.
    /// Ties go to the lowest index.
    pub fn nearest_opaque(&self, r: u8, g: u8, b: u8) -> u8 {
        let mut best = 1u8;
        let mut best_dist = u32::MAX;
        for (i, e) in self.entries.iter().enumerate().skip(1) {
            let dist = u32::from(r.abs_diff(e.r))
                + u32::from(g.abs_diff(e.g))
                + u32::from(b.abs_diff(e.b));
            if dist < best_dist {
                best_dist = dist;
                best = i as u8;
                if dist == 0 {
                    break;
                }
            }
        }
        best
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self::default_palette()
    }
}

impl Index<u8> for Palette {
    type Output = PaletteEntry;

    fn index(&self, index: u8) -> &PaletteEntry {
        &self.entries[usize::from(index)]
    }
}

/// Locate the first embedded `"CLU\0"` block in a packed-data buffer.
pub fn find_palette_block(data: &[u8]) -> Option<usize> {
    let signature = CLU_SIGNATURE.to_le_bytes();
    data.windows(signature.len()).position(|w| w == signature)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packed_block(with_signature: bool) -> Vec<u8> {
        let mut data = Vec::new();
        if with_signature {
            data.extend_from_slice(b"CLU\0");
            data.extend_from_slice(&1024u32.to_le_bytes());
        } else {
            data.extend_from_slice(&0xDEADBEEFu32.to_le_bytes());
        }
        for i in 0..256u32 {
            // 0x00RRGGBB
            let v = (i << 16) | ((255 - i) << 8) | (i / 2);
            data.extend_from_slice(&v.to_le_bytes());
        }
        data
    }

    #[test]
    fn test_default_palette_sentinels() {
        let p = Palette::default_palette();
        assert_eq!(p[0].a, 0);
        assert_eq!(p[1], PaletteEntry::opaque(0, 0, 0));
        assert_eq!(p[255], PaletteEntry::opaque(255, 255, 255));
        assert!(p.entries().iter().skip(1).all(|e| e.a == 255));
    }

    #[test]
    fn test_default_palette_bit_packing() {
        let p = Palette::default_palette();
        // 0b111_000_00 is pure red, 0b000_111_00 pure green, 0b000_000_11 pure blue.
        assert_eq!(p[0xE0], PaletteEntry::opaque(255, 0, 0));
        assert_eq!(p[0x1C], PaletteEntry::opaque(0, 255, 0));
        assert_eq!(p[0x03], PaletteEntry::opaque(0, 0, 255));
    }

    #[test]
    fn test_load_packed_with_signature() {
        let data = packed_block(true);
        let p = Palette::try_load(&data, CluLayout::PACKED32).unwrap();
        assert_eq!(p[10], PaletteEntry::opaque(10, 245, 5));
        assert_eq!(p[0].a, 0);
    }

    #[test]
    fn test_load_packed_without_signature_skips_only_magic() {
        let data = packed_block(false);
        let p = Palette::try_load(&data, CluLayout::PACKED32).unwrap();
        assert_eq!(p[200], PaletteEntry::opaque(200, 55, 100));
    }

    #[test]
    fn test_load_vga_scales_six_bit_values() {
        let mut data = vec![0u8; 8];
        for i in 0..256usize {
            data.extend_from_slice(&[63, (i % 64) as u8, 0]);
        }
        let p = Palette::try_load(&data, CluLayout::VGA).unwrap();
        assert_eq!(p[5], PaletteEntry::opaque(255, 20, 0));
        assert_eq!(p[32], PaletteEntry::opaque(255, 130, 0));
    }

    #[test]
    fn test_load_falls_back_to_default() {
        let data = [0u8; 16];
        assert_eq!(
            Palette::load(&data, CluLayout::PACKED32),
            Palette::default_palette()
        );
        assert!(Palette::try_load(&data, CluLayout::RGB24).is_err());
    }

    #[test]
    fn test_nearest_opaque_never_picks_transparent() {
        let p = Palette::default_palette();
        // Black matches index 1, not the transparent black at index 0.
        assert_eq!(p.nearest_opaque(0, 0, 0), 1);
        assert_eq!(p.nearest_opaque(255, 255, 255), 255);
        assert_eq!(p.nearest_opaque(250, 5, 3), 0xE0);
    }

    #[test]
    fn test_find_palette_block() {
        let mut data = vec![0u8; 37];
        data.extend_from_slice(b"CLU\0");
        data.extend_from_slice(&[1, 2, 3]);
        assert_eq!(find_palette_block(&data), Some(37));
        assert_eq!(find_palette_block(b"CLU"), None);
    }
}
