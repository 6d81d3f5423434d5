//! Packed-data (PRS) file access.
//!
//! A [`PackedFile`] owns the bytes of one packed-data file and decodes the
//! records a directory points into it.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::audio::{PcmBuffer, decode_riff_adpcm, decode_snd};
use crate::directory::{AssetKind, AssetRecord};
use crate::error::{Error, Result};
use crate::palette::{CluLayout, Palette, find_palette_block};
use crate::reader::PrsReader;
use crate::sprite::{IndexedImage, decode_sprite};

/// A decoded record.
#[derive(Debug, Clone)]
pub enum Asset {
    Sound(PcmBuffer),
    Image(IndexedImage),
    Palette(Palette),
    /// A record type that has no decoder; carries the tag.
    Unsupported(String),
}

pub struct PackedFile {
    path: PathBuf,
    data: Vec<u8>,
}

impl PackedFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read(path)?;
        debug!("read {} ({} bytes)", path.display(), data.len());
        Ok(Self::from_bytes(path, data))
    }

    pub fn from_bytes(path: impl Into<PathBuf>, data: Vec<u8>) -> Self {
        Self {
            path: path.into(),
            data,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The `[offset, offset + length)` window of `record`.
    pub fn asset_bytes(&self, record: &AssetRecord) -> Result<&[u8]> {
        let (Ok(offset), Ok(length)) =
            (u64::try_from(record.offset), usize::try_from(record.length))
        else {
            return Err(Error::invalid_format(format!(
                "record {} has negative offset {} or length {}",
                record.id, record.offset, record.length
            )));
        };
        let reader = PrsReader::new(&self.data);
        let window = reader.sub_reader(offset, length)?;
        Ok(window.remaining_slice())
    }

    /// Offset of the first embedded CLU block, if any.
    pub fn find_palette(&self) -> Option<usize> {
        find_palette_block(&self.data)
    }

    /// Palette read from the first embedded CLU block.
    pub fn embedded_palette(&self, layout: CluLayout) -> Option<Palette> {
        let offset = self.find_palette()?;
        debug!("found embedded CLU block at {offset}");
        Some(Palette::load(&self.data[offset..], layout))
    }

    /// Decode `record` according to its type tag.
    pub fn decode(
        &self,
        record: &AssetRecord,
        palette: &Palette,
        layout: CluLayout,
    ) -> Result<Asset> {
        Ok(match record.kind() {
            AssetKind::Sound => Asset::Sound(decode_snd(self.asset_bytes(record)?)?),
            AssetKind::Adpcm => Asset::Sound(decode_riff_adpcm(self.asset_bytes(record)?)?),
            AssetKind::Sprite => {
                let bytes = self.asset_bytes(record)?;
                let mut reader = PrsReader::new(bytes);
                Asset::Image(decode_sprite(&mut reader, bytes.len(), palette)?)
            }
            AssetKind::Palette => Asset::Palette(Palette::load(self.asset_bytes(record)?, layout)),
            AssetKind::Other(tag) => Asset::Unsupported(tag),
        })
    }
}
