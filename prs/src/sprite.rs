//! Sprite decoding for `PAK` records.
//!
//! A sprite payload carries no explicit type tag. [`SpriteFormat::classify`]
//! sniffs the leading bytes and every decoder below produces the same
//! [`IndexedImage`]: palette indices plus optional frame rectangles.

use std::collections::HashMap;
use std::io::Cursor;

use image::codecs::png::PngDecoder;
use image::{DynamicImage, ImageDecoder};
use tracing::{debug, trace, warn};

use crate::compression::{decode_rle, decode_triplet_rle, fit_to_length};
use crate::error::{Error, Result};
use crate::palette::{Palette, TRANSPARENT_INDEX};
use crate::reader::PrsReader;

pub const PNG_SIGNATURE: [u8; 4] = [0x89, b'P', b'N', b'G'];
pub const WALLPAPER_MAGIC: [u8; 3] = *b"WPR";

pub const FORMAT_RLE: u8 = 0x01;
pub const FORMAT_ATLAS: u8 = 0x02;
const VECTOR_TAG_MASK: u8 = 0xC0;

pub const WALLPAPER_WIDTH: u32 = 640;
pub const WALLPAPER_HEIGHT: u32 = 480;

pub const PNG_MAX_DIMENSION: u32 = 2048;
pub const RLE_MAX_WIDTH: u32 = 800;
pub const RLE_MAX_HEIGHT: u32 = 600;
pub const RAW_MAX_DIMENSION: u32 = 1024;
pub const ATLAS_MAX_HEIGHT: u32 = 8192;
pub const VECTOR_MAX_WIDTH: u32 = 1024;

/// Margin added right of and below the painted area of a vector sprite.
const VECTOR_PADDING: u32 = 1;

/// PNG pixels below this alpha map to the transparent index.
const ALPHA_THRESHOLD: u8 = 128;

const ATLAS_TERMINATOR: u16 = 0xFFFF;
const MAX_RAW_FRAMES: u16 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpriteFormat {
    Png,
    Wallpaper,
    VectorCommand,
    MultiAtlas,
    GenericRle,
    RawUncompressed,
}

impl SpriteFormat {
    /// Classify a payload by its leading bytes. The order matters: the magic
    /// signatures are checked before the single format byte.
    pub fn classify(data: &[u8]) -> Self {
        if data.starts_with(&PNG_SIGNATURE) {
            return Self::Png;
        }
        if data.starts_with(&WALLPAPER_MAGIC) {
            return Self::Wallpaper;
        }
        match data.first() {
            Some(&b) if b & VECTOR_TAG_MASK == VECTOR_TAG_MASK => Self::VectorCommand,
            Some(&FORMAT_ATLAS) => Self::MultiAtlas,
            Some(&FORMAT_RLE) => Self::GenericRle,
            _ => Self::RawUncompressed,
        }
    }
}

/// A rectangle inside an [`IndexedImage`], typically one animation frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Frame {
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Non-empty and entirely within a `width` x `height` image.
    pub fn fits(&self, width: u32, height: u32) -> bool {
        !self.is_empty()
            && self.x.checked_add(self.width).is_some_and(|r| r <= width)
            && self.y.checked_add(self.height).is_some_and(|b| b <= height)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedImage {
    pub width: u32,
    pub height: u32,
    /// Row-major palette indices, `width * height` of them.
    pub pixels: Vec<u8>,
    pub frames: Vec<Frame>,
}

impl IndexedImage {
    pub fn new(width: u32, height: u32, pixels: Vec<u8>, frames: Vec<Frame>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::invalid_parameters(format!(
                "image dimensions {width}x{height} are empty"
            )));
        }
        let expected = pixel_count(width, height);
        if pixels.len() != expected {
            return Err(Error::invalid_parameters(format!(
                "{}x{} image needs {expected} pixels, got {}",
                width,
                height,
                pixels.len()
            )));
        }
        if let Some(frame) = frames.iter().find(|f| !f.fits(width, height)) {
            return Err(Error::invalid_parameters(format!(
                "frame {frame:?} lies outside {width}x{height} image"
            )));
        }
        Ok(Self {
            width,
            height,
            pixels,
            frames,
        })
    }

    /// Palette index at `(x, y)`, or `None` outside the image.
    pub fn pixel(&self, x: u32, y: u32) -> Option<u8> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }

    /// Expand to row-major RGBA through `palette`.
    pub fn to_rgba(&self, palette: &Palette) -> Vec<u8> {
        self.pixels
            .iter()
            .flat_map(|&index| palette[index].rgba())
            .collect()
    }

    /// Copy out the region covered by `frame`.
    pub fn crop(&self, frame: &Frame) -> Result<IndexedImage> {
        if !frame.fits(self.width, self.height) {
            return Err(Error::invalid_parameters(format!(
                "frame {frame:?} lies outside {}x{} image",
                self.width, self.height
            )));
        }
        let stride = self.width as usize;
        let mut pixels = Vec::with_capacity(pixel_count(frame.width, frame.height));
        for row in frame.y..frame.y + frame.height {
            let start = row as usize * stride + frame.x as usize;
            pixels.extend_from_slice(&self.pixels[start..start + frame.width as usize]);
        }
        Ok(IndexedImage {
            width: frame.width,
            height: frame.height,
            pixels,
            frames: Vec::new(),
        })
    }
}

fn pixel_count(width: u32, height: u32) -> usize {
    width as usize * height as usize
}

fn check_dimensions(format: &str, width: u32, height: u32, max_w: u32, max_h: u32) -> Result<()> {
    if width == 0 || height == 0 || width > max_w || height > max_h {
        return Err(Error::invalid_format(format!(
            "{format} dimensions {width}x{height} outside 1..={max_w} x 1..={max_h}"
        )));
    }
    Ok(())
}

/// Decode the `byte_length` bytes at the reader's position.
pub fn decode_sprite(
    reader: &mut PrsReader<'_>,
    byte_length: usize,
    palette: &Palette,
) -> Result<IndexedImage> {
    let data = reader.read_slice(byte_length)?;
    decode_sprite_bytes(data, palette)
}

pub fn decode_sprite_bytes(data: &[u8], palette: &Palette) -> Result<IndexedImage> {
    let format = SpriteFormat::classify(data);
    debug!("sprite format: {format:?} ({} bytes)", data.len());

    match format {
        SpriteFormat::Png => decode_png(data, palette),
        SpriteFormat::Wallpaper => decode_wallpaper(data),
        SpriteFormat::VectorCommand => decode_vector(data),
        SpriteFormat::MultiAtlas => decode_atlas(data),
        SpriteFormat::GenericRle => decode_generic_rle(data),
        SpriteFormat::RawUncompressed => decode_raw(data),
    }
}

fn decode_png(data: &[u8], palette: &Palette) -> Result<IndexedImage> {
    let decoder = PngDecoder::new(Cursor::new(data))
        .map_err(|e| Error::invalid_format(format!("PNG header: {e}")))?;
    let (width, height) = decoder.dimensions();
    check_dimensions("PNG", width, height, PNG_MAX_DIMENSION, PNG_MAX_DIMENSION)?;

    let rgba = DynamicImage::from_decoder(decoder)
        .map_err(|e| Error::invalid_format(format!("PNG data: {e}")))?
        .to_rgba8();

    let mut cache: HashMap<[u8; 3], u8> = HashMap::new();
    let pixels = rgba
        .pixels()
        .map(|p| {
            let [r, g, b, a] = p.0;
            if a < ALPHA_THRESHOLD {
                TRANSPARENT_INDEX
            } else {
                *cache
                    .entry([r, g, b])
                    .or_insert_with(|| palette.nearest_opaque(r, g, b))
            }
        })
        .collect();

    IndexedImage::new(width, height, pixels, Vec::new())
}

fn decode_wallpaper(data: &[u8]) -> Result<IndexedImage> {
    let len = pixel_count(WALLPAPER_WIDTH, WALLPAPER_HEIGHT);
    let payload = &data[WALLPAPER_MAGIC.len()..];
    let decoded = decode_triplet_rle(payload, len);
    if decoded.len() < len {
        debug!("wallpaper short by {} pixels, padding", len - decoded.len());
    }
    IndexedImage::new(
        WALLPAPER_WIDTH,
        WALLPAPER_HEIGHT,
        fit_to_length(decoded, len),
        Vec::new(),
    )
}

/// Interpret a vector command stream, calling `paint(x, y, run, color)` for
/// every run command.
fn walk_vector_commands(
    commands: &[u8],
    mut paint: impl FnMut(u32, u32, u32, u8),
) -> Result<()> {
    let mut reader = PrsReader::new(commands);
    let (mut x, mut y) = (0u32, 0u32);

    while reader.remaining() > 0 {
        let cmd = reader.read_u8()?;
        if cmd == 0 {
            break;
        }
        if cmd & 0x80 != 0 {
            x = u32::from(cmd & 0x7F);
        } else if cmd & 0x40 != 0 {
            let run = u32::from(cmd & 0x3F);
            let color = reader.read_u8()?;
            paint(x, y, run, color);
            x = x.saturating_add(run);
        } else {
            y = u32::from(cmd);
            x = 0;
        }
    }
    Ok(())
}

fn decode_vector(data: &[u8]) -> Result<IndexedImage> {
    let commands = &data[1..];

    let mut extent: Option<(u32, u32)> = None;
    walk_vector_commands(commands, |x, y, run, _| {
        if run == 0 {
            return;
        }
        let (max_x, max_y) = extent.get_or_insert((0, 0));
        *max_x = (*max_x).max(x.saturating_add(run));
        *max_y = (*max_y).max(y);
    })?;

    let Some((max_x, max_y)) = extent else {
        return Err(Error::invalid_format("vector sprite paints no pixels"));
    };
    let width = max_x.saturating_add(VECTOR_PADDING);
    let height = max_y + 1 + VECTOR_PADDING;
    check_dimensions("vector", width, height, VECTOR_MAX_WIDTH, RLE_MAX_HEIGHT)?;

    let stride = width as usize;
    let mut pixels = vec![0u8; pixel_count(width, height)];
    walk_vector_commands(commands, |x, y, run, color| {
        if run == 0 {
            return;
        }
        let start = y as usize * stride + x as usize;
        pixels[start..start + run as usize].fill(color);
    })?;

    IndexedImage::new(width, height, pixels, Vec::new())
}

struct AtlasEntry<'a> {
    width: u32,
    height: u32,
    data: &'a [u8],
}

fn decode_atlas(data: &[u8]) -> Result<IndexedImage> {
    let mut reader = PrsReader::new(data);
    reader.skip(1)?;
    let count = reader.read_u16()?;

    let mut offsets = Vec::with_capacity(usize::from(count).min(reader.remaining() / 4));
    for _ in 0..count {
        let offset = reader.read_u32()? as usize;
        if offset >= data.len() {
            return Err(Error::invalid_format(format!(
                "atlas offset {offset} outside {}-byte asset",
                data.len()
            )));
        }
        offsets.push(offset);
    }

    // Validate every header before decoding anything.
    let mut entries = Vec::with_capacity(offsets.len());
    let mut total_height = 0u32;
    for &offset in &offsets {
        let end = offsets
            .iter()
            .copied()
            .filter(|&o| o > offset)
            .min()
            .unwrap_or(data.len());
        let mut sub = PrsReader::new(&data[offset..end]);
        let width = sub.read_u16()?;
        let height = sub.read_u16()?;
        if width == ATLAS_TERMINATOR && height == ATLAS_TERMINATOR {
            debug!("atlas entry at {offset} is a terminator, skipping");
            continue;
        }
        let (width, height) = (u32::from(width), u32::from(height));
        check_dimensions("atlas sprite", width, height, RLE_MAX_WIDTH, RLE_MAX_HEIGHT)?;

        total_height += height;
        if total_height > ATLAS_MAX_HEIGHT {
            return Err(Error::invalid_format(format!(
                "atlas height exceeds {ATLAS_MAX_HEIGHT}"
            )));
        }
        entries.push(AtlasEntry {
            width,
            height,
            data: sub.remaining_slice(),
        });
    }

    let Some(width) = entries.iter().map(|e| e.width).max() else {
        return Err(Error::invalid_format("atlas contains no sprites"));
    };
    debug!(
        "atlas: {} of {count} entries, {width}x{total_height}",
        entries.len()
    );

    let stride = width as usize;
    let mut pixels = vec![0u8; pixel_count(width, total_height)];
    let mut frames = Vec::with_capacity(entries.len());
    let mut y = 0u32;
    for entry in &entries {
        let len = pixel_count(entry.width, entry.height);
        let decoded = fit_to_length(decode_rle(entry.data, len), len);
        for (row, src) in decoded.chunks_exact(entry.width as usize).enumerate() {
            let start = (y as usize + row) * stride;
            pixels[start..start + src.len()].copy_from_slice(src);
        }
        frames.push(Frame {
            x: 0,
            y,
            width: entry.width,
            height: entry.height,
        });
        y += entry.height;
    }

    IndexedImage::new(width, total_height, pixels, frames)
}

fn decode_generic_rle(data: &[u8]) -> Result<IndexedImage> {
    let mut reader = PrsReader::new(data);
    reader.skip(1)?;
    let width = u32::from(reader.read_u16()?);
    let height = u32::from(reader.read_u16()?);
    check_dimensions("RLE", width, height, RLE_MAX_WIDTH, RLE_MAX_HEIGHT)?;

    let len = pixel_count(width, height);
    let decoded = decode_rle(reader.remaining_slice(), len);
    IndexedImage::new(width, height, fit_to_length(decoded, len), Vec::new())
}

/// Whether a raw sprite starts with the PAK loader's `u32` size field.
///
/// A size below 65536 leaves the would-be height at zero, which a bare
/// header can never carry. Larger sizes are recognised when they equal the
/// payload length with or without the field itself.
fn has_size_prefix(data: &[u8]) -> bool {
    let Some(&[a, b, c, d]) = data.first_chunk::<4>() else {
        return false;
    };
    if data.len() < 8 {
        return false;
    }
    let size = u32::from_le_bytes([a, b, c, d]) as usize;
    size >> 16 == 0 || size == data.len() || size + 4 == data.len()
}

fn decode_raw(data: &[u8]) -> Result<IndexedImage> {
    let mut reader = PrsReader::new(data);
    if has_size_prefix(data) {
        let size = reader.read_u32()?;
        trace!("raw sprite carries a {size} byte size field");
    }
    let width = u32::from(reader.read_u16()?);
    let height = u32::from(reader.read_u16()?);
    check_dimensions("raw", width, height, RAW_MAX_DIMENSION, RAW_MAX_DIMENSION)?;

    let len = pixel_count(width, height);
    let pixels = fit_to_length(reader.read_up_to(len).to_vec(), len);
    let frames = read_frame_table(&mut reader, width, height)?;

    IndexedImage::new(width, height, pixels, frames)
}

/// Optional trailing frame table of a raw sprite.
fn read_frame_table(reader: &mut PrsReader<'_>, width: u32, height: u32) -> Result<Vec<Frame>> {
    if reader.remaining() < 2 {
        return Ok(Vec::new());
    }
    let count = reader.read_u16()?;
    if count == 0 || count >= MAX_RAW_FRAMES {
        debug!("ignoring frame table with {count} entries");
        return Ok(Vec::new());
    }

    let mut frames = Vec::new();
    for i in 0..count {
        if reader.remaining() < 8 {
            warn!("frame table truncated after {i} of {count} frames");
            break;
        }
        let frame = Frame {
            x: u32::from(reader.read_u16()?),
            y: u32::from(reader.read_u16()?),
            width: u32::from(reader.read_u16()?),
            height: u32::from(reader.read_u16()?),
        };
        if frame.fits(width, height) {
            frames.push(frame);
        } else {
            warn!("dropping frame {i} {frame:?}: outside {width}x{height} image");
        }
    }
    Ok(frames)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use crate::compression::encode_rle;

    fn decode(data: &[u8]) -> Result<IndexedImage> {
        decode_sprite_bytes(data, &Palette::default_palette())
    }

    fn assert_invalid(data: &[u8]) {
        let err = decode(data).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidFormat, "{err}");
    }

    fn header(prefix: &[u8], width: u16, height: u16) -> Vec<u8> {
        let mut data = prefix.to_vec();
        data.extend_from_slice(&width.to_le_bytes());
        data.extend_from_slice(&height.to_le_bytes());
        data
    }

    fn encode_png(img: &image::RgbaImage) -> Vec<u8> {
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn test_classify_order() {
        assert_eq!(SpriteFormat::classify(&[0x89, b'P', b'N', b'G', 0x0D]), SpriteFormat::Png);
        assert_eq!(SpriteFormat::classify(b"WPR\0"), SpriteFormat::Wallpaper);
        assert_eq!(SpriteFormat::classify(&[0xC0]), SpriteFormat::VectorCommand);
        assert_eq!(SpriteFormat::classify(&[0xFF, 0x01]), SpriteFormat::VectorCommand);
        assert_eq!(SpriteFormat::classify(&[0x02]), SpriteFormat::MultiAtlas);
        assert_eq!(SpriteFormat::classify(&[0x01]), SpriteFormat::GenericRle);
        assert_eq!(SpriteFormat::classify(&[0x80]), SpriteFormat::RawUncompressed);
        assert_eq!(SpriteFormat::classify(&[]), SpriteFormat::RawUncompressed);
    }

    #[test]
    fn test_atlas_stacks_sub_sprites() {
        let sprite = {
            let mut s = header(&[], 4, 2);
            s.extend(encode_rle(&[7; 8]));
            s
        };
        // format, count, three offsets
        let table_len = 1 + 2 + 3 * 4;
        let mut data = vec![FORMAT_ATLAS];
        data.extend_from_slice(&3u16.to_le_bytes());
        for off in [table_len, table_len + sprite.len(), table_len + 2 * sprite.len()] {
            data.extend_from_slice(&(off as u32).to_le_bytes());
        }
        data.extend_from_slice(&sprite);
        data.extend_from_slice(&sprite);
        data.extend_from_slice(&[0xFF; 4]);

        let img = decode(&data).unwrap();
        assert_eq!((img.width, img.height), (4, 4));
        assert!(img.pixels.iter().all(|&p| p == 7));
        assert_eq!(
            img.frames,
            vec![
                Frame { x: 0, y: 0, width: 4, height: 2 },
                Frame { x: 0, y: 2, width: 4, height: 2 },
            ]
        );
    }

    #[test]
    fn test_atlas_pads_narrow_rows() {
        let mut wide = header(&[], 3, 1);
        wide.extend(encode_rle(&[5; 3]));
        let mut narrow = header(&[], 1, 1);
        narrow.extend(encode_rle(&[9]));

        let mut data = vec![FORMAT_ATLAS];
        data.extend_from_slice(&2u16.to_le_bytes());
        data.extend_from_slice(&11u32.to_le_bytes());
        data.extend_from_slice(&(11 + wide.len() as u32).to_le_bytes());
        data.extend(wide);
        data.extend(narrow);

        let img = decode(&data).unwrap();
        assert_eq!((img.width, img.height), (3, 2));
        assert_eq!(img.pixels, vec![5, 5, 5, 9, 0, 0]);
    }

    #[test]
    fn test_atlas_rejects_bad_input() {
        // Only a terminator
        let mut data = vec![FORMAT_ATLAS];
        data.extend_from_slice(&1u16.to_le_bytes());
        data.extend_from_slice(&7u32.to_le_bytes());
        data.extend_from_slice(&[0xFF; 4]);
        assert_invalid(&data);

        // Offset past the end
        let mut data = vec![FORMAT_ATLAS];
        data.extend_from_slice(&1u16.to_le_bytes());
        data.extend_from_slice(&500u32.to_le_bytes());
        assert_invalid(&data);

        // Zero and oversized sub-sprites
        for (w, h) in [(0, 2), (4, 0), (801, 1), (1, 601)] {
            let mut data = vec![FORMAT_ATLAS];
            data.extend_from_slice(&1u16.to_le_bytes());
            data.extend_from_slice(&7u32.to_le_bytes());
            data.extend(header(&[], w, h));
            assert_invalid(&data);
        }
    }

    #[test]
    fn test_atlas_height_ceiling() {
        let mut data = vec![FORMAT_ATLAS];
        data.extend_from_slice(&14u16.to_le_bytes());
        let table_len = 3 + 14 * 4;
        for i in 0..14 {
            data.extend_from_slice(&((table_len + i * 4) as u32).to_le_bytes());
        }
        for _ in 0..14 {
            data.extend(header(&[], 1, 600));
        }
        assert_invalid(&data);
    }

    #[test]
    fn test_generic_rle() {
        let mut data = header(&[FORMAT_RLE], 3, 2);
        data.extend(encode_rle(&[1, 1, 2, 2, 2, 3]));
        let img = decode(&data).unwrap();
        assert_eq!(img.pixels, vec![1, 1, 2, 2, 2, 3]);
        assert!(img.frames.is_empty());

        // Short streams are padded, long ones truncated.
        let mut short = header(&[FORMAT_RLE], 2, 2);
        short.extend_from_slice(&[2, 9]);
        assert_eq!(decode(&short).unwrap().pixels, vec![9, 9, 0, 0]);
        let mut long = header(&[FORMAT_RLE], 1, 1);
        long.extend_from_slice(&[200, 4]);
        assert_eq!(decode(&long).unwrap().pixels, vec![4]);
    }

    #[test]
    fn test_generic_rle_dimension_limits() {
        for (w, h) in [(0, 1), (1, 0), (801, 1), (1, 601)] {
            assert_invalid(&header(&[FORMAT_RLE], w, h));
        }
    }

    #[test]
    fn test_raw_with_frame_table() {
        let mut data = header(&[], 4, 2);
        data.extend(0..8u8);
        data.extend_from_slice(&3u16.to_le_bytes());
        for rect in [[0u16, 0, 2, 2], [2, 0, 2, 2], [3, 1, 5, 5]] {
            for v in rect {
                data.extend_from_slice(&v.to_le_bytes());
            }
        }

        let img = decode(&data).unwrap();
        assert_eq!(img.pixels, (0..8).collect::<Vec<u8>>());
        // The last rectangle leaves the image and is dropped.
        assert_eq!(img.frames.len(), 2);
        let second = img.crop(&img.frames[1]).unwrap();
        assert_eq!(second.pixels, vec![2, 3, 6, 7]);
    }

    #[test]
    fn test_raw_with_pak_size_field() {
        let mut data = 22u32.to_le_bytes().to_vec();
        data.extend(header(&[], 4, 2));
        data.extend([7; 8]);
        data.extend_from_slice(&1u16.to_le_bytes());
        for v in [0u16, 0, 4, 2] {
            data.extend_from_slice(&v.to_le_bytes());
        }
        assert_eq!(SpriteFormat::classify(&data), SpriteFormat::RawUncompressed);

        let img = decode(&data).unwrap();
        assert_eq!((img.width, img.height), (4, 2));
        assert_eq!(img.pixels, vec![7; 8]);
        assert_eq!(img.frames, vec![Frame { x: 0, y: 0, width: 4, height: 2 }]);
    }

    #[test]
    fn test_large_pak_size_field_matches_length() {
        // 300x300 pixels push the size past 16 bits.
        let mut data = Vec::new();
        data.extend(header(&[], 300, 300));
        data.extend(vec![3; 90_000]);
        let size = data.len() as u32;
        data.splice(0..0, size.to_le_bytes());

        let img = decode(&data).unwrap();
        assert_eq!((img.width, img.height), (300, 300));
        assert!(img.frames.is_empty());
    }

    #[test]
    fn test_raw_short_pixels_are_padded() {
        let mut data = header(&[], 3, 1);
        data.push(4);
        let img = decode(&data).unwrap();
        assert_eq!(img.pixels, vec![4, 0, 0]);
        assert!(img.frames.is_empty());
    }

    #[test]
    fn test_raw_dimension_limits() {
        assert_invalid(&header(&[], 0, 5));
        assert_invalid(&header(&[], 4, 0));
        assert_invalid(&header(&[], 1280, 1));
        assert_invalid(&header(&[], 4, 2000));
    }

    #[test]
    fn test_wallpaper() {
        let mut data = WALLPAPER_MAGIC.to_vec();
        data.extend_from_slice(&[3, 0, 4, 8, 5]);
        let img = decode(&data).unwrap();
        assert_eq!((img.width, img.height), (WALLPAPER_WIDTH, WALLPAPER_HEIGHT));
        assert_eq!(&img.pixels[..7], &[3, 8, 8, 8, 8, 5, 0]);
        assert_eq!(img.pixels.len(), 640 * 480);
    }

    #[test]
    fn test_wallpaper_truncates_overflow() {
        let mut data = WALLPAPER_MAGIC.to_vec();
        for _ in 0..1300 {
            data.extend_from_slice(&[0, 255, 6]);
        }
        let img = decode(&data).unwrap();
        assert_eq!(img.pixels.len(), 640 * 480);
        assert!(img.pixels.iter().all(|&p| p == 6));
    }

    #[test]
    fn test_vector_commands() {
        let data = [
            0xC0, // format
            0x02, // y = 2
            0x83, // x = 3
            0x42, 0x05, // two pixels of 5
            0x01, // y = 1
            0x41, 0x09, // one pixel of 9 at x = 0
            0x00, // end
            0x7F, 0x7F, // ignored
        ];
        let img = decode(&data).unwrap();
        // max x extent 5, max y 2, plus padding
        assert_eq!((img.width, img.height), (6, 4));
        assert_eq!(img.pixel(3, 2), Some(5));
        assert_eq!(img.pixel(4, 2), Some(5));
        assert_eq!(img.pixel(0, 1), Some(9));
        assert_eq!(img.pixel(5, 2), Some(0));
        assert_eq!(img.pixel(6, 0), None);
        assert_eq!(img.pixel(0, 4), None);
        assert_eq!(img.pixels.iter().filter(|&&p| p != 0).count(), 3);
    }

    #[test]
    fn test_vector_rejects_empty_and_truncated_streams() {
        assert_invalid(&[0xC0]);
        assert_invalid(&[0xC0, 0x05, 0x85, 0x40, 0x03, 0x00]);
        let err = decode(&[0xC0, 0x01, 0x43]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TruncatedInput);
    }

    #[test]
    fn test_vector_width_ceiling() {
        let mut data = vec![0xC0, 0x01];
        for _ in 0..20 {
            data.extend_from_slice(&[0x7F, 0x01]);
        }
        assert_invalid(&data);
    }

    #[test]
    fn test_png_requantizes() {
        let mut img = image::RgbaImage::new(3, 1);
        img.put_pixel(0, 0, image::Rgba([255, 0, 0, 255]));
        img.put_pixel(1, 0, image::Rgba([255, 0, 0, 10]));
        img.put_pixel(2, 0, image::Rgba([0, 0, 0, 200]));
        let data = encode_png(&img);

        let sprite = decode(&data).unwrap();
        assert_eq!((sprite.width, sprite.height), (3, 1));
        assert_eq!(sprite.pixels, vec![0xE0, TRANSPARENT_INDEX, 1]);
    }

    #[test]
    fn test_png_dimension_limits() {
        let wide = encode_png(&image::RgbaImage::new(PNG_MAX_DIMENSION + 1, 1));
        assert_invalid(&wide);

        // Zero width in IHDR
        let mut zero = encode_png(&image::RgbaImage::new(1, 1));
        zero[16..20].copy_from_slice(&0u32.to_be_bytes());
        assert_invalid(&zero);

        assert_invalid(&PNG_SIGNATURE);
    }

    #[test]
    fn test_to_rgba_and_crop() {
        let img = IndexedImage::new(2, 1, vec![0, 255], Vec::new()).unwrap();
        let palette = Palette::default_palette();
        assert_eq!(img.to_rgba(&palette), vec![0, 0, 0, 0, 255, 255, 255, 255]);

        let outside = Frame { x: 1, y: 0, width: 2, height: 1 };
        assert!(img.crop(&outside).is_err());
        assert!(IndexedImage::new(2, 1, vec![0, 255], vec![outside]).is_err());
        assert!(IndexedImage::new(2, 1, vec![0], Vec::new()).is_err());
    }

    #[test]
    fn test_decode_sprite_reads_window() {
        let mut data = vec![0xEE; 3];
        data.extend(header(&[FORMAT_RLE], 1, 1));
        data.extend_from_slice(&[1, 4]);
        data.push(0xEE);
        let mut reader = PrsReader::new(&data);
        reader.seek(3);
        let img = decode_sprite(&mut reader, 7, &Palette::default_palette()).unwrap();
        assert_eq!(img.pixels, vec![4]);
        assert_eq!(reader.position(), 10);

        reader.seek(3);
        assert!(decode_sprite(&mut reader, 100, &Palette::default_palette()).is_err());
    }
}
