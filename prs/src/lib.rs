//! Decoder for PRD/PRS game resource archives.
//!
//! A `.PRD` directory file names one `.PRS` packed-data file and lists the
//! records stored in it: 8-bit sounds, MS-ADPCM wave files, palettes and
//! sprites in several encodings. This crate parses the directory, decodes
//! each record to PCM or indexed pixels, and drives whole batches through an
//! [`AssetSink`].
//!
//! # Example
//!
//! ```ignore
//! use prs::{parse_directory, Asset, CluLayout, PackedFile, Palette};
//!
//! let directory = parse_directory("DATA/LEVEL1.PRD").unwrap();
//! let packed = PackedFile::open(&directory.container_path).unwrap();
//!
//! let palette = Palette::default_palette();
//! for record in &directory.records {
//!     match packed.decode(record, &palette, CluLayout::default()).unwrap() {
//!         Asset::Image(image) => println!("{}: {}x{}", record.name, image.width, image.height),
//!         Asset::Sound(pcm) => println!("{}: {} frames", record.name, pcm.frame_count()),
//!         _ => {}
//!     }
//! }
//! ```

mod archive;
pub mod audio;
pub mod compression;
mod directory;
mod error;
mod extract;
mod nibbles;
pub mod palette;
pub mod reader;
pub mod sprite;

pub use archive::{Asset, PackedFile};
pub use audio::{PcmBuffer, decode_ms_adpcm, pcm8_to_pcm16};
pub use directory::{
    AssetKind, AssetRecord, DirectoryFile, parse_directory, parse_directory_bytes,
};
pub use error::{Error, ErrorKind, Result};
pub use extract::{
    AssetSink, BatchReport, Diagnostic, DirectoryReport, ExtractOptions, Extractor, Scope,
};
pub use palette::{CluLayout, Palette, PaletteEntry};
pub use sprite::{Frame, IndexedImage, SpriteFormat, decode_sprite, decode_sprite_bytes};
