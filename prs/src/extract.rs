//! Batch extraction over directory files.
//!
//! [`Extractor`] walks every record of a directory, keeps the active palette
//! for its packed-data file and hands decoded assets to an [`AssetSink`].
//! Nothing here returns an error: failures become [`Diagnostic`]s and the
//! batch moves on to the next record or directory.

use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::archive::{Asset, PackedFile};
use crate::audio::PcmBuffer;
use crate::directory::{AssetKind, AssetRecord, DirectoryFile, parse_directory};
use crate::error::Error;
use crate::palette::{CluLayout, Palette};
use crate::sprite::IndexedImage;

/// Receives decoded assets. Implemented by whatever writes them out.
pub trait AssetSink {
    /// Called once per directory before any of its records.
    fn begin_directory(&mut self, _directory: &DirectoryFile) -> io::Result<()> {
        Ok(())
    }

    fn sound(&mut self, record: &AssetRecord, pcm: &PcmBuffer) -> io::Result<()>;

    fn image(
        &mut self,
        record: &AssetRecord,
        image: &IndexedImage,
        palette: &Palette,
    ) -> io::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractOptions {
    pub clu_layout: CluLayout,
    /// Look for an embedded CLU block when a sprite comes before any CLU record.
    pub scan_for_palette: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            clu_layout: CluLayout::default(),
            scan_for_palette: true,
        }
    }
}

/// How much work a failure threw away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Directory,
    Asset,
}

#[derive(Debug)]
pub struct Diagnostic {
    pub scope: Scope,
    pub path: PathBuf,
    /// `name (TYPE #id)` for asset diagnostics.
    pub record: Option<String>,
    pub error: Error,
}

#[derive(Debug, Default)]
pub struct DirectoryReport {
    pub path: PathBuf,
    pub container: Option<PathBuf>,
    pub declared: usize,
    pub records: usize,
    pub sounds: usize,
    pub images: usize,
    pub palettes: usize,
    pub unsupported: usize,
    pub diagnostics: Vec<Diagnostic>,
}

impl DirectoryReport {
    fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            ..Default::default()
        }
    }

    fn directory_failure(mut self, error: Error) -> Self {
        warn!("skipping {}: {error}", self.path.display());
        self.diagnostics.push(Diagnostic {
            scope: Scope::Directory,
            path: self.path.clone(),
            record: None,
            error,
        });
        self
    }

    fn asset_failure(&mut self, record: &AssetRecord, error: Error) {
        let label = format!(
            "{} ({} #{})",
            record.display_name(),
            record.asset_type,
            record.id
        );
        warn!("{}: skipping {label}: {error}", self.path.display());
        self.diagnostics.push(Diagnostic {
            scope: Scope::Asset,
            path: self.path.clone(),
            record: Some(label),
            error,
        });
    }

    pub fn extracted(&self) -> usize {
        self.sounds + self.images
    }
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub directories: Vec<DirectoryReport>,
}

impl BatchReport {
    pub fn extracted(&self) -> usize {
        self.directories.iter().map(DirectoryReport::extracted).sum()
    }

    pub fn diagnostics(&self) -> impl Iterator<Item = &Diagnostic> {
        self.directories.iter().flat_map(|d| d.diagnostics.iter())
    }
}

#[derive(Debug, Clone, Default)]
pub struct Extractor {
    options: ExtractOptions,
}

impl Extractor {
    pub fn new(options: ExtractOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ExtractOptions {
        &self.options
    }

    pub fn extract_all<I, P>(&self, paths: I, sink: &mut impl AssetSink) -> BatchReport
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut report = BatchReport::default();
        for path in paths {
            let directory = self.extract_directory(path.as_ref(), sink);
            report.directories.push(directory);
        }
        report
    }

    pub fn extract_directory(&self, path: &Path, sink: &mut impl AssetSink) -> DirectoryReport {
        let report = DirectoryReport::new(path);

        let directory = match parse_directory(path) {
            Ok(directory) => directory,
            Err(e) => return report.directory_failure(e),
        };
        if let Err(e) = sink.begin_directory(&directory) {
            return report.directory_failure(e.into());
        }
        let packed = match PackedFile::open(&directory.container_path) {
            Ok(packed) => packed,
            Err(e) => return report.directory_failure(e),
        };

        let mut report = DirectoryReport {
            container: Some(directory.container_path.clone()),
            declared: directory.declared_count,
            records: directory.records.len(),
            ..report
        };
        info!(
            "{}: {} records ({} declared) in {}",
            path.display(),
            report.records,
            report.declared,
            packed.path().display()
        );

        self.extract_records(&directory, &packed, sink, &mut report);

        info!(
            "{}: {} extracted, {} diagnostics",
            path.display(),
            report.extracted(),
            report.diagnostics.len()
        );
        report
    }

    fn extract_records(
        &self,
        directory: &DirectoryFile,
        packed: &PackedFile,
        sink: &mut impl AssetSink,
        report: &mut DirectoryReport,
    ) {
        let layout = self.options.clu_layout;
        let mut palette = Palette::default_palette();
        let mut palette_seen = false;

        for record in &directory.records {
            debug!(
                "{:<20} | {:<10} | {:<10} | {:<10} | {:<10}",
                record.display_name(),
                record.asset_type,
                record.offset,
                record.length,
                record.id
            );

            if record.kind() == AssetKind::Sprite && !palette_seen {
                palette_seen = true;
                if self.options.scan_for_palette {
                    if let Some(embedded) = packed.embedded_palette(layout) {
                        palette = embedded;
                    }
                }
            }

            let asset = match packed.decode(record, &palette, layout) {
                Ok(asset) => asset,
                Err(e) => {
                    report.asset_failure(record, e);
                    continue;
                }
            };

            match asset {
                Asset::Sound(pcm) => match sink.sound(record, &pcm) {
                    Ok(()) => report.sounds += 1,
                    Err(e) => report.asset_failure(record, e.into()),
                },
                Asset::Image(image) => match sink.image(record, &image, &palette) {
                    Ok(()) => report.images += 1,
                    Err(e) => report.asset_failure(record, e.into()),
                },
                Asset::Palette(loaded) => {
                    debug!("palette from {}", record.display_name());
                    palette = loaded;
                    palette_seen = true;
                    report.palettes += 1;
                }
                Asset::Unsupported(tag) => {
                    debug!("no decoder for {tag} record {}", record.id);
                    report.unsupported += 1;
                }
            }
        }
    }
}
