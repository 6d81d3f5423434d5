//! Writes decoded assets to disk as WAV and PNG files.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use image::RgbaImage;
use prs::{AssetRecord, AssetSink, DirectoryFile, IndexedImage, Palette, PcmBuffer};
use tracing::debug;

/// Output folders and names already handed out for one directory file.
struct DirectoryOutput {
    audio: PathBuf,
    sprites: PathBuf,
    used: HashSet<String>,
}

impl DirectoryOutput {
    /// A stem no earlier record of this directory has taken. Names are
    /// compared case-insensitively so the result is safe on any filesystem.
    fn unique_stem(&mut self, record: &AssetRecord) -> String {
        let base = record.file_stem();
        let mut stem = base.clone();
        let mut n = 1;
        while !self.used.insert(stem.to_ascii_lowercase()) {
            stem = if n == 1 {
                format!("{base}_{}", record.id)
            } else {
                format!("{base}_{}_{n}", record.id)
            };
            n += 1;
        }
        stem
    }
}

pub struct FileSink {
    root: PathBuf,
    write_frames: bool,
    current: Option<DirectoryOutput>,
    pub files_written: usize,
}

impl FileSink {
    pub fn new(root: impl Into<PathBuf>, write_frames: bool) -> Self {
        Self {
            root: root.into(),
            write_frames,
            current: None,
            files_written: 0,
        }
    }

    fn output(&mut self) -> io::Result<&mut DirectoryOutput> {
        self.current
            .as_mut()
            .ok_or_else(|| io::Error::other("asset written before its directory was opened"))
    }
}

fn hound_error(e: hound::Error) -> io::Error {
    match e {
        hound::Error::IoError(e) => e,
        other => io::Error::other(other),
    }
}

fn image_error(e: image::ImageError) -> io::Error {
    match e {
        image::ImageError::IoError(e) => e,
        other => io::Error::other(other),
    }
}

pub fn write_wav(path: &Path, pcm: &PcmBuffer) -> io::Result<()> {
    let spec = hound::WavSpec {
        channels: pcm.channel_count,
        sample_rate: pcm.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).map_err(hound_error)?;
    for &sample in &pcm.samples {
        writer.write_sample(sample).map_err(hound_error)?;
    }
    writer.finalize().map_err(hound_error)
}

pub fn write_png(path: &Path, image: &IndexedImage, palette: &Palette) -> io::Result<()> {
    let rgba = RgbaImage::from_raw(image.width, image.height, image.to_rgba(palette))
        .ok_or_else(|| io::Error::other("pixel buffer does not match image size"))?;
    rgba.save_with_format(path, image::ImageFormat::Png)
        .map_err(image_error)
}

impl AssetSink for FileSink {
    fn begin_directory(&mut self, directory: &DirectoryFile) -> io::Result<()> {
        let stem = directory
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "resources".to_string());
        let base = self.root.join(stem);
        let output = DirectoryOutput {
            audio: base.join("audio"),
            sprites: base.join("sprites"),
            used: HashSet::new(),
        };
        fs::create_dir_all(&output.audio)?;
        fs::create_dir_all(&output.sprites)?;
        self.current = Some(output);
        Ok(())
    }

    fn sound(&mut self, record: &AssetRecord, pcm: &PcmBuffer) -> io::Result<()> {
        let output = self.output()?;
        let stem = output.unique_stem(record);
        let path = output.audio.join(format!("{stem}.wav"));
        write_wav(&path, pcm)?;
        debug!("wrote {}", path.display());
        self.files_written += 1;
        Ok(())
    }

    fn image(
        &mut self,
        record: &AssetRecord,
        image: &IndexedImage,
        palette: &Palette,
    ) -> io::Result<()> {
        let write_frames = self.write_frames;
        let output = self.output()?;
        let stem = output.unique_stem(record);
        let sprites = output.sprites.clone();

        let path = sprites.join(format!("{stem}.png"));
        write_png(&path, image, palette)?;
        debug!("wrote {}", path.display());
        self.files_written += 1;

        if write_frames && !image.frames.is_empty() {
            let frame_dir = sprites.join(&stem);
            fs::create_dir_all(&frame_dir)?;
            for (i, frame) in image.frames.iter().enumerate() {
                let Ok(crop) = image.crop(frame) else {
                    continue;
                };
                write_png(&frame_dir.join(format!("frame_{i}.png")), &crop, palette)?;
                self.files_written += 1;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prs::Frame;

    fn record(name: &str, id: i16) -> AssetRecord {
        AssetRecord {
            asset_type: "PAK".into(),
            id,
            name: name.into(),
            offset: 1,
            length: 1,
            container_path: PathBuf::from("X.PRS"),
        }
    }

    fn directory(path: &Path) -> DirectoryFile {
        DirectoryFile {
            path: path.to_path_buf(),
            container_path: path.with_extension("PRS"),
            declared_count: 0,
            records: Vec::new(),
        }
    }

    #[test]
    fn test_unique_stems() {
        let mut output = DirectoryOutput {
            audio: PathBuf::new(),
            sprites: PathBuf::new(),
            used: HashSet::new(),
        };
        assert_eq!(output.unique_stem(&record("HERO", 1)), "HERO");
        assert_eq!(output.unique_stem(&record("hero", 2)), "hero_2");
        assert_eq!(output.unique_stem(&record("", 7)), "7");
        assert_eq!(output.unique_stem(&record("7", 8)), "7_8");
    }

    #[test]
    fn test_writes_wav_and_png_with_frames() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = FileSink::new(dir.path(), true);
        sink.begin_directory(&directory(&dir.path().join("LEVEL1.PRD")))
            .unwrap();

        let pcm = PcmBuffer::new(1, 22_050, vec![0, 100, -100]).unwrap();
        sink.sound(&record("BOOM", 1), &pcm).unwrap();

        let frames = vec![
            Frame { x: 0, y: 0, width: 2, height: 1 },
            Frame { x: 0, y: 1, width: 2, height: 1 },
        ];
        let image = IndexedImage::new(2, 2, vec![0, 1, 2, 255], frames).unwrap();
        sink.image(&record("HERO", 2), &image, &Palette::default_palette())
            .unwrap();

        let base = dir.path().join("LEVEL1");
        let wav = hound::WavReader::open(base.join("audio/BOOM.wav")).unwrap();
        assert_eq!(wav.spec().channels, 1);
        assert_eq!(wav.spec().sample_rate, 22_050);
        assert_eq!(wav.spec().bits_per_sample, 16);
        let samples: Vec<i16> = wav.into_samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(samples, vec![0, 100, -100]);

        let png = image::open(base.join("sprites/HERO.png")).unwrap().to_rgba8();
        assert_eq!(png.dimensions(), (2, 2));
        assert_eq!(png.get_pixel(0, 0).0[3], 0);
        assert_eq!(png.get_pixel(1, 1).0, [255, 255, 255, 255]);
        assert!(base.join("sprites/HERO/frame_0.png").is_file());
        assert!(base.join("sprites/HERO/frame_1.png").is_file());
        assert_eq!(sink.files_written, 4);
    }

    #[test]
    fn test_sound_before_directory_fails() {
        let mut sink = FileSink::new("unused", false);
        let pcm = PcmBuffer::new(1, 22_050, vec![0]).unwrap();
        assert!(sink.sound(&record("A", 1), &pcm).is_err());
    }
}
