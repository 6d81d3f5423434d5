//! PRD directory files: the index naming a packed-data file and its records.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::reader::PrsReader;

const PREFIX_LEN: usize = 2;
const CONTAINER_NAME_LEN: usize = 256;
const RESERVED_LEN: usize = 12;
const RECORD_RESERVED_LEN: usize = 10;
const TYPE_TAG_LEN: usize = 4;
const RECORD_NAME_LEN: usize = 18;

/// What a record decodes to, derived from its type tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetKind {
    /// `SND`: 8-bit PCM.
    Sound,
    /// `PCM`: RIFF/WAVE with MS-ADPCM data.
    Adpcm,
    /// `PAK`: sprite in one of several encodings.
    Sprite,
    /// `CLU`: colour lookup table.
    Palette,
    Other(String),
}

impl AssetKind {
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim() {
            "SND" => Self::Sound,
            "PCM" => Self::Adpcm,
            "PAK" => Self::Sprite,
            "CLU" => Self::Palette,
            other => Self::Other(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRecord {
    /// Upper-cased type tag, e.g. `SND`.
    pub asset_type: String,
    pub id: i16,
    pub name: String,
    pub offset: i32,
    pub length: i32,
    pub container_path: PathBuf,
}

impl AssetRecord {
    pub fn kind(&self) -> AssetKind {
        AssetKind::from_tag(&self.asset_type)
    }

    /// Label for logs: the name, or `Resource` when it is blank.
    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            "Resource"
        } else {
            &self.name
        }
    }

    /// Filesystem-safe stem: `[A-Za-z0-9_.]` characters of the name, or the
    /// id when none survive.
    pub fn file_stem(&self) -> String {
        let stem: String = self
            .name
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '.')
            .collect();
        if stem.is_empty() {
            self.id.to_string()
        } else {
            stem
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryFile {
    pub path: PathBuf,
    pub container_path: PathBuf,
    /// Record count from the header, including sentinel entries.
    pub declared_count: usize,
    pub records: Vec<AssetRecord>,
}

pub fn parse_directory(path: impl AsRef<Path>) -> Result<DirectoryFile> {
    let path = path.as_ref();
    let data = fs::read(path)?;
    parse_directory_bytes(&data, path)
}

/// Parse directory bytes read from `directory_path`. The packed-data file is
/// resolved next to `directory_path` and must exist.
pub fn parse_directory_bytes(data: &[u8], directory_path: &Path) -> Result<DirectoryFile> {
    let mut reader = PrsReader::new(data);
    reader.skip(PREFIX_LEN)?;

    let container_name = reader.read_codepoint_string(CONTAINER_NAME_LEN)?;
    let container_path = resolve_container(&container_name, directory_path)?;
    debug!(
        "{} references {}",
        directory_path.display(),
        container_path.display()
    );

    reader.skip(RESERVED_LEN)?;
    let declared_count = usize::try_from(reader.read_i16()?).unwrap_or(0);

    let mut records = Vec::with_capacity(declared_count);
    for _ in 0..declared_count {
        reader.skip(RECORD_RESERVED_LEN)?;
        let offset = reader.read_i32()?;
        let asset_type = reader
            .read_codepoint_string(TYPE_TAG_LEN)?
            .to_uppercase();
        let id = reader.read_i16()?;
        let name = reader.read_codepoint_string(RECORD_NAME_LEN)?;
        let length = reader.read_i32()?;

        if offset == 0 || length == 0 {
            trace!("dropping sentinel record {asset_type} #{id} ({offset}, {length})");
            continue;
        }

        records.push(AssetRecord {
            asset_type,
            id,
            name,
            offset,
            length,
            container_path: container_path.clone(),
        });
    }

    Ok(DirectoryFile {
        path: directory_path.to_path_buf(),
        container_path,
        declared_count,
        records,
    })
}

/// The name was written by a DOS tool, so either separator may appear.
fn container_file_name(name: &str) -> &str {
    name.rsplit(['/', '\\']).next().unwrap_or(name).trim()
}

fn resolve_container(name: &str, directory_path: &Path) -> Result<PathBuf> {
    let folder = directory_path.parent().unwrap_or(Path::new(""));
    let file_name = container_file_name(name);
    let missing = |container: PathBuf| Error::MissingContainer {
        directory: directory_path.to_path_buf(),
        container,
    };

    if file_name.is_empty() {
        return Err(missing(folder.to_path_buf()));
    }

    let upper = folder.join(file_name.to_uppercase());
    if upper.is_file() {
        return Ok(upper);
    }
    // Case-sensitive filesystems may hold the name as written.
    let as_written = folder.join(file_name);
    if as_written.is_file() {
        return Ok(as_written);
    }
    Err(missing(upper))
}
