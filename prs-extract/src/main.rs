//! PRD/PRS extraction CLI
//!
//! Lists and extracts the sounds and sprites stored in PRD/PRS resource
//! archives.

use std::path::{Path, PathBuf};

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use prs::{CluLayout, ExtractOptions, Extractor, Scope};
use tracing::warn;
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

mod sink;

use sink::FileSink;

#[derive(Parser)]
#[command(name = "prs-extract")]
#[command(about = "Extract sprites and sounds from PRD/PRS resource archives")]
#[command(version)]
struct Cli {
    /// Log every record (same as RUST_LOG=debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the records of every directory file
    List {
        /// Folder holding the .PRD and .PRS files
        data_dir: PathBuf,
    },

    /// Decode every record to WAV and PNG files
    Extract {
        /// Folder holding the .PRD and .PRS files
        data_dir: PathBuf,

        /// Output folder; one subfolder is created per directory file
        #[arg(short, long, default_value = "extracted")]
        output: PathBuf,

        /// Layout of CLU palette records
        #[arg(long, value_enum, default_value_t = CluLayoutArg::Packed32)]
        clu_layout: CluLayoutArg,

        /// Do not search the packed file for a palette when a sprite
        /// precedes every CLU record
        #[arg(long)]
        no_palette_scan: bool,

        /// Skip writing one PNG per frame rectangle
        #[arg(long = "no-frames", action = ArgAction::SetFalse)]
        frames: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum CluLayoutArg {
    /// u32 0x00RRGGBB entries after a "CLU\0" header
    Packed32,
    /// 3-byte RGB entries after a 4-byte header
    Rgb24,
    /// 6-bit RGB entries after an 8-byte header
    Vga,
}

impl From<CluLayoutArg> for CluLayout {
    fn from(arg: CluLayoutArg) -> Self {
        match arg {
            CluLayoutArg::Packed32 => CluLayout::PACKED32,
            CluLayoutArg::Rgb24 => CluLayout::RGB24,
            CluLayoutArg::Vga => CluLayout::VGA,
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("{0} is not a folder")]
    NotAFolder(PathBuf),
    #[error("no .PRD files in {0}")]
    NoDirectoryFiles(PathBuf),
    #[error("failed to scan data folder: {0}")]
    Walk(#[from] walkdir::Error),
}

/// `*.PRD` files directly inside `data_dir`, sorted by name.
fn find_directory_files(data_dir: &Path) -> Result<Vec<PathBuf>, CliError> {
    if !data_dir.is_dir() {
        return Err(CliError::NotAFolder(data_dir.to_path_buf()));
    }

    let mut found = Vec::new();
    for entry in WalkDir::new(data_dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry?;
        let is_prd = entry.file_type().is_file()
            && entry
                .path()
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("prd"));
        if is_prd {
            found.push(entry.into_path());
        }
    }

    if found.is_empty() {
        return Err(CliError::NoDirectoryFiles(data_dir.to_path_buf()));
    }
    Ok(found)
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn list(data_dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
    for path in find_directory_files(data_dir)? {
        let directory = match prs::parse_directory(&path) {
            Ok(directory) => directory,
            Err(e) => {
                warn!("skipping {}: {e}", path.display());
                continue;
            }
        };

        println!(
            "{} -> {} ({} of {} records)",
            path.display(),
            directory.container_path.display(),
            directory.records.len(),
            directory.declared_count
        );
        println!(
            "{:<20} | {:<10} | {:<10} | {:<10} | {:<10}",
            "Name", "Type", "Offset", "Length", "Id"
        );
        println!("{:-<70}", "");
        for record in &directory.records {
            println!(
                "{:<20} | {:<10} | {:<10} | {:<10} | {:<10}",
                record.display_name(),
                record.asset_type,
                record.offset,
                record.length,
                record.id
            );
        }
        println!();
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::List { data_dir } => list(&data_dir)?,

        Commands::Extract {
            data_dir,
            output,
            clu_layout,
            no_palette_scan,
            frames,
        } => {
            let directories = find_directory_files(&data_dir)?;
            eprintln!(
                "Extracting {} directory files to {}",
                directories.len(),
                output.display()
            );

            let extractor = Extractor::new(ExtractOptions {
                clu_layout: clu_layout.into(),
                scan_for_palette: !no_palette_scan,
            });
            let mut sink = FileSink::new(&output, frames);
            let report = extractor.extract_all(&directories, &mut sink);

            let skipped_dirs = report
                .diagnostics()
                .filter(|d| d.scope == Scope::Directory)
                .count();
            let skipped_assets = report
                .diagnostics()
                .filter(|d| d.scope == Scope::Asset)
                .count();
            eprintln!(
                "Done! {} assets ({} files), {} directory files skipped, {} assets skipped",
                report.extracted(),
                sink.files_written,
                skipped_dirs,
                skipped_assets
            );
        }
    }

    Ok(())
}
