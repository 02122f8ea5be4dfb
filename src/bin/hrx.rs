use std::{
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use hrx::{HrxArchive, ReadFs};

/// hrx
#[derive(Debug, Parser)]
#[clap(name = "hrx", version)]
pub struct App {
    #[clap(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Lists a directory of an archive
    Ls {
        archive: PathBuf,
        /// the directory to list, defaulting to the root of the archive
        #[clap(default_value = ".")]
        dir: String,
    },
    /// Writes the content of a file in an archive to stdout
    Cat { archive: PathBuf, path: String },
    /// Shows the metadata of a file or directory in an archive
    Stat { archive: PathBuf, path: String },
    /// Lists the paths in an archive matching a shell pattern
    Glob { archive: PathBuf, pattern: String },
    /// Parses an archive and reports whether it is well-formed
    Check { archive: PathBuf },
    /// Writes the content of an archive to a directory
    Extract {
        archive: PathBuf,
        /// the directory to create the files in
        output_dir: PathBuf,
    },
}

fn open(path: &Path) -> Result<HrxArchive> {
    HrxArchive::open_path(path).with_context(|| format!("Reading archive {path:?}"))
}

fn main() -> Result<()> {
    env_logger::init();

    let args = App::parse();

    match args.cmd {
        Command::Ls { ref archive, ref dir } => {
            let archive = open(archive)?;
            for entry in archive.read_dir(dir)? {
                if entry.is_dir() {
                    println!("{}/", entry.name());
                } else {
                    println!("{}", entry.name());
                }
            }
        }
        Command::Cat { ref archive, ref path } => {
            let archive = open(archive)?;
            let content = archive.read_file(path)?;
            std::io::stdout().write_all(&content)?;
        }
        Command::Stat { ref archive, ref path } => {
            let archive = open(archive)?;
            let metadata = archive.stat(path)?;
            println!("name: {}", metadata.name());
            println!("type: {}", if metadata.is_dir() { "directory" } else { "file" });
            println!("size: {}", metadata.len());
            println!("mode: {:04o}", metadata.mode());
        }
        Command::Glob { ref archive, ref pattern } => {
            let archive = open(archive)?;
            for path in archive.glob(pattern)? {
                println!("{path}");
            }
        }
        Command::Check { ref archive } => {
            let parsed = open(archive)?;
            println!("{archive:?}: {} paths", parsed.view().paths().len());
        }
        Command::Extract { ref archive, ref output_dir } => {
            let archive = open(archive)?;
            hrx::fs::write_to_path(archive.view(), output_dir)?;
        }
    }
    Ok(())
}
