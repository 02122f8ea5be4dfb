//! Read-only access to a parsed archive.
//!
//! [`HrxArchive`] owns the parsed tree but only exposes the [`ReadFs`] operations on it, so
//! consumers of an archive can never modify it.

use std::{
    fs::File as StdFile,
    io::{self, BufReader, Read},
    path::Path,
};

use glob::{MatchOptions, Pattern};
use log::debug;

use crate::{
    error::Result,
    parse::ingest,
    tree::{Directory, FileSystem, Inode, ResolvedRef, TreeError},
};

/// Metadata about a file or directory in an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    name: String,
    len: u64,
    mode: u32,
    is_dir: bool,
}

impl Metadata {
    fn new(name: &str, node: ResolvedRef<'_>) -> Self {
        match node {
            ResolvedRef::Directory(dir) => Self {
                name: name.to_string(),
                len: 0,
                mode: dir.stat.st_mode,
                is_dir: true,
            },
            ResolvedRef::Leaf(leaf) => Self {
                name: name.to_string(),
                len: leaf.content.len() as u64,
                mode: leaf.stat.st_mode,
                is_dir: false,
            },
        }
    }

    /// The base name of the file, or `"."` for the root of a view.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The length of the content in bytes.  Always 0 for directories.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The permission bits.
    pub fn mode(&self) -> u32 {
        self.mode
    }

    pub fn is_dir(&self) -> bool {
        self.is_dir
    }

    pub fn is_file(&self) -> bool {
        !self.is_dir
    }
}

/// An entry returned by [`ReadFs::read_dir()`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    metadata: Metadata,
}

impl DirEntry {
    pub fn name(&self) -> &str {
        self.metadata.name()
    }

    pub fn is_dir(&self) -> bool {
        self.metadata.is_dir()
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }
}

/// An open file or directory in an archive.
///
/// Reading from a directory fails.
#[derive(Debug)]
pub struct File<'a> {
    node: ResolvedRef<'a>,
    metadata: Metadata,
    pos: usize,
}

impl File<'_> {
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }
}

impl Read for File<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let content = match self.node {
            ResolvedRef::Leaf(leaf) => &leaf.content[self.pos..],
            ResolvedRef::Directory(..) => {
                return Err(io::Error::other(TreeError::IsADirectory(
                    self.metadata.name.as_str().into(),
                )))
            }
        };

        let n = content.len().min(buf.len());
        buf[..n].copy_from_slice(&content[..n]);
        self.pos += n;
        Ok(n)
    }
}

/// The read-only operations available on an archive and on any of its subtrees.
///
/// All names are `/`-separated and relative to the root of the view; `"."` names the root itself.
pub trait ReadFs {
    /// Opens the file or directory at `name`.
    fn open(&self, name: &str) -> std::result::Result<File<'_>, TreeError>;

    /// Reads the whole content of the regular file at `name`.
    fn read_file(&self, name: &str) -> std::result::Result<Vec<u8>, TreeError>;

    /// Returns the metadata of the file or directory at `name`.
    fn stat(&self, name: &str) -> std::result::Result<Metadata, TreeError>;

    /// Lists the directory at `name`, sorted by filename.
    fn read_dir(&self, name: &str) -> std::result::Result<Vec<DirEntry>, TreeError>;

    /// Returns the names of all files and directories matching `pattern`, sorted.
    ///
    /// The pattern syntax is that of shell globs (`*`, `?`, `[...]`); wildcards never match `/`.
    fn glob(&self, pattern: &str) -> std::result::Result<Vec<String>, TreeError>;

    /// Returns a view of the subtree rooted at the directory `dir`.
    fn sub(&self, dir: &str) -> std::result::Result<View<'_>, TreeError>;
}

/// A read-only view of a directory of an archive.
#[derive(Debug, Clone, Copy)]
pub struct View<'a> {
    root: &'a Directory,
}

fn basename(name: &str) -> &str {
    match name.trim_end_matches('/').rsplit_once('/') {
        Some((_, base)) => base,
        None => match name.trim_end_matches('/') {
            "" => ".",
            base => base,
        },
    }
}

// `**` has no recursive meaning here: a run of stars is a single star
fn collapse_stars(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    for c in pattern.chars() {
        if c != '*' || !out.ends_with('*') {
            out.push(c);
        }
    }
    out
}

fn walk(dir: &Directory, prefix: &str, out: &mut Vec<String>) {
    for (name, inode) in dir.entries() {
        let path = match prefix {
            "" => name.to_string(),
            _ => format!("{prefix}/{name}"),
        };

        if let Inode::Directory(subdir) = inode {
            walk(subdir, &path, out);
        }
        out.push(path);
    }
}

impl<'a> View<'a> {
    pub fn new(root: &'a Directory) -> Self {
        Self { root }
    }

    /// The directory at the root of this view.
    pub fn root(&self) -> &'a Directory {
        self.root
    }

    fn resolve(&self, name: &str) -> std::result::Result<ResolvedRef<'a>, TreeError> {
        self.root
            .resolve(name)?
            .ok_or_else(|| TreeError::NotFound(name.into()))
    }

    /// All paths in this view, sorted.
    pub fn paths(&self) -> Vec<String> {
        let mut out = vec![];
        walk(self.root, "", &mut out);
        out.sort();
        out
    }
}

impl ReadFs for View<'_> {
    fn open(&self, name: &str) -> std::result::Result<File<'_>, TreeError> {
        let node = self.resolve(name)?;
        Ok(File {
            node,
            metadata: Metadata::new(basename(name), node),
            pos: 0,
        })
    }

    fn read_file(&self, name: &str) -> std::result::Result<Vec<u8>, TreeError> {
        match self.resolve(name)? {
            ResolvedRef::Leaf(leaf) => Ok(leaf.content.to_vec()),
            ResolvedRef::Directory(..) => Err(TreeError::IsADirectory(name.into())),
        }
    }

    fn stat(&self, name: &str) -> std::result::Result<Metadata, TreeError> {
        Ok(Metadata::new(basename(name), self.resolve(name)?))
    }

    fn read_dir(&self, name: &str) -> std::result::Result<Vec<DirEntry>, TreeError> {
        let dir = match self.resolve(name)? {
            ResolvedRef::Directory(dir) => dir,
            ResolvedRef::Leaf(..) => return Err(TreeError::NotADirectory(name.into())),
        };

        Ok(dir
            .entries()
            .map(|(filename, inode)| {
                let node = match inode {
                    Inode::Directory(subdir) => ResolvedRef::Directory(subdir),
                    Inode::Leaf(leaf) => ResolvedRef::Leaf(leaf),
                };
                DirEntry {
                    metadata: Metadata::new(filename, node),
                }
            })
            .collect())
    }

    fn glob(&self, pattern: &str) -> std::result::Result<Vec<String>, TreeError> {
        let pattern = Pattern::new(&collapse_stars(pattern))?;
        let options = MatchOptions {
            case_sensitive: true,
            require_literal_separator: true,
            require_literal_leading_dot: false,
        };

        Ok(self
            .paths()
            .into_iter()
            .filter(|path| pattern.matches_with(path, options))
            .collect())
    }

    fn sub(&self, dir: &str) -> std::result::Result<View<'_>, TreeError> {
        Ok(View::new(self.root.get_directory(dir)?))
    }
}

/// A parsed archive.
#[derive(Debug)]
pub struct HrxArchive {
    fs: FileSystem,
}

impl HrxArchive {
    /// Parses the archive file at `path`.
    pub fn open_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("opening archive {path:?}");
        Self::from_reader(BufReader::new(StdFile::open(path)?))
    }

    /// Parses an archive from a buffered reader.
    pub fn from_reader(reader: impl io::BufRead) -> Result<Self> {
        let mut fs = FileSystem::new();
        ingest(reader, &mut fs)?;
        Ok(Self { fs })
    }

    /// Parses an archive held in memory.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::from_reader(bytes)
    }

    /// A view of the whole archive.
    pub fn view(&self) -> View<'_> {
        View::new(&self.fs.root)
    }
}

impl ReadFs for HrxArchive {
    fn open(&self, name: &str) -> std::result::Result<File<'_>, TreeError> {
        let node = self.view().resolve(name)?;
        Ok(File {
            node,
            metadata: Metadata::new(basename(name), node),
            pos: 0,
        })
    }

    fn read_file(&self, name: &str) -> std::result::Result<Vec<u8>, TreeError> {
        self.view().read_file(name)
    }

    fn stat(&self, name: &str) -> std::result::Result<Metadata, TreeError> {
        self.view().stat(name)
    }

    fn read_dir(&self, name: &str) -> std::result::Result<Vec<DirEntry>, TreeError> {
        self.view().read_dir(name)
    }

    fn glob(&self, pattern: &str) -> std::result::Result<Vec<String>, TreeError> {
        self.view().glob(pattern)
    }

    fn sub(&self, dir: &str) -> std::result::Result<View<'_>, TreeError> {
        Ok(View::new(self.fs.root.get_directory(dir)?))
    }
}
