//! An in-memory filesystem tree holding the content of an archive.
//!
//! Regular files are stored inline as byte buffers.  The tree is populated through the [`Sink`]
//! implementation on [`FileSystem`] and then queried read-only through [`crate::archive`].

use std::collections::BTreeMap;

use thiserror::Error;

use crate::parse::Sink;

/// Permission bits given to directories created from an archive.
pub const DIRECTORY_MODE: u32 = 0o700;

/// Permission bits given to regular files created from an archive.
pub const FILE_MODE: u32 = 0o644;

/// File metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stat {
    /// Permission bits.
    pub st_mode: u32,
}

/// A regular file.
#[derive(Debug, Clone)]
pub struct Leaf {
    pub stat: Stat,
    pub content: Box<[u8]>,
}

/// A directory node containing named entries.
#[derive(Debug, Clone)]
pub struct Directory {
    pub stat: Stat,
    pub(crate) entries: BTreeMap<Box<str>, Inode>,
}

/// A filesystem inode, either a directory or a regular file.
#[derive(Debug, Clone)]
pub enum Inode {
    Directory(Box<Directory>),
    Leaf(Leaf),
}

/// Errors that can occur when working with the tree.
#[derive(Error, Debug)]
pub enum TreeError {
    /// The filename contains invalid components (e.g., "..", ".").
    #[error("Invalid filename {0:?}")]
    InvalidFilename(Box<str>),
    /// The specified directory entry does not exist.
    #[error("Directory entry {0:?} does not exist")]
    NotFound(Box<str>),
    /// The entry exists but is not a directory when a directory was expected.
    #[error("Directory entry {0:?} is not a subdirectory")]
    NotADirectory(Box<str>),
    /// The entry is a directory when a regular file was expected.
    #[error("Directory entry {0:?} is a directory")]
    IsADirectory(Box<str>),
    /// A glob pattern could not be parsed.
    #[error("Invalid pattern: {0}")]
    BadPattern(#[from] glob::PatternError),
}

/// Splits a pathname into the names to walk from a directory.
///
/// The pathname may be absolute or relative and it makes no difference.  It may or may not end in
/// "/".  `"."` and `""` name the starting directory itself.  Any other "." or ".." component is an
/// error.
fn components(pathname: &str) -> Result<Vec<&str>, TreeError> {
    if pathname == "." {
        return Ok(vec![]);
    }

    let mut names = vec![];
    for component in pathname.split('/') {
        match component {
            "" => {}
            "." | ".." => return Err(TreeError::InvalidFilename(pathname.into())),
            name => names.push(name),
        }
    }

    Ok(names)
}

impl Inode {
    /// Returns a reference to the metadata for this inode.
    pub fn stat(&self) -> &Stat {
        match self {
            Inode::Directory(dir) => &dir.stat,
            Inode::Leaf(leaf) => &leaf.stat,
        }
    }
}

impl Default for Directory {
    fn default() -> Self {
        Self::new(Stat {
            st_mode: DIRECTORY_MODE,
        })
    }
}

impl Directory {
    /// Creates a new, empty directory with the given metadata.
    pub fn new(stat: Stat) -> Self {
        Self {
            stat,
            entries: BTreeMap::new(),
        }
    }

    /// Iterates over all entries in the current directory, in asciibetical order of name.  The
    /// iterator returns pairs of `(&str, &Inode)`.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &Inode)> {
        self.entries.iter().map(|(k, v)| (k.as_ref(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Gets a reference to a subdirectory of this directory.
    ///
    /// See `components()` for the accepted pathname forms.
    ///
    /// # Arguments
    ///
    ///  * `pathname`: the full pathname of the directory to fetch, taken as being relative to the
    ///    current directory even if it starts with '/'
    ///
    /// # Return value
    ///
    /// On success, this returns a reference to the named directory.
    ///
    /// On failure, can return any number of errors from TreeError.
    pub fn get_directory(&self, pathname: &str) -> Result<&Directory, TreeError> {
        match self.get_directory_opt(pathname)? {
            Some(r) => Ok(r),
            None => Err(TreeError::NotFound(pathname.into())),
        }
    }

    /// Like [`Self::get_directory()`] but maps [`TreeError::NotFound`] to [`Option`].
    pub fn get_directory_opt(&self, pathname: &str) -> Result<Option<&Directory>, TreeError> {
        let mut dir = self;

        for filename in components(pathname)? {
            dir = match dir.entries.get(filename) {
                Some(Inode::Directory(subdir)) => subdir,
                Some(_) => return Err(TreeError::NotADirectory(filename.into())),
                None => return Ok(None),
            }
        }

        Ok(Some(dir))
    }

    /// Gets a mutable reference to a subdirectory of this directory.
    ///
    /// This is the mutable version of `Directory::get_directory()`.
    pub fn get_directory_mut(&mut self, pathname: &str) -> Result<&mut Directory, TreeError> {
        let mut dir = self;

        for filename in components(pathname)? {
            dir = match dir.entries.get_mut(filename) {
                Some(Inode::Directory(subdir)) => subdir,
                Some(_) => return Err(TreeError::NotADirectory(filename.into())),
                None => return Err(TreeError::NotFound(filename.into())),
            };
        }

        Ok(dir)
    }

    /// Gets a mutable reference to a subdirectory of this directory, creating it and any missing
    /// ancestors along the way.  Existing directories are left untouched.
    ///
    /// Fails with [`TreeError::NotADirectory`] if a regular file is in the way.
    pub fn mkdir_all(&mut self, pathname: &str) -> Result<&mut Directory, TreeError> {
        let mut dir = self;

        for filename in components(pathname)? {
            let inode = dir
                .entries
                .entry(Box::from(filename))
                .or_insert_with(|| Inode::Directory(Box::default()));

            dir = match inode {
                Inode::Directory(subdir) => subdir,
                Inode::Leaf(..) => return Err(TreeError::NotADirectory(filename.into())),
            };
        }

        Ok(dir)
    }

    /// Splits a pathname into a directory and the filename within that directory.  The directory
    /// must already exist.  The filename within the directory may or may not exist.
    ///
    /// This is the main entry point for most operations based on pathname.  The expectation is
    /// that the returned filename will be used to perform a more concrete operation on the
    /// returned directory.
    ///
    /// On failure (the pathname names no file, or the directory doesn't exist) can return any
    /// number of errors from TreeError.
    pub fn split<'d, 'n>(&'d self, pathname: &'n str) -> Result<(&'d Directory, &'n str), TreeError> {
        let mut names = components(pathname)?;

        let Some(filename) = names.pop() else {
            return Err(TreeError::InvalidFilename(pathname.into()));
        };

        let mut dir = self;
        for name in names {
            dir = match dir.entries.get(name) {
                Some(Inode::Directory(subdir)) => subdir,
                Some(_) => return Err(TreeError::NotADirectory(name.into())),
                None => return Err(TreeError::NotFound(name.into())),
            };
        }

        Ok((dir, filename))
    }

    /// Splits a pathname into a directory and the filename within that directory.
    ///
    /// This is the `_mut` version of `Directory::split()`.
    pub fn split_mut<'d, 'n>(
        &'d mut self,
        pathname: &'n str,
    ) -> Result<(&'d mut Directory, &'n str), TreeError> {
        let mut names = components(pathname)?;

        let Some(filename) = names.pop() else {
            return Err(TreeError::InvalidFilename(pathname.into()));
        };

        let mut dir = self;
        for name in names {
            dir = match dir.entries.get_mut(name) {
                Some(Inode::Directory(subdir)) => subdir,
                Some(_) => return Err(TreeError::NotADirectory(name.into())),
                None => return Err(TreeError::NotFound(name.into())),
            };
        }

        Ok((dir, filename))
    }

    /// Obtains the content of the regular file with the given filename directly contained in this
    /// directory.
    ///
    /// # Arguments
    ///
    ///  * `filename`: the filename in the current directory.  If you need to support full
    ///    pathnames then you should call `Directory::split()` first.
    pub fn get_file<'a>(&'a self, filename: &str) -> Result<&'a [u8], TreeError> {
        self.get_file_opt(filename)?
            .ok_or_else(|| TreeError::NotFound(filename.into()))
    }

    /// Like [`Self::get_file()`] but maps [`TreeError::NotFound`] to [`Option`].
    pub fn get_file_opt<'a>(&'a self, filename: &str) -> Result<Option<&'a [u8]>, TreeError> {
        match self.entries.get(filename) {
            Some(Inode::Leaf(leaf)) => Ok(Some(&leaf.content)),
            Some(Inode::Directory(..)) => Err(TreeError::IsADirectory(filename.into())),
            None => Ok(None),
        }
    }

    /// Inserts the given inode into the directory.
    ///
    /// If the `filename` existed previously, the content is completely overwritten, including the
    /// case that it was a directory.
    ///
    /// # Arguments
    ///
    ///  * `filename`: the filename in the current directory.  If you need to support full
    ///    pathnames then you should call `Directory::split()` first.
    ///  * `inode`: the inode to store under the `filename`
    pub fn insert(&mut self, filename: &str, inode: Inode) {
        self.entries.insert(Box::from(filename), inode);
    }

    /// Does a directory lookup on the given filename, returning the Inode if it exists.
    ///
    /// # Arguments
    ///
    ///  * `filename`: the filename in the current directory.  If you need to support full
    ///    pathnames then you should call `Directory::split()` first.
    pub fn lookup(&self, filename: &str) -> Option<&Inode> {
        self.entries.get(filename)
    }

    /// Resolves a full pathname relative to this directory.  Returns `Ok(None)` if the final
    /// component doesn't exist.
    pub fn resolve(&self, pathname: &str) -> Result<Option<ResolvedRef<'_>>, TreeError> {
        if components(pathname)?.is_empty() {
            return Ok(Some(ResolvedRef::Directory(self)));
        }

        let (dir, filename) = self.split(pathname)?;
        Ok(dir.lookup(filename).map(|inode| match inode {
            Inode::Directory(subdir) => ResolvedRef::Directory(subdir),
            Inode::Leaf(leaf) => ResolvedRef::Leaf(leaf),
        }))
    }
}

/// A node found by [`Directory::resolve()`].
#[derive(Debug, Clone, Copy)]
pub enum ResolvedRef<'a> {
    Directory(&'a Directory),
    Leaf(&'a Leaf),
}

/// A complete filesystem tree with a root directory.
#[derive(Debug, Clone, Default)]
pub struct FileSystem {
    /// The root directory of the filesystem.
    pub root: Directory,
}

impl FileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes a regular file, replacing any file previously stored at `pathname`.  The containing
    /// directory must already exist.
    pub fn write_file(&mut self, pathname: &str, content: Vec<u8>) -> Result<(), TreeError> {
        let (dir, filename) = self.root.split_mut(pathname)?;

        if let Some(Inode::Directory(..)) = dir.lookup(filename) {
            return Err(TreeError::IsADirectory(filename.into()));
        }

        dir.insert(
            filename,
            Inode::Leaf(Leaf {
                stat: Stat { st_mode: FILE_MODE },
                content: content.into_boxed_slice(),
            }),
        );
        Ok(())
    }
}

impl Sink for FileSystem {
    type Error = TreeError;

    fn create_directory_all(&mut self, path: &str) -> Result<(), TreeError> {
        self.root.mkdir_all(path).map(|_| ())
    }

    fn write_file(&mut self, path: &str, content: Vec<u8>) -> Result<(), TreeError> {
        FileSystem::write_file(self, path, content)
    }
}
