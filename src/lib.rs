//! Reading of human-readable archives (`.hrx`) into an in-memory filesystem.
//!
//! ```
//! use hrx::{HrxArchive, ReadFs};
//!
//! let archive = HrxArchive::from_bytes(b"<===> dir/hello.txt\nHello\n<===> dir/empty\n").unwrap();
//! assert_eq!(archive.read_file("dir/hello.txt").unwrap(), b"Hello");
//! assert_eq!(archive.glob("dir/*").unwrap(), ["dir/empty", "dir/hello.txt"]);
//! ```

pub mod archive;
pub mod compare;
pub mod error;
pub mod fs;
pub mod parse;
pub mod path;
pub mod reader;
pub mod tree;

pub use archive::{DirEntry, File, HrxArchive, Metadata, ReadFs, View};
pub use error::{Error, ErrorKind, Result};
