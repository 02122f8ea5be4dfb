//! Writing the content of an archive to a real directory.

use std::{
    fs::{self, DirBuilder, OpenOptions},
    io::{ErrorKind, Write},
    path::Path,
};

use anyhow::{Context, Result};
use log::trace;

use crate::{
    archive::View,
    tree::{Directory, Inode, Leaf},
};

#[cfg(unix)]
fn dir_builder(dir: &Directory) -> DirBuilder {
    use std::os::unix::fs::DirBuilderExt;

    let mut builder = DirBuilder::new();
    builder.mode(dir.stat.st_mode);
    builder
}

#[cfg(not(unix))]
fn dir_builder(_dir: &Directory) -> DirBuilder {
    DirBuilder::new()
}

#[cfg(unix)]
fn open_options(leaf: &Leaf) -> OpenOptions {
    use std::os::unix::fs::OpenOptionsExt;

    let mut options = OpenOptions::new();
    options.mode(leaf.stat.st_mode);
    options
}

#[cfg(not(unix))]
fn open_options(_leaf: &Leaf) -> OpenOptions {
    OpenOptions::new()
}

fn write_directory(dir: &Directory, path: &Path) -> Result<()> {
    match dir_builder(dir).create(path) {
        Ok(()) => {}
        // an existing symlink is never followed
        Err(e)
            if e.kind() == ErrorKind::AlreadyExists
                && fs::symlink_metadata(path).is_ok_and(|m| m.is_dir()) => {}
        Err(e) => Err(e).with_context(|| format!("Creating directory {path:?}"))?,
    }

    write_directory_contents(dir, path)
}

fn write_leaf(leaf: &Leaf, path: &Path) -> Result<()> {
    trace!("writing {path:?}");
    let mut file = open_options(leaf)
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
        .with_context(|| format!("Creating file {path:?}"))?;
    file.write_all(&leaf.content)
        .with_context(|| format!("Writing file {path:?}"))?;
    Ok(())
}

fn write_directory_contents(dir: &Directory, path: &Path) -> Result<()> {
    for (name, inode) in dir.entries() {
        match inode {
            Inode::Directory(ref dir) => write_directory(dir, &path.join(name)),
            Inode::Leaf(ref leaf) => write_leaf(leaf, &path.join(name)),
        }?;
    }

    Ok(())
}

/// Writes the tree of `view` below `output_dir`, which is created if needed.
///
/// Existing directories are reused and existing files are overwritten.
pub fn write_to_path(view: View<'_>, output_dir: &Path) -> Result<()> {
    fs::create_dir_all(output_dir).with_context(|| format!("Creating directory {output_dir:?}"))?;
    write_directory_contents(view.root(), output_dir)
}

#[cfg(test)]
mod tests {
    use similar_asserts::assert_eq;

    use super::*;
    use crate::{
        compare::{dirs_equal, snapshot, snapshot_dir},
        HrxArchive, ReadFs,
    };

    #[test]
    fn test_write_to_path() {
        let archive =
            HrxArchive::from_bytes(b"<===> a/b/c\nC\n<===> a/empty/\n<===> top\n").unwrap();
        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path().join("out");

        write_to_path(archive.view(), &out).unwrap();
        assert_eq!(fs::read(out.join("a/b/c")).unwrap(), b"C");
        assert!(out.join("a/empty").is_dir());
        dirs_equal(&snapshot(&archive).unwrap(), &snapshot_dir(&out).unwrap()).unwrap();

        // a subtree is written relative to its own root
        write_to_path(archive.sub("a").unwrap(), &out).unwrap();
        assert_eq!(fs::read(out.join("b/c")).unwrap(), b"C");
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_in_the_way() {
        let archive = HrxArchive::from_bytes(b"<===> a/file\nx\n").unwrap();
        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().join("target");
        let out = tmp.path().join("out");
        fs::create_dir_all(&target).unwrap();
        fs::create_dir_all(&out).unwrap();
        std::os::unix::fs::symlink(&target, out.join("a")).unwrap();

        assert!(write_to_path(archive.view(), &out).is_err());
        assert!(!target.join("file").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_modes() {
        use std::os::unix::fs::PermissionsExt;

        let archive = HrxArchive::from_bytes(b"<===> d/f\n").unwrap();
        let tmp = tempfile::tempdir().unwrap();
        write_to_path(archive.view(), tmp.path()).unwrap();

        let mode = |p: &str| fs::metadata(tmp.path().join(p)).unwrap().permissions().mode() & 0o777;
        // the umask can only remove bits
        assert_eq!(mode("d") & !0o700, 0);
        assert_eq!(mode("d/f") & !0o644, 0);
    }
}
