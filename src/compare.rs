//! Comparison of archive contents against directory trees.
//!
//! This is mostly useful for testing: an archive is read into a [`Snapshot`] and compared with a
//! snapshot of a directory on disk holding the expected result.  Empty directories can't be kept
//! in most version control systems, so files named `.gitkeep` are ignored on both sides.

use std::{collections::BTreeMap, fs, path::Path};

use anyhow::{bail, Context, Result};

use crate::archive::ReadFs;

/// Names that never appear in a snapshot.
const IGNORED_NAMES: &[&str] = &[".gitkeep"];

/// A flattened tree: each path maps to `None` for a directory or to the content of a file.
pub type Snapshot = BTreeMap<String, Option<Vec<u8>>>;

fn is_ignored(name: &str) -> bool {
    IGNORED_NAMES.contains(&name)
}

fn join(prefix: &str, name: &str) -> String {
    match prefix {
        "." => name.to_string(),
        _ => format!("{prefix}/{name}"),
    }
}

fn snapshot_fs(fs: &impl ReadFs, dir: &str, out: &mut Snapshot) -> Result<()> {
    for entry in fs.read_dir(dir)? {
        if is_ignored(entry.name()) {
            continue;
        }

        let path = join(dir, entry.name());
        if entry.is_dir() {
            snapshot_fs(fs, &path, out)?;
            out.insert(path, None);
        } else {
            let content = fs.read_file(&path)?;
            out.insert(path, Some(content));
        }
    }
    Ok(())
}

/// Reads the whole of `fs` into a [`Snapshot`].
pub fn snapshot(fs: &impl ReadFs) -> Result<Snapshot> {
    let mut out = Snapshot::new();
    snapshot_fs(fs, ".", &mut out)?;
    Ok(out)
}

fn snapshot_path(root: &Path, dir: &str, out: &mut Snapshot) -> Result<()> {
    let fullpath = match dir {
        "." => root.to_path_buf(),
        _ => root.join(dir),
    };

    for entry in fs::read_dir(&fullpath).with_context(|| format!("Reading directory {fullpath:?}"))? {
        let entry = entry?;
        let Some(name) = entry.file_name().to_str().map(String::from) else {
            bail!("Filename {:?} is not valid UTF-8", entry.file_name());
        };

        if is_ignored(&name) {
            continue;
        }

        let path = join(dir, &name);
        if entry.file_type()?.is_dir() {
            snapshot_path(root, &path, out)?;
            out.insert(path, None);
        } else {
            let content =
                fs::read(entry.path()).with_context(|| format!("Reading {:?}", entry.path()))?;
            out.insert(path, Some(content));
        }
    }
    Ok(())
}

/// Reads the directory tree at `path` into a [`Snapshot`].
pub fn snapshot_dir(path: impl AsRef<Path>) -> Result<Snapshot> {
    let mut out = Snapshot::new();
    snapshot_path(path.as_ref(), ".", &mut out)?;
    Ok(out)
}

/// Checks that two snapshots hold the same directories and files with the same content.
pub fn dirs_equal(a: &Snapshot, b: &Snapshot) -> Result<()> {
    if a.len() != b.len() {
        bail!(
            "File lists do not match. Dir1: {:?}, Dir2: {:?}",
            a.keys().collect::<Vec<_>>(),
            b.keys().collect::<Vec<_>>()
        );
    }

    for (path, payload_a) in a {
        let Some(payload_b) = b.get(path) else {
            bail!("File [{path}] is missing in dir2");
        };

        if payload_a != payload_b {
            let show = |payload: &Option<Vec<u8>>| match payload {
                Some(content) => String::from_utf8_lossy(content).into_owned(),
                None => "<directory>".to_string(),
            };
            bail!(
                "File [{path}] payload is different: \ndir1:\n[{}]\n\ndir2:\n[{}]",
                show(payload_a),
                show(payload_b)
            );
        }
    }

    Ok(())
}
