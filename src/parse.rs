//! Parsing of the archive format.
//!
//! An archive is a sequence of entries, each introduced by a boundary line.  The boundary is a
//! `<`, one or more `=`, and a `>`, and is fixed by the first line of the archive:
//!
//! ```text
//! <===> README.md
//! Hello world
//! <===>
//! This is a comment; it is dropped.
//! <===> src/
//! <===> src/main.rs
//! fn main() {}
//! ```
//!
//! The newline directly preceding a boundary line belongs to the boundary, not to the file
//! content, so a file can end without a trailing newline.

use std::io::BufRead;

use log::{debug, trace};
use once_cell::sync::Lazy;
use regex_automata::meta::Regex;

use crate::{
    error::{Error, Result},
    path::ArchivePath,
    reader::LineReader,
};

static BOUNDARY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^<=+>").expect("boundary pattern is a valid regex"));

/// The receiving end of a parsed archive.
///
/// The parser never inspects the sink: it only issues these two operations, in archive order.
pub trait Sink {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Creates the directory at `path` and all missing ancestors.  Must succeed if the directory
    /// already exists.
    fn create_directory_all(&mut self, path: &str) -> std::result::Result<(), Self::Error>;

    /// Creates or replaces the file at `path`.  The containing directory has already been created.
    fn write_file(&mut self, path: &str, content: Vec<u8>) -> std::result::Result<(), Self::Error>;
}

fn trim_newline(line: &[u8]) -> &[u8] {
    line.strip_suffix(b"\n").unwrap_or(line)
}

/// Finds the boundary at the start of the first line of an archive.
pub fn find_boundary(first_line: &[u8]) -> Option<&str> {
    let found = BOUNDARY_RE.find(first_line)?;
    // the match is pure ASCII
    std::str::from_utf8(&first_line[found.range()]).ok()
}

/// Reads the boundary of the archive from its first line, without consuming that line.
pub fn read_boundary<R: BufRead>(lr: &mut LineReader<R>) -> Result<String> {
    let Some(first_line) = lr.peek_line()? else {
        return Err(Error::MalformedArchive("missing first line"));
    };

    match find_boundary(first_line) {
        Some(boundary) => Ok(boundary.to_string()),
        None => Err(Error::MalformedArchive("no boundary on first line")),
    }
}

/// A parser reading one entry at a time from an archive.
#[derive(Debug)]
pub struct Parser<R> {
    lr: LineReader<R>,
    boundary: String,
    // the most recently consumed structural line and its number, for diagnostics
    current: Vec<u8>,
    current_nr: usize,
}

impl<R: BufRead> Parser<R> {
    /// Creates a parser, reading the boundary from the first line of `reader`.
    pub fn new(reader: R) -> Result<Self> {
        let mut lr = LineReader::new(reader);
        let boundary = read_boundary(&mut lr)?;
        debug!("archive boundary is {boundary}");
        Ok(Self {
            lr,
            boundary,
            current: vec![],
            current_nr: 0,
        })
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// The number of lines consumed so far.
    pub fn line_nr(&self) -> usize {
        self.lr.line_nr()
    }

    fn is_boundary(&self, line: &[u8]) -> bool {
        line.starts_with(self.boundary.as_bytes())
    }

    fn next_is_boundary(&mut self) -> Result<bool> {
        Ok(match self.lr.peek_line()? {
            Some(line) => line.starts_with(self.boundary.as_bytes()),
            None => false,
        })
    }

    fn at_line(&self, source: Error) -> Error {
        Error::Line {
            line: self.current_nr,
            text: String::from_utf8_lossy(trim_newline(&self.current)).into_owned(),
            source: Box::new(source),
        }
    }

    /// Reads the next entry and applies it to `sink`.
    ///
    /// Returns `Ok(false)` once the archive is exhausted.
    pub fn ingest_entry<S: Sink>(&mut self, sink: &mut S) -> Result<bool> {
        let Some(line) = self.lr.read_line()? else {
            return Ok(false);
        };
        self.current = line;
        self.current_nr = self.lr.line_nr();

        match self.ingest_current(sink) {
            Ok(()) => Ok(true),
            Err(err) => Err(self.at_line(err)),
        }
    }

    fn ingest_current<S: Sink>(&mut self, sink: &mut S) -> Result<()> {
        if !self.is_boundary(&self.current) {
            return Err(Error::MalformedArchive("entry does not start with boundary"));
        }

        if trim_newline(&self.current) == self.boundary.as_bytes() {
            trace!("skipping comment at line {}", self.lr.line_nr());
            loop {
                let Some(line) = self.lr.read_line()? else {
                    return Err(Error::MalformedArchive("comment is not followed by an entry"));
                };
                self.current = line;
                self.current_nr = self.lr.line_nr();

                if self.is_boundary(&self.current) {
                    break;
                }
            }
        }

        let declaration = trim_newline(&self.current);
        let Some(space) = declaration.iter().position(|&c| c == b' ') else {
            return Err(Error::MalformedArchive("missing path"));
        };

        let raw_path = &declaration[space + 1..];
        let path = ArchivePath::from_bytes(raw_path).map_err(|reason| Error::InvalidPath {
            path: String::from_utf8_lossy(raw_path).into_owned(),
            reason,
        })?;

        if path.is_dir() {
            self.ingest_directory(&path, sink)
        } else {
            self.ingest_file(&path, sink)
        }
    }

    fn ingest_directory<S: Sink>(&mut self, path: &ArchivePath, sink: &mut S) -> Result<()> {
        trace!("directory {path}");
        sink.create_directory_all(path.trimmed())
            .map_err(|err| Error::SinkFailure(Box::new(err)))?;

        // blank lines following a directory are padding, not content
        loop {
            match self.lr.peek_line()? {
                Some(b"\n") => {}
                _ => break,
            }
            self.lr.read_line()?;
        }

        Ok(())
    }

    fn ingest_file<S: Sink>(&mut self, path: &ArchivePath, sink: &mut S) -> Result<()> {
        if let Some(parent) = path.parent() {
            sink.create_directory_all(parent)
                .map_err(|err| Error::SinkFailure(Box::new(err)))?;
        }

        let mut content = vec![];

        loop {
            match self.lr.peek_line()? {
                None => break,
                Some(next) if next.starts_with(self.boundary.as_bytes()) => break,
                Some(_) => {}
            }

            let Some(line) = self.lr.read_line()? else {
                break;
            };

            // the newline before a boundary belongs to the boundary
            if self.next_is_boundary()? {
                content.extend_from_slice(trim_newline(&line));
            } else {
                content.extend_from_slice(&line);
            }
        }

        trace!("file {path} ({} bytes)", content.len());
        sink.write_file(path.as_str(), content)
            .map_err(|err| Error::SinkFailure(Box::new(err)))
    }
}

/// Parses a complete archive from `reader` into `sink`.
///
/// On failure the sink keeps whatever entries were applied before the failing one.
pub fn ingest<R: BufRead, S: Sink>(reader: R, sink: &mut S) -> Result<()> {
    let mut parser = Parser::new(reader)?;
    let mut count = 0usize;

    while parser.ingest_entry(sink)? {
        count += 1;
    }

    debug!("read {count} entries from {} lines", parser.line_nr());
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;

    use similar_asserts::assert_eq;

    use super::*;
    use crate::{error::ErrorKind, tree::FileSystem, ReadFs, View};

    #[derive(Debug, Default)]
    struct RecordingSink {
        ops: Vec<String>,
    }

    impl Sink for RecordingSink {
        type Error = Infallible;

        fn create_directory_all(&mut self, path: &str) -> std::result::Result<(), Infallible> {
            self.ops.push(format!("mkdir {path}"));
            Ok(())
        }

        fn write_file(
            &mut self,
            path: &str,
            content: Vec<u8>,
        ) -> std::result::Result<(), Infallible> {
            self.ops
                .push(format!("write {path} {:?}", String::from_utf8_lossy(&content)));
            Ok(())
        }
    }

    fn record(input: &[u8]) -> (Result<()>, Vec<String>) {
        let mut sink = RecordingSink::default();
        let result = ingest(input, &mut sink);
        (result, sink.ops)
    }

    fn parse(input: &[u8]) -> FileSystem {
        let mut fs = FileSystem::new();
        ingest(input, &mut fs).unwrap();
        fs
    }

    fn read(fs: &FileSystem, name: &str) -> Vec<u8> {
        View::new(&fs.root).read_file(name).unwrap()
    }

    #[test]
    fn test_find_boundary() {
        assert_eq!(find_boundary(b"<=> a"), Some("<=>"));
        assert_eq!(find_boundary(b"<=====> a\n"), Some("<=====>"));
        assert_eq!(find_boundary(b"<===>\n"), Some("<===>"));
        assert_eq!(find_boundary(b"<> a"), None);
        assert_eq!(find_boundary(b" <===> a"), None);
        assert_eq!(find_boundary(b"hello"), None);
    }

    #[test]
    fn test_boundary_lengths() {
        // a shorter boundary inside content is just text
        let fs = parse(b"<=====> a\n<===> not a boundary\n<=====> b\nB");
        assert_eq!(read(&fs, "a"), b"<===> not a boundary");
        assert_eq!(read(&fs, "b"), b"B");

        let parser = Parser::new(&b"<=> x\n"[..]).unwrap();
        assert_eq!(parser.boundary(), "<=>");
        assert_eq!(parser.line_nr(), 0);
    }

    #[test]
    fn test_operations_in_order() {
        let (result, ops) = record(b"<===> top\nT\n<===> dir/\n<===> a/b/c\nC\n");
        result.unwrap();
        assert_eq!(
            ops,
            [
                r#"write top "T""#,
                "mkdir dir",
                "mkdir a/b",
                r#"write a/b/c "C\n""#,
            ]
        );
    }

    #[test]
    fn test_trailing_newline() {
        let fs = parse(b"<===> a\nline1\nline2\n<===> b\nline1\n\n<===> c\nlast\n");
        // the newline before a boundary is not content
        assert_eq!(read(&fs, "a"), b"line1\nline2");
        assert_eq!(read(&fs, "b"), b"line1\n");
        // the final entry keeps everything up to the end of the input
        assert_eq!(read(&fs, "c"), b"last\n");

        let fs = parse(b"<===> a\nno newline");
        assert_eq!(read(&fs, "a"), b"no newline");
    }

    #[test]
    fn test_empty_files() {
        let (result, ops) = record(b"<===> a\n<===> b\n\n<===> c");
        result.unwrap();
        assert_eq!(
            ops,
            [r#"write a """#, r#"write b """#, r#"write c """#]
        );
    }

    #[test]
    fn test_directory_padding() {
        let (result, ops) = record(b"<===> dir/\n\n\n<===> dir/file\nx\n");
        result.unwrap();
        assert_eq!(ops, ["mkdir dir", "mkdir dir", r#"write dir/file "x\n""#]);

        let fs = parse(b"<===> empty/\n\n");
        assert!(View::new(&fs.root).read_dir("empty").unwrap().is_empty());
    }

    #[test]
    fn test_comments() {
        let (result, ops) =
            record(b"<===>\nA comment\nspanning lines\n<===> a\nA\n<===>\n\nmore\n<===> b\nB");
        result.unwrap();
        assert_eq!(ops, [r#"write a "A""#, r#"write b "B""#]);
    }

    #[test]
    fn test_overwrite() {
        let fs = parse(b"<===> a\nfirst\n<===> a\nsecond\n");
        assert_eq!(read(&fs, "a"), b"second\n");
    }

    #[test]
    fn test_spaces_in_path() {
        let fs = parse(b"<===> my file.txt\ncontent\n");
        assert_eq!(read(&fs, "my file.txt"), b"content\n");
    }

    #[test]
    fn test_empty_input() {
        let (result, ops) = record(b"");
        let err = result.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedArchive);
        assert_eq!(err.line(), None);
        assert_eq!(err.to_string(), "missing first line");
        assert!(ops.is_empty());
    }

    #[test]
    fn test_no_boundary() {
        let (result, ops) = record(b"hello\n<===> a\n");
        let err = result.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedArchive);
        assert_eq!(err.to_string(), "no boundary on first line");
        assert!(ops.is_empty());
    }

    #[test]
    fn test_invalid_paths() {
        for path in ["../x", "/abs", "a//b", "./", "a/../b"] {
            let input = format!("<===> ok\nfine\n<===> {path}\nbad\n<===> later\n");
            let (result, ops) = record(input.as_bytes());
            let err = result.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidPath, "{path}");
            assert_eq!(err.line(), Some(3), "{path}");
            // earlier entries stay applied, later ones never happen
            assert_eq!(ops, [r#"write ok "fine""#], "{path}");
        }
    }

    #[test]
    fn test_invalid_path_message() {
        let (result, _) = record(b"<===> a\nx\n<===> ../x\ny\n");
        insta::assert_snapshot!(
            result.unwrap_err(),
            @r#"[line 3] path is invalid [../x]: path contains a relative segment "..", line: [<===> ../x]"#
        );
    }

    #[test]
    fn test_missing_path() {
        let (result, ops) = record(b"<===> a\nx\n<===>x\n");
        // "<===>x" is not a bare boundary, so it is a declaration without a path
        let err = result.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedArchive);
        insta::assert_snapshot!(err, @"[line 3] missing path, line: [<===>x]");
        assert_eq!(ops, [r#"write a "x""#]);
    }

    #[test]
    fn test_empty_path() {
        let (result, _) = record(b"<===> \n");
        let err = result.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidPath);
        assert_eq!(err.line(), Some(1));
    }

    #[test]
    fn test_not_a_boundary() {
        let (result, ops) = record(b"<===> dir/\ntext\n");
        let err = result.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedArchive);
        insta::assert_snapshot!(err, @"[line 2] entry does not start with boundary, line: [text]");
        assert_eq!(ops, ["mkdir dir"]);
    }

    #[test]
    fn test_truncated_comment() {
        let (result, ops) = record(b"<===> a\nA\n<===>\ncomment\n");
        let err = result.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedArchive);
        insta::assert_snapshot!(err, @"[line 4] comment is not followed by an entry, line: [comment]");
        assert_eq!(ops, [r#"write a "A""#]);

        let (result, ops) = record(b"<===>\n");
        assert_eq!(result.unwrap_err().kind(), ErrorKind::MalformedArchive);
        assert!(ops.is_empty());
    }

    #[test]
    fn test_sink_failure() {
        let mut fs = FileSystem::new();
        let err = ingest(&b"<===> a\n<===> a/b\nx\n"[..], &mut fs).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SinkFailure);
        assert_eq!(err.line(), Some(2));
        assert_eq!(read(&fs, "a"), b"");

        let mut fs = FileSystem::new();
        let err = ingest(&b"<===> a/\n<===> a\nx\n"[..], &mut fs).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SinkFailure);
        insta::assert_snapshot!(
            err,
            @r#"[line 2] filesystem operation failed: Directory entry "a" is a directory, line: [<===> a]"#
        );

        // reported at the declaration, not at the last content line
        let mut fs = FileSystem::new();
        let err = ingest(&b"<===> a/\n<===> b\nB\n<===> a\nx\ny\nz\n"[..], &mut fs).unwrap_err();
        assert_eq!(err.line(), Some(4));
        insta::assert_snapshot!(
            err,
            @r#"[line 4] filesystem operation failed: Directory entry "a" is a directory, line: [<===> a]"#
        );
    }

    #[test]
    fn test_entry_by_entry() {
        let mut parser = Parser::new(&b"<===> a\nA\n<===> b/\n\n<===> c\n"[..]).unwrap();
        let mut sink = RecordingSink::default();

        assert!(parser.ingest_entry(&mut sink).unwrap());
        assert_eq!(parser.line_nr(), 2);
        assert!(parser.ingest_entry(&mut sink).unwrap());
        assert_eq!(parser.line_nr(), 4);
        assert!(parser.ingest_entry(&mut sink).unwrap());
        assert!(!parser.ingest_entry(&mut sink).unwrap());
        assert_eq!(parser.line_nr(), 5);
        assert_eq!(sink.ops, [r#"write a "A""#, "mkdir b", r#"write c """#]);
    }
}
