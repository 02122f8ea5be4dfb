//! A line reader with a single line of lookahead.
//!
//! The archive format is line oriented, and several parsing decisions depend on what the *next*
//! line looks like (is it a boundary?) before the current line is committed.  [`LineReader`]
//! provides that by keeping at most one line buffered.

use std::io::{BufRead, Result};

/// A line-oriented reader with one line of lookahead and a count of consumed lines.
///
/// Lines are returned as raw bytes including their terminating `\n`, if present.  The final line
/// of a stream without a trailing newline is returned without one.
///
/// The line counter only moves when a line is consumed with [`LineReader::read_line()`].  Peeking
/// never changes it, and consuming a previously peeked line counts it exactly once.
#[derive(Debug)]
pub struct LineReader<R> {
    reader: R,
    peeked: Option<Vec<u8>>,
    line_nr: usize,
}

impl<R: BufRead> LineReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            peeked: None,
            line_nr: 0,
        }
    }

    /// The number of lines consumed so far.  This is also the 1-based number of the line most
    /// recently returned from [`LineReader::read_line()`].
    pub fn line_nr(&self) -> usize {
        self.line_nr
    }

    fn fill(&mut self) -> Result<Option<Vec<u8>>> {
        let mut line = vec![];
        match self.reader.read_until(b'\n', &mut line)? {
            0 => Ok(None),
            _ => Ok(Some(line)),
        }
    }

    /// Returns the next line without consuming it.
    ///
    /// Returns `Ok(None)` at the end of the input.  Repeated calls return the same line until it is
    /// consumed.
    pub fn peek_line(&mut self) -> Result<Option<&[u8]>> {
        if self.peeked.is_none() {
            self.peeked = self.fill()?;
        }

        Ok(self.peeked.as_deref())
    }

    /// Consumes and returns the next line, or `Ok(None)` at the end of the input.
    pub fn read_line(&mut self) -> Result<Option<Vec<u8>>> {
        let line = match self.peeked.take() {
            Some(line) => Some(line),
            None => self.fill()?,
        };

        if line.is_some() {
            self.line_nr += 1;
        }

        Ok(line)
    }
}
