//! `lazy`: a pull-based line iterator. Nothing is read until the iterator
//! is polled, so a consumer that stops early never pays for the rest of
//! the file.

use super::{CHECK_EVERY_LINES, RunCtx};
use crate::ParseError;
use crate::state::MachineState;
use std::io::{BufRead, BufReader, Read};

/// Iterator yielding one line per `next()`, reading on demand.
pub(crate) struct LazyLines<R: Read> {
    reader: BufReader<R>,
    buf: Vec<u8>,
}

impl<R: Read> LazyLines<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
            buf: Vec::new(),
        }
    }
}

impl<R: Read> Iterator for LazyLines<R> {
    /// Line text plus the raw byte count it consumed.
    type Item = std::io::Result<(String, usize)>;

    fn next(&mut self) -> Option<Self::Item> {
        self.buf.clear();
        match self.reader.read_until(b'\n', &mut self.buf) {
            Ok(0) => None,
            Ok(n) => {
                if self.buf.last() == Some(&b'\n') {
                    self.buf.pop();
                }
                Some(Ok((String::from_utf8_lossy(&self.buf).into_owned(), n)))
            }
            Err(e) => Some(Err(e)),
        }
    }
}

pub(crate) fn run<R: Read>(
    reader: R,
    state: &mut MachineState,
    ctx: &mut RunCtx<'_>,
) -> Result<(), ParseError> {
    let mut since_check = 0usize;
    for item in LazyLines::new(reader) {
        let (line, n) = item.map_err(|e| ctx.io(e))?;
        ctx.note_bytes(n);
        state.feed_line(&line);
        since_check += 1;
        if since_check >= CHECK_EVERY_LINES {
            since_check = 0;
            ctx.checkpoint(state)?;
        }
    }
    ctx.checkpoint(state)
}
