//! `regex`: a compiled `RegexSet` classifies each line before any field
//! extraction runs. The set is a permissive superset; anything it passes
//! still goes through the normal extractors, anything it rejects could
//! never have produced an event.

use super::{CHECK_EVERY_LINES, RunCtx};
use crate::ParseError;
use crate::state::MachineState;
use regex::RegexSet;
use std::io::{BufRead, BufReader, Read};
use std::sync::LazyLock;

static CLASSIFIER: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        // Commands the tokenizer reacts to: tool selects, moves, M600.
        r"(?i)^\s*[TGM]\d",
        // Comments; the metadata grammars decide the rest.
        r"^\s*;",
    ])
    .unwrap()
});

pub(crate) fn run<R: Read>(
    reader: R,
    state: &mut MachineState,
    ctx: &mut RunCtx<'_>,
) -> Result<(), ParseError> {
    let mut reader = BufReader::new(reader);
    let mut buf: Vec<u8> = Vec::new();
    let mut since_check = 0usize;
    loop {
        buf.clear();
        let n = reader.read_until(b'\n', &mut buf).map_err(|e| ctx.io(e))?;
        if n == 0 {
            break;
        }
        ctx.note_bytes(n);
        if buf.last() == Some(&b'\n') {
            buf.pop();
        }
        let line = String::from_utf8_lossy(&buf);
        if CLASSIFIER.is_match(&line) {
            state.feed_line(&line);
        } else {
            state.skip_line();
        }
        since_check += 1;
        if since_check >= CHECK_EVERY_LINES {
            since_check = 0;
            ctx.checkpoint(state)?;
        }
    }
    ctx.checkpoint(state)
}
