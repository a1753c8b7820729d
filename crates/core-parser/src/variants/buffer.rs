//! `buffer`: read the whole file, then split. Simplest variant; the
//! reference point the others are tested against.

use super::{CHECK_EVERY_LINES, RunCtx};
use crate::ParseError;
use crate::state::MachineState;
use std::io::Read;

pub(crate) fn run<R: Read>(
    mut reader: R,
    state: &mut MachineState,
    ctx: &mut RunCtx<'_>,
) -> Result<(), ParseError> {
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes).map_err(|e| ctx.io(e))?;
    ctx.note_bytes(bytes.len());
    let text = String::from_utf8_lossy(&bytes);

    let mut lines = text.split('\n').peekable();
    let mut since_check = 0usize;
    while let Some(line) = lines.next() {
        // A trailing newline does not open a final empty line.
        if lines.peek().is_none() && line.is_empty() {
            break;
        }
        state.feed_line(line);
        since_check += 1;
        if since_check >= CHECK_EVERY_LINES {
            since_check = 0;
            ctx.checkpoint(state)?;
        }
    }
    ctx.checkpoint(state)
}
