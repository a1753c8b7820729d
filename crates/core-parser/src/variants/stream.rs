//! `stream`: buffered line-at-a-time reading; memory stays O(line).

use super::{CHECK_EVERY_LINES, RunCtx};
use crate::ParseError;
use crate::state::MachineState;
use std::io::{BufRead, BufReader, Read};

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
        state.feed_line(&String::from_utf8_lossy(&buf));
        since_check += 1;
        if since_check >= CHECK_EVERY_LINES {
            since_check = 0;
            ctx.checkpoint(state)?;
        }
    }
    ctx.checkpoint(state)
}
