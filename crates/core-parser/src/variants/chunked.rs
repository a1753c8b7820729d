//! Chunked byte scanners: the `optimized` fast path and the explicit
//! `fsm` per-byte machine. Both read fixed-size chunks, rejoin lines split
//! across chunk boundaries, and feed identical line sequences.

use super::RunCtx;
use crate::ParseError;
use crate::state::MachineState;
use std::io::Read;

pub(crate) const CHUNK_SIZE: usize = 64 * 1024;

fn feed_bytes(state: &mut MachineState, bytes: &[u8]) {
    state.feed_line(&String::from_utf8_lossy(bytes));
}

/// `optimized`: slice-split per chunk, one carry buffer for the boundary
/// line. No per-line allocation on the happy (ASCII) path.
pub(crate) fn run<R: Read>(
    mut reader: R,
    state: &mut MachineState,
    ctx: &mut RunCtx<'_>,
) -> Result<(), ParseError> {
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut carry: Vec<u8> = Vec::new();
    loop {
        let n = reader.read(&mut buf).map_err(|e| ctx.io(e))?;
        if n == 0 {
            break;
        }
        ctx.note_bytes(n);
        let chunk = &buf[..n];
        let mut start = 0usize;
        for (i, &byte) in chunk.iter().enumerate() {
            if byte == b'\n' {
                if carry.is_empty() {
                    feed_bytes(state, &chunk[start..i]);
                } else {
                    carry.extend_from_slice(&chunk[start..i]);
                    let line = std::mem::take(&mut carry);
                    feed_bytes(state, &line);
                }
                start = i + 1;
            }
        }
        carry.extend_from_slice(&chunk[start..]);
        ctx.checkpoint(state)?;
    }
    if !carry.is_empty() {
        feed_bytes(state, &carry);
    }
    ctx.checkpoint(state)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    /// Waiting for the first byte of a line.
    LineStart,
    /// Accumulating line content.
    Body,
    /// Saw `\r`; swallow a following `\n`, otherwise the `\r` belongs to
    /// the line body.
    CarriageReturn,
}

/// `fsm`: the same chunking, but line assembly runs through an explicit
/// per-byte scanner state machine.
pub(crate) fn run_fsm<R: Read>(
    mut reader: R,
    state: &mut MachineState,
    ctx: &mut RunCtx<'_>,
) -> Result<(), ParseError> {
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut line: Vec<u8> = Vec::new();
    let mut scan = ScanState::LineStart;
    loop {
        let n = reader.read(&mut buf).map_err(|e| ctx.io(e))?;
        if n == 0 {
            break;
        }
        ctx.note_bytes(n);
        for &byte in &buf[..n] {
            scan = match (scan, byte) {
                (ScanState::CarriageReturn, b'\n') => {
                    feed_bytes(state, &line);
                    line.clear();
                    ScanState::LineStart
                }
                (ScanState::CarriageReturn, other) => {
                    line.push(b'\r');
                    if other == b'\r' {
                        ScanState::CarriageReturn
                    } else {
                        line.push(other);
                        ScanState::Body
                    }
                }
                (_, b'\n') => {
                    feed_bytes(state, &line);
                    line.clear();
                    ScanState::LineStart
                }
                (_, b'\r') => ScanState::CarriageReturn,
                (_, other) => {
                    line.push(other);
                    ScanState::Body
                }
            };
        }
        ctx.checkpoint(state)?;
    }
    if scan == ScanState::CarriageReturn {
        line.push(b'\r');
    }
    if !line.is_empty() {
        feed_bytes(state, &line);
    }
    ctx.checkpoint(state)
}
