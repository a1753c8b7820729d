//! `worker`: fan the file out across threads on line boundaries, classify
//! in parallel, then replay the classified events in file order through
//! the single state machine.
//!
//! Classification (tokenizing + regex matching) dominates parse cost and
//! parallelizes cleanly; the replay is a cheap sequential sweep that
//! applies the accumulation rule in ascending order, so the result is
//! identical to the single-threaded variants by construction. Partial
//! results move by value; workers share nothing mutable.

use super::RunCtx;
use crate::ParseError;
use crate::state::MachineState;
use crate::tokenizer::{LineEvent, classify};
use std::io::Read;
use std::thread;
use tracing::debug;

/// Upper bound on fan-out; beyond this the replay dominates anyway.
const MAX_WORKERS: usize = 8;

struct ChunkScan {
    /// Total lines in the chunk, matched or not.
    lines: usize,
    /// `(line-within-chunk, event)`, 1-based.
    events: Vec<(usize, LineEvent)>,
}

fn scan_chunk(chunk: &[u8]) -> ChunkScan {
    let mut lines = 0usize;
    let mut events = Vec::new();
    let mut parts = chunk.split(|&b| b == b'\n').peekable();
    while let Some(part) = parts.next() {
        if parts.peek().is_none() && part.is_empty() {
            break;
        }
        lines += 1;
        if let Some(event) = classify(&String::from_utf8_lossy(part)) {
            events.push((lines, event));
        }
    }
    ChunkScan { lines, events }
}

/// Split at line boundaries so no line straddles two chunks. Each chunk
/// except possibly the last ends right after a newline.
fn split_chunks(bytes: &[u8], want: usize) -> Vec<&[u8]> {
    if bytes.is_empty() {
        return Vec::new();
    }
    let target = bytes.len().div_ceil(want).max(1);
    let mut chunks = Vec::with_capacity(want);
    let mut start = 0usize;
    while start < bytes.len() {
        let tentative = (start + target).min(bytes.len());
        let end = if tentative == bytes.len() {
            tentative
        } else {
            match bytes[tentative..].iter().position(|&b| b == b'\n') {
                Some(offset) => tentative + offset + 1,
                None => bytes.len(),
            }
        };
        chunks.push(&bytes[start..end]);
        start = end;
    }
    chunks
}

pub(crate) fn run<R: Read>(
    mut reader: R,
    state: &mut MachineState,
    ctx: &mut RunCtx<'_>,
) -> Result<(), ParseError> {
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes).map_err(|e| ctx.io(e))?;
    ctx.note_bytes(bytes.len());
    ctx.checkpoint(state)?;

    let workers = thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .clamp(1, MAX_WORKERS);
    let chunks = split_chunks(&bytes, workers);
    debug!(target: "parser", workers, chunks = chunks.len(), bytes = bytes.len(), "worker_fanout");

    let scans: Vec<ChunkScan> = thread::scope(|scope| {
        let handles: Vec<_> = chunks
            .iter()
            .map(|chunk| scope.spawn(move || scan_chunk(chunk)))
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("worker scan panicked"))
            .collect()
    });

    // Ordered replay: same events, same line numbers, same state machine.
    let mut base = 0usize;
    for scan in scans {
        for (rel, event) in scan.events {
            state.apply_at(event, base + rel);
        }
        base += scan.lines;
        ctx.checkpoint(state)?;
    }
    state.set_line_count(base);
    Ok(())
}
