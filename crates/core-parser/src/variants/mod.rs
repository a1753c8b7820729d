//! Parser algorithm variants.
//!
//! Every variant drives the same [`MachineState`]; they differ only in how
//! bytes become lines (and, for `worker`, on which thread the
//! classification happens). Equivalence of the resulting stats is a tested
//! law; see the `variant_equivalence` integration test.

use crate::ParseError;
use crate::cancel::CancelToken;
use crate::state::MachineState;
use core_events::ParseProgress;

pub(crate) mod buffer;
pub(crate) mod chunked;
pub(crate) mod lazy;
pub(crate) mod rgx;
pub(crate) mod stream;
pub(crate) mod worker;

/// Lines between cancellation/progress checkpoints on the line-at-a-time
/// variants; the chunked variants checkpoint per chunk instead.
pub(crate) const CHECK_EVERY_LINES: usize = 4096;

/// Shared per-run bookkeeping: cancellation, progress reporting, byte and
/// file identity for error messages.
pub(crate) struct RunCtx<'a> {
    pub file: &'a str,
    pub cancel: CancelToken,
    pub progress: Option<&'a mut (dyn FnMut(ParseProgress) + Send)>,
    pub total_bytes: Option<u64>,
    pub bytes_read: u64,
}

impl<'a> RunCtx<'a> {
    pub fn note_bytes(&mut self, n: usize) {
        self.bytes_read += n as u64;
    }

    pub fn io(&self, source: std::io::Error) -> ParseError {
        ParseError::Io {
            file: self.file.to_string(),
            source,
        }
    }

    /// Cancellation check plus progress report. Variants call this between
    /// chunks or every [`CHECK_EVERY_LINES`] lines.
    pub fn checkpoint(&mut self, state: &MachineState) -> Result<(), ParseError> {
        if self.cancel.is_cancelled() {
            return Err(ParseError::Cancelled);
        }
        if let Some(cb) = self.progress.as_mut() {
            cb(ParseProgress {
                bytes_read: self.bytes_read,
                total_bytes: self.total_bytes,
                lines: state.lines_fed() as u64,
                layer: state.current_layer(),
            });
        }
        Ok(())
    }
}
