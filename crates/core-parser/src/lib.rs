//! Streaming G-code analysis: tokenizer, metadata extraction, the
//! layer/tool state machine, and the statistics finalizer.
//!
//! The entry point is [`GcodeParser`]: pick an algorithm, optionally
//! inject a [`ColorNamer`], a [`CancelToken`], and a progress callback,
//! then call [`GcodeParser::parse`] on any `Read`. All algorithm variants
//! produce identical stats; `parse` never fails on unknown G-code; only
//! an unreadable source or cancellation aborts.
//!
//! ```no_run
//! use core_parser::GcodeParser;
//!
//! let mut parser = GcodeParser::default();
//! let stats = parser.parse_path(std::path::Path::new("print.gcode"))?;
//! println!("{} layers, {} colors", stats.total_layers, stats.colors.len());
//! # Ok::<(), core_parser::ParseError>(())
//! ```

use core_model::{GcodeStats, ParserAlgorithm};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::info;

mod cancel;
mod finalize;
pub mod metadata;
mod palette;
mod state;
pub mod tokenizer;
mod variants;

pub use cancel::CancelToken;
pub use core_events::ParseProgress;
pub use finalize::{FinalizeArgs, build_stats};
pub use palette::{ColorNamer, FilamentPalette, NullNamer};
pub use state::{MachineState, MetadataAcc, NumberingBase, RawParse};

use variants::RunCtx;

/// Parse failure. Unknown commands and missing metadata are not failures;
/// only an unreadable source, cancellation, or a catastrophically
/// malformed stream abort.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("failed to read {file}")]
    Io {
        file: String,
        #[source]
        source: std::io::Error,
    },
    #[error("parse cancelled")]
    Cancelled,
    #[error("malformed input in {file}: {message}")]
    Malformed { file: String, message: String },
}

type ProgressFn = Box<dyn FnMut(ParseProgress) + Send>;

/// Configurable single-pass G-code parser.
pub struct GcodeParser {
    algorithm: ParserAlgorithm,
    namer: Arc<dyn ColorNamer>,
    cancel: CancelToken,
    progress: Option<ProgressFn>,
}

impl Default for GcodeParser {
    fn default() -> Self {
        Self::new(ParserAlgorithm::default())
    }
}

impl GcodeParser {
    pub fn new(algorithm: ParserAlgorithm) -> Self {
        Self {
            algorithm,
            namer: Arc::new(FilamentPalette),
            cancel: CancelToken::new(),
            progress: None,
        }
    }

    pub fn with_namer(mut self, namer: Arc<dyn ColorNamer>) -> Self {
        self.namer = namer;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn on_progress(mut self, callback: impl FnMut(ParseProgress) + Send + 'static) -> Self {
        self.progress = Some(Box::new(callback));
        self
    }

    pub fn algorithm(&self) -> ParserAlgorithm {
        self.algorithm
    }

    /// Stream `source` to completion and return the stats aggregate.
    /// `total_bytes` (when known) feeds progress reporting and the
    /// `file_size` field.
    pub fn parse<R: Read>(
        &mut self,
        source: R,
        file_name: &str,
        total_bytes: Option<u64>,
    ) -> Result<GcodeStats, ParseError> {
        let started = Instant::now();
        let mut state = MachineState::new();
        let mut ctx = RunCtx {
            file: file_name,
            cancel: self.cancel.clone(),
            progress: self
                .progress
                .as_mut()
                .map(|cb| &mut **cb as &mut (dyn FnMut(ParseProgress) + Send)),
            total_bytes,
            bytes_read: 0,
        };

        match self.algorithm {
            ParserAlgorithm::Optimized => variants::chunked::run(source, &mut state, &mut ctx)?,
            ParserAlgorithm::Fsm => variants::chunked::run_fsm(source, &mut state, &mut ctx)?,
            ParserAlgorithm::Buffer => variants::buffer::run(source, &mut state, &mut ctx)?,
            ParserAlgorithm::Stream => variants::stream::run(source, &mut state, &mut ctx)?,
            ParserAlgorithm::Regex => variants::rgx::run(source, &mut state, &mut ctx)?,
            ParserAlgorithm::Worker => variants::worker::run(source, &mut state, &mut ctx)?,
            ParserAlgorithm::Lazy => variants::lazy::run(source, &mut state, &mut ctx)?,
        }

        let bytes_read = ctx.bytes_read;
        let raw = state.finish();
        let stats = build_stats(
            raw,
            FinalizeArgs {
                file_name,
                file_size: total_bytes.unwrap_or(bytes_read),
                namer: self.namer.as_ref(),
                parse_time_ms: started.elapsed().as_millis() as u64,
            },
        );
        info!(
            target: "parser",
            file = file_name,
            algorithm = self.algorithm.as_str(),
            layers = stats.total_layers,
            colors = stats.colors.len(),
            tool_changes = stats.tool_changes.len(),
            ms = stats.parse_time_ms,
            "parse_complete"
        );
        Ok(stats)
    }

    /// Open and parse a file on disk.
    pub fn parse_path(&mut self, path: &Path) -> Result<GcodeStats, ParseError> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let file = File::open(path).map_err(|source| ParseError::Io {
            file: name.clone(),
            source,
        })?;
        let total = file.metadata().ok().map(|m| m.len());
        self.parse(file, &name, total)
    }

    /// Parse in-memory text; convenience for tests and the bundle adapter.
    pub fn parse_str(&mut self, text: &str, file_name: &str) -> Result<GcodeStats, ParseError> {
        self.parse(text.as_bytes(), file_name, Some(text.len() as u64))
    }
}
