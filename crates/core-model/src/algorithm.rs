use serde::{Deserialize, Serialize};

/// Parser strategy selector. Every variant produces identical stats on the
/// same input (a tested law); they differ only in how bytes become lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParserAlgorithm {
    /// Chunked byte scanner, manual line splitting. The default.
    #[default]
    Optimized,
    /// Whole file in memory, then split.
    Buffer,
    /// `BufRead::read_line` loop.
    Stream,
    /// Line classification through a compiled regex set.
    Regex,
    /// Explicit byte-level scanner state machine.
    Fsm,
    /// Fan-out across threads on chunk boundaries, ordered replay.
    Worker,
    /// Pull-based line iterator; reads only when polled.
    Lazy,
}

impl ParserAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Optimized => "optimized",
            Self::Buffer => "buffer",
            Self::Stream => "stream",
            Self::Regex => "regex",
            Self::Fsm => "fsm",
            Self::Worker => "worker",
            Self::Lazy => "lazy",
        }
    }

    pub const ALL: [ParserAlgorithm; 7] = [
        Self::Optimized,
        Self::Buffer,
        Self::Stream,
        Self::Regex,
        Self::Fsm,
        Self::Worker,
        Self::Lazy,
    ];
}
