use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Cooperative cancellation flag for an in-flight parse.
///
/// Cheap to clone; all clones observe the same flag. The parser checks it
/// at chunk/line-batch granularity and surfaces
/// [`ParseError::Cancelled`](crate::ParseError::Cancelled) without
/// finalizing stats.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}
