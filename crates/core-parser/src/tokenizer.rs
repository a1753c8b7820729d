//! Line classification: one trimmed line becomes at most one [`LineEvent`].
//!
//! Commands are matched on the token before the first space, uppercased;
//! comments are handed to the metadata grammars. Unknown G-code never
//! fails; it just produces no event.

use crate::metadata::{self, MetaEvent};

/// Layer boundary lifted from a slicer comment. `raw` is the number as
/// printed in the file; base detection and 0-based normalization happen in
/// the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerEvent {
    pub raw: u32,
    /// Declared total layer count, present in the fraction dialect
    /// (`; layer num/total_layer_count: n/N`).
    pub declared_total: Option<u32>,
}

/// Everything the state machine reacts to.
#[derive(Debug, Clone, PartialEq)]
pub enum LineEvent {
    ToolSelect(u32),
    /// `G0`/`G1`; only the Z word and extrusion presence matter.
    Move { z: Option<f64>, extrudes: bool },
    /// `M600` manual filament change.
    FilamentChange,
    Marker(MarkerEvent),
    Meta(MetaEvent),
}

/// Classify one raw line. Returns `None` for blank lines, unknown
/// commands, and unrecognized comments.
pub fn classify(raw: &str) -> Option<LineEvent> {
    let line = raw.trim();
    if line.is_empty() {
        return None;
    }
    if line.starts_with(';') {
        return metadata::classify_comment(line);
    }

    let mut words = line.split_whitespace();
    let head = words.next()?;

    if let Some(rest) = head.strip_prefix(['T', 't'])
        && let Ok(index) = rest.parse::<u32>()
    {
        return Some(LineEvent::ToolSelect(index));
    }

    match head.to_ascii_uppercase().as_str() {
        "G0" | "G1" => {
            let mut z = None;
            let mut extrudes = false;
            for word in words {
                let mut chars = word.chars();
                match chars.next() {
                    Some('Z') | Some('z') => {
                        if let Ok(v) = chars.as_str().parse::<f64>() {
                            z = Some(v);
                        }
                    }
                    Some('E') | Some('e') => {
                        if let Ok(v) = chars.as_str().parse::<f64>() {
                            extrudes |= v > 0.0;
                        }
                    }
                    _ => {}
                }
            }
            Some(LineEvent::Move { z, extrudes })
        }
        "M600" => Some(LineEvent::FilamentChange),
        _ => None,
    }
}
