//! Injectable color-name lookup.
//!
//! The finalizer enhances color names through a [`ColorNamer`]; the
//! built-in [`FilamentPalette`] does nearest-match against a small table of
//! common filament colors. Lookup is best-effort everywhere: a miss keeps
//! the raw hex or tool handle.

use core_model::{hex_to_rgb, normalize_hex};

pub trait ColorNamer: Send + Sync {
    /// Display name for a normalized `#RRGGBB` triplet.
    fn name_for(&self, hex: &str) -> Option<String>;

    /// Resolve a raw color definition (hex or color word) to normalized
    /// hex. Default: hex syntax only.
    fn hex_for(&self, definition: &str) -> Option<String> {
        normalize_hex(definition)
    }
}

/// Lookup that never matches; tests use it to keep names raw.
pub struct NullNamer;

impl ColorNamer for NullNamer {
    fn name_for(&self, _hex: &str) -> Option<String> {
        None
    }
}

/// Common filament colors, nearest-matched by squared RGB distance.
pub struct FilamentPalette;

const PALETTE: &[(&str, &str)] = &[
    ("Black", "#000000"),
    ("White", "#FFFFFF"),
    ("Jade White", "#ECECEC"),
    ("Silver", "#C0C0C0"),
    ("Gray", "#808080"),
    ("Dark Gray", "#404040"),
    ("Red", "#FF0000"),
    ("Dark Red", "#8B0000"),
    ("Magenta", "#FF00FF"),
    ("Pink", "#FFC0CB"),
    ("Hot Pink", "#F5547C"),
    ("Orange", "#FF8000"),
    ("Pumpkin Orange", "#FF9016"),
    ("Yellow", "#FFFF00"),
    ("Sunflower Yellow", "#FEC600"),
    ("Gold", "#FFD700"),
    ("Green", "#008000"),
    ("Lime", "#00FF00"),
    ("Bambu Green", "#00AE42"),
    ("Mint", "#61C680"),
    ("Teal", "#26A69A"),
    ("Cyan", "#00FFFF"),
    ("Sky Blue", "#56B7E6"),
    ("Blue", "#0000FF"),
    ("Navy", "#000080"),
    ("Cobalt Blue", "#0056B8"),
    ("Purple", "#800080"),
    ("Violet", "#5E43B7"),
    ("Brown", "#8B4513"),
    ("Chocolate", "#4D3324"),
    ("Beige", "#F5F5DC"),
    ("Ivory", "#FFFFF0"),
    ("Bronze", "#847D48"),
    ("Maroon", "#800000"),
    ("Olive", "#808000"),
];

impl ColorNamer for FilamentPalette {
    fn name_for(&self, hex: &str) -> Option<String> {
        let (r, g, b) = hex_to_rgb(hex)?;
        PALETTE
            .iter()
            .filter_map(|(name, entry_hex)| {
                let (er, eg, eb) = hex_to_rgb(entry_hex)?;
                let dist = (r as i32 - er as i32).pow(2)
                    + (g as i32 - eg as i32).pow(2)
                    + (b as i32 - eb as i32).pow(2);
                Some((dist, *name))
            })
            .min_by_key(|(dist, _)| *dist)
            .map(|(_, name)| name.to_string())
    }

    fn hex_for(&self, definition: &str) -> Option<String> {
        if let Some(hex) = normalize_hex(definition) {
            return Some(hex);
        }
        let wanted = definition.trim();
        PALETTE
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(wanted))
            .map(|(_, hex)| (*hex).to_string())
    }
}
