//! Slicer-comment grammars.
//!
//! Everything here is best-effort: a match populates an optional stats
//! field, a non-match is silently ignored, and nothing ever aborts the
//! parse. Patterns are case-insensitive and whitespace-tolerant, compiled
//! once into `LazyLock` statics.
//!
//! Recognized dialects:
//! * layer markers: `; layer num/total_layer_count: <n>/<N>`,
//!   `; layer #<n>`, `;LAYER:<n>`, `; layer <n>`
//! * color definitions: `; extruder_colour = c1;c2;…`,
//!   `; filament_colour = …`
//! * slicer banner: `; generated by <Name> <Version>`
//! * print time: `; total estimated time: 5h 41m 9s`,
//!   `; estimated printing time (normal mode) = <h>h <m>m <s>s`
//! * cost: `; filament cost = c1, c2, …`
//! * weight: `; filament used [g] = w1, w2, …` or the detailed
//!   `; filament used [g] = T (M+S)` form
//! * length: `; filament used [mm] = l1, l2, …`
//! * flushed / wipe tower: `; flushed material = x`, `; wipe tower = x`

use crate::tokenizer::{LineEvent, MarkerEvent};
use regex::Regex;
use std::sync::LazyLock;

static LAYER_FRACTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^;\s*layer num/total_layer_count:\s*(\d+)\s*/\s*(\d+)").unwrap()
});
static LAYER_HASH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^;\s*layer\s*#\s*(\d+)").unwrap());
static LAYER_COLON: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^;\s*layer:\s*(\d+)").unwrap());
static LAYER_PLAIN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^;\s*layer\s+(\d+)\s*$").unwrap());
static COLOR_DEFS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^;\s*(?:extruder_colour|filament_colour)\s*=\s*(.+)$").unwrap()
});
static BANNER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^;\s*generated by\s+(\S+)(?:\s+(\S+))?").unwrap());
static TIME_TOTAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^;\s*total estimated time:\s*(.+)$").unwrap());
static TIME_ESTIMATED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^;\s*estimated printing time(?:\s*\([^)]*\))?\s*=?\s*(.+)$").unwrap()
});
static COST: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^;\s*filament cost\s*=\s*(.+)$").unwrap());
static USED_G: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^;\s*filament used\s*\[g\]\s*=\s*(.+)$").unwrap());
static USED_MM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^;\s*filament used\s*\[mm\]\s*=\s*(.+)$").unwrap());
static DETAILED_USAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([0-9.]+)\s*\(\s*([0-9.]+)\s*\+\s*([0-9.]+)\s*\)\s*$").unwrap()
});
static FLUSHED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^;\s*flushed material\s*=\s*([0-9.]+)").unwrap());
static WIPE_TOWER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^;\s*wipe tower\s*=\s*([0-9.]+)").unwrap());
static DURATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:(\d+)\s*d)?\s*(?:(\d+)\s*h)?\s*(?:(\d+)\s*m)?\s*(?:(\d+)\s*s)?").unwrap()
});

/// Metadata fact lifted from a recognized slicer comment.
#[derive(Debug, Clone, PartialEq)]
pub enum MetaEvent {
    /// Raw semicolon-separated definitions, positional by tool index.
    ColorDefs(Vec<String>),
    Banner {
        software: String,
        version: Option<String>,
    },
    PrintTime {
        raw: String,
        seconds: Option<u64>,
    },
    Costs(Vec<f64>),
    WeightsPerTool(Vec<f64>),
    LengthsPerTool(Vec<f64>),
    DetailedUsage {
        total_g: f64,
        model_g: f64,
        support_g: f64,
    },
    Flushed(f64),
    WipeTower(f64),
}

/// Classify a comment line (leading `;` included).
pub fn classify_comment(line: &str) -> Option<LineEvent> {
    if let Some(caps) = LAYER_FRACTION.captures(line) {
        return Some(LineEvent::Marker(MarkerEvent {
            raw: caps[1].parse().ok()?,
            declared_total: caps[2].parse().ok(),
        }));
    }
    if let Some(caps) = LAYER_HASH
        .captures(line)
        .or_else(|| LAYER_COLON.captures(line))
        .or_else(|| LAYER_PLAIN.captures(line))
    {
        return Some(LineEvent::Marker(MarkerEvent {
            raw: caps[1].parse().ok()?,
            declared_total: None,
        }));
    }
    if let Some(caps) = COLOR_DEFS.captures(line) {
        let defs = caps[1]
            .split(';')
            .map(|d| d.trim().to_string())
            .collect::<Vec<_>>();
        return Some(LineEvent::Meta(MetaEvent::ColorDefs(defs)));
    }
    if let Some(caps) = USED_G.captures(line) {
        let body = caps[1].trim();
        if let Some(detail) = DETAILED_USAGE.captures(body) {
            return Some(LineEvent::Meta(MetaEvent::DetailedUsage {
                total_g: detail[1].parse().ok()?,
                model_g: detail[2].parse().ok()?,
                support_g: detail[3].parse().ok()?,
            }));
        }
        return Some(LineEvent::Meta(MetaEvent::WeightsPerTool(number_list(
            body,
        ))));
    }
    if let Some(caps) = USED_MM.captures(line) {
        return Some(LineEvent::Meta(MetaEvent::LengthsPerTool(number_list(
            &caps[1],
        ))));
    }
    if let Some(caps) = COST.captures(line) {
        return Some(LineEvent::Meta(MetaEvent::Costs(number_list(&caps[1]))));
    }
    if let Some(caps) = FLUSHED.captures(line) {
        return Some(LineEvent::Meta(MetaEvent::Flushed(caps[1].parse().ok()?)));
    }
    if let Some(caps) = WIPE_TOWER.captures(line) {
        return Some(LineEvent::Meta(MetaEvent::WipeTower(
            caps[1].parse().ok()?,
        )));
    }
    if let Some(caps) = TIME_TOTAL
        .captures(line)
        .or_else(|| TIME_ESTIMATED.captures(line))
    {
        let raw = caps[1].trim().to_string();
        let seconds = parse_duration(&raw);
        return Some(LineEvent::Meta(MetaEvent::PrintTime { raw, seconds }));
    }
    if let Some(caps) = BANNER.captures(line) {
        return Some(LineEvent::Meta(MetaEvent::Banner {
            software: caps[1].to_string(),
            version: caps.get(2).map(|m| m.as_str().to_string()),
        }));
    }
    None
}

/// `"5h 41m 9s"` → seconds. Returns `None` unless at least one component
/// matched.
pub fn parse_duration(raw: &str) -> Option<u64> {
    let caps = DURATION.captures(raw)?;
    let part = |i: usize| {
        caps.get(i)
            .and_then(|m| m.as_str().parse::<u64>().ok())
    };
    let (d, h, m, s) = (part(1), part(2), part(3), part(4));
    if d.is_none() && h.is_none() && m.is_none() && s.is_none() {
        return None;
    }
    Some(
        d.unwrap_or(0) * 86_400
            + h.unwrap_or(0) * 3_600
            + m.unwrap_or(0) * 60
            + s.unwrap_or(0),
    )
}

fn number_list(raw: &str) -> Vec<f64> {
    raw.split(',')
        .filter_map(|part| part.trim().parse::<f64>().ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(line: &str) -> MetaEvent {
        match classify_comment(line) {
            Some(LineEvent::Meta(m)) => m,
            other => panic!("expected meta event for {line:?}, got {other:?}"),
        }
    }

    fn marker(line: &str) -> MarkerEvent {
        match classify_comment(line) {
            Some(LineEvent::Marker(m)) => m,
            other => panic!("expected marker for {line:?}, got {other:?}"),
        }
    }

    #[test]
    fn all_layer_dialects_match() {
        assert_eq!(marker("; layer num/total_layer_count: 3/25").raw, 3);
        assert_eq!(marker("; layer #7").raw, 7);
        assert_eq!(marker(";LAYER:0").raw, 0);
        assert_eq!(marker("; layer 12").raw, 12);
    }

    #[test]
    fn fraction_dialect_declares_total() {
        let m = marker(";  LAYER NUM/TOTAL_LAYER_COUNT:  1 / 250");
        assert_eq!((m.raw, m.declared_total), (1, Some(250)));
    }

    #[test]
    fn plain_dialect_requires_bare_number() {
        // Must not shadow the fraction or count dialects.
        assert!(classify_comment("; layer count: 5").is_none());
    }

    #[test]
    fn color_definitions_split_on_semicolons() {
        let m = meta("; extruder_colour = #FF0000;#00FF00;#0000FF");
        assert_eq!(
            m,
            MetaEvent::ColorDefs(vec![
                "#FF0000".into(),
                "#00FF00".into(),
                "#0000FF".into()
            ])
        );
        assert!(matches!(
            meta("; filament_colour = #26A69A;#ECECEC"),
            MetaEvent::ColorDefs(_)
        ));
    }

    #[test]
    fn banner_extracts_software_and_version() {
        assert_eq!(
            meta("; generated by PrusaSlicer 2.7.1 on 2024-01-01"),
            MetaEvent::Banner {
                software: "PrusaSlicer".into(),
                version: Some("2.7.1".into()),
            }
        );
    }

    #[test]
    fn print_time_both_forms() {
        assert_eq!(
            meta("; total estimated time: 5h 41m 9s"),
            MetaEvent::PrintTime {
                raw: "5h 41m 9s".into(),
                seconds: Some(5 * 3600 + 41 * 60 + 9),
            }
        );
        assert_eq!(
            meta("; estimated printing time (normal mode) = 1h 2m 3s"),
            MetaEvent::PrintTime {
                raw: "1h 2m 3s".into(),
                seconds: Some(3723),
            }
        );
    }

    #[test]
    fn weight_list_and_detailed_form() {
        assert_eq!(
            meta("; filament used [g] = 12.5, 3.25"),
            MetaEvent::WeightsPerTool(vec![12.5, 3.25])
        );
        assert_eq!(
            meta("; filament used [g] = 15.75 (12.5+3.25)"),
            MetaEvent::DetailedUsage {
                total_g: 15.75,
                model_g: 12.5,
                support_g: 3.25,
            }
        );
    }

    #[test]
    fn cost_flushed_and_wipe_tower() {
        assert_eq!(
            meta("; filament cost = 0.41, 0.12"),
            MetaEvent::Costs(vec![0.41, 0.12])
        );
        assert_eq!(meta("; flushed material = 8.4"), MetaEvent::Flushed(8.4));
        assert_eq!(meta("; wipe tower = 14.2"), MetaEvent::WipeTower(14.2));
    }

    #[test]
    fn unrecognized_comments_are_ignored() {
        assert!(classify_comment("; just a note").is_none());
        assert!(classify_comment(";TYPE:WALL-OUTER").is_none());
    }

    #[test]
    fn duration_parses_partial_components() {
        assert_eq!(parse_duration("2m 30s"), Some(150));
        assert_eq!(parse_duration("1d 1h"), Some(90_000));
        assert_eq!(parse_duration("soon"), None);
    }
}
