//! Bundle adapter: ZIP-packaged prints (`.gcode.3mf`) carrying G-code plus
//! slicer metadata.
//!
//! `parse_any` is the composition point: plain files go straight to the
//! base parser; bundles are unwrapped, the embedded G-code entry is parsed
//! from memory, and the manifest's filament colors are merged into the
//! stats afterwards. Every numeric field the base parser produced is left
//! untouched. If extraction fails for any reason the original bytes are
//! handed to the base parser as-is; only when that also fails does a
//! combined error naming the file surface.

use core_model::{BundleManifest, GcodeStats, normalize_hex};
use core_parser::{GcodeParser, ParseError};
use std::io::{Cursor, Read};
use thiserror::Error;
use tracing::{debug, info, warn};
use zip::ZipArchive;

/// Bundle file extension; `.gcode.3mf` matches by suffix.
pub const BUNDLE_EXTENSION: &str = ".3mf";
/// Extension of the embedded print entry.
pub const GCODE_EXTENSION: &str = ".gcode";

const ZIP_MAGIC: &[u8; 4] = b"PK\x03\x04";

#[derive(Debug, Error)]
pub enum BundleError {
    /// Not a readable ZIP archive; also covers truncation or corruption
    /// discovered while reading an entry.
    #[error("not a valid zip archive: {0}")]
    NotZip(String),
    #[error("bundle has no gcode entry")]
    MissingGcode,
    #[error("corrupt bundle metadata in {entry}")]
    CorruptMetadata {
        entry: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Extraction product: the embedded G-code, the manifest when one parsed,
/// and the entry the G-code came from.
#[derive(Debug)]
pub struct Extracted {
    pub gcode: Vec<u8>,
    pub manifest: Option<BundleManifest>,
    pub gcode_entry: String,
}

/// Bundle detection by extension and ZIP magic bytes.
pub fn is_bundle(file_name: &str, bytes: &[u8]) -> bool {
    file_name.to_ascii_lowercase().ends_with(BUNDLE_EXTENSION) && bytes.starts_with(ZIP_MAGIC)
}

/// Unpack a bundle: locate the G-code entry (thumbnails excluded) and any
/// JSON manifest. Strict; callers wanting leniency use [`parse_any`].
pub fn extract(bytes: &[u8]) -> Result<Extracted, BundleError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| BundleError::NotZip(e.to_string()))?;

    let mut names: Vec<String> = Vec::with_capacity(archive.len());
    for index in 0..archive.len() {
        let entry = archive
            .by_index(index)
            .map_err(|e| BundleError::NotZip(format!("entry #{index} unreadable: {e}")))?;
        names.push(entry.name().to_string());
    }

    let gcode_entry = names
        .iter()
        .find(|name| {
            let lower = name.to_ascii_lowercase();
            lower.ends_with(GCODE_EXTENSION) && !lower.contains("thumbnail")
        })
        .cloned()
        .ok_or(BundleError::MissingGcode)?;
    let gcode = read_entry(&mut archive, &gcode_entry)?;
    debug!(target: "bundle", entry = %gcode_entry, bytes = gcode.len(), "gcode_entry_extracted");

    let mut manifest = None;
    for name in &names {
        let lower = name.to_ascii_lowercase();
        if !(lower.ends_with(".json") || lower.ends_with("project_settings.config")) {
            continue;
        }
        let raw = read_entry(&mut archive, name)?;
        let parsed: BundleManifest =
            serde_json::from_slice(&raw).map_err(|source| BundleError::CorruptMetadata {
                entry: name.clone(),
                source,
            })?;
        debug!(target: "bundle", entry = %name, colors = parsed.filament_colors.len(), "manifest_parsed");
        manifest = Some(parsed);
        break;
    }

    Ok(Extracted {
        gcode,
        manifest,
        gcode_entry,
    })
}

fn read_entry(
    archive: &mut ZipArchive<Cursor<&[u8]>>,
    name: &str,
) -> Result<Vec<u8>, BundleError> {
    let mut entry = archive
        .by_name(name)
        .map_err(|e| BundleError::NotZip(format!("entry {name} unreadable: {e}")))?;
    let mut buf = Vec::with_capacity(entry.size() as usize);
    entry
        .read_to_end(&mut buf)
        .map_err(|e| BundleError::NotZip(format!("entry {name} truncated: {e}")))?;
    Ok(buf)
}

/// Parse a file that may or may not be a bundle.
///
/// Bundles keep their original file name on the resulting stats, carry
/// `is_bundle = true`, attach the raw manifest, and get the manifest's
/// filament hex values merged into the colors positionally.
pub fn parse_any(
    parser: &mut GcodeParser,
    bytes: &[u8],
    file_name: &str,
) -> Result<GcodeStats, ParseError> {
    if !is_bundle(file_name, bytes) {
        return parser.parse(bytes, file_name, Some(bytes.len() as u64));
    }

    match extract(bytes) {
        Ok(extracted) => {
            let mut stats = parser.parse(
                extracted.gcode.as_slice(),
                file_name,
                Some(bytes.len() as u64),
            )?;
            stats.is_bundle = true;
            if let Some(manifest) = extracted.manifest {
                merge_manifest_colors(&mut stats, &manifest);
                stats.bundle = Some(manifest);
            }
            info!(
                target: "bundle",
                file = file_name,
                entry = %extracted.gcode_entry,
                colors = stats.colors.len(),
                "bundle_parsed"
            );
            Ok(stats)
        }
        Err(bundle_err) => {
            warn!(target: "bundle", file = file_name, error = %bundle_err, "extraction_failed_trying_plain");
            parser
                .parse(bytes, file_name, Some(bytes.len() as u64))
                .map_err(|parse_err| ParseError::Malformed {
                    file: file_name.to_string(),
                    message: format!(
                        "bundle extraction failed ({bundle_err}) and plain parse failed ({parse_err})"
                    ),
                })
        }
    }
}

/// Positional merge: manifest color `k` applies to tool `Tk`. The
/// manifest is authoritative for hex; every other field stays as the base
/// parser produced it.
fn merge_manifest_colors(stats: &mut GcodeStats, manifest: &BundleManifest) {
    for color in &mut stats.colors {
        let Some(index) = color.id.index() else {
            continue;
        };
        if let Some(raw) = manifest.filament_colors.get(index as usize)
            && let Some(hex) = normalize_hex(raw)
        {
            color.hex = Some(hex);
        }
    }
}
