//! Bundle extraction and parse dispatch over in-memory ZIP fixtures.

use core_bundle::{BundleError, extract, is_bundle, parse_any};
use core_model::ToolId;
use core_parser::GcodeParser;
use std::io::{Cursor, Write};
use zip::ZipArchive;
use zip::write::{SimpleFileOptions, ZipWriter};

const GCODE_BODY: &str = "\
; layer num/total_layer_count: 1/3
G1 Z0.2 E1
T0
; layer num/total_layer_count: 2/3
G1 Z0.4 E1
T1
; layer num/total_layer_count: 3/3
G1 Z0.6 E1
; filament cost = 0.41, 0.12
";

fn build_bundle(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, body) in entries {
        writer
            .start_file(name.to_string(), SimpleFileOptions::default())
            .unwrap();
        writer.write_all(body).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

fn manifest_json() -> &'static str {
    r##"{
        "filament_colors": ["#FF0000", "#00FF00"],
        "filament_ids": [101, 102],
        "bed_type": "textured_plate",
        "nozzle_diameter": 0.4,
        "version": "1.10.0",
        "is_seq_print": false,
        "bbox_objects": [{"id": 1, "name": "cube", "bbox": [10.0, 10.0, 50.0, 50.0]}]
    }"##
}

#[test]
fn detection_needs_extension_and_magic() {
    let bundle = build_bundle(&[("metadata/plate_1.gcode", GCODE_BODY.as_bytes())]);
    assert!(is_bundle("print.gcode.3mf", &bundle));
    assert!(!is_bundle("print.gcode", &bundle));
    assert!(!is_bundle("print.gcode.3mf", b"; plain gcode"));
}

#[test]
fn bundle_parse_enriches_colors_and_keeps_base_stats() {
    let bundle = build_bundle(&[
        ("Metadata/slice_info.json", manifest_json().as_bytes()),
        ("metadata/plate_1.gcode", GCODE_BODY.as_bytes()),
    ]);
    let mut parser = GcodeParser::default();
    let stats = parse_any(&mut parser, &bundle, "model.gcode.3mf").unwrap();

    assert!(stats.is_bundle);
    assert_eq!(stats.file_name, "model.gcode.3mf");
    assert_eq!(stats.total_layers, 3);
    assert_eq!(stats.tool_changes.len(), 1);
    // Manifest hexes land positionally on T0/T1.
    assert_eq!(
        stats.color(&ToolId::from_index(0)).unwrap().hex.as_deref(),
        Some("#FF0000")
    );
    assert_eq!(
        stats.color(&ToolId::from_index(1)).unwrap().hex.as_deref(),
        Some("#00FF00")
    );
    // Base numeric fields are preserved unchanged.
    let cost = stats.print_cost.unwrap();
    assert!((cost - 0.53).abs() < 1e-9);

    let manifest = stats.bundle.as_ref().unwrap();
    assert_eq!(manifest.filament_ids, vec![101, 102]);
    assert_eq!(manifest.bed_type.as_deref(), Some("textured_plate"));
    assert_eq!(manifest.bbox_objects.len(), 1);

    // Identical to a direct parse of the embedded entry, modulo the
    // bundle-only fields.
    let mut direct = GcodeParser::default()
        .parse_str(GCODE_BODY, "model.gcode.3mf")
        .unwrap();
    direct.is_bundle = true;
    direct.bundle = stats.bundle.clone();
    direct.file_size = stats.file_size;
    direct.parse_time_ms = stats.parse_time_ms;
    for color in &mut direct.colors {
        color.hex = stats.color(&color.id).unwrap().hex.clone();
    }
    assert_eq!(direct.layer_color_map, stats.layer_color_map);
    assert_eq!(direct.tool_changes, stats.tool_changes);
    assert_eq!(direct.print_cost, stats.print_cost);
}

#[test]
fn thumbnails_are_not_gcode_entries() {
    let bundle = build_bundle(&[
        ("Metadata/thumbnail/preview.gcode", b"decoy".as_slice()),
        ("metadata/plate_1.gcode", GCODE_BODY.as_bytes()),
    ]);
    let extracted = extract(&bundle).unwrap();
    assert_eq!(extracted.gcode_entry, "metadata/plate_1.gcode");
}

#[test]
fn missing_gcode_entry_is_an_error() {
    let bundle = build_bundle(&[("Metadata/slice_info.json", manifest_json().as_bytes())]);
    assert!(matches!(
        extract(&bundle).unwrap_err(),
        BundleError::MissingGcode
    ));
}

#[test]
fn corrupt_manifest_is_an_error() {
    let bundle = build_bundle(&[
        ("metadata/plate_1.gcode", GCODE_BODY.as_bytes()),
        ("Metadata/slice_info.json", b"{not json".as_slice()),
    ]);
    assert!(matches!(
        extract(&bundle).unwrap_err(),
        BundleError::CorruptMetadata { .. }
    ));
}

#[test]
fn garbage_zip_is_not_zip() {
    assert!(matches!(
        extract(b"PK\x03\x04 but truncated").unwrap_err(),
        BundleError::NotZip(_)
    ));
}

#[test]
fn extraction_failure_falls_back_to_plain_parse() {
    // A bundle-named file with no gcode entry: extraction fails, the raw
    // bytes go through the base parser, which never rejects unknown input.
    let bundle = build_bundle(&[("Metadata/slice_info.json", manifest_json().as_bytes())]);
    let mut parser = GcodeParser::default();
    let stats = parse_any(&mut parser, &bundle, "odd.gcode.3mf").unwrap();
    assert!(!stats.is_bundle);
    assert_eq!(stats.file_name, "odd.gcode.3mf");
    assert_eq!(stats.total_layers, 1, "binary noise degrades to one layer");
}

#[test]
fn plain_gcode_skips_the_adapter() {
    let mut parser = GcodeParser::default();
    let stats = parse_any(&mut parser, GCODE_BODY.as_bytes(), "plain.gcode").unwrap();
    assert!(!stats.is_bundle);
    assert!(stats.bundle.is_none());
    assert_eq!(stats.total_layers, 3);
}

#[test]
fn manifest_round_trips_through_archive() {
    let bundle = build_bundle(&[
        ("metadata/plate_1.gcode", GCODE_BODY.as_bytes()),
        ("Metadata/slice_info.json", manifest_json().as_bytes()),
    ]);
    // The fixture itself must be a well-formed archive.
    let archive = ZipArchive::new(Cursor::new(bundle.as_slice())).unwrap();
    assert_eq!(archive.len(), 2);
    let extracted = extract(&bundle).unwrap();
    let manifest = extracted.manifest.unwrap();
    assert_eq!(manifest.filament_colors.len(), 2);
    assert_eq!(manifest.nozzle_diameter, Some(0.4));
    assert_eq!(manifest.is_seq_print, Some(false));
}
