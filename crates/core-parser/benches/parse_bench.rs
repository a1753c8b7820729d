//! Parser variant throughput over a synthetic multi-color print.

use core_model::ParserAlgorithm;
use core_parser::GcodeParser;
use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

/// Synthetic print: `layers` layers, four tools cycling, movement and
/// comment noise roughly matching real slicer output density.
fn synthetic_gcode(layers: u32) -> String {
    let mut out = String::with_capacity(layers as usize * 220);
    out.push_str("; generated by OrcaSlicer 2.1.1\n");
    out.push_str("; extruder_colour = #FF0000;#00FF00;#0000FF;#FFFF00\n");
    for layer in 1..=layers {
        out.push_str(&format!(
            "; layer num/total_layer_count: {layer}/{layers}\n"
        ));
        out.push_str(&format!("G1 Z{:.2} F3000\n", layer as f64 * 0.2));
        out.push_str(&format!("T{}\n", layer % 4));
        for segment in 0..6 {
            out.push_str(&format!(
                "G1 X{}.4 Y{}.1 E0.8 F1800\n",
                segment * 7,
                segment * 3
            ));
        }
        out.push_str(";TYPE:WALL-OUTER\n");
    }
    out
}

fn bench_variants(c: &mut Criterion) {
    let input = synthetic_gcode(600);
    let mut group = c.benchmark_group("parse_600_layers");
    for algorithm in ParserAlgorithm::ALL {
        group.bench_function(algorithm.as_str(), |b| {
            b.iter(|| {
                let stats = GcodeParser::new(algorithm)
                    .parse_str(black_box(&input), "bench.gcode")
                    .unwrap();
                black_box(stats.total_layers)
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_variants);
criterion_main!(benches);
