//! Property: every parser algorithm produces the same layer-color map,
//! the same color set, and the same tool-change sequence on the same
//! input, regardless of chunking.

use core_model::ParserAlgorithm;
use core_parser::GcodeParser;
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Marker(bool),
    Tool(u32),
    Move(u32),
    M600,
    Comment,
    Noise,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        any::<bool>().prop_map(Op::Marker),
        (0u32..5).prop_map(Op::Tool),
        (1u32..900).prop_map(Op::Move),
        Just(Op::M600),
        Just(Op::Comment),
        Just(Op::Noise),
    ]
}

/// Render ops into a file; markers advance an internal counter so layer
/// numbers are realistic (ascending, occasionally skipping).
fn render(ops: &[Op], crlf: bool, trailing_newline: bool) -> String {
    let mut out = String::new();
    let mut layer = 0u32;
    let eol = if crlf { "\r\n" } else { "\n" };
    for op in ops {
        match op {
            Op::Marker(skip) => {
                layer += if *skip { 2 } else { 1 };
                out.push_str(&format!(";LAYER:{layer}{eol}"));
            }
            Op::Tool(k) => out.push_str(&format!("T{k}{eol}")),
            Op::Move(z) => out.push_str(&format!(
                "G1 X4.2 Y1.1 Z{:.2} E1.0 F1800{eol}",
                *z as f64 / 100.0
            )),
            Op::M600 => out.push_str(&format!("M600{eol}")),
            Op::Comment => out.push_str(&format!("; wall outer{eol}")),
            Op::Noise => out.push_str(&format!("M104 S215{eol}")),
        }
    }
    if !trailing_newline {
        while out.ends_with('\n') || out.ends_with('\r') {
            out.pop();
        }
    }
    out
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]
    #[test]
    fn all_variants_agree(
        ops in prop::collection::vec(op_strategy(), 0..60),
        crlf in any::<bool>(),
        trailing_newline in any::<bool>(),
    ) {
        let text = render(&ops, crlf, trailing_newline);
        let reference = GcodeParser::new(ParserAlgorithm::Buffer)
            .parse_str(&text, "ref.gcode")
            .unwrap();

        for algorithm in ParserAlgorithm::ALL {
            let stats = GcodeParser::new(algorithm)
                .parse_str(&text, "ref.gcode")
                .unwrap();
            prop_assert_eq!(
                &stats.layer_color_map,
                &reference.layer_color_map,
                "layer map diverged under {:?}",
                algorithm
            );
            let ids: Vec<_> = stats.colors.iter().map(|c| c.id.clone()).collect();
            let ref_ids: Vec<_> = reference.colors.iter().map(|c| c.id.clone()).collect();
            prop_assert_eq!(ids, ref_ids, "color set diverged under {:?}", algorithm);
            prop_assert_eq!(
                &stats.tool_changes,
                &reference.tool_changes,
                "tool changes diverged under {:?}",
                algorithm
            );
            prop_assert_eq!(
                &stats.parser_warnings,
                &reference.parser_warnings,
                "warnings diverged under {:?}",
                algorithm
            );
        }
    }
}

#[test]
fn variants_agree_on_a_known_file() {
    let text = "\
; generated by OrcaSlicer 2.1.1
; extruder_colour = #FF0000;#00FF00
; layer num/total_layer_count: 1/3
G1 Z0.2 E1
T0
; layer num/total_layer_count: 2/3
G1 Z0.4 E1
T1
M600
; layer num/total_layer_count: 3/3
G1 Z0.6 E1
";
    let reference = GcodeParser::new(ParserAlgorithm::Buffer)
        .parse_str(text, "known.gcode")
        .unwrap();
    assert_eq!(reference.total_layers, 3);
    assert_eq!(reference.tool_changes.len(), 1);
    for algorithm in ParserAlgorithm::ALL {
        let stats = GcodeParser::new(algorithm)
            .parse_str(text, "known.gcode")
            .unwrap();
        assert_eq!(stats.layer_color_map, reference.layer_color_map);
        assert_eq!(stats.tool_changes, reference.tool_changes);
        assert_eq!(stats.total_layers, reference.total_layers);
        assert_eq!(stats.total_height, reference.total_height);
    }
}
