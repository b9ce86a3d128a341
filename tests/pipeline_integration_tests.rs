//! End-to-end tests for parsing, optimizing and analyzing programs
use gcode_streamer::analysis::{detect_units, detect_workarea, AnalysisError, Report, Units};
use gcode_streamer::optimizer::{moves, patchers, Pass, Pipeline, SequencingError};
use gcode_streamer::parser::{parse, Statement, WireFormat};

fn lines(statements: &[Statement]) -> Vec<String> {
    statements.iter().map(|s| s.to_string()).collect()
}

const PROGRAM: &str = "%
(part: bracket)
G21
G90
G0 X0 Y0
G1 X1 Y0 F300
G1 X2 Y0
G1 X3 Y0
M5
%
";

#[test]
fn test_canonical_pipeline_end_to_end() {
    let statements = parse(PROGRAM).expect("parse program");
    assert_eq!(statements.len(), 10);

    let optimized = Pipeline::canonical().run(statements).expect("run pipeline");
    assert_eq!(
        lines(&optimized),
        vec!["G21", "G90", "G0X0Y0", "F300", "G1X1", "X3", "M5"]
    );
}

#[test]
fn test_report_after_optimization() {
    let optimized = Pipeline::canonical()
        .run(parse(PROGRAM).unwrap())
        .unwrap();
    let report = Report::analyze(&optimized);

    assert_eq!(report.units, Ok(Units::Metric));
    let area = report.workarea.as_ref().expect("workarea");
    assert_eq!(area.get(&'X'), Some(&(0.0, 3.0)));
    assert!(!area.contains_key(&'Y'));
    assert_eq!(report.feedrates, vec![300.0]);

    let json = serde_json::to_value(&report).expect("serialize report");
    assert_eq!(json["feedrates"], serde_json::json!([300.0]));
}

#[test]
fn test_repeated_feedrates_are_sent_once() {
    let statements = parse("F100\nF100\nF200").unwrap();
    let patched = patchers::isolate_feedrates(statements);
    assert_eq!(lines(&patched), vec!["F100", "F200"]);
}

#[test]
fn test_feedrate_split_keeps_order() {
    let statements = parse("G1 X1 F100\nG1 X2 F100\nG1 X3 F200").unwrap();
    let patched = patchers::isolate_feedrates(statements);
    assert_eq!(
        lines(&patched),
        vec!["F100", "G1X1", "G1X2", "F200", "G1X3"]
    );
}

#[test]
fn test_unit_change_after_motion() {
    let statements = parse("G21\nG1 X10\nG20\nG1 X1").unwrap();
    assert_eq!(detect_units(&statements), Err(AnalysisError::AmbiguousUnits));
    assert_eq!(
        detect_workarea(&statements),
        Err(AnalysisError::AmbiguousUnits)
    );
}

#[test]
fn test_relative_motion_has_no_workarea() {
    let statements = parse("G91\nG1 X10").unwrap();
    assert_eq!(
        detect_workarea(&statements),
        Err(AnalysisError::RelativeMotionUnsupported)
    );
}

#[test]
fn test_linear_move_saver_needs_isolated_feedrates() {
    let statements = parse("G1 X1\nG1 X2 F100").unwrap();
    assert_eq!(
        moves::save_linear_moves(statements),
        Err(SequencingError::FeedrateNotIsolated { index: 1 })
    );

    assert_eq!(
        Pipeline::new(vec![Pass::LinearMoveSaver]),
        Err(SequencingError::PassOrder {
            pass: Pass::LinearMoveSaver,
            requires: Pass::FeedratePatcher,
        })
    );
}

#[test]
fn test_custom_pipeline_leaves_other_codes() {
    let pipeline = Pipeline::new(vec![Pass::CommentRemover, Pass::EmptyStatementRemover])
        .expect("valid pipeline");
    let optimized = pipeline.run(parse("(a)\nG1 X1 (b)\nM104 S200").unwrap()).unwrap();
    assert_eq!(lines(&optimized), vec!["G1X1", "M104S200"]);
}

#[test]
fn test_long_lines_fit_the_wire_limit() {
    let statement = parse("G1 X1.23456 Y2.34567 Z3.45678").unwrap().remove(0);
    let format = WireFormat {
        max_line_length: 16,
        ..WireFormat::default()
    };
    let line = statement.render(&format);
    assert!(line.len() < 16, "{} is too long", line);
    assert!(line.starts_with("G1"));
}
