use gcode_streamer::parser::{parse, WireFormat};
use gcode_streamer::{Pipeline, Report};

fn main() {
    println!("=== Optimizer Pipeline Demo ===");

    let program = "%\n\
        (square pocket)\n\
        G21 G90\n\
        G0 X0 Y0 Z5\n\
        G1 Z-1 F200\n\
        G1 X10 F600\n\
        G1 X20 F600\n\
        G1 X30 Y0\n\
        G1 Y30\n\
        M3 S1000 M8\n\
        G1 X0\n\
        G1 X0\n\
        G64\n\
        M30\n\
        %\n";

    let statements = parse(program).expect("demo program parses");
    println!("\nParsed {} statements", statements.len());

    let optimized = Pipeline::canonical()
        .run(statements)
        .expect("canonical pipeline runs");

    println!("\nOptimized program:");
    let format = WireFormat::default();
    for statement in &optimized {
        println!("  {}", statement.render(&format));
    }

    println!("\nReport:\n{}", Report::analyze(&optimized));
}
