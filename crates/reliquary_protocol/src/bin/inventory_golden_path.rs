//! # Inventory Golden Path
//!
//! Runs add, pickup, transfer, drop and lock contention end to end, in both
//! collapsed and networked mode.
//!
//! Target: < 50ms per scenario

use reliquary_protocol::golden_path::GoldenPathTest;

fn main() {
    println!("╔══════════════════════════════════════════════════════════════════╗");
    println!("║         RELIQUARY - INVENTORY GOLDEN PATH                        ║");
    println!("╠══════════════════════════════════════════════════════════════════╣");
    println!("║  Target: every scenario must complete in < 50ms                  ║");
    println!("║                                                                  ║");
    println!("║  Flow: Predictor → Authority → Store → Predictor → Event         ║");
    println!("╚══════════════════════════════════════════════════════════════════╝");

    let mut test = GoldenPathTest::new();
    test.run_all();
    test.print_results();

    if test.all_passed() {
        std::process::exit(0);
    } else {
        std::process::exit(1);
    }
}
