//! Food-delivery platform simulation.
//!
//! Runs the seven-section network from a configuration file, or the built-in
//! reference configuration when no path is given, and prints the report.
//!
//! ```text
//! cargo run --example food_delivery -- [config.yaml|config.json] [report.json]
//! ```

use std::env;
use std::error::Error;

use queuenet::{init_logging, SimConfig, SimulationEngine, Timer};

fn main() -> Result<(), Box<dyn Error>> {
    let mut args = env::args().skip(1);

    let config = match args.next() {
        Some(path) => SimConfig::from_file(&path)?,
        None => SimConfig::reference(),
    };
    let report_path = args.next();

    init_logging(&config.log_level);

    println!("╔══════════════════════════════════════════════════════════╗");
    println!("║           Food Delivery Platform Simulation              ║");
    println!("╠══════════════════════════════════════════════════════════╣");
    println!("║   Arrival rate:  {:>6} requests/tick                    ║", config.arrival_rate);
    println!("║   Warm-up:       {:>6} ticks                            ║", config.warmup_ticks);
    println!("║   Sections:      {:>6}                                  ║", config.sections.len());
    println!("║   Hand-off:      {:?}", config.handoff);
    println!("╚══════════════════════════════════════════════════════════╝");
    println!();

    let timer = Timer::start();
    let mut engine = SimulationEngine::new(config)?;
    let report = engine.run()?;
    let elapsed = timer.elapsed_ms();

    println!("{}", report.summary());
    println!(
        "Simulated {} ticks in {:.1} ms ({} hand-offs)",
        report.total_ticks,
        elapsed,
        engine.stats().handoffs
    );

    if let Some(path) = report_path {
        report.to_json_file(&path)?;
        println!("Report written to {}", path);
    }

    Ok(())
}
