//! Command-line driver for the photon transport engine.
//!
//! Runs one of the built-in scenario presets to completion and prints a
//! summary of the resulting fluence and (if the scenario defines one) light
//! collector image.

use clap::Parser;
use photon_mc::driver::{ConsoleProgress, SilentProgress};
use photon_mc::presets::ScenePreset;
use photon_mc::{SimulationInput, SimulationOutput};
use std::time::Instant;

/// photon-mc — Monte Carlo photon transport in turbid media
#[derive(Parser, Debug)]
#[command(
    name = "photon-mc",
    version,
    about = "Monte Carlo photon transport on a voxel grid",
    after_help = "EXAMPLES:\n  \
                  photon-mc --scene homogeneous-slab --minutes 0.5\n  \
                  photon-mc --scene fiber-collector --minutes 1 --all-cpus"
)]
struct Cli {
    /// Scenario preset to run
    #[arg(short, long, value_enum, default_value_t = ScenePreset::HomogeneousSlab)]
    scene: ScenePreset,

    /// Wall-clock simulation budget, minutes
    #[arg(short, long, default_value_t = 0.1)]
    minutes: f64,

    /// Use every available core instead of leaving one free
    #[arg(long)]
    all_cpus: bool,

    /// Suppress the live progress line
    #[arg(long)]
    quiet: bool,
}

fn print_header(scene_name: &str, minutes: f64) {
    eprintln!();
    eprintln!("  photon-mc — Monte Carlo photon transport");
    eprintln!("  Scenario: {scene_name}");
    eprintln!("  Budget:   {minutes} min");
    eprintln!();
}

fn summarize(output: &SimulationOutput) {
    let peak_f = output.f.iter().cloned().fold(0.0_f64, f64::max);
    let total_f: f64 = output.f.iter().sum();
    eprintln!(
        "  Photons launched: {} across {} worker thread(s)",
        output.n_photons, output.n_threads
    );
    eprintln!("  Peak fluence:      {peak_f:.6}");
    eprintln!("  Summed fluence:    {total_f:.6}");
    if let Some(image) = &output.image {
        let total_hits: f64 = image.iter().sum();
        let peak_hit = image.iter().cloned().fold(0.0_f64, f64::max);
        eprintln!("  Collector total:   {total_hits:.6}");
        eprintln!("  Collector peak:    {peak_hit:.6}");
    }
    eprintln!();
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let scenario = cli.scene.build();
    print_header(scenario.name, cli.minutes);

    let mut input = SimulationInput::new(
        cli.minutes,
        scenario.geometry,
        scenario.beam,
        scenario.light_collector,
    );
    input.use_all_cpus = cli.all_cpus;
    if !cli.quiet {
        input = input.with_progress(Box::new(ConsoleProgress));
    } else {
        input = input.with_progress(Box::new(SilentProgress));
    }

    let t0 = Instant::now();
    match photon_mc::simulate(input) {
        Ok(output) => {
            let elapsed = t0.elapsed();
            eprintln!("  Finished in {:.2}s", elapsed.as_secs_f64());
            summarize(&output);
        }
        Err(err) => {
            eprintln!("  configuration rejected: {err}");
            std::process::exit(1);
        }
    }
}
