//! The parallel driver: spawns worker threads, polls for cancellation and
//! elapsed time, aggregates counters and tallies. Grounded on the teacher's
//! own `ProgressBar`/status-line reporting idiom, generalized from a single
//! render thread to an `std::thread::scope` worker pool the way
//! `akofke-fountain`'s renderer combines raw threads with `std::sync::atomic`
//! counters for exactly this "counter + stop flag" shape.

use crate::beam::Beam;
use crate::collector::LightCollector;
use crate::geometry::Geometry;
use crate::photon::{self, Photon};
use crate::rng::PhotonRng;
use crate::tally::Tallies;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Reports progress and completion of a run. Implementors must be safe to
/// call from the worker designated to report (spec.md §9: "progress updates
/// are the prerogative of one designated worker").
pub trait ProgressReporter: Send + Sync {
    fn on_progress(&self, fraction: f64, photons_launched: u64);
    fn on_complete(&self, photons_launched: u64, elapsed: Duration);
}

/// Prints a single updating status line to stderr, in the style of the
/// teacher's own terminal progress bar.
pub struct ConsoleProgress;

impl ProgressReporter for ConsoleProgress {
    fn on_progress(&self, fraction: f64, photons_launched: u64) {
        use std::io::Write;
        eprint!(
            "\r{:>3}% complete ({photons_launched} photons launched)",
            (fraction * 100.0).clamp(0.0, 100.0) as u32,
        );
        let _ = std::io::stderr().flush();
    }

    fn on_complete(&self, photons_launched: u64, elapsed: Duration) {
        eprintln!(
            "\rdone: {photons_launched} photons in {:.1}s",
            elapsed.as_secs_f64()
        );
    }
}

/// Reports nothing, for library embedding or `silentMode`.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn on_progress(&self, _fraction: f64, _photons_launched: u64) {}
    fn on_complete(&self, _photons_launched: u64, _elapsed: Duration) {}
}

fn worker_count(use_all_cpus: bool) -> usize {
    let cores = thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
    if use_all_cpus {
        cores
    } else {
        cores.saturating_sub(1).max(1)
    }
}

/// Runs the simulation to completion (time budget or cancellation),
/// returning the merged tallies, total launches, and worker count used.
#[allow(clippy::too_many_arguments)]
pub fn run(
    geometry: &Geometry,
    beam: &Beam,
    collector: Option<&LightCollector>,
    simulation_minutes: f64,
    use_all_cpus: bool,
    progress: Option<&dyn ProgressReporter>,
    cancel: Option<&AtomicBool>,
) -> (Tallies, u64, usize) {
    let n_threads = worker_count(use_all_cpus);
    let budget = Duration::from_secs_f64((simulation_minutes * 60.0).max(0.0));
    let start = Instant::now();
    let stop = AtomicBool::new(false);
    let launched = AtomicU64::new(0);
    let image_len = collector.map(|lc| lc.image_len()).unwrap_or(0);
    let start_seed = PhotonRng::start_seed();

    log::info!("starting {n_threads} worker(s), budget {simulation_minutes} min");

    let worker_tallies: Vec<Tallies> = thread::scope(|scope| {
        let handles: Vec<_> = (0..n_threads)
            .map(|worker_index| {
                let stop = &stop;
                let launched = &launched;
                scope.spawn(move || {
                    let mut rng = PhotonRng::for_worker(start_seed, worker_index as u64);
                    let mut tallies = Tallies::zeroed(geometry.voxel_count(), image_len);

                    loop {
                        if stop.load(Ordering::Relaxed) {
                            break;
                        }

                        let launch = beam.launch(geometry, &mut rng);
                        let mut p =
                            Photon::launch(launch.i, launch.u, launch.time, geometry, &mut rng);
                        photon::propagate(&mut p, geometry, collector, &mut tallies, &mut rng);
                        launched.fetch_add(1, Ordering::Relaxed);

                        let elapsed = start.elapsed();
                        let cancelled = cancel.map(|c| c.load(Ordering::Relaxed)).unwrap_or(false);
                        if elapsed >= budget || cancelled {
                            stop.store(true, Ordering::Relaxed);
                        }

                        if worker_index == 0 {
                            if let Some(p) = progress {
                                let fraction = if budget.is_zero() {
                                    1.0
                                } else {
                                    elapsed.as_secs_f64() / budget.as_secs_f64()
                                };
                                p.on_progress(fraction.min(1.0), launched.load(Ordering::Relaxed));
                            }
                        }
                    }

                    tallies
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("photon worker panicked"))
            .collect()
    });

    let mut tallies = Tallies::zeroed(geometry.voxel_count(), image_len);
    for wt in &worker_tallies {
        tallies.merge(wt);
    }

    let n_photons = launched.load(Ordering::Relaxed);
    let elapsed = start.elapsed();
    if let Some(p) = progress {
        p.on_complete(n_photons, elapsed);
    }
    log::info!(
        "finished: {n_photons} photons across {n_threads} threads in {:.2}s",
        elapsed.as_secs_f64()
    );

    (tallies, n_photons, n_threads)
}
