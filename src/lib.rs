//! Monte Carlo photon transport in heterogeneous turbid media on a voxel
//! grid, for biomedical-optics modeling where analytic solutions are
//! intractable.
//!
//! The engine is invoked as a single library call: [`simulate`] consumes a
//! [`SimulationInput`] and produces a [`SimulationOutput`]. Internals are
//! split the way the algorithm itself is: geometry and optical properties
//! ([`geometry`]), the light source ([`beam`]), the per-step kernel
//! ([`photon`]), the light collector ([`collector`]), the parallel worker
//! pool ([`driver`]), and the final unit conversion ([`normalize`]).

pub mod beam;
pub mod collector;
pub mod constants;
pub mod driver;
pub mod error;
pub mod geometry;
pub mod lambert;
pub mod math;
pub mod normalize;
pub mod photon;
pub mod presets;
pub mod rng;
pub mod tally;

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

pub use beam::{Beam, BeamGeometry};
pub use collector::{LightCollector, Selectivity};
pub use driver::{ConsoleProgress, ProgressReporter, SilentProgress};
pub use error::ConfigError;
pub use geometry::{BoundaryPolicy, Geometry, MediaProperty};
pub use math::Vec3;
pub use tally::Tallies;

/// Host-facing description of the voxel grid (spec.md §6's `G`).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct GeometryConfig {
    pub dx: f64,
    pub dy: f64,
    pub dz: f64,
    pub nx: usize,
    pub ny: usize,
    pub nz: usize,
    /// Material label per voxel, linear index x-fastest.
    pub m: Vec<u8>,
    /// Refractive index per z-slice, length `nz`.
    pub ri: Vec<f64>,
    pub boundary_type: u8,
    pub media_properties: Vec<MediaProperty>,
    /// Used instead of `media_properties` when the beam carries a
    /// `source_distribution`.
    pub media_properties_f: Option<Vec<MediaProperty>>,
}

/// Host-facing description of the light source (spec.md §6's `Beam`).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct BeamConfig {
    pub beam_type: u8,
    pub x_focus: f64,
    pub y_focus: f64,
    pub z_focus: f64,
    pub theta_beam: f64,
    pub phi_beam: f64,
    pub waist: f64,
    pub divergence: f64,
    /// Non-negative per-voxel emission density; presence selects the
    /// volumetric source and `media_properties_f`.
    pub source_distribution: Option<Vec<f64>>,
}

/// Host-facing description of a light collector (spec.md §6's
/// `LightCollector`).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct LightCollectorConfig {
    pub x_fpc_lc: f64,
    pub y_fpc_lc: f64,
    pub z_fpc_lc: f64,
    pub theta_lc: f64,
    pub phi_lc: f64,
    /// Focal length, cm. `f64::INFINITY` selects a fiber tip.
    pub f_lc: f64,
    pub diam_lc: f64,
    pub field_size_lc: Option<f64>,
    pub na_lc: Option<f64>,
    pub res_x_lc: usize,
    pub res_y_lc: usize,
    /// `0` means a single time bin; otherwise `resT = n_time_bins_lc + 2`.
    pub n_time_bins_lc: usize,
    pub t_start_lc: f64,
    pub t_end_lc: f64,
}

/// The single entry point's input record.
pub struct SimulationInput {
    pub silent_mode: bool,
    pub use_all_cpus: bool,
    /// Wall-clock budget, minutes.
    pub simulation_time: f64,
    pub geometry: GeometryConfig,
    pub beam: BeamConfig,
    pub light_collector: Option<LightCollectorConfig>,
    pub progress: Option<Box<dyn ProgressReporter>>,
    pub cancel: Option<Arc<AtomicBool>>,
}

impl SimulationInput {
    pub fn new(
        simulation_time: f64,
        geometry: GeometryConfig,
        beam: BeamConfig,
        light_collector: Option<LightCollectorConfig>,
    ) -> Self {
        Self {
            silent_mode: true,
            use_all_cpus: false,
            simulation_time,
            geometry,
            beam,
            light_collector,
            progress: None,
            cancel: None,
        }
    }

    pub fn with_progress(mut self, progress: Box<dyn ProgressReporter>) -> Self {
        self.silent_mode = false;
        self.progress = Some(progress);
        self
    }

    pub fn with_cancel(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }
}

/// The single entry point's output record.
#[derive(Debug, Clone)]
pub struct SimulationOutput {
    /// Fluence per voxel, matching `GeometryConfig::m`'s dimensions.
    pub f: Vec<f64>,
    /// `(resX, resY, resT)` image, present only if a light collector ran.
    pub image: Option<Vec<f64>>,
    pub n_photons: u64,
    pub n_threads: usize,
}

fn build_geometry(cfg: &GeometryConfig, use_f: bool) -> Result<Geometry, ConfigError> {
    let boundary = BoundaryPolicy::from_code(cfg.boundary_type)?;
    let media = match (use_f, &cfg.media_properties_f) {
        (true, Some(media_f)) => media_f.clone(),
        _ => cfg.media_properties.clone(),
    };
    let geometry = Geometry {
        d: [cfg.dx, cfg.dy, cfg.dz],
        n: [cfg.nx, cfg.ny, cfg.nz],
        boundary,
        m: cfg.m.clone(),
        media,
        ri: cfg.ri.clone(),
    };
    geometry.validate()?;
    Ok(geometry)
}

fn build_beam(cfg: &BeamConfig, geometry: &Geometry) -> Result<Beam, ConfigError> {
    if let Some(density) = &cfg.source_distribution {
        let (cdf, power) = beam::build_source_cdf(density, geometry.voxel_volume())?;
        let beam = Beam::Volumetric { cdf, power };
        beam.validate()?;
        return Ok(beam);
    }

    let focus = Vec3::new(cfg.x_focus, cfg.y_focus, cfg.z_focus);
    let bg = BeamGeometry::from_angles(focus, cfg.theta_beam, cfg.phi_beam, cfg.waist, cfg.divergence);
    let beam = match cfg.beam_type {
        0 => Beam::Pencil(bg),
        1 => Beam::IsotropicPoint(bg),
        2 => Beam::PlaneWave(bg),
        3 => Beam::GaussianFocusGaussianFar(bg),
        4 => Beam::GaussianFocusTophatFar(bg),
        5 => Beam::TophatFocusGaussianFar(bg),
        6 => Beam::TophatFocusTophatFar(bg),
        7 => Beam::Lg01(bg),
        other => return Err(ConfigError::InvalidBeamType(other)),
    };
    beam.validate()?;
    Ok(beam)
}

fn build_collector(cfg: &LightCollectorConfig) -> Result<LightCollector, ConfigError> {
    let is_fiber = cfg.f_lc.is_infinite();
    let selectivity = if is_fiber {
        Selectivity::Na(cfg.na_lc.unwrap_or(0.0))
    } else {
        Selectivity::FieldSize(cfg.field_size_lc.unwrap_or(0.0))
    };
    let res_t = if cfg.n_time_bins_lc == 0 {
        1
    } else {
        cfg.n_time_bins_lc + 2
    };
    let lc = LightCollector {
        r: Vec3::new(cfg.x_fpc_lc, cfg.y_fpc_lc, cfg.z_fpc_lc),
        theta: cfg.theta_lc,
        phi: cfg.phi_lc,
        f: cfg.f_lc,
        diam: cfg.diam_lc,
        selectivity,
        res_x: if is_fiber { 1 } else { cfg.res_x_lc },
        res_y: if is_fiber { 1 } else { cfg.res_y_lc },
        res_t,
        t_start: cfg.t_start_lc,
        t_end: cfg.t_end_lc,
    };
    lc.validate()?;
    Ok(lc)
}

/// Runs a Monte Carlo photon transport simulation to completion, per
/// spec.md §6. Validates the entire configuration before spawning any
/// worker; a cancelled run still normalizes and returns `Ok`.
pub fn simulate(input: SimulationInput) -> Result<SimulationOutput, ConfigError> {
    if input.simulation_time <= 0.0 {
        return Err(ConfigError::NonPositiveSimulationTime(input.simulation_time));
    }

    let use_f = input.beam.source_distribution.is_some();
    let geometry = build_geometry(&input.geometry, use_f)?;
    let beam = build_beam(&input.beam, &geometry)?;
    let collector = input
        .light_collector
        .as_ref()
        .map(build_collector)
        .transpose()?;

    log::info!(
        "configuration accepted: {}x{}x{} voxels, {} materials",
        geometry.n[0],
        geometry.n[1],
        geometry.n[2],
        geometry.media.len(),
    );

    let progress: Option<&dyn ProgressReporter> = if input.silent_mode {
        None
    } else {
        input.progress.as_deref()
    };
    let cancel = input.cancel.as_deref();

    let (mut tallies, n_photons, n_threads) = driver::run(
        &geometry,
        &beam,
        collector.as_ref(),
        input.simulation_time,
        input.use_all_cpus,
        progress,
        cancel,
    );

    normalize::normalize(&mut tallies, &geometry, &beam, collector.as_ref(), n_photons);

    Ok(SimulationOutput {
        f: tallies.f,
        image: collector.map(|_| tallies.image),
        n_photons,
        n_threads,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn homogeneous_slab(n: usize) -> GeometryConfig {
        GeometryConfig {
            dx: 0.01,
            dy: 0.01,
            dz: 0.01,
            nx: n,
            ny: n,
            nz: n,
            m: vec![0; n * n * n],
            ri: vec![1.0; n],
            boundary_type: 1,
            media_properties: vec![MediaProperty {
                mua: 1.0,
                mus: 100.0,
                g: 0.9,
            }],
            media_properties_f: None,
        }
    }

    fn pencil_beam() -> BeamConfig {
        BeamConfig {
            beam_type: 0,
            x_focus: 0.0,
            y_focus: 0.0,
            z_focus: 0.05,
            theta_beam: 0.0,
            phi_beam: 0.0,
            waist: 0.0,
            divergence: 0.0,
            source_distribution: None,
        }
    }

    #[test]
    fn rejects_non_positive_simulation_time() {
        let input = SimulationInput::new(0.0, homogeneous_slab(10), pencil_beam(), None);
        assert!(matches!(
            simulate(input),
            Err(ConfigError::NonPositiveSimulationTime(_))
        ));
    }

    #[test]
    fn rejects_out_of_range_beam_type() {
        let mut beam = pencil_beam();
        beam.beam_type = 9;
        let input = SimulationInput::new(0.001, homogeneous_slab(10), beam, None);
        assert!(matches!(
            simulate(input),
            Err(ConfigError::InvalidBeamType(9))
        ));
    }

    #[test]
    fn short_run_conserves_nonnegative_finite_fluence() {
        let input = SimulationInput::new(0.002, homogeneous_slab(16), pencil_beam(), None);
        let output = simulate(input).expect("valid configuration");
        assert!(output.n_photons > 0);
        assert!(output.f.iter().all(|&v| v.is_finite() && v >= 0.0));
    }
}
