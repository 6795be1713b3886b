//! Built-in scenario presets for the demo binary, one per end-to-end
//! scenario this engine is validated against.

use crate::{BeamConfig, GeometryConfig, LightCollectorConfig, MediaProperty};

/// Available built-in scenarios.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum ScenePreset {
    /// A homogeneous absorbing-scattering slab under a pencil beam.
    HomogeneousSlab,
    /// Two layers with a refractive-index step, testing Fresnel transmission.
    TwoLayerFresnel,
    /// An isotropic point source embedded in a weakly absorbing scatterer.
    IsotropicPoint,
    /// An isotropic point source imaged by a fiber-tip light collector.
    FiberCollector,
    /// A single non-zero voxel driving a volumetric source.
    VolumetricSource,
}

/// A complete scenario: geometry, beam, and optional light collector, ready
/// to hand to [`crate::SimulationInput::new`].
pub struct ScenarioDescription {
    pub name: &'static str,
    pub geometry: GeometryConfig,
    pub beam: BeamConfig,
    pub light_collector: Option<LightCollectorConfig>,
}

impl ScenePreset {
    pub fn build(self) -> ScenarioDescription {
        match self {
            ScenePreset::HomogeneousSlab => build_homogeneous_slab(),
            ScenePreset::TwoLayerFresnel => build_two_layer_fresnel(),
            ScenePreset::IsotropicPoint => build_isotropic_point(),
            ScenePreset::FiberCollector => build_fiber_collector(),
            ScenePreset::VolumetricSource => build_volumetric_source(),
        }
    }
}

fn pencil_beam_along_z(z_focus: f64) -> BeamConfig {
    BeamConfig {
        beam_type: 0,
        x_focus: 0.0,
        y_focus: 0.0,
        z_focus,
        theta_beam: 0.0,
        phi_beam: 0.0,
        waist: 0.0,
        divergence: 0.0,
        source_distribution: None,
    }
}

fn isotropic_point_beam(z_focus: f64) -> BeamConfig {
    BeamConfig {
        beam_type: 1,
        x_focus: 0.0,
        y_focus: 0.0,
        z_focus,
        theta_beam: 0.0,
        phi_beam: 0.0,
        waist: 0.0,
        divergence: 0.0,
        source_distribution: None,
    }
}

fn build_homogeneous_slab() -> ScenarioDescription {
    let n = 100;
    let dx = 0.01;
    ScenarioDescription {
        name: "Homogeneous slab",
        geometry: GeometryConfig {
            dx,
            dy: dx,
            dz: dx,
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
        },
        beam: pencil_beam_along_z(0.0),
        light_collector: None,
    }
}

fn build_two_layer_fresnel() -> ScenarioDescription {
    let n = 100;
    let dx = 0.01;
    let mut m = vec![0u8; n * n * n];
    for iz in (n / 2)..n {
        for iy in 0..n {
            for ix in 0..n {
                m[iz * n * n + iy * n + ix] = 1;
            }
        }
    }
    let mut ri = vec![1.0; n];
    for slice in ri.iter_mut().take(n).skip(n / 2) {
        *slice = 1.4;
    }
    ScenarioDescription {
        name: "Two-layer Fresnel interface",
        geometry: GeometryConfig {
            dx,
            dy: dx,
            dz: dx,
            nx: n,
            ny: n,
            nz: n,
            m,
            ri,
            boundary_type: 1,
            media_properties: vec![
                MediaProperty {
                    mua: 1.0,
                    mus: 100.0,
                    g: 0.9,
                },
                MediaProperty {
                    mua: 1.0,
                    mus: 100.0,
                    g: 0.9,
                },
            ],
            media_properties_f: None,
        },
        beam: pencil_beam_along_z(0.0),
        light_collector: None,
    }
}

fn build_isotropic_point() -> ScenarioDescription {
    let n = 60;
    let dx = 0.02;
    ScenarioDescription {
        name: "Isotropic point in scatterer",
        geometry: GeometryConfig {
            dx,
            dy: dx,
            dz: dx,
            nx: n,
            ny: n,
            nz: n,
            m: vec![0; n * n * n],
            ri: vec![1.0; n],
            boundary_type: 0,
            media_properties: vec![MediaProperty {
                mua: 0.1,
                mus: 10.0,
                g: 0.0,
            }],
            media_properties_f: None,
        },
        beam: isotropic_point_beam(dx * n as f64 / 2.0),
        light_collector: None,
    }
}

fn build_fiber_collector() -> ScenarioDescription {
    let n = 60;
    let dx = 0.02;
    ScenarioDescription {
        name: "Fiber collector",
        geometry: GeometryConfig {
            dx,
            dy: dx,
            dz: dx,
            nx: n,
            ny: n,
            nz: n,
            m: vec![0; n * n * n],
            ri: vec![1.0; n],
            boundary_type: 0,
            media_properties: vec![MediaProperty {
                mua: 0.1,
                mus: 10.0,
                g: 0.0,
            }],
            media_properties_f: None,
        },
        beam: isotropic_point_beam(0.1),
        light_collector: Some(LightCollectorConfig {
            x_fpc_lc: 0.0,
            y_fpc_lc: 0.0,
            z_fpc_lc: 0.0,
            theta_lc: std::f64::consts::PI,
            phi_lc: 0.0,
            f_lc: f64::INFINITY,
            diam_lc: 0.04,
            field_size_lc: None,
            na_lc: Some(0.22),
            res_x_lc: 1,
            res_y_lc: 1,
            n_time_bins_lc: 0,
            t_start_lc: 0.0,
            t_end_lc: 0.0,
        }),
    }
}

fn build_volumetric_source() -> ScenarioDescription {
    let n = 40;
    let dx = 0.02;
    let voxel_count = n * n * n;
    let mut density = vec![0.0; voxel_count];
    let center = n / 2;
    density[center * n * n + center * n + center] = 1.0;
    ScenarioDescription {
        name: "Volumetric source",
        geometry: GeometryConfig {
            dx,
            dy: dx,
            dz: dx,
            nx: n,
            ny: n,
            nz: n,
            m: vec![0; voxel_count],
            ri: vec![1.0; n],
            boundary_type: 1,
            media_properties: vec![MediaProperty {
                mua: 1.0,
                mus: 50.0,
                g: 0.8,
            }],
            media_properties_f: Some(vec![MediaProperty {
                mua: 1.0,
                mus: 50.0,
                g: 0.8,
            }]),
        },
        beam: BeamConfig {
            beam_type: 0,
            x_focus: 0.0,
            y_focus: 0.0,
            z_focus: 0.0,
            theta_beam: 0.0,
            phi_beam: 0.0,
            waist: 0.0,
            divergence: 0.0,
            source_distribution: Some(density),
        },
        light_collector: None,
    }
}
