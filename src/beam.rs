//! Beam sources: the tagged variant over launch kinds from spec.md §3, and
//! the per-variant launch sampling of §4.2.

use crate::error::ConfigError;
use crate::geometry::Geometry;
use crate::lambert::lambert_wm1;
use crate::math::Vec3;
use crate::rng::PhotonRng;
use std::f64::consts::{E, PI};

/// Parameters shared by every oriented (non-volumetric) beam variant.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct BeamGeometry {
    pub focus: Vec3,
    /// Beam propagation axis, must be a unit vector.
    pub u: Vec3,
    /// Orthonormal companion to `u`, used as the reference for azimuthal
    /// sampling around the beam axis.
    pub v: Vec3,
    pub waist: f64,
    pub divergence: f64,
}

impl BeamGeometry {
    /// Builds the `(u, v)` pair from spherical angles the way the host
    /// configuration provides them, choosing an arbitrary `v ⟂ u`.
    pub fn from_angles(focus: Vec3, theta: f64, phi: f64, waist: f64, divergence: f64) -> Self {
        let u = Vec3::new(theta.sin() * phi.cos(), theta.sin() * phi.sin(), theta.cos());
        let v = u.any_orthonormal();
        Self {
            focus,
            u,
            v,
            waist,
            divergence,
        }
    }
}

/// A light source, tagged by how it samples an initial photon position and
/// direction.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum Beam {
    Pencil(BeamGeometry),
    IsotropicPoint(BeamGeometry),
    PlaneWave(BeamGeometry),
    GaussianFocusGaussianFar(BeamGeometry),
    GaussianFocusTophatFar(BeamGeometry),
    TophatFocusGaussianFar(BeamGeometry),
    TophatFocusTophatFar(BeamGeometry),
    Lg01(BeamGeometry),
    /// An isotropically re-emitting volumetric source (e.g. a precomputed
    /// fluorescence distribution). `cdf` is `S` from spec.md §3: length
    /// `voxel_count + 1`, non-decreasing, `cdf[0] == 0`, `cdf[last] == 1`.
    Volumetric { cdf: Vec<f64>, power: f64 },
}

/// Normalizes an unnormalized per-voxel emission density into the
/// cumulative distribution `S` the volumetric source samples from, and
/// returns the total emitted power implied by that density.
pub fn build_source_cdf(density: &[f64], voxel_volume: f64) -> Result<(Vec<f64>, f64), ConfigError> {
    if density.iter().all(|&v| v == 0.0) {
        return Err(ConfigError::EmptySourceDistribution);
    }
    let mut cdf = Vec::with_capacity(density.len() + 1);
    cdf.push(0.0);
    let mut running = 0.0;
    for &v in density {
        running += v;
        cdf.push(running);
    }
    let total = running;
    let power = total * voxel_volume;
    for v in cdf.iter_mut() {
        *v /= total;
    }
    Ok((cdf, power))
}

#[inline]
fn sample_isotropic_direction(rng: &mut PhotonRng) -> Vec3 {
    let cos_theta = 1.0 - 2.0 * rng.next_open_closed();
    let sin_theta = (1.0 - cos_theta * cos_theta).max(0.0).sqrt();
    let phi = 2.0 * PI * rng.next_open_closed();
    Vec3::new(sin_theta * phi.cos(), sin_theta * phi.sin(), cos_theta)
}

#[inline]
fn radial_gaussian(rng: &mut PhotonRng, scale: f64) -> f64 {
    scale * (-0.5 * rng.next_open_closed().ln()).sqrt()
}

#[inline]
fn radial_tophat(rng: &mut PhotonRng, scale: f64) -> f64 {
    scale * rng.next_open_closed().sqrt()
}

#[inline]
fn radial_lg01(rng: &mut PhotonRng, scale: f64) -> f64 {
    let u = rng.next_open_closed();
    scale * (((lambert_wm1(-u / E) + 1.0) / -2.0).sqrt()) / 1.500_87
}

enum Profile {
    Gaussian,
    Tophat,
    Lg01,
}

fn sample_radius(profile: &Profile, rng: &mut PhotonRng, scale: f64) -> f64 {
    match profile {
        Profile::Gaussian => radial_gaussian(rng, scale),
        Profile::Tophat => radial_tophat(rng, scale),
        Profile::Lg01 => radial_lg01(rng, scale),
    }
}

/// Samples a target point in the focal plane: a radius about the beam axis
/// at azimuth `w0`, offset from the focus. Returns both the target point and
/// the azimuthal axis `w0` it was sampled along, since LG01 reuses the
/// latter for its divergence direction instead of drawing a fresh azimuth.
fn sample_target(bg: &BeamGeometry, focus_profile: &Profile, rng: &mut PhotonRng) -> (Vec3, Vec3) {
    let phi_target = rng.next_open_closed() * 2.0 * PI;
    let w0 = bg.v.axis_rotate(bg.u, phi_target);
    let r = sample_radius(focus_profile, rng, bg.waist);
    (bg.focus + w0 * r, w0)
}

/// Projects a target point and its ray direction (coming from the focal
/// plane) back to the `z=0` launch plane.
fn project_to_launch_plane(target: Vec3, dir: Vec3, geometry: &Geometry) -> Vec3 {
    let ix = (target.x - target.z * dir.x / dir.z) / geometry.d[0] + geometry.n[0] as f64 / 2.0;
    let iy = (target.y - target.z * dir.y / dir.z) / geometry.d[1] + geometry.n[1] as f64 / 2.0;
    Vec3::new(ix, iy, 0.0)
}

/// Shared launch routine for the Gaussian/top-hat focus/far-field
/// combinations: sample a target point in the focal plane, sample a fresh
/// azimuth and propagation half-angle away from the beam axis, then project
/// the resulting ray back to the z=0 launch plane.
fn sample_focus_divergence(
    bg: &BeamGeometry,
    focus_profile: &Profile,
    far_profile: &Profile,
    geometry: &Geometry,
    rng: &mut PhotonRng,
) -> (Vec3, Vec3) {
    let (target, _w0) = sample_target(bg, focus_profile, rng);

    let phi_dir = rng.next_open_closed() * 2.0 * PI;
    let w0_dir = bg.v.axis_rotate(bg.u, phi_dir);
    let half_angle = sample_radius(far_profile, rng, bg.divergence);
    let dir = bg.u.axis_rotate(w0_dir, half_angle);

    let i = project_to_launch_plane(target, dir, geometry);
    (i, dir)
}

/// LG01 launch routine: unlike the Gaussian/top-hat family, the divergence
/// rotation reuses the same azimuthal axis `w0` the target radius was drawn
/// along, coupling launch position and direction instead of sampling a
/// fresh azimuth for each.
fn sample_lg01(bg: &BeamGeometry, geometry: &Geometry, rng: &mut PhotonRng) -> (Vec3, Vec3) {
    let (target, w0) = sample_target(bg, &Profile::Lg01, rng);
    let half_angle = sample_radius(&Profile::Lg01, rng, bg.divergence);
    let dir = bg.u.axis_rotate(w0, half_angle);
    let i = project_to_launch_plane(target, dir, geometry);
    (i, dir)
}

/// Result of launching a photon: its initial fractional-index position,
/// unit direction, and start time.
pub struct Launch {
    pub i: Vec3,
    pub u: Vec3,
    pub time: f64,
}

impl Beam {
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            Beam::Volumetric { cdf, .. } => {
                if cdf.iter().all(|&v| v == 0.0) {
                    return Err(ConfigError::EmptySourceDistribution);
                }
                Ok(())
            }
            Beam::Pencil(bg)
            | Beam::IsotropicPoint(bg)
            | Beam::PlaneWave(bg)
            | Beam::GaussianFocusGaussianFar(bg)
            | Beam::GaussianFocusTophatFar(bg)
            | Beam::TophatFocusGaussianFar(bg)
            | Beam::TophatFocusTophatFar(bg)
            | Beam::Lg01(bg) => {
                let len = bg.u.length();
                if (len - 1.0).abs() > 1e-6 {
                    return Err(ConfigError::NonUnitDirection { length: len });
                }
                Ok(())
            }
        }
    }

    pub fn power(&self) -> Option<f64> {
        match self {
            Beam::Volumetric { power, .. } => Some(*power),
            _ => None,
        }
    }

    pub fn is_plane_wave(&self) -> bool {
        matches!(self, Beam::PlaneWave(_))
    }

    /// Samples an initial photon state per spec.md §4.2.
    pub fn launch(&self, geometry: &Geometry, rng: &mut PhotonRng) -> Launch {
        match self {
            Beam::Volumetric { cdf, .. } => {
                let u = rng.next_open_closed();
                // Smallest k with cdf[k] >= u; the source voxel is k - 1.
                let k = cdf.partition_point(|&c| c < u);
                let j = k.saturating_sub(1);
                let nx = geometry.n[0];
                let ny = geometry.n[1];
                let vx = j % nx;
                let vy = (j / nx) % ny;
                let vz = j / nx / ny;
                let i = Vec3::new(
                    vx as f64 + 1.0 - rng.next_open_closed(),
                    vy as f64 + 1.0 - rng.next_open_closed(),
                    vz as f64 + 1.0 - rng.next_open_closed(),
                );
                Launch {
                    i,
                    u: sample_isotropic_direction(rng),
                    time: 0.0,
                }
            }
            Beam::Pencil(bg) => {
                let ix = (bg.focus.x - bg.focus.z * bg.u.x / bg.u.z) / geometry.d[0]
                    + geometry.n[0] as f64 / 2.0;
                let iy = (bg.focus.y - bg.focus.z * bg.u.y / bg.u.z) / geometry.d[1]
                    + geometry.n[1] as f64 / 2.0;
                let lateral_x = bg.focus.x - bg.focus.z * bg.u.x / bg.u.z;
                let lateral_y = bg.focus.y - bg.focus.z * bg.u.y / bg.u.z;
                let time = -geometry.ri[0]
                    * (lateral_x * lateral_x + lateral_y * lateral_y + bg.focus.z * bg.focus.z)
                        .sqrt();
                Launch {
                    i: Vec3::new(ix, iy, 0.0),
                    u: bg.u,
                    time,
                }
            }
            Beam::IsotropicPoint(bg) => {
                let i = Vec3::new(
                    bg.focus.x / geometry.d[0] + geometry.n[0] as f64 / 2.0,
                    bg.focus.y / geometry.d[1] + geometry.n[1] as f64 / 2.0,
                    bg.focus.z / geometry.d[2],
                );
                Launch {
                    i,
                    u: sample_isotropic_direction(rng),
                    time: 0.0,
                }
            }
            Beam::PlaneWave(bg) => {
                let extent_x = if geometry.boundary == crate::geometry::BoundaryPolicy::EscapeAll
                {
                    1.0
                } else {
                    crate::constants::KILLRANGE
                };
                let ix =
                    extent_x * geometry.n[0] as f64 * (rng.next_open_closed() - 0.5)
                        + geometry.n[0] as f64 / 2.0;
                let iy =
                    extent_x * geometry.n[1] as f64 * (rng.next_open_closed() - 0.5)
                        + geometry.n[1] as f64 / 2.0;
                let time = -geometry.ri[0]
                    * ((ix - geometry.n[0] as f64 / 2.0) * geometry.d[0] * bg.u.x
                        + (iy - geometry.n[1] as f64 / 2.0) * geometry.d[1] * bg.u.y);
                Launch {
                    i: Vec3::new(ix, iy, 0.0),
                    u: bg.u,
                    time,
                }
            }
            Beam::GaussianFocusGaussianFar(bg) => {
                let (i, u) =
                    sample_focus_divergence(bg, &Profile::Gaussian, &Profile::Gaussian, geometry, rng);
                Launch { i, u, time: 0.0 }
            }
            Beam::GaussianFocusTophatFar(bg) => {
                let (i, u) =
                    sample_focus_divergence(bg, &Profile::Gaussian, &Profile::Tophat, geometry, rng);
                Launch { i, u, time: 0.0 }
            }
            Beam::TophatFocusGaussianFar(bg) => {
                let (i, u) =
                    sample_focus_divergence(bg, &Profile::Tophat, &Profile::Gaussian, geometry, rng);
                Launch { i, u, time: 0.0 }
            }
            Beam::TophatFocusTophatFar(bg) => {
                let (i, u) =
                    sample_focus_divergence(bg, &Profile::Tophat, &Profile::Tophat, geometry, rng);
                Launch { i, u, time: 0.0 }
            }
            Beam::Lg01(bg) => {
                let (i, u) = sample_lg01(bg, geometry, rng);
                Launch { i, u, time: 0.0 }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{BoundaryPolicy, MediaProperty};

    fn uniform_geometry(n: usize) -> Geometry {
        Geometry {
            d: [0.01, 0.01, 0.01],
            n: [n, n, n],
            boundary: BoundaryPolicy::EscapeAll,
            m: vec![0; n * n * n],
            media: vec![MediaProperty {
                mua: 1.0,
                mus: 10.0,
                g: 0.0,
            }],
            ri: vec![1.0; n],
        }
    }

    #[test]
    fn pencil_beam_direction_passes_through() {
        let geometry = uniform_geometry(10);
        let bg = BeamGeometry::from_angles(Vec3::zero(), 0.0, 0.0, 0.0, 0.0);
        let beam = Beam::Pencil(bg);
        let mut rng = PhotonRng::for_worker(1, 0);
        let launch = beam.launch(&geometry, &mut rng);
        assert!((launch.u.z - 1.0).abs() < 1e-12);
        assert!((launch.i.x - 5.0).abs() < 1e-9);
        assert!((launch.i.y - 5.0).abs() < 1e-9);
    }

    #[test]
    fn isotropic_point_directions_are_unit_length() {
        let geometry = uniform_geometry(10);
        let bg = BeamGeometry::from_angles(Vec3::zero(), 0.0, 0.0, 0.0, 0.0);
        let beam = Beam::IsotropicPoint(bg);
        let mut rng = PhotonRng::for_worker(7, 0);
        for _ in 0..1000 {
            let launch = beam.launch(&geometry, &mut rng);
            assert!((launch.u.length() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn volumetric_source_samples_the_single_populated_voxel() {
        let geometry = uniform_geometry(4);
        let mut density = vec![0.0; 64];
        density[42] = 1.0;
        let (cdf, power) = build_source_cdf(&density, geometry.voxel_volume()).unwrap();
        assert!(power > 0.0);
        let beam = Beam::Volumetric { cdf, power };
        let mut rng = PhotonRng::for_worker(3, 0);
        // voxel 42 in a 4x4x4 grid: x=42%4=2, y=(42/4)%4=2, z=42/16=2
        for _ in 0..200 {
            let launch = beam.launch(&geometry, &mut rng);
            assert!(launch.i.x >= 2.0 && launch.i.x < 3.0);
            assert!(launch.i.y >= 2.0 && launch.i.y < 3.0);
            assert!(launch.i.z >= 2.0 && launch.i.z < 3.0);
        }
    }

    #[test]
    fn rejects_non_unit_direction() {
        let mut bg = BeamGeometry::from_angles(Vec3::zero(), 0.0, 0.0, 0.0, 0.0);
        bg.u = Vec3::new(2.0, 0.0, 0.0);
        let beam = Beam::Pencil(bg);
        assert!(matches!(
            beam.validate(),
            Err(ConfigError::NonUnitDirection { .. })
        ));
    }
}
