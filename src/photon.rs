//! The photon stepper: the per-step kernel of spec.md §4.3, plus the
//! boundary/escape check (§4.4), voxel-property refresh (§4.5), Russian
//! roulette (§4.7) and Henyey–Greenstein scattering (§4.8) that drive a
//! single photon from launch to termination.

use crate::collector::LightCollector;
use crate::constants::{self, C};
use crate::geometry::{BoundaryPolicy, Geometry};
use crate::math::Vec3;
use crate::rng::PhotonRng;
use crate::tally::Tallies;
use std::f64::consts::PI;

/// The optical properties of the voxel a photon currently occupies.
#[derive(Debug, Clone, Copy)]
pub struct OpticalProperties {
    pub mua: f64,
    pub mus: f64,
    pub g: f64,
    pub ri: f64,
}

/// Mutable per-photon state, owned by exactly one worker for its lifetime.
#[derive(Debug, Clone)]
pub struct Photon {
    pub i: Vec3,
    pub u: Vec3,
    /// Per-axis distance to the next voxel plane, cm.
    pub d: Vec3,
    /// Dimensionless remaining optical depth until the next interaction.
    pub step_left: f64,
    pub weight: f64,
    pub time: f64,
    pub alive: bool,
    pub inside_volume: bool,
    pub same_voxel: bool,
    /// Linear index of the voxel whose properties are currently cached,
    /// clamped into range even when the photon itself has wandered outside.
    pub voxel_index: usize,
    pub props: OpticalProperties,
}

/// Per-axis distance to the next voxel plane, given the current fractional
/// index and direction.
fn compute_d(i: Vec3, u: Vec3, d_vox: [f64; 3]) -> Vec3 {
    let mut out = Vec3::zero();
    for k in 0..3 {
        out[k] = if u[k] != 0.0 {
            let next_plane = i[k].floor() + if u[k] > 0.0 { 1.0 } else { 0.0 };
            (next_plane - i[k]) * d_vox[k] / u[k]
        } else {
            f64::INFINITY
        };
    }
    out
}

fn clamp_voxel_index(value: f64, n: usize) -> usize {
    (value.floor() as isize).clamp(0, n as isize - 1) as usize
}

impl Photon {
    pub fn launch(i: Vec3, u: Vec3, time: f64, geometry: &Geometry, rng: &mut PhotonRng) -> Self {
        let mut photon = Photon {
            i,
            u,
            d: compute_d(i, u, geometry.d),
            step_left: -rng.next_open_closed().ln(),
            weight: 1.0,
            time,
            alive: true,
            inside_volume: true,
            same_voxel: false,
            voxel_index: 0,
            props: OpticalProperties {
                mua: 0.0,
                mus: 0.0,
                g: 0.0,
                ri: 1.0,
            },
        };
        refresh_properties(&mut photon, geometry);
        photon
    }
}

/// Clamps the active voxel index into range and refreshes the cached optical
/// properties (spec.md §4.5). Called whenever `same_voxel` goes false.
fn refresh_properties(photon: &mut Photon, geometry: &Geometry) {
    let ix = clamp_voxel_index(photon.i.x, geometry.n[0]);
    let iy = clamp_voxel_index(photon.i.y, geometry.n[1]);
    let iz = clamp_voxel_index(photon.i.z, geometry.n[2]);
    let voxel = geometry.linear_index(ix, iy, iz);
    let label = geometry.m[voxel] as usize;
    let mp = geometry.media[label];
    photon.props = OpticalProperties {
        mua: mp.mua,
        mus: mp.mus,
        g: mp.g,
        ri: geometry.ri[iz],
    };
    photon.voxel_index = voxel;
}

enum ZAction {
    Straight,
    Refract { cos_t: f64 },
    Reflect,
}

/// Snaps `i[k]` across the plane it just reached, landing strictly on the
/// new-voxel side (spec.md §9's ULP-epsilon push).
fn snap_forward(photon: &mut Photon, k: usize) {
    let boundary = photon.i[k].floor();
    photon.i[k] = if photon.u[k] > 0.0 {
        boundary + 1.0
    } else {
        boundary - constants::index_epsilon(boundary)
    };
}

/// Pushes `i[k]` back just inside the voxel it was already in, for a
/// z-reflection that must not actually cross the plane.
fn place_just_inside(photon: &mut Photon, i_old: f64, k: usize) {
    let boundary = i_old.floor();
    photon.i[k] = if photon.u[k] > 0.0 {
        boundary + 1.0 - constants::index_epsilon(boundary + 1.0)
    } else {
        boundary + constants::index_epsilon(boundary)
    };
}

/// Pulls a lateral index back onto the old side of its voxel boundary if
/// floating-point rounding carried it across during an interior move.
fn clamp_same_side(photon: &mut Photon, i_old: f64, k: usize) {
    let floor_old = i_old.floor();
    if photon.i[k] < floor_old {
        photon.i[k] = floor_old + constants::index_epsilon(floor_old);
    } else if photon.i[k] >= floor_old + 1.0 {
        photon.i[k] = floor_old + 1.0 - constants::index_epsilon(floor_old);
    }
}

fn fresnel_r(eta: f64, uz: f64, cos_t: f64) -> f64 {
    let a = (eta * uz - cos_t) / (eta * uz + cos_t);
    let b = (eta * cos_t - uz) / (eta * cos_t + uz);
    0.5 * a * a + 0.5 * b * b
}

/// One stepper iteration: travels up to the next interaction or voxel
/// boundary, decrementing `step_left` and depositing absorbed weight.
/// Implements spec.md §4.3.
fn step(photon: &mut Photon, geometry: &Geometry, tallies: &mut Tallies, rng: &mut PhotonRng) {
    photon.same_voxel = true;
    let mus = photon.props.mus;
    let s = (photon.step_left / mus)
        .min(photon.d.x)
        .min(photon.d.y)
        .min(photon.d.z);

    photon.step_left -= s * mus;
    photon.time += s * photon.props.ri / C;

    let i_old = photon.i;

    for k in 0..2 {
        if photon.u[k] != 0.0 && s == photon.d[k] {
            snap_forward(photon, k);
            photon.same_voxel = false;
            photon.d[k] = geometry.d[k] / photon.u[k].abs();
        } else {
            photon.i[k] += s * photon.u[k] / geometry.d[k];
            clamp_same_side(photon, i_old[k], k);
            photon.d[k] -= s;
        }
    }

    if photon.u.z != 0.0 && s == photon.d.z {
        let iz_old = clamp_voxel_index(i_old.z, geometry.n[2]);
        let iz_new_raw = if photon.u.z > 0.0 {
            iz_old as isize + 1
        } else {
            iz_old as isize - 1
        };
        let iz_new = geometry.clamp_z(iz_new_raw);
        let ri_cur = geometry.ri[iz_old];
        let ri_new = geometry.ri[iz_new];
        let eta = ri_cur / ri_new;

        let action = if eta == 1.0 {
            ZAction::Straight
        } else {
            let sin2t = (photon.u.x * photon.u.x + photon.u.y * photon.u.y) * eta * eta;
            if sin2t >= 1.0 {
                ZAction::Reflect
            } else {
                let cos_t = photon.u.z.signum() * (1.0 - sin2t).sqrt();
                let r = fresnel_r(eta, photon.u.z, cos_t);
                if rng.next_open_closed() > r {
                    if photon.u.z.abs() == 1.0 {
                        ZAction::Straight
                    } else {
                        ZAction::Refract { cos_t }
                    }
                } else {
                    ZAction::Reflect
                }
            }
        };

        match action {
            ZAction::Straight => {
                snap_forward(photon, 2);
                photon.same_voxel = false;
                photon.d.z = geometry.d[2] / photon.u.z.abs();
            }
            ZAction::Refract { cos_t } => {
                let old_uz2 = photon.u.z * photon.u.z;
                let scale = ((1.0 - cos_t * cos_t) / (1.0 - old_uz2)).sqrt();
                photon.u.x *= scale;
                photon.u.y *= scale;
                photon.u.z = cos_t;
                snap_forward(photon, 2);
                photon.same_voxel = false;
                // Lateral D must be recomputed before vertical D, since the
                // lateral u-components just changed.
                photon.d.x = if photon.u.x != 0.0 {
                    let next_plane = photon.i.x.floor() + if photon.u.x > 0.0 { 1.0 } else { 0.0 };
                    (next_plane - photon.i.x) * geometry.d[0] / photon.u.x
                } else {
                    f64::INFINITY
                };
                photon.d.y = if photon.u.y != 0.0 {
                    let next_plane = photon.i.y.floor() + if photon.u.y > 0.0 { 1.0 } else { 0.0 };
                    (next_plane - photon.i.y) * geometry.d[1] / photon.u.y
                } else {
                    f64::INFINITY
                };
                photon.d.z = geometry.d[2] / photon.u.z.abs();
            }
            ZAction::Reflect => {
                place_just_inside(photon, i_old.z, 2);
                photon.u.z = -photon.u.z;
                photon.d.z = geometry.d[2] / photon.u.z.abs();
            }
        }
    } else {
        photon.i.z += s * photon.u.z / geometry.d[2];
        clamp_same_side(photon, i_old.z, 2);
        photon.d.z -= s;
    }

    let absorb = photon.weight * (1.0 - (-photon.props.mua * s).exp());
    photon.weight -= absorb;
    if photon.inside_volume {
        tallies.f[photon.voxel_index] += absorb;
    }
}

/// Boundary policy check (spec.md §4.4). Returns `true` if the photon
/// remains alive; invokes the collector on a reported escape.
fn check_boundary(
    photon: &mut Photon,
    geometry: &Geometry,
    collector: Option<&LightCollector>,
    tallies: &mut Tallies,
) -> bool {
    let inside = (0..3).all(|k| photon.i[k] >= 0.0 && photon.i[k] < geometry.n[k] as f64);
    photon.inside_volume = inside;

    fn within_killrange(i_k: f64, n_k: usize) -> bool {
        (i_k / n_k as f64 - 0.5).abs() < constants::KILLRANGE / 2.0
    }

    let (alive, escaped) = match geometry.boundary {
        BoundaryPolicy::None => (
            (0..3).all(|k| within_killrange(photon.i[k], geometry.n[k])),
            false,
        ),
        BoundaryPolicy::EscapeAll => (inside, !inside),
        BoundaryPolicy::EscapeTop => {
            let lateral_ok = within_killrange(photon.i.x, geometry.n[0])
                && within_killrange(photon.i.y, geometry.n[1]);
            let top_ok =
                within_killrange(photon.i.z, geometry.n[2]) && photon.i.z >= 0.0;
            (lateral_ok && top_ok, photon.i.z < 0.0)
        }
    };

    if escaped {
        if let Some(lc) = collector {
            lc.collect(photon, geometry, tallies);
        }
    }
    photon.alive = alive;
    alive
}

fn roulette(photon: &mut Photon, rng: &mut PhotonRng) {
    if photon.weight < constants::THRESHOLD {
        if rng.next_open_closed() <= constants::CHANCE {
            photon.weight /= constants::CHANCE;
        } else {
            photon.alive = false;
        }
    }
}

/// Henyey–Greenstein scattering (spec.md §4.8).
fn scatter(photon: &mut Photon, geometry: &Geometry, rng: &mut PhotonRng) {
    let g = photon.props.g;
    let u1 = rng.next_open_closed();
    let cos_theta = if g != 0.0 {
        let denom = 1.0 - g + 2.0 * g * u1;
        (1.0 + g * g - ((1.0 - g * g) / denom).powi(2)) / (2.0 * g)
    } else {
        2.0 * u1 - 1.0
    };
    let sin_theta = (1.0 - cos_theta * cos_theta).max(0.0).sqrt();
    let phi = 2.0 * PI * rng.next_open_closed();
    let (sp, cp) = phi.sin_cos();

    let uz = photon.u.z;
    let new_u = if uz.abs() < 1.0 {
        let denom = (photon.u.x * photon.u.x + photon.u.y * photon.u.y).sqrt();
        Vec3::new(
            sin_theta * (photon.u.x * uz * cp - photon.u.y * sp) / denom + photon.u.x * cos_theta,
            sin_theta * (photon.u.y * uz * cp + photon.u.x * sp) / denom + photon.u.y * cos_theta,
            -sin_theta * cp * denom + uz * cos_theta,
        )
    } else {
        Vec3::new(sin_theta * cp, sin_theta * sp, uz.signum() * cos_theta)
    };

    photon.u = new_u;
    photon.d = compute_d(photon.i, photon.u, geometry.d);
    photon.step_left = -rng.next_open_closed().ln();
}

/// Drives a single photon from its current state to termination (escape,
/// kill-range loss, or roulette death), tallying absorption and collector
/// hits as it goes.
pub fn propagate(
    photon: &mut Photon,
    geometry: &Geometry,
    collector: Option<&LightCollector>,
    tallies: &mut Tallies,
    rng: &mut PhotonRng,
) {
    while photon.alive {
        step(photon, geometry, tallies, rng);

        if !photon.same_voxel {
            if !check_boundary(photon, geometry, collector, tallies) {
                break;
            }
            refresh_properties(photon, geometry);
        }

        if photon.step_left <= 0.0 {
            roulette(photon, rng);
            if !photon.alive {
                break;
            }
            scatter(photon, geometry, rng);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::MediaProperty;

    fn slab(nz: usize, mua: f64, mus: f64, g: f64) -> Geometry {
        let n = [20, 20, nz];
        Geometry {
            d: [0.01, 0.01, 0.01],
            n,
            boundary: BoundaryPolicy::EscapeAll,
            m: vec![0; n[0] * n[1] * n[2]],
            media: vec![MediaProperty { mua, mus, g }],
            ri: vec![1.0; nz],
        }
    }

    #[test]
    fn direction_stays_unit_length_through_many_steps() {
        let geometry = slab(50, 1.0, 100.0, 0.9);
        let mut rng = PhotonRng::for_worker(99, 0);
        let mut photon = Photon::launch(
            Vec3::new(10.0, 10.0, 0.0),
            Vec3::unit_z(),
            0.0,
            &geometry,
            &mut rng,
        );
        let mut tallies = Tallies::zeroed(geometry.voxel_count(), 0);
        for _ in 0..200 {
            if !photon.alive {
                break;
            }
            step(&mut photon, &geometry, &mut tallies, &mut rng);
            if photon.step_left <= 0.0 {
                scatter(&mut photon, &geometry, &mut rng);
            }
            assert!((photon.u.length() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn weight_only_decreases_from_absorption() {
        let geometry = slab(50, 1.0, 100.0, 0.9);
        let mut rng = PhotonRng::for_worker(7, 0);
        let mut photon = Photon::launch(
            Vec3::new(10.0, 10.0, 0.0),
            Vec3::unit_z(),
            0.0,
            &geometry,
            &mut rng,
        );
        let mut tallies = Tallies::zeroed(geometry.voxel_count(), 0);
        let mut last = photon.weight;
        for _ in 0..500 {
            if !photon.alive {
                break;
            }
            step(&mut photon, &geometry, &mut tallies, &mut rng);
            assert!(photon.weight <= last + 1e-12);
            last = photon.weight;
            if !photon.same_voxel {
                if !check_boundary(&mut photon, &geometry, None, &mut tallies) {
                    break;
                }
                refresh_properties(&mut photon, &geometry);
            }
            if photon.step_left <= 0.0 {
                roulette(&mut photon, &mut rng);
                if photon.alive {
                    scatter(&mut photon, &geometry, &mut rng);
                }
            }
        }
    }

    #[test]
    fn normal_incidence_fresnel_matches_closed_form() {
        // n1=1.0, n2=1.5 across a single z interface at nz/2; a pencil beam
        // normal to the interface should reflect with R=((n1-n2)/(n1+n2))^2.
        let nz = 40;
        let mut geometry = slab(nz, 0.0001, 0.0001, 0.0);
        geometry.ri = (0..nz)
            .map(|z| if z < nz / 2 { 1.0 } else { 1.5 })
            .collect();
        let eta = 1.0_f64 / 1.5;
        let r_expected = ((1.0 - 1.5) / (1.0 + 1.5)).powi(2);
        let r_computed = fresnel_r(eta, 1.0, 1.0);
        assert!((r_computed - r_expected).abs() < 1e-9);
    }

    #[test]
    fn tir_triggers_when_sin2_exceeds_one() {
        // Going from n=1.5 to n=1.0 at a grazing angle must totally
        // internally reflect once sin(theta) exceeds n2/n1.
        let eta = 1.5 / 1.0;
        let sin2t = 0.9 * eta * eta;
        assert!(sin2t >= 1.0);
    }
}
