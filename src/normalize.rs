//! Converts raw accumulated tallies into physical units, per spec.md §4.9.

use crate::beam::Beam;
use crate::collector::{LightCollector, Selectivity};
use crate::constants::KILLRANGE;
use crate::geometry::{BoundaryPolicy, Geometry};
use crate::tally::Tallies;

fn selectivity_squared(lc: &LightCollector) -> f64 {
    match lc.selectivity {
        Selectivity::FieldSize(field_size) => field_size * field_size,
        Selectivity::Na(na) => na * na,
    }
}

/// Rescales `tallies` in place from raw absorption/hit counts into fluence
/// rate (or, for a volumetric source, normalized fluence per watt emitted).
pub fn normalize(
    tallies: &mut Tallies,
    geometry: &Geometry,
    beam: &Beam,
    collector: Option<&LightCollector>,
    n_photons: u64,
) {
    let v = geometry.voxel_volume();
    let n = n_photons as f64;
    let l_lc = collector.map(|lc| lc.res_x * lc.res_y).unwrap_or(1);

    if let Beam::Volumetric { power, .. } = beam {
        for (j, f) in tallies.f.iter_mut().enumerate() {
            let mua = geometry.media[geometry.m[j] as usize].mua;
            *f /= v * n * mua / power;
        }
        if let Some(lc) = collector {
            let sel2 = selectivity_squared(lc);
            if l_lc > 1 {
                for bin in tallies.image.iter_mut() {
                    *bin /= (sel2 / l_lc as f64) * n / power;
                }
            } else {
                tallies.image[0] /= n / power;
            }
        }
        return;
    }

    let killrange_factor = if beam.is_plane_wave() && geometry.boundary != BoundaryPolicy::EscapeAll
    {
        KILLRANGE * KILLRANGE
    } else {
        1.0
    };

    for (j, f) in tallies.f.iter_mut().enumerate() {
        let mua = geometry.media[geometry.m[j] as usize].mua;
        *f /= v * n * mua * killrange_factor;
    }
    if let Some(lc) = collector {
        if l_lc > 1 {
            let sel2 = selectivity_squared(lc);
            for bin in tallies.image.iter_mut() {
                *bin /= (sel2 / l_lc as f64) * n * killrange_factor;
            }
        } else {
            tallies.image[0] /= n * killrange_factor;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::beam::BeamGeometry;
    use crate::geometry::MediaProperty;
    use crate::math::Vec3;

    fn flat_geometry() -> Geometry {
        Geometry {
            d: [0.1, 0.1, 0.1],
            n: [2, 2, 2],
            boundary: BoundaryPolicy::EscapeAll,
            m: vec![0; 8],
            media: vec![MediaProperty {
                mua: 2.0,
                mus: 0.0,
                g: 0.0,
            }],
            ri: vec![1.0, 1.0],
        }
    }

    #[test]
    fn non_volumetric_scales_by_volume_photons_and_mua() {
        let geometry = flat_geometry();
        let mut tallies = Tallies::zeroed(8, 0);
        tallies.f[0] = 4.0;
        let beam = Beam::IsotropicPoint(BeamGeometry::from_angles(
            Vec3::zero(),
            0.0,
            0.0,
            0.0,
            0.0,
        ));
        normalize(&mut tallies, &geometry, &beam, None, 100);
        let expected = 4.0 / (geometry.voxel_volume() * 100.0 * 2.0);
        assert!((tallies.f[0] - expected).abs() < 1e-12);
    }

    #[test]
    fn plane_wave_without_absorbing_walls_gets_killrange_squared_factor() {
        let mut geometry = flat_geometry();
        geometry.boundary = BoundaryPolicy::None;
        let mut tallies = Tallies::zeroed(8, 0);
        tallies.f[0] = 4.0;
        let beam = Beam::PlaneWave(BeamGeometry::from_angles(
            Vec3::zero(),
            0.0,
            0.0,
            0.0,
            0.0,
        ));
        normalize(&mut tallies, &geometry, &beam, None, 100);
        let expected = 4.0 / (geometry.voxel_volume() * 100.0 * 2.0 * KILLRANGE * KILLRANGE);
        assert!((tallies.f[0] - expected).abs() < 1e-9);
    }
}
