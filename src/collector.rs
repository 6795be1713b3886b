//! Light collector: projects escaping photons onto an objective image plane
//! or a fiber-tip acceptance cone, per spec.md §4.6.

use crate::constants::C;
use crate::error::ConfigError;
use crate::geometry::Geometry;
use crate::math::Vec3;
use crate::photon::Photon;
use crate::tally::Tallies;

/// What makes a collector accept a ray once it reaches the collector plane.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub enum Selectivity {
    /// Objective lens: half-width of the accepted image-plane field, cm.
    FieldSize(f64),
    /// Fiber tip: numerical aperture, dimensionless.
    Na(f64),
}

/// A virtual objective lens or fiber tip viewing the grid from outside.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct LightCollector {
    /// Center of the focal plane (objective) or fiber-tip position, cm.
    pub r: Vec3,
    pub theta: f64,
    pub phi: f64,
    /// Focal length, cm. `f64::INFINITY` marks a fiber tip rather than an
    /// objective.
    pub f: f64,
    pub diam: f64,
    pub selectivity: Selectivity,
    pub res_x: usize,
    pub res_y: usize,
    pub res_t: usize,
    pub t_start: f64,
    pub t_end: f64,
}

impl LightCollector {
    pub fn is_fiber(&self) -> bool {
        self.f.is_infinite()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.is_fiber() && (self.res_x == 0 || self.res_y == 0) {
            return Err(ConfigError::ZeroCollectorResolution {
                res_x: self.res_x,
                res_y: self.res_y,
            });
        }
        if self.res_t > 1 && self.t_end <= self.t_start {
            return Err(ConfigError::InvalidTimeWindow {
                t_start: self.t_start,
                t_end: self.t_end,
            });
        }
        Ok(())
    }

    /// Length of the `tallies.image` buffer this collector needs.
    pub fn image_len(&self) -> usize {
        if self.is_fiber() {
            self.res_t.max(1)
        } else {
            self.res_x * self.res_y * self.res_t.max(1)
        }
    }

    /// Bins an escaped photon's weight into `tallies.image`, or drops it if
    /// it misses the collector's acceptance cone/aperture/field.
    pub fn collect(&self, photon: &Photon, geometry: &Geometry, tallies: &mut Tallies) {
        let n = &geometry.n;
        let d = &geometry.d;
        let disp = Vec3::new(
            (photon.i.x - n[0] as f64 / 2.0) * d[0],
            (photon.i.y - n[1] as f64 / 2.0) * d[1],
            photon.i.z * d[2],
        ) - self.r;

        let resc = disp.to_frame(self.theta, self.phi);
        let dir = photon.u.to_frame(self.theta, self.phi);

        if dir.z >= 0.0 {
            return;
        }

        let r_lcp = Vec3::new(
            resc.x - resc.z * dir.x / dir.z,
            resc.y - resc.z * dir.y / dir.z,
            0.0,
        );
        if (r_lcp.x * r_lcp.x + r_lcp.y * r_lcp.y).sqrt() >= self.diam / 2.0 {
            return;
        }

        match self.selectivity {
            Selectivity::FieldSize(field_size) => {
                let r_im = Vec3::new(
                    r_lcp.x + self.f * dir.x / dir.z,
                    r_lcp.y + self.f * dir.y / dir.z,
                    0.0,
                );
                if (r_im.x * r_im.x + r_im.y * r_im.y).sqrt() >= field_size / 2.0 {
                    return;
                }
                let x_bin = (self.res_x as f64 * (r_im.x / field_size + 0.5)).floor();
                let y_bin = (self.res_y as f64 * (r_im.y / field_size + 0.5)).floor();
                if x_bin < 0.0 || x_bin >= self.res_x as f64 {
                    return;
                }
                if y_bin < 0.0 || y_bin >= self.res_y as f64 {
                    return;
                }
                let t_bin = self.time_bin(photon, resc, dir);
                let index = x_bin as usize
                    + y_bin as usize * self.res_x
                    + t_bin * self.res_x * self.res_y;
                tallies.image[index] += photon.weight;
            }
            Selectivity::Na(na) => {
                let lateral = (dir.x * dir.x + dir.y * dir.y).sqrt();
                let theta_ff = (-lateral / dir.z).atan();
                if theta_ff >= na.min(1.0).asin() {
                    return;
                }
                let t_bin = self.time_bin(photon, resc, dir);
                tallies.image[t_bin] += photon.weight;
            }
        }
    }

    fn time_bin(&self, photon: &Photon, resc: Vec3, dir: Vec3) -> usize {
        if self.res_t <= 1 {
            return 0;
        }
        let path_z = if self.is_fiber() {
            resc.z / dir.z
        } else {
            (resc.z - self.f) / dir.z
        };
        let arrival = photon.time - path_z * photon.props.ri / C;
        let frac = (arrival - self.t_start) / (self.t_end - self.t_start);
        let t = 1.0 + (self.res_t as f64 - 2.0) * frac;
        t.clamp(0.0, self.res_t as f64 - 1.0) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::BoundaryPolicy;
    use crate::geometry::MediaProperty;
    use crate::photon::OpticalProperties;

    fn test_geometry() -> Geometry {
        Geometry {
            d: [0.01, 0.01, 0.01],
            n: [100, 100, 100],
            boundary: BoundaryPolicy::EscapeAll,
            m: vec![0; 100 * 100 * 100],
            media: vec![MediaProperty {
                mua: 1.0,
                mus: 100.0,
                g: 0.9,
            }],
            ri: vec![1.0; 100],
        }
    }

    fn straight_down_photon(geometry: &Geometry) -> Photon {
        Photon {
            i: Vec3::new(50.0, 50.0, -1.0),
            u: Vec3::new(0.0, 0.0, -1.0),
            d: Vec3::zero(),
            step_left: 1.0,
            weight: 1.0,
            time: 0.0,
            alive: true,
            inside_volume: false,
            same_voxel: false,
            voxel_index: 0,
            props: OpticalProperties {
                mua: 1.0,
                mus: 100.0,
                g: 0.9,
                ri: 1.0,
            },
        }
    }

    #[test]
    fn centered_objective_collects_a_normal_incidence_ray_at_image_center() {
        let geometry = test_geometry();
        let photon = straight_down_photon(&geometry);
        let lc = LightCollector {
            r: Vec3::zero(),
            theta: 0.0,
            phi: 0.0,
            f: 1.0,
            diam: 1.0,
            selectivity: Selectivity::FieldSize(1.0),
            res_x: 5,
            res_y: 5,
            res_t: 1,
            t_start: 0.0,
            t_end: 0.0,
        };
        let mut tallies = Tallies::zeroed(geometry.voxel_count(), lc.image_len());
        lc.collect(&photon, &geometry, &mut tallies);
        assert!((tallies.image[2 + 2 * 5] - 1.0).abs() < 1e-12);
        assert_eq!(tallies.image.iter().filter(|&&v| v != 0.0).count(), 1);
    }

    #[test]
    fn fiber_outside_acceptance_cone_is_dropped() {
        let geometry = test_geometry();
        let mut photon = straight_down_photon(&geometry);
        photon.u = Vec3::new(0.9, 0.0, -0.436_05).normalized();
        let lc = LightCollector {
            r: Vec3::zero(),
            theta: 0.0,
            phi: 0.0,
            f: f64::INFINITY,
            diam: 1.0,
            selectivity: Selectivity::Na(0.22),
            res_x: 1,
            res_y: 1,
            res_t: 1,
            t_start: 0.0,
            t_end: 0.0,
        };
        let mut tallies = Tallies::zeroed(geometry.voxel_count(), lc.image_len());
        lc.collect(&photon, &geometry, &mut tallies);
        assert_eq!(tallies.image[0], 0.0);
    }
}
