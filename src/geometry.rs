//! Immutable description of the voxel grid and its optical properties.

use crate::error::ConfigError;

/// Absorption, scattering and anisotropy coefficients for one material.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MediaProperty {
    /// Absorption coefficient, cm⁻¹.
    pub mua: f64,
    /// Scattering coefficient, cm⁻¹.
    pub mus: f64,
    /// Henyey–Greenstein anisotropy, dimensionless in `[-1, 1]`.
    pub g: f64,
}

/// What happens to a photon when it crosses the outer faces of the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum BoundaryPolicy {
    /// No boundary at all — a photon survives until it wanders
    /// [`crate::constants::KILLRANGE`] cuboid-widths away from the grid.
    None,
    /// Escapes (and is reported to the light collector, if any) at every
    /// face of the cuboid.
    EscapeAll,
    /// Escapes only through the top face (`z < 0`); the other faces behave
    /// like [`BoundaryPolicy::None`].
    EscapeTop,
}

impl BoundaryPolicy {
    pub fn from_code(code: u8) -> Result<Self, ConfigError> {
        match code {
            0 => Ok(BoundaryPolicy::None),
            1 => Ok(BoundaryPolicy::EscapeAll),
            2 => Ok(BoundaryPolicy::EscapeTop),
            other => Err(ConfigError::InvalidBoundaryType(other)),
        }
    }
}

/// The immutable voxel grid: edge lengths, extents, per-voxel material
/// labels, and the property tables those labels index into.
#[derive(Debug, Clone)]
pub struct Geometry {
    /// Voxel edge lengths `(dx, dy, dz)`, cm.
    pub d: [f64; 3],
    /// Grid extents `(nx, ny, nz)`, voxel counts.
    pub n: [usize; 3],
    pub boundary: BoundaryPolicy,
    /// Per-voxel material label, linear index `iz*nx*ny + iy*nx + ix`.
    pub m: Vec<u8>,
    /// Property table indexed by material label.
    pub media: Vec<MediaProperty>,
    /// Refractive index per z-slice.
    pub ri: Vec<f64>,
}

impl Geometry {
    pub fn voxel_count(&self) -> usize {
        self.n[0] * self.n[1] * self.n[2]
    }

    pub fn voxel_volume(&self) -> f64 {
        self.d[0] * self.d[1] * self.d[2]
    }

    /// Linear index of voxel `(ix, iy, iz)`, x-fastest.
    #[inline]
    pub fn linear_index(&self, ix: usize, iy: usize, iz: usize) -> usize {
        iz * self.n[0] * self.n[1] + iy * self.n[0] + ix
    }

    /// Clamps a possibly out-of-range z-slice index into `[0, nz-1]`.
    #[inline]
    pub fn clamp_z(&self, iz: isize) -> usize {
        iz.clamp(0, self.n[2] as isize - 1) as usize
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.d.iter().any(|&v| v <= 0.0) {
            return Err(ConfigError::NonPositiveVoxelSize {
                dx: self.d[0],
                dy: self.d[1],
                dz: self.d[2],
            });
        }
        if self.n.iter().any(|&v| v == 0) {
            return Err(ConfigError::EmptyGrid {
                nx: self.n[0],
                ny: self.n[1],
                nz: self.n[2],
            });
        }
        if self.media.is_empty() {
            return Err(ConfigError::EmptyMediaTable);
        }
        for (material, prop) in self.media.iter().enumerate() {
            if !(-1.0..=1.0).contains(&prop.g) {
                return Err(ConfigError::AnisotropyOutOfRange {
                    material,
                    g: prop.g,
                });
            }
        }
        for (slice, &ri) in self.ri.iter().enumerate() {
            if ri < 1.0 {
                return Err(ConfigError::RefractiveIndexBelowOne { slice, ri });
            }
        }
        for (voxel, &label) in self.m.iter().enumerate() {
            if label as usize >= self.media.len() {
                return Err(ConfigError::MaterialIndexOutOfRange {
                    voxel,
                    index: label,
                    table_len: self.media.len(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_geometry(media: Vec<MediaProperty>, m: Vec<u8>) -> Geometry {
        Geometry {
            d: [0.01, 0.01, 0.01],
            n: [2, 2, 2],
            boundary: BoundaryPolicy::EscapeAll,
            m,
            media,
            ri: vec![1.0, 1.0],
        }
    }

    #[test]
    fn linear_index_is_x_fastest() {
        let g = tiny_geometry(
            vec![MediaProperty {
                mua: 1.0,
                mus: 1.0,
                g: 0.0,
            }],
            vec![0; 8],
        );
        assert_eq!(g.linear_index(0, 0, 0), 0);
        assert_eq!(g.linear_index(1, 0, 0), 1);
        assert_eq!(g.linear_index(0, 1, 0), 2);
        assert_eq!(g.linear_index(0, 0, 1), 4);
    }

    #[test]
    fn rejects_non_positive_voxel_size() {
        let mut g = tiny_geometry(
            vec![MediaProperty {
                mua: 1.0,
                mus: 1.0,
                g: 0.0,
            }],
            vec![0; 8],
        );
        g.d[1] = 0.0;
        assert!(matches!(
            g.validate(),
            Err(ConfigError::NonPositiveVoxelSize { .. })
        ));
    }

    #[test]
    fn rejects_out_of_range_material_index() {
        let g = tiny_geometry(
            vec![MediaProperty {
                mua: 1.0,
                mus: 1.0,
                g: 0.0,
            }],
            vec![5; 8],
        );
        assert!(matches!(
            g.validate(),
            Err(ConfigError::MaterialIndexOutOfRange { .. })
        ));
    }

    #[test]
    fn rejects_anisotropy_out_of_range() {
        let g = tiny_geometry(
            vec![MediaProperty {
                mua: 1.0,
                mus: 1.0,
                g: 1.5,
            }],
            vec![0; 8],
        );
        assert!(matches!(
            g.validate(),
            Err(ConfigError::AnisotropyOutOfRange { .. })
        ));
    }
}
