//! Configuration validation errors.
//!
//! Every variant corresponds to a rejection spec.md demands be raised before
//! any worker is launched — arithmetic degeneracies that can occur mid-flight
//! (TIR, grazing incidence, `|u_z|=1`) are handled in-place in the stepper
//! instead and are not represented here.

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("voxel edge length must be positive, got ({dx}, {dy}, {dz})")]
    NonPositiveVoxelSize { dx: f64, dy: f64, dz: f64 },

    #[error("grid must have at least one voxel along each axis, got ({nx}, {ny}, {nz})")]
    EmptyGrid { nx: usize, ny: usize, nz: usize },

    #[error("beam direction must be a unit vector, got length {length}")]
    NonUnitDirection { length: f64 },

    #[error("refractive index must be >= 1, got {ri} at z-slice {slice}")]
    RefractiveIndexBelowOne { slice: usize, ri: f64 },

    #[error("anisotropy g must be in [-1, 1], got {g} for material {material}")]
    AnisotropyOutOfRange { material: usize, g: f64 },

    #[error("media property table must not be empty")]
    EmptyMediaTable,

    #[error("material index {index} at voxel {voxel} is out of range for a table of {table_len} entries")]
    MaterialIndexOutOfRange {
        voxel: usize,
        index: u8,
        table_len: usize,
    },

    #[error("light collector resolution must be positive, got ({res_x}, {res_y})")]
    ZeroCollectorResolution { res_x: usize, res_y: usize },

    #[error("light collector time window requires tEnd > tStart when resT > 1, got [{t_start}, {t_end}]")]
    InvalidTimeWindow { t_start: f64, t_end: f64 },

    #[error("sourceDistribution must contain at least one non-zero voxel")]
    EmptySourceDistribution,

    #[error("boundary type {0} is out of range (expected 0, 1 or 2)")]
    InvalidBoundaryType(u8),

    #[error("beam type {0} is out of range (expected 0..=7)")]
    InvalidBeamType(u8),

    #[error("simulationTime must be positive, got {0} minutes")]
    NonPositiveSimulationTime(f64),
}
