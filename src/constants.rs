//! Physical and algorithmic constants, gathered in one place rather than
//! scattered as magic numbers through the stepper.

/// Speed of light in vacuum, cm/s.
pub const C: f64 = 2.997_924_58e10;

/// Multiple of the cuboid size beyond which a photon is considered
/// unrecoverable under the `None`/`EscapeTop` boundary policies, and the
/// footprint multiplier used to launch an infinite plane wave when there is
/// no absorbing boundary.
pub const KILLRANGE: f64 = 6.0;

/// Weight threshold below which Russian roulette is applied.
pub const THRESHOLD: f64 = 0.01;

/// Survival probability used by Russian roulette once a photon's weight
/// drops below [`THRESHOLD`].
pub const CHANCE: f64 = 0.1;

/// Scales the push applied to a fractional voxel index when it must be
/// pinned to one side of an integer boundary plane, so the nudge remains
/// significant relative to the magnitude of the index itself rather than
/// being a fixed step that vanishes (or overshoots) at large indices.
#[inline]
pub fn index_epsilon(i_old: f64) -> f64 {
    f64::EPSILON * (i_old.abs() + 1.0)
}
