//! Per-worker accumulation buffers for absorbed power and collector images.
//!
//! spec.md §5 models `F`/`Image` as shared arrays updated by atomic scalar
//! addition. Rust's standard library has no atomic `f64`, so each worker
//! instead owns a private `Tallies` buffer for its entire lifetime and the
//! driver sums all workers' buffers element-wise after `thread::scope`
//! joins (see `driver.rs`). Addition stays commutative, just deferred.

#[derive(Debug, Clone)]
pub struct Tallies {
    /// Absorbed power per voxel, joules, linear index matching `Geometry`.
    pub f: Vec<f64>,
    /// Collector image bins, linear index `(resX, resY, resT)`-major.
    pub image: Vec<f64>,
}

impl Tallies {
    pub fn zeroed(voxel_count: usize, image_len: usize) -> Self {
        Self {
            f: vec![0.0; voxel_count],
            image: vec![0.0; image_len],
        }
    }

    /// Adds another worker's tallies into this one, element-wise.
    pub fn merge(&mut self, other: &Tallies) {
        for (a, b) in self.f.iter_mut().zip(&other.f) {
            *a += b;
        }
        for (a, b) in self.image.iter_mut().zip(&other.image) {
            *a += b;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_sums_elementwise() {
        let mut a = Tallies {
            f: vec![1.0, 2.0],
            image: vec![0.5],
        };
        let b = Tallies {
            f: vec![10.0, 20.0],
            image: vec![0.25],
        };
        a.merge(&b);
        assert_eq!(a.f, vec![11.0, 22.0]);
        assert_eq!(a.image, vec![0.75]);
    }
}
