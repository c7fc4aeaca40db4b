//! # store
//!
//! Double buffered population storage. Each buffer holds the 19 populations as separate dense
//! arrays over the halo padded volume (population `i` of site `s` at `i * volume + s`).
//! Stored values are deviations from the reference populations `w_i * avg_rho`.

use rayon::prelude::*;

use super::d3q19::Q;
use super::lattice::LinearIndex;

pub struct DistributionStore {
    volume: usize,
    current: Vec<f64>,
    next: Vec<f64>,
}

impl DistributionStore {
    /// Returns a zeroed store (reference density, fluid at rest) for `volume` sites.
    pub fn new(volume: usize) -> DistributionStore {
        DistributionStore {
            volume,
            current: vec![0.0; Q * volume],
            next: vec![0.0; Q * volume],
        }
    }

    pub fn volume(&self) -> usize {
        self.volume
    }

    /// Current populations, read side of the sweep.
    pub fn current(&self) -> &[f64] {
        &self.current
    }

    pub fn current_mut(&mut self) -> &mut [f64] {
        &mut self.current
    }

    /// Borrow the current buffer for reading and the next buffer for writing.
    pub fn split_mut(&mut self) -> (&[f64], &mut [f64]) {
        (&self.current, &mut self.next)
    }

    /// Makes the post-collision buffer current. No data is copied.
    pub fn swap(&mut self) {
        std::mem::swap(&mut self.current, &mut self.next);
    }

    #[inline]
    pub fn get(&self, i: usize, index: LinearIndex) -> f64 {
        self.current[i * self.volume + index.0]
    }

    /// All populations of one site
    pub fn node(&self, index: LinearIndex) -> [f64; Q] {
        std::array::from_fn(|i| self.current[i * self.volume + index.0])
    }

    pub fn set_node(&mut self, index: LinearIndex, n: &[f64; Q]) {
        for i in 0..Q {
            self.current[i * self.volume + index.0] = n[i];
        }
    }

    pub fn add_node(&mut self, index: LinearIndex, dn: &[f64; Q]) {
        for i in 0..Q {
            self.current[i * self.volume + index.0] += dn[i];
        }
    }

    /// Sets all populations of all sites, both buffers, to zero.
    pub fn reset(&mut self) {
        self.current.par_iter_mut().for_each(|n| *n = 0.0);
        self.next.par_iter_mut().for_each(|n| *n = 0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn swap_exchanges_buffers() {
        let mut s = DistributionStore::new(8);
        let site = LinearIndex(3);
        {
            let (_, next) = s.split_mut();
            next[2 * 8 + 3] = 0.5;
        }
        assert_eq!(s.get(2, site), 0.0);
        s.swap();
        assert_eq!(s.get(2, site), 0.5);
        assert_eq!(s.node(site)[2], 0.5);
    }

    #[test]
    fn node_accessors_address_all_populations() {
        let mut s = DistributionStore::new(5);
        let n: [f64; Q] = std::array::from_fn(|i| i as f64);
        s.set_node(LinearIndex(4), &n);
        s.add_node(LinearIndex(4), &[1.0; Q]);
        for i in 0..Q {
            assert_eq!(s.get(i, LinearIndex(4)), i as f64 + 1.0);
            assert_eq!(s.get(i, LinearIndex(3)), 0.0);
        }
        s.reset();
        assert!(s.current().iter().all(|v| *v == 0.0));
    }
}
