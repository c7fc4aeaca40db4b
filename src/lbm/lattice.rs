//! # lattice
//!
//! Geometry of the process-local sub-lattice and of the process grid.
//!
//! Every sub-lattice carries a halo of width one on all six faces. Lattice node `i` on an axis
//! sits at local position `(i - 1) * agrid`, so interior nodes are `1..=grid` and nodes `0` and
//! `grid + 1` mirror the neighbouring sub-lattices.

use serde::{Deserialize, Serialize};

use super::d3q19::{C, Q};
use super::error::{LbError, LbResult};

/// Tolerance for positions that fall on a sub-lattice boundary by round-off
const ROUND_ERROR_PREC: f64 = 1.0e-14;

/// Linear index of a site in the halo padded sub-lattice. x runs fastest.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LinearIndex(pub usize);

impl LinearIndex {
    /// Index shifted by a signed offset.
    #[inline]
    pub fn offset(self, by: isize) -> LinearIndex {
        LinearIndex((self.0 as isize + by) as usize)
    }
}

/// Local sub-lattice description.
#[derive(Clone, Debug)]
pub struct LatticeGeometry {
    /// Interior nodes on each axis
    pub grid: [usize; 3],
    /// `grid + 2`
    pub halo_grid: [usize; 3],
    /// Number of sites including the halo
    pub halo_grid_volume: usize,
    /// Index of the first interior site
    pub halo_offset: LinearIndex,
    /// Lattice spacing
    pub agrid: f64,
    /// Lower corner of the local box in global coordinates
    pub my_left: [f64; 3],
    /// Extent of the local box
    pub local_box_l: [f64; 3],
    strides: [isize; Q],
}

impl LatticeGeometry {
    #[rustfmt::skip]
    pub fn new(grid: [usize; 3], agrid: f64, my_left: [f64; 3]) -> LatticeGeometry {
        let halo_grid = [grid[0] + 2, grid[1] + 2, grid[2] + 2];
        let halo_grid_volume = halo_grid[0] * halo_grid[1] * halo_grid[2];
        let sy = halo_grid[0] as isize; // y stride
        let sz = (halo_grid[0] * halo_grid[1]) as isize; // z stride
        let mut strides = [0isize; Q];
        for i in 0..Q {
            strides[i] = C[i][0] as isize + C[i][1] as isize * sy + C[i][2] as isize * sz;
        }
        LatticeGeometry {
            grid,
            halo_grid,
            halo_grid_volume,
            halo_offset: LinearIndex(1 + halo_grid[0] * (1 + halo_grid[1])),
            agrid,
            my_left,
            local_box_l: [grid[0] as f64 * agrid, grid[1] as f64 * agrid, grid[2] as f64 * agrid],
            strides,
        }
    }

    /// Linear index of halo-grid coordinates `x, y, z`.
    #[inline]
    pub fn index(&self, x: usize, y: usize, z: usize) -> LinearIndex {
        LinearIndex(x + self.halo_grid[0] * (y + self.halo_grid[1] * z))
    }

    /// Get `x, y, z` halo-grid coordinates from a linear index.
    pub fn coordinates(&self, index: LinearIndex) -> (usize, usize, usize) {
        let n = index.0;
        let t = n % (self.halo_grid[0] * self.halo_grid[1]);
        (t % self.halo_grid[0], t / self.halo_grid[0], n / (self.halo_grid[0] * self.halo_grid[1]))
    }

    /// Linear index offset of the neighbour along velocity `i`.
    #[inline]
    pub fn stride(&self, i: usize) -> isize {
        self.strides[i]
    }

    /// Interior sites in sweep order (x fastest, then y, then z).
    pub fn interior(&self) -> impl Iterator<Item = LinearIndex> + '_ {
        (1..=self.grid[2]).flat_map(move |z| {
            (1..=self.grid[1]).flat_map(move |y| (1..=self.grid[0]).map(move |x| self.index(x, y, z)))
        })
    }

    /// Upper corner of the local box
    pub fn my_right(&self) -> [f64; 3] {
        [
            self.my_left[0] + self.local_box_l[0],
            self.my_left[1] + self.local_box_l[1],
            self.my_left[2] + self.local_box_l[2],
        ]
    }

    /// Locate the elementary lattice cell containing global position `pos`.
    pub fn map_position_to_lattice(&self, pos: &[f64; 3]) -> LbResult<ElementaryCell> {
        let mut ind = [0usize; 3];
        let mut delta = [0.0; 6];
        for dir in 0..3 {
            let lpos = pos[dir] - self.my_left[dir];
            let rel = lpos / self.agrid + 1.0; // +1 for halo offset
            let mut i = rel.floor() as isize;
            // positions on the sub-lattice border may land outside by round-off
            if i < 0 {
                if rel.abs() < ROUND_ERROR_PREC {
                    i = 0;
                } else {
                    return Err(LbError::PositionOutsideLattice { pos: *pos });
                }
            } else if i > self.grid[dir] as isize {
                if (lpos - self.local_box_l[dir]).abs() < ROUND_ERROR_PREC * self.local_box_l[dir].max(1.0) {
                    i = self.grid[dir] as isize;
                } else {
                    return Err(LbError::PositionOutsideLattice { pos: *pos });
                }
            }
            ind[dir] = i as usize;
            delta[3 + dir] = rel - i as f64;
            delta[dir] = 1.0 - delta[3 + dir];
        }

        let base = self.index(ind[0], ind[1], ind[2]);
        let sy = self.halo_grid[0];
        let sz = self.halo_grid[0] * self.halo_grid[1];
        let nodes = [
            base,
            LinearIndex(base.0 + 1),
            LinearIndex(base.0 + sy),
            LinearIndex(base.0 + sy + 1),
            LinearIndex(base.0 + sz),
            LinearIndex(base.0 + sz + 1),
            LinearIndex(base.0 + sz + sy),
            LinearIndex(base.0 + sz + sy + 1),
        ];
        Ok(ElementaryCell { nodes, delta })
    }
}

/// The 8 lattice nodes surrounding a position plus the per axis interpolation weights.
///
/// `delta[dir]` is the weight of the lower node on axis `dir`, `delta[3 + dir]` of the upper one.
#[derive(Clone, Copy, Debug)]
pub struct ElementaryCell {
    pub nodes: [LinearIndex; 8],
    pub delta: [f64; 6],
}

impl ElementaryCell {
    /// Trilinear weight of corner `k` (`k = x + 2 y + 4 z` with corner bits `x, y, z`).
    #[inline]
    pub fn weight(&self, k: usize) -> f64 {
        let (x, y, z) = (k & 1, (k >> 1) & 1, (k >> 2) & 1);
        self.delta[3 * x] * self.delta[3 * y + 1] * self.delta[3 * z + 2]
    }
}

/// Axis of the process grid
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Axis {
    X = 0,
    Y = 1,
    Z = 2,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];
}

/// Regular 3D grid of processes (domains) with periodic wrap-around.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProcessGrid {
    pub dims: [usize; 3],
}

impl ProcessGrid {
    pub fn new(d_x: usize, d_y: usize, d_z: usize) -> ProcessGrid {
        ProcessGrid { dims: [d_x, d_y, d_z] }
    }

    /// Number of processes
    pub fn size(&self) -> usize {
        self.dims[0] * self.dims[1] * self.dims[2]
    }

    /// Grid coordinates of `rank`.
    pub fn coordinates(&self, rank: usize) -> [usize; 3] {
        let (x, y, z) = get_coordinates_sl(rank, self.dims[0], self.dims[1]);
        [x, y, z]
    }

    pub fn rank(&self, coords: [usize; 3]) -> usize {
        coords[0] + (coords[1] + coords[2] * self.dims[1]) * self.dims[0]
    }

    /// Rank of the neighbour of `rank` one step along `axis` in direction `step` (+1 or -1).
    pub fn neighbor(&self, rank: usize, axis: Axis, step: isize) -> usize {
        let mut c = self.coordinates(rank);
        let a = axis as usize;
        let d = self.dims[a] as isize;
        c[a] = (((c[a] as isize + step) % d + d) % d) as usize;
        self.rank(c)
    }
}

/// Get `x, y, z` coordinates from 1D index `n` and side lengths `n_x` and `n_y`.
pub fn get_coordinates_sl(n: usize, n_x: usize, n_y: usize) -> (usize, usize, usize) {
    let t = n % (n_x * n_y);
    (t % n_x, t / n_x, n / (n_x * n_y))
}
