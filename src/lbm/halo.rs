//! # halo
//!
//! Halo exchange of the population field between neighbouring sub-lattices.
//!
//! The communication plan is built once from the lattice geometry and the process grid. Axes are
//! exchanged in the order X, Y, Z, every plane spanning the full halo extent of the two other
//! axes, so edge and corner halo sites are filled by the successive single axis exchanges.
//! All 19 populations of a plane travel in one packed message per direction.
//!
//! Transfer buffer convention per axis:
//! - `p`: outgoing layer for the + neighbour (interior layer `grid`), incoming layer from it after the exchange
//! - `m`: outgoing layer for the - neighbour (interior layer `1`), incoming layer from it after the exchange

use super::d3q19::Q;
use super::lattice::{Axis, LatticeGeometry, ProcessGrid};
use super::store::DistributionStore;

/// Strided block layout of a lattice plane: `count` blocks of `block_len` contiguous sites,
/// starting at `offset`, consecutive blocks `stride` sites apart.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HaloLayout {
    pub offset: usize,
    pub block_len: usize,
    pub stride: usize,
    pub count: usize,
}

impl HaloLayout {
    /// Plane `layer` normal to `axis`.
    #[rustfmt::skip]
    pub fn plane(geometry: &LatticeGeometry, axis: Axis, layer: usize) -> HaloLayout {
        let [hx, hy, hz] = geometry.halo_grid;
        match axis {
            Axis::X => HaloLayout { offset: layer,           block_len: 1,       stride: hx,      count: hy * hz },
            Axis::Y => HaloLayout { offset: layer * hx,      block_len: hx,      stride: hx * hy, count: hz },
            Axis::Z => HaloLayout { offset: layer * hx * hy, block_len: hx * hy, stride: hx * hy, count: 1 },
        }
    }

    /// Number of sites in the layout
    pub fn len(&self) -> usize {
        self.block_len * self.count
    }

    /// Linear indices of all sites in the layout
    pub fn indices(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.count).flat_map(move |b| {
            let start = self.offset + b * self.stride;
            start..start + self.block_len
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Plus,
    Minus,
}

/// One directed transfer seen from the local process: `send` goes to `dest_rank`, data from
/// `source_rank` lands in `recv`.
#[derive(Clone, Copy, Debug)]
pub struct HaloTransfer {
    pub axis: Axis,
    pub direction: Direction,
    pub source_rank: usize,
    pub dest_rank: usize,
    pub send: HaloLayout,
    pub recv: HaloLayout,
}

/// Ordered transfers X+, X-, Y+, Y-, Z+, Z-.
#[derive(Clone, Debug)]
pub struct HaloPlan {
    pub rank: usize,
    pub volume: usize,
    pub transfers: Vec<HaloTransfer>,
}

impl HaloPlan {
    pub fn build(geometry: &LatticeGeometry, topology: &ProcessGrid, rank: usize) -> HaloPlan {
        let mut transfers = Vec::with_capacity(6);
        for axis in Axis::ALL {
            let grid = geometry.grid[axis as usize];
            let plus = topology.neighbor(rank, axis, 1);
            let minus = topology.neighbor(rank, axis, -1);
            transfers.push(HaloTransfer {
                axis,
                direction: Direction::Plus,
                source_rank: minus,
                dest_rank: plus,
                send: HaloLayout::plane(geometry, axis, grid),
                recv: HaloLayout::plane(geometry, axis, 0),
            });
            transfers.push(HaloTransfer {
                axis,
                direction: Direction::Minus,
                source_rank: plus,
                dest_rank: minus,
                send: HaloLayout::plane(geometry, axis, 1),
                recv: HaloLayout::plane(geometry, axis, grid + 1),
            });
        }
        HaloPlan { rank, volume: geometry.halo_grid_volume, transfers }
    }

    pub fn transfer(&self, axis: Axis, direction: Direction) -> &HaloTransfer {
        let d = match direction {
            Direction::Plus => 0,
            Direction::Minus => 1,
        };
        &self.transfers[2 * axis as usize + d]
    }

    /// Number of values (sites times populations) exchanged per direction on `axis`
    pub fn message_len(&self, axis: Axis) -> usize {
        Q * self.transfer(axis, Direction::Plus).send.len()
    }

    /// `true` if this process is its own neighbour on `axis` (periodic self-wrap).
    pub fn is_self_wrap(&self, axis: Axis) -> bool {
        self.transfer(axis, Direction::Plus).dest_rank == self.rank
    }
}

/// Host transfer buffers, sized for the largest plane.
pub struct TransferBuffers {
    pub p: Vec<f64>,
    pub m: Vec<f64>,
    /// Receive scratch buffer for remote exchanges
    pub t: Vec<f64>,
}

impl TransferBuffers {
    pub fn new(plan: &HaloPlan) -> TransferBuffers {
        let n = Axis::ALL.iter().map(|a| plan.message_len(*a)).max().unwrap_or(0);
        TransferBuffers { p: vec![0.0; n], m: vec![0.0; n], t: vec![0.0; n] }
    }
}

/// Copy all populations of the sites in `layout` into `buffer`.
pub fn pack(layout: &HaloLayout, store: &DistributionStore, buffer: &mut [f64]) {
    let volume = store.volume();
    let len = layout.len();
    let current = store.current();
    for i in 0..Q {
        let base = i * volume;
        let out = &mut buffer[i * len..(i + 1) * len];
        for (k, idx) in layout.indices().enumerate() {
            out[k] = current[base + idx];
        }
    }
}

/// Inverse of [`pack`].
pub fn unpack(layout: &HaloLayout, store: &mut DistributionStore, buffer: &[f64]) {
    let volume = store.volume();
    let len = layout.len();
    let current = store.current_mut();
    for i in 0..Q {
        let base = i * volume;
        let src = &buffer[i * len..(i + 1) * len];
        for (k, idx) in layout.indices().enumerate() {
            current[base + idx] = src[k];
        }
    }
}

/// Extract the two boundary layers of `axis` into the transfer buffers.
pub fn extract(plan: &HaloPlan, axis: Axis, store: &DistributionStore, buffers: &mut TransferBuffers) {
    let n = plan.message_len(axis);
    pack(&plan.transfer(axis, Direction::Plus).send, store, &mut buffers.p[..n]);
    pack(&plan.transfer(axis, Direction::Minus).send, store, &mut buffers.m[..n]);
}

/// Insert the received layers of `axis` into the halo.
pub fn insert(plan: &HaloPlan, axis: Axis, store: &mut DistributionStore, buffers: &TransferBuffers) {
    let n = plan.message_len(axis);
    unpack(&plan.transfer(axis, Direction::Plus).recv, store, &buffers.m[..n]);
    unpack(&plan.transfer(axis, Direction::Minus).recv, store, &buffers.p[..n]);
}

/// Point to point message exchange between processes.
pub trait HaloTransport {
    /// Send `send` to `dest` while receiving `recv` from `source`. Blocks until both complete.
    fn send_receive(&mut self, send: &[f64], dest: usize, recv: &mut [f64], source: usize);
}

/// Transport of a single process: every message is addressed to itself.
pub struct Loopback;

impl HaloTransport for Loopback {
    fn send_receive(&mut self, send: &[f64], dest: usize, recv: &mut [f64], source: usize) {
        debug_assert_eq!(dest, source);
        recv.copy_from_slice(send);
    }
}

/// Refresh the complete halo of `store`.
#[rustfmt::skip]
pub fn execute<T: HaloTransport>(plan: &HaloPlan, store: &mut DistributionStore, buffers: &mut TransferBuffers, transport: &mut T) {
    for axis in Axis::ALL {
        extract(plan, axis, store, buffers);
        if plan.is_self_wrap(axis) {
            std::mem::swap(&mut buffers.p, &mut buffers.m); // own layers wrap around
        } else {
            let n = plan.message_len(axis);
            let plus = plan.transfer(axis, Direction::Plus);
            let minus = plan.transfer(axis, Direction::Minus);
            transport.send_receive(&buffers.p[..n], plus.dest_rank, &mut buffers.t[..n], plus.source_rank); // positive direction
            transport.send_receive(&buffers.m[..n], minus.dest_rank, &mut buffers.p[..n], minus.source_rank); // negative direction
            std::mem::swap(&mut buffers.m, &mut buffers.t); // swap transfer buffers without copying them
        }
        insert(plan, axis, store, buffers);
    }
}

/// Count the values of `layout` that differ from `expected` (packed like [`pack`]).
pub fn count_mismatches(layout: &HaloLayout, store: &DistributionStore, expected: &[f64]) -> usize {
    let volume = store.volume();
    let len = layout.len();
    let current = store.current();
    let mut mismatches = 0;
    for i in 0..Q {
        for (k, idx) in layout.indices().enumerate() {
            if current[i * volume + idx] != expected[i * len + k] {
                mismatches += 1;
            }
        }
    }
    mismatches
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lbm::lattice::LinearIndex;

    fn filled_store(geometry: &LatticeGeometry) -> DistributionStore {
        let mut store = DistributionStore::new(geometry.halo_grid_volume);
        for index in geometry.interior() {
            let (x, y, z) = geometry.coordinates(index);
            let n: [f64; Q] = std::array::from_fn(|i| (i * 1000 + x * 100 + y * 10 + z) as f64);
            store.set_node(index, &n);
        }
        store
    }

    #[test]
    fn plane_layouts_cover_the_plane() {
        let g = LatticeGeometry::new([3, 4, 5], 1.0, [0.0; 3]);
        for (axis, area) in [(Axis::X, 6 * 7), (Axis::Y, 5 * 7), (Axis::Z, 5 * 6)] {
            let layout = HaloLayout::plane(&g, axis, 2);
            assert_eq!(layout.len(), area);
            for idx in layout.indices() {
                let (x, y, z) = g.coordinates(LinearIndex(idx));
                assert_eq!([x, y, z][axis as usize], 2);
            }
        }
    }

    #[test]
    fn self_wrap_fills_halo_periodically() {
        let g = LatticeGeometry::new([3, 4, 2], 1.0, [0.0; 3]);
        let topology = ProcessGrid::new(1, 1, 1);
        let plan = HaloPlan::build(&g, &topology, 0);
        let mut buffers = TransferBuffers::new(&plan);
        let mut store = filled_store(&g);
        execute(&plan, &mut store, &mut buffers, &mut Loopback);

        let wrap = |c: usize, n: usize| if c == 0 { n } else if c == n + 1 { 1 } else { c };
        for z in 0..g.halo_grid[2] {
            for y in 0..g.halo_grid[1] {
                for x in 0..g.halo_grid[0] {
                    let src = g.index(wrap(x, 3), wrap(y, 4), wrap(z, 2));
                    let dst = g.index(x, y, z);
                    assert_eq!(store.node(dst), store.node(src), "site {x} {y} {z}");
                }
            }
        }
    }

    #[test]
    fn plan_orders_axes_and_directions() {
        let g = LatticeGeometry::new([4, 4, 4], 1.0, [0.0; 3]);
        let topology = ProcessGrid::new(2, 1, 3);
        let plan = HaloPlan::build(&g, &topology, 1);
        assert_eq!(plan.transfers.len(), 6);
        let xp = plan.transfer(Axis::X, Direction::Plus);
        assert_eq!((xp.dest_rank, xp.source_rank), (0, 0));
        assert_eq!(xp.recv.offset, 0);
        assert_eq!(xp.send.offset, 4);
        let zm = plan.transfer(Axis::Z, Direction::Minus);
        assert_eq!((zm.dest_rank, zm.source_rank), (5, 3));
        assert!(plan.is_self_wrap(Axis::Y));
        assert!(!plan.is_self_wrap(Axis::Z));
    }

    #[test]
    fn mismatches_are_counted() {
        let g = LatticeGeometry::new([2, 2, 2], 1.0, [0.0; 3]);
        let store = filled_store(&g);
        let layout = HaloLayout::plane(&g, Axis::X, 1);
        let mut expected = vec![0.0; Q * layout.len()];
        pack(&layout, &store, &mut expected);
        assert_eq!(count_mismatches(&layout, &store, &expected), 0);
        expected[3] += 1.0;
        assert_eq!(count_mismatches(&layout, &store, &expected), 1);
    }
}
