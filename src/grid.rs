//! Spatial hash over the horizontal plane for fast neighbor queries.

use crate::config::GridConfig;
use glam::{Vec2, Vec3};

/// Bucket index mapping horizontal position to agent indices.
///
/// There is no vertical partitioning: callers filter the candidates returned
/// by [`SpatialHash::block`] with plain distance checks.
#[derive(Clone, Debug)]
pub struct SpatialHash {
    cell_size: f32,
    width: usize,
    height: usize,
    /// World-space (x, z) of the corner of cell (0, 0)
    origin: Vec2,
    /// cells[cell_x + cell_z * width] holds the agent indices in that cell
    cells: Vec<Vec<usize>>,
    entries: usize,
}

impl SpatialHash {
    /// Create a new hash with `width * height` cells of edge `cell_size`
    pub fn new(cell_size: f32, width: usize, height: usize, origin: Vec2) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        Self {
            cell_size,
            width,
            height,
            origin,
            cells: vec![Vec::new(); width * height],
            entries: 0,
        }
    }

    pub fn from_config(config: &GridConfig) -> Self {
        Self::new(config.cell_size, config.width, config.height, config.origin())
    }

    /// Clear all entries, keeping bucket allocations
    pub fn clear(&mut self) {
        for cell in &mut self.cells {
            cell.clear();
        }
        self.entries = 0;
    }

    /// Cell coordinates for a position, clamped into the grid
    #[inline]
    pub fn cell_coords(&self, position: Vec3) -> (usize, usize) {
        let fx = ((position.x - self.origin.x) / self.cell_size).floor();
        let fz = ((position.z - self.origin.y) / self.cell_size).floor();
        // Float-to-int casts saturate, and NaN maps to 0
        let cx = (fx as i64).clamp(0, self.width as i64 - 1) as usize;
        let cz = (fz as i64).clamp(0, self.height as i64 - 1) as usize;
        (cx, cz)
    }

    /// Cell id `cell_x + cell_z * width` for a position
    #[inline]
    pub fn cell_of(&self, position: Vec3) -> usize {
        let (cx, cz) = self.cell_coords(position);
        cx + cz * self.width
    }

    /// Insert an agent index into a cell. Out-of-range ids are ignored.
    #[inline]
    pub fn insert(&mut self, cell: usize, index: usize) {
        if let Some(bucket) = self.cells.get_mut(cell) {
            bucket.push(index);
            self.entries += 1;
        }
    }

    /// Insert an agent index at the cell containing `position`
    #[inline]
    pub fn insert_at(&mut self, position: Vec3, index: usize) {
        let cell = self.cell_of(position);
        self.insert(cell, index);
    }

    /// Agent indices stored in one cell
    #[inline]
    pub fn get(&self, cell: usize) -> &[usize] {
        self.cells.get(cell).map_or(&[], |bucket| bucket.as_slice())
    }

    /// Iterate every agent index in the 3x3 block of cells centered on `cell`.
    ///
    /// Cells are visited column by column (x outer, z inner); cells falling
    /// outside the grid are skipped.
    pub fn block(&self, cell: usize) -> impl Iterator<Item = usize> + '_ {
        let valid = cell < self.cells.len();
        let width = self.width as i64;
        let height = self.height as i64;
        let cx = (cell % self.width) as i64;
        let cz = (cell / self.width) as i64;

        (-1..=1i64)
            .filter(move |_| valid)
            .flat_map(move |dx| (-1..=1i64).map(move |dz| (cx + dx, cz + dz)))
            .filter(move |&(x, z)| x >= 0 && z >= 0 && x < width && z < height)
            .flat_map(move |(x, z)| self.cells[(x + z * width) as usize].iter().copied())
    }

    /// Collect the 3x3 block around `cell`
    pub fn query_block(&self, cell: usize) -> Vec<usize> {
        self.block(cell).collect()
    }

    /// Number of indices currently stored
    #[inline]
    pub fn len(&self) -> usize {
        self.entries
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries == 0
    }

    #[inline]
    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// Grid dimensions in cells (width, height)
    #[inline]
    pub fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }
}
