//! Occupancy grid used for obstacle-aware routing
//!
//! Cells are keyed by their absolute `(row, col)` coordinates, both multiples
//! of the grid scale. The grid is rebuilt from scratch whenever the layer set
//! changes; it is never patched in place.

use std::collections::BTreeMap;

use log::debug;

use super::error::RoutingError;
use super::types::{floor_to_scale, round_to_scale, BoundingBox, Direction, Layer, Point};

/// A single grid cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GridCell {
    pub row: i64,
    pub col: i64,
    pub walkable: bool,
}

impl GridCell {
    /// Top-left position of the cell in root coordinates
    pub fn position(&self) -> Point {
        Point::new(self.col as f64, self.row as f64)
    }

    /// Manhattan distance between two cells in coordinate units
    pub fn manhattan(&self, other: &GridCell) -> i64 {
        (self.row - other.row).abs() + (self.col - other.col).abs()
    }

    pub fn key(&self) -> (i64, i64) {
        (self.row, self.col)
    }
}

/// Sparse occupancy map over a rectangular area
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    scale: i64,
    area: BoundingBox,
    cells: BTreeMap<(i64, i64), GridCell>,
}

impl Grid {
    /// Create an all-walkable grid covering `area`
    ///
    /// Rows start at the area's top snapped down to the scale and stop before
    /// the bottom edge; columns likewise.
    pub fn new(area: BoundingBox, scale: f64) -> Result<Self, RoutingError> {
        if !scale.is_finite() || scale < 1.0 || scale.fract() != 0.0 {
            return Err(RoutingError::configuration(format!(
                "grid scale must be a positive whole number, got {scale}"
            )));
        }
        if area.width < 0.0 || area.height < 0.0 {
            return Err(RoutingError::configuration("grid area has a negative size"));
        }

        let step = scale as i64;
        let mut cells = BTreeMap::new();
        let first_row = floor_to_scale(area.y, scale) as i64;
        let first_col = floor_to_scale(area.x, scale) as i64;
        let mut row = first_row;
        while (row as f64) < area.bottom() {
            let mut col = first_col;
            while (col as f64) < area.right() {
                cells.insert(
                    (row, col),
                    GridCell {
                        row,
                        col,
                        walkable: true,
                    },
                );
                col += step;
            }
            row += step;
        }

        Ok(Self {
            scale: step,
            area,
            cells,
        })
    }

    pub fn scale(&self) -> i64 {
        self.scale
    }

    /// The area this grid was built for
    pub fn area(&self) -> BoundingBox {
        self.area
    }

    /// Number of cells
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Look up a cell, reporting coordinates outside the built range
    pub fn cell(&self, row: i64, col: i64) -> Result<&GridCell, RoutingError> {
        self.cells
            .get(&(row, col))
            .ok_or(RoutingError::grid_index(row, col))
    }

    /// Whether the cell exists and is walkable
    pub fn is_walkable(&self, row: i64, col: i64) -> bool {
        self.cells.get(&(row, col)).is_some_and(|c| c.walkable)
    }

    /// The cell a free point snaps to
    pub fn cell_at(&self, point: Point) -> Result<GridCell, RoutingError> {
        let scale = self.scale as f64;
        let row = round_to_scale(point.y, scale) as i64;
        let col = round_to_scale(point.x, scale) as i64;
        self.cell(row, col).copied()
    }

    /// Walkable orthogonal neighbours, in `Direction::ALL` order
    pub fn neighbors(&self, cell: &GridCell) -> impl Iterator<Item = (Direction, GridCell)> + '_ {
        let (row, col) = cell.key();
        let step = self.scale;
        Direction::ALL.into_iter().filter_map(move |direction| {
            let (dr, dc) = match direction {
                Direction::Top => (-step, 0),
                Direction::Right => (0, step),
                Direction::Bottom => (step, 0),
                Direction::Left => (0, -step),
            };
            self.cells
                .get(&(row + dr, col + dc))
                .filter(|c| c.walkable)
                .map(|c| (direction, *c))
        })
    }

    /// Iterate over all cells in row-major order
    pub fn cells(&self) -> impl Iterator<Item = &GridCell> {
        self.cells.values()
    }

    /// Number of non-walkable cells
    pub fn blocked_count(&self) -> usize {
        self.cells.values().filter(|c| !c.walkable).count()
    }

    /// Mark every cell covered by a rectangle as non-walkable
    ///
    /// Left/top snap down to the scale, right/bottom snap to the nearest
    /// multiple; the resulting ranges are inclusive.
    pub fn block(&mut self, bounds: BoundingBox) -> Result<(), RoutingError> {
        let scale = self.scale as f64;
        let left = floor_to_scale(bounds.x, scale) as i64;
        let top = floor_to_scale(bounds.y, scale) as i64;
        let right = round_to_scale(bounds.right(), scale) as i64;
        let bottom = round_to_scale(bounds.bottom(), scale) as i64;

        let mut row = top;
        while row <= bottom {
            let mut col = left;
            while col <= right {
                let cell = self
                    .cells
                    .get_mut(&(row, col))
                    .ok_or(RoutingError::grid_index(row, col))?;
                cell.walkable = false;
                col += self.scale;
            }
            row += self.scale;
        }
        Ok(())
    }
}

/// Build a grid of `width x height` at the origin and block every layer
pub fn rebuild_grid<'a>(
    layers: impl IntoIterator<Item = &'a Layer>,
    width: f64,
    height: f64,
    scale: f64,
) -> Result<Grid, RoutingError> {
    rebuild_grid_in(layers, BoundingBox::new(0.0, 0.0, width, height), scale)
}

/// Build a grid covering `area` and block every layer
pub fn rebuild_grid_in<'a>(
    layers: impl IntoIterator<Item = &'a Layer>,
    area: BoundingBox,
    scale: f64,
) -> Result<Grid, RoutingError> {
    let mut grid = Grid::new(area, scale)?;
    let mut count = 0;
    for layer in layers {
        grid.block(layer.bounds())?;
        count += 1;
    }
    debug!(
        "rebuilt grid: {} cells, {} blocked by {} layers",
        grid.len(),
        grid.blocked_count(),
        count
    );
    Ok(grid)
}
