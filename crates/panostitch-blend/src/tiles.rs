use panostitch_core::PixelRect;
use serde::{Deserialize, Serialize};

/// One cell of the tile grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tile {
    pub row: usize,
    pub col: usize,
    pub rect: PixelRect,
}

/// Regular grid of `tile_size` squares over the canvas; the last row and
/// column are clipped to the canvas edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TileGrid {
    pub canvas_width: usize,
    pub canvas_height: usize,
    pub tile_size: usize,
}

impl TileGrid {
    /// `tile_size` is clamped to at least one pixel and at most the longer
    /// canvas side, so one tile covers the whole canvas.
    pub fn new(canvas_width: usize, canvas_height: usize, tile_size: usize) -> Self {
        let longest = canvas_width.max(canvas_height).max(1);
        Self {
            canvas_width,
            canvas_height,
            tile_size: tile_size.clamp(1, longest),
        }
    }

    pub fn cols(&self) -> usize {
        self.canvas_width.div_ceil(self.tile_size)
    }

    pub fn rows(&self) -> usize {
        self.canvas_height.div_ceil(self.tile_size)
    }

    pub fn len(&self) -> usize {
        self.rows() * self.cols()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn tile(&self, row: usize, col: usize) -> Option<Tile> {
        if row >= self.rows() || col >= self.cols() {
            return None;
        }
        let x = col * self.tile_size;
        let y = row * self.tile_size;
        Some(Tile {
            row,
            col,
            rect: PixelRect::new(
                x,
                y,
                self.tile_size.min(self.canvas_width - x),
                self.tile_size.min(self.canvas_height - y),
            ),
        })
    }

    /// Tiles of one grid row, left to right.
    pub fn row(&self, row: usize) -> impl Iterator<Item = Tile> + '_ {
        (0..self.cols()).filter_map(move |col| self.tile(row, col))
    }

    /// All tiles in row-major order.
    pub fn tiles(&self) -> Vec<Tile> {
        (0..self.rows()).flat_map(|r| self.row(r)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_partition(w: usize, h: usize, size: usize) {
        let grid = TileGrid::new(w, h, size);
        let mut hits = vec![0u8; w * h];
        for t in grid.tiles() {
            assert!(!t.rect.is_empty());
            assert!(t.rect.right() <= w && t.rect.bottom() <= h);
            for y in t.rect.y..t.rect.bottom() {
                for x in t.rect.x..t.rect.right() {
                    hits[y * w + x] += 1;
                }
            }
        }
        assert!(hits.iter().all(|&c| c == 1), "{w}x{h} / {size}");
    }

    #[test]
    fn tiles_partition_the_canvas() {
        for (w, h, s) in [(1, 1, 1), (7, 5, 3), (64, 64, 16), (100, 37, 64), (13, 200, 7), (5, 5, 100)] {
            assert_partition(w, h, s);
        }
    }

    #[test]
    fn edge_tiles_are_clipped() {
        let grid = TileGrid::new(100, 37, 32);
        assert_eq!((grid.rows(), grid.cols()), (2, 4));
        let last = grid.tile(1, 3).expect("tile");
        assert_eq!(last.rect, PixelRect::new(96, 32, 4, 5));
        assert!(grid.tile(2, 0).is_none());
    }

    #[test]
    fn empty_canvas_has_no_tiles() {
        let grid = TileGrid::new(0, 10, 8);
        assert!(grid.is_empty());
        assert!(grid.tiles().is_empty());
        assert_eq!(TileGrid::new(4, 4, 0).tile_size, 1);
    }

    #[test]
    fn oversized_tile_is_clamped_to_the_canvas() {
        let grid = TileGrid::new(100, 37, usize::MAX);
        assert_eq!(grid.tile_size, 100);
        assert_eq!(grid.len(), 1);
        assert_eq!(grid.tile(0, 0).expect("tile").rect, PixelRect::new(0, 0, 100, 37));
    }
}
