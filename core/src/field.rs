use core::fmt;

use ndarray::Array2;
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

use crate::combin;
use crate::error::{CodecError, Result};
use crate::types::{mult, CellCount, Coord, Coord2, NeighborIter, NeighborIterExt, ToNdIndex};

/// Cell value reported for a mine; non-mine cells report their adjacent-mine
/// count (`0..=8`).
pub const MINE_VALUE: i8 = -2;

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoardConfig {
    pub size: Coord2,
    pub mines: CellCount,
}

impl BoardConfig {
    pub const fn new_unchecked(size: Coord2, mines: CellCount) -> Self {
        Self { size, mines }
    }

    pub fn new((size_x, size_y): Coord2, mines: CellCount) -> Self {
        let size_x = size_x.clamp(1, Coord::MAX);
        let size_y = size_y.clamp(1, Coord::MAX);
        let mines = mines.min(mult(size_x, size_y));
        Self::new_unchecked((size_x, size_y), mines)
    }

    pub const fn total_cells(&self) -> CellCount {
        mult(self.size.0, self.size.1)
    }
}

/// Immutable-by-convention mine placement with a memoized board number.
///
/// The board number is the combinatorial rank of the row-major mine bitmap
/// among all placements with the same dimensions and mine count; it is
/// computed on demand and the cache is cleared by any mutation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MineField {
    mine_mask: Array2<bool>,
    mine_count: CellCount,
    #[serde(skip)]
    board_number: Option<BigUint>,
}

impl PartialEq for MineField {
    fn eq(&self, other: &Self) -> bool {
        // the memoized board number is derived state, not identity
        self.mine_mask == other.mine_mask && self.mine_count == other.mine_count
    }
}

impl MineField {
    pub fn from_mine_mask(mine_mask: Array2<bool>) -> Self {
        let mine_count = mine_mask
            .iter()
            .filter(|&&is_mine| is_mine)
            .count()
            .try_into()
            .unwrap();
        Self {
            mine_mask,
            mine_count,
            board_number: None,
        }
    }

    pub fn from_mine_coords(size: Coord2, mine_coords: &[Coord2]) -> Result<Self> {
        let mut mine_mask: Array2<bool> = Array2::default(size.to_nd_index());

        for &coords in mine_coords {
            if coords.0 >= size.0 || coords.1 >= size.1 {
                return Err(CodecError::InvalidCoords);
            }
            let cell = &mut mine_mask[coords.to_nd_index()];
            if *cell {
                return Err(CodecError::DuplicateMine);
            }
            *cell = true;
        }

        Ok(Self::from_mine_mask(mine_mask))
    }

    /// Builds a field from a row-major mine bitmap.
    pub fn from_bits(size: Coord2, bits: &[bool]) -> Result<Self> {
        if bits.len() != mult(size.0, size.1) as usize {
            return Err(CodecError::InvalidBoardShape);
        }
        let mut mine_mask: Array2<bool> = Array2::default(size.to_nd_index());
        for y in 0..size.1 {
            for x in 0..size.0 {
                mine_mask[(x, y).to_nd_index()] =
                    bits[y as usize * size.0 as usize + x as usize];
            }
        }
        Ok(Self::from_mine_mask(mine_mask))
    }

    pub fn board_config(&self) -> BoardConfig {
        BoardConfig {
            size: self.size(),
            mines: self.mine_count,
        }
    }

    pub fn validate_coords(&self, coords: Coord2) -> Result<Coord2> {
        let size = self.size();
        if coords.0 < size.0 && coords.1 < size.1 {
            Ok(coords)
        } else {
            Err(CodecError::InvalidCoords)
        }
    }

    pub fn size(&self) -> Coord2 {
        let dim = self.mine_mask.dim();
        (dim.0.try_into().unwrap(), dim.1.try_into().unwrap())
    }

    pub fn width(&self) -> Coord {
        self.size().0
    }

    pub fn height(&self) -> Coord {
        self.size().1
    }

    pub fn safe_cell_count(&self) -> CellCount {
        self.total_cells() - self.mine_count
    }

    pub fn total_cells(&self) -> CellCount {
        self.mine_mask.len().try_into().unwrap()
    }

    pub fn mine_count(&self) -> CellCount {
        self.mine_count
    }

    pub fn contains_mine(&self, coords: Coord2) -> bool {
        self.mine_mask[coords.to_nd_index()]
    }

    pub fn adjacent_mine_count(&self, coords: Coord2) -> u8 {
        self.mine_mask
            .iter_neighbors(coords)
            .filter(|&pos| self.contains_mine(pos))
            .count()
            .try_into()
            .unwrap()
    }

    /// `MINE_VALUE` for a mine, the adjacent-mine count otherwise.
    pub fn cell_value(&self, coords: Coord2) -> i8 {
        if self.contains_mine(coords) {
            MINE_VALUE
        } else {
            self.adjacent_mine_count(coords) as i8
        }
    }

    /// Places or removes a mine, clearing the memoized board number.
    pub fn set_mine(&mut self, coords: Coord2, is_mine: bool) -> Result<()> {
        let coords = self.validate_coords(coords)?;
        let cell = &mut self.mine_mask[coords.to_nd_index()];
        if *cell != is_mine {
            *cell = is_mine;
            if is_mine {
                self.mine_count += 1;
            } else {
                self.mine_count -= 1;
            }
            self.board_number = None;
        }
        Ok(())
    }

    /// Row-major mine bitmap, index `y * width + x`.
    pub fn mask_bits(&self) -> Vec<bool> {
        let (width, height) = self.size();
        let mut bits = Vec::with_capacity(self.total_cells() as usize);
        for y in 0..height {
            for x in 0..width {
                bits.push(self.contains_mine((x, y)));
            }
        }
        bits
    }

    /// Combinatorial rank of the mine bitmap; memoized until a mutation.
    pub fn board_number(&mut self) -> &BigUint {
        if self.board_number.is_none() {
            self.board_number = Some(combin::rank(&self.mask_bits()));
        }
        self.board_number.as_ref().unwrap()
    }

    pub fn iter_neighbors(&self, coords: Coord2) -> NeighborIter {
        self.mine_mask.iter_neighbors(coords)
    }
}

impl fmt::Display for MineField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (width, height) = self.size();
        for y in 0..height {
            if y > 0 {
                f.write_str("\n")?;
            }
            for x in 0..width {
                let value = self.cell_value((x, y));
                if value < 0 {
                    f.write_str("X")?;
                } else {
                    write!(f, "{value}")?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_traits::Zero;

    #[test]
    fn mine_cells_report_negative_values() {
        let field = MineField::from_mine_coords((4, 3), &[(2, 1), (3, 2)]).unwrap();

        assert!(field.cell_value((2, 1)) < 0);
        assert!(field.cell_value((3, 2)) < 0);
        for y in 0..3 {
            for x in 0..4 {
                if (x, y) != (2, 1) && (x, y) != (3, 2) {
                    assert!(field.cell_value((x, y)) >= 0, "cell ({x},{y})");
                }
            }
        }
    }

    #[test]
    fn adjacency_counts_match_hand_computed_grid() {
        let field = MineField::from_mine_coords((4, 3), &[(2, 1), (3, 2)]).unwrap();
        assert_eq!(field.to_string(), "0111\n01X2\n012X");
    }

    #[test]
    fn parity_mined_grid_renders_canonical_literal() {
        let mines: Vec<Coord2> = (0..3)
            .flat_map(|y| (0..4).map(move |x| (x, y)))
            .filter(|&(x, y)| (x + y) % 2 == 0)
            .collect();
        let field = MineField::from_mine_coords((4, 3), &mines).unwrap();

        assert_eq!(field.to_string(), "X3X2\n3X4X\nX3X2");
    }

    #[test]
    fn duplicate_mine_coords_are_rejected() {
        let result = MineField::from_mine_coords((4, 3), &[(1, 1), (1, 1)]);
        assert_eq!(result.unwrap_err(), CodecError::DuplicateMine);
    }

    #[test]
    fn out_of_bounds_mine_coords_are_rejected() {
        let result = MineField::from_mine_coords((4, 3), &[(4, 0)]);
        assert_eq!(result.unwrap_err(), CodecError::InvalidCoords);
    }

    #[test]
    fn board_number_matches_rank_and_invalidates_on_mutation() {
        let mut field = MineField::from_mine_coords((3, 2), &[(1, 0), (0, 1)]).unwrap();
        let expected = combin::rank(&field.mask_bits());
        assert_eq!(field.board_number(), &expected);

        // lowest-rank placement packs mines into the lowest row-major cells
        field.set_mine((1, 0), false).unwrap();
        field.set_mine((0, 1), false).unwrap();
        field.set_mine((0, 0), true).unwrap();
        field.set_mine((1, 0), true).unwrap();
        assert!(field.board_number().is_zero());
    }

    #[test]
    fn from_bits_round_trips_mask_bits() {
        let field = MineField::from_mine_coords((3, 2), &[(0, 0), (2, 1)]).unwrap();
        let rebuilt = MineField::from_bits((3, 2), &field.mask_bits()).unwrap();
        assert_eq!(rebuilt, field);
    }
}
