use serde::{Deserialize, Serialize};

use crate::error::{CodecError, Result};
use crate::field::MineField;
use crate::types::{mult, CellCount, Coord, Coord2};

/// Player-visible state of one cell, independent of the mine bit.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CellState {
    Closed,
    Opened,
    Flagged,
}

impl CellState {
    pub const fn is_closed(self) -> bool {
        matches!(self, Self::Closed)
    }

    pub const fn is_opened(self) -> bool {
        matches!(self, Self::Opened)
    }

    pub const fn is_flagged(self) -> bool {
        matches!(self, Self::Flagged)
    }
}

impl Default for CellState {
    fn default() -> Self {
        Self::Closed
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardCell {
    pub is_mine: bool,
    pub state: CellState,
}

/// The plaintext payload the codec serializes: dimensions, optional elapsed
/// time, and every cell's mine bit and open state, row-major.
///
/// Never partially valid: all cells must be present before encoding.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoardInfo {
    pub width: Coord,
    pub height: Coord,
    pub elapsed_time_ms: Option<u64>,
    pub cells: Vec<BoardCell>,
}

impl BoardInfo {
    pub fn from_field(
        field: &MineField,
        states: &[CellState],
        elapsed_time_ms: Option<u64>,
    ) -> Result<Self> {
        if states.len() != field.total_cells() as usize {
            return Err(CodecError::InvalidBoardShape);
        }
        let (width, height) = field.size();
        let mut cells = Vec::with_capacity(states.len());
        for y in 0..height {
            for x in 0..width {
                cells.push(BoardCell {
                    is_mine: field.contains_mine((x, y)),
                    state: states[y as usize * width as usize + x as usize],
                });
            }
        }
        Ok(Self {
            width,
            height,
            elapsed_time_ms,
            cells,
        })
    }

    /// All-closed board over the given mine placement.
    pub fn untouched(field: &MineField) -> Self {
        let (width, height) = field.size();
        let states = vec![CellState::Closed; field.total_cells() as usize];
        Self::from_field(field, &states, None).expect("state count matches field")
    }

    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(CodecError::InvalidDimensions);
        }
        if self.cells.len() != mult(self.width, self.height) as usize {
            return Err(CodecError::InvalidBoardShape);
        }
        Ok(())
    }

    pub fn size(&self) -> Coord2 {
        (self.width, self.height)
    }

    pub fn total_cells(&self) -> CellCount {
        mult(self.width, self.height)
    }

    pub fn mine_count(&self) -> CellCount {
        self.cells.iter().filter(|cell| cell.is_mine).count() as CellCount
    }

    pub fn is_untouched(&self) -> bool {
        self.cells.iter().all(|cell| cell.state.is_closed())
    }

    pub fn cell(&self, (x, y): Coord2) -> BoardCell {
        self.cells[y as usize * self.width as usize + x as usize]
    }

    /// The mine placement alone, for adjacency and flood queries.
    pub fn to_mine_field(&self) -> Result<MineField> {
        self.validate()?;
        let bits: Vec<bool> = self.cells.iter().map(|cell| cell.is_mine).collect();
        MineField::from_bits((self.width, self.height), &bits)
    }
}

/// Running aggregates over the cells consumed so far, reset once per
/// encode/decode pass and updated per cell in row-major order.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Tally {
    pub cells: CellCount,
    pub mines: CellCount,
    pub opened: CellCount,
    pub open_mines: CellCount,
    pub flags: CellCount,
    pub wrong_flags: CellCount,
    pub closed_in_open_group: CellCount,
}

impl Tally {
    pub fn record(&mut self, is_mine: bool, state: CellState, in_open_group: bool) {
        self.cells += 1;
        if is_mine {
            self.mines += 1;
        }
        match state {
            CellState::Opened => {
                self.opened += 1;
                if is_mine {
                    self.open_mines += 1;
                }
            }
            CellState::Flagged => {
                self.flags += 1;
                if !is_mine {
                    self.wrong_flags += 1;
                }
            }
            CellState::Closed => {}
        }
        if in_open_group && !state.is_opened() {
            self.closed_in_open_group += 1;
        }
    }

    pub fn safe_cells(&self) -> CellCount {
        self.cells - self.mines
    }

    pub fn flagged_mines(&self) -> CellCount {
        self.flags - self.wrong_flags
    }

    pub fn safe_opened(&self) -> CellCount {
        self.opened - self.open_mines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_mine_board() -> BoardInfo {
        let field = MineField::from_mine_coords((3, 2), &[(0, 0), (2, 1)]).unwrap();
        BoardInfo::untouched(&field)
    }

    #[test]
    fn validate_rejects_cell_count_mismatch() {
        let mut board = two_mine_board();
        board.cells.pop();
        assert_eq!(board.validate(), Err(CodecError::InvalidBoardShape));
    }

    #[test]
    fn validate_rejects_zero_dimensions() {
        let board = BoardInfo {
            width: 0,
            height: 3,
            elapsed_time_ms: None,
            cells: Vec::new(),
        };
        assert_eq!(board.validate(), Err(CodecError::InvalidDimensions));
    }

    #[test]
    fn mine_field_round_trips_through_board_info() {
        let field = MineField::from_mine_coords((3, 2), &[(0, 0), (2, 1)]).unwrap();
        let board = BoardInfo::untouched(&field);
        assert_eq!(board.mine_count(), 2);
        assert_eq!(board.to_mine_field().unwrap(), field);
    }

    #[test]
    fn board_info_survives_json() {
        let field = MineField::from_mine_coords((3, 2), &[(0, 0)]).unwrap();
        let mut board = BoardInfo::untouched(&field);
        board.elapsed_time_ms = Some(1500);
        board.cells[1].state = CellState::Opened;

        let json = serde_json::to_string(&board).unwrap();
        let back: BoardInfo = serde_json::from_str(&json).unwrap();
        assert_eq!(back, board);
    }

    #[test]
    fn tally_tracks_categories_incrementally() {
        let mut tally = Tally::default();
        tally.record(false, CellState::Opened, false);
        tally.record(true, CellState::Flagged, false);
        tally.record(false, CellState::Flagged, false);
        tally.record(true, CellState::Opened, false);
        tally.record(false, CellState::Closed, true);

        assert_eq!(tally.cells, 5);
        assert_eq!(tally.mines, 2);
        assert_eq!(tally.opened, 2);
        assert_eq!(tally.open_mines, 1);
        assert_eq!(tally.flags, 2);
        assert_eq!(tally.wrong_flags, 1);
        assert_eq!(tally.closed_in_open_group, 1);
        assert_eq!(tally.safe_cells(), 3);
        assert_eq!(tally.flagged_mines(), 1);
        assert_eq!(tally.safe_opened(), 1);
    }
}
