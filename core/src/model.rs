use std::collections::VecDeque;

use ndarray::Array2;
use smallvec::SmallVec;

use crate::board::{CellState, Tally};
use crate::field::MineField;
use crate::types::{Coord2, ToNdIndex};

/// Probabilities handed to the arithmetic coder stay inside
/// `[FLOOR, 1 - FLOOR]` so the actually-present state is never impossible.
const PROBABILITY_FLOOR: f64 = 1e-4;

/// Curve steepness for the neighbor-agreement lift/suppression exponent.
/// A fixed constant of the wire format: changing it desynchronizes streams.
const NEIGHBOR_CURVE_GAIN: f64 = 6.0;

/// Flood reachability from already-consumed opened cells through zero-valued
/// cells: the set a player's flood fill would have auto-revealed.
#[derive(Clone, Debug)]
pub struct OpenGroupTracker {
    reachable: Array2<bool>,
    expanded: Array2<bool>,
}

impl OpenGroupTracker {
    pub fn new(field: &MineField) -> Self {
        let dim = (field.width() as usize, field.height() as usize);
        Self {
            reachable: Array2::default(dim),
            expanded: Array2::default(dim),
        }
    }

    pub fn is_reachable(&self, coords: Coord2) -> bool {
        self.reachable[coords.to_nd_index()]
    }

    /// Accounts for a consumed cell; an opened zero cell spreads
    /// reachability through the zero region, including zero cells whose own
    /// state is still unknown (their openness is implied).
    pub fn consume(&mut self, field: &MineField, coords: Coord2, state: CellState) {
        if state.is_opened() && field.cell_value(coords) == 0 {
            self.spread(field, coords);
        }
    }

    fn spread(&mut self, field: &MineField, seed: Coord2) {
        let mut to_visit = VecDeque::from([seed]);
        while let Some(coords) = to_visit.pop_front() {
            if self.expanded[coords.to_nd_index()] {
                continue;
            }
            self.expanded[coords.to_nd_index()] = true;

            for neighbor in field.iter_neighbors(coords) {
                self.reachable[neighbor.to_nd_index()] = true;
                if field.cell_value(neighbor) == 0 {
                    to_visit.push_back(neighbor);
                }
            }
        }
        log::trace!("open group spread from {seed:?}");
    }
}

/// Adaptive model producing `(p_open, p_flag)` for each cell from the
/// already-consumed prefix.
///
/// Encoder and decoder both drive this with identical state in identical
/// row-major order; the formulas below are fixed constants of the format,
/// and any asymmetry between the two sides desynchronizes the stream.
#[derive(Debug)]
pub struct CellModel {
    tally: Tally,
    groups: OpenGroupTracker,
}

impl CellModel {
    pub fn new(field: &MineField) -> Self {
        Self {
            tally: Tally::default(),
            groups: OpenGroupTracker::new(field),
        }
    }

    pub fn tally(&self) -> &Tally {
        &self.tally
    }

    /// `(p_open, p_flag)` for the cell at `coords`, whose state is not yet
    /// consumed. `states` holds the board's states with only the row-major
    /// prefix before `coords` meaningful.
    pub fn probabilities(
        &self,
        field: &MineField,
        states: &[CellState],
        coords: Coord2,
    ) -> (f64, f64) {
        let t = &self.tally;
        let is_mine = field.contains_mine(coords);
        let in_group = self.groups.is_reachable(coords);

        let (mut p_open, mut p_flag);
        if in_group {
            // implied-open: a closed state here means the player abandoned a
            // revealed region, which the tally confirms is rare
            let misses = f64::from(t.closed_in_open_group);
            let base = f64::from(t.opened);
            p_open = 1.0 - (misses + 0.5) / (base + misses + 1.0);
            p_flag = (1.0 - p_open) * 0.25;
        } else if is_mine {
            let mines = f64::from(t.mines);
            p_flag = (f64::from(t.flagged_mines()) + 1.0) / (mines + 2.0);
            p_open = (f64::from(t.open_mines) + 0.5) / (mines + 2.0);
        } else {
            let safe = f64::from(t.safe_cells());
            p_open = (f64::from(t.safe_opened()) + 1.0) / (safe + 2.0);
            p_flag = (f64::from(t.wrong_flags) + 0.5) / (safe + 2.0);
        }

        if !in_group {
            let weight = self.neighbor_open_weight(field, states, coords);
            let distance = weight - 0.5;
            let p_act = p_open + p_flag;
            if distance != 0.0 && p_act > 0.0 {
                let lifted = if distance > 0.0 {
                    1.0 - (1.0 - p_act).powf(1.0 + NEIGHBOR_CURVE_GAIN * distance)
                } else {
                    p_act.powf(1.0 - NEIGHBOR_CURVE_GAIN * distance)
                };
                let scale = lifted / p_act;
                p_open *= scale;
                p_flag *= scale;
            }
        }

        let p_open = p_open.clamp(PROBABILITY_FLOOR, 1.0 - 2.0 * PROBABILITY_FLOOR);
        let flag_cap = (1.0 - PROBABILITY_FLOOR - p_open).max(PROBABILITY_FLOOR);
        let p_flag = p_flag.clamp(PROBABILITY_FLOOR, flag_cap);
        (p_open, p_flag)
    }

    /// Agreement of the already-consumed left and up neighbors with "this
    /// area is being played", in `[0, 1]`, 0.5 when nothing is known.
    ///
    /// `flag_ratio` captures the player's style: near 1 every mine gets a
    /// flag, so a closed unflagged mine signals an untouched area; near 0
    /// flags mean nothing and a closed mine is discounted to neutral.
    fn neighbor_open_weight(
        &self,
        field: &MineField,
        states: &[CellState],
        coords: Coord2,
    ) -> f64 {
        let t = &self.tally;
        let flag_ratio = (f64::from(t.flagged_mines()) + 1.0) / (f64::from(t.mines) + 2.0);

        let (x, y) = coords;
        let mut earlier: SmallVec<[Coord2; 2]> = SmallVec::new();
        if x > 0 {
            earlier.push((x - 1, y));
        }
        if y > 0 {
            earlier.push((x, y - 1));
        }
        if earlier.is_empty() {
            return 0.5;
        }

        let width = field.width() as usize;
        let mut total = 0.0;
        for (nx, ny) in earlier.iter().copied() {
            let state = states[ny as usize * width + nx as usize];
            total += match state {
                CellState::Opened => 1.0,
                CellState::Flagged => 0.5 + 0.5 * flag_ratio,
                CellState::Closed if field.contains_mine((nx, ny)) => 0.5 * (1.0 - flag_ratio),
                CellState::Closed => 0.0,
            };
        }
        total / earlier.len() as f64
    }

    /// Folds a consumed cell into the tally and the open-group tracker.
    pub fn consume(&mut self, field: &MineField, coords: Coord2, state: CellState) {
        let in_group = self.groups.is_reachable(coords);
        self.tally
            .record(field.contains_mine(coords), state, in_group);
        self.groups.consume(field, coords, state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opened_zero_cell_spreads_through_zero_region() {
        // 5x1 strip, mine at the far end: values 0 0 0 1 X
        let field = MineField::from_mine_coords((5, 1), &[(4, 0)]).unwrap();
        let mut tracker = OpenGroupTracker::new(&field);

        tracker.consume(&field, (0, 0), CellState::Opened);

        for x in 0..4 {
            assert!(tracker.is_reachable((x, 0)), "x={x}");
        }
        assert!(!tracker.is_reachable((4, 0)));
    }

    #[test]
    fn opened_nonzero_cell_spreads_nothing() {
        let field = MineField::from_mine_coords((5, 1), &[(4, 0)]).unwrap();
        let mut tracker = OpenGroupTracker::new(&field);

        tracker.consume(&field, (3, 0), CellState::Opened);

        for x in 0..5 {
            assert!(!tracker.is_reachable((x, 0)), "x={x}");
        }
    }

    #[test]
    fn opened_neighbors_lift_the_open_probability() {
        let field = MineField::from_mine_coords((4, 4), &[(3, 3)]).unwrap();
        let mut states = vec![CellState::Closed; 16];

        let model = CellModel::new(&field);
        let (p_cold, _) = model.probabilities(&field, &states, (1, 1));

        states[4] = CellState::Opened; // left neighbor (0, 1)
        states[1] = CellState::Opened; // up neighbor (1, 0)
        let (p_warm, _) = model.probabilities(&field, &states, (1, 1));

        assert!(p_warm > p_cold, "{p_warm} vs {p_cold}");
    }

    #[test]
    fn in_group_cells_are_near_certain_to_be_open() {
        let field = MineField::from_mine_coords((5, 1), &[(4, 0)]).unwrap();
        let mut model = CellModel::new(&field);
        let states = vec![CellState::Opened; 5];

        model.consume(&field, (0, 0), CellState::Opened);
        let (p_open, p_flag) = model.probabilities(&field, &states, (1, 0));

        assert!(p_open > 0.6, "{p_open}");
        assert!(p_open + p_flag < 1.0);
    }

    #[test]
    fn probabilities_always_leave_room_for_every_state() {
        let field = MineField::from_mine_coords((3, 3), &[(1, 1)]).unwrap();
        let mut model = CellModel::new(&field);
        let mut states = vec![CellState::Closed; 9];

        for y in 0..3u16 {
            for x in 0..3u16 {
                let (p_open, p_flag) = model.probabilities(&field, &states, (x, y));
                assert!(p_open >= PROBABILITY_FLOOR);
                assert!(p_flag >= PROBABILITY_FLOOR);
                assert!(p_open + p_flag < 1.0);
                let state = if (x + y) % 2 == 0 {
                    CellState::Opened
                } else {
                    CellState::Flagged
                };
                states[y as usize * 3 + x as usize] = state;
                model.consume(&field, (x, y), state);
            }
        }
    }
}
