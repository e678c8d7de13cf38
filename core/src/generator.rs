use ndarray::Array2;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::field::{BoardConfig, MineField};
use crate::types::{Coord2, NeighborIterExt, ToNdIndex};

pub trait FieldGenerator {
    fn generate(self, config: BoardConfig) -> MineField;
}

/// How much of the starting cell's surroundings is kept mine-free.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum StartReserve {
    Random,
    Safe,
    ZeroOpening,
}

/// Generation strategy that can optionally keep the starting cell safe or
/// force a zero opening there, but other than that is purely random.
///
/// The seed is the pluggable bit source: the same seed reproduces the same
/// field, which is what tests substitute for true randomness.
#[derive(Clone, Debug, PartialEq)]
pub struct RandomFieldGenerator {
    seed: u64,
    start: Coord2,
    reserve: StartReserve,
}

impl RandomFieldGenerator {
    pub fn new(seed: u64, start: Coord2, reserve: StartReserve) -> Self {
        Self {
            seed,
            start,
            reserve,
        }
    }
}

impl FieldGenerator for RandomFieldGenerator {
    fn generate(self, config: BoardConfig) -> MineField {
        use StartReserve::*;

        let total_cells = config.total_cells();

        // optimize for full boards
        if config.mines >= total_cells {
            if config.mines > total_cells {
                log::warn!(
                    "Mine field already full, generated anyway, requested {} but only fits {}",
                    config.mines,
                    total_cells
                );
            }
            return MineField::from_mine_mask(Array2::from_elem(
                config.size.to_nd_index(),
                true,
            ));
        }

        let actual_reserve = match self.reserve {
            Random => Random,
            Safe | ZeroOpening if config.mines + 1 > total_cells => {
                log::warn!("Cannot keep start cell safe, fallback to random");
                Random
            }
            Safe => Safe,
            ZeroOpening if config.mines + 9 > total_cells => {
                log::warn!("Cannot make start cell zero, fallback to safe");
                Safe
            }
            ZeroOpening => ZeroOpening,
        };

        let mut mines: Array2<bool> = Array2::default(config.size.to_nd_index());
        let mut free_cells = match actual_reserve {
            Random => total_cells,
            Safe => {
                mines[self.start.to_nd_index()] = true;
                total_cells - 1
            }
            ZeroOpening => {
                mines[self.start.to_nd_index()] = true;
                let mut reserved = 1;
                let neighbors: Vec<_> = mines.iter_neighbors(self.start).collect();
                for coords in neighbors {
                    mines[coords.to_nd_index()] = true;
                    reserved += 1;
                }
                total_cells - reserved
            }
        };

        let mut mines_placed = 0;
        let mut rng = SmallRng::seed_from_u64(self.seed);
        {
            let cells = mines.as_slice_mut().expect("layout should be standard");
            while mines_placed < config.mines && free_cells > 0 {
                let mut place = rng.random_range(0..free_cells) as usize;
                for (i, cell) in cells.iter_mut().enumerate() {
                    if *cell {
                        place += 1;
                    }
                    if i == place {
                        *cell = true;
                        mines_placed += 1;
                        free_cells -= 1;
                        break;
                    }
                }
            }
        }

        // undo to make the reserved cells safe
        match actual_reserve {
            Random => {}
            Safe => {
                mines[self.start.to_nd_index()] = false;
            }
            ZeroOpening => {
                mines[self.start.to_nd_index()] = false;
                let neighbors: Vec<_> = mines.iter_neighbors(self.start).collect();
                for coords in neighbors {
                    mines[coords.to_nd_index()] = false;
                }
            }
        }

        // double check mine count
        let field = MineField::from_mine_mask(mines);
        if field.mine_count() != config.mines {
            log::warn!(
                "Generated mine field count mismatch, actual: {}, requested: {}",
                field.mine_count(),
                config.mines
            );
        }
        field
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_reproduces_the_same_field() {
        let config = BoardConfig::new((16, 16), 40);
        let a = RandomFieldGenerator::new(99, (8, 8), StartReserve::Random).generate(config);
        let b = RandomFieldGenerator::new(99, (8, 8), StartReserve::Random).generate(config);
        assert_eq!(a, b);
        assert_eq!(a.mine_count(), 40);
    }

    #[test]
    fn different_seeds_disagree() {
        let config = BoardConfig::new((16, 16), 40);
        let a = RandomFieldGenerator::new(1, (8, 8), StartReserve::Random).generate(config);
        let b = RandomFieldGenerator::new(2, (8, 8), StartReserve::Random).generate(config);
        assert_ne!(a, b);
    }

    #[test]
    fn safe_reserve_keeps_the_start_cell_empty() {
        let config = BoardConfig::new((9, 9), 70);
        for seed in 0..20 {
            let field =
                RandomFieldGenerator::new(seed, (4, 4), StartReserve::Safe).generate(config);
            assert!(!field.contains_mine((4, 4)), "seed {seed}");
            assert_eq!(field.mine_count(), 70);
        }
    }

    #[test]
    fn zero_opening_reserve_clears_the_whole_neighborhood() {
        let config = BoardConfig::new((9, 9), 60);
        for seed in 0..20 {
            let field = RandomFieldGenerator::new(seed, (4, 4), StartReserve::ZeroOpening)
                .generate(config);
            assert_eq!(field.cell_value((4, 4)), 0, "seed {seed}");
            assert_eq!(field.mine_count(), 60);
        }
    }

    #[test]
    fn overfull_zero_opening_falls_back_to_safe() {
        // 80 mines on 81 cells cannot also spare a 3x3 opening
        let config = BoardConfig::new((9, 9), 80);
        let field =
            RandomFieldGenerator::new(7, (4, 4), StartReserve::ZeroOpening).generate(config);
        assert_eq!(field.mine_count(), 80);
        assert!(!field.contains_mine((4, 4)));
    }

    #[test]
    fn full_board_generates_all_mines() {
        let config = BoardConfig::new_unchecked((4, 4), 16);
        let field = RandomFieldGenerator::new(0, (0, 0), StartReserve::Random).generate(config);
        assert_eq!(field.mine_count(), 16);
    }
}
