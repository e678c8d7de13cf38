use num_bigint::BigUint;
use num_traits::ToPrimitive;
use serde::{Deserialize, Serialize};

use crate::arith::{ArithDecoder, ArithEncoder};
use crate::bits::{BitBuffer, BitReader, BitWriter};
use crate::board::{BoardInfo, CellState};
use crate::coders::{unzigzag, zigzag, BitExtendCoder, CountCoder, IntCoder, NumberCoder};
use crate::error::{CodecError, Result};
use crate::field::MineField;
use crate::model::CellModel;
use crate::types::{mult, CellCount, Coord};
use crate::wire;

/// The canonical difficulty tiers `(width, height, mines)`, selectable with
/// the two-bit dimension fast path.
const CANONICAL_SIZES: [(Coord, Coord, CellCount); 3] = [(9, 9, 10), (16, 16, 40), (30, 16, 99)];

pub const MAX_DIMENSION: Coord = 4096;
pub const MAX_CELLS: CellCount = 1 << 20;

/// Elapsed time travels in 500 ms units.
const ELAPSED_UNIT_MS: u64 = 500;

fn selector_coder() -> NumberCoder {
    NumberCoder::new(0, 4)
}

fn dimension_coder() -> BitExtendCoder {
    BitExtendCoder::new(4, 0.5)
}

fn elapsed_coder() -> BitExtendCoder {
    BitExtendCoder::new(7, 0.5)
}

fn mine_delta_coder() -> BitExtendCoder {
    BitExtendCoder::new(5, 0.5)
}

/// Expected mine count for a board size: the canonical count on a canonical
/// tier, expert density (99/480 cells) otherwise. The mine count travels as
/// a zig-zag delta from this value.
fn expected_mines(width: Coord, height: Coord) -> i64 {
    for (w, h, mines) in CANONICAL_SIZES {
        if (w, h) == (width, height) {
            return mines as i64;
        }
    }
    mult(width, height) as i64 * 99 / 480
}

/// Per-section bit usage of one encoded board.
///
/// Arithmetic coding defers carries across section boundaries, so the split
/// is a close diagnostic, not an exact accounting; `total_bits` is exact.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodecStats {
    pub dimension_bits: usize,
    pub mine_bits: usize,
    pub cell_bits: usize,
    pub total_bits: usize,
    pub board_id_chars: usize,
}

/// Serializes a board snapshot into a URL-safe board id.
///
/// Wire layout: one raw "touched" bit, then a single arithmetic stream with
/// dimensions, optional elapsed time, mine count delta, the mine bitmap, and
/// (only when touched) every cell's open state. The stream is closed without
/// termination; [`decode`] runs padded and stops on the cell count.
pub fn encode(board: &BoardInfo) -> Result<String> {
    Ok(encode_with_stats(board)?.0)
}

/// Diagnostic companion of [`encode`].
pub fn stats(board: &BoardInfo) -> Result<CodecStats> {
    Ok(encode_with_stats(board)?.1)
}

fn encode_with_stats(board: &BoardInfo) -> Result<(String, CodecStats)> {
    board.validate()?;
    validate_dimensions(board.width as u64, board.height as u64)?;
    let field = board.to_mine_field()?;
    let touched = !board.is_untouched();

    let mut buf = BitBuffer::new();
    buf.append_bit(touched);

    let mut enc = ArithEncoder::new(BitWriter::from_buffer(buf));
    encode_header(&mut enc, board);
    let header_end = enc.position();
    encode_mines(&mut enc, board);
    let mines_end = enc.position();
    if touched {
        encode_cells(&mut enc, board, &field);
    }
    enc.close(false);

    let mut buf = enc.into_inner();
    buf.trim();
    let total_bits = buf.len();
    let id = wire::to_board_id(&buf);
    log::debug!(
        "encoded {}x{} board into {} bits ({} chars)",
        board.width,
        board.height,
        total_bits,
        id.len()
    );

    let stats = CodecStats {
        dimension_bits: header_end - 1,
        mine_bits: mines_end - header_end,
        cell_bits: if touched {
            total_bits.saturating_sub(mines_end) + 1
        } else {
            1
        },
        total_bits,
        board_id_chars: id.len(),
    };
    Ok((id, stats))
}

/// Reconstructs the board a board id was encoded from.
pub fn decode(id: &str) -> Result<BoardInfo> {
    let buf = wire::from_board_id(id)?;
    let touched = buf.get_bit(0);
    let mut dec = ArithDecoder::new(BitReader::padded(&buf).starting_at(1));

    let ((width, height), elapsed_time_ms) = decode_header(&mut dec)?;
    let field = decode_mines(&mut dec, (width, height))?;
    let states = if touched {
        decode_cells(&mut dec, &field)?
    } else {
        vec![CellState::Closed; field.total_cells() as usize]
    };

    BoardInfo::from_field(&field, &states, elapsed_time_ms)
}

fn validate_dimensions(width: u64, height: u64) -> Result<()> {
    if width == 0
        || height == 0
        || width > MAX_DIMENSION as u64
        || height > MAX_DIMENSION as u64
        || width * height > MAX_CELLS as u64
    {
        return Err(CodecError::InvalidDimensions);
    }
    Ok(())
}

fn encode_header(enc: &mut ArithEncoder, board: &BoardInfo) {
    let canonical = CANONICAL_SIZES
        .iter()
        .position(|&(w, h, _)| (w, h) == (board.width, board.height));
    match canonical {
        Some(index) => selector_coder().encode_int(enc, index as u64),
        None => {
            selector_coder().encode_int(enc, CANONICAL_SIZES.len() as u64);
            dimension_coder().encode_int(enc, board.width as u64 - 1);
            dimension_coder().encode_int(enc, board.height as u64 - 1);
        }
    }

    match board.elapsed_time_ms {
        Some(ms) => {
            enc.encode_bit(0.5, true);
            elapsed_coder().encode_big(enc, &BigUint::from(ms / ELAPSED_UNIT_MS));
        }
        None => enc.encode_bit(0.5, false),
    }
}

fn decode_header(dec: &mut ArithDecoder<'_>) -> Result<((Coord, Coord), Option<u64>)> {
    let selector = selector_coder().decode_int(dec)?;
    let (width, height) = if (selector as usize) < CANONICAL_SIZES.len() {
        let (w, h, _) = CANONICAL_SIZES[selector as usize];
        (w, h)
    } else {
        let width = dimension_coder()
            .decode_int(dec)?
            .checked_add(1)
            .ok_or(CodecError::ValueOutOfRange)?;
        let height = dimension_coder()
            .decode_int(dec)?
            .checked_add(1)
            .ok_or(CodecError::ValueOutOfRange)?;
        validate_dimensions(width, height)?;
        (width as Coord, height as Coord)
    };

    let elapsed_time_ms = if dec.decode_bit(0.5)? {
        let units = elapsed_coder()
            .decode_big(dec)?
            .to_u64()
            .ok_or(CodecError::ValueOutOfRange)?;
        Some(
            units
                .checked_mul(ELAPSED_UNIT_MS)
                .ok_or(CodecError::ValueOutOfRange)?,
        )
    } else {
        None
    };

    Ok(((width, height), elapsed_time_ms))
}

fn encode_mines(enc: &mut ArithEncoder, board: &BoardInfo) {
    let cells = board.total_cells() as u64;
    let mines = board.mine_count() as u64;
    let delta = mines as i64 - expected_mines(board.width, board.height);
    mine_delta_coder().encode_int(enc, zigzag(delta));

    let mut population = CountCoder::new(cells, cells - mines);
    for cell in &board.cells {
        population.encode_next(enc, cell.is_mine);
    }
}

fn decode_mines(dec: &mut ArithDecoder<'_>, (width, height): (Coord, Coord)) -> Result<MineField> {
    let cells = mult(width, height) as u64;
    let delta = unzigzag(mine_delta_coder().decode_int(dec)?);
    let mines = expected_mines(width, height)
        .checked_add(delta)
        .ok_or(CodecError::ValueOutOfRange)?;
    if mines < 0 {
        return Err(CodecError::ValueOutOfRange);
    }
    if mines as u64 > cells {
        return Err(CodecError::TooManyMines);
    }

    let mut population = CountCoder::new(cells, cells - mines as u64);
    let mut bits = Vec::with_capacity(cells as usize);
    for _ in 0..cells {
        bits.push(population.decode_next(dec)?);
    }
    MineField::from_bits((width, height), &bits)
}

fn encode_cells(enc: &mut ArithEncoder, board: &BoardInfo, field: &MineField) {
    let (width, height) = field.size();
    let mut model = CellModel::new(field);
    let mut states = vec![CellState::Closed; field.total_cells() as usize];

    for y in 0..height {
        for x in 0..width {
            let coords = (x, y);
            let state = board.cell(coords).state;
            let (p_open, p_flag) = model.probabilities(field, &states, coords);

            let p_closed = 1.0 - p_open - p_flag;
            enc.encode_bit(p_closed, !state.is_closed());
            if !state.is_closed() {
                enc.encode_bit(p_open / (p_open + p_flag), state.is_flagged());
            }

            states[y as usize * width as usize + x as usize] = state;
            model.consume(field, coords, state);
        }
    }
}

fn decode_cells(dec: &mut ArithDecoder<'_>, field: &MineField) -> Result<Vec<CellState>> {
    let (width, height) = field.size();
    let mut model = CellModel::new(field);
    let mut states = vec![CellState::Closed; field.total_cells() as usize];

    for y in 0..height {
        for x in 0..width {
            let coords = (x, y);
            let (p_open, p_flag) = model.probabilities(field, &states, coords);

            let p_closed = 1.0 - p_open - p_flag;
            let state = if !dec.decode_bit(p_closed)? {
                CellState::Closed
            } else if dec.decode_bit(p_open / (p_open + p_flag))? {
                CellState::Flagged
            } else {
                CellState::Opened
            };

            states[y as usize * width as usize + x as usize] = state;
            model.consume(field, coords, state);
        }
    }
    Ok(states)
}
