//! Compact Minesweeper board codec.
//!
//! Serializes a board's dimensions, mine placement, and per-cell open/flag
//! state into a minimal URL-safe board id and reconstructs it exactly. The
//! pipeline is a bit-addressable buffer, a 31-bit binary arithmetic coder, a
//! combinatorial number system, and an adaptive neighbor-correlation model
//! feeding per-cell probabilities into the coder.

pub use arith::*;
pub use bits::*;
pub use board::*;
pub use codec::*;
pub use coders::*;
pub use combin::*;
pub use error::*;
pub use field::*;
pub use generator::*;
pub use model::*;
pub use types::*;
pub use wire::*;

mod arith;
mod bits;
mod board;
mod codec;
mod coders;
mod combin;
mod error;
mod field;
mod generator;
mod model;
mod types;
mod wire;
