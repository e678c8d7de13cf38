use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Invalid coordinates")]
    InvalidCoords,
    #[error("Too many mines")]
    TooManyMines,
    #[error("Board shape does not match declared size")]
    InvalidBoardShape,
    #[error("Duplicate mine marker at the same cell")]
    DuplicateMine,
    #[error("Board dimensions out of range")]
    InvalidDimensions,
    #[error("Bit stream exhausted")]
    StreamExhausted,
    #[error("Decoder is closed")]
    DecoderClosed,
    #[error("Decoded value out of range")]
    ValueOutOfRange,
    #[error("Invalid character {0:?} in board id")]
    InvalidBoardId(char),
    #[error("Board id is empty")]
    EmptyBoardId,
}

pub type Result<T> = core::result::Result<T, CodecError>;
