use thiserror::Error;

/// Errors produced while decoding bencoded data.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BencodeError {
    #[error("unexpected end of input at byte {0}")]
    UnexpectedEof(usize),

    #[error("invalid integer at byte {position}: {reason}")]
    InvalidInteger { position: usize, reason: String },

    #[error("invalid string length at byte {0}")]
    InvalidStringLength(usize),

    #[error("unexpected byte {byte:#04x} at byte {position}")]
    UnexpectedByte { byte: u8, position: usize },

    #[error("dictionary key at byte {0} is not a byte string")]
    NonStringKey(usize),

    #[error("trailing data after value at byte {0}")]
    TrailingData(usize),

    #[error("nesting deeper than {0} levels")]
    NestingTooDeep(usize),
}
