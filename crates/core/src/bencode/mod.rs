//! Bencode codec.
//!
//! Decoding keeps dictionary key order exactly as it appeared in the input,
//! so `encode(decode(x)) == x` for any well-formed `x`. Infohashes are
//! computed over re-encoded info dictionaries and rely on that.

mod decode;
mod encode;
mod error;
mod value;

pub use decode::decode;
pub use encode::encode;
pub use error::BencodeError;
pub use value::{Dict, Value};
