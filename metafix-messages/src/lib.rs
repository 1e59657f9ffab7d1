//! Metadata driven FIX message encoding and decoding.
//!
//! The codec translates between framed tag-value byte buffers and
//! structured [`FieldMap`] payloads, guided entirely by a
//! [`metafix_dictionary::Protocol`]: the templates decide which fields are
//! legal and in what order, the field descriptors decide how each value
//! converts, and the integrity layer keeps `BodyLength` and `CheckSum`
//! wire-exact.
//!
//! The codec is single threaded and synchronous; apart from the encoder's
//! documented write-back of regenerated integrity fields it has no side
//! effects.

pub mod decoder;
pub mod encoder;
pub mod errors;
pub mod integrity;
mod message;
mod parser;
pub mod types;
pub mod values;

pub use decoder::{DecodeOptions, Decoded, decode, find_template};
pub use encoder::{EncodeOptions, encode};
pub use errors::{DecodeError, EncodeError, Error};
pub use message::{FixMessage, FixMessageFactory};
pub use parser::{RawField, tokenize};
pub use types::{FieldMap, SOH, Value};
