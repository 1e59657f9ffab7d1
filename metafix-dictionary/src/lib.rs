//! Protocol dictionary for the metadata driven FIX codec.
//!
//! A [`Protocol`] describes one FIX dialect: its field table, component
//! definitions, message templates and the header/trailer layouts, together
//! with the knobs that control value conversion (time precision, decimal
//! representation, per-type enum decoding). It is built once through
//! [`ProtocolBuilder`] and treated as read-only afterwards; all definitions
//! are shared via `Arc`, so a built protocol can be shared across threads.
//!
//! Reading the dictionary from its XML or YAML source format is the job of
//! an external loader; the builder here is the in-memory construction API
//! such a loader drives.

mod dictionary;

pub use dictionary::{
    Component, Field, FlatMember, Group, Member, MemberDefinition, MemberSpec, MessageTemplate,
    Protocol, ProtocolBuilder, ProtocolOptions, ValidationError, ValueType, flat_members,
};
