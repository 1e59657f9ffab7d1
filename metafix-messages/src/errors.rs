use metafix_dictionary::ValueType;

/// Errors raised while decoding a byte buffer.
///
/// Every variant is fatal to the decode call; nothing is retried or
/// silently recovered. Variants carry the field name and the offending
/// bytes so the failure is actionable by the caller.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// The wire tag has no entry in the protocol's field table.
    #[error(
        "received unknown field `{}` with value `{}`",
        String::from_utf8_lossy(.tag),
        String::from_utf8_lossy(.value)
    )]
    UnknownField { tag: Vec<u8>, value: Vec<u8> },

    /// The decoded `MsgType` has no message template.
    #[error("received unknown message type `{}`", String::from_utf8_lossy(.0))]
    UnknownMsgType(Vec<u8>),

    /// The field descriptor names a value type the codec has no converter
    /// for.
    #[error("field {field} has unhandled value type {value_type}")]
    UnknownValueType { field: String, value_type: ValueType },

    /// Required members were not observed (strict mode only).
    #[error("required fields missing: {0:?}")]
    RequiredFieldsMissing(Vec<String>),

    /// A value failed its type's converter.
    #[error(
        "malformed value `{}` for field {field}: {reason}",
        String::from_utf8_lossy(.value)
    )]
    MalformedValue {
        field: String,
        value: Vec<u8>,
        reason: &'static str,
    },

    /// Integrity verification failed for `BeginString`, `BodyLength` or
    /// `CheckSum`.
    #[error(
        "field {field}({}) expected `{}`, received `{}`",
        String::from_utf8_lossy(.tag),
        String::from_utf8_lossy(.expected),
        String::from_utf8_lossy(.received)
    )]
    FieldValueMismatch {
        field: String,
        tag: Vec<u8>,
        expected: Vec<u8>,
        received: Vec<u8>,
    },
}

/// Errors raised while encoding a structured message.
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    /// A required member is absent from the input.
    #[error("required field {0} is missing")]
    RequiredFieldMissing(String),

    /// The field descriptor names a value type the codec has no converter
    /// for.
    #[error("field {field} has unhandled value type {value_type}")]
    UnknownValueType { field: String, value_type: ValueType },

    /// The supplied value variant cannot be rendered for the field's wire
    /// type.
    #[error("unexpected value for field {field}: expected {expected}")]
    UnexpectedValue {
        field: String,
        expected: &'static str,
    },

    /// No message template is registered under this symbolic name.
    #[error("unknown message type `{0}`")]
    UnknownMsgType(String),
}

/// Either side of the codec, for callers that drive both.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Encode(#[from] EncodeError),
}
