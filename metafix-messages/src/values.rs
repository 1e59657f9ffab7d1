//! Per-type value conversion between wire bytes and [`Value`]s.
//!
//! Both directions are pure functions of the protocol options, the field
//! descriptor and the value. Enum substitution is symmetric: under the
//! per-type policy, decode maps wire codes to symbolic names through the
//! field's enum dictionary and encode maps symbolic names back to wire
//! codes. When the dictionary is absent, the policy is disabled or the
//! value is not a registered member, the primitive converter applies.

use std::str;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use metafix_dictionary::{Field, Protocol, ValueType};
use rust_decimal::Decimal;

use crate::{
    errors::{DecodeError, EncodeError},
    types::{Int, Value},
};

pub(crate) const UTC_TIMESTAMP_FMT_MILLIS: &str = "%Y%m%d-%H:%M:%S%.3f";
pub(crate) const UTC_TIMESTAMP_FMT_NO_MILLIS: &str = "%Y%m%d-%H:%M:%S";
const UTC_TIME_ONLY_FMT_MILLIS: &str = "%H:%M:%S%.3f";
const UTC_TIME_ONLY_FMT_NO_MILLIS: &str = "%H:%M:%S";
const DATE_FMT: &str = "%Y%m%d";

/// Decodes one wire value.
///
/// An empty byte slice decodes to [`Value::Absent`].
pub fn decode_value(protocol: &Protocol, field: &Field, value: &[u8]) -> Result<Value, DecodeError> {
    if value.is_empty() {
        return Ok(Value::Absent);
    }

    match field.value_type() {
        ValueType::Int => decode_int(protocol, field, value),
        ValueType::SeqNum | ValueType::NumInGroup | ValueType::Length => {
            decode_unsigned(field, value)
        }
        ValueType::Float
        | ValueType::Qty
        | ValueType::Price
        | ValueType::PriceOffset
        | ValueType::Amt => decode_float(protocol, field, value),
        ValueType::Char => decode_char(protocol, field, value),
        ValueType::String => decode_string(protocol, field, value),
        ValueType::Currency | ValueType::Exchange | ValueType::MonthYear => {
            Ok(Value::Str(ascii_str(field, value)?.to_owned()))
        }
        ValueType::Boolean => decode_boolean(protocol, field, value),
        ValueType::MultipleValueString => decode_multiple_value_string(field, value),
        ValueType::UtcTimestamp => decode_utc_timestamp(protocol, field, value),
        ValueType::UtcTimeOnly => decode_utc_time_only(protocol, field, value),
        ValueType::LocalMktDate | ValueType::UtcDate => decode_date(field, value),
        value_type => Err(DecodeError::UnknownValueType {
            field: field.name().to_owned(),
            value_type,
        }),
    }
}

/// Encodes one value to its wire byte form.
///
/// [`Value::Absent`] encodes to an empty byte slice.
pub fn encode_value(
    protocol: &Protocol,
    field: &Field,
    value: &Value,
) -> Result<Vec<u8>, EncodeError> {
    if let Value::Absent = value {
        return Ok(Vec::new());
    }

    match field.value_type() {
        ValueType::Int => encode_int(protocol, field, value, true),
        ValueType::SeqNum | ValueType::NumInGroup | ValueType::Length => {
            encode_int(protocol, field, value, false)
        }
        ValueType::Float
        | ValueType::Qty
        | ValueType::Price
        | ValueType::PriceOffset
        | ValueType::Amt => encode_float(field, value),
        ValueType::Char | ValueType::String => encode_string(protocol, field, value, true),
        ValueType::Currency | ValueType::Exchange | ValueType::MonthYear => {
            encode_string(protocol, field, value, false)
        }
        ValueType::Boolean => encode_boolean(protocol, field, value),
        ValueType::MultipleValueString => encode_multiple_value_string(field, value),
        ValueType::UtcTimestamp => encode_utc_timestamp(protocol, field, value),
        ValueType::UtcTimeOnly => encode_utc_time_only(protocol, field, value),
        ValueType::LocalMktDate | ValueType::UtcDate => encode_date(field, value),
        value_type => Err(EncodeError::UnknownValueType {
            field: field.name().to_owned(),
            value_type,
        }),
    }
}

fn malformed(field: &Field, value: &[u8], reason: &'static str) -> DecodeError {
    DecodeError::MalformedValue {
        field: field.name().to_owned(),
        value: value.to_vec(),
        reason,
    }
}

fn unexpected(field: &Field, expected: &'static str) -> EncodeError {
    EncodeError::UnexpectedValue {
        field: field.name().to_owned(),
        expected,
    }
}

fn ascii_str<'a>(field: &Field, value: &'a [u8]) -> Result<&'a str, DecodeError> {
    str::from_utf8(value).map_err(|_| malformed(field, value, "invalid character data"))
}

fn decoded_enum(protocol: &Protocol, field: &Field, value: &[u8]) -> Option<Value> {
    if protocol.is_enum_decoded(field.value_type()) {
        field
            .decode_enum(value)
            .map(|symbol| Value::Str(symbol.to_owned()))
    } else {
        None
    }
}

fn encoded_enum(protocol: &Protocol, field: &Field, value: &Value) -> Option<Vec<u8>> {
    if !protocol.is_enum_decoded(field.value_type()) {
        return None;
    }
    match value {
        Value::Str(symbol) => field.encode_enum(symbol).map(<[u8]>::to_vec),
        _ => None,
    }
}

/// Sequence of digit characters, optionally signed. Leading zeros are
/// tolerated and do not survive re-encoding.
fn parse_int(field: &Field, value: &[u8]) -> Result<Int, DecodeError> {
    let (negative, digits) = match value {
        [b'-', digits @ ..] => (true, digits),
        digits => (false, digits),
    };
    if digits.is_empty() {
        return Err(malformed(field, value, "bad integer literal"));
    }

    let mut parsed: Int = 0;
    for byte in digits {
        match byte {
            n @ b'0'..=b'9' => {
                parsed = parsed
                    .checked_mul(10)
                    .and_then(|parsed| parsed.checked_add((n - b'0') as Int))
                    .ok_or_else(|| malformed(field, value, "integer overflow"))?;
            }
            _ => return Err(malformed(field, value, "bad integer literal")),
        }
    }
    Ok(if negative { -parsed } else { parsed })
}

fn decode_int(protocol: &Protocol, field: &Field, value: &[u8]) -> Result<Value, DecodeError> {
    if let Some(symbol) = decoded_enum(protocol, field, value) {
        return Ok(symbol);
    }
    parse_int(field, value).map(Value::Int)
}

fn decode_unsigned(field: &Field, value: &[u8]) -> Result<Value, DecodeError> {
    let parsed = parse_int(field, value)?;
    if parsed < 0 {
        return Err(malformed(field, value, "negative value"));
    }
    Ok(Value::Int(parsed))
}

fn decode_float(protocol: &Protocol, field: &Field, value: &[u8]) -> Result<Value, DecodeError> {
    let literal = ascii_str(field, value)?;
    if protocol.options().is_float_decimal {
        literal
            .parse::<Decimal>()
            .map(Value::Decimal)
            .map_err(|_| malformed(field, value, "bad decimal literal"))
    } else {
        literal
            .parse::<f64>()
            .map(Value::Double)
            .map_err(|_| malformed(field, value, "bad float literal"))
    }
}

fn decode_char(protocol: &Protocol, field: &Field, value: &[u8]) -> Result<Value, DecodeError> {
    if let Some(symbol) = decoded_enum(protocol, field, value) {
        return Ok(symbol);
    }
    if value.len() != 1 {
        return Err(malformed(field, value, "expected a single character"));
    }
    Ok(Value::Str(ascii_str(field, value)?.to_owned()))
}

fn decode_string(protocol: &Protocol, field: &Field, value: &[u8]) -> Result<Value, DecodeError> {
    if let Some(symbol) = decoded_enum(protocol, field, value) {
        return Ok(symbol);
    }
    Ok(Value::Str(ascii_str(field, value)?.to_owned()))
}

fn decode_boolean(protocol: &Protocol, field: &Field, value: &[u8]) -> Result<Value, DecodeError> {
    if let Some(symbol) = decoded_enum(protocol, field, value) {
        return Ok(symbol);
    }
    match value {
        b"Y" => Ok(Value::Bool(true)),
        b"N" => Ok(Value::Bool(false)),
        _ => Err(malformed(field, value, "expected Y or N")),
    }
}

/// Space-delimited tokens, e.g. `AV AN A`.
fn decode_multiple_value_string(field: &Field, value: &[u8]) -> Result<Value, DecodeError> {
    let tokens = ascii_str(field, value)?
        .split(' ')
        .map(str::to_owned)
        .collect();
    Ok(Value::List(tokens))
}

/// Time/date combination in UTC, `YYYYMMDD-HH:MM:SS` or
/// `YYYYMMDD-HH:MM:SS.sss` depending on the precision dial. Colons, dash
/// and period required.
fn decode_utc_timestamp(
    protocol: &Protocol,
    field: &Field,
    value: &[u8],
) -> Result<Value, DecodeError> {
    let format = if protocol.options().is_millisecond_time {
        UTC_TIMESTAMP_FMT_MILLIS
    } else {
        UTC_TIMESTAMP_FMT_NO_MILLIS
    };
    NaiveDateTime::parse_from_str(ascii_str(field, value)?, format)
        .map(|timestamp| Value::Timestamp(timestamp.and_utc()))
        .map_err(|_| malformed(field, value, "bad UTC timestamp"))
}

/// Time of day in UTC, `HH:MM:SS` or `HH:MM:SS.sss` depending on the
/// precision dial.
fn decode_utc_time_only(
    protocol: &Protocol,
    field: &Field,
    value: &[u8],
) -> Result<Value, DecodeError> {
    let format = if protocol.options().is_millisecond_time {
        UTC_TIME_ONLY_FMT_MILLIS
    } else {
        UTC_TIME_ONLY_FMT_NO_MILLIS
    };
    NaiveTime::parse_from_str(ascii_str(field, value)?, format)
        .map(Value::Time)
        .map_err(|_| malformed(field, value, "bad UTC time"))
}

/// Calendar date in `YYYYMMDD` form.
fn decode_date(field: &Field, value: &[u8]) -> Result<Value, DecodeError> {
    NaiveDate::parse_from_str(ascii_str(field, value)?, DATE_FMT)
        .map(Value::Date)
        .map_err(|_| malformed(field, value, "bad date"))
}

fn format_int(value: Int) -> Vec<u8> {
    let mut buffer = itoa::Buffer::new();
    buffer.format(value).as_bytes().to_vec()
}

fn encode_int(
    protocol: &Protocol,
    field: &Field,
    value: &Value,
    enumerated: bool,
) -> Result<Vec<u8>, EncodeError> {
    if enumerated {
        if let Some(code) = encoded_enum(protocol, field, value) {
            return Ok(code);
        }
    }
    match value {
        Value::Int(int) => Ok(format_int(*int)),
        Value::Str(literal) => Ok(literal.clone().into_bytes()),
        _ => Err(unexpected(field, "integer")),
    }
}

fn encode_float(field: &Field, value: &Value) -> Result<Vec<u8>, EncodeError> {
    match value {
        Value::Decimal(decimal) => Ok(decimal.to_string().into_bytes()),
        Value::Double(double) => Ok(double.to_string().into_bytes()),
        Value::Int(int) => Ok(format_int(*int)),
        Value::Str(literal) => Ok(literal.clone().into_bytes()),
        _ => Err(unexpected(field, "decimal number")),
    }
}

fn encode_string(
    protocol: &Protocol,
    field: &Field,
    value: &Value,
    enumerated: bool,
) -> Result<Vec<u8>, EncodeError> {
    if enumerated {
        if let Some(code) = encoded_enum(protocol, field, value) {
            return Ok(code);
        }
    }
    match value {
        Value::Str(string) => Ok(string.clone().into_bytes()),
        _ => Err(unexpected(field, "string")),
    }
}

fn encode_boolean(
    protocol: &Protocol,
    field: &Field,
    value: &Value,
) -> Result<Vec<u8>, EncodeError> {
    if let Some(code) = encoded_enum(protocol, field, value) {
        return Ok(code);
    }
    match value {
        Value::Bool(true) => Ok(b"Y".to_vec()),
        Value::Bool(false) => Ok(b"N".to_vec()),
        _ => Err(unexpected(field, "boolean")),
    }
}

fn encode_multiple_value_string(field: &Field, value: &Value) -> Result<Vec<u8>, EncodeError> {
    match value {
        Value::List(tokens) => Ok(tokens.join(" ").into_bytes()),
        Value::Str(token) => Ok(token.clone().into_bytes()),
        _ => Err(unexpected(field, "list of strings")),
    }
}

fn encode_utc_timestamp(
    protocol: &Protocol,
    field: &Field,
    value: &Value,
) -> Result<Vec<u8>, EncodeError> {
    let format = if protocol.options().is_millisecond_time {
        UTC_TIMESTAMP_FMT_MILLIS
    } else {
        UTC_TIMESTAMP_FMT_NO_MILLIS
    };
    match value {
        Value::Timestamp(timestamp) => Ok(timestamp.format(format).to_string().into_bytes()),
        _ => Err(unexpected(field, "UTC timestamp")),
    }
}

fn encode_utc_time_only(
    protocol: &Protocol,
    field: &Field,
    value: &Value,
) -> Result<Vec<u8>, EncodeError> {
    let format = if protocol.options().is_millisecond_time {
        UTC_TIME_ONLY_FMT_MILLIS
    } else {
        UTC_TIME_ONLY_FMT_NO_MILLIS
    };
    match value {
        Value::Time(time) => Ok(time.format(format).to_string().into_bytes()),
        _ => Err(unexpected(field, "UTC time")),
    }
}

fn encode_date(field: &Field, value: &Value) -> Result<Vec<u8>, EncodeError> {
    match value {
        Value::Date(date) => Ok(date.format(DATE_FMT).to_string().into_bytes()),
        _ => Err(unexpected(field, "date")),
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::{NaiveDate, TimeZone, Utc};
    use metafix_dictionary::{Field, Protocol, ProtocolBuilder, ProtocolOptions, ValueType};
    use rust_decimal::Decimal;

    use super::{decode_value, encode_value};
    use crate::{errors::DecodeError, types::Value};

    fn protocol(options: ProtocolOptions) -> Protocol {
        ProtocolBuilder::new("FIX.4.4", b"FIX.4.4")
            .field(Field::with_values(
                "EncryptMethod",
                98,
                ValueType::Int,
                [("0", "NONE"), ("3", "DES")],
            ))
            .field(Field::with_values(
                "GapFillFlag",
                123,
                ValueType::Boolean,
                [("Y", "GAP_FILL"), ("N", "SEQUENCE_RESET")],
            ))
            .field(Field::new("ResetSeqNumFlag", 141, ValueType::Boolean))
            .field(Field::new("MsgSeqNum", 34, ValueType::SeqNum))
            .field(Field::new("HeartBtInt", 108, ValueType::Int))
            .field(Field::new("OrderQty", 38, ValueType::Qty))
            .field(Field::new("SendingTime", 52, ValueType::UtcTimestamp))
            .field(Field::new("MDEntryTime", 273, ValueType::UtcTimeOnly))
            .field(Field::new("TradeDate", 75, ValueType::LocalMktDate))
            .field(Field::new("Side", 54, ValueType::Char))
            .field(Field::new("ExecInst", 18, ValueType::MultipleValueString))
            .field(Field::new("MaturityDay", 205, ValueType::DayOfMonth))
            .options(options)
            .build()
            .expect("protocol build failed")
    }

    fn field<'a>(protocol: &'a Protocol, name: &str) -> &'a Field {
        protocol.field_by_name(name).expect("unknown test field")
    }

    #[test]
    fn empty_value_decodes_to_absent() {
        let protocol = protocol(ProtocolOptions::new());
        let sending_time = field(&protocol, "SendingTime");
        assert_eq!(decode_value(&protocol, sending_time, b"").unwrap(), Value::Absent);
        assert_eq!(
            encode_value(&protocol, sending_time, &Value::Absent).unwrap(),
            b""
        );
    }

    #[test]
    fn int_tolerates_leading_zeros_and_reencodes_without_them() {
        let protocol = protocol(ProtocolOptions::new());
        let heart_bt_int = field(&protocol, "HeartBtInt");
        let decoded = decode_value(&protocol, heart_bt_int, b"00023").unwrap();
        assert_eq!(decoded, Value::Int(23));
        assert_eq!(encode_value(&protocol, heart_bt_int, &decoded).unwrap(), b"23");

        assert_eq!(
            decode_value(&protocol, heart_bt_int, b"-99").unwrap(),
            Value::Int(-99)
        );
    }

    #[test]
    fn seq_num_rejects_sign_and_garbage() {
        let protocol = protocol(ProtocolOptions::new());
        let msg_seq_num = field(&protocol, "MsgSeqNum");
        assert_matches!(
            decode_value(&protocol, msg_seq_num, b"-4"),
            Err(DecodeError::MalformedValue { .. })
        );
        assert_matches!(
            decode_value(&protocol, msg_seq_num, b"12a"),
            Err(DecodeError::MalformedValue { .. })
        );
    }

    #[test]
    fn int_enum_follows_per_type_policy() {
        let enabled = protocol(ProtocolOptions::new());
        let encrypt_method = field(&enabled, "EncryptMethod");
        let decoded = decode_value(&enabled, encrypt_method, b"0").unwrap();
        assert_eq!(decoded, Value::Str("NONE".to_owned()));
        assert_eq!(encode_value(&enabled, encrypt_method, &decoded).unwrap(), b"0");

        let disabled = protocol(ProtocolOptions::new().with_enum_policy(ValueType::Int, false));
        let encrypt_method = field(&disabled, "EncryptMethod");
        let decoded = decode_value(&disabled, encrypt_method, b"0").unwrap();
        assert_eq!(decoded, Value::Int(0));
        assert_eq!(encode_value(&disabled, encrypt_method, &decoded).unwrap(), b"0");
    }

    #[test]
    fn boolean_enum_follows_per_type_policy() {
        let enabled = protocol(ProtocolOptions::new());
        let gap_fill = field(&enabled, "GapFillFlag");
        assert_eq!(
            decode_value(&enabled, gap_fill, b"Y").unwrap(),
            Value::Str("GAP_FILL".to_owned())
        );

        let disabled = protocol(ProtocolOptions::new().with_enum_policy(ValueType::Boolean, false));
        let gap_fill = field(&disabled, "GapFillFlag");
        assert_eq!(decode_value(&disabled, gap_fill, b"Y").unwrap(), Value::Bool(true));
        assert_eq!(
            encode_value(&disabled, gap_fill, &Value::Bool(true)).unwrap(),
            b"Y"
        );
    }

    #[test]
    fn plain_boolean_requires_y_or_n() {
        let protocol = protocol(ProtocolOptions::new());
        let reset_flag = field(&protocol, "ResetSeqNumFlag");
        assert_eq!(decode_value(&protocol, reset_flag, b"N").unwrap(), Value::Bool(false));
        assert_matches!(
            decode_value(&protocol, reset_flag, b"X"),
            Err(DecodeError::MalformedValue { .. })
        );
    }

    #[test]
    fn char_requires_a_single_byte() {
        let protocol = protocol(ProtocolOptions::new());
        let side = field(&protocol, "Side");
        assert_eq!(
            decode_value(&protocol, side, b"2").unwrap(),
            Value::Str("2".to_owned())
        );
        assert_matches!(
            decode_value(&protocol, side, b"21"),
            Err(DecodeError::MalformedValue { .. })
        );
    }

    #[test]
    fn qty_decodes_per_decimal_dial() {
        let mut options = ProtocolOptions::new();
        options.is_float_decimal = true;
        let decimal = protocol(options);
        let order_qty = field(&decimal, "OrderQty");
        let decoded = decode_value(&decimal, order_qty, b"1.37215").unwrap();
        assert_eq!(decoded, Value::Decimal("1.37215".parse::<Decimal>().unwrap()));
        assert_eq!(encode_value(&decimal, order_qty, &decoded).unwrap(), b"1.37215");

        let binary = protocol(ProtocolOptions::new());
        let order_qty = field(&binary, "OrderQty");
        assert_eq!(
            decode_value(&binary, order_qty, b"2500000").unwrap(),
            Value::Double(2500000.0)
        );
    }

    #[test]
    fn utc_timestamp_follows_precision_dial() {
        let millis = protocol(ProtocolOptions::new());
        let sending_time = field(&millis, "SendingTime");
        let decoded = decode_value(&millis, sending_time, b"20100318-03:21:11.364").unwrap();
        assert_eq!(
            decoded,
            Value::Timestamp(
                Utc.with_ymd_and_hms(2010, 3, 18, 3, 21, 11).unwrap()
                    + chrono::Duration::milliseconds(364)
            )
        );
        assert_eq!(
            encode_value(&millis, sending_time, &decoded).unwrap(),
            b"20100318-03:21:11.364"
        );

        let mut options = ProtocolOptions::new();
        options.is_millisecond_time = false;
        let whole = protocol(options);
        let sending_time = field(&whole, "SendingTime");
        let decoded = decode_value(&whole, sending_time, b"20090323-15:40:29").unwrap();
        assert_eq!(
            encode_value(&whole, sending_time, &decoded).unwrap(),
            b"20090323-15:40:29"
        );
    }

    #[test]
    fn dates_round_trip() {
        let protocol = protocol(ProtocolOptions::new());
        let trade_date = field(&protocol, "TradeDate");
        let decoded = decode_value(&protocol, trade_date, b"20100218").unwrap();
        assert_eq!(
            decoded,
            Value::Date(NaiveDate::from_ymd_opt(2010, 2, 18).unwrap())
        );
        assert_eq!(encode_value(&protocol, trade_date, &decoded).unwrap(), b"20100218");

        assert_matches!(
            decode_value(&protocol, trade_date, b"2010021"),
            Err(DecodeError::MalformedValue { .. })
        );
    }

    #[test]
    fn multiple_value_string_splits_on_spaces() {
        let protocol = protocol(ProtocolOptions::new());
        let exec_inst = field(&protocol, "ExecInst");
        let decoded = decode_value(&protocol, exec_inst, b"AV AN A").unwrap();
        assert_eq!(
            decoded,
            Value::List(vec!["AV".to_owned(), "AN".to_owned(), "A".to_owned()])
        );
        assert_eq!(encode_value(&protocol, exec_inst, &decoded).unwrap(), b"AV AN A");
    }

    #[test]
    fn day_of_month_has_no_converter() {
        let protocol = protocol(ProtocolOptions::new());
        let maturity_day = field(&protocol, "MaturityDay");
        assert_matches!(
            decode_value(&protocol, maturity_day, b"14"),
            Err(DecodeError::UnknownValueType { .. })
        );
    }
}
