//! Template-driven message encoding.

use metafix_dictionary::{FlatMember, MessageTemplate, Protocol, flat_members};

use crate::{
    errors::EncodeError,
    integrity,
    types::{FieldMap, Int, SOH, Value},
    values::encode_value,
};

#[derive(Clone, Debug)]
pub struct EncodeOptions {
    /// Field separator byte.
    pub sep: u8,
    /// Rewrite `BeginString`, `BodyLength` and `CheckSum` and write the
    /// computed values back into the caller's message.
    pub regenerate_integrity: bool,
    /// Compute the checksum as if the buffer used SOH separators.
    pub convert_sep_for_checksum: bool,
}

impl Default for EncodeOptions {
    fn default() -> EncodeOptions {
        EncodeOptions {
            sep: SOH,
            regenerate_integrity: true,
            convert_sep_for_checksum: true,
        }
    }
}

/// Encodes a structured message against its template.
///
/// The header, body and trailer members are walked in declaration order,
/// with components expanded transparently. With `regenerate_integrity`
/// (the default), the preamble placeholders are forced before the walk so
/// the three-field preamble is always emitted, and the computed body
/// length and checksum are written back into `message` afterwards so the
/// round trip is observable to the caller.
pub fn encode(
    protocol: &Protocol,
    message: &mut FieldMap,
    template: &MessageTemplate,
    options: &EncodeOptions,
) -> Result<Vec<u8>, EncodeError> {
    if options.regenerate_integrity {
        message.set(
            "BeginString",
            String::from_utf8_lossy(protocol.begin_string()).into_owned(),
        );
        message.set("BodyLength", Value::Int(0));
        message.set("CheckSum", "000");
    }

    let mut fields: Vec<(Vec<u8>, Vec<u8>)> = Vec::new();
    encode_members(protocol, &mut fields, message, &flat_members(protocol.header()))?;
    encode_members(protocol, &mut fields, message, &flat_members(template.members()))?;
    encode_members(protocol, &mut fields, message, &flat_members(protocol.trailer()))?;

    if options.regenerate_integrity {
        let (buf, body_length, checksum) = regenerate_integrity(&fields, options);
        message.set("BodyLength", Value::Int(body_length as Int));
        message.set("CheckSum", String::from_utf8_lossy(&checksum).into_owned());
        Ok(buf)
    } else {
        let mut buf = Vec::new();
        join_fields(&mut buf, &fields, options.sep);
        Ok(buf)
    }
}

fn encode_members(
    protocol: &Protocol,
    fields: &mut Vec<(Vec<u8>, Vec<u8>)>,
    data: &FieldMap,
    members: &[FlatMember<'_>],
) -> Result<(), EncodeError> {
    for member in members {
        let name = member.field().name();
        let Some(value) = data.get(name) else {
            if member.required() {
                return Err(EncodeError::RequiredFieldMissing(name.to_owned()));
            }
            continue;
        };

        match member {
            FlatMember::Field { field, .. } => {
                let encoded = encode_value(protocol, field, value)?;
                fields.push((field.tag().to_vec(), encoded));
            }
            FlatMember::Group { group, .. } => {
                let Value::Groups(occurrences) = value else {
                    return Err(EncodeError::UnexpectedValue {
                        field: name.to_owned(),
                        expected: "list of group occurrences",
                    });
                };
                // The count is always recomputed from the occurrence list.
                let count = Value::Int(occurrences.len() as Int);
                let encoded = encode_value(protocol, group.num_in_group(), &count)?;
                fields.push((group.num_in_group().tag().to_vec(), encoded));

                let children = flat_members(group.members());
                for occurrence in occurrences {
                    encode_members(protocol, fields, occurrence, &children)?;
                }
            }
        }
    }
    Ok(())
}

fn join_fields(buf: &mut Vec<u8>, fields: &[(Vec<u8>, Vec<u8>)], sep: u8) {
    for (tag, value) in fields {
        buf.extend_from_slice(tag);
        buf.push(b'=');
        buf.extend_from_slice(value);
        buf.push(sep);
    }
}

/// Rebuilds the preamble with the true body length and appends the real
/// checksum trailer.
///
/// The walk has already emitted the `BeginString` and `BodyLength`
/// placeholders as the first two fields and the `CheckSum` placeholder as
/// the last, so the body is everything in between.
fn regenerate_integrity(
    fields: &[(Vec<u8>, Vec<u8>)],
    options: &EncodeOptions,
) -> (Vec<u8>, usize, Vec<u8>) {
    // The forced placeholders guarantee the preamble pair, MsgType and the
    // checksum are all present: at least four fields.
    debug_assert!(fields.len() >= 4);
    let sep = options.sep;

    let mut body = Vec::new();
    join_fields(&mut body, &fields[2..fields.len() - 1], sep);
    let body_length = body.len();

    let mut buf = Vec::new();
    let (begin_string_tag, begin_string) = &fields[0];
    buf.extend_from_slice(begin_string_tag);
    buf.push(b'=');
    buf.extend_from_slice(begin_string);
    buf.push(sep);

    let (body_length_tag, _) = &fields[1];
    let mut length_buffer = itoa::Buffer::new();
    buf.extend_from_slice(body_length_tag);
    buf.push(b'=');
    buf.extend_from_slice(length_buffer.format(body_length).as_bytes());
    buf.push(sep);

    buf.extend_from_slice(&body);

    let checksum = integrity::checksum(&buf, sep, options.convert_sep_for_checksum);
    let (checksum_tag, _) = &fields[fields.len() - 1];
    buf.extend_from_slice(checksum_tag);
    buf.push(b'=');
    buf.extend_from_slice(&checksum);
    buf.push(sep);

    (buf, body_length, checksum)
}
