//! Template-driven message decoding.
//!
//! Two reusable passes do the work. The ordered pass advances over the
//! token stream and a template slice in lockstep and is used for the
//! three-field preamble, the final `CheckSum` and every repeating-group
//! occurrence. The unordered pass indexes the remaining template members
//! by tag and accepts them in any order; it covers the rest of the header,
//! the body and the trailer before its last member.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use metafix_dictionary::{Field, FlatMember, Group, MessageTemplate, Protocol, flat_members};
use tracing::{debug, warn};

use crate::{
    errors::DecodeError,
    integrity,
    parser::{RawField, tokenize},
    types::{FieldMap, SOH, Value},
    values::{decode_value, encode_value},
};

#[derive(Clone, Debug)]
pub struct DecodeOptions {
    /// Missing required members and skipped required preamble fields are
    /// errors; when off they are tolerated and reported through
    /// [`Decoded::omitted_required`].
    pub strict: bool,
    /// Verify `BeginString`, `BodyLength` and `CheckSum` after parsing.
    pub validate: bool,
    /// Field separator byte.
    pub sep: u8,
    /// Compute the checksum as if the buffer used SOH separators.
    pub convert_sep_for_checksum: bool,
}

impl Default for DecodeOptions {
    fn default() -> DecodeOptions {
        DecodeOptions {
            strict: true,
            validate: true,
            sep: SOH,
            convert_sep_for_checksum: true,
        }
    }
}

/// The result of a successful decode.
#[derive(Debug)]
pub struct Decoded {
    pub message: FieldMap,
    pub template: Arc<MessageTemplate>,
    /// Required members that were missing but tolerated; only populated in
    /// non-strict mode.
    pub omitted_required: Vec<String>,
}

/// Decodes a framed byte buffer into a structured message.
pub fn decode(
    protocol: &Protocol,
    buf: &[u8],
    options: &DecodeOptions,
) -> Result<Decoded, DecodeError> {
    debug!(len = buf.len(), "decoding message");
    let mut decoder = Decoder {
        protocol,
        fields: tokenize(buf, options.sep),
        strict: options.strict,
        omitted: Vec::new(),
    };

    let mut message = FieldMap::new();
    let index = decoder.decode_header(&mut message)?;

    let template = find_template(protocol, &message)?;
    debug!(template = template.name(), "message template dispatched");

    let index = decoder.decode_any_order(index, &flat_members(template.members()), &mut message)?;
    decoder.decode_trailer(index, &mut message)?;

    if options.validate {
        verify_integrity(protocol, buf, &decoder.fields, &message, options)?;
    }

    Ok(Decoded {
        message,
        template,
        omitted_required: decoder.omitted,
    })
}

/// Finds the message template for a structured message.
///
/// The `MsgType` value is mapped back to its wire code (through the enum
/// dictionary when it holds a symbolic name) before the by-type lookup, so
/// the same path serves decoded and caller-assembled messages.
pub fn find_template(
    protocol: &Protocol,
    message: &FieldMap,
) -> Result<Arc<MessageTemplate>, DecodeError> {
    let Some(value) = message.get("MsgType") else {
        return Err(DecodeError::RequiredFieldsMissing(vec!["MsgType".to_owned()]));
    };
    let msg_type = match value {
        Value::Str(name) => match protocol.field_by_name("MsgType") {
            Some(field) => field
                .encode_enum(name)
                .map(<[u8]>::to_vec)
                .unwrap_or_else(|| name.clone().into_bytes()),
            None => name.clone().into_bytes(),
        },
        _ => return Err(DecodeError::UnknownMsgType(Vec::new())),
    };
    protocol
        .message_by_type(&msg_type)
        .cloned()
        .ok_or(DecodeError::UnknownMsgType(msg_type))
}

struct Decoder<'a> {
    protocol: &'a Protocol,
    fields: Vec<RawField<'a>>,
    strict: bool,
    omitted: Vec<String>,
}

impl<'a> Decoder<'a> {
    fn lookup_field(&self, tag: &[u8], value: &[u8]) -> Result<&'a Field, DecodeError> {
        self.protocol
            .field_by_tag(tag)
            .map(|field| field.as_ref())
            .ok_or_else(|| DecodeError::UnknownField {
                tag: tag.to_vec(),
                value: value.to_vec(),
            })
    }

    fn decode_header(&mut self, message: &mut FieldMap) -> Result<usize, DecodeError> {
        let header = flat_members(self.protocol.header());
        // The three-field preamble must arrive in declaration order; the
        // remaining header members may be permuted.
        let split = header.len().min(3);
        let index = self.decode_in_order(0, &header[..split], message)?;
        self.decode_any_order(index, &header[split..], message)
    }

    fn decode_trailer(&mut self, index: usize, message: &mut FieldMap) -> Result<usize, DecodeError> {
        let trailer = flat_members(self.protocol.trailer());
        // Everything before the final member is unordered; the last member
        // is the checksum and closes the message.
        let split = trailer.len().saturating_sub(1);
        let index = self.decode_any_order(index, &trailer[..split], message)?;
        self.decode_in_order(index, &trailer[split..], message)
    }

    /// Ordered pass: consumes received fields while they match template
    /// members in declaration order. A mismatching member is skipped; in
    /// strict mode skipping a required member is an error. Terminates on
    /// end of stream, end of template, or the first tag no remaining
    /// member accepts, and returns the cursor into the token stream.
    fn decode_in_order<'t>(
        &mut self,
        mut index: usize,
        members: &[FlatMember<'t>],
        message: &mut FieldMap,
    ) -> Result<usize, DecodeError> {
        let mut at = 0;
        while index < self.fields.len() {
            let (tag, value) = self.fields[index];
            let received = self.lookup_field(tag, value)?;
            let Some(member) = self.next_matching_member(received, members, &mut at)? else {
                break;
            };
            index += 1;
            match member {
                FlatMember::Group { group, .. } => {
                    let count = parse_group_count(group.num_in_group(), value)?;
                    let (occurrences, next) = self.decode_group(index, group, count)?;
                    index = next;
                    message.set(received.name(), Value::Groups(occurrences));
                }
                FlatMember::Field { .. } => {
                    message.set(received.name(), decode_value(self.protocol, received, value)?);
                }
            }
        }

        let missing: Vec<String> = members[at..]
            .iter()
            .filter(|member| member.required())
            .map(|member| member.field().name().to_owned())
            .collect();
        self.report_missing(missing)?;
        Ok(index)
    }

    /// Advances the template cursor until a member matches the received
    /// field, skipping members that do not.
    fn next_matching_member<'t>(
        &mut self,
        received: &Field,
        members: &[FlatMember<'t>],
        at: &mut usize,
    ) -> Result<Option<FlatMember<'t>>, DecodeError> {
        while *at < members.len() {
            let member = members[*at];
            *at += 1;
            if member.field().tag() == received.tag() {
                return Ok(Some(member));
            }
            if member.required() {
                if self.strict {
                    return Err(DecodeError::RequiredFieldsMissing(vec![
                        member.field().name().to_owned(),
                    ]));
                }
                self.omitted.push(member.field().name().to_owned());
            }
        }
        Ok(None)
    }

    /// Unordered pass: accepts any remaining template member in any order
    /// and stops at the first tag outside the template.
    fn decode_any_order<'t>(
        &mut self,
        mut index: usize,
        members: &[FlatMember<'t>],
        message: &mut FieldMap,
    ) -> Result<usize, DecodeError> {
        let by_tag: HashMap<&[u8], FlatMember<'t>> = members
            .iter()
            .map(|member| (member.field().tag(), *member))
            .collect();
        let mut found: HashSet<&str> = HashSet::new();

        while index < self.fields.len() {
            let (tag, value) = self.fields[index];
            let received = self.lookup_field(tag, value)?;
            let Some(member) = by_tag.get(tag).copied() else {
                break;
            };
            found.insert(member.field().name());
            index += 1;
            match member {
                FlatMember::Group { group, .. } => {
                    let count = parse_group_count(group.num_in_group(), value)?;
                    let (occurrences, next) = self.decode_group(index, group, count)?;
                    index = next;
                    message.set(received.name(), Value::Groups(occurrences));
                }
                FlatMember::Field { .. } => {
                    message.set(received.name(), decode_value(self.protocol, received, value)?);
                }
            }
        }

        let missing: Vec<String> = members
            .iter()
            .filter(|member| member.required() && !found.contains(member.field().name()))
            .map(|member| member.field().name().to_owned())
            .collect();
        self.report_missing(missing)?;
        Ok(index)
    }

    /// Decodes `count` occurrences of a group's child template, each one
    /// through the ordered pass. The occurrence list is the group's
    /// payload value; the raw count is never surfaced.
    fn decode_group(
        &mut self,
        mut index: usize,
        group: &Group,
        count: usize,
    ) -> Result<(Vec<FieldMap>, usize), DecodeError> {
        let children = flat_members(group.members());
        let mut occurrences = Vec::with_capacity(count);
        for _ in 0..count {
            let mut occurrence = FieldMap::new();
            index = self.decode_in_order(index, &children, &mut occurrence)?;
            occurrences.push(occurrence);
        }
        Ok((occurrences, index))
    }

    fn report_missing(&mut self, missing: Vec<String>) -> Result<(), DecodeError> {
        if missing.is_empty() {
            return Ok(());
        }
        if self.strict {
            return Err(DecodeError::RequiredFieldsMissing(missing));
        }
        warn!(?missing, "tolerating missing required fields");
        self.omitted.extend(missing);
        Ok(())
    }
}

fn parse_group_count(field: &Field, value: &[u8]) -> Result<usize, DecodeError> {
    let mut count: usize = 0;
    if value.is_empty() {
        return Err(bad_group_count(field, value));
    }
    for byte in value {
        match byte {
            n @ b'0'..=b'9' => {
                count = count
                    .checked_mul(10)
                    .and_then(|count| count.checked_add((n - b'0') as usize))
                    .ok_or_else(|| bad_group_count(field, value))?;
            }
            _ => return Err(bad_group_count(field, value)),
        }
    }
    Ok(count)
}

fn bad_group_count(field: &Field, value: &[u8]) -> DecodeError {
    DecodeError::MalformedValue {
        field: field.name().to_owned(),
        value: value.to_vec(),
        reason: "bad group count",
    }
}

/// Compares the decoded `BeginString`, `BodyLength` and `CheckSum`
/// byte-exact against the protocol's begin string and the recomputed
/// integrity values.
fn verify_integrity(
    protocol: &Protocol,
    buf: &[u8],
    fields: &[RawField<'_>],
    message: &FieldMap,
    options: &DecodeOptions,
) -> Result<(), DecodeError> {
    check_field_value(protocol, message, "BeginString", protocol.begin_string().to_vec())?;

    let mut length_buffer = itoa::Buffer::new();
    let body_length = length_buffer
        .format(integrity::calc_body_length(buf, fields))
        .as_bytes()
        .to_vec();
    check_field_value(protocol, message, "BodyLength", body_length)?;

    let checksum = integrity::calc_checksum(buf, options.sep, options.convert_sep_for_checksum);
    check_field_value(protocol, message, "CheckSum", checksum)?;

    Ok(())
}

fn check_field_value(
    protocol: &Protocol,
    message: &FieldMap,
    name: &str,
    expected: Vec<u8>,
) -> Result<(), DecodeError> {
    let Some(field) = protocol.field_by_name(name) else {
        return Err(DecodeError::RequiredFieldsMissing(vec![name.to_owned()]));
    };
    let received = match message.get(name) {
        Some(value) => encode_value(protocol, field, value).unwrap_or_default(),
        None => Vec::new(),
    };
    if received != expected {
        return Err(DecodeError::FieldValueMismatch {
            field: field.name().to_owned(),
            tag: field.tag().to_vec(),
            expected,
            received,
        });
    }
    Ok(())
}
