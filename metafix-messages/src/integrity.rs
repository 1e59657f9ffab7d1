//! Body-length and checksum computation over framed buffers.

use crate::{parser::RawField, types::SOH};

/// Wire length of the checksum trailer: `10=NNN` plus one separator.
const CHECKSUM_TRAILER_LEN: usize = 7;

/// Sum of every byte of `buf` modulo 256, rendered as exactly three ASCII
/// decimal digits with leading zeros.
///
/// When a printable separator is in use and `convert_sep_for_checksum` is
/// set, separator bytes are counted as if they were SOH, so the checksum
/// matches what the canonical wire form would carry.
pub fn checksum(buf: &[u8], sep: u8, convert_sep_for_checksum: bool) -> Vec<u8> {
    let mut sum: u32 = 0;
    for &byte in buf {
        let byte = if convert_sep_for_checksum && byte == sep {
            SOH
        } else {
            byte
        };
        sum = sum.wrapping_add(byte as u32);
    }
    format!("{:03}", sum % 256).into_bytes()
}

/// Checksum of a complete framed buffer: every byte up to but not
/// including the `CheckSum` field itself.
pub fn calc_checksum(buf: &[u8], sep: u8, convert_sep_for_checksum: bool) -> Vec<u8> {
    let end = buf.len().saturating_sub(CHECKSUM_TRAILER_LEN);
    checksum(&buf[..end], sep, convert_sep_for_checksum)
}

/// Number of bytes strictly between the end of the `BodyLength` field's
/// separator and the start of `CheckSum=`: the buffer length minus the
/// two-field preamble and the checksum trailer.
pub fn calc_body_length(buf: &[u8], fields: &[RawField<'_>]) -> usize {
    if fields.len() < 3 {
        return 0;
    }
    // tag + '=' + value + separator
    let record_len = |(tag, value): &RawField<'_>| tag.len() + value.len() + 2;
    let preamble: usize = fields[..2].iter().map(record_len).sum();
    let trailer = fields.last().map(record_len).unwrap_or(0);
    buf.len().saturating_sub(preamble + trailer)
}

#[cfg(test)]
mod tests {
    use super::{calc_body_length, calc_checksum};
    use crate::parser::tokenize;

    const NEW_ORDER_SINGLE: &[u8] =
        b"8=FIX.4.2|9=146|35=D|49=ABC_DEFG01|56=CCG|115=XYZ|34=4|52=20090323-15:40:29|\
          11=NF 0542/03232009|21=1|55=CVS|207=N|54=1|60=20090323-15:40:29|38=100|40=1|\
          59=0|47=A|10=195|";

    #[test]
    fn checksum_substitutes_separator() {
        assert_eq!(calc_checksum(NEW_ORDER_SINGLE, b'|', true), b"195");
        assert_ne!(calc_checksum(NEW_ORDER_SINGLE, b'|', false), b"195");
    }

    #[test]
    fn checksum_is_zero_padded_to_three_digits() {
        let buf = b"8=FIX.4.4|9=94|35=3|49=A|56=AB|128=B1|34=214|50=U1|\
                    52=20100304-09:42:23.130|45=176|371=15|372=X|373=1|58=txt|10=058|";
        assert_eq!(calc_checksum(buf, b'|', true), b"058");
    }

    #[test]
    fn body_length_excludes_preamble_and_trailer() {
        let fields = tokenize(NEW_ORDER_SINGLE, b'|');
        assert_eq!(calc_body_length(NEW_ORDER_SINGLE, &fields), 146);
    }
}
