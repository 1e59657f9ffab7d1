//! Splitting a framed buffer into raw (tag, value) records.
//!
//! The tokenizer performs no semantic validation; it only cuts the buffer
//! on the configured separator byte and each record at its first `=`.

use memchr::memchr;

/// One raw record: tag bytes and value bytes, both unvalidated.
pub type RawField<'a> = (&'a [u8], &'a [u8]);

/// Splits `buf` on `sep` into (tag, value) records.
///
/// A framed buffer always ends with a separator, so anything after the
/// last separator is an incomplete record and is discarded. A record
/// without `=` yields its full bytes as the tag and an empty value.
pub fn tokenize(buf: &[u8], sep: u8) -> Vec<RawField<'_>> {
    let mut fields = Vec::new();
    let mut rest = buf;
    while let Some(at) = memchr(sep, rest) {
        fields.push(split_field(&rest[..at]));
        rest = &rest[at + 1..];
    }
    fields
}

fn split_field(record: &[u8]) -> RawField<'_> {
    match memchr(b'=', record) {
        Some(at) => (&record[..at], &record[at + 1..]),
        None => (record, &record[record.len()..]),
    }
}

#[cfg(test)]
mod tests {
    use super::tokenize;

    #[test]
    fn splits_on_separator_and_first_equals() {
        let fields = tokenize(b"8=FIX.4.2\x019=5\x0158=a=b\x01", 0x01);
        assert_eq!(
            fields,
            [
                (b"8".as_slice(), b"FIX.4.2".as_slice()),
                (b"9".as_slice(), b"5".as_slice()),
                (b"58".as_slice(), b"a=b".as_slice()),
            ]
        );
    }

    #[test]
    fn drops_trailing_incomplete_record() {
        let fields = tokenize(b"8=FIX.4.2|9=5|10=0", b'|');
        assert_eq!(fields.len(), 2);
    }

    #[test]
    fn keeps_empty_values() {
        let fields = tokenize(b"55=\x01", 0x01);
        assert_eq!(fields, [(b"55".as_slice(), b"".as_slice())]);
    }
}
