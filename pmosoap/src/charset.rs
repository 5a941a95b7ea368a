//! Charset-aware decoding of XML documents into UTF-8 text

use std::borrow::Cow;

use encoding_rs::{Encoding, UTF_8};
use quick_xml::Reader;
use quick_xml::events::Event;

use crate::error::DecodeError;

/// Decode `raw` to UTF-8 using its byte order mark or the encoding declared
/// in its XML prolog. Undeclared documents are read as UTF-8.
pub(crate) fn decode_document(raw: &[u8]) -> Result<Cow<'_, str>, DecodeError> {
    if let Some((encoding, bom_len)) = Encoding::for_bom(raw) {
        return decode_with(encoding, &raw[bom_len..]);
    }

    let encoding = match declared_encoding(raw) {
        Some(label) => Encoding::for_label(label.trim().as_bytes())
            .ok_or(DecodeError::UnsupportedEncoding(label))?,
        None => UTF_8,
    };
    decode_with(encoding, raw)
}

fn decode_with<'a>(
    encoding: &'static Encoding,
    raw: &'a [u8],
) -> Result<Cow<'a, str>, DecodeError> {
    let (text, had_errors) = encoding.decode_without_bom_handling(raw);
    if had_errors {
        return Err(DecodeError::InvalidBytes(encoding.name()));
    }
    Ok(text)
}

/// Encoding label of the `<?xml ...?>` declaration, if the document has one
fn declared_encoding(raw: &[u8]) -> Option<String> {
    let mut reader = Reader::from_reader(raw);
    match reader.read_event() {
        Ok(Event::Decl(decl)) => match decl.encoding() {
            Some(Ok(label)) => Some(String::from_utf8_lossy(&label).into_owned()),
            _ => None,
        },
        _ => None,
    }
}
