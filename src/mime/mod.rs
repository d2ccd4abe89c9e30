//! MIME byte-to-text codecs
//!
//! Streaming filters that carry arbitrary bytes through text-only XML nodes:
//! - Base64: fixed 76-column lines, `=` padding
//! - Quoted-Printable: escapes non-printable bytes, `=` and a leading `.`
//!
//! Every filter follows the same contract: `filter` consumes all of the input
//! it is given and appends whatever output is ready, `finish` flushes any
//! partial group. Output is identical no matter how the input is chunked.

pub mod base64;
pub mod quoted_printable;

pub use self::base64::{Base64Decoder, Base64Encoder};
pub use self::quoted_printable::{QuotedPrintableDecoder, QuotedPrintableEncoder};

/// Column at which encoders wrap lines
pub const LINE_WIDTH: usize = 76;

/// A streaming byte transform
pub trait StreamFilter {
    /// Consume `input`, append ready output, return the number of bytes appended
    fn filter(&mut self, input: &[u8], output: &mut Vec<u8>) -> usize;

    /// Flush buffered partial state, return the number of bytes appended
    fn finish(&mut self, output: &mut Vec<u8>) -> usize;
}

/// Which text codec carries a binary value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BinaryEncoding {
    #[default]
    Base64,
    QuotedPrintable,
}

impl BinaryEncoding {
    /// Encode bytes to text with this codec
    pub fn encode(self, bytes: &[u8]) -> String {
        match self {
            BinaryEncoding::Base64 => encode_base64(bytes),
            BinaryEncoding::QuotedPrintable => encode_quoted_printable(bytes),
        }
    }

    /// Decode text produced by [`BinaryEncoding::encode`]
    pub fn decode(self, text: &str) -> Vec<u8> {
        match self {
            BinaryEncoding::Base64 => decode_base64(text),
            BinaryEncoding::QuotedPrintable => decode_quoted_printable(text),
        }
    }
}

fn run_filter<F: StreamFilter>(mut filter: F, input: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(input.len() * 4 / 3 + 4);
    filter.filter(input, &mut out);
    filter.finish(&mut out);
    out
}

/// Base64-encode bytes in one call
pub fn encode_base64(bytes: &[u8]) -> String {
    // The encoder only ever emits ASCII
    String::from_utf8(run_filter(Base64Encoder::new(), bytes)).unwrap_or_default()
}

/// Decode Base64 text in one call, skipping whitespace and stray characters
pub fn decode_base64(text: &str) -> Vec<u8> {
    run_filter(Base64Decoder::new(), text.as_bytes())
}

/// Quoted-Printable-encode bytes in one call
pub fn encode_quoted_printable(bytes: &[u8]) -> String {
    String::from_utf8(run_filter(QuotedPrintableEncoder::new(), bytes)).unwrap_or_default()
}

/// Decode Quoted-Printable text in one call
pub fn decode_quoted_printable(text: &str) -> Vec<u8> {
    run_filter(QuotedPrintableDecoder::new(), text.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunked<F: StreamFilter>(mut filter: F, input: &[u8], chunk: usize) -> Vec<u8> {
        let mut out = Vec::new();
        let mut appended = 0;
        for part in input.chunks(chunk.max(1)) {
            appended += filter.filter(part, &mut out);
        }
        appended += filter.finish(&mut out);
        assert_eq!(appended, out.len());
        out
    }

    #[test]
    fn test_binary_encoding_round_trip() {
        let data: Vec<u8> = (0..=255u8).collect();
        for enc in [BinaryEncoding::Base64, BinaryEncoding::QuotedPrintable] {
            assert_eq!(enc.decode(&enc.encode(&data)), data);
        }
    }

    #[test]
    fn test_chunking_does_not_change_output() {
        let data: Vec<u8> = (0..500u32).map(|i| (i * 7 % 251) as u8).collect();
        let b64 = encode_base64(&data).into_bytes();
        let qp = encode_quoted_printable(&data).into_bytes();
        for chunk in [1, 2, 3, 5, 64, 1000] {
            assert_eq!(chunked(Base64Encoder::new(), &data, chunk), b64);
            assert_eq!(chunked(QuotedPrintableEncoder::new(), &data, chunk), qp);
            assert_eq!(chunked(Base64Decoder::new(), &b64, chunk), data);
            assert_eq!(chunked(QuotedPrintableDecoder::new(), &qp, chunk), data);
        }
    }

    proptest::proptest! {
        #[test]
        fn prop_base64_round_trip(data in proptest::collection::vec(proptest::num::u8::ANY, 0..600)) {
            proptest::prop_assert_eq!(decode_base64(&encode_base64(&data)), data);
        }

        #[test]
        fn prop_quoted_printable_round_trip(data in proptest::collection::vec(proptest::num::u8::ANY, 0..600)) {
            proptest::prop_assert_eq!(decode_quoted_printable(&encode_quoted_printable(&data)), data);
        }
    }
}
