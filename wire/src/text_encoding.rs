use crate::reader::ReadError;

/// The encoding of strings and chars on the wire. The length prefix always counts *bytes*, so
///  peers must agree on the encoding out of band.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TextEncoding {
    /// UTF-16 little endian, the established default for compatibility with existing peers
    #[default]
    Utf16Le,
    Utf16Be,
    Utf8,
}

impl TextEncoding {
    pub fn byte_count(&self, s: &str) -> usize {
        match self {
            TextEncoding::Utf16Le | TextEncoding::Utf16Be => 2 * s.encode_utf16().count(),
            TextEncoding::Utf8 => s.len(),
        }
    }

    /// Encodes `s` into `buf`, which must have exactly [TextEncoding::byte_count] bytes
    pub fn encode_into(&self, s: &str, buf: &mut [u8]) {
        match self {
            TextEncoding::Utf16Le => {
                for (unit, chunk) in s.encode_utf16().zip(buf.chunks_exact_mut(2)) {
                    chunk.copy_from_slice(&unit.to_le_bytes());
                }
            }
            TextEncoding::Utf16Be => {
                for (unit, chunk) in s.encode_utf16().zip(buf.chunks_exact_mut(2)) {
                    chunk.copy_from_slice(&unit.to_be_bytes());
                }
            }
            TextEncoding::Utf8 => buf.copy_from_slice(s.as_bytes()),
        }
    }

    pub fn decode(&self, bytes: &[u8]) -> Result<String, ReadError> {
        let invalid = || ReadError::InvalidText { encoding: *self };

        match self {
            TextEncoding::Utf16Le | TextEncoding::Utf16Be => {
                if bytes.len() % 2 != 0 {
                    return Err(invalid());
                }
                let units = bytes.chunks_exact(2)
                    .map(|c| match self {
                        TextEncoding::Utf16Le => u16::from_le_bytes([c[0], c[1]]),
                        _ => u16::from_be_bytes([c[0], c[1]]),
                    })
                    .collect::<Vec<_>>();
                String::from_utf16(&units).map_err(|_| invalid())
            }
            TextEncoding::Utf8 => std::str::from_utf8(bytes)
                .map(|s| s.to_string())
                .map_err(|_| invalid()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::utf16le_ascii(TextEncoding::Utf16Le, "hi", vec![b'h', 0, b'i', 0])]
    #[case::utf16be_ascii(TextEncoding::Utf16Be, "hi", vec![0, b'h', 0, b'i'])]
    #[case::utf8_ascii(TextEncoding::Utf8, "hi", vec![b'h', b'i'])]
    #[case::utf8_umlaut(TextEncoding::Utf8, "ä", vec![0xc3, 0xa4])]
    #[case::utf16le_surrogates(TextEncoding::Utf16Le, "😀", vec![0x3d, 0xd8, 0x00, 0xde])]
    #[case::empty(TextEncoding::Utf16Le, "", vec![])]
    fn test_encode_decode(#[case] encoding: TextEncoding, #[case] s: &str, #[case] expected: Vec<u8>) {
        assert_eq!(encoding.byte_count(s), expected.len());

        let mut buf = vec![0u8; expected.len()];
        encoding.encode_into(s, &mut buf);
        assert_eq!(buf, expected);

        assert_eq!(encoding.decode(&buf).unwrap(), s);
    }

    #[rstest]
    #[case::odd_utf16(TextEncoding::Utf16Le, vec![b'a', 0, b'b'])]
    #[case::lone_surrogate(TextEncoding::Utf16Be, vec![0xd8, 0x3d])]
    #[case::invalid_utf8(TextEncoding::Utf8, vec![0xff, 0xfe])]
    fn test_decode_invalid(#[case] encoding: TextEncoding, #[case] bytes: Vec<u8>) {
        assert_eq!(encoding.decode(&bytes), Err(ReadError::InvalidText { encoding }));
    }
}
