//! DNS Domain Name Codec
//!
//! This module converts domain names between their human-readable form (`www.example.com`) and
//! the RFC 1035 wire form (length-prefixed labels terminated by a zero byte), in both directions.
//!
//! # Overview
//!
//! In DNS, domain names can be repeated multiple times in a message (e.g., in
//! questions, answers, authority, and additional sections). To reduce message
//! size, RFC1035 §4.1.4 defines a compression scheme:
//!
//! - A domain name, or any suffix of a domain name, can be replaced with a
//!   2-byte pointer to a previous occurrence of the same name in the message.
//! - The pointer is encoded as a 16-bit value where:
//!   - The top two bits are `11`
//!   - The lower 14 bits represent the offset from the start of the message
//!
//! [`MessageCompressor`] offers three operations:
//!
//! 1. [`MessageCompressor::encode`] writes a name without compression (used for queries).
//! 2. [`MessageCompressor::compress`] writes a name into a message under construction, reusing
//!    previously written suffixes through the `pointer_map`.
//! 3. [`MessageCompressor::decompress`] reads a name back out of a received message, following
//!    pointers, and reports how many bytes the name occupied at its original position.
//!
//! # Decompression safety
//!
//! A pointer must point strictly backwards from the offset it was read at, and a pointer may
//! not be followed twice while decoding one name. Both rules are checked, so a crafted message
//! can neither loop forever nor make the decoder read outside the buffer.
//!
//! # References
//! - RFC1035 §3.1 (Name space definitions) and §4.1.4 (Message compression)
//! - <https://datatracker.ietf.org/doc/html/rfc1035>
use crate::dns::resolver::DecodeQueryErrors;
use std::collections::HashMap;
use thiserror::Error;

/// Longest label allowed by RFC 1035 §2.3.4.
pub const MAX_LABEL_LEN: usize = 63;
/// Longest encoded name allowed by RFC 1035 §2.3.4.
pub const MAX_NAME_LEN: usize = 255;

const POINTER_FLAG: u8 = 0b1100_0000;
const OFFSET_MASK: u16 = 0x3FFF;

#[derive(PartialEq, Eq, Hash)]
pub struct MessageCompressor {}

impl MessageCompressor {
    /// Encodes `name` into uncompressed wire labels.
    ///
    /// Empty labels are skipped, so `"example.com."` and `"example.com"` encode identically and
    /// both `"."` and `""` encode to the single root byte.
    ///
    /// # Example
    /// ```rust
    /// use dnsquery::dns::compressor::MessageCompressor;
    ///
    /// let wire = MessageCompressor::encode("www.example.com").unwrap();
    /// assert_eq!(wire[0], 3);
    /// assert_eq!(*wire.last().unwrap(), 0);
    /// assert_eq!(MessageCompressor::encode(".").unwrap(), vec![0]);
    /// ```
    pub fn encode(name: &str) -> Result<Vec<u8>, CompressorErrors> {
        let mut message = Vec::with_capacity(name.len() + 2);
        Self::encode_into(name, &mut message)?;
        Ok(message)
    }

    /// Same as [`MessageCompressor::encode`] but appends to an existing buffer.
    ///
    /// On error the buffer is left as it was before the call.
    pub fn encode_into(name: &str, message: &mut Vec<u8>) -> Result<(), CompressorErrors> {
        let start = message.len();

        for label in name.split('.').filter(|label| !label.is_empty()) {
            if label.len() > MAX_LABEL_LEN {
                message.truncate(start);
                return Err(CompressorErrors::LabelTooLong(label.to_string()));
            }
            message.push(label.len() as u8);
            message.extend_from_slice(label.as_bytes());
        }
        message.push(0);

        if message.len() - start > MAX_NAME_LEN {
            message.truncate(start);
            return Err(CompressorErrors::InvalidName(name.to_string()));
        }
        Ok(())
    }

    /// Reference to RFC1035, page 30 (4.1.4)
    ///
    /// In order to reduce the size of messages, the domain system utilizes a
    /// compression scheme which eliminates the repetition of domain names in a
    /// message.  In this scheme, an entire domain name or a list of labels at
    /// the end of a domain name is replaced with a pointer to a prior occurance
    /// of the same name.
    ///
    /// The pointer takes the form of a two octet sequence:
    ///
    ///   +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
    ///   | 1  1|                OFFSET                   |
    ///   +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
    ///
    /// `message` must be the whole message written so far (offsets are taken from its length) and
    /// `pointer_map` maps every suffix already written to its offset.
    pub fn compress(
        name: &str,
        message: &mut Vec<u8>,
        pointer_map: &mut HashMap<String, usize>,
    ) -> Result<(), CompressorErrors> {
        let labels: Vec<&str> = name.split('.').filter(|label| !label.is_empty()).collect();

        if let Some(label) = labels.iter().find(|label| label.len() > MAX_LABEL_LEN) {
            return Err(CompressorErrors::LabelTooLong(label.to_string()));
        }
        if wire_len(&labels) > MAX_NAME_LEN {
            return Err(CompressorErrors::InvalidName(name.to_string()));
        }

        for i in 0..labels.len() {
            let suffix = labels[i..].join(".");

            match pointer_map.get(&suffix) {
                // Offsets past 14 bits cannot be encoded, the labels are written out instead.
                Some(&offset) if offset <= OFFSET_MASK as usize => {
                    let pointer = 0b1100_0000_0000_0000u16 | (offset as u16);
                    message.extend_from_slice(&pointer.to_be_bytes());
                    return Ok(());
                }
                Some(_) => {}
                None => {
                    pointer_map.insert(suffix, message.len());
                }
            }

            let label = labels[i];
            message.push(label.len() as u8);
            message.extend_from_slice(label.as_bytes());
        }

        message.push(0);
        Ok(())
    }

    /// Decodes the name starting at `start` inside `message`.
    ///
    /// Returns the dotted name (no trailing dot, `""` for the root) and the number of bytes the
    /// name occupies at `start`: up to and including the terminating zero, or up to and including
    /// the first compression pointer. The caller advances its cursor by that amount.
    ///
    /// # Errors
    /// - [`DecodeQueryErrors::TruncatedMessage`] if a label or pointer runs past the buffer.
    /// - [`DecodeQueryErrors::InvalidCompressionPointer`] for forward, self-referencing or
    ///   cyclic pointers.
    /// - [`DecodeQueryErrors::UnsupportedLabelType`] for the reserved `01`/`10` label types.
    /// - [`DecodeQueryErrors::NameTooLong`] if the expanded name exceeds 255 bytes.
    pub fn decompress(message: &[u8], start: usize) -> Result<(String, usize), DecodeQueryErrors> {
        let mut name = String::new();
        let mut position = start;
        let mut consumed: Option<usize> = None;
        let mut visited: Vec<usize> = Vec::new();
        let mut expanded_len = 1;

        loop {
            let length = *message
                .get(position)
                .ok_or_else(|| DecodeQueryErrors::truncated(position, message))?;

            match length & POINTER_FLAG {
                POINTER_FLAG => {
                    let low = *message
                        .get(position + 1)
                        .ok_or_else(|| DecodeQueryErrors::truncated(position + 1, message))?;
                    let target = (u16::from_be_bytes([length, low]) & OFFSET_MASK) as usize;

                    if target >= position || visited.contains(&position) {
                        return Err(DecodeQueryErrors::InvalidCompressionPointer {
                            offset: position,
                            target,
                        });
                    }
                    visited.push(position);

                    // Only the bytes before the first jump belong to the caller's cursor.
                    consumed.get_or_insert_with(|| position + 2 - start);
                    position = target;
                }
                0 => {
                    if length == 0 {
                        let consumed = consumed.unwrap_or_else(|| position + 1 - start);
                        return Ok((name, consumed));
                    }

                    let label_start = position + 1;
                    let label_end = label_start + length as usize;
                    let label = message
                        .get(label_start..label_end)
                        .ok_or_else(|| DecodeQueryErrors::truncated(label_end - 1, message))?;

                    expanded_len += 1 + label.len();
                    if expanded_len > MAX_NAME_LEN {
                        return Err(DecodeQueryErrors::NameTooLong { offset: start });
                    }

                    if !name.is_empty() {
                        name.push('.');
                    }
                    name.push_str(&String::from_utf8_lossy(label));
                    position = label_end;
                }
                _ => {
                    return Err(DecodeQueryErrors::UnsupportedLabelType {
                        offset: position,
                        label: length,
                    });
                }
            }
        }
    }
}

/// Uncompressed wire length of `labels`, terminating zero included.
fn wire_len(labels: &[&str]) -> usize {
    labels.iter().map(|label| 1 + label.len()).sum::<usize>() + 1
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CompressorErrors {
    #[error("Label too long (>63): {0}")]
    LabelTooLong(String),
    #[error("Name is to long (>255): {0}")]
    InvalidName(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_basic() {
        let message = MessageCompressor::encode("example.com").unwrap();

        // "example" = 7, "com" = 3, null terminator
        let expected = [
            7u8, b'e', b'x', b'a', b'm', b'p', b'l', b'e', 3u8, b'c', b'o', b'm', 0u8,
        ];
        assert_eq!(message, expected);
    }

    #[test]
    fn test_encode_root_and_trailing_dot() {
        assert_eq!(MessageCompressor::encode(".").unwrap(), vec![0u8]);
        assert_eq!(MessageCompressor::encode("").unwrap(), vec![0u8]);
        assert_eq!(
            MessageCompressor::encode("example.com.").unwrap(),
            MessageCompressor::encode("example.com").unwrap()
        );
    }

    #[test]
    fn test_encode_label_too_long() {
        let long_label = "a".repeat(64);
        let name = format!("{}.com", long_label);
        let result = MessageCompressor::encode(&name);
        assert!(matches!(result, Err(CompressorErrors::LabelTooLong(_))));

        let ok_label = "a".repeat(63);
        assert!(MessageCompressor::encode(&format!("{}.com", ok_label)).is_ok());
    }

    #[test]
    fn test_encode_name_too_long_leaves_buffer_untouched() {
        let name = vec!["abcdefghij"; 30].join(".");
        let mut message = vec![1, 2, 3];
        let result = MessageCompressor::encode_into(&name, &mut message);
        assert!(matches!(result, Err(CompressorErrors::InvalidName(_))));
        assert_eq!(message, vec![1, 2, 3]);
    }

    #[test]
    fn test_compressor_compression_with_pointer() {
        let mut message = Vec::new();
        let mut pointer_map = HashMap::new();

        MessageCompressor::compress("example.com", &mut message, &mut pointer_map).unwrap();
        let first_len = message.len();

        // Reusing the same name should produce a pointer
        MessageCompressor::compress("example.com", &mut message, &mut pointer_map).unwrap();

        let pointer_bytes = &message[first_len..];
        assert_eq!(pointer_bytes, &[0xC0, 0x00]);
    }

    #[test]
    fn test_compressor_multiple_labels_and_suffixes() {
        let mut message = Vec::new();
        let mut pointer_map = HashMap::new();

        MessageCompressor::compress("www.example.com", &mut message, &mut pointer_map).unwrap();
        let len_after_first = message.len();

        MessageCompressor::compress("mail.example.com", &mut message, &mut pointer_map).unwrap();

        // "mail" label followed by a pointer to "example.com" at offset 4
        let pointer_pos = len_after_first + 1 + 4;
        assert_eq!(&message[pointer_pos..], &[0xC0, 0x04]);

        let (name, consumed) = MessageCompressor::decompress(&message, len_after_first).unwrap();
        assert_eq!(name, "mail.example.com");
        assert_eq!(consumed, 1 + 4 + 2);
    }

    #[test]
    fn test_decompress_round_trip() {
        let names = [
            "example.com",
            "www.example.com",
            "a.b.c.d.e.f.g",
            "systemadmin.es",
            &format!("{}.org", "x".repeat(63)),
        ];

        for name in names {
            let wire = MessageCompressor::encode(name).unwrap();
            let (decoded, consumed) = MessageCompressor::decompress(&wire, 0).unwrap();
            assert_eq!(decoded, name);
            assert_eq!(consumed, wire.len());
        }
    }

    #[test]
    fn test_decompress_root() {
        let (name, consumed) = MessageCompressor::decompress(&[0], 0).unwrap();
        assert_eq!(name, "");
        assert_eq!(consumed, 1);
    }

    #[test]
    fn test_decompress_pointer_counts_only_bytes_before_jump() {
        // 12 bytes of fake header, then "example.com" at offset 12
        let mut message = vec![0u8; 12];
        message.extend(MessageCompressor::encode("example.com").unwrap());
        let second = message.len();
        // "www" + pointer to offset 12
        message.extend_from_slice(&[3, b'w', b'w', b'w', 0xC0, 12]);
        message.extend_from_slice(&[0xAA, 0xBB]);

        let (name, consumed) = MessageCompressor::decompress(&message, second).unwrap();
        assert_eq!(name, "www.example.com");
        assert_eq!(consumed, 6);
        assert_eq!(message[second + consumed], 0xAA);
    }

    #[test]
    fn test_decompress_owner_pointing_back_to_question() {
        let mut message = vec![0u8; 12];
        message.extend_from_slice(&MessageCompressor::encode("example.com").unwrap());
        message.extend_from_slice(&[0x00, 0x01, 0x00, 0x01]);
        let owner = message.len();
        message.extend_from_slice(&[0xC0, 0x0C]);

        assert_eq!(owner, 29);
        let (name, consumed) = MessageCompressor::decompress(&message, owner).unwrap();
        assert_eq!(name, "example.com");
        assert_eq!(consumed, 2);
    }

    #[test]
    fn test_decompress_pointer_chain() {
        let mut message = vec![0u8; 12];
        // 12: com
        message.extend_from_slice(&[3, b'c', b'o', b'm', 0]);
        // 17: example -> 12
        message.push(7);
        message.extend_from_slice(b"example");
        message.extend_from_slice(&[0xC0, 0x0C]);
        // 27: www -> 17
        message.extend_from_slice(&[3, b'w', b'w', b'w', 0xC0, 0x11]);
        message.extend_from_slice(&[0xC0, 0x1B]);

        let (name, consumed) = MessageCompressor::decompress(&message, 27).unwrap();
        assert_eq!(name, "www.example.com");
        assert_eq!(consumed, 6);

        let (name, consumed) = MessageCompressor::decompress(&message, 33).unwrap();
        assert_eq!(name, "www.example.com");
        assert_eq!(consumed, 2);
    }

    #[test]
    fn test_compress_and_encode_share_length_limit() {
        let label = "a".repeat(63);
        let fits = format!("{label}.{label}.{label}.{}", "b".repeat(61));
        let too_long = format!("{label}.{label}.{label}.{}", "b".repeat(62));

        assert_eq!(MessageCompressor::encode(&fits).unwrap().len(), MAX_NAME_LEN);
        let mut message = Vec::new();
        MessageCompressor::compress(&fits, &mut message, &mut HashMap::new()).unwrap();
        assert_eq!(message.len(), MAX_NAME_LEN);

        assert!(matches!(
            MessageCompressor::encode(&too_long),
            Err(CompressorErrors::InvalidName(_))
        ));
        let mut message = Vec::new();
        assert!(matches!(
            MessageCompressor::compress(&too_long, &mut message, &mut HashMap::new()),
            Err(CompressorErrors::InvalidName(_))
        ));
        assert!(message.is_empty());
    }

    #[test]
    fn test_decompress_rejects_self_pointer() {
        let mut message = vec![0u8; 12];
        message.extend_from_slice(&[0xC0, 12]);

        let result = MessageCompressor::decompress(&message, 12);
        assert_eq!(
            result,
            Err(DecodeQueryErrors::InvalidCompressionPointer {
                offset: 12,
                target: 12
            })
        );
    }

    #[test]
    fn test_decompress_rejects_forward_pointer() {
        let mut message = vec![0u8; 12];
        message.extend_from_slice(&[0xC0, 20, 0, 0, 0, 0, 0, 0, 1, b'a', 0]);

        let result = MessageCompressor::decompress(&message, 12);
        assert!(matches!(
            result,
            Err(DecodeQueryErrors::InvalidCompressionPointer { offset: 12, target: 20 })
        ));
    }

    #[test]
    fn test_decompress_rejects_pointer_cycle() {
        // offset 0: "abc", offset 4: pointer back to 0 -> "abc" -> pointer at 4 again
        let message = [3, b'a', b'b', b'c', 0xC0, 0x00];

        let result = MessageCompressor::decompress(&message, 4);
        assert!(matches!(
            result,
            Err(DecodeQueryErrors::InvalidCompressionPointer { offset: 4, .. })
        ));
    }

    #[test]
    fn test_decompress_truncated() {
        let message = [7, b'e', b'x', b'a'];
        assert!(matches!(
            MessageCompressor::decompress(&message, 0),
            Err(DecodeQueryErrors::TruncatedMessage { .. })
        ));

        // pointer missing its second byte
        assert!(matches!(
            MessageCompressor::decompress(&[0xC0], 0),
            Err(DecodeQueryErrors::TruncatedMessage { .. })
        ));

        // missing terminator
        assert!(matches!(
            MessageCompressor::decompress(&[1, b'a'], 0),
            Err(DecodeQueryErrors::TruncatedMessage { .. })
        ));
    }

    #[test]
    fn test_decompress_reserved_label_type() {
        let result = MessageCompressor::decompress(&[0b0100_0001, b'a', 0], 0);
        assert!(matches!(
            result,
            Err(DecodeQueryErrors::UnsupportedLabelType { offset: 0, label: 0x41 })
        ));
    }
}
