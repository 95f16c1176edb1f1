/*
 * Copyright (c) 2024 Yunshan Networks
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

use public::bytes::{read_u16_le, read_u24_le, read_u32_le, read_u64_le, read_uint_le_clamped};

use super::consts::*;
use crate::flow_generator::error::{Error, Result};

/// Result of decoding a length-encoded integer.
///
/// `truncated` is set when the prefix announced more bytes than the buffer
/// holds; `value` is then built from the bytes that were present and
/// `consumed` never reaches past the end of the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LengthEncodedInt {
    pub value: u64,
    pub consumed: usize,
    pub is_null: bool,
    pub truncated: bool,
}

pub fn decode_length_encoded_int(payload: &[u8], offset: usize) -> Option<LengthEncodedInt> {
    let first = *payload.get(offset)?;
    let width = match first {
        INT_FLAGS_NULL => {
            return Some(LengthEncodedInt {
                consumed: INT_BASE_LEN,
                is_null: true,
                ..Default::default()
            })
        }
        INT_FLAGS_2 => 2,
        INT_FLAGS_3 => 3,
        INT_FLAGS_8 => 8,
        _ => {
            return Some(LengthEncodedInt {
                value: first as u64,
                consumed: INT_BASE_LEN,
                ..Default::default()
            })
        }
    };
    let start = offset + INT_BASE_LEN;
    let available = payload.len() - start;
    let taken = width.min(available);
    Some(LengthEncodedInt {
        value: read_uint_le_clamped(&payload[start..start + taken]),
        consumed: INT_BASE_LEN + taken,
        is_null: false,
        truncated: taken < width,
    })
}

/// Length prefix of a string inside a binary-protocol value.
///
/// Unlike the length-encoded integer there is no NULL marker and no 8-byte
/// form: anything below 0xfc, and 0xfe/0xff, is a literal 1-byte length.
/// Returns `(length, prefix bytes consumed, truncated)`.
pub fn decode_binary_string_length(payload: &[u8], offset: usize) -> Option<(u64, usize, bool)> {
    let first = *payload.get(offset)?;
    let width = match first {
        INT_FLAGS_2 => 2,
        INT_FLAGS_3 => 3,
        _ => return Some((first as u64, INT_BASE_LEN, false)),
    };
    let start = offset + INT_BASE_LEN;
    let taken = width.min(payload.len() - start);
    Some((
        read_uint_le_clamped(&payload[start..start + taken]),
        INT_BASE_LEN + taken,
        taken < width,
    ))
}

/// A length-encoded string as found on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LenencBytes<'a> {
    Null,
    Bytes { value: &'a [u8], truncated: bool },
}

/// Cursor over one PDU payload. Reads never go past the end of the payload:
/// fixed-width reads fail with `PacketTooShort`, length-prefixed reads clamp.
#[derive(Debug, Clone)]
pub struct PayloadReader<'a> {
    payload: &'a [u8],
    offset: usize,
}

impl<'a> PayloadReader<'a> {
    pub fn new(payload: &'a [u8]) -> Self {
        Self { payload, offset: 0 }
    }

    pub fn with_offset(payload: &'a [u8], offset: usize) -> Self {
        Self {
            payload,
            offset: offset.min(payload.len()),
        }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn remaining(&self) -> usize {
        self.payload.len() - self.offset
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub fn peek(&self) -> Option<u8> {
        self.payload.get(self.offset).copied()
    }

    pub fn peek_rest(&self) -> &'a [u8] {
        &self.payload[self.offset..]
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if n > self.remaining() {
            return Err(Error::PacketTooShort {
                needed: n,
                remaining: self.remaining(),
            });
        }
        let bs = &self.payload[self.offset..self.offset + n];
        self.offset += n;
        Ok(bs)
    }

    pub fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn u16_le(&mut self) -> Result<u16> {
        self.take(2).map(read_u16_le)
    }

    pub fn u24_le(&mut self) -> Result<u32> {
        self.take(3).map(read_u24_le)
    }

    pub fn u32_le(&mut self) -> Result<u32> {
        self.take(4).map(read_u32_le)
    }

    pub fn u64_le(&mut self) -> Result<u64> {
        self.take(8).map(read_u64_le)
    }

    pub fn bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        self.take(n)
    }

    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.take(n).map(|_| ())
    }

    // returns at most `n` bytes and whether the read was cut short
    pub fn bytes_clamped(&mut self, n: u64) -> (&'a [u8], bool) {
        let truncated = n > self.remaining() as u64;
        (self.clamp(n), truncated)
    }

    pub fn rest(&mut self) -> &'a [u8] {
        let bs = &self.payload[self.offset..];
        self.offset = self.payload.len();
        bs
    }

    // consumes the terminator when present; an unterminated string runs to the end
    pub fn null_terminated(&mut self) -> &'a [u8] {
        let rest = &self.payload[self.offset..];
        match rest.iter().position(|&b| b == SERVER_VERSION_EOF) {
            Some(pos) => {
                self.offset += pos + 1;
                &rest[..pos]
            }
            None => {
                self.offset = self.payload.len();
                rest
            }
        }
    }

    pub fn lenenc_int(&mut self) -> Result<LengthEncodedInt> {
        let v = decode_length_encoded_int(self.payload, self.offset).ok_or(
            Error::PacketTooShort {
                needed: INT_BASE_LEN,
                remaining: 0,
            },
        )?;
        self.offset += v.consumed;
        Ok(v)
    }

    pub fn lenenc_bytes(&mut self) -> Result<LenencBytes<'a>> {
        let len = self.lenenc_int()?;
        if len.is_null {
            return Ok(LenencBytes::Null);
        }
        let want = len.value;
        let value = self.clamp(want);
        Ok(LenencBytes::Bytes {
            value,
            truncated: len.truncated || (value.len() as u64) < want,
        })
    }

    pub fn binary_string(&mut self) -> Result<(&'a [u8], bool)> {
        let (len, consumed, truncated) = decode_binary_string_length(self.payload, self.offset)
            .ok_or(Error::PacketTooShort {
                needed: INT_BASE_LEN,
                remaining: 0,
            })?;
        self.offset += consumed;
        let value = self.clamp(len);
        Ok((value, truncated || (value.len() as u64) < len))
    }

    fn clamp(&mut self, n: u64) -> &'a [u8] {
        let n = n.min(self.remaining() as u64) as usize;
        let bs = &self.payload[self.offset..self.offset + n];
        self.offset += n;
        bs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(v: u64) -> Vec<u8> {
        match v {
            0..=250 => vec![v as u8],
            251..=0xffff => {
                let mut bs = vec![INT_FLAGS_2];
                bs.extend_from_slice(&(v as u16).to_le_bytes());
                bs
            }
            0x10000..=0xffffff => {
                let mut bs = vec![INT_FLAGS_3];
                bs.extend_from_slice(&(v as u32).to_le_bytes()[..3]);
                bs
            }
            _ => {
                let mut bs = vec![INT_FLAGS_8];
                bs.extend_from_slice(&v.to_le_bytes());
                bs
            }
        }
    }

    #[test]
    fn length_encoded_int_thresholds() {
        let cases = vec![
            (0u64, 1usize),
            (250, 1),
            (251, 3),
            (65535, 3),
            (65536, 4),
            (16777215, 4),
            (16777216, 9),
            (1 << 33, 9),
        ];
        for (i, (value, consumed)) in cases.into_iter().enumerate() {
            let bs = encode(value);
            let decoded = decode_length_encoded_int(&bs, 0).unwrap();
            assert_eq!(
                decoded,
                LengthEncodedInt {
                    value,
                    consumed,
                    is_null: false,
                    truncated: false,
                },
                "case {} value {}",
                i + 1,
                value
            );
        }
    }

    #[test]
    fn length_encoded_null() {
        let decoded = decode_length_encoded_int(&[0x00, 0xfb, 0x01], 1).unwrap();
        assert!(decoded.is_null);
        assert_eq!(decoded.consumed, 1);
        assert!(decode_length_encoded_int(&[0x01], 1).is_none());
    }

    #[test]
    fn length_encoded_int_clamped() {
        // 0xfe announces 8 bytes but only 2 follow
        let decoded = decode_length_encoded_int(&[0xfe, 0x01, 0x01], 0).unwrap();
        assert_eq!(decoded.consumed, 3);
        assert_eq!(decoded.value, 0x0101);
        assert!(decoded.truncated);
    }

    #[test]
    fn binary_string_length_variant() {
        let mut payload = vec![0x05];
        payload.extend_from_slice(b"hello");
        let mut reader = PayloadReader::new(&payload);
        assert_eq!(reader.binary_string().unwrap(), (&b"hello"[..], false));
        assert!(reader.is_empty());

        let mut payload = vec![0xfc, 0x00, 0x01];
        payload.extend(std::iter::repeat(b'x').take(256));
        assert_eq!(decode_binary_string_length(&payload, 0), Some((256, 3, false)));
        let mut reader = PayloadReader::new(&payload);
        let (value, truncated) = reader.binary_string().unwrap();
        assert_eq!(value.len(), 256);
        assert!(!truncated);
        assert_eq!(reader.offset(), 259);

        // 0xfb is a literal length here, not NULL
        assert_eq!(decode_binary_string_length(&[0xfb], 0), Some((251, 1, false)));
        assert_eq!(decode_binary_string_length(&[0xfe], 0), Some((254, 1, false)));
    }

    #[test]
    fn lenenc_string_clamped_at_boundary() {
        // claims 0x20 bytes, only 3 present
        let payload = [0x20, b'a', b'b', b'c'];
        let mut reader = PayloadReader::new(&payload);
        assert_eq!(
            reader.lenenc_bytes().unwrap(),
            LenencBytes::Bytes {
                value: b"abc",
                truncated: true
            }
        );
        assert_eq!(reader.offset(), payload.len());

        // three-byte length prefix that is itself cut off
        let payload = [0xfd, 0xff];
        let mut reader = PayloadReader::new(&payload);
        assert_eq!(
            reader.lenenc_bytes().unwrap(),
            LenencBytes::Bytes {
                value: b"",
                truncated: true
            }
        );
        assert!(reader.is_empty());

        let mut reader = PayloadReader::new(&[0xfb]);
        assert_eq!(reader.lenenc_bytes().unwrap(), LenencBytes::Null);
    }

    #[test]
    fn fixed_width_reads() {
        let payload = [0x01, 0x02, 0x03, 0x04, 0x05];
        let mut reader = PayloadReader::new(&payload);
        assert_eq!(reader.u24_le().unwrap(), 0x030201);
        assert_eq!(
            reader.u32_le().unwrap_err(),
            Error::PacketTooShort {
                needed: 4,
                remaining: 2
            }
        );
        assert_eq!(reader.u16_le().unwrap(), 0x0504);
        assert!(reader.is_empty());
    }

    #[test]
    fn null_terminated_strings() {
        let payload = b"root\0db";
        let mut reader = PayloadReader::new(payload);
        assert_eq!(reader.null_terminated(), b"root");
        assert_eq!(reader.null_terminated(), b"db");
        assert!(reader.is_empty());
        assert_eq!(reader.null_terminated(), b"");
    }
}
