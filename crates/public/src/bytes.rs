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

// All multi-byte integers on the MySQL wire are little-endian.

pub fn read_i16_le(bs: &[u8]) -> i16 {
    assert!(bs.len() >= 2);
    i16::from_le_bytes(bs[..2].try_into().unwrap())
}

pub fn read_u16_le(bs: &[u8]) -> u16 {
    assert!(bs.len() >= 2);
    u16::from_le_bytes(bs[..2].try_into().unwrap())
}

pub fn read_u24_le(bs: &[u8]) -> u32 {
    assert!(bs.len() >= 3);
    bs[0] as u32 | (bs[1] as u32) << 8 | (bs[2] as u32) << 16
}

pub fn read_u32_le(bs: &[u8]) -> u32 {
    assert!(bs.len() >= 4);
    u32::from_le_bytes(bs[..4].try_into().unwrap())
}

pub fn read_i32_le(bs: &[u8]) -> i32 {
    assert!(bs.len() >= 4);
    i32::from_le_bytes(bs[..4].try_into().unwrap())
}

pub fn read_u64_le(bs: &[u8]) -> u64 {
    assert!(bs.len() >= 8);
    u64::from_le_bytes(bs[..8].try_into().unwrap())
}

pub fn read_i64_le(bs: &[u8]) -> i64 {
    assert!(bs.len() >= 8);
    i64::from_le_bytes(bs[..8].try_into().unwrap())
}

pub fn read_f64_le(bs: &[u8]) -> f64 {
    assert!(bs.len() >= 8);
    f64::from_le_bytes(bs[..8].try_into().unwrap())
}

pub fn read_f32_le(bs: &[u8]) -> f32 {
    assert!(bs.len() >= 4);
    f32::from_le_bytes(bs[..4].try_into().unwrap())
}

// Reads up to 8 bytes as a little-endian unsigned value. Shorter input
// yields the value of the bytes present, as if the missing high bytes were 0.
pub fn read_uint_le_clamped(bs: &[u8]) -> u64 {
    bs.iter()
        .take(8)
        .rev()
        .fold(0u64, |acc, &b| (acc << 8) | b as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_little_endian() {
        let bs = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];
        assert_eq!(read_u16_le(&bs), 0x0201);
        assert_eq!(read_u24_le(&bs), 0x030201);
        assert_eq!(read_u32_le(&bs), 0x04030201);
        assert_eq!(read_u64_le(&bs), 0x0807060504030201);
        assert_eq!(read_i16_le(&[0xff, 0xff]), -1);
        assert_eq!(read_i32_le(&[0xfe, 0xff, 0xff, 0xff]), -2);
        assert_eq!(read_f32_le(&[0x33, 0x33, 0x23, 0x41]), 10.2);
        assert_eq!(read_i64_le(&[0xff; 8]), -1);
        assert_eq!(read_f64_le(&1.5f64.to_le_bytes()), 1.5);
    }

    #[test]
    fn clamped_read() {
        assert_eq!(read_uint_le_clamped(&[]), 0);
        assert_eq!(read_uint_le_clamped(&[0x00, 0x01]), 256);
        assert_eq!(
            read_uint_le_clamped(&[1, 0, 0, 0, 0, 0, 0, 0, 0xff]),
            1,
            "bytes past the eighth are ignored"
        );
    }
}
