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

use std::fmt;

use public::bytes::{
    read_f32_le, read_f64_le, read_i16_le, read_i32_le, read_i64_le, read_u16_le, read_u32_le,
};
use serde::Serialize;

use super::codec::PayloadReader;
use super::consts::FieldType;
use crate::flow_generator::{
    error::{Error, Result},
    protocol_logs::FieldValue,
};

/// Decodes one value at the reader position. The flag is set when the value
/// was cut short by the end of the PDU.
pub type DecodeFn = fn(&mut PayloadReader<'_>) -> Result<(FieldValue, bool)>;

// a value past 999999 is not a microsecond count and is shown as sent
fn write_second_fraction(f: &mut fmt::Formatter<'_>, fraction: Option<u32>) -> fmt::Result {
    match fraction {
        Some(us) if us < 1_000_000 => write!(f, ".{:06}", us),
        Some(raw) => write!(f, " fraction={}", raw),
        None => Ok(()),
    }
}

#[derive(Serialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MysqlTime {
    pub negative: bool,
    pub days: u32,
    pub hours: u8,
    pub minutes: u8,
    pub seconds: u8,
    // microseconds, as the server sends them
    pub second_fraction: Option<u32>,
}

impl fmt::Display for MysqlTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "time {}{}d {:02}:{:02}:{:02}",
            if self.negative { "-" } else { "" },
            self.days,
            self.hours,
            self.minutes,
            self.seconds
        )?;
        write_second_fraction(f, self.second_fraction)
    }
}

#[derive(Serialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MysqlDateTime {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    // None when only the date part was sent
    pub time: Option<(u8, u8, u8)>,
    pub second_fraction: Option<u32>,
}

impl fmt::Display for MysqlDateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "datetime {:04}-{:02}-{:02}",
            self.year, self.month, self.day
        )?;
        if let Some((hour, minute, second)) = self.time {
            write!(f, " {:02}:{:02}:{:02}", hour, minute, second)?;
        }
        write_second_fraction(f, self.second_fraction)
    }
}

fn decode_tiny(r: &mut PayloadReader<'_>) -> Result<(FieldValue, bool)> {
    Ok((FieldValue::Int(r.u8()? as i8 as i64), false))
}

fn decode_utiny(r: &mut PayloadReader<'_>) -> Result<(FieldValue, bool)> {
    Ok((FieldValue::UInt(r.u8()? as u64), false))
}

fn decode_short(r: &mut PayloadReader<'_>) -> Result<(FieldValue, bool)> {
    Ok((FieldValue::Int(read_i16_le(r.bytes(2)?) as i64), false))
}

fn decode_ushort(r: &mut PayloadReader<'_>) -> Result<(FieldValue, bool)> {
    Ok((FieldValue::UInt(r.u16_le()? as u64), false))
}

fn decode_long(r: &mut PayloadReader<'_>) -> Result<(FieldValue, bool)> {
    Ok((FieldValue::Int(read_i32_le(r.bytes(4)?) as i64), false))
}

fn decode_ulong(r: &mut PayloadReader<'_>) -> Result<(FieldValue, bool)> {
    Ok((FieldValue::UInt(r.u32_le()? as u64), false))
}

fn decode_longlong(r: &mut PayloadReader<'_>) -> Result<(FieldValue, bool)> {
    Ok((FieldValue::Int(read_i64_le(r.bytes(8)?)), false))
}

fn decode_ulonglong(r: &mut PayloadReader<'_>) -> Result<(FieldValue, bool)> {
    Ok((FieldValue::UInt(r.u64_le()?), false))
}

fn decode_float(r: &mut PayloadReader<'_>) -> Result<(FieldValue, bool)> {
    Ok((FieldValue::Float(read_f32_le(r.bytes(4)?)), false))
}

fn decode_double(r: &mut PayloadReader<'_>) -> Result<(FieldValue, bool)> {
    Ok((FieldValue::Double(read_f64_le(r.bytes(8)?)), false))
}

fn decode_null(_: &mut PayloadReader<'_>) -> Result<(FieldValue, bool)> {
    Ok((FieldValue::Null, false))
}

fn decode_string(r: &mut PayloadReader<'_>) -> Result<(FieldValue, bool)> {
    let (value, truncated) = r.binary_string()?;
    Ok((
        FieldValue::Str(String::from_utf8_lossy(value).into_owned()),
        truncated,
    ))
}

fn decode_bytes(r: &mut PayloadReader<'_>) -> Result<(FieldValue, bool)> {
    let (value, truncated) = r.binary_string()?;
    Ok((FieldValue::Bytes(value.to_vec()), truncated))
}

// To save space the value can be compressed, the sub-length says which parts follow:
// 0 nothing, 1 sign, 5 sign+days, 8 +h:m:s, 12 +microseconds
fn decode_time(r: &mut PayloadReader<'_>) -> Result<(FieldValue, bool)> {
    let len = r.u8()? as usize;
    let (body, mut truncated) = r.bytes_clamped(len as u64);
    let mut t = MysqlTime::default();
    if len >= 1 {
        match body.first() {
            Some(sign) => t.negative = *sign == 1,
            None => truncated = true,
        }
    }
    if len >= 5 {
        match body.get(1..5) {
            Some(bs) => t.days = read_u32_le(bs),
            None => truncated = true,
        }
    }
    if len >= 8 {
        match body.get(5..8) {
            Some(bs) => {
                t.hours = bs[0];
                t.minutes = bs[1];
                t.seconds = bs[2];
            }
            None => truncated = true,
        }
    }
    if len >= 12 {
        match body.get(8..12) {
            Some(bs) => t.second_fraction = Some(read_u32_le(bs)),
            None => truncated = true,
        }
    }
    Ok((FieldValue::Time(t), truncated))
}

// 0 nothing, 4 date, 7 date+h:m:s, 11 +microseconds
fn decode_datetime(r: &mut PayloadReader<'_>) -> Result<(FieldValue, bool)> {
    let len = r.u8()? as usize;
    let (body, mut truncated) = r.bytes_clamped(len as u64);
    let mut t = MysqlDateTime::default();
    if len >= 2 {
        match body.get(0..2) {
            Some(bs) => t.year = read_u16_le(bs),
            None => truncated = true,
        }
    }
    if len >= 4 {
        match body.get(2..4) {
            Some(bs) => {
                t.month = bs[0];
                t.day = bs[1];
            }
            None => truncated = true,
        }
    }
    if len >= 7 {
        match body.get(4..7) {
            Some(bs) => t.time = Some((bs[0], bs[1], bs[2])),
            None => truncated = true,
        }
    }
    if len >= 11 {
        match body.get(7..11) {
            Some(bs) => t.second_fraction = Some(read_u32_le(bs)),
            None => truncated = true,
        }
    }
    Ok((FieldValue::DateTime(t), truncated))
}

#[derive(Clone, Copy)]
struct CodecEntry {
    type_code: u8,
    unsigned: bool,
    decode: DecodeFn,
}

impl fmt::Debug for CodecEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}(unsigned={})",
            FieldType::name(self.type_code),
            self.unsigned
        )
    }
}

/// (wire type, unsigned flag) -> decoder. Lookup is first match in
/// registration order; a missing pair is an explicit error.
#[derive(Debug, Clone)]
pub struct BinaryCodecTable {
    entries: Vec<CodecEntry>,
}

impl BinaryCodecTable {
    pub fn empty() -> Self {
        Self { entries: vec![] }
    }

    pub fn register(&mut self, field_type: FieldType, unsigned: bool, decode: DecodeFn) {
        self.entries.push(CodecEntry {
            type_code: field_type as u8,
            unsigned,
            decode,
        });
    }

    // same decoder for both values of the unsigned flag
    fn register_both(&mut self, field_type: FieldType, decode: DecodeFn) {
        self.register(field_type, false, decode);
        self.register(field_type, true, decode);
    }

    pub fn lookup(&self, type_code: u8, unsigned: bool) -> Option<DecodeFn> {
        self.entries
            .iter()
            .find(|e| e.type_code == type_code && e.unsigned == unsigned)
            .map(|e| e.decode)
    }

    pub fn decode(
        &self,
        type_code: u8,
        unsigned: bool,
        reader: &mut PayloadReader<'_>,
    ) -> Result<(FieldValue, bool)> {
        let decode = self
            .lookup(type_code, unsigned)
            .ok_or(Error::UnsupportedBinaryType {
                type_code,
                unsigned,
            })?;
        decode(reader)
    }
}

impl Default for BinaryCodecTable {
    fn default() -> Self {
        let mut t = Self::empty();
        t.register(FieldType::Tiny, false, decode_tiny);
        t.register(FieldType::Tiny, true, decode_utiny);
        t.register(FieldType::Short, false, decode_short);
        t.register(FieldType::Short, true, decode_ushort);
        t.register(FieldType::Year, false, decode_short);
        t.register(FieldType::Year, true, decode_ushort);
        t.register(FieldType::Long, false, decode_long);
        t.register(FieldType::Long, true, decode_ulong);
        t.register(FieldType::Int24, false, decode_long);
        t.register(FieldType::Int24, true, decode_ulong);
        t.register(FieldType::Longlong, false, decode_longlong);
        t.register(FieldType::Longlong, true, decode_ulonglong);
        t.register_both(FieldType::Float, decode_float);
        t.register_both(FieldType::Double, decode_double);
        t.register_both(FieldType::Null, decode_null);
        t.register_both(FieldType::Time, decode_time);
        for ty in [
            FieldType::Date,
            FieldType::Datetime,
            FieldType::Timestamp,
            FieldType::NewDate,
        ] {
            t.register_both(ty, decode_datetime);
        }
        for ty in [
            FieldType::Decimal,
            FieldType::Varchar,
            FieldType::Json,
            FieldType::NewDecimal,
            FieldType::Enum,
            FieldType::Set,
            FieldType::TinyBlob,
            FieldType::MediumBlob,
            FieldType::LongBlob,
            FieldType::Blob,
            FieldType::VarString,
            FieldType::String,
        ] {
            t.register_both(ty, decode_string);
        }
        t.register_both(FieldType::Bit, decode_bytes);
        t.register_both(FieldType::Geometry, decode_bytes);
        t
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_parameter(field_type: FieldType, unsigned: bool, payload: Vec<u8>) -> String {
        let table = BinaryCodecTable::default();
        let mut reader = PayloadReader::new(&payload);
        match table.decode(field_type as u8, unsigned, &mut reader) {
            Ok((v, _)) => v.to_string(),
            Err(e) => e.to_string(),
        }
    }

    #[test]
    fn test_parse_parameter() {
        let mut cases = vec![
            (FieldType::Long, false, vec![1, 0, 0, 0], "1"),
            (FieldType::Long, false, vec![0xff, 0xff, 0xff, 0xff], "-1"),
            (FieldType::Long, true, vec![0xff, 0xff, 0xff, 0xff], "4294967295"),
            (FieldType::Int24, false, vec![1, 0, 0, 0], "1"),
            (FieldType::Short, false, vec![1, 0], "1"),
            (FieldType::Year, false, vec![0xda, 0x07], "2010"),
            (FieldType::Tiny, false, vec![0xfe], "-2"),
            (FieldType::Tiny, true, vec![0xfe], "254"),
            (
                FieldType::Longlong,
                true,
                vec![0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff],
                "18446744073709551615",
            ),
            (
                FieldType::Double,
                false,
                vec![0x66, 0x66, 0x66, 0x66, 0x66, 0x66, 0x24, 0x40],
                "10.2",
            ),
            (FieldType::Float, false, vec![0x33, 0x33, 0x23, 0x41], "10.2"),
            (
                FieldType::Date,
                false,
                vec![
                    0x0b, 0xda, 0x07, 0x0a, 0x11, 0x13, 0x1b, 0x1e, 0x01, 00, 00, 00,
                ],
                "datetime 2010-10-17 19:27:30.000001",
            ),
            (
                FieldType::Datetime,
                false,
                vec![0x04, 0xda, 0x07, 0x0a, 0x11],
                "datetime 2010-10-17",
            ),
            (
                FieldType::Timestamp,
                false,
                vec![0x07, 0xda, 0x07, 0x0a, 0x11, 0x13, 0x1b, 0x1e],
                "datetime 2010-10-17 19:27:30",
            ),
            (FieldType::Datetime, false, vec![0x00], "datetime 0000-00-00"),
            (
                FieldType::Time,
                false,
                vec![
                    0x0c, 0x01, 0x78, 0x00, 0x00, 0x00, 0x13, 0x1b, 0x1e, 0x01, 0x00, 0x00, 0x00,
                ],
                "time -120d 19:27:30.000001",
            ),
            (
                FieldType::Time,
                false,
                vec![0x08, 0x01, 0x78, 0x00, 0x00, 0x00, 0x13, 0x1b, 0x1e],
                "time -120d 19:27:30",
            ),
            (
                FieldType::Time,
                false,
                vec![0x0c, 0x00, 0, 0, 0, 0, 1, 2, 3, 0x00, 0x00, 0x0f, 0x00],
                "time 0d 01:02:03.983040",
            ),
            (
                FieldType::Datetime,
                false,
                vec![0x0b, 0xda, 0x07, 0x0a, 0x11, 0x13, 0x1b, 0x1e, 0xff, 0xc9, 0x9a, 0x3b],
                "datetime 2010-10-17 19:27:30 fraction=999999999",
            ),
            (FieldType::Time, false, vec![0x01, 0x00], "time 0d 00:00:00"),
            (FieldType::Time, false, vec![0x00], "time 0d 00:00:00"),
            (FieldType::VarString, false, vec![0x03, b'a', b'b', b'c'], "abc"),
            (FieldType::NewDecimal, true, vec![0x04, b'1', b'.', b'2', b'5'], "1.25"),
            (FieldType::Bit, false, vec![0x02, 0x01, 0x80], "0180"),
            (FieldType::Null, false, vec![], "NULL"),
        ];

        for (i, (field_type, unsigned, payload, except)) in cases.drain(..).enumerate() {
            let actual = parse_parameter(field_type, unsigned, payload);
            assert_eq!(
                actual,
                except.to_string(),
                "Cases {:3} field type {:?} error: except: {} but actual: {}.",
                i + 1,
                field_type,
                except,
                actual
            );
        }
    }

    #[test]
    fn time_sub_lengths() {
        let table = BinaryCodecTable::default();
        let payload = [8, 0, 0, 0, 0, 0, 1, 2, 3];
        let mut reader = PayloadReader::new(&payload);
        let (value, truncated) = table
            .decode(FieldType::Time as u8, false, &mut reader)
            .unwrap();
        assert!(!truncated);
        assert_eq!(reader.offset(), 9);
        assert_eq!(
            value,
            FieldValue::Time(MysqlTime {
                negative: false,
                days: 0,
                hours: 1,
                minutes: 2,
                seconds: 3,
                second_fraction: None,
            })
        );

        let payload = [12, 0, 0, 0, 0, 0, 1, 2, 3, 0, 0, 0x0f, 0];
        let mut reader = PayloadReader::new(&payload);
        let (value, _) = table
            .decode(FieldType::Time as u8, false, &mut reader)
            .unwrap();
        assert_eq!(reader.offset(), 13);
        match value {
            FieldValue::Time(t) => {
                assert_eq!((t.hours, t.minutes, t.seconds), (1, 2, 3));
                assert_eq!(t.second_fraction, Some(0x000f_0000));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn truncated_temporal() {
        let table = BinaryCodecTable::default();
        // claims 11 bytes, only the date part is present
        let payload = [11, 0xda, 0x07, 0x0a, 0x11];
        let mut reader = PayloadReader::new(&payload);
        let (value, truncated) = table
            .decode(FieldType::Datetime as u8, false, &mut reader)
            .unwrap();
        assert!(truncated);
        assert!(reader.is_empty());
        assert_eq!(value.to_string(), "datetime 2010-10-17");
    }

    #[test]
    fn missing_entries() {
        let table = BinaryCodecTable::default();
        for code in [0x11u8, 0x12, 0x13, 0x14, 0xf2, 0xf3, 0xf4, 0x20, 0x80] {
            for unsigned in [false, true] {
                assert!(table.lookup(code, unsigned).is_none(), "code {:#x}", code);
                let mut reader = PayloadReader::new(&[0x01]);
                assert_eq!(
                    table.decode(code, unsigned, &mut reader).unwrap_err(),
                    Error::UnsupportedBinaryType {
                        type_code: code,
                        unsigned
                    }
                );
                assert_eq!(reader.offset(), 0);
            }
        }
    }

    #[test]
    fn first_match_wins() {
        fn always_zero(_: &mut PayloadReader<'_>) -> Result<(FieldValue, bool)> {
            Ok((FieldValue::UInt(0), false))
        }
        let mut table = BinaryCodecTable::empty();
        table.register(FieldType::Tiny, false, decode_tiny);
        table.register(FieldType::Tiny, false, always_zero);
        let mut reader = PayloadReader::new(&[0x05]);
        assert_eq!(
            table
                .decode(FieldType::Tiny as u8, false, &mut reader)
                .unwrap()
                .0,
            FieldValue::Int(5)
        );
        assert!(table.lookup(FieldType::Tiny as u8, true).is_none());
    }

    #[test]
    fn short_fixed_width() {
        let table = BinaryCodecTable::default();
        let mut reader = PayloadReader::new(&[0x01, 0x02]);
        assert_eq!(
            table
                .decode(FieldType::Long as u8, false, &mut reader)
                .unwrap_err(),
            Error::PacketTooShort {
                needed: 4,
                remaining: 2
            }
        );
    }
}
