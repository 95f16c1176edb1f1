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

use log::debug;

use super::bitfield::BitTable;
use super::codec::{LenencBytes, LengthEncodedInt, PayloadReader};
use super::consts::*;
use super::state::{PacketKind, Phase, SessionState};
use super::statement::StatementAccess;
use super::tables::DecoderTables;
use crate::common::flow::PacketDirection;
use crate::config::MysqlConfig;
use crate::flow_generator::{
    error::{Error, Result},
    protocol_logs::{FieldSink, FieldValue},
};

const CLIPPED_SUFFIX: &str = "...";

/// Decodes one PDU against a session state. The request and response
/// routines live in `request.rs` and `response.rs`.
pub(super) struct Dissector<'a> {
    pub state: &'a mut SessionState,
    pub statements: StatementAccess<'a>,
    pub tables: &'a DecoderTables,
    pub config: &'a MysqlConfig,
    pub sink: &'a mut dyn FieldSink,
    pub r: PayloadReader<'a>,
}

impl<'a> Dissector<'a> {
    pub fn new(
        state: &'a mut SessionState,
        statements: StatementAccess<'a>,
        tables: &'a DecoderTables,
        config: &'a MysqlConfig,
        sink: &'a mut dyn FieldSink,
        payload: &'a [u8],
    ) -> Self {
        Self {
            state,
            statements,
            tables,
            config,
            sink,
            r: PayloadReader::new(payload),
        }
    }

    pub fn dissect(&mut self, direction: PacketDirection, kind: PacketKind) -> Result<()> {
        let result = match direction {
            PacketDirection::ClientToServer => self.request(kind),
            PacketDirection::ServerToClient => self.response(kind),
        };
        if let Err(e) = &result {
            let start = self.r.offset();
            if let Error::UnrecognizedPacket { .. } = e {
                self.state.phase = Phase::Uninitialized;
                self.emit_rest_bytes("payload");
            }
            debug!("mysql {} pdu failed: {}", direction, e);
            self.sink.add_expert(e, start..self.r.len());
        }
        result
    }

    pub fn unrecognized(&self) -> Error {
        Error::UnrecognizedPacket {
            phase: self.state.phase,
            leading: self.r.peek().unwrap_or_default(),
        }
    }

    pub fn field(&mut self, name: &'static str, value: FieldValue, start: usize) {
        self.sink.add_field(name, value, start..self.r.offset());
    }

    pub fn expert(&mut self, error: &Error, start: usize) {
        self.sink.add_expert(error, start..self.r.offset());
    }

    pub fn str_value(&self, bs: &[u8]) -> FieldValue {
        self.clip(FieldValue::Str(String::from_utf8_lossy(bs).into_owned()))
    }

    // cuts strings longer than max-display-length
    pub fn clip(&self, value: FieldValue) -> FieldValue {
        match value {
            FieldValue::Str(mut s) if s.len() > self.config.max_display_length => {
                let mut end = self.config.max_display_length;
                while !s.is_char_boundary(end) {
                    end -= 1;
                }
                s.truncate(end);
                s.push_str(CLIPPED_SUFFIX);
                FieldValue::Str(s)
            }
            v => v,
        }
    }

    pub fn emit_u8(&mut self, name: &'static str) -> Result<u8> {
        let start = self.r.offset();
        let v = self.r.u8()?;
        self.field(name, FieldValue::UInt(v as u64), start);
        Ok(v)
    }

    pub fn emit_u16(&mut self, name: &'static str) -> Result<u16> {
        let start = self.r.offset();
        let v = self.r.u16_le()?;
        self.field(name, FieldValue::UInt(v as u64), start);
        Ok(v)
    }

    pub fn emit_u24(&mut self, name: &'static str) -> Result<u32> {
        let start = self.r.offset();
        let v = self.r.u24_le()?;
        self.field(name, FieldValue::UInt(v as u64), start);
        Ok(v)
    }

    pub fn emit_u32(&mut self, name: &'static str) -> Result<u32> {
        let start = self.r.offset();
        let v = self.r.u32_le()?;
        self.field(name, FieldValue::UInt(v as u64), start);
        Ok(v)
    }

    pub fn emit_u64(&mut self, name: &'static str) -> Result<u64> {
        let start = self.r.offset();
        let v = self.r.u64_le()?;
        self.field(name, FieldValue::UInt(v), start);
        Ok(v)
    }

    pub fn emit_flags8(&mut self, name: &'static str, table: BitTable) -> Result<u8> {
        let start = self.r.offset();
        let v = self.r.u8()?;
        self.field(name, FieldValue::Flags(table.decode(v as u32)), start);
        Ok(v)
    }

    pub fn emit_flags16(&mut self, name: &'static str, table: BitTable) -> Result<u16> {
        let start = self.r.offset();
        let v = self.r.u16_le()?;
        self.field(name, FieldValue::Flags(table.decode(v as u32)), start);
        Ok(v)
    }

    pub fn emit_flags32(&mut self, name: &'static str, table: BitTable) -> Result<u32> {
        let start = self.r.offset();
        let v = self.r.u32_le()?;
        self.field(name, FieldValue::Flags(table.decode(v)), start);
        Ok(v)
    }

    pub fn emit_enum_u8(
        &mut self,
        name: &'static str,
        table: &'static [(u64, &'static str)],
    ) -> Result<u8> {
        let start = self.r.offset();
        let v = self.r.u8()?;
        self.field(
            name,
            FieldValue::Enum(v as u64, lookup_name(table, v as u64)),
            start,
        );
        Ok(v)
    }

    pub fn emit_enum_u16(
        &mut self,
        name: &'static str,
        table: &'static [(u64, &'static str)],
    ) -> Result<u16> {
        let start = self.r.offset();
        let v = self.r.u16_le()?;
        self.field(
            name,
            FieldValue::Enum(v as u64, lookup_name(table, v as u64)),
            start,
        );
        Ok(v)
    }

    pub fn emit_field_type(&mut self, name: &'static str) -> Result<u8> {
        let start = self.r.offset();
        let v = self.r.u8()?;
        self.field(name, FieldValue::Enum(v as u64, FieldType::name(v)), start);
        Ok(v)
    }

    pub fn emit_lenenc_int(&mut self, name: &'static str) -> Result<LengthEncodedInt> {
        let start = self.r.offset();
        let v = self.r.lenenc_int()?;
        let value = if v.is_null {
            FieldValue::Null
        } else {
            FieldValue::UInt(v.value)
        };
        self.field(name, value, start);
        if v.truncated {
            self.expert(&Error::Truncated, start);
        }
        Ok(v)
    }

    pub fn emit_lenenc_str(&mut self, name: &'static str) -> Result<Option<&'a [u8]>> {
        self.emit_lenenc(name, true)
    }

    pub fn emit_lenenc_bytes(&mut self, name: &'static str) -> Result<Option<&'a [u8]>> {
        self.emit_lenenc(name, false)
    }

    fn emit_lenenc(&mut self, name: &'static str, text: bool) -> Result<Option<&'a [u8]>> {
        let start = self.r.offset();
        match self.r.lenenc_bytes()? {
            LenencBytes::Null => {
                self.field(name, FieldValue::Null, start);
                Ok(None)
            }
            LenencBytes::Bytes { value, truncated } => {
                let v = if text {
                    self.str_value(value)
                } else {
                    FieldValue::Bytes(value.to_vec())
                };
                self.field(name, v, start);
                if truncated {
                    self.expert(&Error::Truncated, start);
                }
                Ok(Some(value))
            }
        }
    }

    // 1-byte length prefix
    pub fn emit_short_bytes(&mut self, name: &'static str, text: bool) -> Result<&'a [u8]> {
        let start = self.r.offset();
        let len = self.r.u8()?;
        let (value, truncated) = self.r.bytes_clamped(len as u64);
        let v = if text {
            self.str_value(value)
        } else {
            FieldValue::Bytes(value.to_vec())
        };
        self.field(name, v, start);
        if truncated {
            self.expert(&Error::Truncated, start);
        }
        Ok(value)
    }

    pub fn emit_null_str(&mut self, name: &'static str) -> &'a [u8] {
        let start = self.r.offset();
        let value = self.r.null_terminated();
        let v = self.str_value(value);
        self.field(name, v, start);
        value
    }

    pub fn emit_null_bytes(&mut self, name: &'static str) -> &'a [u8] {
        let start = self.r.offset();
        let value = self.r.null_terminated();
        self.field(name, FieldValue::Bytes(value.to_vec()), start);
        value
    }

    pub fn emit_fixed_str(&mut self, name: &'static str, n: usize) -> Result<&'a [u8]> {
        let start = self.r.offset();
        let value = self.r.bytes(n)?;
        let v = self.str_value(value);
        self.field(name, v, start);
        Ok(value)
    }

    pub fn emit_fixed_bytes(&mut self, name: &'static str, n: usize) -> Result<&'a [u8]> {
        let start = self.r.offset();
        let value = self.r.bytes(n)?;
        self.field(name, FieldValue::Bytes(value.to_vec()), start);
        Ok(value)
    }

    // a declared length that may run past the end of the PDU
    pub fn emit_clamped(&mut self, name: &'static str, n: u64, text: bool) -> &'a [u8] {
        let start = self.r.offset();
        let (value, truncated) = self.r.bytes_clamped(n);
        let v = if text {
            self.str_value(value)
        } else {
            FieldValue::Bytes(value.to_vec())
        };
        self.field(name, v, start);
        if truncated {
            self.expert(&Error::Truncated, start);
        }
        value
    }

    // nothing is emitted when the PDU is already consumed
    pub fn emit_rest_str(&mut self, name: &'static str) -> &'a [u8] {
        let start = self.r.offset();
        let value = self.r.rest();
        if !value.is_empty() {
            let v = self.str_value(value);
            self.field(name, v, start);
        }
        value
    }

    pub fn emit_rest_bytes(&mut self, name: &'static str) -> &'a [u8] {
        let start = self.r.offset();
        let value = self.r.rest();
        if !value.is_empty() {
            self.field(name, FieldValue::Bytes(value.to_vec()), start);
        }
        value
    }

    pub fn emit_null(&mut self, name: &'static str) {
        let start = self.r.offset();
        self.field(name, FieldValue::Null, start);
    }

    pub fn emit_binary_value(
        &mut self,
        name: &'static str,
        type_code: u8,
        unsigned: bool,
    ) -> Result<()> {
        let start = self.r.offset();
        let tables = self.tables;
        let (value, truncated) = tables.binary.decode(type_code, unsigned, &mut self.r)?;
        let value = self.clip(value);
        self.field(name, value, start);
        if truncated {
            self.expert(&Error::Truncated, start);
        }
        Ok(())
    }

    // checked before any count read from the wire sizes an allocation or a loop
    pub fn check_count(&self, count: u64) -> Result<()> {
        if count > self.config.max_field_count {
            return Err(Error::FieldCountExceeded {
                count,
                limit: self.config.max_field_count,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::flow_generator::protocol_logs::{
        sql::mysql::statement::StatementRegistry, VecSink,
    };

    #[test]
    fn clip_long_strings() {
        let mut state = SessionState::default();
        let registry = StatementRegistry::default();
        let tables = DecoderTables::default();
        let config = MysqlConfig {
            max_display_length: 4,
            ..Default::default()
        };
        let mut sink = VecSink::default();
        let payload = b"\x06abcdef\x02xy";
        let mut d = Dissector::new(
            &mut state,
            StatementAccess::Replay(&registry),
            &tables,
            &config,
            &mut sink,
            payload,
        );
        d.emit_lenenc_str("long").unwrap();
        d.emit_lenenc_str("short").unwrap();
        assert!(d.r.is_empty());

        assert_eq!(sink.field("long"), Some(&FieldValue::Str("abcd...".into())));
        assert_eq!(sink.field("short"), Some(&FieldValue::Str("xy".into())));
        let ranges = sink
            .fields()
            .map(|f| (f.start, f.end))
            .collect::<Vec<_>>();
        assert_eq!(ranges, vec![(0, 7), (7, 10)]);
    }

    #[test]
    fn count_bound() {
        let mut state = SessionState::default();
        let registry = StatementRegistry::default();
        let tables = DecoderTables::default();
        let config = MysqlConfig {
            max_field_count: 10,
            ..Default::default()
        };
        let mut sink = VecSink::default();
        let d = Dissector::new(
            &mut state,
            StatementAccess::Replay(&registry),
            &tables,
            &config,
            &mut sink,
            &[],
        );
        assert!(d.check_count(10).is_ok());
        assert_eq!(
            d.check_count(11).unwrap_err(),
            Error::FieldCountExceeded {
                count: 11,
                limit: 10
            }
        );
    }
}
