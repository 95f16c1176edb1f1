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

use log::trace;
use public::bitmap::NullBitmap;

use super::consts::*;
use super::dissector::Dissector;
use super::state::{CompressionState, PacketKind, Phase, SessionState};
use super::statement::ColumnSlot;
use crate::flow_generator::error::{Error, Result};

const SESSION_TRACK_SYSTEM_VARIABLES: u8 = 0;
const SESSION_TRACK_SCHEMA: u8 = 1;
const SESSION_TRACK_STATE_CHANGE: u8 = 2;
const SESSION_TRACK_GTIDS: u8 = 3;

// "5.5.5-10.6.12-MariaDB" -> 10, "8.0.32" -> 8
fn major_version(version: &str) -> u16 {
    let version = version
        .strip_prefix(MARIADB_VERSION_PREFIX)
        .unwrap_or(version);
    version
        .split('.')
        .next()
        .and_then(|major| major.parse().ok())
        .unwrap_or_default()
}

impl<'a> Dissector<'a> {
    pub(super) fn response(&mut self, kind: PacketKind) -> Result<()> {
        // the response following the login request is the last uncompressed packet
        if let CompressionState::Negotiating(alg) = self.state.compression {
            trace!("mysql compression {:?} active", alg);
            self.state.compression = CompressionState::Active(alg);
        }
        match kind {
            PacketKind::Greeting => self.greeting(),
            PacketKind::Error => self.error_packet(),
            PacketKind::Ok => self.ok_packet(),
            PacketKind::Eof { intermediate } => self.eof_packet(intermediate),
            PacketKind::AuthSwitchRequest => {
                self.state.phase = Phase::AuthSwitchRequest;
                self.emit_u8("response_code")?;
                if !self.r.is_empty() {
                    self.emit_null_str("auth_plugin");
                }
                self.emit_rest_bytes("auth_data");
                Ok(())
            }
            PacketKind::AuthMoreData => {
                self.emit_u8("response_code")?;
                // fast auth success is followed by the server's OK, anything else waits on the client
                self.state.phase = if self.r.peek_rest() == [AUTH_MORE_DATA_FAST_AUTH_SUCCESS] {
                    Phase::AuthSwitchResponse
                } else {
                    Phase::AuthSwitchRequest
                };
                self.emit_rest_bytes("auth_data");
                Ok(())
            }
            PacketKind::Message => {
                self.state.phase = Phase::IdleReady;
                self.emit_rest_str("message");
                Ok(())
            }
            PacketKind::ColumnCount => self.column_count(),
            PacketKind::FieldDefinition { show_fields } => self.field_definition(show_fields),
            PacketKind::PreparedParameter => self.prepared_definition(true),
            PacketKind::PreparedField => self.prepared_definition(false),
            PacketKind::Row => self.row(),
            PacketKind::PrepareOk => self.prepare_ok(),
            PacketKind::BinlogEvent => self.binlog_event(),
            PacketKind::LocalInfileRequest => {
                self.state.phase = Phase::LocalInfile;
                self.emit_u8("response_code")?;
                self.emit_rest_str("local_infile_filename");
                Ok(())
            }
            _ => Err(self.unrecognized()),
        }
    }

    fn greeting(&mut self) -> Result<()> {
        // a greeting starts a new session on this flow
        *self.state = SessionState {
            phase: Phase::AwaitingLogin,
            ..Default::default()
        };
        self.state.protocol_version = self.emit_u8("protocol_version")?;
        let version = String::from_utf8_lossy(self.emit_null_str("server_version")).into_owned();
        self.state.is_mariadb = version.contains(MARIADB_VERSION_MARKER);
        self.state.major_version = major_version(&version);
        self.emit_u32("thread_id")?;
        self.emit_fixed_bytes("salt", SALT_LEN)?;
        self.r.skip(1)?;

        let caps = Capabilities::from_bits_truncate(
            self.emit_flags16("server_capabilities", self.tables.capabilities)?,
        );
        self.state.server_caps = caps;
        if self.r.is_empty() {
            return Ok(());
        }
        self.emit_u8("server_language")?;
        self.emit_flags16("server_status", self.tables.server_status)?;
        let ext = self.emit_flags16("server_extended_capabilities", self.tables.ext_capabilities)?;
        self.state.server_ext_caps = ExtCapabilities::from_bits_truncate(ext);
        let auth_len = self.emit_u8("auth_plugin_data_length")?;
        self.r.skip(GREETING_RESERVED_LEN)?;
        if self.state.is_mariadb && !caps.contains(Capabilities::LONG_PASSWORD) {
            let mariadb =
                self.emit_flags32("mariadb_capabilities", self.tables.mariadb_capabilities)?;
            self.state.mariadb_caps = MariadbCapabilities::from_bits_truncate(mariadb);
        } else {
            self.r.skip(LOGIN_MARIADB_CAPS_LEN)?;
        }
        if caps.contains(Capabilities::SECURE_CONNECTION) && !self.r.is_empty() {
            let len = (auth_len as usize)
                .saturating_sub(SALT_LEN)
                .max(SALT2_MIN_LEN);
            self.emit_clamped("salt2", len as u64, false);
        }
        if self.state.has_ext(ExtCapabilities::PLUGIN_AUTH) && !self.r.is_empty() {
            self.emit_null_str("auth_plugin");
        }
        Ok(())
    }

    fn error_packet(&mut self) -> Result<()> {
        let previous = self.state.phase;
        self.state.phase = Phase::IdleReady;
        self.emit_u8("response_code")?;
        let code = self.emit_u16("error_code")?;
        if code == MARIADB_PROGRESS_CODE {
            // progress reports interleave with the pending result
            self.state.phase = previous;
            self.emit_u8("progress_stage")?;
            self.emit_u8("progress_max_stage")?;
            self.emit_u24("progress")?;
            self.emit_lenenc_str("progress_info")?;
            return Ok(());
        }
        if self.r.peek() == Some(SQL_STATE_MARKER) {
            self.r.skip(1)?;
            self.emit_fixed_str("sql_state", SQL_STATE_LEN)?;
        }
        self.emit_rest_str("error_message");
        Ok(())
    }

    fn ok_packet(&mut self) -> Result<()> {
        self.emit_u8("response_code")?;
        self.emit_lenenc_int("affected_rows")?;
        self.emit_lenenc_int("last_insert_id")?;

        let caps = self.state.caps();
        let mut status = ServerStatus::empty();
        if caps.contains(Capabilities::PROTOCOL_41) {
            status = ServerStatus::from_bits_truncate(
                self.emit_flags16("server_status", self.tables.server_status)?,
            );
            self.emit_u16("warnings")?;
        } else if caps.contains(Capabilities::TRANSACTIONS) {
            status = ServerStatus::from_bits_truncate(
                self.emit_flags16("server_status", self.tables.server_status)?,
            );
        }
        self.state.phase = if status.contains(ServerStatus::MORE_RESULTS_EXISTS) {
            Phase::ColumnCount
        } else {
            Phase::IdleReady
        };

        if self.state.has_ext(ExtCapabilities::SESSION_TRACK) {
            if !self.r.is_empty() {
                self.emit_lenenc_str("info")?;
            }
            if status.contains(ServerStatus::SESSION_STATE_CHANGED) && !self.r.is_empty() {
                self.session_state()?;
            }
        } else {
            self.emit_rest_str("info");
        }
        Ok(())
    }

    fn session_state(&mut self) -> Result<()> {
        let len = self.emit_lenenc_int("session_state_length")?.value;
        let end = (self.r.offset() as u64 + len).min(self.r.len() as u64) as usize;
        while self.r.offset() < end {
            let ty = self.emit_enum_u8("session_track_type", SESSION_TRACK_TYPES)?;
            let data_len = self.emit_lenenc_int("session_track_length")?.value;
            let data_end = (self.r.offset() as u64 + data_len).min(end as u64) as usize;
            match ty {
                SESSION_TRACK_SYSTEM_VARIABLES => {
                    self.emit_lenenc_str("variable_name")?;
                    self.emit_lenenc_str("variable_value")?;
                }
                SESSION_TRACK_SCHEMA => {
                    self.emit_lenenc_str("schema")?;
                }
                SESSION_TRACK_STATE_CHANGE => {
                    self.emit_lenenc_str("state_change")?;
                }
                SESSION_TRACK_GTIDS => {
                    self.emit_u8("gtid_encoding")?;
                    self.emit_lenenc_str("gtids")?;
                }
                _ => {
                    self.emit_lenenc_str("transaction_state")?;
                }
            }
            if self.r.offset() < data_end {
                self.r.skip(data_end - self.r.offset())?;
            }
        }
        Ok(())
    }

    fn eof_packet(&mut self, intermediate: bool) -> Result<()> {
        let phase = self.state.phase;
        self.emit_u8("response_code")?;
        let mut status = ServerStatus::empty();
        if self.r.remaining() >= 4 {
            self.emit_u16("warnings")?;
            status = ServerStatus::from_bits_truncate(
                self.emit_flags16("server_status", self.tables.server_status)?,
            );
        }
        self.state.phase = match phase {
            // separator between prepared parameter and field definitions
            Phase::PreparedParameterDefinition | Phase::PreparedFieldDefinition if intermediate => {
                phase
            }
            _ if intermediate => Phase::RowData,
            _ if status.contains(ServerStatus::MORE_RESULTS_EXISTS) => Phase::ColumnCount,
            _ => Phase::IdleReady,
        };
        Ok(())
    }

    fn column_count(&mut self) -> Result<()> {
        let count = self.emit_lenenc_int("field_count")?.value;
        self.check_count(count)?;
        let metadata_follows =
            if self.state.has_ext(ExtCapabilities::OPTIONAL_RESULTSET_METADATA) && !self.r.is_empty() {
                self.emit_u8("metadata_follows")? != 0
            } else {
                true
            };
        self.state.field_index = 0;
        if metadata_follows && count > 0 {
            self.state.remaining_fields = count;
            self.state.phase = Phase::FieldDefinition;
        } else {
            self.state.remaining_fields = 0;
            self.state.phase = Phase::RowData;
        }
        Ok(())
    }

    // phase after the last column definition of a result set
    fn after_columns(&self) -> Phase {
        if self.state.deprecate_eof {
            Phase::RowData
        } else {
            Phase::IntermediateEof
        }
    }

    fn field_definition(&mut self, show_fields: bool) -> Result<()> {
        let index = self.state.field_index as usize;
        if !show_fields {
            self.state.remaining_fields = self.state.remaining_fields.saturating_sub(1);
            self.state.field_index += 1;
            if self.state.remaining_fields == 0 {
                self.state.phase = self.after_columns();
            }
        }

        let column = self.column_definition()?;
        if show_fields && !self.r.is_empty() {
            self.emit_lenenc_str("default_value")?;
        }
        // an EXECUTE result describes the statement's columns
        if let (Some(id), true) = (self.state.active_statement, self.state.binary_rows) {
            self.statements
                .update(|r| r.populate_field(id, index, column.field_type, column.flags))?;
        }
        Ok(())
    }

    fn prepared_definition(&mut self, parameter: bool) -> Result<()> {
        let index = self.state.field_index as usize;
        self.state.remaining_fields = self.state.remaining_fields.saturating_sub(1);
        self.state.field_index += 1;
        if self.state.remaining_fields == 0 {
            self.state.field_index = 0;
            if parameter && self.state.prepared_fields > 0 {
                self.state.remaining_fields = self.state.prepared_fields as u64;
                self.state.phase = Phase::PreparedFieldDefinition;
            } else {
                self.state.phase = Phase::IdleReady;
            }
        }

        let column = self.column_definition()?;
        if let Some(id) = self.state.last_prepared {
            self.statements.update(|r| {
                if parameter {
                    r.populate_parameter(id, index, column.field_type, column.unsigned())
                } else {
                    r.populate_field(id, index, column.field_type, column.flags)
                }
            })?;
        }
        Ok(())
    }

    fn column_definition(&mut self) -> Result<ColumnSlot> {
        if !self.state.caps().contains(Capabilities::PROTOCOL_41) {
            return self.column_definition_320();
        }
        self.emit_lenenc_str("catalog")?;
        self.emit_lenenc_str("schema")?;
        self.emit_lenenc_str("table")?;
        self.emit_lenenc_str("original_table")?;
        self.emit_lenenc_str("name")?;
        self.emit_lenenc_str("original_name")?;
        if self
            .state
            .mariadb_caps
            .contains(MariadbCapabilities::EXTENDED_TYPE_INFO)
        {
            self.emit_lenenc_bytes("extended_metadata")?;
        }
        self.emit_lenenc_int("fixed_fields_length")?;
        self.emit_u16("charset")?;
        self.emit_u32("column_length")?;
        let field_type = self.emit_field_type("field_type")?;
        let flags = FieldFlags::from_bits_truncate(
            self.emit_flags16("field_flags", self.tables.field_flags)?,
        );
        self.emit_u8("decimals")?;
        if self.r.remaining() >= 2 {
            self.r.skip(2)?;
        }
        Ok(ColumnSlot { field_type, flags })
    }

    // pre-4.1 layout: every attribute carries its own length byte
    fn column_definition_320(&mut self) -> Result<ColumnSlot> {
        self.emit_lenenc_str("table")?;
        self.emit_lenenc_str("name")?;
        self.r.skip(1)?;
        self.emit_u24("column_length")?;
        self.r.skip(1)?;
        let field_type = self.emit_field_type("field_type")?;
        let len = self.r.u8()?;
        let flags = if len == 3 {
            FieldFlags::from_bits_truncate(self.emit_flags16("field_flags", self.tables.field_flags)?)
        } else {
            FieldFlags::from_bits_truncate(
                self.emit_flags8("field_flags", self.tables.field_flags)? as u16,
            )
        };
        self.emit_u8("decimals")?;
        Ok(ColumnSlot { field_type, flags })
    }

    fn row(&mut self) -> Result<()> {
        if self.state.phase == Phase::IntermediateEof {
            self.state.phase = Phase::RowData;
        }
        if !self.state.binary_rows {
            while !self.r.is_empty() {
                self.emit_lenenc_str("column_value")?;
            }
            return Ok(());
        }
        if !self.config.decode_binary_rows {
            self.emit_rest_bytes("row_data");
            return Ok(());
        }

        let columns = match self.state.active_statement {
            Some(id) => match self.statements.resolve(id, Some(id)) {
                Ok((_, stmt)) => stmt.fields().to_vec(),
                Err(e) => {
                    self.emit_rest_bytes("row_data");
                    return Err(e);
                }
            },
            None => {
                self.emit_rest_bytes("row_data");
                return Ok(());
            }
        };
        self.check_count(columns.len() as u64)?;
        self.emit_u8("packet_header")?;
        let len = NullBitmap::byte_len(columns.len(), BINARY_ROW_NULL_BITMAP_OFFSET);
        let nulls = self.emit_fixed_bytes("null_bitmap", len)?;
        let bitmap = NullBitmap::new(nulls, BINARY_ROW_NULL_BITMAP_OFFSET);
        for (i, column) in columns.iter().enumerate() {
            if bitmap.get(i).unwrap_or(false) {
                self.emit_null("column_value");
                continue;
            }
            self.emit_binary_value("column_value", column.field_type, column.unsigned())?;
        }
        Ok(())
    }

    fn prepare_ok(&mut self) -> Result<()> {
        self.emit_u8("response_code")?;
        let id = self.emit_u32("statement_id")?;
        let field_count = self.emit_u16("field_count")?;
        let param_count = self.emit_u16("parameter_count")?;
        self.check_count(field_count as u64)?;
        self.check_count(param_count as u64)?;

        let s = &mut *self.state;
        s.last_prepared = Some(id);
        s.prepared_fields = field_count;
        s.field_index = 0;
        if param_count > 0 {
            s.remaining_fields = param_count as u64;
            s.phase = Phase::PreparedParameterDefinition;
        } else if field_count > 0 {
            s.remaining_fields = field_count as u64;
            s.phase = Phase::PreparedFieldDefinition;
        } else {
            s.remaining_fields = 0;
            s.phase = Phase::IdleReady;
        }
        self.statements.update(|r| {
            r.prepare(id, param_count, field_count);
            Ok(())
        })?;

        if self.r.is_empty() {
            return Ok(());
        }
        self.r.skip(1)?;
        if self.r.remaining() >= 2 {
            self.emit_u16("warnings")?;
        }
        if self.state.has_ext(ExtCapabilities::OPTIONAL_RESULTSET_METADATA) && !self.r.is_empty() {
            // no definitions follow
            if self.emit_u8("metadata_follows")? == 0 {
                self.state.remaining_fields = 0;
                self.state.phase = Phase::IdleReady;
            }
        }
        Ok(())
    }

    fn binlog_event(&mut self) -> Result<()> {
        self.emit_u8("response_code")?;
        self.emit_u32("timestamp")?;
        self.emit_enum_u8("event_type", BINLOG_EVENT_TYPES)?;
        self.emit_u32("server_id")?;
        self.emit_u32("event_size")?;
        self.emit_u32("log_position")?;
        self.emit_u16("event_flags")?;
        self.emit_rest_bytes("event_data");
        Ok(())
    }
}
