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

use public::bitmap::NullBitmap;

use super::consts::*;
use super::dissector::Dissector;
use super::state::{CompressionAlgorithm, CompressionState, PacketKind, Phase};
use super::statement::ParameterSlot;
use crate::flow_generator::{error::Result, protocol_logs::FieldValue};

const BINLOG_THROUGH_GTID: u16 = 0x04;

impl<'a> Dissector<'a> {
    pub(super) fn request(&mut self, kind: PacketKind) -> Result<()> {
        match kind {
            PacketKind::SslRequest => {
                self.state.phase = Phase::AwaitingLogin;
                self.login(true)
            }
            PacketKind::LoginRequest => {
                self.state.phase = Phase::IdleReady;
                self.login(false)
            }
            PacketKind::AuthSwitchResponse => {
                self.state.phase = Phase::AuthSwitchResponse;
                self.emit_rest_bytes("auth_data");
                Ok(())
            }
            PacketKind::LocalInfileData => {
                // an empty packet ends the file
                if self.r.is_empty() {
                    self.state.phase = Phase::Ok;
                } else {
                    self.emit_rest_bytes("file_data");
                }
                Ok(())
            }
            PacketKind::Command => self.command(),
            _ => Err(self.unrecognized()),
        }
    }

    fn login(&mut self, ssl: bool) -> Result<()> {
        let caps =
            Capabilities::from_bits_truncate(self.emit_flags16("client_capabilities", self.tables.capabilities)?);
        self.state.client_caps = caps;
        if caps.contains(Capabilities::PROTOCOL_41) {
            let ext = self.emit_flags16(
                "client_extended_capabilities",
                self.tables.ext_capabilities,
            )?;
            self.state.client_ext_caps = ExtCapabilities::from_bits_truncate(ext);
            self.emit_u32("max_packet")?;
            self.emit_u8("charset")?;
            self.r.skip(LOGIN_FILLER_LEN)?;
            // MariaDB clients clear the long-password bit and use the last 4 filler bytes
            if self.state.is_mariadb && !caps.contains(Capabilities::LONG_PASSWORD) {
                let mariadb = self.emit_flags32(
                    "client_mariadb_capabilities",
                    self.tables.mariadb_capabilities,
                )?;
                self.state.mariadb_caps &= MariadbCapabilities::from_bits_truncate(mariadb);
            } else {
                self.r.skip(LOGIN_MARIADB_CAPS_LEN)?;
                self.state.mariadb_caps = MariadbCapabilities::empty();
            }
        } else {
            self.emit_u24("max_packet")?;
        }
        self.negotiate();
        if ssl {
            return Ok(());
        }

        self.emit_null_str("user");
        let ext = self.state.client_ext_caps;
        if ext.contains(ExtCapabilities::PLUGIN_AUTH_LENENC_CLIENT_DATA) {
            self.emit_lenenc_bytes("auth_response")?;
        } else if caps.contains(Capabilities::SECURE_CONNECTION) {
            self.emit_short_bytes("auth_response", false)?;
        } else {
            self.emit_null_bytes("auth_response");
        }
        if caps.contains(Capabilities::CONNECT_WITH_DB) && !self.r.is_empty() {
            self.emit_null_str("schema");
        }
        if ext.contains(ExtCapabilities::PLUGIN_AUTH) && !self.r.is_empty() {
            self.emit_null_str("client_auth_plugin");
        }
        if ext.contains(ExtCapabilities::CONNECT_ATTRS) && !self.r.is_empty() {
            self.connect_attrs()?;
        }
        if self.state.compression == CompressionState::Negotiating(CompressionAlgorithm::Zstd)
            && !self.r.is_empty()
        {
            self.emit_u8("zstd_compression_level")?;
        }
        Ok(())
    }

    fn negotiate(&mut self) {
        let s = &mut *self.state;
        let both = s.client_caps & s.server_caps;
        let both_ext = s.client_ext_caps & s.server_ext_caps;
        s.compression = if both.contains(Capabilities::COMPRESS) {
            CompressionState::Negotiating(CompressionAlgorithm::Zlib)
        } else if both_ext.contains(ExtCapabilities::ZSTD_COMPRESSION_ALGORITHM) {
            CompressionState::Negotiating(CompressionAlgorithm::Zstd)
        } else {
            CompressionState::Disabled
        };
        s.deprecate_eof = both_ext.contains(ExtCapabilities::DEPRECATE_EOF);
        s.local_infile = s.client_caps.contains(Capabilities::LOCAL_FILES);
    }

    fn connect_attrs(&mut self) -> Result<()> {
        let len = self.emit_lenenc_int("connect_attrs_length")?;
        let end = (self.r.offset() as u64 + len.value).min(self.r.len() as u64) as usize;
        while self.r.offset() < end {
            self.emit_lenenc_str("connect_attr_key")?;
            if self.r.offset() >= end {
                break;
            }
            self.emit_lenenc_str("connect_attr_value")?;
        }
        Ok(())
    }

    fn command(&mut self) -> Result<()> {
        let start = self.r.offset();
        let code = self.r.peek().unwrap_or_default();
        let command = match Command::try_from(code) {
            Ok(Command::Sleep) | Ok(Command::Daemon) | Err(_) => return Err(self.unrecognized()),
            Ok(c) => c,
        };
        self.r.skip(1)?;
        self.field("command", FieldValue::Enum(code as u64, command.as_str()), start);

        self.state.last_command = Some(command);
        self.state.binary_rows = false;
        self.state.active_statement = None;
        self.state.remaining_fields = 0;
        self.state.field_index = 0;
        self.state.phase = match command {
            Command::Statistics => Phase::Message,
            Command::ProcessInfo
            | Command::Query
            | Command::StmtExecute
            | Command::StmtBulkExecute => Phase::TabularResult,
            Command::FieldList => Phase::ShowFieldsResult,
            Command::StmtPrepare => Phase::PrepareResult,
            Command::StmtFetch => Phase::RowData,
            Command::Quit | Command::StmtClose | Command::StmtSendLongData => Phase::IdleReady,
            Command::BinlogDump | Command::BinlogDumpGtid => Phase::BinlogStream,
            _ => Phase::Ok,
        };

        match command {
            Command::InitDb | Command::CreateDb | Command::DropDb => {
                self.emit_rest_str("schema");
            }
            Command::Query => {
                self.query_attributes()?;
                self.emit_rest_str("query");
            }
            Command::StmtPrepare => {
                self.emit_rest_str("query");
            }
            Command::FieldList => {
                self.emit_null_str("table");
                self.emit_rest_str("wildcard");
            }
            Command::Refresh if !self.r.is_empty() => {
                self.emit_flags8("refresh_flags", self.tables.refresh)?;
            }
            Command::Shutdown if !self.r.is_empty() => {
                self.emit_enum_u8("shutdown_level", SHUTDOWN_LEVELS)?;
            }
            Command::ProcessKill => {
                self.emit_u32("process_id")?;
            }
            Command::SetOption => {
                self.emit_enum_u16("set_option", SET_OPTIONS)?;
            }
            Command::ChangeUser => self.change_user()?,
            Command::StmtClose | Command::StmtReset => {
                self.emit_u32("statement_id")?;
            }
            Command::StmtFetch => {
                let raw_id = self.emit_u32("statement_id")?;
                self.state.binary_rows = true;
                self.state.active_statement = self
                    .statements
                    .resolve(raw_id, self.state.last_prepared)
                    .ok()
                    .map(|(id, _)| id);
                self.emit_u32("rows")?;
            }
            Command::StmtSendLongData => {
                let raw_id = self.emit_u32("statement_id")?;
                let param = self.emit_u16("parameter_id")?;
                self.emit_rest_bytes("data");
                let last_prepared = self.state.last_prepared;
                self.statements.update(|r| {
                    let id = super::statement::StatementRegistry::resolve_id(raw_id, last_prepared)?;
                    r.mark_streamed(id, param as usize)
                })?;
            }
            Command::StmtExecute => self.execute()?,
            Command::StmtBulkExecute => self.bulk_execute()?,
            Command::BinlogDump => {
                self.emit_u32("binlog_position")?;
                self.emit_u16("binlog_flags")?;
                self.emit_u32("server_id")?;
                self.emit_rest_str("binlog_file");
            }
            Command::BinlogDumpGtid => {
                let flags = self.emit_u16("binlog_flags")?;
                self.emit_u32("server_id")?;
                let len = self.emit_u32("binlog_file_length")?;
                self.emit_clamped("binlog_file", len as u64, true);
                self.emit_u64("binlog_position")?;
                if flags & BINLOG_THROUGH_GTID != 0 {
                    let len = self.emit_u32("gtid_data_length")?;
                    self.emit_clamped("gtid_data", len as u64, false);
                }
            }
            Command::RegisterSlave => {
                self.emit_u32("server_id")?;
                self.emit_short_bytes("slave_host", true)?;
                self.emit_short_bytes("slave_user", true)?;
                self.emit_short_bytes("slave_password", true)?;
                self.emit_u16("slave_port")?;
                self.emit_u32("replication_rank")?;
                self.emit_u32("master_id")?;
            }
            _ => {}
        }
        self.emit_rest_bytes("payload");
        Ok(())
    }

    fn change_user(&mut self) -> Result<()> {
        self.emit_null_str("user");
        if self.state.caps().contains(Capabilities::SECURE_CONNECTION) {
            self.emit_short_bytes("auth_response", false)?;
        } else {
            self.emit_null_bytes("auth_response");
        }
        self.emit_null_str("schema");
        if self.r.remaining() >= 2 {
            self.emit_u16("charset")?;
        }
        if self.state.has_ext(ExtCapabilities::PLUGIN_AUTH) && !self.r.is_empty() {
            self.emit_null_str("client_auth_plugin");
        }
        if self.state.has_ext(ExtCapabilities::CONNECT_ATTRS) && !self.r.is_empty() {
            self.connect_attrs()?;
        }
        Ok(())
    }

    // COM_QUERY carries bound attributes ahead of the text once query-attributes is negotiated
    fn query_attributes(&mut self) -> Result<()> {
        if !self.state.has_ext(ExtCapabilities::QUERY_ATTRIBUTES) {
            return Ok(());
        }
        let count = self.emit_lenenc_int("parameter_count")?.value;
        self.emit_lenenc_int("parameter_set_count")?;
        if count == 0 {
            return Ok(());
        }
        self.check_count(count)?;
        let count = count as usize;
        let len = NullBitmap::byte_len(count, EXECUTE_ROW_NULL_BITMAP_OFFSET);
        let nulls = self.emit_fixed_bytes("null_bitmap", len)?;
        if self.emit_u8("new_params_bound")? != 1 {
            return Ok(());
        }
        let mut types = Vec::with_capacity(count);
        for _ in 0..count {
            let ty = self.emit_field_type("parameter_type")?;
            let flags = self.emit_u8("parameter_flags")?;
            self.emit_lenenc_str("parameter_name")?;
            types.push((ty, flags & PARAMETER_FLAG_UNSIGNED != 0));
        }
        self.bound_values(nulls, &types, &[])
    }

    fn execute(&mut self) -> Result<()> {
        let raw_id = self.emit_u32("statement_id")?;
        self.state.binary_rows = true;
        let resolved = self
            .statements
            .resolve(raw_id, self.state.last_prepared)
            .map(|(id, m)| (id, m.parameters().to_vec()));
        let (id, slots) = match resolved {
            Ok(v) => v,
            Err(e) => {
                self.emit_rest_bytes("payload");
                return Err(e);
            }
        };
        self.state.active_statement = Some(id);

        let flags = self.emit_enum_u8("cursor_type", CURSOR_TYPES)?;
        self.emit_u32("iteration_count")?;
        let mut count = slots.len() as u64;
        if flags & CURSOR_PARAMETER_COUNT_AVAILABLE != 0
            && self.state.has_ext(ExtCapabilities::QUERY_ATTRIBUTES)
        {
            count = self.emit_lenenc_int("parameter_count")?.value;
        }
        if count == 0 || self.r.is_empty() {
            return Ok(());
        }
        self.check_count(count)?;
        let count = count as usize;

        let len = NullBitmap::byte_len(count, EXECUTE_ROW_NULL_BITMAP_OFFSET);
        let nulls = self.emit_fixed_bytes("null_bitmap", len)?;
        let mut types = slots
            .iter()
            .map(|p| (p.field_type, p.unsigned))
            .collect::<Vec<_>>();
        types.resize(count, (FieldType::Null as u8, false));
        if self.emit_u8("new_params_bound")? == 1 {
            let with_names = self.state.has_ext(ExtCapabilities::QUERY_ATTRIBUTES);
            for t in types.iter_mut() {
                let ty = self.emit_field_type("parameter_type")?;
                let flags = self.emit_u8("parameter_flags")?;
                if with_names {
                    self.emit_lenenc_str("parameter_name")?;
                }
                *t = (ty, flags & PARAMETER_FLAG_UNSIGNED != 0);
            }
            let bound = types.clone();
            self.statements
                .update(|r| r.bind_parameter_types(id, &bound))?;
        }
        self.bound_values(nulls, &types, &slots)
    }

    fn bound_values(
        &mut self,
        nulls: &[u8],
        types: &[(u8, bool)],
        slots: &[ParameterSlot],
    ) -> Result<()> {
        let bitmap = NullBitmap::new(nulls, EXECUTE_ROW_NULL_BITMAP_OFFSET);
        for (i, (ty, unsigned)) in types.iter().enumerate() {
            if bitmap.get(i).unwrap_or(false) {
                self.emit_null("parameter_value");
                continue;
            }
            // sent earlier with COM_STMT_SEND_LONG_DATA
            if slots.get(i).map(|s| s.streamed).unwrap_or(false) {
                continue;
            }
            self.emit_binary_value("parameter_value", *ty, *unsigned)?;
        }
        Ok(())
    }

    fn bulk_execute(&mut self) -> Result<()> {
        let raw_id = self.emit_u32("statement_id")?;
        self.state.binary_rows = true;
        let resolved = self
            .statements
            .resolve(raw_id, self.state.last_prepared)
            .map(|(id, m)| {
                (
                    id,
                    m.parameters()
                        .iter()
                        .map(|p| (p.field_type, p.unsigned))
                        .collect::<Vec<_>>(),
                )
            });
        let (id, mut types) = match resolved {
            Ok(v) => v,
            Err(e) => {
                self.emit_rest_bytes("payload");
                return Err(e);
            }
        };
        self.state.active_statement = Some(id);

        let flags = self.emit_u16("bulk_flags")?;
        self.statements.update(|r| r.set_bulk_flags(id, flags))?;
        if flags & BULK_SEND_TYPES_TO_SERVER != 0 {
            for t in types.iter_mut() {
                let ty = self.emit_field_type("parameter_type")?;
                let flags = self.emit_u8("parameter_flags")?;
                *t = (ty, flags & PARAMETER_FLAG_UNSIGNED != 0);
            }
        }
        if types.is_empty() {
            return Ok(());
        }
        // one indicator byte per parameter, a value only follows NONE
        while !self.r.is_empty() {
            for (ty, unsigned) in types.iter() {
                let indicator = self.emit_enum_u8("indicator", BULK_INDICATORS)?;
                if indicator == BULK_INDICATOR_NONE {
                    self.emit_binary_value("parameter_value", *ty, *unsigned)?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::common::flow::PacketDirection;
    use crate::config::MysqlConfig;
    use crate::flow_generator::error::Error;
    use crate::flow_generator::protocol_logs::{
        sql::mysql::{
            state::SessionState,
            statement::{StatementAccess, StatementRegistry},
            tables::DecoderTables,
        },
        VecSink,
    };

    fn run(
        state: &mut SessionState,
        registry: &mut StatementRegistry,
        payload: &[u8],
    ) -> (Result<()>, VecSink) {
        let tables = DecoderTables::default();
        let config = MysqlConfig::default();
        let mut sink = VecSink::default();
        let mut seen = vec![];
        let result = Dissector::new(
            state,
            StatementAccess::live(registry, &mut seen),
            &tables,
            &config,
            &mut sink,
            payload,
        )
        .dissect(PacketDirection::ClientToServer, PacketKind::Command);
        (result, sink)
    }

    fn idle() -> SessionState {
        SessionState {
            phase: Phase::IdleReady,
            client_caps: Capabilities::PROTOCOL_41 | Capabilities::SECURE_CONNECTION,
            ..Default::default()
        }
    }

    #[test]
    fn command_phases() {
        let cases = vec![
            (vec![0x03, b's'], Phase::TabularResult),
            (vec![0x02, b'd', b'b'], Phase::Ok),
            (vec![0x09], Phase::Message),
            (vec![0x04, b't', 0], Phase::ShowFieldsResult),
            (vec![0x16, b's'], Phase::PrepareResult),
            (vec![0x01], Phase::IdleReady),
            (vec![0x19, 1, 0, 0, 0], Phase::IdleReady),
            (vec![0x0e], Phase::Ok),
            (vec![0x1f], Phase::Ok),
            (vec![0x0a], Phase::TabularResult),
            (vec![0x12, 4, 0, 0, 0, 0, 0, 1, 0, 0, 0], Phase::BinlogStream),
        ];
        for (i, (payload, expected)) in cases.into_iter().enumerate() {
            let mut state = idle();
            let mut registry = StatementRegistry::default();
            let (result, _) = run(&mut state, &mut registry, &payload);
            assert!(result.is_ok(), "case {}", i + 1);
            assert_eq!(state.phase, expected, "case {} command {:#x}", i + 1, payload[0]);
        }
    }

    #[test]
    fn unknown_command_loses_sync() {
        for code in [0x00u8, 0x1d, 0x20, 0xee] {
            let mut state = idle();
            let mut registry = StatementRegistry::default();
            let (result, sink) = run(&mut state, &mut registry, &[code, 1, 2]);
            assert_eq!(
                result.unwrap_err(),
                Error::UnrecognizedPacket {
                    phase: Phase::IdleReady,
                    leading: code
                }
            );
            assert_eq!(state.phase, Phase::Uninitialized);
            assert_eq!(
                sink.field("payload"),
                Some(&FieldValue::Bytes(vec![code, 1, 2]))
            );
            assert_eq!(sink.experts().len(), 1);
        }
    }

    #[test]
    fn query_text() {
        let mut state = idle();
        let mut registry = StatementRegistry::default();
        let (result, sink) = run(&mut state, &mut registry, b"\x03select 1");
        assert!(result.is_ok());
        assert_eq!(
            sink.field("command"),
            Some(&FieldValue::Enum(3, "COM_QUERY"))
        );
        assert_eq!(sink.field("query"), Some(&FieldValue::Str("select 1".into())));
        assert_eq!(state.last_command, Some(Command::Query));
    }

    #[test]
    fn query_with_attributes() {
        let mut state = idle();
        state.client_ext_caps = ExtCapabilities::QUERY_ATTRIBUTES;
        state.server_ext_caps = ExtCapabilities::QUERY_ATTRIBUTES;
        let mut registry = StatementRegistry::default();
        let mut payload = vec![0x03, 0x01, 0x01, 0x00, 0x01, 0x03, 0x00, 0x02, b't', b'x'];
        payload.extend_from_slice(&7u32.to_le_bytes());
        payload.extend_from_slice(b"select 1");
        let (result, sink) = run(&mut state, &mut registry, &payload);
        assert!(result.is_ok());
        assert_eq!(sink.field("parameter_name"), Some(&FieldValue::Str("tx".into())));
        assert_eq!(sink.field("parameter_value"), Some(&FieldValue::Int(7)));
        assert_eq!(sink.field("query"), Some(&FieldValue::Str("select 1".into())));
    }

    #[test]
    fn execute_unknown_statement() {
        let mut state = idle();
        let mut registry = StatementRegistry::default();
        let payload = [0x17, 0x09, 0, 0, 0, 0x00, 1, 0, 0, 0];
        let (result, sink) = run(&mut state, &mut registry, &payload);
        assert_eq!(result.unwrap_err(), Error::StatementNotFound(9));
        assert_eq!(state.phase, Phase::TabularResult);
        assert_eq!(state.active_statement, None);
        assert_eq!(
            sink.field("payload"),
            Some(&FieldValue::Bytes(vec![0x00, 1, 0, 0, 0]))
        );
        assert_eq!(sink.experts(), vec!["statement 9 not found"]);
    }

    #[test]
    fn execute_rebinds_types() {
        let mut state = idle();
        state.last_prepared = Some(4);
        let mut registry = StatementRegistry::default();
        registry.prepare(4, 2, 0);

        let mut payload = vec![0x17];
        payload.extend_from_slice(&0xffff_ffffu32.to_le_bytes());
        payload.extend_from_slice(&[0x00, 1, 0, 0, 0]);
        // null bitmap: second parameter is NULL
        payload.extend_from_slice(&[0b0000_0010, 0x01]);
        payload.extend_from_slice(&[0x08, 0x80, 0xfd, 0x00]);
        payload.extend_from_slice(&u64::MAX.to_le_bytes());

        let (result, sink) = run(&mut state, &mut registry, &payload);
        assert!(result.is_ok());
        assert_eq!(state.active_statement, Some(4));
        assert!(state.binary_rows);
        assert_eq!(
            sink.values("parameter_value"),
            vec![&FieldValue::UInt(u64::MAX), &FieldValue::Null]
        );
        let params = registry.get(4).unwrap().parameters();
        assert_eq!((params[0].field_type, params[0].unsigned), (0x08, true));
        assert_eq!(params[1].field_type, 0xfd);
    }

    #[test]
    fn send_long_data_streams_parameter() {
        let mut state = idle();
        state.last_prepared = Some(2);
        let mut registry = StatementRegistry::default();
        registry.prepare(2, 2, 0);
        registry.populate_parameter(2, 0, 0xfc, false).unwrap();
        registry.populate_parameter(2, 1, 0x03, false).unwrap();

        let (result, _) = run(&mut state, &mut registry, &[0x18, 2, 0, 0, 0, 0, 0, b'b', b'l', b'o', b'b']);
        assert!(result.is_ok());
        assert_eq!(state.phase, Phase::IdleReady);
        assert!(registry.get(2).unwrap().parameters()[0].streamed);

        // the streamed parameter has no value in the execute packet
        let mut payload = vec![0x17, 2, 0, 0, 0, 0x00, 1, 0, 0, 0, 0x00, 0x00];
        payload.extend_from_slice(&5i32.to_le_bytes());
        let (result, sink) = run(&mut state, &mut registry, &payload);
        assert!(result.is_ok());
        assert_eq!(sink.values("parameter_value"), vec![&FieldValue::Int(5)]);
    }

    #[test]
    fn bulk_execute_rows() {
        let mut state = idle();
        state.is_mariadb = true;
        let mut registry = StatementRegistry::default();
        registry.prepare(3, 2, 0);

        let mut payload = vec![0xfa, 3, 0, 0, 0];
        payload.extend_from_slice(&BULK_SEND_TYPES_TO_SERVER.to_le_bytes());
        payload.extend_from_slice(&[0x01, 0x00, 0xfd, 0x00]);
        // row 1: 7, "a"; row 2: NULL, "bc"
        payload.extend_from_slice(&[0x00, 0x07, 0x00, 0x01, b'a']);
        payload.extend_from_slice(&[0x01, 0x00, 0x02, b'b', b'c']);

        let (result, sink) = run(&mut state, &mut registry, &payload);
        assert!(result.is_ok());
        assert_eq!(state.phase, Phase::TabularResult);
        assert_eq!(
            sink.values("parameter_value"),
            vec![
                &FieldValue::Int(7),
                &FieldValue::Str("a".into()),
                &FieldValue::Str("bc".into())
            ]
        );
        assert_eq!(registry.get(3).unwrap().bulk_flags, BULK_SEND_TYPES_TO_SERVER);
    }

    #[test]
    fn local_infile_data() {
        let tables = DecoderTables::default();
        let config = MysqlConfig::default();
        let mut state = SessionState {
            phase: Phase::LocalInfile,
            ..Default::default()
        };
        let registry = StatementRegistry::default();
        for (payload, phase) in [(&b"1,2\n"[..], Phase::LocalInfile), (&b""[..], Phase::Ok)] {
            let mut sink = VecSink::default();
            Dissector::new(
                &mut state,
                StatementAccess::Replay(&registry),
                &tables,
                &config,
                &mut sink,
                payload,
            )
            .dissect(PacketDirection::ClientToServer, PacketKind::LocalInfileData)
            .unwrap();
            assert_eq!(state.phase, phase);
        }
    }
}
