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

use serde::Serialize;

use super::consts::*;
use super::frame_state::FrameStates;
use super::statement::StatementRegistry;
use crate::common::flow::PacketDirection;

#[derive(Serialize, Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Uninitialized,
    AwaitingLogin,
    IdleReady,
    Ok,
    // transient: an ERR or EOF response moves the connection straight to the
    // phase that follows it, so these two are never stored
    Error,
    Eof,
    IntermediateEof,
    Message,
    TabularResult,
    ShowFieldsResult,
    FieldDefinition,
    RowData,
    ColumnCount,
    PrepareResult,
    PreparedParameterDefinition,
    PreparedFieldDefinition,
    AuthSwitchRequest,
    AuthSwitchResponse,
    BinlogStream,
    // client is streaming a file for LOAD DATA LOCAL INFILE
    LocalInfile,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CompressionAlgorithm {
    Zlib,
    Zstd,
}

#[derive(Serialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CompressionState {
    #[default]
    Disabled,
    // login asked for it, the next server response is still plain
    Negotiating(CompressionAlgorithm),
    Active(CompressionAlgorithm),
}

/// Everything the classifier and the decode routines read. Small enough to
/// clone once per PDU, which is what the frame snapshots store.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SessionState {
    pub phase: Phase,

    pub server_caps: Capabilities,
    pub server_ext_caps: ExtCapabilities,
    pub client_caps: Capabilities,
    pub client_ext_caps: ExtCapabilities,
    pub mariadb_caps: MariadbCapabilities,
    pub protocol_version: u8,
    pub major_version: u16,

    pub last_prepared: Option<u32>,
    // statement whose result set is being decoded
    pub active_statement: Option<u32>,
    pub remaining_fields: u64,
    pub field_index: u32,
    pub prepared_fields: u16,
    pub binary_rows: bool,
    pub last_command: Option<Command>,

    pub compression: CompressionState,
    pub is_mariadb: bool,
    pub deprecate_eof: bool,
    pub local_infile: bool,
}

impl SessionState {
    /// Negotiated base capabilities. Before the login request has been seen
    /// the server's word is used; with neither seen, 4.1 framing is assumed.
    pub fn caps(&self) -> Capabilities {
        if !self.client_caps.is_empty() {
            self.client_caps
        } else if !self.server_caps.is_empty() {
            self.server_caps
        } else {
            Capabilities::PROTOCOL_41 | Capabilities::SECURE_CONNECTION
        }
    }

    pub fn ext_caps(&self) -> ExtCapabilities {
        if self.client_caps.is_empty() {
            self.server_ext_caps
        } else {
            self.client_ext_caps & self.server_ext_caps
        }
    }

    pub fn has_ext(&self, cap: ExtCapabilities) -> bool {
        self.ext_caps().contains(cap)
    }
}

/// What a PDU is, decided from the phase and its leading bytes only.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PacketKind {
    Greeting,
    LoginRequest,
    SslRequest,
    AuthSwitchResponse,
    Command,
    LocalInfileData,
    Ok,
    Error,
    Eof { intermediate: bool },
    AuthSwitchRequest,
    AuthMoreData,
    Message,
    ColumnCount,
    FieldDefinition { show_fields: bool },
    Row,
    PrepareOk,
    PreparedParameter,
    PreparedField,
    BinlogEvent,
    LocalInfileRequest,
    Unknown,
}

fn is_short_eof(payload: &[u8]) -> bool {
    payload.first() == Some(&MYSQL_RESPONSE_CODE_EOF) && payload.len() - 1 <= EOF_MAX_REMAINING
}

pub fn classify(
    state: &SessionState,
    direction: PacketDirection,
    sequence: u8,
    payload: &[u8],
) -> PacketKind {
    match direction {
        PacketDirection::ClientToServer => classify_request(state, payload),
        PacketDirection::ServerToClient => classify_response(state, sequence, payload),
    }
}

fn classify_request(state: &SessionState, payload: &[u8]) -> PacketKind {
    match state.phase {
        Phase::AwaitingLogin => {
            let ssl = payload.len() >= 2
                && Capabilities::from_bits_truncate(u16::from_le_bytes([payload[0], payload[1]]))
                    .contains(Capabilities::SSL);
            if ssl && payload.len() == LOGIN_FIXED_LEN {
                PacketKind::SslRequest
            } else {
                PacketKind::LoginRequest
            }
        }
        Phase::AuthSwitchRequest => PacketKind::AuthSwitchResponse,
        Phase::LocalInfile => PacketKind::LocalInfileData,
        _ if payload.is_empty() => PacketKind::Unknown,
        _ => PacketKind::Command,
    }
}

fn classify_response(state: &SessionState, sequence: u8, payload: &[u8]) -> PacketKind {
    let leading = match payload.first() {
        Some(b) => *b,
        None => return PacketKind::Unknown,
    };
    let short_eof = is_short_eof(payload);

    match state.phase {
        Phase::Uninitialized => {
            return match leading {
                PROTOCOL_VERSION if sequence == 0 => PacketKind::Greeting,
                MYSQL_RESPONSE_CODE_ERR => PacketKind::Error,
                _ => PacketKind::Unknown,
            }
        }
        _ if leading == MYSQL_RESPONSE_CODE_ERR => return PacketKind::Error,
        Phase::AuthSwitchResponse if leading == MYSQL_RESPONSE_CODE_EOF => {
            return PacketKind::AuthSwitchRequest
        }
        // a short one is the EOF that SET_OPTION and DEBUG answer with
        Phase::Ok | Phase::IdleReady if leading == MYSQL_RESPONSE_CODE_EOF && !short_eof => {
            return PacketKind::AuthSwitchRequest
        }
        Phase::RowData if leading == MYSQL_RESPONSE_CODE_EOF && state.deprecate_eof => {
            return PacketKind::Ok
        }
        _ if short_eof => {
            let intermediate = matches!(
                state.phase,
                Phase::FieldDefinition
                    | Phase::IntermediateEof
                    | Phase::PreparedParameterDefinition
                    | Phase::PreparedFieldDefinition
            );
            return PacketKind::Eof { intermediate };
        }
        _ => {}
    }

    match state.phase {
        Phase::IdleReady | Phase::AuthSwitchResponse => match leading {
            MYSQL_RESPONSE_CODE_OK => PacketKind::Ok,
            MYSQL_RESPONSE_CODE_AUTH_MORE_DATA => PacketKind::AuthMoreData,
            _ => PacketKind::Unknown,
        },
        Phase::Ok => match leading {
            MYSQL_RESPONSE_CODE_OK => PacketKind::Ok,
            _ => PacketKind::Unknown,
        },
        Phase::Message => PacketKind::Message,
        Phase::TabularResult | Phase::ColumnCount => match leading {
            MYSQL_RESPONSE_CODE_OK => PacketKind::Ok,
            MYSQL_RESPONSE_CODE_LOCAL_INFILE => PacketKind::LocalInfileRequest,
            _ => PacketKind::ColumnCount,
        },
        Phase::ShowFieldsResult => PacketKind::FieldDefinition { show_fields: true },
        Phase::FieldDefinition => PacketKind::FieldDefinition { show_fields: false },
        Phase::PreparedParameterDefinition => PacketKind::PreparedParameter,
        Phase::PreparedFieldDefinition => PacketKind::PreparedField,
        Phase::IntermediateEof | Phase::RowData => PacketKind::Row,
        Phase::PrepareResult => match leading {
            MYSQL_RESPONSE_CODE_OK => PacketKind::PrepareOk,
            _ => PacketKind::Unknown,
        },
        Phase::BinlogStream => match leading {
            MYSQL_RESPONSE_CODE_OK => PacketKind::BinlogEvent,
            _ => PacketKind::Unknown,
        },
        _ => PacketKind::Unknown,
    }
}

/// Per connection decoder state: the live cursor, prepared statements and
/// the pre-decode snapshot of every PDU seen so far.
#[derive(Debug, Default, Clone)]
pub struct Connection {
    pub state: SessionState,
    pub statements: StatementRegistry,
    pub frames: FrameStates,
}

impl Connection {
    pub fn phase(&self) -> Phase {
        self.state.phase
    }
}
