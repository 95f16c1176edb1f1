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

mod binary_value;
mod bitfield;
mod codec;
mod compress;
mod consts;
mod dissector;
mod frame_state;
mod request;
mod response;
mod state;
mod statement;
mod tables;

pub use binary_value::{BinaryCodecTable, DecodeFn, MysqlDateTime, MysqlTime};
pub use bitfield::{BitTable, BitfieldView};
pub use codec::{
    decode_binary_string_length, decode_length_encoded_int, LengthEncodedInt, PayloadReader,
};
pub use compress::{CompressedHeader, Decompressor, DefaultDecompressor};
pub use consts::{Command, FieldType};
pub use frame_state::{FrameKey, FrameState, FrameStates};
pub use state::{
    classify, CompressionAlgorithm, CompressionState, Connection, PacketKind, Phase,
    SessionState,
};
pub use statement::{ColumnSlot, ParameterSlot, StatementMetadata, StatementRegistry};
pub use tables::DecoderTables;

use std::num::NonZeroUsize;

use log::{debug, trace, warn};
use lru::LruCache;
use public::bytes::read_u24_le;

use self::consts::*;
use self::dissector::Dissector;
use self::statement::StatementAccess;
use super::super::{FieldSink, FieldValue, ParseParam, PduInfo};
use crate::{
    common::flow::{FlowKey, PacketDirection},
    config::MysqlConfig,
    flow_generator::error::{Error, Result},
};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MysqlHeader {
    pub length: u32,
    pub number: u8,
}

impl MysqlHeader {
    pub fn decode(payload: &[u8]) -> Result<Self> {
        if payload.len() < HEADER_LEN {
            return Err(Error::PacketTooShort {
                needed: HEADER_LEN,
                remaining: payload.len(),
            });
        }
        Ok(Self {
            length: read_u24_le(payload),
            number: payload[NUMBER_OFFSET],
        })
    }
}

/// Packets sitting back to back in one buffer. The last body is clamped to
/// the bytes that are left, the flag tells whether that happened.
pub struct Pdus<'a> {
    payload: &'a [u8],
    offset: usize,
}

pub fn split_pdus(payload: &[u8]) -> Pdus<'_> {
    Pdus { payload, offset: 0 }
}

impl<'a> Iterator for Pdus<'a> {
    type Item = (MysqlHeader, &'a [u8], bool);

    fn next(&mut self) -> Option<Self::Item> {
        let header = MysqlHeader::decode(&self.payload[self.offset..]).ok()?;
        let start = self.offset + HEADER_LEN;
        let end = start + header.length as usize;
        let clamped = end > self.payload.len();
        let end = end.min(self.payload.len());
        self.offset = end;
        Some((header, &self.payload[start..end], clamped))
    }
}

/// Passive decoder for every MySQL/MariaDB connection of one capture.
pub struct MysqlLog {
    config: MysqlConfig,
    tables: DecoderTables,
    decompressor: Box<dyn Decompressor>,
    sessions: LruCache<FlowKey, Connection>,
}

impl MysqlLog {
    pub fn new(config: MysqlConfig, tables: DecoderTables) -> Self {
        let capacity = NonZeroUsize::new(config.max_sessions).unwrap_or(NonZeroUsize::MIN);
        Self {
            config,
            tables,
            decompressor: Box::new(DefaultDecompressor),
            sessions: LruCache::new(capacity),
        }
    }

    pub fn with_decompressor(mut self, decompressor: Box<dyn Decompressor>) -> Self {
        self.decompressor = decompressor;
        self
    }

    pub fn config(&self) -> &MysqlConfig {
        &self.config
    }

    pub fn connection(&self, key: &FlowKey) -> Option<&Connection> {
        self.sessions.peek(key)
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Decodes one reassembled unit of bytes of the connection `key`.
    ///
    /// A frame seen before is replayed from its snapshot and leaves the
    /// connection untouched. Every PDU in the unit is decoded even if an
    /// earlier one fails; the first failure is returned.
    pub fn parse_payload(
        &mut self,
        key: FlowKey,
        param: &ParseParam,
        payload: &[u8],
        sink: &mut dyn FieldSink,
    ) -> Result<()> {
        if !self.sessions.contains(&key) {
            if let Some((evicted, _)) = self.sessions.push(key, Connection::default()) {
                warn!("mysql session table full, evicted {}", evicted);
            }
        }
        let conn = self
            .sessions
            .get_mut(&key)
            .ok_or(Error::MysqlLogParseFailed)?;

        // framing follows the state the frame was first seen in
        let compression = conn
            .frames
            .get(&FrameKey::new(param.frame_number, 0))
            .map(|f| &f.session)
            .unwrap_or(&conn.state)
            .compression;

        let inflated;
        let data = match compression {
            CompressionState::Active(algorithm) => {
                let header = CompressedHeader::decode(payload)?;
                sink.add_field(
                    "compressed_length",
                    FieldValue::UInt(header.compressed_length as u64),
                    0..COMPRESS_HEADER_SEQ_OFFSET,
                );
                sink.add_field(
                    "compressed_sequence",
                    FieldValue::UInt(header.sequence as u64),
                    COMPRESS_HEADER_SEQ_OFFSET..COMPRESS_HEADER_UNCOMPRESS_OFFSET,
                );
                sink.add_field(
                    "uncompressed_length",
                    FieldValue::UInt(header.uncompressed_length as u64),
                    COMPRESS_HEADER_UNCOMPRESS_OFFSET..COMPRESS_HEADER_LEN,
                );
                let end = (COMPRESS_HEADER_LEN + header.compressed_length as usize)
                    .min(payload.len());
                let body = &payload[COMPRESS_HEADER_LEN..end];
                if header.uncompressed_length == 0 {
                    body
                } else if !self.config.decompress {
                    sink.add_field(
                        "compressed_payload",
                        FieldValue::Bytes(body.to_vec()),
                        COMPRESS_HEADER_LEN..end,
                    );
                    return Ok(());
                } else {
                    inflated = self
                        .decompressor
                        .decompress(algorithm, body, header.uncompressed_length as usize)
                        .map_err(|e| {
                            debug!("mysql {} frame {}: {}", key, param.frame_number, e);
                            sink.add_expert(&e, COMPRESS_HEADER_LEN..end);
                            e
                        })?;
                    &inflated[..]
                }
            }
            _ => payload,
        };

        let mut first_error = None;
        for (index, (header, body, clamped)) in split_pdus(data).enumerate() {
            let frame_key = FrameKey::new(param.frame_number, index as u32);
            let result = decode_pdu(
                conn,
                &self.tables,
                &self.config,
                sink,
                frame_key,
                param.direction,
                header,
                body,
            );
            if clamped {
                sink.add_expert(&Error::Truncated, 0..body.len());
            }
            if let Err(e) = result {
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

// Snapshot, decode and commit one PDU. A replayed PDU decodes a throwaway
// copy of its snapshot against the statements it saw on the first pass.
#[allow(clippy::too_many_arguments)]
fn decode_pdu(
    conn: &mut Connection,
    tables: &DecoderTables,
    config: &MysqlConfig,
    sink: &mut dyn FieldSink,
    key: FrameKey,
    direction: PacketDirection,
    header: MysqlHeader,
    body: &[u8],
) -> Result<()> {
    let (mut working, replay) = match conn.frames.get(&key) {
        Some(snapshot) => (snapshot.session.clone(), Some(snapshot.registry())),
        None => (conn.state.clone(), None),
    };
    let kind = classify(&working, direction, header.number, body);
    sink.begin_pdu(&PduInfo {
        frame_number: key.frame,
        pdu_index: key.pdu_index,
        msg_type: direction.into(),
        sequence: header.number,
        length: header.length,
        phase: working.phase,
        kind,
    });

    if let Some(registry) = replay {
        return Dissector::new(
            &mut working,
            StatementAccess::Replay(&registry),
            tables,
            config,
            sink,
            body,
        )
        .dissect(direction, kind);
    }

    let mut snapshot = FrameState::new(working.clone());
    let before = conn.state.phase;
    let result = Dissector::new(
        &mut working,
        StatementAccess::live(&mut conn.statements, &mut snapshot.statements),
        tables,
        config,
        sink,
        body,
    )
    .dissect(direction, kind);
    conn.frames.record(key, snapshot);
    match &result {
        // lost sync, only the phase moves
        Err(Error::UnrecognizedPacket { .. }) => conn.state.phase = Phase::Uninitialized,
        _ => conn.state = working,
    }
    if before != conn.state.phase {
        trace!(
            "mysql frame {} pdu {} {:?}: {:?} -> {:?}",
            key.frame,
            key.pdu_index,
            kind,
            before,
            conn.state.phase
        );
    }
    result
}
