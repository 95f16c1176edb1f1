/*
 * Copyright (c) 2023 Yunshan Networks
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

pub(crate) mod sql;

pub use sql::{
    classify, decode_binary_string_length, decode_length_encoded_int, split_pdus,
    BinaryCodecTable, BitTable, BitfieldView, ColumnSlot, Command, CompressedHeader,
    CompressionAlgorithm, CompressionState, Connection, DecodeFn, DecoderTables, Decompressor,
    DefaultDecompressor, FieldType, FrameKey, FrameState, FrameStates, LengthEncodedInt,
    MysqlDateTime, MysqlHeader, MysqlLog, MysqlTime, PacketKind, ParameterSlot, PayloadReader,
    Pdus, Phase, SessionState, StatementMetadata, StatementRegistry,
};

use std::fmt;
use std::ops::Range;

use serde::Serialize;

use crate::common::flow::PacketDirection;
use crate::flow_generator::error::Error;

#[derive(Serialize, Debug, PartialEq, Eq, Clone, Copy)]
#[repr(u8)]
pub enum LogMessageType {
    Request,
    Response,
}

impl From<PacketDirection> for LogMessageType {
    fn from(d: PacketDirection) -> LogMessageType {
        match d {
            PacketDirection::ClientToServer => LogMessageType::Request,
            PacketDirection::ServerToClient => LogMessageType::Response,
        }
    }
}

/// Per-call input handed in with one reassembled unit of bytes.
#[derive(Debug, Clone, Copy)]
pub struct ParseParam {
    // unique, stable sequence number of the captured frame
    pub frame_number: u64,
    pub direction: PacketDirection,
}

impl ParseParam {
    pub fn new(frame_number: u64, direction: PacketDirection) -> Self {
        Self {
            frame_number,
            direction,
        }
    }
}

/// Header of one decoded PDU, announced to the sink before its fields.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct PduInfo {
    pub frame_number: u64,
    pub pdu_index: u32,
    pub msg_type: LogMessageType,
    pub sequence: u8,
    pub length: u32,
    pub phase: Phase,
    pub kind: PacketKind,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum FieldValue {
    UInt(u64),
    Int(i64),
    Float(f32),
    Double(f64),
    Bool(bool),
    Str(String),
    Bytes(Vec<u8>),
    Null,
    Time(MysqlTime),
    DateTime(MysqlDateTime),
    Flags(BitfieldView),
    Enum(u64, &'static str),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UInt(v) => write!(f, "{}", v),
            Self::Int(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
            Self::Double(v) => write!(f, "{}", v),
            Self::Bool(v) => write!(f, "{}", v),
            Self::Str(v) => write!(f, "{}", v),
            Self::Bytes(v) => {
                for b in v {
                    write!(f, "{:02x}", b)?;
                }
                Ok(())
            }
            Self::Null => write!(f, "NULL"),
            Self::Time(t) => write!(f, "{}", t),
            Self::DateTime(t) => write!(f, "{}", t),
            Self::Flags(v) => write!(f, "{:#06x}", v.raw),
            Self::Enum(v, name) => write!(f, "{} ({})", name, v),
        }
    }
}

/// Receives the decoded field stream; nothing it returns is consumed by the decoder.
///
/// Byte ranges are relative to the PDU payload, after the 4-byte packet header.
pub trait FieldSink {
    fn add_field(&mut self, name: &'static str, value: FieldValue, range: Range<usize>);

    fn add_expert(&mut self, _error: &Error, _range: Range<usize>) {}

    fn begin_pdu(&mut self, _info: &PduInfo) {}
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct DecodedField {
    pub name: &'static str,
    pub value: FieldValue,
    pub start: usize,
    pub end: usize,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub enum SinkEntry {
    Pdu(PduInfo),
    Field(DecodedField),
    Expert { message: String, start: usize, end: usize },
}

/// Collects everything into memory, used by tests and JSON export.
#[derive(Serialize, Debug, Default, Clone, PartialEq)]
pub struct VecSink {
    pub entries: Vec<SinkEntry>,
}

impl VecSink {
    pub fn fields(&self) -> impl Iterator<Item = &DecodedField> {
        self.entries.iter().filter_map(|e| match e {
            SinkEntry::Field(f) => Some(f),
            _ => None,
        })
    }

    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields().find(|f| f.name == name).map(|f| &f.value)
    }

    pub fn values(&self, name: &str) -> Vec<&FieldValue> {
        self.fields()
            .filter(|f| f.name == name)
            .map(|f| &f.value)
            .collect()
    }

    pub fn experts(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter_map(|e| match e {
                SinkEntry::Expert { message, .. } => Some(message.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn pdus(&self) -> Vec<&PduInfo> {
        self.entries
            .iter()
            .filter_map(|e| match e {
                SinkEntry::Pdu(p) => Some(p),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.entries)
    }
}

impl FieldSink for VecSink {
    fn add_field(&mut self, name: &'static str, value: FieldValue, range: Range<usize>) {
        self.entries.push(SinkEntry::Field(DecodedField {
            name,
            value,
            start: range.start,
            end: range.end,
        }));
    }

    fn add_expert(&mut self, error: &Error, range: Range<usize>) {
        self.entries.push(SinkEntry::Expert {
            message: error.to_string(),
            start: range.start,
            end: range.end,
        });
    }

    fn begin_pdu(&mut self, info: &PduInfo) {
        self.entries.push(SinkEntry::Pdu(info.clone()));
    }
}

/// Discards everything, for callers that only want the state tracking.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl FieldSink for NullSink {
    fn add_field(&mut self, _: &'static str, _: FieldValue, _: Range<usize>) {}
}
