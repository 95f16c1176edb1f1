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

use thiserror::Error;

use super::protocol_logs::Phase;

// Every variant is scoped to a single PDU; none of them ends the session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("mysql log parse failed")]
    MysqlLogParseFailed,
    #[error("packet too short: need {needed} bytes, {remaining} remaining")]
    PacketTooShort { needed: usize, remaining: usize },
    #[error("unrecognized packet in phase {phase:?}, leading byte {leading:#04x}")]
    UnrecognizedPacket { phase: Phase, leading: u8 },
    #[error("statement {0} not found")]
    StatementNotFound(u32),
    #[error("field count {count} exceeds limit {limit}")]
    FieldCountExceeded { count: u64, limit: u64 },
    #[error("no binary decoder for type {type_code:#04x} (unsigned={unsigned})")]
    UnsupportedBinaryType { type_code: u8, unsigned: bool },
    #[error("decompress failed: {0}")]
    Decompress(String),
    #[error("value truncated at packet boundary")]
    Truncated,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
