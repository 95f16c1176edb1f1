/*
 * Copyright (c) 2022 Yunshan Networks
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

mod mysql;

pub use mysql::{
    classify, decode_binary_string_length, decode_length_encoded_int, split_pdus,
    BinaryCodecTable, BitTable, BitfieldView, ColumnSlot, Command, CompressedHeader,
    CompressionAlgorithm, CompressionState, Connection, DecodeFn, DecoderTables, Decompressor,
    DefaultDecompressor, FieldType, FrameKey, FrameState, FrameStates, LengthEncodedInt,
    MysqlDateTime, MysqlHeader, MysqlLog, MysqlTime, PacketKind, ParameterSlot, PayloadReader,
    Pdus, Phase, SessionState, StatementMetadata, StatementRegistry,
};
