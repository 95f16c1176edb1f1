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

use super::binary_value::BinaryCodecTable;
use super::bitfield::BitTable;
use super::consts::*;

/// Read-only lookup tables shared by every connection of one decoder.
#[derive(Debug, Clone)]
pub struct DecoderTables {
    pub binary: BinaryCodecTable,
    pub capabilities: BitTable,
    pub ext_capabilities: BitTable,
    pub mariadb_capabilities: BitTable,
    pub server_status: BitTable,
    pub field_flags: BitTable,
    pub refresh: BitTable,
}

impl Default for DecoderTables {
    fn default() -> Self {
        Self {
            binary: BinaryCodecTable::default(),
            capabilities: BitTable::new(CAPABILITY_BITS),
            ext_capabilities: BitTable::new(EXT_CAPABILITY_BITS),
            mariadb_capabilities: BitTable::new(MARIADB_CAPABILITY_BITS),
            server_status: BitTable::new(SERVER_STATUS_BITS),
            field_flags: BitTable::new(FIELD_FLAG_BITS),
            refresh: BitTable::new(REFRESH_BITS),
        }
    }
}
