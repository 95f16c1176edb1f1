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

use serde::Serialize;

/// Named view of one flag word. Bits without a name in the table are kept in
/// `raw` but produce no entry in `flags`.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct BitfieldView {
    pub raw: u32,
    pub flags: Vec<(&'static str, bool)>,
}

impl BitfieldView {
    pub fn is_set(&self, name: &str) -> bool {
        self.flags.iter().any(|(n, set)| *n == name && *set)
    }

    pub fn set_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.flags.iter().filter(|(_, set)| *set).map(|(n, _)| *n)
    }
}

impl fmt::Display for BitfieldView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06x}", self.raw)?;
        let mut first = true;
        for name in self.set_names() {
            write!(f, "{}{}", if first { " (" } else { "|" }, name)?;
            first = false;
        }
        if !first {
            write!(f, ")")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BitTable {
    bits: &'static [(u32, &'static str)],
}

impl BitTable {
    pub const fn new(bits: &'static [(u32, &'static str)]) -> Self {
        Self { bits }
    }

    pub fn decode(&self, word: u32) -> BitfieldView {
        BitfieldView {
            raw: word,
            flags: self
                .bits
                .iter()
                .map(|(mask, name)| (*name, word & mask != 0))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::flow_generator::protocol_logs::sql::mysql::consts::{
        CAPABILITY_BITS, FIELD_FLAG_BITS, SERVER_STATUS_BITS,
    };

    #[test]
    fn capability_word() {
        let table = BitTable::new(CAPABILITY_BITS);
        // protocol_41 | secure_connection | ssl | long_password
        let view = table.decode(0x8a01);
        assert_eq!(view.flags.len(), 16);
        let set = view.set_names().collect::<Vec<_>>();
        assert_eq!(
            set,
            vec!["long_password", "protocol_41", "ssl", "secure_connection"]
        );
        assert!(!view.is_set("compress"));
    }

    #[test]
    fn field_flags() {
        let table = BitTable::new(FIELD_FLAG_BITS);
        let cases = vec![
            (0x0003u32, vec!["not_null", "primary_key"]),
            (0x0020, vec!["unsigned"]),
            (0x1000, vec![]),
            (0x0a00, vec!["auto_increment", "set"]),
        ];
        for (i, (word, expected)) in cases.into_iter().enumerate() {
            let view = table.decode(word);
            assert_eq!(
                view.set_names().collect::<Vec<_>>(),
                expected,
                "case {} word {:#x}",
                i + 1,
                word
            );
            assert_eq!(view.raw, word);
        }
    }

    #[test]
    fn display() {
        let table = BitTable::new(SERVER_STATUS_BITS);
        assert_eq!(table.decode(0x0002).to_string(), "0x0002 (autocommit)");
        assert_eq!(
            table.decode(0x000a).to_string(),
            "0x000a (autocommit|more_results)"
        );
        assert_eq!(table.decode(0).to_string(), "0x0000");
    }
}
