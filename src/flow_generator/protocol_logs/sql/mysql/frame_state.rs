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

use std::collections::HashMap;

use serde::Serialize;

use super::state::SessionState;
use super::statement::{StatementMetadata, StatementRegistry};

/// One PDU position in the capture. A frame can carry several PDUs.
#[derive(Serialize, Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameKey {
    pub frame: u64,
    pub pdu_index: u32,
}

impl FrameKey {
    pub fn new(frame: u64, pdu_index: u32) -> Self {
        Self { frame, pdu_index }
    }
}

/// What one PDU saw when it was first decoded: the session state right
/// before it, and a copy of every prepared statement it looked up.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct FrameState {
    pub session: SessionState,
    pub statements: Vec<(u32, StatementMetadata)>,
}

impl FrameState {
    pub fn new(session: SessionState) -> Self {
        Self {
            session,
            statements: vec![],
        }
    }

    // the statements as they were on the first pass, later PDUs cannot reach them
    pub fn registry(&self) -> StatementRegistry {
        self.statements.iter().cloned().collect()
    }
}

/// Write once: a recorded entry is never replaced.
#[derive(Debug, Default, Clone)]
pub struct FrameStates {
    states: HashMap<FrameKey, FrameState>,
}

impl FrameStates {
    pub fn get(&self, key: &FrameKey) -> Option<&FrameState> {
        self.states.get(key)
    }

    pub fn contains(&self, key: &FrameKey) -> bool {
        self.states.contains_key(key)
    }

    // returns false and keeps the old entry when `key` was already recorded
    pub fn record(&mut self, key: FrameKey, state: FrameState) -> bool {
        if self.states.contains_key(&key) {
            return false;
        }
        self.states.insert(key, state);
        true
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}
