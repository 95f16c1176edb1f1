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

use log::trace;

use super::consts::{FieldFlags, STATEMENT_ID_SENTINEL};
use crate::flow_generator::error::{Error, Result};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ParameterSlot {
    pub field_type: u8,
    pub unsigned: bool,
    // value was sent with COM_STMT_SEND_LONG_DATA and is absent from EXECUTE
    pub streamed: bool,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ColumnSlot {
    pub field_type: u8,
    pub flags: FieldFlags,
}

impl ColumnSlot {
    pub fn unsigned(&self) -> bool {
        self.flags.contains(FieldFlags::UNSIGNED)
    }
}

/// Parameter and result column layout of one prepared statement.
///
/// Both slot arrays are sized when the PREPARE response is seen and are never
/// resized afterwards; populating writes into an existing index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementMetadata {
    parameters: Box<[ParameterSlot]>,
    fields: Box<[ColumnSlot]>,
    pub bulk_flags: u16,
}

impl StatementMetadata {
    fn new(param_count: u16, field_count: u16) -> Self {
        Self {
            parameters: vec![ParameterSlot::default(); param_count as usize].into_boxed_slice(),
            fields: vec![ColumnSlot::default(); field_count as usize].into_boxed_slice(),
            bulk_flags: 0,
        }
    }

    pub fn param_count(&self) -> usize {
        self.parameters.len()
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    pub fn parameters(&self) -> &[ParameterSlot] {
        &self.parameters
    }

    pub fn fields(&self) -> &[ColumnSlot] {
        &self.fields
    }
}

/// Statement id -> metadata for one connection. Entries live as long as the
/// connection; close and reset do not remove them.
#[derive(Debug, Default, Clone)]
pub struct StatementRegistry {
    statements: HashMap<u32, StatementMetadata>,
}

impl StatementRegistry {
    pub fn prepare(&mut self, statement_id: u32, param_count: u16, field_count: u16) {
        trace!(
            "prepare statement {} params={} fields={}",
            statement_id,
            param_count,
            field_count
        );
        self.statements.insert(
            statement_id,
            StatementMetadata::new(param_count, field_count),
        );
    }

    pub fn get(&self, statement_id: u32) -> Option<&StatementMetadata> {
        self.statements.get(&statement_id)
    }

    fn get_mut(&mut self, statement_id: u32) -> Result<&mut StatementMetadata> {
        self.statements
            .get_mut(&statement_id)
            .ok_or(Error::StatementNotFound(statement_id))
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    // out of range indexes are ignored, the arrays never grow
    pub fn populate_parameter(
        &mut self,
        statement_id: u32,
        index: usize,
        field_type: u8,
        unsigned: bool,
    ) -> Result<()> {
        let stmt = self.get_mut(statement_id)?;
        if let Some(slot) = stmt.parameters.get_mut(index) {
            slot.field_type = field_type;
            slot.unsigned = unsigned;
        }
        Ok(())
    }

    pub fn populate_field(
        &mut self,
        statement_id: u32,
        index: usize,
        field_type: u8,
        flags: FieldFlags,
    ) -> Result<()> {
        let stmt = self.get_mut(statement_id)?;
        if let Some(slot) = stmt.fields.get_mut(index) {
            slot.field_type = field_type;
            slot.flags = flags;
        }
        Ok(())
    }

    pub fn mark_streamed(&mut self, statement_id: u32, index: usize) -> Result<()> {
        let stmt = self.get_mut(statement_id)?;
        if let Some(slot) = stmt.parameters.get_mut(index) {
            slot.streamed = true;
        }
        Ok(())
    }

    pub fn set_bulk_flags(&mut self, statement_id: u32, flags: u16) -> Result<()> {
        self.get_mut(statement_id)?.bulk_flags = flags;
        Ok(())
    }

    /// Rebinds parameter types sent with an EXECUTE whose new-params-bound flag is set.
    pub fn bind_parameter_types(
        &mut self,
        statement_id: u32,
        types: &[(u8, bool)],
    ) -> Result<()> {
        let stmt = self.get_mut(statement_id)?;
        for (slot, (field_type, unsigned)) in stmt.parameters.iter_mut().zip(types) {
            slot.field_type = *field_type;
            slot.unsigned = *unsigned;
        }
        Ok(())
    }

    /// Resolves the sentinel id to the most recently prepared statement.
    pub fn resolve_id(statement_id: u32, last_prepared: Option<u32>) -> Result<u32> {
        if statement_id == STATEMENT_ID_SENTINEL {
            last_prepared.ok_or(Error::StatementNotFound(statement_id))
        } else {
            Ok(statement_id)
        }
    }

    pub fn resolve(
        &self,
        statement_id: u32,
        last_prepared: Option<u32>,
    ) -> Result<(u32, &StatementMetadata)> {
        let id = Self::resolve_id(statement_id, last_prepared)?;
        self.get(id)
            .map(|m| (id, m))
            .ok_or(Error::StatementNotFound(statement_id))
    }
}

impl FromIterator<(u32, StatementMetadata)> for StatementRegistry {
    fn from_iter<I: IntoIterator<Item = (u32, StatementMetadata)>>(iter: I) -> Self {
        Self {
            statements: iter.into_iter().collect(),
        }
    }
}

/// Registry access handed to the decode routines.
///
/// On the first pass every statement looked up is copied into `seen`, which
/// is stored with the frame snapshot. A replayed PDU reads a registry rebuilt
/// from those copies and never writes.
pub enum StatementAccess<'a> {
    Live {
        registry: &'a mut StatementRegistry,
        seen: &'a mut Vec<(u32, StatementMetadata)>,
    },
    Replay(&'a StatementRegistry),
}

impl<'a> StatementAccess<'a> {
    pub fn live(
        registry: &'a mut StatementRegistry,
        seen: &'a mut Vec<(u32, StatementMetadata)>,
    ) -> Self {
        Self::Live { registry, seen }
    }

    fn registry(&self) -> &StatementRegistry {
        match self {
            Self::Live { registry, .. } => registry,
            Self::Replay(r) => r,
        }
    }

    pub fn resolve(
        &mut self,
        statement_id: u32,
        last_prepared: Option<u32>,
    ) -> Result<(u32, StatementMetadata)> {
        let (id, stmt) = {
            let (id, stmt) = self.registry().resolve(statement_id, last_prepared)?;
            (id, stmt.clone())
        };
        if let Self::Live { seen, .. } = self {
            if seen.iter().all(|(i, _)| *i != id) {
                seen.push((id, stmt.clone()));
            }
        }
        Ok((id, stmt))
    }

    // runs `f` only on the first pass
    pub fn update<F>(&mut self, f: F) -> Result<()>
    where
        F: FnOnce(&mut StatementRegistry) -> Result<()>,
    {
        match self {
            Self::Live { registry, .. } => f(registry),
            Self::Replay(_) => Ok(()),
        }
    }
}
