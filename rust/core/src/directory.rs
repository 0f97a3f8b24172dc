// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Line Directory - identifier to tape offset index
//!
//! Lines are kept in a dense table in the order they were first recorded.
//! Identifiers are sparse and can be large, so the identifier to slot
//! mapping goes through an `FxHashMap`.

use rustc_hash::FxHashMap;

use crate::error::{Error, Result};

/// One directory slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineEntry {
    /// Public identifier (`#id` in STEP text)
    pub id: u32,
    /// Entity type code
    pub type_code: u32,
    /// Tape offset of the line's first token
    pub offset: usize,
    /// Cleared when the line is deleted
    pub live: bool,
}

/// Ordered table of lines with O(1) lookup by identifier
#[derive(Debug, Default)]
pub struct LineDirectory {
    lines: Vec<LineEntry>,
    slots: FxHashMap<u32, usize>,
    live_count: usize,
    max_id: u32,
}

impl LineDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a directory with room for `capacity` lines
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            lines: Vec::with_capacity(capacity),
            slots: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
            live_count: 0,
            max_id: 0,
        }
    }

    /// Insert a line, or point an existing identifier at newer tape data.
    ///
    /// A re-recorded identifier keeps its original position in directory
    /// order. Returns the slot index.
    pub fn record_line(&mut self, id: u32, type_code: u32, offset: usize) -> usize {
        self.max_id = self.max_id.max(id);

        if let Some(&slot) = self.slots.get(&id) {
            let entry = &mut self.lines[slot];
            if !entry.live {
                self.live_count += 1;
            }
            entry.type_code = type_code;
            entry.offset = offset;
            entry.live = true;
            return slot;
        }

        let slot = self.lines.len();
        self.lines.push(LineEntry {
            id,
            type_code,
            offset,
            live: true,
        });
        self.slots.insert(id, slot);
        self.live_count += 1;
        slot
    }

    /// Find the live entry for an identifier
    #[inline]
    pub fn lookup(&self, id: u32) -> Result<&LineEntry> {
        self.slots
            .get(&id)
            .map(|&slot| &self.lines[slot])
            .filter(|entry| entry.live)
            .ok_or(Error::NotFound(id))
    }

    #[inline]
    pub fn contains(&self, id: u32) -> bool {
        self.lookup(id).is_ok()
    }

    /// Clear the existence flag of a line
    pub fn remove(&mut self, id: u32) -> Result<LineEntry> {
        let slot = *self.slots.get(&id).ok_or(Error::NotFound(id))?;
        let entry = &mut self.lines[slot];
        if !entry.live {
            return Err(Error::NotFound(id));
        }
        entry.live = false;
        self.live_count -= 1;
        Ok(*entry)
    }

    /// Live entries in directory order
    pub fn entries(&self) -> impl Iterator<Item = &LineEntry> + '_ {
        self.lines.iter().filter(|entry| entry.live)
    }

    /// Every slot, deleted ones included
    pub(crate) fn slots(&self) -> &[LineEntry] {
        &self.lines
    }

    /// Identifiers of live lines in directory order
    pub fn all_identifiers(&self) -> impl Iterator<Item = u32> + '_ {
        self.entries().map(|entry| entry.id)
    }

    /// Identifiers of live lines with the given type code, in directory order
    pub fn identifiers_of_type(&self, type_code: u32) -> impl Iterator<Item = u32> + '_ {
        self.entries()
            .filter(move |entry| entry.type_code == type_code)
            .map(|entry| entry.id)
    }

    /// Number of live lines
    #[inline]
    pub fn len(&self) -> usize {
        self.live_count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.live_count == 0
    }

    /// Largest identifier ever recorded (0 when empty)
    #[inline]
    pub fn max_id(&self) -> u32 {
        self.max_id
    }
}
