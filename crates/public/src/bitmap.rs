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

#[derive(Debug, PartialEq, Eq)]
pub enum Error {
    IndexOutOfBound,
}

/// Read-only view over a wire NULL bitmap.
///
/// Bit `pos + offset` is tested, least significant bit first within each byte.
/// Binary result rows reserve the first 2 bits (offset 2), statement execute
/// requests use no reserved bits (offset 0).
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub struct NullBitmap<'a> {
    raw: &'a [u8],
    offset: usize,
}

impl<'a> NullBitmap<'a> {
    pub fn new(raw: &'a [u8], offset: usize) -> Self {
        NullBitmap { raw, offset }
    }

    // number of bytes the bitmap occupies on the wire for `count` positions
    pub fn byte_len(count: usize, offset: usize) -> usize {
        (count + offset + 7) / 8
    }

    pub fn get_raw(&self) -> &'a [u8] {
        self.raw
    }

    pub fn get(&self, pos: usize) -> Result<bool, Error> {
        let (idx, u_pos) = self.get_idx_pos(pos);
        match self.raw.get(idx) {
            Some(b) => Ok(b & (1 << u_pos) != 0),
            None => Err(Error::IndexOutOfBound),
        }
    }

    // return byte index and bit within the byte
    fn get_idx_pos(&self, pos: usize) -> (usize, u8) {
        let pos = pos + self.offset;
        (pos / 8, (pos % 8) as u8)
    }

    /// Encodes a bitmap for `count` positions with the given positions marked NULL.
    pub fn build<I: IntoIterator<Item = usize>>(count: usize, offset: usize, nulls: I) -> Vec<u8> {
        let mut raw = vec![0u8; Self::byte_len(count, offset)];
        for pos in nulls {
            if pos >= count {
                continue;
            }
            let pos = pos + offset;
            raw[pos / 8] |= 1 << (pos % 8);
        }
        raw
    }
}
