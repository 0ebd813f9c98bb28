// Copyright 2023 Quiver Contributors.
//
// Licensed under the Apache License, Version 2.0 (the "License"); you
// may not use this file except in compliance with the License. You may
// obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or
// implied. See the License for the specific language governing
// permissions and limitations under the License.

//! Implementation of the [`Reader`] window over on-the-wire messages.

use crate::name::{Label, Name, MAX_WIRE_LEN};

use super::Error;

////////////////////////////////////////////////////////////////////////
// READER                                                             //
////////////////////////////////////////////////////////////////////////

/// A read window over an on-the-wire DNS message.
///
/// A `Reader` keeps a reference to the *entire* message buffer together
/// with a cursor and an exclusive end. Reads advance the cursor but
/// never move it past `end`; a read that would do so yields a
/// zero-valued field (or a short slice) instead of failing. Keeping the
/// whole buffer around, rather than just the windowed region, lets
/// compression pointers anywhere in the window — including inside
/// RDATA sub-windows — resolve against the start of the message.
#[derive(Clone, Debug)]
pub struct Reader<'a> {
    octets: &'a [u8],
    cursor: usize,
    end: usize,
}

impl<'a> Reader<'a> {
    /// Creates a `Reader` spanning the whole of `octets`.
    pub fn new(octets: &'a [u8]) -> Self {
        Self {
            octets,
            cursor: 0,
            end: octets.len(),
        }
    }

    /// Returns the number of octets left in the window.
    pub fn remaining(&self) -> usize {
        self.end - self.cursor
    }

    /// Returns whether the cursor has reached the end of the window.
    pub fn at_end(&self) -> bool {
        self.cursor >= self.end
    }

    /// Derives a sub-window covering the next `len` octets (clamped to
    /// the remainder of this window) and advances this window past it.
    /// The sub-window shares the underlying buffer, so compression
    /// pointers read through it still resolve against the message
    /// start; advancing the sub-window does not affect this window.
    pub fn sub(&mut self, len: usize) -> Reader<'a> {
        let len = len.min(self.remaining());
        let sub = Reader {
            octets: self.octets,
            cursor: self.cursor,
            end: self.cursor + len,
        };
        self.cursor += len;
        sub
    }

    /// Reads up to `len` raw octets. If fewer remain, the available
    /// octets are returned and the cursor stops at the end.
    pub fn read_bytes(&mut self, len: usize) -> &'a [u8] {
        let len = len.min(self.remaining());
        let slice = &self.octets[self.cursor..self.cursor + len];
        self.cursor += len;
        slice
    }

    /// Reads a big-endian integer of `len` octets, yielding zero when
    /// the window is exhausted.
    fn read_be(&mut self, len: usize) -> u64 {
        if self.remaining() < len {
            self.cursor = self.end;
            return 0;
        }
        let mut value = 0u64;
        for _ in 0..len {
            value = (value << 8) | u64::from(self.octets[self.cursor]);
            self.cursor += 1;
        }
        value
    }

    /// Reads an unsigned 8-bit integer.
    pub fn read_u8(&mut self) -> u8 {
        self.read_be(1) as u8
    }

    /// Reads a network-byte-order unsigned 16-bit integer.
    pub fn read_u16(&mut self) -> u16 {
        self.read_be(2) as u16
    }

    /// Reads a network-byte-order unsigned 32-bit integer.
    pub fn read_u32(&mut self) -> u32 {
        self.read_be(4) as u32
    }

    /// Reads a network-byte-order unsigned 48-bit integer (used by the
    /// TSIG "time signed" field).
    pub fn read_u48(&mut self) -> u64 {
        self.read_be(6)
    }

    /// Reads a single `<character-string>`: a length octet followed by
    /// that many octets of data.
    pub fn read_character_string(&mut self) -> &'a [u8] {
        let len = self.read_u8();
        self.read_bytes(len as usize)
    }

    /// Reads `<character-string>`s until the window is exhausted.
    pub fn read_character_strings(&mut self) -> Vec<Vec<u8>> {
        let mut strings = Vec::new();
        while !self.at_end() {
            strings.push(self.read_character_string().to_vec());
        }
        strings
    }

    /// Reads a domain name starting at the cursor, following
    /// compression pointers.
    ///
    /// Pointer offsets index the underlying message buffer from its
    /// start; following one derives a fresh window at that absolute
    /// offset, running to the end of the buffer, so a name inside a
    /// bounded RDATA window may still point back into earlier parts of
    /// the message. The outer cursor advances over the contiguous
    /// octets of the name only (through the first pointer, if any).
    ///
    /// Pointers must point strictly backward; each pointer must lead to
    /// an offset lower than any previously followed. Violations, along
    /// with the reserved `01`/`10` label types, are the only reported
    /// errors; running off the end of the buffer terminates the name as
    /// if by a null label.
    pub fn read_name(&mut self) -> Result<Name, Error> {
        let mut labels = Vec::new();
        let mut wire_len = 1usize;

        // The window currently being read: ours until the first
        // pointer, then one rooted at each pointer target in turn.
        let mut current = Reader {
            octets: self.octets,
            cursor: self.cursor,
            end: self.end,
        };
        // The octets the name occupies in *this* window; determined by
        // the first pointer or the null label.
        let mut outer_len = None;
        // Pointers may only lead to offsets lower than this.
        let mut min_offset = self.cursor;

        loop {
            if current.at_end() {
                // Truncated name; treat like a null label.
                outer_len.get_or_insert_with(|| current.cursor - self.cursor);
                break;
            }
            let len_byte = current.read_u8();
            match len_byte & 0xc0 {
                0xc0 => {
                    let low = current.read_u8();
                    let target = usize::from(len_byte & 0x3f) << 8 | usize::from(low);
                    outer_len.get_or_insert_with(|| current.cursor - self.cursor);
                    if target >= min_offset {
                        return Err(Error::InvalidPointer);
                    }
                    min_offset = target;
                    current = Reader {
                        octets: self.octets,
                        cursor: target,
                        end: self.octets.len(),
                    };
                }
                0x00 => {
                    if len_byte == 0 {
                        outer_len.get_or_insert_with(|| current.cursor - self.cursor);
                        break;
                    }
                    let octets = current.read_bytes(len_byte as usize);
                    wire_len += 1 + octets.len();
                    if wire_len > MAX_WIRE_LEN {
                        return Err(Error::NameTooLong);
                    }
                    // The 0x3f mask bounds the length at 63, and a
                    // truncated window cannot make it empty here, so
                    // the conversion cannot fail.
                    if let Ok(label) = Label::try_from(octets) {
                        labels.push(label);
                    }
                }
                _ => return Err(Error::ReservedLabelType),
            }
        }

        self.cursor += outer_len.unwrap_or(0).min(self.remaining());
        // wire_len is capped at MAX_WIRE_LEN above, so from_labels
        // cannot fail.
        Ok(Name::from_labels(labels).unwrap_or_else(|_| Name::root()))
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////
