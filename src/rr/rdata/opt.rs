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

//! OPT pseudo-RR option encoding ([RFC 6891 § 6.1.2]).
//!
//! Only the wire form of the options is handled; the semantics of
//! individual EDNS(0) options are out of scope.
//!
//! [RFC 6891 § 6.1.2]: https://datatracker.ietf.org/doc/html/rfc6891#section-6.1.2

use crate::wire::{Reader, Writer};

/// A single `{ OPTION-CODE, OPTION-LENGTH, OPTION-DATA }` triple from
/// OPT RDATA.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct OptOption {
    pub code: u16,
    pub data: Vec<u8>,
}

impl OptOption {
    pub(super) fn read(reader: &mut Reader) -> Self {
        let code = reader.read_u16();
        let len = reader.read_u16();
        Self {
            code,
            data: reader.read_bytes(len as usize).to_vec(),
        }
    }

    pub(super) fn write(&self, writer: &mut Writer) {
        writer.write_u16(self.code);
        writer.write_u16(self.data.len() as u16);
        writer.write_bytes(&self.data);
    }

    pub(super) fn encoded_len(&self) -> usize {
        4 + self.data.len()
    }
}

/// Reads OPT options until the RDATA window is exhausted.
pub(super) fn read_options(reader: &mut Reader) -> Vec<OptOption> {
    let mut options = Vec::new();
    while !reader.at_end() {
        options.push(OptOption::read(reader));
    }
    options
}
