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

//! SRV RDATA ([RFC 2782]).
//!
//! [RFC 2782]: https://datatracker.ietf.org/doc/html/rfc2782

use crate::name::Name;
use crate::wire::{Reader, Writer};

/// The RDATA of an SRV record ([RFC 2782]). This is the record type
/// DNS-SD uses to publish the host and port of a service instance.
///
/// [RFC 2782]: https://datatracker.ietf.org/doc/html/rfc2782
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Srv {
    pub priority: u16,
    pub weight: u16,
    pub port: u16,
    pub target: Name,
}

impl Srv {
    pub(super) fn read(reader: &mut Reader) -> Result<Self, crate::wire::Error> {
        Ok(Self {
            priority: reader.read_u16(),
            weight: reader.read_u16(),
            port: reader.read_u16(),
            target: reader.read_name()?,
        })
    }

    pub(super) fn write(&self, writer: &mut Writer) {
        writer.write_u16(self.priority);
        writer.write_u16(self.weight);
        writer.write_u16(self.port);
        writer.write_name(&self.target);
    }

    pub(super) fn encoded_len(&self) -> usize {
        6 + self.target.wire_len()
    }
}
