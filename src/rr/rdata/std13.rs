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

//! RDATA structures for the RR types of [RFC 1035 § 3.3] handled by
//! this crate.
//!
//! [RFC 1035 § 3.3]: https://datatracker.ietf.org/doc/html/rfc1035#section-3.3

use crate::name::Name;
use crate::wire::{Reader, Writer};

////////////////////////////////////////////////////////////////////////
// SOA RDATA                                                          //
////////////////////////////////////////////////////////////////////////

/// The RDATA of an SOA record ([RFC 1035 § 3.3.13]).
///
/// [RFC 1035 § 3.3.13]: https://datatracker.ietf.org/doc/html/rfc1035#section-3.3.13
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Soa {
    pub mname: Name,
    pub rname: Name,
    pub serial: u32,
    pub refresh: u32,
    pub retry: u32,
    pub expire: u32,
    pub minimum: u32,
}

impl Soa {
    pub(super) fn read(reader: &mut Reader) -> Result<Self, crate::wire::Error> {
        Ok(Self {
            mname: reader.read_name()?,
            rname: reader.read_name()?,
            serial: reader.read_u32(),
            refresh: reader.read_u32(),
            retry: reader.read_u32(),
            expire: reader.read_u32(),
            minimum: reader.read_u32(),
        })
    }

    pub(super) fn write(&self, writer: &mut Writer) {
        writer.write_name(&self.mname);
        writer.write_name(&self.rname);
        writer.write_u32(self.serial);
        writer.write_u32(self.refresh);
        writer.write_u32(self.retry);
        writer.write_u32(self.expire);
        writer.write_u32(self.minimum);
    }

    pub(super) fn encoded_len(&self) -> usize {
        self.mname.wire_len() + self.rname.wire_len() + 20
    }
}

////////////////////////////////////////////////////////////////////////
// MX RDATA                                                           //
////////////////////////////////////////////////////////////////////////

/// The RDATA of an MX record ([RFC 1035 § 3.3.9]).
///
/// [RFC 1035 § 3.3.9]: https://datatracker.ietf.org/doc/html/rfc1035#section-3.3.9
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Mx {
    pub preference: u16,
    pub exchange: Name,
}

impl Mx {
    pub(super) fn read(reader: &mut Reader) -> Result<Self, crate::wire::Error> {
        Ok(Self {
            preference: reader.read_u16(),
            exchange: reader.read_name()?,
        })
    }

    pub(super) fn write(&self, writer: &mut Writer) {
        writer.write_u16(self.preference);
        writer.write_name(&self.exchange);
    }

    pub(super) fn encoded_len(&self) -> usize {
        2 + self.exchange.wire_len()
    }
}
