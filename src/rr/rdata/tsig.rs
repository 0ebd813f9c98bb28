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

//! TSIG RDATA ([RFC 2845 § 2.3]).
//!
//! This module handles the wire form of the TSIG pseudo-RR only.
//! Computing and checking the MAC is the business of
//! [`message::tsig`](crate::message::tsig).
//!
//! [RFC 2845 § 2.3]: https://datatracker.ietf.org/doc/html/rfc2845#section-2.3

use crate::message::ExtendedRcode;
use crate::name::Name;
use crate::wire::{Reader, Writer};

/// The RDATA of a TSIG pseudo-RR.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Tsig {
    /// The name of the MAC algorithm, in domain-name syntax.
    pub algorithm: Name,

    /// Seconds since the Unix epoch at signing time; 48 bits on the
    /// wire.
    pub time_signed: u64,

    /// The permitted clock skew, in seconds.
    pub fudge: u16,

    /// The message authentication code.
    pub mac: Vec<u8>,

    /// The message ID of the original request.
    pub original_id: u16,

    /// The extended RCODE covering TSIG processing.
    pub error: ExtendedRcode,

    /// Empty unless the error is BADTIME, in which case it carries the
    /// other party's clock ([RFC 2845 § 4.5.2]).
    ///
    /// [RFC 2845 § 4.5.2]: https://datatracker.ietf.org/doc/html/rfc2845#section-4.5.2
    pub other: Vec<u8>,
}

impl Tsig {
    pub(super) fn read(reader: &mut Reader) -> Result<Self, crate::wire::Error> {
        let algorithm = reader.read_name()?;
        let time_signed = reader.read_u48();
        let fudge = reader.read_u16();
        let mac_len = reader.read_u16();
        let mac = reader.read_bytes(mac_len as usize).to_vec();
        let original_id = reader.read_u16();
        let error = ExtendedRcode::from(reader.read_u16());
        let other_len = reader.read_u16();
        let other = reader.read_bytes(other_len as usize).to_vec();
        Ok(Self {
            algorithm,
            time_signed,
            fudge,
            mac,
            original_id,
            error,
            other,
        })
    }

    pub(super) fn write(&self, writer: &mut Writer) {
        writer.write_name(&self.algorithm);
        writer.write_u48(self.time_signed);
        writer.write_u16(self.fudge);
        writer.write_u16(self.mac.len() as u16);
        writer.write_bytes(&self.mac);
        writer.write_u16(self.original_id);
        writer.write_u16(self.error.into());
        writer.write_u16(self.other.len() as u16);
        writer.write_bytes(&self.other);
    }

    pub(super) fn encoded_len(&self) -> usize {
        self.algorithm.wire_len() + 16 + self.mac.len() + self.other.len()
    }
}
