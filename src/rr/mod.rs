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

//! DNS resource records.

use crate::class::Class;
use crate::name::Name;
use crate::wire::{self, Reader, Writer};

pub mod rdata;
mod rr_type;
pub use rdata::Rdata;
pub use rr_type::Type;

////////////////////////////////////////////////////////////////////////
// RESOURCE RECORDS                                                   //
////////////////////////////////////////////////////////////////////////

/// A resource record: an owner name, type, class, TTL, and typed RDATA.
///
/// Records in the question section carry neither TTL nor RDATA; they
/// are represented with `ttl` zero and `rdata` [`None`], and are read
/// and written with the `in_question` parameter of [`Record::read`] and
/// [`Record::write`]. A record with `rdata` [`None`] *outside* the
/// question section writes an RDLENGTH of zero, which is how UPDATE
/// prerequisites are expressed ([RFC 2136 § 2.4]).
///
/// [RFC 2136 § 2.4]: https://datatracker.ietf.org/doc/html/rfc2136#section-2.4
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Record {
    pub name: Name,
    pub rr_type: Type,
    pub class: Class,
    pub ttl: u32,
    pub rdata: Option<Rdata>,
}

impl Record {
    /// Creates a record carrying `rdata`.
    pub fn new(name: Name, rr_type: Type, class: Class, ttl: u32, rdata: Rdata) -> Self {
        Self {
            name,
            rr_type,
            class,
            ttl,
            rdata: Some(rdata),
        }
    }

    /// Creates a question-section record.
    pub fn question(name: Name, rr_type: Type, class: Class) -> Self {
        Self {
            name,
            rr_type,
            class,
            ttl: 0,
            rdata: None,
        }
    }

    /// Reads a record starting at the reader's cursor. With
    /// `in_question` set, reading stops after the class field.
    pub fn read(reader: &mut Reader, in_question: bool) -> Result<Self, wire::Error> {
        let name = reader.read_name()?;
        let rr_type = Type::from(reader.read_u16());
        let class = Class::from(reader.read_u16());
        if in_question {
            return Ok(Self::question(name, rr_type, class));
        }
        let ttl = reader.read_u32();
        let rdlength = reader.read_u16();
        let mut window = reader.sub(rdlength as usize);
        let rdata = Rdata::read(rr_type, &mut window)?;
        Ok(Self {
            name,
            rr_type,
            class,
            ttl,
            rdata: Some(rdata),
        })
    }

    /// Writes the record. With `in_question` set, writing stops after
    /// the class field. RDLENGTH is reserved and back-filled with the
    /// exact number of octets the RDATA encoder produced.
    pub fn write(&self, writer: &mut Writer, in_question: bool) {
        writer.write_name(&self.name);
        writer.write_u16(self.rr_type.into());
        writer.write_u16(self.class.into());
        if in_question {
            return;
        }
        writer.write_u32(self.ttl);
        let rdlength = writer.mark();
        writer.write_u16(0);
        let before = writer.offset();
        if let Some(rdata) = &self.rdata {
            rdata.write(writer);
        }
        writer.patch_u16(rdlength, (writer.offset() - before) as u16);
    }

    /// Returns the exact number of octets [`Record::write`] will emit:
    /// ten plus the encoded name and RDATA lengths, or the name plus
    /// four for a question.
    pub fn encoded_len(&self, in_question: bool) -> usize {
        let fixed = if in_question {
            4
        } else {
            10 + self.rdata.as_ref().map_or(0, Rdata::encoded_len)
        };
        self.name.wire_len() + fixed
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn question_records_read_and_write() {
        let record = Record::question(
            "alpha.arrowhead.org.".parse().unwrap(),
            Type::PTR,
            Class::IN,
        );
        let mut buf = [0u8; 64];
        let mut writer = Writer::new(&mut buf);
        record.write(&mut writer, true);
        assert_eq!(writer.offset(), record.encoded_len(true));
        assert_eq!(
            writer.buffer(),
            b"\x05alpha\x09arrowhead\x03org\x00\x00\x0c\x00\x01",
        );

        let mut reader = Reader::new(writer.buffer());
        let read_back = Record::read(&mut reader, true).unwrap();
        assert_eq!(read_back, record);
    }

    #[test]
    fn full_records_back_fill_rdlength() {
        let record = Record::new(
            "alpha.arrowhead.org.".parse().unwrap(),
            Type::A,
            Class::IN,
            120,
            Rdata::A("192.0.2.7".parse().unwrap()),
        );
        let mut buf = [0u8; 64];
        let mut writer = Writer::new(&mut buf);
        record.write(&mut writer, false);
        assert_eq!(writer.offset(), record.encoded_len(false));
        let octets = writer.buffer();
        // RDLENGTH sits in the two octets before the four-octet A
        // RDATA.
        let rdlength = u16::from_be_bytes([octets[octets.len() - 6], octets[octets.len() - 5]]);
        assert_eq!(rdlength, 4);

        let mut reader = Reader::new(octets);
        let read_back = Record::read(&mut reader, false).unwrap();
        assert_eq!(read_back, record);
        assert!(reader.at_end());
    }

    #[test]
    fn empty_rdata_writes_zero_rdlength() {
        let record = Record {
            name: "gone.arrowhead.org.".parse().unwrap(),
            rr_type: Type::ANY,
            class: Class::ANY,
            ttl: 0,
            rdata: None,
        };
        let mut buf = [0u8; 64];
        let mut writer = Writer::new(&mut buf);
        record.write(&mut writer, false);
        let octets = writer.buffer();
        assert_eq!(&octets[octets.len() - 2..], b"\x00\x00");
        assert_eq!(writer.offset(), record.encoded_len(false));
    }
}
